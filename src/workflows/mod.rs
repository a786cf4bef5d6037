//! Multi-call operations built on top of [`FormationApi`].
//!
//! The main one is [`FormationWorkflows::launch_and_wait`]: check the app's
//! required parameters, launch, and for interactive apps poll until the
//! analysis URL is served.

mod browser;

pub use browser::{BrowserOpener, BrowserOutcome, SystemBrowserOpener};

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::formation::models::INTERACTIVE_JOB_TYPE;
use crate::formation::{
    Analysis, AppParameters, ControlOperation, FormationApi, FormationError, LaunchConfig,
    LaunchRequest, Parameter,
};

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Status used to select running analyses.
pub const RUNNING_STATUS: &str = "Running";

/// Inputs of [`FormationWorkflows::launch_and_wait`].
#[derive(Debug, Clone)]
pub struct LaunchParams {
    pub app_id: String,
    pub system_id: String,
    pub name: Option<String>,
    pub config: Option<LaunchConfig>,
    pub max_wait: Duration,
    pub poll_interval: Duration,
    /// When set, the parameter fetch and missing-parameter check are skipped.
    pub overall_job_type: Option<String>,
}

impl LaunchParams {
    pub fn new(app_id: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            system_id: system_id.into(),
            name: None,
            config: None,
            max_wait: DEFAULT_MAX_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            overall_job_type: None,
        }
    }
}

/// What a launch attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchOutcome {
    /// Nothing was launched: the caller must supply these parameters first.
    MissingParameters {
        missing: Vec<Parameter>,
        parameters: AppParameters,
    },
    /// Interactive analysis serving its URL.
    Ready {
        analysis_id: String,
        url: String,
        status: String,
        wait_time: Duration,
    },
    /// Batch job accepted; nothing to wait for.
    Submitted {
        analysis_id: String,
        job_type: String,
    },
}

/// Required, visible parameters whose ids are absent from `config`.
pub fn missing_parameters(parameters: &AppParameters, config: Option<&LaunchConfig>) -> Vec<Parameter> {
    parameters
        .parameters()
        .filter(|p| p.is_required())
        .filter(|p| config.map_or(true, |c| !c.contains_key(&p.id)))
        .cloned()
        .collect()
}

pub struct FormationWorkflows {
    api: Arc<dyn FormationApi>,
    browser: Arc<dyn BrowserOpener>,
}

impl FormationWorkflows {
    pub fn new(api: Arc<dyn FormationApi>, browser: Arc<dyn BrowserOpener>) -> Self {
        Self { api, browser }
    }

    pub fn api(&self) -> &Arc<dyn FormationApi> {
        &self.api
    }

    pub async fn launch_and_wait(
        &self,
        params: LaunchParams,
    ) -> Result<LaunchOutcome, FormationError> {
        let job_type = match params.overall_job_type.clone() {
            Some(job_type) => job_type,
            None => {
                let parameters = self
                    .api
                    .get_app_parameters(&params.app_id, &params.system_id)
                    .await?;
                let missing = missing_parameters(&parameters, params.config.as_ref());
                if !missing.is_empty() {
                    info!(
                        "Not launching {}: {} required parameter(s) missing",
                        params.app_id,
                        missing.len()
                    );
                    return Ok(LaunchOutcome::MissingParameters {
                        missing,
                        parameters,
                    });
                }
                parameters.overall_job_type.unwrap_or_default()
            }
        };

        let request = LaunchRequest {
            name: params.name.clone(),
            config: params.config.clone(),
        };
        let launched = self
            .api
            .launch_app(&params.app_id, &params.system_id, &request)
            .await?;

        if job_type != INTERACTIVE_JOB_TYPE {
            return Ok(LaunchOutcome::Submitted {
                analysis_id: launched.analysis_id,
                job_type,
            });
        }

        self.wait_until_ready(&launched.analysis_id, params.max_wait, params.poll_interval)
            .await
    }

    async fn wait_until_ready(
        &self,
        analysis_id: &str,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<LaunchOutcome, FormationError> {
        info!(
            "Waiting up to {}s for analysis {} to become ready",
            max_wait.as_secs(),
            analysis_id
        );

        let started = Instant::now();
        while started.elapsed() < max_wait {
            let status = match self.api.get_analysis_status(analysis_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("Polling analysis {} failed: {}", analysis_id, e);
                    return Err(e);
                }
            };

            if let Some(url) = status.ready_url() {
                let wait_time = started.elapsed();
                info!(
                    "Analysis {} ready after {}s at {}",
                    analysis_id,
                    wait_time.as_secs(),
                    url
                );
                return Ok(LaunchOutcome::Ready {
                    analysis_id: analysis_id.to_string(),
                    url: url.to_string(),
                    status: status.status,
                    wait_time,
                });
            }
            if status.has_failed() {
                return Err(FormationError::AnalysisFailed {
                    analysis_id: analysis_id.to_string(),
                    status: status.status,
                });
            }

            debug!("Analysis {} is {}, not ready yet", analysis_id, status.status);
            sleep(poll_interval).await;
        }

        Err(FormationError::Timeout {
            analysis_id: analysis_id.to_string(),
            elapsed: started.elapsed(),
            max_wait,
        })
    }

    /// Stop an analysis, saving its outputs first when `save_outputs` is set.
    pub async fn stop_analysis(
        &self,
        analysis_id: &str,
        save_outputs: bool,
    ) -> Result<Value, FormationError> {
        let operation = if save_outputs {
            ControlOperation::SaveAndExit
        } else {
            ControlOperation::Exit
        };
        info!("Stopping analysis {} ({})", analysis_id, operation);
        self.api.control_analysis(analysis_id, operation).await
    }

    pub async fn extend_analysis_time(&self, analysis_id: &str) -> Result<Value, FormationError> {
        self.api
            .control_analysis(analysis_id, ControlOperation::ExtendTime)
            .await
    }

    pub async fn get_running_analyses(&self) -> Result<Vec<Analysis>, FormationError> {
        self.api.list_analyses(RUNNING_STATUS).await
    }

    pub async fn open_in_browser(&self, url: &str) -> BrowserOutcome {
        self.browser.open(url).await
    }
}
