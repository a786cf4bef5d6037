//! Errors surfaced by the Formation client and workflows.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the Formation service.
#[derive(Debug, Error)]
pub enum FormationError {
    /// Missing base URL or credentials. Raised before any network activity.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No usable token and no way to mint a new one.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The service answered with a non-success status code.
    #[error("Request to {endpoint} failed with status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (connect, TLS, timeout...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered 2xx but the body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built from the given inputs.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An interactive analysis did not expose its URL within the allotted window.
    /// The remote analysis keeps running.
    #[error(
        "Analysis {} not ready after {}s (max: {}s)",
        .analysis_id,
        .elapsed.as_secs(),
        .max_wait.as_secs()
    )]
    Timeout {
        analysis_id: String,
        elapsed: Duration,
        max_wait: Duration,
    },

    /// The analysis reached a terminal failure state while we were waiting on it.
    #[error("Analysis {analysis_id} ended with status {status}")]
    AnalysisFailed { analysis_id: String, status: String },
}

impl FormationError {
    /// HTTP status code, for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FormationError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FormationError::Timeout { .. })
    }
}

impl From<reqwest::Error> for FormationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FormationError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            FormationError::InvalidRequest(err.to_string())
        } else {
            FormationError::Transport(err.to_string())
        }
    }
}
