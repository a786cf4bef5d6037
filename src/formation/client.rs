//! HTTP client for the Formation service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::auth::{Credentials, TokenState, DEFAULT_EXPIRES_IN_SECS};
use super::error::FormationError;
use super::models::{
    Analysis, AnalysisListing, AnalysisStatus, AppListing, AppParameters, BrowseOptions,
    CollectionListing, ControlOperation, DataNode, DataObject, DeleteResult, LaunchRequest,
    LaunchResponse, LoginResponse, PutRequest, PutResult, DEFAULT_AVU_DELIMITER,
    METADATA_HEADER_PREFIX,
};
use crate::metrics;

/// Header prefix used when sending metadata attributes on `PUT /data`.
pub const METADATA_REQUEST_HEADER_PREFIX: &str = "X-Datastore-";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations offered by the Formation REST API.
///
/// Every operation authenticates first and fails on any non-2xx answer.
/// There are no retries.
#[async_trait]
pub trait FormationApi: Send + Sync {
    /// One page of the app catalog, optionally filtered by name.
    async fn list_apps(
        &self,
        limit: u32,
        offset: u32,
        name: Option<&str>,
    ) -> Result<AppListing, FormationError>;

    async fn get_app_parameters(
        &self,
        app_id: &str,
        system_id: &str,
    ) -> Result<AppParameters, FormationError>;

    async fn launch_app(
        &self,
        app_id: &str,
        system_id: &str,
        request: &LaunchRequest,
    ) -> Result<LaunchResponse, FormationError>;

    async fn get_analysis_status(&self, analysis_id: &str)
        -> Result<AnalysisStatus, FormationError>;

    /// All analyses whose status equals `status`.
    async fn list_analyses(&self, status: &str) -> Result<Vec<Analysis>, FormationError>;

    /// Free-form result of a lifecycle operation. An empty body yields `Value::Null`.
    async fn control_analysis(
        &self,
        analysis_id: &str,
        operation: ControlOperation,
    ) -> Result<Value, FormationError>;

    async fn browse(&self, path: &str, options: &BrowseOptions)
        -> Result<DataNode, FormationError>;

    async fn put(&self, request: &PutRequest) -> Result<PutResult, FormationError>;

    async fn delete(
        &self,
        path: &str,
        recurse: bool,
        dry_run: bool,
    ) -> Result<DeleteResult, FormationError>;
}

/// Authenticated reqwest-based implementation of [`FormationApi`].
pub struct FormationClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    token_state: Mutex<TokenState>,
}

impl FormationClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the service (e.g., "https://formation.example.org")
    /// * `credentials` - Static token or username/password
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, FormationError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(FormationError::Configuration(
                "base URL must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FormationError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token_state: Mutex::new(TokenState::for_credentials(&credentials)),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// When the held token stops being usable, if known.
    pub async fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token_state.lock().await.expiry
    }

    /// Return a usable bearer token, logging in when the held one is missing
    /// or expired and a username/password is configured.
    ///
    /// The state lock is held across the login call so concurrent callers
    /// wait for one refresh instead of each performing their own.
    pub async fn ensure_token(&self) -> Result<String, FormationError> {
        let mut state = self.token_state.lock().await;
        let now = Utc::now();
        if let Some(token) = state.usable_token(now) {
            return Ok(token.to_string());
        }

        let Some(login) = self.credentials.login_pair() else {
            return Err(FormationError::Authentication(
                "token has expired and no username/password is configured to obtain a new one"
                    .to_string(),
            ));
        };
        if state.token.is_some() {
            info!("Held token is no longer usable, logging in as {}", login.username);
        }

        let response = self.login(&login.username, &login.password).await?;
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        state.replace(response.access_token.clone(), expires_in, now);
        Ok(response.access_token)
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, FormationError> {
        let request = self
            .client
            .post(self.url("/login"))
            .basic_auth(username, Some(password));

        let result = self.dispatch("/login", request).await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_login("failure");
                warn!("Login as {} failed: {}", username, e);
                return Err(e);
            }
        };

        let login: LoginResponse = response.json().await.map_err(|e| {
            metrics::record_login("failure");
            FormationError::from(e)
        })?;
        metrics::record_login("success");
        info!(
            "Logged in as {} (token valid for {}s)",
            username,
            login.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
        );
        Ok(login)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}/data/{}", self.base_url, encode_data_path(path))
    }

    /// Attach the bearer token and send.
    async fn execute(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FormationError> {
        let token = self.ensure_token().await?;
        self.dispatch(endpoint, request.bearer_auth(token)).await
    }

    /// Send a fully built request, record it, and turn non-2xx into an error.
    ///
    /// `endpoint` is the route template used as the metrics label.
    async fn dispatch(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FormationError> {
        let request = request.build()?;
        let method = request.method().to_string();
        let path = request.url().path().to_string();

        let started = Instant::now();
        let result = self.client.execute(request).await;
        let elapsed = started.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_api_request(&method, endpoint, "error", elapsed);
                debug!("{} {} failed after {:?}: {}", method, path, elapsed, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_api_request(&method, endpoint, status.as_str(), elapsed);
        debug!("{} {} -> {} in {:?}", method, path, status.as_u16(), elapsed);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FormationError::Status {
                endpoint: path,
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl FormationApi for FormationClient {
    async fn list_apps(
        &self,
        limit: u32,
        offset: u32,
        name: Option<&str>,
    ) -> Result<AppListing, FormationError> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }

        let request = self.client.get(self.url("/apps")).query(&query);
        let response = self.execute("/apps", request).await?;
        Ok(response.json().await?)
    }

    async fn get_app_parameters(
        &self,
        app_id: &str,
        system_id: &str,
    ) -> Result<AppParameters, FormationError> {
        let url = self.url(&format!(
            "/apps/{}/{}/parameters",
            urlencoding::encode(system_id),
            urlencoding::encode(app_id)
        ));
        let response = self
            .execute("/apps/{system_id}/{app_id}/parameters", self.client.get(url))
            .await?;
        Ok(response.json().await?)
    }

    async fn launch_app(
        &self,
        app_id: &str,
        system_id: &str,
        request: &LaunchRequest,
    ) -> Result<LaunchResponse, FormationError> {
        let url = self.url(&format!(
            "/app/launch/{}/{}",
            urlencoding::encode(system_id),
            urlencoding::encode(app_id)
        ));
        let body = LaunchRequest {
            name: request.name.clone(),
            config: request.config.clone().filter(|c| !c.is_empty()),
        };

        let response = self
            .execute(
                "/app/launch/{system_id}/{app_id}",
                self.client.post(url).json(&body),
            )
            .await?;
        let launched: LaunchResponse = response.json().await?;
        info!(
            "Launched app {}/{} as analysis {} ({})",
            system_id, app_id, launched.analysis_id, launched.status
        );
        Ok(launched)
    }

    async fn get_analysis_status(
        &self,
        analysis_id: &str,
    ) -> Result<AnalysisStatus, FormationError> {
        let url = self.url(&format!(
            "/apps/analyses/{}/status",
            urlencoding::encode(analysis_id)
        ));
        let response = self
            .execute("/apps/analyses/{analysis_id}/status", self.client.get(url))
            .await?;
        Ok(response.json().await?)
    }

    async fn list_analyses(&self, status: &str) -> Result<Vec<Analysis>, FormationError> {
        let request = self
            .client
            .get(self.url("/apps/analyses/"))
            .query(&[("status", status)]);
        let response = self.execute("/apps/analyses/", request).await?;
        let listing: AnalysisListing = response.json().await?;
        Ok(listing.analyses)
    }

    async fn control_analysis(
        &self,
        analysis_id: &str,
        operation: ControlOperation,
    ) -> Result<Value, FormationError> {
        let url = self.url(&format!(
            "/apps/analyses/{}/control",
            urlencoding::encode(analysis_id)
        ));
        let request = self
            .client
            .post(url)
            .query(&[("operation", operation.as_str())]);
        let response = self
            .execute("/apps/analyses/{analysis_id}/control", request)
            .await?;

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            FormationError::InvalidResponse(format!("control result is not JSON: {}", e))
        })
    }

    async fn browse(
        &self,
        path: &str,
        options: &BrowseOptions,
    ) -> Result<DataNode, FormationError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if options.offset > 0 {
            query.push(("offset", options.offset.to_string()));
        }
        if let Some(limit) = options.limit {
            query.push(("limit", limit.to_string()));
        }
        if options.include_metadata {
            query.push(("include_metadata", "true".to_string()));
        }
        if options.avu_delimiter != DEFAULT_AVU_DELIMITER {
            query.push(("avu_delimiter", options.avu_delimiter.clone()));
        }

        let request = self.client.get(self.data_url(path)).query(&query);
        let response = self.execute("/data/{path}", request).await?;

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let metadata = response
            .headers()
            .iter()
            .filter(|(name, _)| name.as_str().starts_with(METADATA_HEADER_PREFIX))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let content = response.bytes().await?.to_vec();

        if is_json {
            if let Some(listing) = listing_for(path, &content) {
                return Ok(DataNode::Collection(listing));
            }
            debug!("JSON body of {} is not a listing, returning it as content", path);
        }

        Ok(DataNode::Object(DataObject {
            path: path.to_string(),
            content,
            metadata,
        }))
    }

    async fn put(&self, request: &PutRequest) -> Result<PutResult, FormationError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(resource_type) = &request.resource_type {
            query.push(("resource_type", resource_type.clone()));
        }
        if request.replace_metadata {
            query.push(("replace_metadata", "true".to_string()));
        }
        if request.avu_delimiter != DEFAULT_AVU_DELIMITER {
            query.push(("avu_delimiter", request.avu_delimiter.clone()));
        }

        let mut builder = self.client.put(self.data_url(&request.path)).query(&query);
        for (attribute, value) in &request.metadata {
            builder = builder.header(
                format!("{}{}", METADATA_REQUEST_HEADER_PREFIX, attribute),
                value.as_str(),
            );
        }
        if let Some(content) = &request.content {
            builder = builder.body(content.clone());
        }

        let response = self.execute("/data/{path}", builder).await?;
        Ok(response.json().await?)
    }

    async fn delete(
        &self,
        path: &str,
        recurse: bool,
        dry_run: bool,
    ) -> Result<DeleteResult, FormationError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if recurse {
            query.push(("recurse", "true"));
        }
        if dry_run {
            query.push(("dry_run", "true"));
        }

        let request = self.client.delete(self.data_url(path)).query(&query);
        let response = self.execute("/data/{path}", request).await?;
        Ok(response.json().await?)
    }
}

/// Strip the leading `/` and percent-encode each path segment.
pub fn encode_data_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A JSON body is a listing only when it decodes as the collection that was
/// asked for. Anything else is the content of a JSON data object.
fn listing_for(path: &str, body: &[u8]) -> Option<CollectionListing> {
    let listing: CollectionListing = serde_json::from_slice(body).ok()?;
    let is_collection = listing
        .node_type
        .as_deref()
        .map_or(true, |t| t == "collection");
    let same_path = listing.path.trim_matches('/') == path.trim_matches('/');
    (is_collection && same_path).then_some(listing)
}
