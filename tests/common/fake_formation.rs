//! In-process fake of the Formation REST API
//!
//! Serves a small fixed app catalog, one launchable analysis with a
//! scriptable status sequence, and an in-memory data store. Every request
//! is recorded so tests can assert on paths, queries and headers.

use super::constants::*;
use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use formation_mcp::{Credentials, FormationClient};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// A request as the fake saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Raw (still percent-encoded) path.
    pub path: String,
    pub query: Option<String>,
    /// Lowercase header name -> value.
    pub headers: BTreeMap<String, String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct FakeNode {
    collection: bool,
    content: Vec<u8>,
    metadata: BTreeMap<String, String>,
}

impl FakeNode {
    fn collection() -> Self {
        Self {
            collection: true,
            content: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn object(content: &[u8]) -> Self {
        Self {
            collection: false,
            content: content.to_vec(),
            metadata: BTreeMap::new(),
        }
    }

    fn type_name(&self) -> &'static str {
        if self.collection {
            "collection"
        } else {
            "data_object"
        }
    }
}

/// Knobs for [`FakeFormation::spawn_with`].
#[derive(Debug, Clone)]
pub struct FakeOptions {
    /// `expires_in` returned by `/login`; `None` omits the field.
    pub expires_in: Option<i64>,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            expires_in: Some(3600),
        }
    }
}

struct FakeState {
    options: FakeOptions,
    logins: AtomicUsize,
    status_polls: AtomicUsize,
    mutations: AtomicUsize,
    tokens: Mutex<HashSet<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    status_script: Mutex<VecDeque<Value>>,
    last_launch: Mutex<Option<Value>>,
    data: Mutex<BTreeMap<String, FakeNode>>,
}

impl FakeState {
    fn new(options: FakeOptions) -> Self {
        let mut data = BTreeMap::new();
        data.insert(HOME_DIR.to_string(), FakeNode::collection());
        let mut notes = FakeNode::object(NOTES_CONTENT.as_bytes());
        notes
            .metadata
            .insert("author".to_string(), TEST_USER.to_string());
        data.insert(NOTES_FILE.to_string(), notes);
        data.insert(PROJECT_DIR.to_string(), FakeNode::collection());
        data.insert(PROJECT_FILE.to_string(), FakeNode::object(b"a,b\n1,2\n"));
        data.insert(
            format!("{}/image.bin", HOME_DIR),
            FakeNode::object(&[0xff, 0xfe, 0x00, 0x01]),
        );

        Self {
            options,
            logins: AtomicUsize::new(0),
            status_polls: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
            tokens: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
            status_script: Mutex::new(VecDeque::new()),
            last_launch: Mutex::new(None),
            data: Mutex::new(data),
        }
    }
}

/// Running fake service
///
/// When dropped, the server shuts down.
pub struct FakeFormation {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    state: Arc<FakeState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeFormation {
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeOptions::default()).await
    }

    pub async fn spawn_with(options: FakeOptions) -> Self {
        let state = Arc::new(FakeState::new(options));
        let app = make_fake_app(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Formation listener");
        let port = listener.local_addr().expect("No local address").port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake Formation server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Client that logs in as the test user.
    pub fn login_client(&self) -> FormationClient {
        FormationClient::new(
            &self.base_url,
            Credentials::login(TEST_USER, TEST_PASS),
            Duration::from_secs(5),
        )
        .expect("Failed to build client")
    }

    /// Client holding the fake's static token.
    pub fn token_client(&self) -> FormationClient {
        FormationClient::new(
            &self.base_url,
            Credentials::token(STATIC_TOKEN),
            Duration::from_secs(5),
        )
        .expect("Failed to build client")
    }

    /// Status bodies returned by successive polls; afterwards polls report
    /// a running analysis without URL.
    pub fn script_statuses(&self, statuses: Vec<Value>) {
        *self.state.status_script.lock().unwrap() = statuses.into();
    }

    pub fn logins(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn status_polls(&self) -> usize {
        self.state.status_polls.load(Ordering::SeqCst)
    }

    /// Launches, control operations and data-store writes/deletes.
    pub fn mutations(&self) -> usize {
        self.state.mutations.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Most recent request whose raw path starts with `prefix`.
    pub fn last_request_to(&self, prefix: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.path.starts_with(prefix))
    }

    pub fn last_launch_body(&self) -> Option<Value> {
        self.state.last_launch.lock().unwrap().clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.data.lock().unwrap().contains_key(path)
    }

    pub fn is_collection(&self, path: &str) -> bool {
        self.state
            .data
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|n| n.collection)
    }

    pub fn content_of(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .data
            .lock()
            .unwrap()
            .get(path)
            .map(|n| n.content.clone())
    }

    pub fn metadata_of(&self, path: &str) -> BTreeMap<String, String> {
        self.state
            .data
            .lock()
            .unwrap()
            .get(path)
            .map(|n| n.metadata.clone())
            .unwrap_or_default()
    }
}

/// Status body for scripting polls.
pub fn status_body(status: &str, url_ready: bool, url: Option<&str>) -> Value {
    let mut body = json!({
        "analysis_id": LAUNCHED_ANALYSIS_ID,
        "status": status,
        "url_ready": url_ready,
    });
    if let Some(url) = url {
        body["url"] = json!(url);
    }
    body
}

fn make_fake_app(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/apps", get(list_apps))
        .route("/apps/{system_id}/{app_id}/parameters", get(app_parameters))
        .route("/app/launch/{system_id}/{app_id}", post(launch))
        .route("/apps/analyses/", get(list_analyses))
        .route("/apps/analyses/{analysis_id}/status", get(analysis_status))
        .route("/apps/analyses/{analysis_id}/control", post(control))
        .route(
            "/data/{*path}",
            get(get_data).put(put_data).delete(delete_data),
        )
        .layer(middleware::from_fn_with_state(state.clone(), record_and_guard))
        .with_state(state)
}

// ============================================================================
// Middleware
// ============================================================================

async fn record_and_guard(
    State(state): State<Arc<FakeState>>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect::<BTreeMap<_, _>>();
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        headers,
    };
    let is_login = recorded.path == "/login";
    let bearer = recorded
        .header("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.requests.lock().unwrap().push(recorded);

    if !is_login {
        let authorized = match bearer {
            Some(token) => {
                token == STATIC_TOKEN || state.tokens.lock().unwrap().contains(&token)
            }
            None => false,
        };
        if !authorized {
            return (StatusCode::UNAUTHORIZED, "missing or invalid token").into_response();
        }
    }

    next.run(request).await
}

// ============================================================================
// Login and apps
// ============================================================================

async fn login(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if authorization != Some(TEST_BASIC_AUTH) {
        return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }

    let n = state.logins.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("token-{}", n);
    state.tokens.lock().unwrap().insert(token.clone());

    let mut body = json!({"access_token": token, "token_type": "bearer"});
    if let Some(expires_in) = state.options.expires_in {
        body["expires_in"] = json!(expires_in);
    }
    Json(body).into_response()
}

fn catalog() -> Vec<Value> {
    vec![
        json!({
            "id": INTERACTIVE_APP_ID,
            "name": "JupyterLab",
            "system_id": SYSTEM_ID,
            "integrator_username": "admin",
            "description": "Interactive notebooks",
            "overall_job_type": "Interactive"
        }),
        json!({
            "id": NEEDS_INPUT_APP_ID,
            "name": "RStudio Input",
            "system_id": SYSTEM_ID,
            "overall_job_type": "Interactive"
        }),
        json!({
            "id": BATCH_APP_ID,
            "name": "Word Count",
            "system_id": SYSTEM_ID,
            "description": "Counts words",
            "overall_job_type": "Executable"
        }),
    ]
}

async fn list_apps(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let name = query.get("name").map(|n| n.to_lowercase());
    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(10);
    let offset = query
        .get("offset")
        .and_then(|o| o.parse::<usize>().ok())
        .unwrap_or(0);

    let matching: Vec<Value> = catalog()
        .into_iter()
        .filter(|app| match &name {
            Some(name) => app["name"]
                .as_str()
                .is_some_and(|n| n.to_lowercase().contains(name)),
            None => true,
        })
        .collect();
    let total = matching.len();
    let page: Vec<Value> = matching.into_iter().skip(offset).take(limit).collect();
    Json(json!({"total": total, "apps": page}))
}

async fn app_parameters(Path((system_id, app_id)): Path<(String, String)>) -> Response {
    if system_id != SYSTEM_ID {
        return (StatusCode::NOT_FOUND, "unknown system").into_response();
    }
    let body = match app_id.as_str() {
        INTERACTIVE_APP_ID => json!({
            "overall_job_type": "Interactive",
            "groups": [{
                "name": "Options",
                "parameters": [
                    {"id": "theme", "name": "Theme", "type": "Text", "required": false, "defaultValue": "dark"},
                    {"id": "internal", "type": "Text", "required": true, "isVisible": false}
                ]
            }]
        }),
        NEEDS_INPUT_APP_ID => json!({
            "overall_job_type": "Interactive",
            "groups": [{
                "name": "Inputs",
                "parameters": [
                    {"id": "input_file", "name": "Input File", "type": "FileInput", "required": true, "description": "File to analyse"},
                    {"id": "threads", "name": "Threads", "type": "Integer", "required": false}
                ]
            }]
        }),
        BATCH_APP_ID => json!({
            "overall_job_type": "Executable",
            "groups": []
        }),
        _ => return (StatusCode::NOT_FOUND, "unknown app").into_response(),
    };
    Json(body).into_response()
}

// ============================================================================
// Analyses
// ============================================================================

async fn launch(
    State(state): State<Arc<FakeState>>,
    Path((_system_id, _app_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.mutations.fetch_add(1, Ordering::SeqCst);
    let name = body.get("name").cloned().unwrap_or(Value::Null);
    *state.last_launch.lock().unwrap() = Some(body);
    Json(json!({
        "analysis_id": LAUNCHED_ANALYSIS_ID,
        "name": name,
        "status": "Submitted"
    }))
}

async fn analysis_status(
    State(state): State<Arc<FakeState>>,
    Path(analysis_id): Path<String>,
) -> Response {
    if analysis_id != LAUNCHED_ANALYSIS_ID {
        return (StatusCode::NOT_FOUND, "analysis not found").into_response();
    }
    state.status_polls.fetch_add(1, Ordering::SeqCst);
    let next = state.status_script.lock().unwrap().pop_front();
    Json(next.unwrap_or_else(|| status_body("Running", false, None))).into_response()
}

async fn list_analyses(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let all = [
        json!({"analysis_id": LAUNCHED_ANALYSIS_ID, "app_id": INTERACTIVE_APP_ID, "system_id": SYSTEM_ID, "name": "notebook", "status": "Running"}),
        json!({"analysis_id": "analysis-2", "app_id": BATCH_APP_ID, "system_id": SYSTEM_ID, "status": "Completed"}),
    ];
    let analyses: Vec<Value> = all
        .into_iter()
        .filter(|a| match query.get("status") {
            Some(status) => a["status"].as_str() == Some(status.as_str()),
            None => true,
        })
        .collect();
    Json(json!({"analyses": analyses}))
}

async fn control(
    State(state): State<Arc<FakeState>>,
    Path(analysis_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if analysis_id != LAUNCHED_ANALYSIS_ID {
        return (StatusCode::NOT_FOUND, "analysis not found").into_response();
    }
    state.mutations.fetch_add(1, Ordering::SeqCst);
    match query.get("operation").map(String::as_str) {
        Some("extend_time") => Json(json!({
            "analysis_id": analysis_id,
            "time_limit": "2026-10-20T12:00:00Z"
        }))
        .into_response(),
        Some("save_and_exit") | Some("exit") => StatusCode::OK.into_response(),
        _ => (StatusCode::BAD_REQUEST, "unknown operation").into_response(),
    }
}

// ============================================================================
// Data store
// ============================================================================

fn flag(query: &HashMap<String, String>, name: &str) -> bool {
    query.get(name).map(String::as_str) == Some("true")
}

fn descendants<'a>(
    data: &'a BTreeMap<String, FakeNode>,
    path: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    let prefix = format!("{}/", path);
    data.keys().filter(move |k| k.starts_with(&prefix))
}

async fn get_data(
    State(state): State<Arc<FakeState>>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let key = format!("/{}", path);
    let data = state.data.lock().unwrap();
    let Some(node) = data.get(&key) else {
        return (StatusCode::NOT_FOUND, "path not found").into_response();
    };

    if node.collection {
        let prefix = format!("{}/", key);
        let contents: Vec<Value> = descendants(&data, &key)
            .filter_map(|child| {
                let name = child.strip_prefix(&prefix)?;
                if name.contains('/') {
                    return None;
                }
                Some(json!({"name": name, "type": data[child].type_name()}))
            })
            .collect();
        return Json(json!({"path": key, "type": "collection", "contents": contents}))
            .into_response();
    }

    let mut headers = HeaderMap::new();
    let content_type = if key.ends_with(".json") {
        "application/json"
    } else if std::str::from_utf8(&node.content).is_ok() {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    };
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if flag(&query, "include_metadata") {
        for (attribute, value) in &node.metadata {
            let name = HeaderName::from_bytes(format!("x-datastore-{}", attribute).as_bytes())
                .expect("valid header name");
            headers.insert(name, HeaderValue::from_str(value).expect("valid header value"));
        }
    }
    (StatusCode::OK, headers, node.content.clone()).into_response()
}

async fn put_data(
    State(state): State<Arc<FakeState>>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = format!("/{}", path);
    let metadata: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            let attribute = name.as_str().strip_prefix("x-datastore-")?;
            Some((attribute.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();

    let mut data = state.data.lock().unwrap();
    let existed = data.contains_key(&key);
    let directory = query.get("resource_type").map(String::as_str) == Some("directory");

    if !existed && !directory && body.is_empty() {
        return (StatusCode::NOT_FOUND, "path not found").into_response();
    }

    let node = data.entry(key.clone()).or_insert_with(|| {
        if directory {
            FakeNode::collection()
        } else {
            FakeNode::object(&[])
        }
    });
    if !node.collection && !body.is_empty() {
        node.content = body.to_vec();
    }
    if flag(&query, "replace_metadata") {
        node.metadata = metadata;
    } else {
        node.metadata.extend(metadata);
    }
    let node_type = node.type_name();
    drop(data);

    state.mutations.fetch_add(1, Ordering::SeqCst);
    Json(json!({"path": key, "type": node_type, "created": !existed})).into_response()
}

async fn delete_data(
    State(state): State<Arc<FakeState>>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let key = format!("/{}", path);
    let recurse = flag(&query, "recurse");
    let dry_run = flag(&query, "dry_run");

    let mut data = state.data.lock().unwrap();
    let Some(node) = data.get(&key) else {
        return (StatusCode::NOT_FOUND, "path not found").into_response();
    };
    let node_type = node.type_name();
    let children: Vec<String> = descendants(&data, &key).cloned().collect();
    let blocked = node.collection && !children.is_empty() && !recurse;

    if dry_run {
        return Json(json!({
            "path": key,
            "type": node_type,
            "dry_run": true,
            "would_delete": !blocked,
            "item_count": children.len() + 1
        }))
        .into_response();
    }
    if blocked {
        return (StatusCode::CONFLICT, "collection is not empty").into_response();
    }

    for child in children {
        data.remove(&child);
    }
    data.remove(&key);
    drop(data);

    state.mutations.fetch_add(1, Ordering::SeqCst);
    Json(json!({"path": key, "type": node_type, "deleted": true})).into_response()
}
