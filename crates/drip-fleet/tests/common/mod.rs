//! In-process ingestion backend for integration tests
//!
//! Records every request and answers with scripted responses.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const API_PREFIX: &str = "/agent/v1";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<Recorded>>,
    tokens: Mutex<HashMap<String, String>>,
    broken_inits: Mutex<HashSet<String>>,
    report_script: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
}

#[derive(Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
    pub api_root: String,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().fallback(handle).with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            api_root: format!("http://{}{}", addr, API_PREFIX),
        }
    }

    /// Token handed out when `app` registers; defaults to `token-<app>`
    pub fn set_token(&self, app: &str, token: &str) {
        self.state.tokens.lock().insert(app.to_string(), token.to_string());
    }

    /// Make `/init` for `app` answer with a body that is not JSON
    pub fn break_init(&self, app: &str) {
        self.state.broken_inits.lock().insert(app.to_string());
    }

    /// Queue the next report response for the session holding `token`
    pub fn script_report(&self, token: &str, status: u16, body: Value) {
        self.state
            .report_script
            .lock()
            .entry(token.to_string())
            .or_default()
            .push_back((status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    /// Report bodies sent with `token`, oldest first
    pub fn reports_with_token(&self, token: &str) -> Vec<Value> {
        self.requests_to("/v7/data")
            .into_iter()
            .filter(|r| r.header("x-auth-token") == Some(token))
            .map(|r| r.body)
            .collect()
    }

    /// Poll until `done` holds or `timeout` passes
    pub async fn wait_for(&self, timeout: Duration, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if done(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        done(self)
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let recorded = Recorded {
        path: path.clone(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    let app = recorded.header("x-app-name").unwrap_or("").to_string();
    let token = recorded.header("x-auth-token").unwrap_or("").to_string();
    state.requests.lock().push(recorded);

    match path.as_str() {
        "/init" => {
            if state.broken_inits.lock().contains(&app) {
                return (StatusCode::OK, "<html>oops</html>".to_string());
            }
            let token = state
                .tokens
                .lock()
                .get(&app)
                .cloned()
                .unwrap_or_else(|| format!("token-{}", app));
            (StatusCode::OK, json!({ "authtoken": token }).to_string())
        }
        "/moduleUpdate" => (StatusCode::OK, "{\"status\":\"ok\"}".to_string()),
        "/v7/data" => {
            let scripted = state
                .report_script
                .lock()
                .get_mut(&token)
                .and_then(VecDeque::pop_front);
            match scripted {
                Some((status, body)) => (
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    body,
                ),
                None => (StatusCode::OK, "{}".to_string()),
            }
        }
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}
