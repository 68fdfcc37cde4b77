//! Common test utilities for courier integration tests
//!
//! Provides an in-process topic service with per-topic queues, bound to an
//! ephemeral port.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub const TOKEN: &str = "sub-0001";

#[derive(Default)]
pub struct ServerState {
    queues: Mutex<HashMap<String, VecDeque<Value>>>,
    subscriptions: Mutex<Vec<String>>,
    pulls: AtomicUsize,
    /// Forced status for /subscribe (0 = normal behavior)
    subscribe_status: AtomicU16,
}

#[derive(Deserialize)]
struct PublishQuery {
    #[serde(rename = "topicId")]
    topic_id: String,
}

#[derive(Deserialize)]
struct PullQuery {
    #[serde(rename = "topicId")]
    topic_id: String,
    #[serde(rename = "subscriberId", default)]
    subscriber_id: String,
}

async fn subscribe(
    State(state): State<Arc<ServerState>>,
    Json(topics): Json<Vec<String>>,
) -> Response {
    let forced = state.subscribe_status.load(Ordering::SeqCst);
    if forced != 0 {
        let status = StatusCode::from_u16(forced).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "subscription refused").into_response();
    }

    state.subscriptions.lock().unwrap().extend(topics);
    (StatusCode::CREATED, Json(json!({ "token": TOKEN }))).into_response()
}

async fn publish(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PublishQuery>,
    Json(message): Json<Value>,
) -> StatusCode {
    state
        .queues
        .lock()
        .unwrap()
        .entry(query.topic_id)
        .or_default()
        .push_back(message);
    StatusCode::CREATED
}

async fn pull(State(state): State<Arc<ServerState>>, Query(query): Query<PullQuery>) -> Response {
    state.pulls.fetch_add(1, Ordering::SeqCst);

    if query.subscriber_id != TOKEN {
        return (StatusCode::FORBIDDEN, "unknown subscriber").into_response();
    }

    let next = state
        .queues
        .lock()
        .unwrap()
        .get_mut(&query.topic_id)
        .and_then(|q| q.pop_front());

    match next {
        Some(message) => (StatusCode::OK, Json(message)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// A mock topic service running on an ephemeral port
pub struct MockTopicServer {
    pub url: String,
    pub state: Arc<ServerState>,
    shutdown_token: CancellationToken,
}

impl MockTopicServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());

        let app = Router::new()
            .route("/subscribe", post(subscribe))
            .route("/publish", post(publish))
            .route("/pull", get(pull))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let shutdown_token = CancellationToken::new();
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                token.cancelled().await;
            });
            if let Err(e) = server.await {
                eprintln!("Mock topic server error: {:?}", e);
            }
        });

        Self {
            url: format!("http://127.0.0.1:{}", port),
            state,
            shutdown_token,
        }
    }

    pub fn enqueue(&self, topic: &str, key: &str, value: Value) {
        self.state
            .queues
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .push_back(json!({ "key": key, "value": value }));
    }

    pub fn queued(&self, topic: &str) -> usize {
        self.state
            .queues
            .lock()
            .unwrap()
            .get(topic)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub fn pull_count(&self) -> usize {
        self.state.pulls.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().unwrap().clone()
    }

    pub fn refuse_subscriptions(&self, status: u16) {
        self.state.subscribe_status.store(status, Ordering::SeqCst);
    }
}

impl Drop for MockTopicServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

/// Poll `condition` until it holds or `max_wait` elapses.
pub async fn wait_until(max_wait: Duration, condition: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    loop {
        if condition() {
            return true;
        }
        if start.elapsed() > max_wait {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// A URL nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
