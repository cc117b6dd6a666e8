//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use prompt_gateway::config::GatewayConfig;
use prompt_gateway::{GatewayServer, Shutdown};

/// Programmable stand-in for an Ollama-style inference backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub received: Arc<Mutex<Vec<(String, String)>>>,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
}

impl MockBackend {
    /// Status returned by both endpoints; 200 unless set.
    pub fn fail_with(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// `(model, prompt)` pairs received so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.received.lock().unwrap().clone()
    }

    async fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn failure(&self) -> Option<Response> {
        match self.status.load(Ordering::SeqCst) {
            0 | 200 => None,
            code => {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Some((status, "backend failure").into_response())
            }
        }
    }
}

async fn mock_generate(State(mock): State<MockBackend>, Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    assert_eq!(body["stream"], json!(false), "gateway must request a single document");
    mock.received.lock().unwrap().push((model.clone(), prompt.clone()));

    mock.pause().await;
    if let Some(failure) = mock.failure() {
        return failure;
    }

    Json(json!({
        "model": model,
        "created_at": "2024-01-01T00:00:00Z",
        "response": format!("echo: {prompt}"),
        "done": true
    }))
    .into_response()
}

async fn mock_tags(State(mock): State<MockBackend>) -> Response {
    mock.pause().await;
    if let Some(failure) = mock.failure() {
        return failure;
    }

    Json(json!({
        "models": [
            {
                "name": "llama2:latest",
                "size": 3826793677u64,
                "digest": "78e26419b446",
                "modified_at": "2024-01-01T00:00:00Z",
                "details": { "family": "llama" }
            },
            { "name": "mistral:7b" }
        ]
    }))
    .into_response()
}

/// Start the mock backend on an ephemeral port.
pub async fn start_mock_backend() -> (SocketAddr, MockBackend) {
    let mock = MockBackend::default();
    let app = Router::new()
        .route("/api/generate", post(mock_generate))
        .route("/api/tags", get(mock_tags))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, mock)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Gateway configuration pointing at `backend`.
pub fn gateway_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backend.base_url = format!("http://{backend}");
    config.backend.timeout_ms = 2_000;
    config
}

/// A running gateway. Dropping it shuts the server down.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let server = GatewayServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGateway { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
