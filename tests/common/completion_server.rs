//! In-process OpenAI-style completion server for `HttpEngine` tests
//!
//! Runs an axum router on its own multi-threaded runtime, so the engine's
//! blocking client can be driven from a plain `#[test]`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

/// How `/v1/completions` answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// One choice per prompt and sample
    Complete,
    /// One choice short of `prompts * n`
    DropLastChoice,
    /// HTTP 500 with a text body
    Fail,
}

#[derive(Clone)]
struct ServerState {
    model: String,
    mode: ServerMode,
    requests: Arc<Mutex<Vec<Value>>>,
    resets: Arc<AtomicUsize>,
}

pub struct CompletionServer {
    addr: SocketAddr,
    state: ServerState,
    // Dropping the runtime stops the server
    _runtime: Runtime,
}

impl CompletionServer {
    /// Serve `model` on an ephemeral localhost port
    pub fn start(model: &str, mode: ServerMode) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let state = ServerState {
            model: model.to_string(),
            mode,
            requests: Arc::new(Mutex::new(Vec::new())),
            resets: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new()
            .route("/v1/models", get(models_handler))
            .route("/v1/completions", post(completions_handler))
            .route("/reset_prefix_cache", post(reset_handler))
            .with_state(state.clone());

        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        runtime.spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        CompletionServer {
            addr,
            state,
            _runtime: runtime,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bodies received on `/v1/completions`, in order
    pub fn completion_requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.state.resets.load(Ordering::SeqCst)
    }
}

async fn models_handler(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": state.model, "object": "model"}]
    }))
}

async fn completions_handler(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    state.requests.lock().unwrap().push(body.clone());
    if state.mode == ServerMode::Fail {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "engine crashed".to_string(),
        ));
    }

    let prompts = body["prompt"].as_array().map(Vec::len).unwrap_or(0);
    let n = body["n"].as_u64().unwrap_or(1) as usize;
    let max_tokens = body["max_tokens"].as_u64().unwrap_or(0);
    let mut count = prompts * n;
    if state.mode == ServerMode::DropLastChoice {
        count = count.saturating_sub(1);
    }

    let choices: Vec<Value> = (0..count)
        .map(|index| json!({"index": index, "text": " tok", "finish_reason": "length"}))
        .collect();
    Ok(Json(json!({
        "id": "cmpl-test",
        "object": "text_completion",
        "choices": choices,
        "usage": {"completion_tokens": max_tokens * count as u64}
    })))
}

async fn reset_handler(State(state): State<ServerState>) -> StatusCode {
    state.resets.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}
