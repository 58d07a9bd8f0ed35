use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::diagnostics::DiagnosticsSnapshot;
use crate::dispatch::{DispatchResponse, Dispatcher, SessionState};
use crate::engine::EntryPoint;

use super::sse;

const API_ENDPOINT: &str = "/api/nal2/process";

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    port: u16,
}

impl HttpState {
    pub fn new(dispatcher: Arc<Dispatcher>, port: u16) -> Self {
        Self { dispatcher, port }
    }
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Engine section of the health payload.
#[derive(Debug, Serialize)]
pub struct EngineHealth {
    pub ready: bool,
    pub description: Option<String>,
    pub exposed: usize,
    pub missing: usize,
    pub error: Option<String>,
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub server: &'static str,
    pub port: u16,
    #[serde(rename = "apiEndpoint")]
    pub api_endpoint: &'static str,
    pub engine: EngineHealth,
}

/// Setter-style acknowledgement payload.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health).options(preflight))
        .route(API_ENDPOINT, post(process).options(preflight))
        .route(
            "/api/nal2/session",
            get(session).delete(clear_session).options(preflight),
        )
        .route("/logs", get(logs).options(preflight))
        .route("/logs/stream", get(log_stream_handler))
        .layer(middleware::map_response(with_cors))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: HttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding NAL2 HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving NAL2 HTTP router")?;
    Ok(())
}

async fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"))],
    )
}

pub async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    let context = Arc::clone(state.dispatcher.facade().context());
    let engine = tokio::task::spawn_blocking(move || match context.engine() {
        Ok(handle) => {
            let capabilities = handle.capabilities();
            EngineHealth {
                ready: true,
                description: Some(handle.describe()),
                exposed: capabilities.len(),
                missing: EntryPoint::ALL.len() - capabilities.len(),
                error: None,
            }
        }
        Err(err) => EngineHealth {
            ready: false,
            description: None,
            exposed: 0,
            missing: EntryPoint::ALL.len(),
            error: Some(err.to_string()),
        },
    })
    .await
    .unwrap_or_else(|err| EngineHealth {
        ready: false,
        description: None,
        exposed: 0,
        missing: EntryPoint::ALL.len(),
        error: Some(err.to_string()),
    });

    Json(HealthResponse {
        status: "ok",
        message: "Server is running",
        server: "NAL2 Bridge",
        port: state.port,
        api_endpoint: API_ENDPOINT,
        engine,
    })
}

/// Engine calls block, so each request runs on the blocking pool.
pub async fn process(
    State(state): State<HttpState>,
    body: String,
) -> Result<Json<DispatchResponse>, HttpServerError> {
    let dispatcher = Arc::clone(&state.dispatcher);
    let response = tokio::task::spawn_blocking(move || dispatcher.handle_json(&body))
        .await
        .map_err(|err| HttpServerError::Internal(format!("dispatch task failed: {}", err)))?;
    Ok(Json(response))
}

pub async fn session(State(state): State<HttpState>) -> Result<Json<SessionState>, HttpServerError> {
    state
        .dispatcher
        .session()
        .map(Json)
        .map_err(|err| HttpServerError::Internal(err.to_string()))
}

pub async fn clear_session(State(state): State<HttpState>) -> Result<Json<Ack>, HttpServerError> {
    state
        .dispatcher
        .clear_session()
        .map_err(|err| HttpServerError::Internal(err.to_string()))?;
    Ok(Json(Ack { success: true }))
}

pub async fn logs(State(state): State<HttpState>) -> Json<DiagnosticsSnapshot> {
    Json(state.dispatcher.facade().context().sink().snapshot())
}

pub async fn log_stream_handler(State(state): State<HttpState>) -> sse::LogStream {
    sse::log_events(state.dispatcher.facade().context().sink())
}
