use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::analysis::OnsetDetection;
use crate::audio::AudioFormat;
use crate::config::FEATURE_LAYOUT_VERSION;
use crate::error::{InferenceError, PipelineError};
use crate::inference::{ClassProbabilities, CoughClass};
use crate::pipeline::{Classification, CoughPipeline};

/// Upload size accepted by `/process-audio`.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub const WELCOME_TEXT: &str = "Welcome to the audio processing API!";

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<CoughPipeline>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<CoughPipeline>, request_timeout: Duration) -> Self {
        Self {
            pipeline,
            request_timeout,
        }
    }
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    BadRequest(String),
    /// Inference backend unreachable or not configured
    ServiceUnavailable(String),
    /// Inference backend answered with something unusable
    BadGateway(String),
    Timeout,
    Internal(String),
}

impl From<PipelineError> for HttpServerError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::Decode(_) => Self::BadRequest(err.to_string()),
            PipelineError::Inference(InferenceError::NotConfigured) => {
                Self::ServiceUnavailable(err.to_string())
            }
            PipelineError::Inference(inner) if inner.is_transient() => {
                Self::ServiceUnavailable(err.to_string())
            }
            PipelineError::Inference(_) => Self::BadGateway(err.to_string()),
            PipelineError::Filter(_)
            | PipelineError::InvalidConfig { .. }
            | PipelineError::EmptySegment { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "audio processing timed out".to_string(),
            ),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub feature_layout: &'static str,
    pub adapter: String,
}

/// Classification response payload. `result` carries the label.
#[derive(Debug, Serialize)]
pub struct ProcessAudioResponse {
    pub result: CoughClass,
    pub confidence: f32,
    pub probabilities: ClassProbabilities,
    pub onset: OnsetDetection,
}

impl From<Classification> for ProcessAudioResponse {
    fn from(classification: Classification) -> Self {
        Self {
            result: classification.label,
            confidence: classification.confidence,
            probabilities: classification.probabilities,
            onset: classification.report.onset,
        }
    }
}

/// Build the Axum router with all handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/process-audio", post(process_audio))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP router")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::info!("[HTTP] Shutdown signal received");
    }
}

pub async fn welcome() -> &'static str {
    WELCOME_TEXT
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        feature_layout: FEATURE_LAYOUT_VERSION,
        adapter: state.pipeline.adapter_name().to_string(),
    })
}

pub async fn process_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessAudioResponse>, HttpServerError> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| HttpServerError::BadRequest(format!("invalid multipart body: {}", err)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| HttpServerError::BadRequest(format!("reading upload: {}", err)))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| HttpServerError::BadRequest("No file part".to_string()))?;
    if file_name.as_deref().map_or(true, str::is_empty) {
        return Err(HttpServerError::BadRequest("No selected file".to_string()));
    }

    log::debug!(
        "[HTTP] /process-audio received {:?} ({} bytes)",
        file_name,
        bytes.len()
    );

    let pipeline = Arc::clone(&state.pipeline);
    let task = tokio::task::spawn_blocking(move || {
        pipeline.classify_bytes(&bytes, AudioFormat::Wav)
    });

    let classification = match tokio::time::timeout(state.request_timeout, task).await {
        Err(_) => {
            log::warn!(
                "[HTTP] /process-audio exceeded {:?}",
                state.request_timeout
            );
            return Err(HttpServerError::Timeout);
        }
        Ok(Err(join_err)) => {
            return Err(HttpServerError::Internal(format!(
                "pipeline task failed: {}",
                join_err
            )))
        }
        Ok(Ok(result)) => result?,
    };

    Ok(Json(classification.into()))
}
