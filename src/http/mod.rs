//! HTTP surface for the cough classifier, built with the `http` feature.
//!
//! Serves the pipeline behind an Axum router: a welcome text at `/`, a health
//! probe and the multipart upload endpoint `/process-audio`.

mod routes;

pub use routes::{build_router, run_http_server, AppState, HttpServerError};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use crate::pipeline::CoughPipeline;

/// Listen address used when `COUGH_HTTP_ADDR` is unset or invalid.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:5003";

/// Resolve the listen address from `COUGH_HTTP_ADDR`.
pub fn resolve_addr() -> SocketAddr {
    let fallback = SocketAddr::from(([0, 0, 0, 0], 5003));
    match std::env::var("COUGH_HTTP_ADDR") {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!(
                "[HTTP] Ignoring invalid COUGH_HTTP_ADDR {:?}; using {}",
                value, DEFAULT_HTTP_ADDR
            );
            fallback
        }),
        Err(_) => fallback,
    }
}

/// Run the server on a dedicated multi-threaded runtime until it stops.
///
/// The pipeline is built by the caller outside the runtime, since the
/// blocking inference client must not be created or dropped on an async
/// worker.
pub fn serve_blocking(
    pipeline: Arc<CoughPipeline>,
    addr: SocketAddr,
    request_timeout: Duration,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime for HTTP server")?;

    info!(
        "[HTTP] Serving on {} (adapter {}, request timeout {:?})",
        addr,
        pipeline.adapter_name(),
        request_timeout
    );

    let state = AppState::new(pipeline, request_timeout);
    runtime.block_on(run_http_server(state, addr))
}
