//! Liveness and readiness probe.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ready: bool,
    pub version: &'static str,
    pub uptime: u64,
    pub sessions: usize,
    pub checks: HealthChecks,
}

/// GET /api/health
///
/// Answers 503 while the database does not respond.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let database = match state.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check: database unreachable");
            false
        }
    };

    let body = HealthResponse {
        ready: database,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.start_time.elapsed().as_secs(),
        sessions: state.sessions().len().await,
        checks: HealthChecks { database },
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ApiResponse::success(body))).into_response()
}
