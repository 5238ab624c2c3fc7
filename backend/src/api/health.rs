//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub gvmd_version: Option<String>,
    pub sessions: usize,
}

/// Health check - always returns OK if the server is running
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - verifies gvmd answers on its socket
async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    let gvmd_version = match state.connector.connect(None).get_version().await {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::warn!(error = %e, "gvmd is not reachable");
            None
        }
    };

    Json(ReadyResponse {
        ready: gvmd_version.is_some(),
        gvmd_version,
        sessions: state.sessions.len(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
