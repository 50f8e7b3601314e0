use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub realtime_vendor: String,
    /// Whether the realtime vendor has an API key configured
    pub credentials_configured: bool,
}

/// Liveness check with a summary of the realtime configuration.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
        realtime_vendor: state.config.realtime.vendor.to_string(),
        credentials_configured: state.config.has_realtime_credentials(),
    })
}
