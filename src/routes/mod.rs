use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub mod api;
pub mod realtime;

/// REST and relay routes bound to `state`.
///
/// Cross-cutting layers (CORS, rate limiting, security headers) are added by
/// the binary.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(realtime::create_realtime_router(state.clone()))
        .with_state(state)
}
