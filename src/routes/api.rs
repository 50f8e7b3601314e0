use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, cases, chat, feedback};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST router
///
/// Rate limiting and CORS are applied in main.rs around the merged router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/api/health", get(api::health_check))
        .route("/api/cases", get(cases::list_cases).post(cases::create_case))
        .route("/api/cases/{case_id}", get(cases::get_case))
        .route("/api/cases/{case_id}/criteria", patch(cases::update_criteria))
        .route("/api/chat", post(chat::chat))
        .route("/api/assess", post(chat::assess))
        .route("/api/generate-case", post(chat::generate_case))
        .route("/api/feedback", post(feedback::submit_feedback))
        .layer(TraceLayer::new_for_http())
}
