use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::AppResult;
use crate::state::AppState;
use crate::store::FeedbackEntry;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// Missing text is treated as empty and rejected
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub rating: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<FeedbackEntry>)> {
    let entry = state
        .feedback
        .record(&request.feedback, request.rating.as_deref())?;
    Ok((StatusCode::CREATED, Json(entry)))
}
