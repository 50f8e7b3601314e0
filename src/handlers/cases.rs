use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::core::case::CaseRecord;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

pub async fn list_cases(State(state): State<Arc<AppState>>) -> Json<Vec<CaseRecord>> {
    Json(state.cases.list())
}

pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
) -> AppResult<Json<CaseRecord>> {
    state
        .cases
        .get(&case_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Case not found: {case_id}")))
}

/// Store a case. A missing `case_id` is replaced by a UUID.
pub async fn create_case(
    State(state): State<Arc<AppState>>,
    Json(case): Json<CaseRecord>,
) -> AppResult<(StatusCode, Json<CaseRecord>)> {
    let stored = state.cases.insert(case)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize)]
pub struct CriteriaUpdate {
    pub criteria: String,
}

pub async fn update_criteria(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
    Json(update): Json<CriteriaUpdate>,
) -> AppResult<Json<CaseRecord>> {
    let updated = state.cases.update_criteria(&case_id, update.criteria)?;
    info!(case_id = %case_id, "Assessment criteria replaced");
    Ok(Json(updated))
}
