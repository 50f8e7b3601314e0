//! Text chat, transcript assessment and case generation.
//!
//! Each endpoint makes exactly one chat-completion call. A missing API key
//! answers 503, any failure of the API itself answers 502.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::core::case::{CaseRecord, ConversationMessage, DialectLevel};
use crate::core::prompts::{
    GenerationOptions, assessment_request, chat_request, generation_request, parse_generated_case,
};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Body shared by `/api/chat` and `/api/assess`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    #[serde(default)]
    pub case_data: Option<CaseRecord>,
    /// Looked up in the case store when `caseData` is absent
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub dialect_level: Option<String>,
}

impl ConversationRequest {
    fn resolve_case(&mut self, state: &AppState) -> AppResult<CaseRecord> {
        if let Some(case) = self.case_data.take() {
            return Ok(case);
        }
        match self.case_id.as_deref() {
            Some(id) => state
                .cases
                .get(id)
                .ok_or_else(|| AppError::NotFound(format!("Case not found: {id}"))),
            None => Err(AppError::BadRequest(
                "caseData or caseId is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<ConversationRequest>,
) -> AppResult<Json<ChatReply>> {
    let case = request.resolve_case(&state)?;
    if request.messages.is_empty() {
        return Err(AppError::BadRequest(
            "messages must contain at least one message".to_string(),
        ));
    }

    let dialect = DialectLevel::resolve(request.dialect_level.as_deref(), &case);
    let reply = state
        .chat
        .complete(chat_request(&case, Some(dialect), &request.messages))
        .await?;

    Ok(Json(ChatReply { reply }))
}

#[derive(Debug, Serialize)]
pub struct AssessmentReply {
    pub assessment: String,
}

pub async fn assess(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<ConversationRequest>,
) -> AppResult<Json<AssessmentReply>> {
    let case = request.resolve_case(&state)?;

    let assessment = state
        .chat
        .complete(assessment_request(&case, &request.messages))
        .await?;

    info!(
        case_id = %case.id(),
        messages = request.messages.len(),
        "Assessment generated"
    );
    Ok(Json(AssessmentReply { assessment }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCaseRequest {
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub dialect_level: Option<String>,
}

/// Draft a new case. The result is returned, not stored.
pub async fn generate_case(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateCaseRequest>,
) -> AppResult<Json<CaseRecord>> {
    let options = GenerationOptions {
        specialty: request.specialty,
        chief_complaint: request.chief_complaint,
        difficulty: request.difficulty,
        dialect: request.dialect_level.as_deref().and_then(DialectLevel::parse),
    };

    let text = state.chat.complete(generation_request(&options)).await?;
    let case = parse_generated_case(&text)?;

    info!(case_id = %case.id(), "Case generated");
    Ok(Json(case))
}
