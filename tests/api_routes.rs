//! REST route tests driven through the assembled router with `oneshot`.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use osce_gateway::ServerConfig;
use osce_gateway::core::case::CaseRecord;
use osce_gateway::core::llm::{ChatCompletion, ChatRequest, LlmError, LlmResult};
use osce_gateway::routes::create_app_router;
use osce_gateway::state::AppState;
use osce_gateway::store::MemoryCaseStore;

/// Answers every request with a fixed reply and keeps what it was asked.
struct ScriptedChat {
    reply: Result<String, u16>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(status),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
        self.requests.lock().push(request);
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(status) => Err(LlmError::Api {
                status: *status,
                message: "upstream exploded".to_string(),
            }),
        }
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn seed_case() -> CaseRecord {
    serde_json::from_value(json!({
        "case_id": "headache-01",
        "patient_name": "Mr Goh",
        "age": "34",
        "chief_complaint": "Headache",
        "secret_info": "Recently lost his job"
    }))
    .unwrap()
}

fn state_with(chat: Arc<ScriptedChat>) -> Arc<AppState> {
    let mut config = ServerConfig::default();
    config.openai_api_key = Some("test-key".to_string());
    AppState::with_components(
        config,
        Arc::new(MemoryCaseStore::with_cases(vec![seed_case()])),
        chat,
    )
}

async fn call(state: &Arc<AppState>, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = create_app_router(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_vendor_and_credentials() {
    let state = state_with(ScriptedChat::replying(""));
    let (status, body) = call(&state, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["realtime_vendor"], "openai");
    assert_eq!(body["credentials_configured"], true);
}

#[tokio::test]
async fn test_case_lifecycle() {
    let state = state_with(ScriptedChat::replying(""));

    let (status, body) = call(&state, Method::GET, "/api/cases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/cases",
        Some(json!({"patient_name": "Mdm Ong", "chief_complaint": "Cough", "ward": "B2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let new_id = body["case_id"].as_str().unwrap().to_string();
    assert!(!new_id.is_empty());
    assert_eq!(body["ward"], "B2");

    let (status, body) = call(&state, Method::GET, &format!("/api/cases/{new_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient_name"], "Mdm Ong");

    let (status, body) = call(
        &state,
        Method::PATCH,
        &format!("/api/cases/{new_id}/criteria"),
        Some(json!({"criteria": "Asks about smoking"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["custom_criteria"], "Asks about smoking");

    let (status, _) = call(&state, Method::GET, "/api/cases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.cases.len(), 2);
}

#[tokio::test]
async fn test_case_errors() {
    let state = state_with(ScriptedChat::replying(""));

    let (status, body) = call(&state, Method::GET, "/api/cases/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/cases",
        Some(json!({"case_id": "headache-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = call(
        &state,
        Method::PATCH,
        "/api/cases/missing/criteria",
        Some(json!({"criteria": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_uses_stored_case_and_dialect() {
    let chat = ScriptedChat::replying("Aiyah, my head very pain lah.");
    let state = state_with(chat.clone());

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/chat",
        Some(json!({
            "caseId": "headache-01",
            "dialectLevel": "high",
            "messages": [{"role": "user", "content": "What brings you in today?"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Aiyah, my head very pain lah.");

    let requests = chat.requests.lock();
    let request = &requests[0];
    assert_eq!(request.messages[0].role, "system");
    assert!(request.messages[0].content.contains("Mr Goh"));
    assert!(request.messages[0].content.contains("Recently lost his job"));
    assert_eq!(request.messages.last().unwrap().content, "What brings you in today?");
}

#[tokio::test]
async fn test_chat_requires_case_and_messages() {
    let state = state_with(ScriptedChat::replying("unused"));

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/chat",
        Some(json!({"messages": [{"role": "user", "content": "Hi"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = call(
        &state,
        Method::POST,
        "/api/chat",
        Some(json!({"caseId": "headache-01", "messages": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assess_sends_transcript() {
    let chat = ScriptedChat::replying("Overall score: 7/10");
    let state = state_with(chat.clone());

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/assess",
        Some(json!({
            "caseData": {"patient_name": "Mr Goh", "custom_criteria": "Screens for red flags"},
            "messages": [
                {"role": "user", "content": "Any vomiting?"},
                {"role": "assistant", "content": "No, doctor."}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assessment"], "Overall score: 7/10");

    let requests = chat.requests.lock();
    let prompt: String = requests[0]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(prompt.contains("Screens for red flags"));
    assert!(prompt.contains("Student: Any vomiting?"));
    assert!(prompt.contains("Patient: No, doctor."));
}

#[tokio::test]
async fn test_generate_case_parses_fenced_json() {
    let chat = ScriptedChat::replying(
        "```json\n{\"patient_name\": \"Mr Tan\", \"age\": 61, \"chief_complaint\": \"Breathlessness\"}\n```",
    );
    let state = state_with(chat.clone());

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/generate-case",
        Some(json!({"specialty": "Respiratory", "difficulty": "hard"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient_name"], "Mr Tan");
    assert_eq!(body["age"], "61");
    assert!(body["case_id"].as_str().unwrap().starts_with("generated-"));
    assert!(chat.requests.lock()[0].json_mode);

    // Generated cases are not stored
    assert_eq!(state.cases.len(), 1);
}

#[tokio::test]
async fn test_generate_case_rejects_non_json() {
    let state = state_with(ScriptedChat::replying("I cannot do that."));
    let (status, body) = call(&state, Method::POST, "/api/generate-case", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "upstream_error");
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let state = state_with(ScriptedChat::failing(500));
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/chat",
        Some(json!({"caseId": "headache-01", "messages": [{"role": "user", "content": "Hi"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn test_feedback_submission() {
    let state = state_with(ScriptedChat::replying(""));

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/feedback",
        Some(json!({"feedback": "Patient felt very real"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rating"], "Good");
    assert!(body["timestamp"].is_string());

    let (status, body) = call(&state, Method::POST, "/api/feedback", Some(json!({"feedback": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Feedback text is required");

    let (status, _) = call(&state, Method::POST, "/api/feedback", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(state.feedback.len(), 1);
}
