//! Prompt builders for text chat, transcript assessment and case generation.

use super::case::{CaseRecord, ConversationMessage, DialectLevel, MessageRole};
use super::instructions::build_instructions;
use super::llm::{ChatMessage, ChatRequest, LlmError, LlmResult};

/// Tokens allowed for an assessment report.
pub const ASSESSMENT_MAX_TOKENS: u32 = 1500;

/// Tokens allowed for a generated case.
pub const GENERATION_MAX_TOKENS: u32 = 2000;

/// Rubric used when a case has no custom criteria.
pub const DEFAULT_CRITERIA: &str = "\
1. Introduction: introduces self, confirms patient identity, gains consent
2. Presenting complaint: open question first, then explores onset, duration, character, severity, radiation, aggravating and relieving factors
3. Associated symptoms and relevant systems review
4. Past medical history, medications and allergies
5. Family and social history (smoking, alcohol, occupation, living situation)
6. Ideas, concerns and expectations of the patient
7. Communication: empathy, active listening, avoids jargon, summarises back to the patient
8. Elicits key hidden information through targeted questioning";

/// Build the request for one text-chat turn.
pub fn chat_request(
    case: &CaseRecord,
    dialect: Option<DialectLevel>,
    messages: &[ConversationMessage],
) -> ChatRequest {
    let mut chat = Vec::with_capacity(messages.len() + 1);
    chat.push(ChatMessage::system(build_instructions(case, dialect)));
    chat.extend(messages.iter().map(ChatMessage::from));

    ChatRequest {
        messages: chat,
        ..Default::default()
    }
}

fn case_summary(case: &CaseRecord) -> String {
    let field = |label: &str, value: Option<&str>| {
        format!("- {label}: {}", value.filter(|v| !v.trim().is_empty()).unwrap_or("Not provided"))
    };

    let mut lines = vec![
        field("Patient", case.patient_name.as_deref()),
        field("Age", case.age.as_deref()),
        field("Gender", case.gender.as_deref()),
        field("Chief complaint", case.chief_complaint.as_deref()),
        field("Presenting history", case.presenting_history.as_deref()),
    ];

    let history = case
        .past_medical_history
        .as_ref()
        .filter(|items| !items.is_empty())
        .map(|items| items.join("; "));
    lines.push(field("Past medical history", history.as_deref()));
    lines.push(field("Social history", case.social_history.as_deref()));
    lines.push(field("Allergies", case.allergies.as_deref()));
    lines.push(field("Hidden information", case.secret_info.as_deref()));

    let vitals = case.vitals_lines();
    if !vitals.is_empty() {
        lines.push(format!("- Vitals: {}", vitals.join(", ")));
    }

    lines.join("\n")
}

fn transcript(messages: &[ConversationMessage]) -> String {
    if messages.is_empty() {
        return "(no conversation took place)".to_string();
    }

    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                MessageRole::User => "Student",
                MessageRole::Assistant => "Patient",
            };
            format!("{speaker}: {}", m.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the request that grades a finished consultation.
pub fn assessment_request(case: &CaseRecord, messages: &[ConversationMessage]) -> ChatRequest {
    let criteria = case
        .custom_criteria
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CRITERIA);

    let prompt = format!(
        "You are an experienced OSCE examiner assessing a medical student's history-taking \
         with a standardized patient.

CASE SUMMARY:
{summary}

ASSESSMENT CRITERIA:
{criteria}

TRANSCRIPT:
{transcript}

Assess the student against each criterion. For every criterion state whether it was met, \
partially met or not met, quoting the transcript where useful. Then list the key information \
the student failed to elicit, give an overall grade (Fail, Borderline, Pass, Good or Excellent) \
and finish with three concrete suggestions for improvement.",
        summary = case_summary(case),
        transcript = transcript(messages),
    );

    ChatRequest {
        messages: vec![
            ChatMessage::system("You are a fair and constructive clinical examiner."),
            ChatMessage::user(prompt),
        ],
        max_tokens: Some(ASSESSMENT_MAX_TOKENS),
        temperature: Some(0.3),
        json_mode: false,
    }
}

/// Options for generating a new case.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub specialty: Option<String>,
    pub chief_complaint: Option<String>,
    pub difficulty: Option<String>,
    pub dialect: Option<DialectLevel>,
}

/// Build the request that drafts a new case as a JSON object.
pub fn generation_request(options: &GenerationOptions) -> ChatRequest {
    let mut constraints = Vec::new();
    if let Some(specialty) = options.specialty.as_deref().filter(|s| !s.trim().is_empty()) {
        constraints.push(format!("- Specialty: {specialty}"));
    }
    if let Some(complaint) = options
        .chief_complaint
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        constraints.push(format!("- Chief complaint: {complaint}"));
    }
    constraints.push(format!(
        "- Difficulty: {}",
        options
            .difficulty
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("intermediate")
    ));
    constraints.push(format!(
        "- singlish_level: {}",
        options.dialect.unwrap_or_default()
    ));

    let prompt = format!(
        "Create a realistic OSCE history-taking case set in Singapore.

REQUIREMENTS:
{constraints}

Respond with a single JSON object with these keys:
patient_name (string), age (number), gender (string), chief_complaint (string),
presenting_history (string), vitals (object of name to display string, e.g. \"Heart Rate\": \"98 bpm\"),
past_medical_history (array of strings), social_history (string), allergies (string),
script_instructions (string describing how to act the patient),
secret_info (string with facts revealed only when specifically asked),
singlish_level (one of none, low, moderate, high),
custom_criteria (string with numbered assessment criteria for this case).",
        constraints = constraints.join("\n"),
    );

    ChatRequest {
        messages: vec![
            ChatMessage::system("You write clinical teaching cases. Reply with JSON only."),
            ChatMessage::user(prompt),
        ],
        max_tokens: Some(GENERATION_MAX_TOKENS),
        temperature: Some(0.8),
        json_mode: true,
    }
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a generated case, assigning `case_id` when the model left it out.
pub fn parse_generated_case(text: &str) -> LlmResult<CaseRecord> {
    let mut case: CaseRecord = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| LlmError::InvalidResponse(format!("Generated case is not valid JSON: {e}")))?;

    if case.case_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
        case.case_id = Some(format!("generated-{}", uuid::Uuid::new_v4()));
    }

    Ok(case)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> CaseRecord {
        CaseRecord {
            case_id: Some("abdo-01".to_string()),
            patient_name: Some("Siti".to_string()),
            secret_info: Some("Missed period".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_chat_request_prepends_instructions() {
        let messages = vec![
            ConversationMessage::user("Hello, what brings you in?"),
            ConversationMessage::assistant("My tummy very pain leh."),
        ];
        let request = chat_request(&case(), Some(DialectLevel::High), &messages);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("Name: Siti"));
        assert_eq!(request.messages[2].role, "assistant");
        assert!(!request.json_mode);
    }

    #[test]
    fn test_assessment_uses_default_rubric() {
        let request = assessment_request(&case(), &[ConversationMessage::user("Hi")]);
        let prompt = &request.messages[1].content;
        assert!(prompt.contains(DEFAULT_CRITERIA));
        assert!(prompt.contains("Student: Hi"));
        assert!(prompt.contains("Hidden information: Missed period"));
    }

    #[test]
    fn test_assessment_uses_custom_criteria() {
        let mut case = case();
        case.custom_criteria = Some("1. Asks about LMP".to_string());
        let request = assessment_request(&case, &[]);
        let prompt = &request.messages[1].content;
        assert!(prompt.contains("1. Asks about LMP"));
        assert!(!prompt.contains(DEFAULT_CRITERIA));
        assert!(prompt.contains("(no conversation took place)"));
    }

    #[test]
    fn test_generation_request_is_json_mode() {
        let request = generation_request(&GenerationOptions {
            specialty: Some("Cardiology".to_string()),
            dialect: Some(DialectLevel::Moderate),
            ..Default::default()
        });
        assert!(request.json_mode);
        let prompt = &request.messages[1].content;
        assert!(prompt.contains("- Specialty: Cardiology"));
        assert!(prompt.contains("- Difficulty: intermediate"));
        assert!(prompt.contains("- singlish_level: moderate"));
    }

    #[test]
    fn test_parse_fenced_case() {
        let text = "```json\n{\"patient_name\": \"Ahmad\", \"age\": 40}\n```";
        let case = parse_generated_case(text).unwrap();
        assert_eq!(case.patient_name.as_deref(), Some("Ahmad"));
        assert_eq!(case.age.as_deref(), Some("40"));
        assert!(case.id().starts_with("generated-"));
    }

    #[test]
    fn test_parse_keeps_case_id() {
        let case = parse_generated_case(r#"{"case_id": "mine"}"#).unwrap();
        assert_eq!(case.id(), "mine");
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_generated_case("Sorry, I cannot help with that."),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
