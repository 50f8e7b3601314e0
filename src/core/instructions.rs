//! Standardized-patient instruction rendering.
//!
//! [`build_instructions`] turns a case into the system prompt used both for
//! realtime voice sessions and for text chat. Facts in the case are split
//! into what the patient shares when asked and what stays locked until a
//! targeted question. Vital signs are left out; the student has to ask the
//! examiner for them.

use super::case::{CaseRecord, DialectLevel};

const NOT_PROVIDED: &str = "Not provided";

/// Closing behaviour list, one rule per line.
const IMPORTANT_RULES: &[&str] = &[
    "Stay in character at all times as the patient",
    "Only provide information when asked - don't volunteer everything at once",
    "Show appropriate emotions (pain, anxiety, etc.) based on your condition",
    "If asked about vitals or examination findings, say \"The doctor/nurse can check that\"",
    "Do not diagnose yourself or suggest what condition you might have",
    "Respond naturally as a real patient would - be conversational",
    "Keep responses concise (1-3 sentences usually) unless the question requires more detail",
    "If the student asks something inappropriate or off-topic, redirect politely as a patient would",
];

/// Language style directive for a dialect level.
pub fn dialect_directive(level: DialectLevel) -> &'static str {
    match level {
        DialectLevel::High => {
            "Use heavy Singlish expressions naturally. Include common phrases like 'lah', 'leh', \
             'lor', 'sia', 'can or not', 'how come', 'aiyo', 'walao'. Mix English with occasional \
             Chinese/Malay words. Speak in a very casual, local Singaporean manner."
        }
        DialectLevel::Moderate => {
            "Use moderate Singlish. Include occasional 'lah', 'leh', 'lor' at the end of sentences. \
             Speak in a casual but understandable Singaporean English style. Don't overdo the slang."
        }
        DialectLevel::Low => {
            "Speak in standard English with minimal Singlish. You may occasionally use 'lah' or \
             'okay' in a Singaporean way, but keep the language clear and professional."
        }
        DialectLevel::None => {
            "Speak in clear standard English only. Do not use Singlish particles or local slang."
        }
    }
}

fn text_or<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
}

fn past_history(case: &CaseRecord) -> String {
    let items: Vec<&str> = case
        .past_medical_history
        .iter()
        .flatten()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        items.join("\n")
    }
}

/// Render the system instructions for a case.
///
/// `requested` overrides the case's own dialect level. Never fails; any
/// missing field is replaced by placeholder text.
pub fn build_instructions(case: &CaseRecord, requested: Option<DialectLevel>) -> String {
    let dialect = requested
        .or_else(|| case.dialect_level())
        .unwrap_or_default();

    let rules = IMPORTANT_RULES
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {rule}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a standardized patient in an OSCE (Objective Structured Clinical Examination) \
         simulation for medical students.

CHARACTER PROFILE:
- Name: {name}
- Age: {age} years old
- Gender: {gender}
- Chief Complaint: {complaint}

PRESENTING HISTORY:
{presenting}

PAST MEDICAL HISTORY:
{past}

SOCIAL HISTORY:
{social}

ALLERGIES:
{allergies}

ACTING INSTRUCTIONS:
{acting}

SECRET INFORMATION (only reveal if directly asked relevant questions):
{secret}

LANGUAGE STYLE:
{style}

IMPORTANT RULES:
{rules}",
        name = text_or(case.patient_name.as_deref(), "Patient"),
        age = text_or(case.age.as_deref(), "Unknown"),
        gender = text_or(case.gender.as_deref(), "Unknown"),
        complaint = text_or(case.chief_complaint.as_deref(), "Not specified"),
        presenting = text_or(case.presenting_history.as_deref(), NOT_PROVIDED),
        past = past_history(case),
        social = text_or(case.social_history.as_deref(), NOT_PROVIDED),
        allergies = text_or(case.allergies.as_deref(), "No known allergies"),
        acting = text_or(
            case.script_instructions.as_deref(),
            "Act as a cooperative patient."
        ),
        secret = text_or(case.secret_info.as_deref(), "None"),
        style = dialect_directive(dialect),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chest_pain() -> CaseRecord {
        serde_json::from_value(json!({
            "case_id": "chest-pain-01",
            "patient_name": "Tan Ah Kow",
            "age": 58,
            "gender": "Male",
            "chief_complaint": "Chest pain",
            "presenting_history": "Crushing central chest pain for 2 hours.",
            "vitals": {"bp": "150/95"},
            "past_medical_history": ["Hypertension", "Type 2 diabetes"],
            "social_history": "Smokes 20 a day.",
            "allergies": "Penicillin",
            "script_instructions": "Anxious, clutching chest.",
            "secret_info": "Stopped taking his medication last month.",
            "singlish_level": "moderate"
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_record_uses_placeholders() {
        let text = build_instructions(&CaseRecord::default(), None);
        assert!(text.contains("- Name: Patient"));
        assert!(text.contains("- Age: Unknown years old"));
        assert!(text.contains("- Gender: Unknown"));
        assert!(text.contains("- Chief Complaint: Not specified"));
        assert!(text.contains("PRESENTING HISTORY:\nNot provided"));
        assert!(text.contains("PAST MEDICAL HISTORY:\nNot provided"));
        assert!(text.contains("ALLERGIES:\nNo known allergies"));
        assert!(text.contains("ACTING INSTRUCTIONS:\nAct as a cooperative patient."));
        assert!(text.contains("questions):\nNone"));
        assert!(!text.contains("undefined"));
        assert!(text.contains(dialect_directive(DialectLevel::Low)));
    }

    #[test]
    fn test_sections_in_order() {
        let text = build_instructions(&chest_pain(), None);
        let headings = [
            "standardized patient in an OSCE",
            "CHARACTER PROFILE:",
            "PRESENTING HISTORY:",
            "PAST MEDICAL HISTORY:",
            "SOCIAL HISTORY:",
            "ALLERGIES:",
            "ACTING INSTRUCTIONS:",
            "SECRET INFORMATION",
            "LANGUAGE STYLE:",
            "IMPORTANT RULES:",
        ];
        let positions: Vec<usize> = headings
            .iter()
            .map(|h| text.find(h).unwrap_or_else(|| panic!("missing {h}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_secret_only_under_locked_heading() {
        let text = build_instructions(&chest_pain(), None);
        let secret_at = text.find("Stopped taking his medication").unwrap();
        let heading_at = text
            .find("SECRET INFORMATION (only reveal if directly asked relevant questions):")
            .unwrap();
        let style_at = text.find("LANGUAGE STYLE:").unwrap();
        assert!(heading_at < secret_at && secret_at < style_at);
        assert_eq!(text.matches("Stopped taking his medication").count(), 1);
    }

    #[test]
    fn test_history_one_item_per_line() {
        let text = build_instructions(&chest_pain(), None);
        assert!(text.contains("PAST MEDICAL HISTORY:\nHypertension\nType 2 diabetes\n"));
    }

    #[test]
    fn test_vitals_excluded() {
        let text = build_instructions(&chest_pain(), None);
        assert!(!text.contains("150/95"));
        assert!(text.contains("The doctor/nurse can check that"));
    }

    #[test]
    fn test_requested_dialect_overrides_case() {
        let case = chest_pain();
        assert!(build_instructions(&case, None).contains(dialect_directive(DialectLevel::Moderate)));
        let text = build_instructions(&case, Some(DialectLevel::None));
        assert!(text.contains(dialect_directive(DialectLevel::None)));
        assert!(!text.contains("Use moderate Singlish"));
    }

    #[test]
    fn test_deterministic() {
        let case = chest_pain();
        assert_eq!(
            build_instructions(&case, Some(DialectLevel::High)),
            build_instructions(&case, Some(DialectLevel::High))
        );
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let case = CaseRecord {
            patient_name: Some("   ".to_string()),
            past_medical_history: Some(vec![String::new()]),
            ..Default::default()
        };
        let text = build_instructions(&case, None);
        assert!(text.contains("- Name: Patient"));
        assert!(text.contains("PAST MEDICAL HISTORY:\nNot provided"));
    }
}
