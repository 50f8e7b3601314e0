//! Case records and conversation messages.
//!
//! Every case field is optional; authoring tools and AI generation both
//! produce partial records. Unknown fields are kept so that a record posted
//! by a client round-trips unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One standardized-patient scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,

    /// Accepts `45` or `"45"`; stored as text
    #[serde(
        default,
        deserialize_with = "number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presenting_history: Option<String>,

    /// Vital sign name to display value, in authoring order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitals: Option<Map<String, Value>>,

    /// Accepts a list or a single string
    #[serde(
        default,
        deserialize_with = "list_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub past_medical_history: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_history: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,

    /// Acting and persona directions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_instructions: Option<String>,

    /// Revealed only on targeted questioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_info: Option<String>,

    /// Kept as text so an unrecognised level does not reject the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singlish_level: Option<String>,

    /// Assessment criteria replacing the default rubric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_criteria: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaseRecord {
    /// Case id, or an empty string when unset.
    pub fn id(&self) -> &str {
        self.case_id.as_deref().unwrap_or_default()
    }

    /// Dialect level declared by the case, if it parses.
    pub fn dialect_level(&self) -> Option<DialectLevel> {
        self.singlish_level.as_deref().and_then(DialectLevel::parse)
    }

    /// Vitals rendered as `name: value` lines.
    pub fn vitals_lines(&self) -> Vec<String> {
        self.vitals
            .iter()
            .flatten()
            .map(|(name, value)| match value {
                Value::String(s) => format!("{name}: {s}"),
                other => format!("{name}: {other}"),
            })
            .collect()
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

fn list_or_string<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        ),
        Some(Value::String(s)) => Some(vec![s]),
        Some(Value::Null) | None => None,
        Some(other) => Some(vec![other.to_string()]),
    })
}

/// How strongly the patient speaks Singaporean English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectLevel {
    /// Standard English only
    None,
    #[default]
    Low,
    Moderate,
    High,
}

impl DialectLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Some(DialectLevel::None),
            "low" => Some(DialectLevel::Low),
            "moderate" | "medium" => Some(DialectLevel::Moderate),
            "high" | "heavy" => Some(DialectLevel::High),
            _ => None,
        }
    }

    /// A requested level wins over the case's own level; `Low` when neither parses.
    pub fn resolve(requested: Option<&str>, case: &CaseRecord) -> Self {
        requested
            .and_then(Self::parse)
            .or_else(|| case.dialect_level())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialectLevel::None => "none",
            DialectLevel::Low => "low",
            DialectLevel::Moderate => "moderate",
            DialectLevel::High => "high",
        }
    }
}

impl fmt::Display for DialectLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One turn of a transcript held by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            id: None,
        }
    }
}
