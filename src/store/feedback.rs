use parking_lot::RwLock;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use super::{StoreError, StoreResult};

/// Rating recorded when the client sends none.
pub const DEFAULT_RATING: &str = "Good";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEntry {
    pub feedback: String,
    pub rating: String,
    /// RFC 3339, UTC
    pub timestamp: String,
}

/// Append-only feedback log, mirrored to the `feedback` tracing target.
#[derive(Default)]
pub struct FeedbackSink {
    entries: RwLock<Vec<FeedbackEntry>>,
}

impl FeedbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, feedback: &str, rating: Option<&str>) -> StoreResult<FeedbackEntry> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(StoreError::InvalidInput(
                "Feedback text is required".to_string(),
            ));
        }

        let rating = rating
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RATING);

        let entry = FeedbackEntry {
            feedback: feedback.to_string(),
            rating: rating.to_string(),
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        };

        info!(
            target: "feedback",
            rating = %entry.rating,
            timestamp = %entry.timestamp,
            feedback = %entry.feedback,
            "Feedback received"
        );

        self.entries.write().push(entry.clone());
        Ok(entry)
    }

    pub fn entries(&self) -> Vec<FeedbackEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_rating() {
        let sink = FeedbackSink::new();
        let entry = sink.record("  Great patient voice ", None).unwrap();
        assert_eq!(entry.feedback, "Great patient voice");
        assert_eq!(entry.rating, DEFAULT_RATING);
        assert!(OffsetDateTime::parse(&entry.timestamp, &Rfc3339).is_ok());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_empty_feedback_rejected() {
        let sink = FeedbackSink::new();
        assert!(matches!(
            sink.record("   ", Some("Excellent")),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_entries_append_in_order() {
        let sink = FeedbackSink::new();
        sink.record("first", Some("Poor")).unwrap();
        sink.record("second", Some("Excellent")).unwrap();
        let ratings: Vec<String> = sink.entries().into_iter().map(|e| e.rating).collect();
        assert_eq!(ratings, vec!["Poor", "Excellent"]);
    }
}
