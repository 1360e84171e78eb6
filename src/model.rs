//! Persisted data types shared across the client.
//!
//! Field names serialize as camelCase and timestamps as RFC 3339 strings,
//! matching the shapes the backend and older saved state use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the recommendation chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    /// true = typed by the human, false = authored by LIA (including
    /// synthesized apology messages, which are stored like any other reply).
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(id: String, text: String) -> Self {
        Self {
            id,
            text,
            is_user: true,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(id: String, text: String) -> Self {
        Self {
            id,
            text,
            is_user: false,
            timestamp: Utc::now(),
        }
    }
}

/// The critique attached to a library entry: a free-text review or a numeric
/// score in [0, 5]. Which variant a deployment collects is fixed in the
/// config, never chosen per submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Critique {
    Review(String),
    Rating(f64),
}

/// Outcome of the best-effort backend indexing for a book. The local record
/// is the source of truth either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexStatus {
    #[default]
    Pending,
    Indexed,
    Failed,
}

/// An immutable library entry. Identity and creation time are assigned here,
/// never supplied by the caller; there is no update or delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    #[serde(flatten)]
    pub critique: Critique,
    pub date_added: DateTime<Utc>,
    // Records saved before this field existed read back as Pending.
    #[serde(default)]
    pub index_status: IndexStatus,
}

pub fn new_book_id() -> String {
    Uuid::new_v4().to_string()
}

/// Millisecond-clock message ids, strictly increasing in creation order even
/// when two messages land in the same millisecond.
#[derive(Debug, Default)]
pub struct MessageIdGen {
    last: i64,
}

impl MessageIdGen {
    pub fn next_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        self.last = if now > self.last { now } else { self.last + 1 };
        self.last.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_strictly_increasing() {
        let mut ids = MessageIdGen::default();
        let mut previous: i64 = 0;
        for _ in 0..200 {
            let id: i64 = ids.next_id().parse().unwrap();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn book_record_serializes_with_legacy_field_names() {
        let record = BookRecord {
            id: "abc".to_string(),
            title: "Gone Girl".to_string(),
            author: "Gillian Flynn".to_string(),
            description: "A thriller about a marriage gone very wrong.".to_string(),
            critique: Critique::Review("Twisty and sharp, kept me up all night.".to_string()),
            date_added: Utc::now(),
            index_status: IndexStatus::Pending,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("dateAdded").is_some());
        assert!(json.get("review").is_some());
        assert!(json.get("rating").is_none());
    }

    #[test]
    fn book_record_without_index_status_defaults_to_pending() {
        let json = r#"{
            "id": "1",
            "title": "Dune",
            "author": "Frank Herbert",
            "description": "Desert planet politics and giant sandworms.",
            "rating": 4.5,
            "dateAdded": "2024-01-02T03:04:05Z"
        }"#;
        let record: BookRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.index_status, IndexStatus::Pending);
        assert_eq!(record.critique, Critique::Rating(4.5));
    }
}
