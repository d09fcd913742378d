use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::chat::Role;
use crate::event::Source;

/// A chat thread as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A message stored with a thread. `sources` is the JSON text the backend
/// saved alongside the answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sources: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl StoredMessage {
    /// `None` for roles a chat transcript does not show (e.g. `system`).
    pub fn role(&self) -> Option<Role> {
        match self.role.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Role::User),
            "assistant" | "ai" => Some(Role::Assistant),
            _ => None,
        }
    }

    /// Stored sources, or none when the saved text is missing or unreadable.
    pub fn parsed_sources(&self) -> Vec<Source> {
        self.sources
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn created_at_or(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fallback)
    }
}

/// `GET /chat/threads/{id}`: the thread with its messages, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ThreadSummary,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// One turn from the agent's checkpoint history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    /// `human` or `ai`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `GET /chat/checkpoint/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatHistory {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
    #[serde(default)]
    pub total_count: usize,
}

/// Accepts RFC 3339 and the backend's naive ISO timestamps (read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
