use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest accepted mood score.
pub const MOOD_MIN: u8 = 1;
/// Highest accepted mood score.
pub const MOOD_MAX: u8 = 5;

/// One user-submitted journal record.
///
/// Created once by the ingestion orchestrator. `summary_bullets` is filled
/// in best-effort shortly after creation; everything else is immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub owner_id: String,
    pub text: String,
    pub mood_score: u8,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_bullets: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A raw submission as received from the client, before any checks.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub text: String,
    pub mood_score: u8,
    pub tags: Vec<String>,
}

impl NewEntry {
    pub fn new(text: impl Into<String>, mood_score: u8, tags: Vec<String>) -> Self {
        Self {
            text: text.into(),
            mood_score,
            tags,
        }
    }
}
