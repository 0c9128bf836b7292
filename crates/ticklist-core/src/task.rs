use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    pub text: String,

    pub completed: bool,

    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh, not-yet-completed task. Returns `None` when `raw_text`
    /// is blank after trimming.
    pub fn new(raw_text: &str, now: DateTime<Utc>) -> Option<Self> {
        let text = normalize_text(raw_text)?;
        Some(Self {
            id: Uuid::new_v4(),
            text,
            completed: false,
            created_at: now,
        })
    }

    /// Short id prefix shown next to rows.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
