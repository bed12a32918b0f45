// src/entity/note.rs
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single note owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub text: String,
    /// Creation time in unix milliseconds.
    pub timestamp: i64,
    pub user_id: i64,
}

impl Note {
    /// Callers must pass text that is already trimmed and non-empty.
    pub fn new(user_id: i64, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            timestamp: Utc::now().timestamp_millis(),
            user_id,
        }
    }
}

/// Body of `GET /api/notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteList {
    pub notes: Vec<Note>,
}

/// Body of `POST /api/notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNote {
    pub text: String,
}

impl CreateNote {
    /// Trimmed text, or `None` when nothing is left after trimming.
    pub fn normalized_text(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
