use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotesError {
    #[error("Unauthorized: launch data could not be verified")]
    Unauthorized,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NotesError>;
