//! HTTP error mapping for the notes API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::NotesError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("text is required")]
    EmptyText,

    #[error("note not found: {0}")]
    NoteNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidBody(_) | Self::EmptyText => StatusCode::BAD_REQUEST,
            Self::NoteNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Details stay in the logs; clients get a fixed message per status.
        let body = match &self {
            Self::Unauthorized => "Unauthorized: Invalid init data",
            Self::InvalidBody(_) => "Invalid request body",
            Self::EmptyText => "Text is required",
            Self::NoteNotFound(_) => "Note not found",
            Self::Internal(_) => "Internal server error",
        };
        (self.status_code(), body).into_response()
    }
}

impl From<NotesError> for ApiError {
    fn from(err: NotesError) -> Self {
        match err {
            NotesError::Unauthorized => ApiError::Unauthorized,
            NotesError::NoteNotFound(id) => ApiError::NoteNotFound(id),
            NotesError::Json(e) => ApiError::InvalidBody(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
