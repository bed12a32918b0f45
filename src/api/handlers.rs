use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::ApiError;
use super::{AppState, INIT_DATA_HEADER};
use crate::auth::ResolvedIdentity;
use crate::entity::{CreateNote, Note, NoteList};

impl FromRequestParts<AppState> for ResolvedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = match parts.headers.get(INIT_DATA_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| {
                warn!(path = %parts.uri.path(), "Launch data header is not valid UTF-8");
                ApiError::Unauthorized
            })?),
            None => None,
        };

        state.gate.resolve(raw).map_err(|e| {
            warn!(method = %parts.method, path = %parts.uri.path(), "Request rejected");
            ApiError::from(e)
        })
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "tma-notes-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_notes(
    State(state): State<AppState>,
    identity: ResolvedIdentity,
) -> Json<NoteList> {
    let notes = state.store.list(identity.user_id);
    info!(user_id = identity.user_id, count = notes.len(), "Listed notes");
    Json(NoteList { notes })
}

pub async fn create_note(
    State(state): State<AppState>,
    identity: ResolvedIdentity,
    body: Result<Json<CreateNote>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let Json(body) = body.map_err(|e| {
        warn!(user_id = identity.user_id, error = %e, "Invalid note body");
        ApiError::InvalidBody(e.body_text())
    })?;
    let text = body.normalized_text().ok_or_else(|| {
        warn!(user_id = identity.user_id, "Empty or whitespace-only note text");
        ApiError::EmptyText
    })?;

    let note = state.store.create(identity.user_id, text);
    info!(
        user_id = identity.user_id,
        note_id = %note.id,
        len = note.text.len(),
        "Note created"
    );
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn delete_note(
    State(state): State<AppState>,
    identity: ResolvedIdentity,
    Path(note_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete(identity.user_id, &note_id)
        .map_err(|e| {
            warn!(user_id = identity.user_id, note_id = %note_id, "Note not found");
            ApiError::from(e)
        })?;
    info!(user_id = identity.user_id, note_id = %note_id, "Note deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all_notes(
    State(state): State<AppState>,
    identity: ResolvedIdentity,
) -> StatusCode {
    let removed = state.store.delete_all(identity.user_id);
    info!(user_id = identity.user_id, removed, "Deleted all notes");
    StatusCode::NO_CONTENT
}
