//! Session CRUD handlers.
//!
//! Reads go through the store and are overlaid with the live room's
//! snapshot where one exists, so a `GET` right after a join reflects the
//! in-memory roster even if the store write is still settling. Writes go
//! through the registry so the same serialization rules apply as on the
//! WebSocket path.

use super::require_user;
use crate::errors::JcError;
use crate::models::{NewSession, SessionRecord, Song};
use crate::routes::AppState;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

/// `GET /v1/sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionRecord>>, JcError> {
    let mut records = state.store.list_sessions().await?;
    for record in &mut records {
        overlay_live(&state, record).await;
    }
    Ok(Json(records))
}

/// `GET /v1/sessions/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionRecord>, JcError> {
    let mut record = state
        .store
        .fetch_session(&session_id)
        .await?
        .ok_or_else(|| JcError::NotFound("Session not found".to_string()))?;

    overlay_live(&state, &mut record).await;
    Ok(Json(record))
}

/// `POST /v1/sessions`
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(new_session): Json<NewSession>,
) -> Result<(StatusCode, Json<SessionRecord>), JcError> {
    let user = require_user(&headers)?;
    let record = state.registry.create_session(new_session, user).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `DELETE /v1/sessions/{id}`
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, JcError> {
    let user = require_user(&headers)?;
    state.registry.end_session(session_id, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body for `PUT /v1/sessions/{id}/song`. A missing or null `song` clears
/// the selection.
#[derive(Debug, Deserialize)]
pub struct SongUpdate {
    #[serde(default)]
    pub song: Option<Song>,
}

/// `PUT /v1/sessions/{id}/song`
pub async fn update_song(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SongUpdate>,
) -> Result<StatusCode, JcError> {
    let user = require_user(&headers)?;
    let room = state.registry.ensure_room(session_id).await?;
    room.change_song(body.song, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the persisted roster and song with the live room's view.
async fn overlay_live(state: &AppState, record: &mut SessionRecord) {
    if let Ok(Some(room)) = state.registry.room(record.meta.id.clone()).await {
        if let Ok(view) = room.snapshot().await {
            record.participants = view.participants;
            record.meta.song = view.active_song;
        }
    }
}
