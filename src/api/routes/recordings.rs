//! Saved-recording endpoints: listing, load, delete, rename.
//!
//! The listing is served straight from the cached sidebar index; mutations
//! go through the machine so the active session stays consistent (deleting
//! the active recording resets it).

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};

use super::super::error::{ApiError, ApiResult};
use chrono::Local;
use serde_json::{json, Value};
use tracing::info;

use crate::sidebar::group_recordings;

use super::session::{ApiCommand, SessionState};

#[derive(Debug, serde::Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/recordings", get(list_recordings))
        .route("/recordings/:id/load", post(load_recording))
        .route("/recordings/:id", delete(delete_recording))
        .route("/recordings/:id/rename", post(rename_recording))
        .with_state(state)
}

async fn list_recordings(State(state): State<SessionState>) -> Json<Value> {
    let recordings = state.sidebar.get().await;
    let active = state.session.get().await.recording_id;
    let groups = group_recordings(&recordings, active.as_deref(), Local::now());
    Json(json!({ "groups": groups }))
}

async fn load_recording(
    State(state): State<SessionState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    info!("Load recording {} requested via API", id);
    state
        .tx
        .send(ApiCommand::LoadRecording { id: id.clone() })
        .await
        .map_err(|_| ApiError::internal("session machine is not running"))?;

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let session = state.session.get().await;
    let loaded = session.recording_id.as_deref() == Some(id.as_str());
    Ok(Json(json!({
        "loaded": loaded,
        "phase": session.phase.as_str(),
    })))
}

/// Deleting is taken as confirmed; the confirmation dialog is the caller's.
async fn delete_recording(
    State(state): State<SessionState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    info!("Delete recording {} requested via API", id);
    state
        .tx
        .send(ApiCommand::DeleteRecording { id: id.clone() })
        .await
        .map_err(|_| ApiError::internal("session machine is not running"))?;

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    Ok(Json(json!({
        "deleted": !state.sidebar.contains(&id).await,
    })))
}

async fn rename_recording(
    State(state): State<SessionState>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<Value>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name cannot be empty"));
    }

    info!("Rename recording {} requested via API", id);
    state
        .tx
        .send(ApiCommand::RenameRecording {
            id,
            name: req.name,
        })
        .await
        .map_err(|_| ApiError::internal("session machine is not running"))?;

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    Ok(Json(json!({ "ok": true })))
}
