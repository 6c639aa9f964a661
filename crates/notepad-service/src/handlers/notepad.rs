//! Shared notepad handlers.
//!
//! - `POST /api/v1/notepad/sessions` - Create a session for a room
//! - `POST /api/v1/notepad/cleanup` - Delete a session and release its host slot
//! - `POST /api/v1/notepad/room-ended` - Clean up after a room ended
//! - `POST /api/v1/notepad/status` - Show or hide an existing session
//!
//! Bodies are decoded by hand so malformed JSON is a 400 rather than axum's
//! default 422.

use crate::errors::NotepadError;
use crate::models::{
    ChangeStatusRequest, CleanPadRequest, CreateSessionRequest, CreateSessionResponse,
    RoomEndedRequest,
};
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, instrument, Instrument};

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, NotepadError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "np.handlers.notepad", error = %e, "Invalid request body");
        NotepadError::BadRequest("Invalid request body".to_string())
    })
}

fn require(field: &str, value: &str) -> Result<(), NotepadError> {
    if value.trim().is_empty() {
        return Err(NotepadError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// Run a coordinator operation on its own task.
///
/// The operation finishes even when the request future is dropped by the
/// route timeout or a client disconnect, so a reservation is never left
/// half-recorded.
async fn run_to_completion<F, T>(operation: F) -> Result<T, NotepadError>
where
    F: Future<Output = Result<T, NotepadError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation.in_current_span()).await.map_err(|e| {
        error!(target: "np.handlers.notepad", error = %e, "Coordinator task failed");
        NotepadError::Internal
    })?
}

/// Handler for POST /api/v1/notepad/sessions
///
/// Returns 201 with `{pad_id, read_only_pad_id}`.
#[instrument(skip_all, name = "np.notepad.create_session")]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateSessionResponse>), NotepadError> {
    let request: CreateSessionRequest = parse_body(&body)?;
    require("room_id", &request.room_id)?;

    let coordinator = state.coordinator.clone();
    let session =
        run_to_completion(async move { coordinator.create_session(&request.room_id).await })
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse::from(&session)),
    ))
}

/// Handler for POST /api/v1/notepad/cleanup
#[instrument(skip_all, name = "np.notepad.cleanup")]
pub async fn cleanup_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, NotepadError> {
    let request: CleanPadRequest = parse_body(&body)?;
    require("room_id", &request.room_id)?;
    require("node_id", &request.node_id)?;
    require("pad_id", &request.pad_id)?;

    let coordinator = state.coordinator.clone();
    run_to_completion(async move {
        coordinator
            .cleanup_session(&request.room_id, &request.node_id, &request.pad_id)
            .await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/notepad/room-ended
///
/// `metadata` is the room's metadata JSON as it stood when the room ended.
#[instrument(skip_all, name = "np.notepad.room_ended")]
pub async fn room_ended(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, NotepadError> {
    let request: RoomEndedRequest = parse_body(&body)?;
    require("room_id", &request.room_id)?;
    require("metadata", &request.metadata)?;

    let coordinator = state.coordinator.clone();
    run_to_completion(async move {
        coordinator
            .cleanup_after_room_end(&request.room_id, &request.metadata)
            .await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/notepad/status
#[instrument(skip_all, name = "np.notepad.change_status")]
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, NotepadError> {
    let request: ChangeStatusRequest = parse_body(&body)?;
    require("room_id", &request.room_id)?;

    let coordinator = state.coordinator.clone();
    run_to_completion(async move {
        coordinator
            .set_session_active(&request.room_id, request.is_active)
            .await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
