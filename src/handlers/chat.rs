use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Channel, IntakeData, QualificationResult, SessionSnapshot};
use crate::services::{conversation, qualification};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    pub state: String,
    pub data_collected: IntakeData,
    pub missing_fields: Vec<&'static str>,
    pub is_complete: bool,
}

// POST /chat/message
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = conversation::process_turn(&state, &session_id, message, Channel::Chat).await;

    Ok(Json(ChatResponse {
        session_id: outcome.session_id,
        response: outcome.response,
        state: outcome.state.as_str().to_string(),
        data_collected: outcome.data,
        missing_fields: outcome.missing_fields,
        is_complete: outcome.is_complete,
    }))
}

#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub missing_fields: Vec<&'static str>,
    pub is_complete: bool,
    pub qualification: QualificationResult,
}

// GET /chat/session/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .ok_or_else(|| AppError::SessionNotFound(id.clone()))?;

    let snapshot = handle.snapshot();
    Ok(Json(SessionResponse {
        missing_fields: snapshot.missing_fields(),
        is_complete: snapshot.is_complete(),
        qualification: qualification::qualify(&snapshot.data),
        snapshot,
    }))
}

// DELETE /chat/session/:id
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.sessions.delete(&id) {
        return Err(AppError::SessionNotFound(id));
    }
    tracing::info!(session_id = %id, "session deleted");
    Ok(Json(serde_json::json!({
        "message": "Session deleted",
        "session_id": id,
    })))
}
