use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chat::machine::{Button, EditForm, EditPayload};
use crate::chat::{ChatEngine, ChatTurn, EngineError};
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub edited_data: Option<EditPayload>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_form: Option<EditForm>,
    pub message_id: String,
}

pub async fn chat_handler(
    Extension(engine): Extension<Arc<ChatEngine>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let start = Instant::now();

    let reply = engine
        .handle(ChatTurn {
            session_id: request.session_id.clone(),
            message: request.message,
            edited_data: request.edited_data,
        })
        .await
        .map_err(|e| match e {
            EngineError::MissingSessionId => {
                ApiError::BadRequest("session_id is required".to_string())
            }
            EngineError::RateLimited => ApiError::RateLimited,
            EngineError::Internal(e) => ApiError::DatabaseError(e),
        })?;

    info!(
        session_id = %request.session_id,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "chat turn handled"
    );

    Ok(Json(ChatResponse {
        reply: reply.reply,
        buttons: reply.buttons,
        edit_form: reply.edit_form,
        message_id: reply.message_id,
    }))
}
