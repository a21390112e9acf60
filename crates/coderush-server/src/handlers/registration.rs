use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Serialize;

use crate::chat::machine::RegistrationStore;
use crate::chat::state::{Member, RegistrationSession};
use crate::database::Repository;
use crate::utils::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RegistrationStatus {
    pub session_id: String,
    pub state: String,
    pub team_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_batch: Option<String>,
    pub members: Vec<Member>,
    pub pending: String,
}

impl From<RegistrationSession> for RegistrationStatus {
    fn from(session: RegistrationSession) -> Self {
        let pending = session.pending_prompt();
        Self {
            session_id: session.session_id,
            state: session.state.as_str().to_string(),
            team_name: session.team_name,
            team_batch: session.team_batch,
            members: session.members,
            pending,
        }
    }
}

/// Read-only view of a session's registration, for the UI to restore state
/// after a reload.
pub async fn registration_status(
    Extension(repository): Extension<Arc<Repository>>,
    Path(session_id): Path<String>,
) -> Result<Json<RegistrationStatus>, ApiError> {
    let session = repository
        .load(&session_id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.into()))?
        .ok_or_else(|| ApiError::NotFound(format!("no registration for session {session_id}")))?;

    Ok(Json(session.into()))
}
