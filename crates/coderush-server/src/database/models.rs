//! Row types mirroring the storage schema, plus the conversions to and from
//! the in-memory session. The in-progress member sub-step travels as tagged
//! JSON in `pending_member`, so a half-collected member survives restarts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::chat::state::{Member, MemberStep, RegistrationSession, RegistrationState};

#[derive(Debug, FromRow)]
pub struct RegistrationRow {
    pub session_id: String,
    pub state: String,
    pub team_name: String,
    pub team_batch: Option<String>,
    pub current_member: i32,
    pub pending_member: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct MemberRow {
    pub position: i32,
    pub full_name: String,
    pub index_number: String,
    pub batch: String,
    pub email: String,
}

impl RegistrationRow {
    pub fn into_session(self, member_rows: Vec<MemberRow>) -> Result<RegistrationSession> {
        let state = RegistrationState::parse(&self.state)
            .with_context(|| format!("unknown registration state '{}'", self.state))?;
        let step: MemberStep = serde_json::from_value(self.pending_member)
            .context("malformed pending_member payload")?;

        let mut members: Vec<(i32, Member)> = member_rows
            .into_iter()
            .map(|row| {
                (
                    row.position,
                    Member {
                        full_name: row.full_name,
                        index_number: row.index_number,
                        batch: row.batch,
                        email: row.email,
                    },
                )
            })
            .collect();
        members.sort_by_key(|(position, _)| *position);

        Ok(RegistrationSession {
            session_id: self.session_id,
            state,
            team_name: self.team_name,
            team_batch: self.team_batch,
            members: members.into_iter().map(|(_, m)| m).collect(),
            current_member: self.current_member.max(1) as usize,
            step,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub fn pending_member_json(session: &RegistrationSession) -> Result<serde_json::Value> {
    serde_json::to_value(&session.step).context("failed to serialize pending member step")
}
