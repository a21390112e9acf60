//! Registration state machine. One turn in, one reply out; the session is
//! loaded by the caller, mutated here, and persisted before the reply is
//! returned. Validation failures never advance state. Uniqueness checks are
//! optimistic; the storage layer's partial unique indexes are authoritative
//! at commit time, and a commit conflict surfaces as a typed "already taken"
//! reply instead of an error page.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::state::{Member, MemberStep, RegistrationSession, RegistrationState, MEMBER_COUNT};
use super::validation::{
    validate_batch, validate_email, validate_full_name, validate_index_number,
    validate_team_name, ALLOWED_BATCHES,
};
use crate::services::side_effects::{RegistrationSummary, SideEffects};

/// Sentinel message that commits an edit payload instead of being classified.
pub const EDIT_COMMAND: &str = "__edit_submit__";
/// Sentinel message that abandons the session.
pub const RESET_COMMAND: &str = "__reset__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    TeamName,
    IndexNumber,
    Email,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TeamName => write!(f, "team name"),
            Self::IndexNumber => write!(f, "index number"),
            Self::Email => write!(f, "email"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A storage-level uniqueness constraint fired at commit time.
    #[error("{0} already taken")]
    Duplicate(DuplicateField),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Persistence seam for registration sessions. The `*_taken` lookups scope to
/// completed registrations and exclude the caller's own session, which is
/// what makes re-submitting an identical edit payload idempotent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<RegistrationSession>, StoreError>;
    async fn save(&self, session: &RegistrationSession) -> Result<(), StoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
    async fn team_name_taken(&self, name: &str, exclude_session: &str) -> Result<bool, StoreError>;
    async fn index_number_taken(
        &self,
        index_number: &str,
        exclude_session: &str,
    ) -> Result<bool, StoreError>;
    async fn email_taken(&self, email: &str, exclude_session: &str) -> Result<bool, StoreError>;
    async fn completed_count(&self) -> Result<i64, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub value: String,
}

/// Pre-filled form handed back when the user asks to edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditForm {
    pub team_name: String,
    pub team_batch: String,
    pub members: Vec<Member>,
}

/// Full replacement payload submitted from the edit form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditPayload {
    pub team_name: String,
    pub team_batch: String,
    pub members: Vec<EditMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditMember {
    pub full_name: String,
    pub index_number: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowReply {
    pub text: String,
    pub buttons: Vec<Button>,
    pub edit_form: Option<EditForm>,
}

impl FlowReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn with_buttons(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            text: text.into(),
            buttons,
            edit_form: None,
        }
    }
}

fn batch_buttons() -> Vec<Button> {
    ALLOWED_BATCHES
        .iter()
        .map(|b| Button {
            text: format!("Batch {b}"),
            value: b.to_string(),
        })
        .collect()
}

fn yes_no_buttons() -> Vec<Button> {
    vec![
        Button { text: "Yes ✅".into(), value: "yes".into() },
        Button { text: "No, edit ✏️".into(), value: "no".into() },
    ]
}

pub struct RegistrationFlow {
    store: Arc<dyn RegistrationStore>,
    side_effects: Arc<SideEffects>,
    max_teams: i64,
}

impl RegistrationFlow {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        side_effects: Arc<SideEffects>,
        max_teams: i64,
    ) -> Self {
        Self {
            store,
            side_effects,
            max_teams,
        }
    }

    /// One registration-classified turn. Validation failures come back as a
    /// normal reply (the caller answers 200); only storage faults are `Err`.
    pub async fn handle_turn(
        &self,
        session: Option<RegistrationSession>,
        session_id: &str,
        message: &str,
    ) -> Result<FlowReply, StoreError> {
        match session {
            None => self.start_registration(session_id, message).await,
            Some(session) => match session.state {
                RegistrationState::BatchSelection => self.select_batch(session, message).await,
                RegistrationState::MemberDetails => self.collect_member(session, message).await,
                RegistrationState::Confirmation => self.confirm(session, message).await,
                RegistrationState::Done => Ok(FlowReply::text(
                    "Your team is already registered! 🎉 You can submit an edit to change \
                     your details, or reset to start over.",
                )),
            },
        }
    }

    async fn start_registration(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<FlowReply, StoreError> {
        let team_name = match validate_team_name(message) {
            Ok(name) => name,
            Err(e) => return Ok(FlowReply::text(e.to_string())),
        };

        if self.store.completed_count().await? >= self.max_teams {
            return Ok(FlowReply::text(
                "Registration is closed — we've reached the maximum number of teams. \
                 Follow the event page for waitlist announcements.",
            ));
        }
        if self.store.team_name_taken(&team_name, session_id).await? {
            return Ok(FlowReply::text(format!(
                "The name \"{team_name}\" is already taken by another team. Please pick a different name."
            )));
        }

        let session = RegistrationSession::new(session_id, &team_name);
        if let Some(reply) = self.save_or_conflict(&session).await? {
            return Ok(reply);
        }

        info!(session_id, team = %team_name, "registration started");
        Ok(FlowReply::with_buttons(
            format!(
                "Great, \"{team_name}\" it is! 🚀 Which batch is your team from?"
            ),
            batch_buttons(),
        ))
    }

    async fn select_batch(
        &self,
        mut session: RegistrationSession,
        message: &str,
    ) -> Result<FlowReply, StoreError> {
        let batch = match validate_batch(message) {
            Ok(batch) => batch,
            Err(e) => return Ok(FlowReply::with_buttons(e.to_string(), batch_buttons())),
        };

        session.team_batch = Some(batch.clone());
        session.current_member = 1;
        session.step = MemberStep::AwaitingName;
        session.state = RegistrationState::MemberDetails;
        if let Some(reply) = self.save_or_conflict(&session).await? {
            return Ok(reply);
        }

        Ok(FlowReply::text(format!(
            "Batch {batch} registered. Now let's add your {MEMBER_COUNT} members, starting \
             with the Team Leader. What is the Team Leader's full name?"
        )))
    }

    async fn collect_member(
        &self,
        mut session: RegistrationSession,
        message: &str,
    ) -> Result<FlowReply, StoreError> {
        let batch = session.team_batch.clone().unwrap_or_default();
        let label = RegistrationSession::member_label(session.current_member);

        match session.step.clone() {
            MemberStep::AwaitingName => {
                let full_name = match validate_full_name(message) {
                    Ok(name) => name,
                    Err(e) => return Ok(FlowReply::text(e.to_string())),
                };
                session.step = MemberStep::AwaitingIndex { full_name: full_name.clone() };
                if let Some(reply) = self.save_or_conflict(&session).await? {
                    return Ok(reply);
                }
                Ok(FlowReply::text(format!(
                    "Got it, {full_name}. What is {label}'s index number? \
                     (6 digits + capital letter, starting with {batch} — e.g. {batch}4001T)"
                )))
            }
            MemberStep::AwaitingIndex { full_name } => {
                let index_number = match validate_index_number(message, &batch) {
                    Ok(index) => index,
                    Err(e) => return Ok(FlowReply::text(e.to_string())),
                };
                if session.members.iter().any(|m| m.index_number == index_number) {
                    return Ok(FlowReply::text(format!(
                        "Index number {index_number} is already used by another member of your \
                         team. Each member needs their own index number."
                    )));
                }
                if self
                    .store
                    .index_number_taken(&index_number, &session.session_id)
                    .await?
                {
                    return Ok(FlowReply::text(format!(
                        "Index number {index_number} is already registered with another team. \
                         Each student can only register once."
                    )));
                }
                session.step = MemberStep::AwaitingEmail { full_name, index_number };
                if let Some(reply) = self.save_or_conflict(&session).await? {
                    return Ok(reply);
                }
                Ok(FlowReply::text(format!("And {label}'s email address?")))
            }
            MemberStep::AwaitingEmail { full_name, index_number } => {
                let email = match validate_email(message) {
                    Ok(email) => email,
                    Err(e) => return Ok(FlowReply::text(e.to_string())),
                };
                if session
                    .members
                    .iter()
                    .any(|m| m.email.eq_ignore_ascii_case(&email))
                {
                    return Ok(FlowReply::text(format!(
                        "The email {email} is already used by another member of your team. \
                         Each member needs their own email address."
                    )));
                }
                if self.store.email_taken(&email, &session.session_id).await? {
                    return Ok(FlowReply::text(format!(
                        "The email {email} is already registered with another team."
                    )));
                }

                session.members.push(Member {
                    full_name,
                    index_number,
                    batch: batch.clone(),
                    email,
                });
                session.step = MemberStep::AwaitingName;

                if session.members.len() < MEMBER_COUNT {
                    session.current_member += 1;
                    let next_label = RegistrationSession::member_label(session.current_member);
                    if let Some(reply) = self.save_or_conflict(&session).await? {
                        return Ok(reply);
                    }
                    Ok(FlowReply::text(format!(
                        "Member {} of {MEMBER_COUNT} saved ✅ What is {next_label}'s full name?",
                        session.members.len()
                    )))
                } else {
                    session.state = RegistrationState::Confirmation;
                    if let Some(reply) = self.save_or_conflict(&session).await? {
                        return Ok(reply);
                    }
                    Ok(FlowReply::with_buttons(
                        format!(
                            "All {MEMBER_COUNT} members saved! Here's your registration:\n\n{}\n\
                             Is everything correct?",
                            session.summary()
                        ),
                        yes_no_buttons(),
                    ))
                }
            }
        }
    }

    async fn confirm(
        &self,
        mut session: RegistrationSession,
        message: &str,
    ) -> Result<FlowReply, StoreError> {
        let normalized = message
            .trim()
            .trim_end_matches(['.', '!', '?'])
            .to_lowercase();

        match normalized.as_str() {
            "yes" => {
                session.state = RegistrationState::Done;
                if let Some(reply) = self.save_or_conflict(&session).await? {
                    return Ok(reply);
                }
                self.run_side_effects(&session).await;
                info!(session_id = %session.session_id, team = %session.team_name, "registration completed");
                Ok(FlowReply::text(format!(
                    "🎉 Team \"{}\" is registered for CodeRush 2025! A confirmation email is \
                     on its way. See you on 15 November — good luck!",
                    session.team_name
                )))
            }
            "no" => Ok(FlowReply {
                text: "No problem — update the details below and submit when you're ready."
                    .to_string(),
                buttons: Vec::new(),
                edit_form: Some(edit_form_from(&session)),
            }),
            _ => Ok(FlowReply::with_buttons(
                "Please reply \"yes\" to confirm your registration or \"no\" to edit it.",
                yes_no_buttons(),
            )),
        }
    }

    /// Commits a full replacement payload. Valid from the confirmation step
    /// (a create) or after completion (an update); both finalize to done and
    /// re-run the side effects.
    pub async fn apply_edit(
        &self,
        session_id: &str,
        payload: EditPayload,
    ) -> Result<FlowReply, StoreError> {
        let Some(mut session) = self.store.load(session_id).await? else {
            return Ok(FlowReply::text(
                "There's no registration for this session yet — send your team name to begin.",
            ));
        };
        if !matches!(
            session.state,
            RegistrationState::Confirmation | RegistrationState::Done
        ) {
            // No back-editing while member collection is still in progress.
            return Ok(FlowReply::text(format!(
                "Editing is only available once all details are collected. Right now I need \
                 you to {}.",
                session.pending_prompt()
            )));
        }

        let team_name = match validate_team_name(&payload.team_name) {
            Ok(name) => name,
            Err(e) => return Ok(FlowReply::text(e.to_string())),
        };
        let batch = match validate_batch(&payload.team_batch) {
            Ok(batch) => batch,
            Err(e) => return Ok(FlowReply::text(e.to_string())),
        };
        if payload.members.len() != MEMBER_COUNT {
            return Ok(FlowReply::text(format!(
                "A team needs exactly {MEMBER_COUNT} members — the edit has {}.",
                payload.members.len()
            )));
        }

        let mut members = Vec::with_capacity(MEMBER_COUNT);
        for (i, m) in payload.members.iter().enumerate() {
            let label = RegistrationSession::member_label(i + 1);
            let full_name = match validate_full_name(&m.full_name) {
                Ok(name) => name,
                Err(e) => return Ok(FlowReply::text(format!("{label}: {e}"))),
            };
            let index_number = match validate_index_number(&m.index_number, &batch) {
                Ok(index) => index,
                Err(e) => return Ok(FlowReply::text(format!("{label}: {e}"))),
            };
            let email = match validate_email(&m.email) {
                Ok(email) => email,
                Err(e) => return Ok(FlowReply::text(format!("{label}: {e}"))),
            };
            members.push(Member { full_name, index_number, batch: batch.clone(), email });
        }

        // Duplicates inside the payload itself.
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                if members[i].index_number == members[j].index_number {
                    return Ok(FlowReply::text(format!(
                        "Index number {} appears twice in the edit.",
                        members[i].index_number
                    )));
                }
                if members[i].email == members[j].email {
                    return Ok(FlowReply::text(format!(
                        "The email {} appears twice in the edit.",
                        members[i].email
                    )));
                }
            }
        }

        // Collisions with other completed teams. The session's own rows are
        // excluded, so an identical resubmission sails through.
        if self.store.team_name_taken(&team_name, session_id).await? {
            return Ok(FlowReply::text(format!(
                "The name \"{team_name}\" is already taken by another team."
            )));
        }
        for m in &members {
            if self.store.index_number_taken(&m.index_number, session_id).await? {
                return Ok(FlowReply::text(format!(
                    "Index number {} is already registered with another team.",
                    m.index_number
                )));
            }
            if self.store.email_taken(&m.email, session_id).await? {
                return Ok(FlowReply::text(format!(
                    "The email {} is already registered with another team.",
                    m.email
                )));
            }
        }

        let was_done = session.state == RegistrationState::Done;
        session.team_name = team_name;
        session.team_batch = Some(batch);
        session.members = members;
        session.current_member = MEMBER_COUNT;
        session.step = MemberStep::AwaitingName;
        session.state = RegistrationState::Done;
        session.updated_at = Utc::now();

        if let Some(reply) = self.save_or_conflict(&session).await? {
            return Ok(reply);
        }
        self.run_side_effects(&session).await;

        info!(session_id, team = %session.team_name, was_done, "edit committed");
        Ok(FlowReply::text(if was_done {
            format!(
                "Your registration has been updated ✅\n\n{}",
                session.summary()
            )
        } else {
            format!(
                "🎉 Team \"{}\" is registered for CodeRush 2025!\n\n{}",
                session.team_name,
                session.summary()
            )
        }))
    }

    /// Abandons the session entirely; the next message from this client
    /// starts a brand-new registration.
    pub async fn reset(&self, session_id: &str) -> Result<FlowReply, StoreError> {
        self.store.delete(session_id).await?;
        info!(session_id, "session reset");
        Ok(FlowReply::text(
            "Your registration has been cleared. Send your team name whenever you're ready \
             to start again!",
        ))
    }

    /// Persists the session, converting a commit-time uniqueness violation
    /// into the user-facing reply it deserves. `Ok(None)` means saved.
    async fn save_or_conflict(
        &self,
        session: &RegistrationSession,
    ) -> Result<Option<FlowReply>, StoreError> {
        match self.store.save(session).await {
            Ok(()) => Ok(None),
            Err(StoreError::Duplicate(field)) => {
                warn!(session_id = %session.session_id, %field, "commit-time uniqueness conflict");
                Ok(Some(FlowReply::text(format!(
                    "Bad luck — that {field} was just taken by another team. Please provide a \
                     different one."
                ))))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_side_effects(&self, session: &RegistrationSession) {
        let summary = RegistrationSummary {
            session_id: session.session_id.clone(),
            team_name: session.team_name.clone(),
            team_batch: session.team_batch.clone().unwrap_or_default(),
            members: session.members.clone(),
            completed_at: Utc::now(),
        };
        // Outcomes are logged inside; a failed side channel never fails the turn.
        let _ = self.side_effects.dispatch(&summary).await;
    }
}

fn edit_form_from(session: &RegistrationSession) -> EditForm {
    EditForm {
        team_name: session.team_name.clone(),
        team_batch: session.team_batch.clone().unwrap_or_default(),
        members: session.members.clone(),
    }
}
