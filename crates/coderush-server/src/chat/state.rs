//! Conversation state for a registration session. One row per session id;
//! reloaded from storage at the start of every turn and written back before
//! the reply goes out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exactly this many members per team, leader included.
pub const MEMBER_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    BatchSelection,
    MemberDetails,
    Confirmation,
    Done,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchSelection => "batch_selection",
            Self::MemberDetails => "member_details",
            Self::Confirmation => "confirmation",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "batch_selection" => Some(Self::BatchSelection),
            "member_details" => Some(Self::MemberDetails),
            "confirmation" => Some(Self::Confirmation),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// The member currently being collected, one field per turn. Modelled as a
/// sum type so "which field is next" is never ambiguous and a half-filled
/// record cannot be mistaken for a complete one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MemberStep {
    AwaitingName,
    AwaitingIndex {
        full_name: String,
    },
    AwaitingEmail {
        full_name: String,
        index_number: String,
    },
}

/// A completed member record. Frozen once pushed into the member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub full_name: String,
    pub index_number: String,
    pub batch: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSession {
    pub session_id: String,
    pub state: RegistrationState,
    pub team_name: String,
    pub team_batch: Option<String>,
    pub members: Vec<Member>,
    /// 1-based index of the member being collected.
    pub current_member: usize,
    pub step: MemberStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationSession {
    pub fn new(session_id: &str, team_name: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            state: RegistrationState::BatchSelection,
            team_name: team_name.to_string(),
            team_batch: None,
            members: Vec::new(),
            current_member: 1,
            step: MemberStep::AwaitingName,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member_label(position: usize) -> String {
        if position == 1 {
            "the Team Leader".to_string()
        } else {
            format!("Member {position}")
        }
    }

    /// What the state machine is waiting for right now, phrased for the user.
    pub fn pending_prompt(&self) -> String {
        let label = Self::member_label(self.current_member);
        match self.state {
            RegistrationState::BatchSelection => {
                "pick your batch (23 or 24)".to_string()
            }
            RegistrationState::MemberDetails => match &self.step {
                MemberStep::AwaitingName => format!("send {label}'s full name"),
                MemberStep::AwaitingIndex { .. } => {
                    format!("send {label}'s index number (6 digits + capital letter, e.g. 234001T)")
                }
                MemberStep::AwaitingEmail { .. } => format!("send {label}'s email address"),
            },
            RegistrationState::Confirmation => {
                "reply \"yes\" to confirm your registration or \"no\" to edit it".to_string()
            }
            RegistrationState::Done => "your registration is complete".to_string(),
        }
    }

    /// Appended to every non-registration reply while a registration is in
    /// flight, so answering a question never loses the user's place.
    pub fn resume_reminder(&self) -> Option<String> {
        if self.state == RegistrationState::Done {
            return None;
        }
        Some(format!(
            "📝 Your registration for team \"{}\" is still in progress — {} to continue.",
            self.team_name,
            self.pending_prompt()
        ))
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Team: {}\nBatch: {}\n",
            self.team_name,
            self.team_batch.as_deref().unwrap_or("-")
        );
        for (i, m) in self.members.iter().enumerate() {
            let label = Self::member_label(i + 1);
            out.push_str(&format!(
                "{}. {} ({}) — {} — {}\n",
                i + 1,
                m.full_name,
                label,
                m.index_number,
                m.email
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> RegistrationSession {
        RegistrationSession::new("s1", "TeamRocket")
    }

    #[test]
    fn new_session_awaits_batch() {
        let s = session();
        assert_eq!(s.state, RegistrationState::BatchSelection);
        assert_eq!(s.current_member, 1);
        assert_eq!(s.step, MemberStep::AwaitingName);
        assert!(s.pending_prompt().contains("batch"));
    }

    #[test]
    fn reminder_names_the_pending_field() {
        let mut s = session();
        s.state = RegistrationState::MemberDetails;
        s.team_batch = Some("23".into());
        s.step = MemberStep::AwaitingIndex { full_name: "Jane".into() };
        let reminder = s.resume_reminder().unwrap();
        assert!(reminder.contains("index number"));
        assert!(reminder.contains("TeamRocket"));
    }

    #[test]
    fn done_session_has_no_reminder() {
        let mut s = session();
        s.state = RegistrationState::Done;
        assert!(s.resume_reminder().is_none());
    }

    #[test]
    fn member_step_roundtrips_through_json() {
        let step = MemberStep::AwaitingEmail {
            full_name: "Jane Silva".into(),
            index_number: "234001T".into(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step"], "awaiting_email");
        let back: MemberStep = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn state_round_trips_as_str() {
        for s in [
            RegistrationState::BatchSelection,
            RegistrationState::MemberDetails,
            RegistrationState::Confirmation,
            RegistrationState::Done,
        ] {
            assert_eq!(RegistrationState::parse(s.as_str()), Some(s));
        }
    }
}
