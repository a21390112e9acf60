//! One chat turn, end to end: sentinels first, then the content policy,
//! then intent classification, then the branch the intent picks. The
//! registration session is loaded once per turn and shared by every branch
//! so a question asked mid-registration can carry the resume reminder.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::intent::{classify, Intent};
use super::machine::{
    Button, EditForm, EditPayload, FlowReply, RegistrationFlow, RegistrationStore, StoreError,
    EDIT_COMMAND, RESET_COMMAND,
};
use super::policy;
use super::state::RegistrationSession;
use crate::services::AnswerComposer;
use crate::utils::RateLimiter;

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session_id: String,
    pub message: String,
    pub edited_data: Option<EditPayload>,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub reply: String,
    pub buttons: Vec<Button>,
    pub edit_form: Option<EditForm>,
    pub message_id: String,
}

impl ChatReply {
    fn from_flow(reply: FlowReply) -> Self {
        Self {
            reply: reply.text,
            buttons: reply.buttons,
            edit_form: reply.edit_form,
            message_id: Uuid::new_v4().to_string(),
        }
    }

    fn text(reply: String) -> Self {
        Self {
            reply,
            buttons: Vec::new(),
            edit_form: None,
            message_id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session id is required")]
    MissingSessionId,
    #[error("too many questions, slow down")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => Self::Internal(e),
            StoreError::Duplicate(field) => {
                Self::Internal(anyhow::anyhow!("unhandled uniqueness conflict on {field}"))
            }
        }
    }
}

const BLOCKED_REPLY: &str = "Let's keep things friendly and on-topic! 😊 I'm here to help with \
     CodeRush 2025 — ask me about the event, or send your team name to register.";

const GREETING_REPLY: &str = "Hey there! 👋 Welcome to the CodeRush 2025 assistant. I can answer \
     questions about the hackathon — dates, venue, prizes, rules — or register your team. \
     Just send your team name to get started!";

const CONVERSATIONAL_REPLY: &str = "Happy to help! 😊 Ask me anything about CodeRush 2025, or \
     send your team name if you'd like to register.";

pub struct ChatEngine {
    store: Arc<dyn RegistrationStore>,
    flow: RegistrationFlow,
    composer: AnswerComposer,
    rate_limiter: RateLimiter,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        flow: RegistrationFlow,
        composer: AnswerComposer,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            flow,
            composer,
            rate_limiter,
        }
    }

    pub async fn handle(&self, turn: ChatTurn) -> Result<ChatReply, EngineError> {
        let session_id = turn.session_id.trim();
        if session_id.is_empty() {
            return Err(EngineError::MissingSessionId);
        }

        // Sentinels bypass classification entirely.
        if turn.message.trim() == RESET_COMMAND {
            return Ok(ChatReply::from_flow(self.flow.reset(session_id).await?));
        }
        if turn.message.trim() == EDIT_COMMAND || turn.edited_data.is_some() {
            let Some(payload) = turn.edited_data else {
                return Err(EngineError::Internal(anyhow::anyhow!(
                    "edit submitted without a payload"
                )));
            };
            return Ok(ChatReply::from_flow(
                self.flow.apply_edit(session_id, payload).await?,
            ));
        }

        let session = self.store.load(session_id).await?;
        let message = turn.message.as_str();

        if policy::is_blocked(message) {
            debug!(session_id, "message blocked by content policy");
            return Ok(ChatReply::text(with_reminder(
                BLOCKED_REPLY.to_string(),
                session.as_ref(),
            )));
        }

        let intent = classify(message, session.as_ref().map(|s| s.state));
        debug!(session_id, ?intent, "turn classified");

        match intent {
            Intent::Greeting => Ok(ChatReply::text(with_reminder(
                GREETING_REPLY.to_string(),
                session.as_ref(),
            ))),
            Intent::Conversational => Ok(ChatReply::text(with_reminder(
                CONVERSATIONAL_REPLY.to_string(),
                session.as_ref(),
            ))),
            Intent::Question => {
                if !self.rate_limiter.check(session_id) {
                    return Err(EngineError::RateLimited);
                }
                let reply = self.composer.answer(message, session.as_ref()).await;
                Ok(ChatReply::text(reply))
            }
            Intent::Registration => Ok(ChatReply::from_flow(
                self.flow.handle_turn(session, session_id, message).await?,
            )),
        }
    }
}

fn with_reminder(reply: String, session: Option<&RegistrationSession>) -> String {
    match session.and_then(|s| s.resume_reminder()) {
        Some(reminder) => format!("{reply}\n\n{reminder}"),
        None => reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::machine::{EditMember, MockRegistrationStore};
    use crate::chat::state::{Member, MemberStep, RegistrationState, MEMBER_COUNT};
    use crate::services::retrieval::{MockRetriever, Retriever};
    use crate::services::side_effects::SideEffects;
    use crate::knowledge::KnowledgeDocument;
    use std::time::Duration;

    fn prizes_doc() -> KnowledgeDocument {
        KnowledgeDocument {
            id: "prizes".into(),
            category: "event".into(),
            question: "What are the prizes?".into(),
            answer: "The winning team takes home LKR 100,000.".into(),
            keywords: Default::default(),
            priority: 1,
        }
    }

    fn engine_with(
        store: MockRegistrationStore,
        retriever: MockRetriever,
        max_questions: u32,
    ) -> ChatEngine {
        let store: Arc<dyn RegistrationStore> = Arc::new(store);
        let flow = RegistrationFlow::new(
            store.clone(),
            Arc::new(SideEffects::new(None, None, Duration::from_secs(1))),
            100,
        );
        let retriever: Arc<dyn Retriever> = Arc::new(retriever);
        let composer = AnswerComposer::new(
            retriever,
            None,
            "system".to_string(),
            Duration::from_millis(200),
            3,
        );
        ChatEngine::new(
            store,
            flow,
            composer,
            RateLimiter::new(max_questions, Duration::from_secs(60)),
        )
    }

    fn turn(session_id: &str, message: &str) -> ChatTurn {
        ChatTurn {
            session_id: session_id.to_string(),
            message: message.to_string(),
            edited_data: None,
        }
    }

    fn idle_store() -> MockRegistrationStore {
        let mut store = MockRegistrationStore::new();
        store.expect_load().returning(|_| Ok(None));
        store
    }

    #[tokio::test]
    async fn blank_session_id_is_rejected() {
        let engine = engine_with(MockRegistrationStore::new(), MockRetriever::new(), 10);
        let err = engine.handle(turn("   ", "hello")).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingSessionId));
    }

    #[tokio::test]
    async fn blocked_message_never_reaches_retrieval() {
        let mut retriever = MockRetriever::new();
        retriever.expect_retrieve().times(0);
        let engine = engine_with(idle_store(), retriever, 10);

        let reply = engine.handle(turn("s1", "what is react")).await.unwrap();
        assert!(reply.reply.contains("on-topic"));
    }

    #[tokio::test]
    async fn blocked_message_mid_registration_keeps_the_reminder() {
        let mut store = MockRegistrationStore::new();
        store.expect_load().returning(|_| {
            let mut s = RegistrationSession::new("s1", "TeamRocket");
            s.state = RegistrationState::MemberDetails;
            s.team_batch = Some("23".into());
            s.step = MemberStep::AwaitingName;
            Ok(Some(s))
        });
        let mut retriever = MockRetriever::new();
        retriever.expect_retrieve().times(0);
        let engine = engine_with(store, retriever, 10);

        let reply = engine
            .handle(turn("s1", "click here to win free money"))
            .await
            .unwrap();
        assert!(reply.reply.contains("still in progress"));
    }

    #[tokio::test]
    async fn greeting_gets_the_welcome_reply() {
        let engine = engine_with(idle_store(), MockRetriever::new(), 10);
        let reply = engine.handle(turn("s1", "hiii")).await.unwrap();
        assert!(reply.reply.contains("Welcome"));
    }

    #[tokio::test]
    async fn question_goes_through_the_composer() {
        let mut retriever = MockRetriever::new();
        retriever
            .expect_retrieve()
            .returning(|_, _| Ok(vec![prizes_doc()]));
        let engine = engine_with(idle_store(), retriever, 10);

        let reply = engine
            .handle(turn("s1", "what are the prizes"))
            .await
            .unwrap();
        assert!(reply.reply.contains("LKR 100,000"));
    }

    #[tokio::test]
    async fn questions_beyond_the_window_are_rate_limited() {
        let mut retriever = MockRetriever::new();
        retriever
            .expect_retrieve()
            .returning(|_, _| Ok(vec![prizes_doc()]));
        let engine = engine_with(idle_store(), retriever, 1);

        engine
            .handle(turn("s1", "what are the prizes"))
            .await
            .unwrap();
        let err = engine
            .handle(turn("s1", "when is the event"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RateLimited));
    }

    #[tokio::test]
    async fn team_name_starts_a_registration() {
        let mut store = idle_store();
        store.expect_completed_count().returning(|| Ok(0));
        store.expect_team_name_taken().returning(|_, _| Ok(false));
        store.expect_save().times(1).returning(|_| Ok(()));
        let engine = engine_with(store, MockRetriever::new(), 10);

        let reply = engine.handle(turn("s1", "TeamRocket")).await.unwrap();
        assert!(reply.reply.contains("Which batch"));
        assert_eq!(reply.buttons.len(), 2);
    }

    #[tokio::test]
    async fn reset_sentinel_clears_the_session() {
        let mut store = MockRegistrationStore::new();
        store.expect_delete().times(1).returning(|_| Ok(()));
        let engine = engine_with(store, MockRetriever::new(), 10);

        let reply = engine.handle(turn("s1", RESET_COMMAND)).await.unwrap();
        assert!(reply.reply.contains("cleared"));
    }

    #[tokio::test]
    async fn edit_payload_routes_to_apply_edit() {
        let mut store = MockRegistrationStore::new();
        store.expect_load().returning(|_| {
            let mut s = RegistrationSession::new("s1", "TeamRocket");
            s.state = RegistrationState::Confirmation;
            s.team_batch = Some("23".into());
            s.members = (1..=MEMBER_COUNT)
                .map(|i| Member {
                    full_name: format!("Member Number{i}"),
                    index_number: format!("23400{i}T"),
                    batch: "23".into(),
                    email: format!("member{i}@uni.lk"),
                })
                .collect();
            Ok(Some(s))
        });
        store.expect_team_name_taken().returning(|_, _| Ok(false));
        store.expect_index_number_taken().returning(|_, _| Ok(false));
        store.expect_email_taken().returning(|_, _| Ok(false));
        store.expect_save().times(1).returning(|_| Ok(()));
        let engine = engine_with(store, MockRetriever::new(), 10);

        let payload = EditPayload {
            team_name: "TeamRocket".into(),
            team_batch: "23".into(),
            members: (1..=MEMBER_COUNT)
                .map(|i| EditMember {
                    full_name: format!("Member Number{i}"),
                    index_number: format!("23400{i}T"),
                    email: format!("member{i}@uni.lk"),
                })
                .collect(),
        };
        let reply = engine
            .handle(ChatTurn {
                session_id: "s1".into(),
                message: EDIT_COMMAND.into(),
                edited_data: Some(payload),
            })
            .await
            .unwrap();
        assert!(reply.reply.contains("registered for CodeRush 2025"));
    }

    #[tokio::test]
    async fn done_session_questions_are_answered_not_registered() {
        let mut store = MockRegistrationStore::new();
        store.expect_load().returning(|_| {
            let mut s = RegistrationSession::new("s1", "TeamRocket");
            s.state = RegistrationState::Done;
            Ok(Some(s))
        });
        let mut retriever = MockRetriever::new();
        retriever
            .expect_retrieve()
            .returning(|_, _| Ok(vec![prizes_doc()]));
        let engine = engine_with(store, retriever, 10);

        let reply = engine
            .handle(turn("s1", "what do winners get"))
            .await
            .unwrap();
        assert!(reply.reply.contains("LKR 100,000"));
        // No reminder once done.
        assert!(!reply.reply.contains("still in progress"));
    }
}
