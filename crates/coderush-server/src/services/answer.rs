//! Answer Composer: turns a free-text question into a final reply by
//! combining retrieval with the generation collaborator. The composer never
//! returns nothing: generation failure falls back to the top retrieved
//! answer, a retrieval miss falls back to the capability menu, and a
//! mid-registration session always gets its resume reminder appended.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::chat::state::RegistrationSession;
use crate::knowledge::{KnowledgeDocument, VENUE_MAP_LINK};
use crate::services::retrieval::Retriever;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

const BARE_INTERROGATIVES: &[&str] = &["what", "when", "where", "who", "why", "how", "which"];

const LOCATION_WORDS: &[&str] = &["where", "venue", "location", "place", "map", "directions", "address"];

/// Hand-picked widening queries, tried when the original question retrieves
/// nothing. Order matters: the first matching topics run first.
const TOPIC_RETRIES: &[(&[&str], &str)] = &[
    (&["when", "date", "time", "schedule", "day"], "event date and schedule"),
    (&["where", "venue", "location", "place", "map"], "event location venue"),
    (&["register", "registration", "signup", "join", "apply"], "how to register"),
    (&["team", "member", "leader", "group"], "team size and members"),
    (&["submit", "submission", "deadline", "project"], "project submission"),
    (&["tech", "technology", "language", "framework", "stack", "laptop"], "technology requirements"),
    (&["rule", "rules", "guideline", "allowed", "conduct"], "rules and guidelines"),
];

const CAPABILITY_MENU: &str = "I couldn't find anything about that, sorry! I can help with:\n\
     • 📅 Dates and schedule\n\
     • 📍 Venue and directions\n\
     • 📝 Team registration (just send your team name to start)\n\
     • 👥 Team size and eligibility\n\
     • 🚀 Project submission and judging\n\
     • 🏆 Prizes\n\
     Ask me about any of these!";

pub struct AnswerComposer {
    retriever: Arc<dyn Retriever>,
    generator: Option<Arc<dyn GenerationProvider>>,
    system_prompt: String,
    generation_timeout: Duration,
    top_k: usize,
}

impl AnswerComposer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Option<Arc<dyn GenerationProvider>>,
        system_prompt: String,
        generation_timeout: Duration,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            generator,
            system_prompt,
            generation_timeout,
            top_k,
        }
    }

    pub async fn answer(&self, question: &str, session: Option<&RegistrationSession>) -> String {
        let trimmed = question.trim();

        if trimmed.is_empty() {
            return self.with_reminder(
                "I didn't catch that — what would you like to know about CodeRush 2025?"
                    .to_string(),
                session,
            );
        }

        let bare = trimmed
            .trim_end_matches(['?', '!', '.'])
            .to_lowercase();
        if BARE_INTERROGATIVES.contains(&bare.as_str()) {
            return self.with_reminder(
                format!(
                    "Could you give me a bit more? For example: \"{bare} is the event\", \
                     \"{bare} do I register\", or ask about the venue, prizes, or submissions."
                ),
                session,
            );
        }

        let docs = self.retrieve_with_retries(trimmed).await;
        if docs.is_empty() {
            return self.with_reminder(CAPABILITY_MENU.to_string(), session);
        }

        let context = build_context(&docs, session);
        let mut reply = self.generate_or_fallback(trimmed, &context, &docs).await;

        // Hard rule: location answers always carry the official map link.
        let lower = trimmed.to_lowercase();
        if LOCATION_WORDS.iter().any(|w| lower.contains(w)) && !reply.contains(VENUE_MAP_LINK) {
            reply.push_str(&format!("\n📍 {VENUE_MAP_LINK}"));
        }

        self.with_reminder(reply, session)
    }

    async fn retrieve_with_retries(&self, question: &str) -> Vec<KnowledgeDocument> {
        match self.retriever.retrieve(question, self.top_k).await {
            Ok(docs) if !docs.is_empty() => return docs,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "retrieval failed for original question"),
        }

        let lower = question.to_lowercase();
        for (triggers, retry_query) in TOPIC_RETRIES {
            if triggers.iter().any(|t| lower.contains(t)) {
                debug!(retry_query, "retrying retrieval with topic query");
                if let Ok(docs) = self.retriever.retrieve(retry_query, self.top_k).await {
                    if !docs.is_empty() {
                        return docs;
                    }
                }
            }
        }

        // Last resort: the general overview.
        self.retriever
            .retrieve("about the coderush hackathon", self.top_k)
            .await
            .unwrap_or_default()
    }

    async fn generate_or_fallback(
        &self,
        question: &str,
        context: &str,
        docs: &[KnowledgeDocument],
    ) -> String {
        let raw_answer = docs[0].answer.clone();

        let Some(generator) = &self.generator else {
            return raw_answer;
        };

        let user_prompt = format!("Context:\n{context}\n\nQuestion: {question}");
        match tokio::time::timeout(
            self.generation_timeout,
            generator.generate(&self.system_prompt, &user_prompt),
        )
        .await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                warn!("generation returned empty text, using raw answer");
                raw_answer
            }
            Ok(Err(e)) => {
                warn!(error = %e, "generation failed, using raw answer");
                raw_answer
            }
            Err(_) => {
                warn!("generation timed out, using raw answer");
                raw_answer
            }
        }
    }

    fn with_reminder(&self, reply: String, session: Option<&RegistrationSession>) -> String {
        match session.and_then(|s| s.resume_reminder()) {
            Some(reminder) => format!("{reply}\n\n{reminder}"),
            None => reply,
        }
    }
}

fn build_context(docs: &[KnowledgeDocument], session: Option<&RegistrationSession>) -> String {
    let mut context = String::new();
    for doc in docs {
        context.push_str(&format!("Q: {}\nA: {}\n\n", doc.question, doc.answer));
    }
    if let Some(s) = session {
        if s.resume_reminder().is_some() {
            context.push_str(&format!(
                "Note: the user is mid-registration; the next step is to {}.\n",
                s.pending_prompt()
            ));
        }
    }
    context
}
