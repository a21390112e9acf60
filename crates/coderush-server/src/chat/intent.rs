//! Intent classification for inbound chat messages. Deterministic, layered
//! heuristics only, no model call, so every branch is unit-testable and the
//! classifier keeps working when the LLM collaborator is down.
//!
//! Decision order (first match wins):
//! 1. Greeting patterns, only before a registration exists.
//! 2. Curated conversational phrases, unless an event keyword overrides.
//! 3. Structural registration shapes (email, index number, batch, yes/no).
//! 4. Mid-registration default to registration data, with a narrow
//!    question-shaped escape hatch.
//! 5. Idle: question structure wins, then team-name shape, then question.

use once_cell::sync::Lazy;
use regex::Regex;

use super::state::RegistrationState;
use super::validation::{
    is_batch_value, is_yes_no, looks_like_email, looks_like_index_number, TEAM_NAME_MAX,
    TEAM_NAME_MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Question,
    Registration,
    Greeting,
    Conversational,
}

static GREETING_RE: Lazy<Regex> = Lazy::new(|| {
    // Covers elongated forms: "hiii", "heyyy", "yoo", "supp".
    Regex::new(r"(?i)^(hi+|he+y+|hello+|yo+|su+p+|howdy|hiya|good\s+(morning|afternoon|evening))\b")
        .expect("static pattern")
});

const CONVERSATIONAL_PHRASES: &[&str] = &[
    "how are you", "how's it going", "hows it going", "thanks", "thank you", "thx",
    "ok", "okay", "cool", "nice", "great", "awesome", "got it", "alright", "sure",
    "bye", "goodbye", "see you", "good night", "lol", "haha", "hmm", "hm",
    "who are you", "what's up", "whats up", "you're welcome", "no problem",
];

const EVENT_KEYWORDS: &[&str] = &[
    "event", "venue", "location", "team", "member", "submission", "submit",
    "register", "registration", "hackathon", "coderush", "deadline", "prize",
    "date", "batch", "schedule", "rules", "judging",
];

const HELP_WORDS: &[&str] = &["help", "format", "example", "explain", "tell me", "show me"];

const INTERROGATIVES: &[&str] = &["what", "when", "where", "who", "why", "how", "which", "can", "is", "are", "do", "does"];

const INFO_REQUEST_VERBS: &[&str] = &["provide", "give", "tell", "show", "explain", "describe", "send"];

static TEAM_NAME_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s\-_]+$").expect("static pattern"));

fn strip_punctuation(message: &str) -> String {
    message
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '\'')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_greeting(message: &str) -> bool {
    let stripped = strip_punctuation(message);
    if stripped.is_empty() {
        return false;
    }
    // A greeting with a long tail ("hello, how do I submit?") is no longer
    // just a greeting.
    GREETING_RE.is_match(&stripped) && stripped.split_whitespace().count() <= 4
}

fn contains_event_keyword(stripped: &str) -> bool {
    stripped
        .split_whitespace()
        .any(|w| EVENT_KEYWORDS.contains(&w))
}

fn is_conversational_phrase(stripped: &str) -> bool {
    CONVERSATIONAL_PHRASES.iter().any(|phrase| {
        stripped == *phrase
            || stripped.starts_with(&format!("{phrase} "))
            || stripped.ends_with(&format!(" {phrase}"))
    })
}

fn matches_registration_shape(message: &str) -> bool {
    looks_like_email(message)
        || looks_like_index_number(message)
        || is_batch_value(message)
        || is_yes_no(message)
}

/// Question-shaped, by structure rather than keywords: the escape hatch that
/// lets a user mid-registration ask for help without feeding garbage data.
fn has_question_structure(message: &str, stripped: &str) -> bool {
    if message.contains('?') {
        return true;
    }
    let words: Vec<&str> = stripped.split_whitespace().collect();
    if let Some(first) = words.first() {
        if INTERROGATIVES.contains(first) && words.len() >= 3 {
            return true;
        }
        if INFO_REQUEST_VERBS.contains(first) {
            return true;
        }
    }
    HELP_WORDS.iter().any(|w| stripped.contains(w))
}

fn looks_like_team_name(message: &str) -> bool {
    let trimmed = message.trim();
    trimmed.len() >= TEAM_NAME_MIN
        && trimmed.len() <= TEAM_NAME_MAX
        && TEAM_NAME_SHAPE_RE.is_match(trimmed)
}

/// Classify a message given the persisted conversation state (`None` means no
/// registration row exists yet).
pub fn classify(message: &str, state: Option<RegistrationState>) -> Intent {
    let trimmed = message.trim();
    let stripped = strip_punctuation(trimmed);

    // 1. Greetings, only while idle.
    if state.is_none() && is_greeting(trimmed) {
        return Intent::Greeting;
    }

    // 2. Small talk, unless an event keyword pulls it back to a question.
    if is_conversational_phrase(&stripped) && !matches_registration_shape(trimmed) {
        if contains_event_keyword(&stripped) {
            return Intent::Question;
        }
        return Intent::Conversational;
    }

    // 3. Structural data shapes outrank every keyword heuristic.
    if matches_registration_shape(trimmed) {
        return Intent::Registration;
    }

    match state {
        // 4. Mid-registration: free text is data unless it is question-shaped.
        Some(RegistrationState::BatchSelection)
        | Some(RegistrationState::MemberDetails)
        | Some(RegistrationState::Confirmation) => {
            if has_question_structure(trimmed, &stripped) || contains_event_keyword(&stripped) {
                Intent::Question
            } else {
                Intent::Registration
            }
        }
        // A completed registration takes no more free-text data.
        Some(RegistrationState::Done) => Intent::Question,
        // 5. Idle: answer-first bias.
        None => {
            if trimmed.is_empty() {
                return Intent::Question;
            }
            if has_question_structure(trimmed, &stripped) {
                return Intent::Question;
            }
            if looks_like_team_name(trimmed) {
                return Intent::Registration;
            }
            Intent::Question
        }
    }
}
