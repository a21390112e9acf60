//! Content policy filter. Stateless; runs on every inbound message before
//! intent classification. Rule order matters: the conversational allow-list
//! must be checked before the keyword blocklists so that pleasantries are
//! never swallowed, but after the spam shapes (which no pleasantry matches).

use once_cell::sync::Lazy;
use regex::Regex;

const PROMO_WORDS: &[&str] = &[
    "buy now", "discount", "purchase", "limited offer", "promo code", "free money",
    "earn cash", "lottery", "jackpot", "investment opportunity", "crypto giveaway",
];

const SOLICITATION_PHRASES: &[&str] = &[
    "click here", "visit website", "visit my website", "check out my", "subscribe to",
    "follow me on", "dm me", "join my channel",
];

/// Short conversational phrases that bypass all keyword blocking.
const ALLOWED_PHRASES: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "ok", "okay", "cool", "nice",
    "great", "awesome", "bye", "goodbye", "see you", "good morning", "good afternoon",
    "good evening", "good night", "how are you", "nice to meet you", "you're welcome",
    "welcome", "no problem", "sure",
];

const INAPPROPRIATE_WORDS: &[&str] = &[
    "porn", "nude", "naked", "sexual", "xxx", "cocaine", "heroin", "marijuana",
    "weed", "meth", "kill you", "murder", "terrorist", "bomb making", "nazi",
    "racist", "fuck", "bitch", "slut",
];

const OFF_TOPIC_WORDS: &[&str] = &[
    "weather", "movie", "film", "netflix", "song", "music", "cricket score",
    "football score", "tell me a joke", "recipe", "horoscope", "capital of",
    "president of", "stock market", "install windows", "fix my laptop",
    "fix my phone", "homework",
];

static DISGUISED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Programming-tutorial requests dressed up as questions.
        r"(?i)^what\s+is\s+(react|angular|vue|python|java|javascript|node|rust|docker)\b",
        r"(?i)\bhow\s+to\s+(code|program|learn)\b",
        r"(?i)^teach\s+me\b",
        r"(?i)\bwrite\s+(me\s+)?(a|some)\s+(code|program|script)\b",
        // Disguised inappropriate requests.
        r"(?i)\b(show|send)\s+me\s+.*(nude|porn|naked)",
        r"(?i)\bhow\s+to\s+(hack|cheat)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static policy pattern"))
    .collect()
});

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

fn has_repeated_run(message: &str, run: usize) -> bool {
    let mut count = 0;
    let mut last = None;
    for c in message.chars() {
        if Some(c) == last {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            last = Some(c);
            count = 1;
        }
    }
    false
}

fn is_allowed_phrase(stripped: &str) -> bool {
    ALLOWED_PHRASES.iter().any(|phrase| {
        stripped == *phrase
            || stripped.starts_with(&format!("{phrase} "))
            || stripped.ends_with(&format!(" {phrase}"))
    })
}

/// Returns true when the message must be redirected instead of processed.
pub fn is_blocked(message: &str) -> bool {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lower = trimmed.to_lowercase();
    let stripped = strip_punctuation(trimmed);

    // 1. Spam shapes.
    if has_repeated_run(trimmed, 5) {
        return true;
    }
    if PROMO_WORDS.iter().any(|w| lower.contains(w)) {
        return true;
    }
    if SOLICITATION_PHRASES.iter().any(|w| lower.contains(w)) {
        return true;
    }
    // Digits-only spam. Two-digit messages stay valid: batch answers are "23"/"24".
    if trimmed.len() >= 3 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // 2. Allow-list escape hatch for pleasantries.
    if is_allowed_phrase(&stripped) {
        return false;
    }

    // 3. Inappropriate content.
    if INAPPROPRIATE_WORDS.iter().any(|w| lower.contains(w)) {
        return true;
    }

    // 4. Off-topic keywords.
    if OFF_TOPIC_WORDS.iter().any(|w| lower.contains(w)) {
        return true;
    }

    // 5. Disguised requests.
    DISGUISED_PATTERNS.iter().any(|re| re.is_match(trimmed))
}
