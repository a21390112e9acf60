//! Field validators for the registration flow. Every error message doubles as
//! the user-facing re-prompt, so it names what was wrong and what is expected.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Cohorts eligible for CodeRush 2025. Index numbers carry this prefix.
pub const ALLOWED_BATCHES: &[&str] = &["23", "24"];

pub const TEAM_NAME_MIN: usize = 3;
pub const TEAM_NAME_MAX: usize = 30;

static TEAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s\-_]+$").expect("static pattern"));

static INDEX_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{6}[A-Z]$").expect("static pattern"));

/// Loose shape used by the intent classifier: a lowercase trailing letter
/// still routes to the registration branch so the validator can explain
/// exactly what is wrong with it.
static INDEX_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{6}[A-Za-z]$").expect("static pattern"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9][a-zA-Z0-9.\-]*\.[a-zA-Z]{2,}$")
        .expect("static pattern")
});

const RESERVED_TEAM_NAMES: &[&str] = &[
    "admin", "administrator", "system", "root", "moderator", "bot", "null",
    "undefined", "coderush", "organizer",
];

const PLACEHOLDER_TOKENS: &[&str] = &["asdf", "qwerty", "abc123", "xxx", "placeholder", "sample"];

const NON_ANSWERS: &[&str] = &[
    "idk", "dunno", "skip", "n/a", "na", "none", "no idea", "nothing", "whatever",
    "dont know", "don't know", "not sure", "pass",
];

const QUESTION_WORDS: &[&str] = &["what", "when", "where", "why", "how", "who", "which"];

/// Common email domain typos and what the user probably meant.
const DOMAIN_TYPOS: &[(&str, &str)] = &[
    ("gamil.com", "gmail.com"),
    ("gmial.com", "gmail.com"),
    ("gmal.com", "gmail.com"),
    ("gmaill.com", "gmail.com"),
    ("gmail.co", "gmail.com"),
    ("yahooo.com", "yahoo.com"),
    ("yaho.com", "yahoo.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmal.com", "hotmail.com"),
    ("outlok.com", "outlook.com"),
];

/// Middle-digit runs that indicate a made-up index number.
const SEQUENTIAL_RUNS: &[&str] = &[
    "0123", "1234", "2345", "3456", "4567", "5678", "6789",
    "9876", "8765", "7654", "6543", "5432", "4321", "3210",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Team name must be {TEAM_NAME_MIN}-{TEAM_NAME_MAX} characters long. Please pick another name.")]
    TeamNameLength,
    #[error("Team name can't be only numbers. Please pick a name with letters in it.")]
    TeamNameNumeric,
    #[error("Team name can only contain letters, numbers, spaces, hyphens and underscores.")]
    TeamNameCharset,
    #[error("That name is reserved. Please pick a different team name.")]
    TeamNameReserved,
    #[error("That doesn't look like a real team name. Please pick something less repetitive.")]
    TeamNameRepetitive,
    #[error("That looks like a placeholder, not a team name. Please pick a real name.")]
    TeamNamePlaceholder,
    #[error("That looks like a question, not a team name. To register, send just your team name — or ask me anything about the event!")]
    TeamNameQuestion,

    #[error("Please pick one of the batches: 23 or 24.")]
    BatchInvalid,

    #[error("I need an actual full name to register this member. Please type their full name.")]
    NameNonAnswer,
    #[error("A name can't be only numbers. Please type the member's full name.")]
    NameNumeric,
    #[error("That name is too short. Please type the member's full name.")]
    NameTooShort,
    #[error("That doesn't look like a real name. Please type the member's actual full name.")]
    NameRepetitive,
    #[error("That looks like placeholder text. Please type the member's actual full name.")]
    NamePlaceholder,
    #[error("That looks like a question. If you need help, just ask — otherwise please type the member's full name.")]
    NameQuestion,

    #[error("I need an actual index number. The format is 6 digits followed by a capital letter, e.g. 234001T.")]
    IndexNonAnswer,
    #[error("That looks like a question. If you need help, just ask — otherwise please send the index number (e.g. 234001T).")]
    IndexQuestion,
    #[error("Index number format is 6 digits followed by one capital letter, e.g. 234001T.")]
    IndexFormat,
    #[error("Index number must start with your batch ({batch}). Please check and resend it.")]
    IndexBatchMismatch { batch: String },
    #[error("That index number doesn't look real. Please double-check and resend it.")]
    IndexSuspicious,

    #[error("I need an actual email address, e.g. name@example.com.")]
    EmailNonAnswer,
    #[error("That looks like a question. If you need help, just ask — otherwise please send the member's email address.")]
    EmailQuestion,
    #[error("Email addresses can't contain slashes. Please resend it, e.g. name@example.com.")]
    EmailSlash,
    #[error("Did you mean @{suggestion}? Please resend the email with the corrected domain.")]
    EmailDomainTypo { suggestion: String },
    #[error("That doesn't look like a valid email address. Please resend it, e.g. name@example.com.")]
    EmailFormat,
}

fn is_pure_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_mostly_one_char(s: &str) -> bool {
    let chars: Vec<char> = s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return false;
    }
    let mut counts = std::collections::HashMap::new();
    for c in &chars {
        *counts.entry(*c).or_insert(0usize) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    (max as f32) / (chars.len() as f32) > 0.7
}

fn contains_placeholder(lower: &str) -> bool {
    if PLACEHOLDER_TOKENS.iter().any(|t| lower.contains(t)) {
        return true;
    }
    // "test" only as its own word, so "Contest" stays a valid name.
    lower.split_whitespace().any(|w| w == "test" || w == "testing" || w == "tester")
}

pub fn contains_question_word(message: &str) -> bool {
    let lower = message.to_lowercase();
    if lower.contains('?') {
        return true;
    }
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| QUESTION_WORDS.contains(&w))
}

fn is_non_answer(lower: &str) -> bool {
    NON_ANSWERS.contains(&lower)
}

// ===== Structural shapes (shared with the intent classifier) =====

pub fn looks_like_email(message: &str) -> bool {
    EMAIL_RE.is_match(message.trim())
}

pub fn looks_like_index_number(message: &str) -> bool {
    INDEX_SHAPE_RE.is_match(message.trim())
}

pub fn is_batch_value(message: &str) -> bool {
    ALLOWED_BATCHES.contains(&message.trim())
}

pub fn is_yes_no(message: &str) -> bool {
    matches!(
        message.trim().trim_end_matches(['.', '!']).to_lowercase().as_str(),
        "yes" | "no"
    )
}

// ===== Validators =====

/// Canonical bound is 3-30 characters (the source stated both 3-10 and 3-30;
/// the more permissive rule wins).
pub fn validate_team_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim().to_string();
    let lower = name.to_lowercase();

    if name.len() < TEAM_NAME_MIN || name.len() > TEAM_NAME_MAX {
        return Err(ValidationError::TeamNameLength);
    }
    if is_pure_numeric(&name) {
        return Err(ValidationError::TeamNameNumeric);
    }
    if !TEAM_NAME_RE.is_match(&name) {
        return Err(ValidationError::TeamNameCharset);
    }
    if RESERVED_TEAM_NAMES.contains(&lower.as_str()) {
        return Err(ValidationError::TeamNameReserved);
    }
    if is_mostly_one_char(&name) {
        return Err(ValidationError::TeamNameRepetitive);
    }
    if contains_placeholder(&lower) {
        return Err(ValidationError::TeamNamePlaceholder);
    }
    if contains_question_word(&name) {
        return Err(ValidationError::TeamNameQuestion);
    }
    Ok(name)
}

pub fn validate_batch(input: &str) -> Result<String, ValidationError> {
    let batch = input.trim();
    if is_batch_value(batch) {
        Ok(batch.to_string())
    } else {
        Err(ValidationError::BatchInvalid)
    }
}

pub fn validate_full_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim().to_string();
    let lower = name.to_lowercase();

    if is_non_answer(&lower) {
        return Err(ValidationError::NameNonAnswer);
    }
    if is_pure_numeric(&name) {
        return Err(ValidationError::NameNumeric);
    }
    if name.len() < 2 {
        return Err(ValidationError::NameTooShort);
    }
    if is_mostly_one_char(&name) {
        return Err(ValidationError::NameRepetitive);
    }
    if contains_placeholder(&lower) {
        return Err(ValidationError::NamePlaceholder);
    }
    if contains_question_word(&name) {
        return Err(ValidationError::NameQuestion);
    }
    Ok(name)
}

/// Validates shape and plausibility; duplicate checks live in the flow
/// because they need the session and the store.
pub fn validate_index_number(input: &str, batch: &str) -> Result<String, ValidationError> {
    let index = input.trim().to_string();
    let lower = index.to_lowercase();

    if is_non_answer(&lower) {
        return Err(ValidationError::IndexNonAnswer);
    }
    if contains_question_word(&index) {
        return Err(ValidationError::IndexQuestion);
    }
    if !INDEX_NUMBER_RE.is_match(&index) {
        return Err(ValidationError::IndexFormat);
    }
    if !index.starts_with(batch) {
        return Err(ValidationError::IndexBatchMismatch {
            batch: batch.to_string(),
        });
    }

    let middle = &index[2..6];
    let first = middle.chars().next().unwrap_or('0');
    if middle.chars().all(|c| c == first) {
        return Err(ValidationError::IndexSuspicious);
    }
    if SEQUENTIAL_RUNS.contains(&middle) {
        return Err(ValidationError::IndexSuspicious);
    }

    Ok(index)
}

/// Returns the address lowercased for storage and duplicate comparison.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let email = input.trim().to_string();
    let lower = email.to_lowercase();

    if is_non_answer(&lower) {
        return Err(ValidationError::EmailNonAnswer);
    }
    if contains_question_word(&email) && !looks_like_email(&email) {
        return Err(ValidationError::EmailQuestion);
    }
    if email.contains('/') || email.contains('\\') {
        return Err(ValidationError::EmailSlash);
    }
    if let Some(domain) = lower.rsplit('@').next() {
        for (typo, fix) in DOMAIN_TYPOS {
            if domain == *typo {
                return Err(ValidationError::EmailDomainTypo {
                    suggestion: fix.to_string(),
                });
            }
        }
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(ValidationError::EmailFormat);
    }
    Ok(lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_number_accepts_valid_values() {
        assert_eq!(validate_index_number("234001T", "23").unwrap(), "234001T");
        assert_eq!(validate_index_number("244001A", "24").unwrap(), "244001A");
    }

    #[test]
    fn index_number_rejects_bad_shapes() {
        assert_eq!(
            validate_index_number("12345", "23"),
            Err(ValidationError::IndexFormat)
        );
        // Lowercase trailing letter is not accepted.
        assert_eq!(
            validate_index_number("234001t", "23"),
            Err(ValidationError::IndexFormat)
        );
    }

    #[test]
    fn index_number_rejects_batch_mismatch() {
        assert_eq!(
            validate_index_number("244001A", "23"),
            Err(ValidationError::IndexBatchMismatch { batch: "23".into() })
        );
    }

    #[test]
    fn index_number_rejects_fake_patterns() {
        assert_eq!(
            validate_index_number("233333T", "23"),
            Err(ValidationError::IndexSuspicious)
        );
        assert_eq!(
            validate_index_number("231234T", "23"),
            Err(ValidationError::IndexSuspicious)
        );
    }

    #[test]
    fn email_accepts_valid_addresses() {
        assert_eq!(validate_email("test@example.com").unwrap(), "test@example.com");
        assert_eq!(
            validate_email("user.name+tag@example.co.uk").unwrap(),
            "user.name+tag@example.co.uk"
        );
    }

    #[test]
    fn email_rejects_invalid_addresses() {
        assert_eq!(validate_email("invalid.email"), Err(ValidationError::EmailFormat));
        assert_eq!(validate_email("@example.com"), Err(ValidationError::EmailFormat));
    }

    #[test]
    fn email_rejects_paths_and_typos() {
        assert_eq!(
            validate_email("jane/doe@example.com"),
            Err(ValidationError::EmailSlash)
        );
        assert_eq!(
            validate_email("jane@gamil.com"),
            Err(ValidationError::EmailDomainTypo { suggestion: "gmail.com".into() })
        );
    }

    #[test]
    fn email_is_lowercased() {
        assert_eq!(validate_email("Jane@Example.COM").unwrap(), "jane@example.com");
    }

    #[test]
    fn team_name_canonical_bound_is_3_to_30() {
        assert!(validate_team_name("ab").is_err());
        assert!(validate_team_name("TeamRocket").is_ok());
        assert!(validate_team_name("a team name of exactly 28 char").is_ok());
        assert!(validate_team_name(&"x".repeat(31)).is_err());
    }

    #[test]
    fn team_name_rejects_junk() {
        assert_eq!(validate_team_name("12345"), Err(ValidationError::TeamNameNumeric));
        assert_eq!(validate_team_name("admin"), Err(ValidationError::TeamNameReserved));
        assert_eq!(validate_team_name("aaaaaab"), Err(ValidationError::TeamNameRepetitive));
        assert_eq!(validate_team_name("test team"), Err(ValidationError::TeamNamePlaceholder));
        assert_eq!(
            validate_team_name("what is coderush"),
            Err(ValidationError::TeamNameQuestion)
        );
        assert_eq!(validate_team_name("Team@Rocket"), Err(ValidationError::TeamNameCharset));
    }

    #[test]
    fn contest_is_not_a_placeholder() {
        assert!(validate_team_name("Contest Kings").is_ok());
    }

    #[test]
    fn full_name_rejects_non_answers() {
        assert_eq!(validate_full_name("idk"), Err(ValidationError::NameNonAnswer));
        assert_eq!(validate_full_name("skip"), Err(ValidationError::NameNonAnswer));
        assert_eq!(validate_full_name("1234"), Err(ValidationError::NameNumeric));
        assert_eq!(validate_full_name("J"), Err(ValidationError::NameTooShort));
        assert!(validate_full_name("Jane Silva").is_ok());
    }

    #[test]
    fn structural_shapes() {
        assert!(looks_like_email("jane@example.com"));
        assert!(!looks_like_email("not an email"));
        assert!(looks_like_index_number("234001T"));
        assert!(looks_like_index_number("234001t"));
        assert!(!looks_like_index_number("12345"));
        assert!(is_batch_value("23"));
        assert!(!is_batch_value("25"));
        assert!(is_yes_no("Yes"));
        assert!(is_yes_no("no!"));
        assert!(!is_yes_no("maybe"));
    }
}
