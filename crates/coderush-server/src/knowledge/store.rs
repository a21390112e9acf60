use std::collections::{HashMap, HashSet};

use tracing::debug;

/// One Q&A document of the fixed knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeDocument {
    pub id: String,
    pub category: String,
    pub question: String,
    pub answer: String,
    pub keywords: HashSet<String>,
    pub priority: i32,
}

/// In-memory knowledge base with deterministic keyword scoring. This is the
/// reliability floor for retrieval: no external dependency, same ranking for
/// the same query every time.
pub struct KnowledgeStore {
    docs: Vec<KnowledgeDocument>,
    by_id: HashMap<String, usize>,
}

/// Query-token synonym expansion, including common misspellings.
fn synonyms(token: &str) -> &'static [&'static str] {
    match token {
        "venue" => &["location", "map", "place"],
        "location" => &["venue", "map", "place"],
        "map" => &["venue", "location"],
        "place" => &["venue", "location"],
        "competiton" | "compitition" | "competion" | "competition" => &["event", "hackathon"],
        "when" => &["date", "time"],
        "schedule" => &["date", "time"],
        "cost" => &["fee", "price", "free"],
        "price" => &["fee", "cost", "free"],
        "signup" => &["register", "registration"],
        "enroll" => &["register", "registration"],
        "group" => &["team", "members"],
        "award" => &["prize", "prizes"],
        "reward" => &["prize", "prizes"],
        "deadline" => &["date", "submission"],
        _ => &[],
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

impl KnowledgeStore {
    pub fn new(docs: Vec<KnowledgeDocument>) -> Self {
        let by_id = docs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        Self { docs, by_id }
    }

    /// The store shipped with the binary.
    pub fn bundled() -> Self {
        Self::new(super::docs::documents())
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeDocument> {
        self.by_id.get(id).map(|&i| &self.docs[i])
    }

    pub fn all(&self) -> &[KnowledgeDocument] {
        &self.docs
    }

    /// Score every document against the query and return the top `k`.
    /// Zero-score documents are excluded; ties keep definition order.
    pub fn search(&self, query: &str, k: usize) -> Vec<KnowledgeDocument> {
        let normalized = normalize(query);
        let raw_tokens: Vec<&str> = normalized.split_whitespace().collect();
        if raw_tokens.is_empty() {
            return Vec::new();
        }

        let mut expanded: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for token in &raw_tokens {
            if seen.insert(token.to_string()) {
                expanded.push(token.to_string());
            }
            for syn in synonyms(token) {
                if seen.insert(syn.to_string()) {
                    expanded.push(syn.to_string());
                }
            }
        }

        let mut scored: Vec<(f32, &KnowledgeDocument)> = Vec::new();
        for doc in &self.docs {
            let score = score_document(doc, &normalized, &raw_tokens, &expanded);
            if score > 0.0 {
                scored.push((score + doc.priority as f32 * 0.1, doc));
            }
        }

        // Stable sort keeps definition order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        debug!(query, results = scored.len(), "knowledge search");

        scored.into_iter().take(k).map(|(_, d)| d.clone()).collect()
    }
}

fn score_document(
    doc: &KnowledgeDocument,
    normalized_query: &str,
    raw_tokens: &[&str],
    expanded_tokens: &[String],
) -> f32 {
    let question = doc.question.to_lowercase();
    let answer = doc.answer.to_lowercase();
    let full_text = format!("{question} {answer}");

    let mut score = 0.0f32;

    for token in expanded_tokens {
        if doc.keywords.contains(token.as_str()) {
            score += 5.0;
        } else if token.len() >= 3
            && doc
                .keywords
                .iter()
                .any(|kw| kw.contains(token.as_str()) || token.contains(kw.as_str()))
        {
            score += 3.0;
        }

        if question.contains(token.as_str()) {
            score += 2.0;
        }
        if answer.contains(token.as_str()) {
            score += 1.0;
        }
    }

    for pair in raw_tokens.windows(2) {
        let phrase = format!("{} {}", pair[0], pair[1]);
        if full_text.contains(&phrase) {
            score += 8.0;
        }
    }

    let trimmed_query = normalized_query.trim();
    if trimmed_query.len() > 10 && full_text.contains(trimmed_query) {
        score += 15.0;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KnowledgeStore {
        KnowledgeStore::bundled()
    }

    #[test]
    fn venue_query_ranks_location_first() {
        let results = store().search("venue location", 3);
        assert!(!results.is_empty());
        assert_eq!(results[0].category, "location");
    }

    #[test]
    fn unrelated_query_returns_nothing() {
        let results = store().search("zzgrblx qwpfh", 3);
        assert!(results.is_empty());
    }

    #[test]
    fn misspelled_competition_still_finds_event_docs() {
        let results = store().search("what is the competiton about", 3);
        assert!(results.iter().any(|d| d.category == "general" || d.category == "event"));
    }

    #[test]
    fn top_k_is_respected() {
        let results = store().search("registration team submission date", 2);
        assert!(results.len() <= 2);
    }

    #[test]
    fn exact_keyword_beats_partial() {
        let results = store().search("prizes", 5);
        assert_eq!(results[0].id, "prizes");
    }

    #[test]
    fn empty_query_is_empty_result() {
        assert!(store().search("   ", 3).is_empty());
    }
}
