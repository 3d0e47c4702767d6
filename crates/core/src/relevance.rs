//! Text-relevance score used by tier-2 knowledge lookup.
//!
//! Every store implementation ranks with this function so the configured
//! threshold means the same thing regardless of the backing engine.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain::knowledge::KnowledgeEntry;
use crate::text::tokens;

const STOPWORDS: &[&str] = &[
    "que", "com", "para", "por", "uma", "uns", "umas", "dos", "das", "nos", "nas", "pelo",
    "pela", "como", "qual", "quais", "ser", "são", "sao", "tem", "ter", "meu", "minha", "seu",
    "sua", "isso", "esse", "essa", "este", "esta", "mais", "mas", "não", "nao", "sim", "você",
    "voce", "vocês", "aos", "num", "numa", "onde", "quando", "porque", "sobre",
];

const PRIMARY_WEIGHT: f64 = 1.0;
const ANSWER_WEIGHT: f64 = 0.5;

/// Distinct significant tokens of a query: at least three characters, not a
/// function word.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens(&text.to_lowercase())
        .into_iter()
        .filter(|token| token.chars().count() >= 3 && !STOPWORDS.contains(token))
        .filter(|token| seen.insert(token.to_string()))
        .map(str::to_string)
        .collect()
}

/// Score in `[0, 1]`: terms found in question or keywords weigh 1.0, terms
/// found only in the answer weigh 0.5, averaged over the query terms.
pub fn score(query: &str, entry: &KnowledgeEntry) -> f64 {
    let terms = query_terms(query);
    if terms.is_empty() {
        return 0.0;
    }

    let primary = token_set(&format!("{} {}", entry.question, entry.keywords.join(" ")));
    let answer = token_set(&entry.answer);

    let total = terms
        .iter()
        .map(|term| {
            if primary.contains(term.as_str()) {
                PRIMARY_WEIGHT
            } else if answer.contains(term.as_str()) {
                ANSWER_WEIGHT
            } else {
                0.0
            }
        })
        .sum::<f64>();

    (total / terms.len() as f64).clamp(0.0, 1.0)
}

/// Best-scoring entry; ties go to the most recently updated one.
pub fn best_match<'a, I>(query: &str, entries: I) -> Option<(&'a KnowledgeEntry, f64)>
where
    I: IntoIterator<Item = &'a KnowledgeEntry>,
{
    entries
        .into_iter()
        .map(|entry| (entry, score(query, entry)))
        .filter(|(_, score)| *score > 0.0)
        .max_by(|(left, left_score), (right, right_score)| {
            left_score
                .partial_cmp(right_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.updated_at.cmp(&right.updated_at))
        })
}

fn token_set(text: &str) -> HashSet<String> {
    tokens(&text.to_lowercase()).into_iter().map(str::to_string).collect()
}
