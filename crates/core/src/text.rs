//! Text helpers shared by every rule in the pipeline.
//!
//! All functions are total over arbitrary input: they never panic and never
//! fail on unexpected characters.

use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("phrase `{0}` must start and end with a letter or digit")]
    Boundary(String),
    #[error("invalid pattern `{pattern}`: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Lower-cases and collapses runs of whitespace.
pub fn normalize_input(text: &str) -> String {
    text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Alphanumeric tokens, punctuation dropped.
pub fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|token| !token.is_empty()).collect()
}

pub fn first_token(text: &str) -> Option<&str> {
    tokens(text).into_iter().next()
}

pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A set of words/phrases matched only on word boundaries, so `puta` never
/// matches inside `computador`. Longer phrases win over their prefixes.
#[derive(Clone, Debug)]
pub struct PhraseSet {
    phrases: Vec<String>,
    pattern: Option<Regex>,
}

impl PhraseSet {
    pub fn new<I, S>(phrases: I) -> Result<Self, PhraseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases = phrases
            .into_iter()
            .map(|phrase| normalize_input(phrase.as_ref()))
            .filter(|phrase| !phrase.is_empty())
            .collect::<Vec<_>>();

        for phrase in &phrases {
            let starts = phrase.chars().next().is_some_and(is_word_char);
            let ends = phrase.chars().last().is_some_and(is_word_char);
            if !starts || !ends {
                return Err(PhraseError::Boundary(phrase.clone()));
            }
        }

        phrases.sort_by(|left, right| right.chars().count().cmp(&left.chars().count()));
        phrases.dedup();

        if phrases.is_empty() {
            return Ok(Self { phrases, pattern: None });
        }

        let alternatives = phrases
            .iter()
            .map(|phrase| regex::escape(phrase).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        let source = format!(r"\b(?:{alternatives})\b");
        let pattern = Regex::new(&source)
            .map_err(|source_error| PhraseError::Regex { pattern: source, source: source_error })?;

        Ok(Self { phrases, pattern: Some(pattern) })
    }

    pub fn empty() -> Self {
        Self { phrases: Vec::new(), pattern: None }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|pattern| pattern.is_match(text))
    }

    /// Leftmost whole-word occurrence in `text`.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern.as_ref()?.find(text).map(|found| found.as_str())
    }

    /// Exact membership of the whole (normalized) text.
    pub fn contains_exact(&self, text: &str) -> bool {
        let text = normalize_input(text);
        self.phrases.iter().any(|phrase| *phrase == text)
    }

    pub fn replace_all<F>(&self, text: &str, mut replacement: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |captures: &Captures<'_>| replacement(&captures[0]))
                .into_owned(),
            None => text.to_string(),
        }
    }
}
