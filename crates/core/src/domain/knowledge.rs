use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Tier-1 predicate: question or keyword set contains `needle`.
    /// `needle` is expected lower-cased.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.question.to_lowercase().contains(needle)
            || self.keywords_joined().to_lowercase().contains(needle)
    }

    /// Keywords in their persisted comma-separated form.
    pub fn keywords_joined(&self) -> String {
        self.keywords.join(",")
    }
}

pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keywords for a freshly taught entry: distinct answer words longer than four
/// characters, at most fifteen, or `geral` when none qualify.
pub fn derive_keywords(answer: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in answer.to_lowercase().split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() > 4 && !keywords.iter().any(|seen| seen == word) {
            keywords.push(word.to_string());
        }
        if keywords.len() == 15 {
            break;
        }
    }
    if keywords.is_empty() {
        keywords.push("geral".to_string());
    }
    keywords
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Answered,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Answered => "answered",
        }
    }
}

impl std::str::FromStr for PendingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "answered" => Ok(Self::Answered),
            other => Err(format!("unknown pending status `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub id: i64,
    pub user_id: UserId,
    pub question: String,
    pub conversation_id: ConversationId,
    pub status: PendingStatus,
    pub created_at: DateTime<Utc>,
}
