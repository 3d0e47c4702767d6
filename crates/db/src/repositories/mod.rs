use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use ednna_core::errors::StoreError;

pub mod conversation;
pub mod knowledge;
pub mod memory;
pub mod pending;
pub mod profile;

pub use conversation::SqlConversationLog;
pub use knowledge::SqlKnowledgeRepository;
pub use memory::{
    InMemoryConversationLog, InMemoryKnowledgeRepository, InMemoryPendingRepository,
    InMemoryProfileRepository, LoggedMessage,
};
pub use pending::SqlPendingRepository;
pub use profile::SqlProfileRepository;

pub(crate) const KNOWLEDGE: &str = "knowledge";
pub(crate) const PROFILE: &str = "profile";
pub(crate) const PENDING: &str = "pending";
pub(crate) const CONVERSATION: &str = "conversation";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn into_store_error(self, store: &'static str) -> StoreError {
        match self {
            Self::Database(error) => StoreError::unavailable(store, error.to_string()),
            Self::Decode(message) => StoreError::Decode { store, message },
        }
    }
}

/// Fixed-width UTC timestamps, so lexical order in SQL is chronological.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}

pub(crate) fn column<'r, T>(
    row: &'r sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    use sqlx::Row;

    row.try_get(name).map_err(|error| RepositoryError::Decode(error.to_string()))
}
