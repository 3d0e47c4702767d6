//! Storage seams consumed by the dialogue pipeline.
//!
//! Implementations live in `ednna-db`; the pipeline only sees these traits.

use async_trait::async_trait;

use crate::domain::conversation::{ConversationId, UserId};
use crate::domain::knowledge::KnowledgeEntry;
use crate::domain::profile::{ProfilePatch, UserProfile};
use crate::errors::StoreError;

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Most recently updated entry whose question or keywords contain `text`
    /// (case-insensitive).
    async fn search_exact(&self, text: &str) -> Result<Option<KnowledgeEntry>, StoreError>;

    /// Best entry by relevance score, together with that score. Entries that
    /// share no term with `text` are never returned.
    async fn search_fulltext(
        &self,
        text: &str,
    ) -> Result<Option<(KnowledgeEntry, f64)>, StoreError>;

    /// Most recently updated entry of `category`.
    async fn find_by_category(&self, category: &str)
        -> Result<Option<KnowledgeEntry>, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_or_create(&self, user_id: &UserId) -> Result<UserProfile, StoreError>;

    /// Writes extracted fields only where the stored value is still empty;
    /// `last_issue` always replaces.
    async fn update(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn has_recent(
        &self,
        user_id: &UserId,
        question: &str,
        window: chrono::Duration,
    ) -> Result<bool, StoreError>;

    async fn insert(
        &self,
        user_id: &UserId,
        question: &str,
        conversation_id: ConversationId,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Latest active conversation of the user, created when none exists.
    async fn open(&self, user_id: &UserId) -> Result<ConversationId, StoreError>;

    async fn append(
        &self,
        conversation_id: ConversationId,
        text: &str,
        is_from_user: bool,
    ) -> Result<(), StoreError>;
}
