use chrono::Utc;

use ednna_core::domain::conversation::{ConversationId, UserId};
use ednna_core::errors::StoreError;
use ednna_core::store::ConversationLog;

use super::{encode_timestamp, RepositoryError, CONVERSATION};
use crate::DbPool;

pub struct SqlConversationLog {
    pool: DbPool,
}

impl SqlConversationLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Active conversation of the user, opening one when none exists. The
    /// partial unique index keeps concurrent first turns on a single row.
    pub async fn open_active(&self, user_id: &UserId) -> Result<ConversationId, RepositoryError> {
        if let Some(id) = self.find_active(user_id).await? {
            return Ok(id);
        }

        sqlx::query(
            "INSERT INTO conversations (user_id, status, started_at)
             VALUES (?, 'active', ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.find_active(user_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("no active conversation for user {user_id}"))
        })
    }

    async fn find_active(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ConversationId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM conversations WHERE user_id = ? AND status = 'active'",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(ConversationId))
    }

    pub async fn insert_message(
        &self,
        conversation_id: ConversationId,
        text: &str,
        is_from_user: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (conversation_id, content, is_from_user, sent_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id.0)
        .bind(text)
        .bind(is_from_user)
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Messages of a conversation in insertion order, as `(text, is_from_user)`.
    pub async fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<(String, bool)>, RepositoryError> {
        Ok(sqlx::query_as::<_, (String, bool)>(
            "SELECT content, is_from_user FROM messages WHERE conversation_id = ? ORDER BY id",
        )
        .bind(conversation_id.0)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait::async_trait]
impl ConversationLog for SqlConversationLog {
    async fn open(&self, user_id: &UserId) -> Result<ConversationId, StoreError> {
        self.open_active(user_id).await.map_err(|error| error.into_store_error(CONVERSATION))
    }

    async fn append(
        &self,
        conversation_id: ConversationId,
        text: &str,
        is_from_user: bool,
    ) -> Result<(), StoreError> {
        self.insert_message(conversation_id, text, is_from_user)
            .await
            .map_err(|error| error.into_store_error(CONVERSATION))
    }
}
