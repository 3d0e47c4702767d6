use chrono::Utc;

use ednna_core::domain::conversation::{ConversationId, UserId};
use ednna_core::domain::knowledge::{PendingQuestion, PendingStatus};
use ednna_core::errors::StoreError;
use ednna_core::store::PendingStore;

use super::{column, decode_timestamp, encode_timestamp, RepositoryError, PENDING};
use crate::DbPool;

pub struct SqlPendingRepository {
    pool: DbPool,
}

impl SqlPendingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn exists_since(
        &self,
        user_id: &UserId,
        question: &str,
        window: chrono::Duration,
    ) -> Result<bool, RepositoryError> {
        let since = encode_timestamp(Utc::now() - window);
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM unknown_questions
             WHERE user_id = ? AND question = ? AND created_at > ?",
        )
        .bind(user_id.as_str())
        .bind(question)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn record(
        &self,
        user_id: &UserId,
        question: &str,
        conversation_id: ConversationId,
    ) -> Result<i64, RepositoryError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO unknown_questions (user_id, question, conversation_id, status, created_at)
             VALUES (?, ?, ?, 'pending', ?)
             RETURNING id",
        )
        .bind(user_id.as_str())
        .bind(question)
        .bind(conversation_id.0)
        .bind(encode_timestamp(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Pending questions, newest first.
    pub async fn list_pending(&self, limit: u32) -> Result<Vec<PendingQuestion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, question, conversation_id, status, created_at
             FROM unknown_questions
             WHERE status = 'pending'
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_pending).collect()
    }

    /// Marks every pending row with this exact question as answered.
    pub async fn mark_answered(&self, question: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE unknown_questions SET status = 'answered'
             WHERE question = ? AND status = 'pending'",
        )
        .bind(question)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_pending(row: &sqlx::sqlite::SqliteRow) -> Result<PendingQuestion, RepositoryError> {
    let user_id: String = column(row, "user_id")?;
    let conversation_id: i64 = column(row, "conversation_id")?;
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;

    Ok(PendingQuestion {
        id: column(row, "id")?,
        user_id: UserId(user_id),
        question: column(row, "question")?,
        conversation_id: ConversationId(conversation_id),
        status: status.parse::<PendingStatus>().map_err(RepositoryError::Decode)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl PendingStore for SqlPendingRepository {
    async fn has_recent(
        &self,
        user_id: &UserId,
        question: &str,
        window: chrono::Duration,
    ) -> Result<bool, StoreError> {
        self.exists_since(user_id, question, window)
            .await
            .map_err(|error| error.into_store_error(PENDING))
    }

    async fn insert(
        &self,
        user_id: &UserId,
        question: &str,
        conversation_id: ConversationId,
    ) -> Result<(), StoreError> {
        self.record(user_id, question, conversation_id)
            .await
            .map(|_| ())
            .map_err(|error| error.into_store_error(PENDING))
    }
}
