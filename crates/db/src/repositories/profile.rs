use chrono::Utc;

use ednna_core::domain::conversation::UserId;
use ednna_core::domain::profile::{ProfilePatch, UserProfile};
use ednna_core::errors::StoreError;
use ednna_core::store::ProfileStore;

use super::{column, decode_timestamp, encode_timestamp, RepositoryError, PROFILE};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, name, company, erp_vendor, acquirer, last_issue, created_at
             FROM user_profiles WHERE user_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    pub async fn find_or_insert(&self, user_id: &UserId) -> Result<UserProfile, RepositoryError> {
        let now = encode_timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO user_profiles (user_id, created_at, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find(user_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("profile `{user_id}` vanished after insert"))
        })
    }

    /// Extracted fields only fill empty columns, so concurrent turns can never
    /// overwrite a stored value. `last_issue` is replaced when provided.
    pub async fn merge(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<(), RepositoryError> {
        if patch.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "UPDATE user_profiles SET
                 name = COALESCE(name, ?),
                 company = COALESCE(company, ?),
                 erp_vendor = COALESCE(erp_vendor, ?),
                 acquirer = COALESCE(acquirer, ?),
                 last_issue = COALESCE(?, last_issue),
                 updated_at = ?
             WHERE user_id = ?",
        )
        .bind(patch.name.as_deref())
        .bind(patch.company.as_deref())
        .bind(patch.erp_vendor.as_deref())
        .bind(patch.acquirer.as_deref())
        .bind(patch.last_issue.as_deref())
        .bind(encode_timestamp(Utc::now()))
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, RepositoryError> {
    let user_id: String = column(row, "user_id")?;
    let created_at: String = column(row, "created_at")?;

    Ok(UserProfile {
        user_id: UserId(user_id),
        name: column(row, "name")?,
        company: column(row, "company")?,
        erp_vendor: column(row, "erp_vendor")?,
        acquirer: column(row, "acquirer")?,
        last_issue: column(row, "last_issue")?,
        created_at: decode_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl ProfileStore for SqlProfileRepository {
    async fn get_or_create(&self, user_id: &UserId) -> Result<UserProfile, StoreError> {
        self.find_or_insert(user_id).await.map_err(|error| error.into_store_error(PROFILE))
    }

    async fn update(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<(), StoreError> {
        self.merge(user_id, patch).await.map_err(|error| error.into_store_error(PROFILE))
    }
}
