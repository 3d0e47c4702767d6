use serde::Deserialize;

use ednna_core::domain::chat::GREETING_CATEGORY;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlKnowledgeRepository};

/// Starter knowledge base: the greeting answer plus one entry per product
/// and support topic the assistant is expected to cover out of the box.
pub struct KnowledgeSeedDataset;

#[derive(Clone, Debug, Deserialize)]
pub struct SeedContract {
    pub dataset_version: String,
    pub entries: Vec<SeedEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SeedEntry {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub dataset_version: String,
    pub entries_seeded: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub checks: Vec<(String, bool)>,
    pub all_passed: bool,
}

impl KnowledgeSeedDataset {
    pub const JSON: &str = include_str!("../../../config/fixtures/knowledge_seed.json");

    pub fn contract() -> Result<SeedContract, RepositoryError> {
        serde_json::from_str(Self::JSON)
            .map_err(|error| RepositoryError::Decode(format!("invalid seed dataset: {error}")))
    }

    /// Upserts every seed entry; running it twice leaves one row per question.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let contract = Self::contract()?;
        let repository = SqlKnowledgeRepository::new(pool.clone());

        for entry in &contract.entries {
            repository
                .upsert(&entry.question, &entry.answer, &entry.category, &entry.keywords)
                .await?;
        }

        Ok(SeedResult {
            dataset_version: contract.dataset_version,
            entries_seeded: contract.entries.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let contract = Self::contract()?;
        let mut checks = Vec::with_capacity(contract.entries.len() + 1);

        for entry in &contract.entries {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM knowledge_base WHERE question = ?1 AND category = ?2)",
            )
            .bind(&entry.question)
            .bind(&entry.category)
            .fetch_one(pool)
            .await?;
            checks.push((entry.question.clone(), exists == 1));
        }

        let greeting: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM knowledge_base WHERE category = ?1")
                .bind(GREETING_CATEGORY)
                .fetch_one(pool)
                .await?;
        checks.push((format!("category:{GREETING_CATEGORY}"), greeting > 0));

        let all_passed = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { checks, all_passed })
    }
}
