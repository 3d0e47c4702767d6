use chrono::Utc;

use ednna_core::domain::knowledge::{split_keywords, KnowledgeEntry};
use ednna_core::errors::StoreError;
use ednna_core::relevance;
use ednna_core::store::KnowledgeStore;

use super::{column, decode_timestamp, encode_timestamp, RepositoryError, KNOWLEDGE};
use crate::DbPool;

const ENTRY_COLUMNS: &str = "id, question, answer, category, keywords, updated_at";

pub struct SqlKnowledgeRepository {
    pool: DbPool,
}

impl SqlKnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Newest entry whose question or keywords contain `needle`. Case folding
    /// happens in process because SQLite `LOWER()` only folds ASCII.
    pub async fn find_containing(
        &self,
        needle: &str,
    ) -> Result<Option<KnowledgeEntry>, RepositoryError> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        Ok(self.all_newest_first().await?.into_iter().find(|entry| entry.contains_text(&needle)))
    }

    /// Entries sharing at least one query term, ranked in process with the
    /// shared relevance score.
    pub async fn find_most_relevant(
        &self,
        query: &str,
    ) -> Result<Option<(KnowledgeEntry, f64)>, RepositoryError> {
        if relevance::query_terms(query).is_empty() {
            return Ok(None);
        }

        let candidates = self.all_newest_first().await?;
        Ok(relevance::best_match(query, candidates.iter())
            .map(|(entry, score)| (entry.clone(), score)))
    }

    async fn all_newest_first(&self) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM knowledge_base ORDER BY updated_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    pub async fn find_latest_in_category(
        &self,
        category: &str,
    ) -> Result<Option<KnowledgeEntry>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM knowledge_base
             WHERE category = ?
             ORDER BY updated_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Inserts an entry or, when the question already exists, replaces its
    /// answer, category and keywords.
    pub async fn upsert(
        &self,
        question: &str,
        answer: &str,
        category: &str,
        keywords: &[String],
    ) -> Result<i64, RepositoryError> {
        let now = encode_timestamp(Utc::now());
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO knowledge_base (question, answer, category, keywords, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(question) DO UPDATE SET
                 answer = excluded.answer,
                 category = excluded.category,
                 keywords = excluded.keywords,
                 updated_at = excluded.updated_at
             RETURNING id",
        )
        .bind(question)
        .bind(answer)
        .bind(category)
        .bind(keywords.join(","))
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM knowledge_base")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn count_in_category(&self, category: &str) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM knowledge_base WHERE category = ?")
            .bind(category)
            .fetch_one(&self.pool)
            .await?)
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeEntry, RepositoryError> {
    let keywords: String = column(row, "keywords")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(KnowledgeEntry {
        id: column(row, "id")?,
        question: column(row, "question")?,
        answer: column(row, "answer")?,
        category: column(row, "category")?,
        keywords: split_keywords(&keywords),
        updated_at: decode_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl KnowledgeStore for SqlKnowledgeRepository {
    async fn search_exact(&self, text: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        self.find_containing(text).await.map_err(|error| error.into_store_error(KNOWLEDGE))
    }

    async fn search_fulltext(
        &self,
        text: &str,
    ) -> Result<Option<(KnowledgeEntry, f64)>, StoreError> {
        self.find_most_relevant(text).await.map_err(|error| error.into_store_error(KNOWLEDGE))
    }

    async fn find_by_category(
        &self,
        category: &str,
    ) -> Result<Option<KnowledgeEntry>, StoreError> {
        self.find_latest_in_category(category)
            .await
            .map_err(|error| error.into_store_error(KNOWLEDGE))
    }
}

#[cfg(test)]
mod tests {
    use ednna_core::store::KnowledgeStore;

    use super::SqlKnowledgeRepository;
    use crate::repositories::InMemoryKnowledgeRepository;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlKnowledgeRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlKnowledgeRepository::new(pool)
    }

    fn keywords(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|keyword| keyword.to_string()).collect()
    }

    #[tokio::test]
    async fn exact_search_matches_question_or_keywords_case_insensitively() {
        let repo = repository().await;
        repo.upsert(
            "O que é o Teia Card?",
            "Plataforma de conciliação de cartões.",
            "produto",
            &keywords(&["teia card", "conciliação"]),
        )
        .await
        .expect("seed");

        let by_question = repo.search_exact("teia card").await.expect("search");
        assert_eq!(by_question.map(|entry| entry.category), Some("produto".to_string()));

        let by_keyword = repo.search_exact("conciliação").await.expect("search");
        assert!(by_keyword.is_some());

        assert!(repo.search_exact("chargeback").await.expect("search").is_none());
        assert!(repo.search_exact("   ").await.expect("search").is_none());
    }

    #[tokio::test]
    async fn exact_search_prefers_most_recently_updated() {
        let repo = repository().await;
        repo.upsert("Prazo de repasse Cielo", "Primeira.", "adquirente", &keywords(&["repasse"]))
            .await
            .expect("seed");
        let newer = repo
            .upsert("Prazo de repasse Stone", "Segunda.", "adquirente", &keywords(&["repasse"]))
            .await
            .expect("seed");

        let found = repo.search_exact("repasse").await.expect("search").expect("entry");
        assert_eq!(found.id, newer);
    }

    #[tokio::test]
    async fn fulltext_search_returns_best_candidate_with_score() {
        let repo = repository().await;
        repo.upsert(
            "Como funciona a integração EDI?",
            "Recebemos os arquivos das adquirentes diariamente.",
            "edi",
            &keywords(&["edi", "integração"]),
        )
        .await
        .expect("seed");
        repo.upsert("O que é BPO?", "Terceirização.", "bpo", &keywords(&["bpo"]))
            .await
            .expect("seed");

        let (entry, score) =
            repo.search_fulltext("integração edi").await.expect("search").expect("hit");
        assert_eq!(entry.category, "edi");
        assert_eq!(score, 1.0);

        let (_, partial) =
            repo.search_fulltext("arquivos pizza").await.expect("search").expect("hit");
        assert_eq!(partial, 0.25);

        assert!(repo.search_fulltext("unicórnio voador").await.expect("search").is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_question() {
        let repo = repository().await;
        let first = repo
            .upsert("Qual o horário?", "Das 8h às 18h.", "geral", &keywords(&["horário"]))
            .await
            .expect("insert");
        let second = repo
            .upsert("Qual o horário?", "Das 9h às 17h.", "suporte", &keywords(&["horário"]))
            .await
            .expect("update");

        assert_eq!(first, second);
        assert_eq!(repo.count().await.expect("count"), 1);
        let entry =
            repo.find_by_category("suporte").await.expect("category").expect("updated entry");
        assert_eq!(entry.answer, "Das 9h às 17h.");
    }

    #[tokio::test]
    async fn searches_fold_accented_uppercase_like_the_in_memory_store() {
        let repo = repository().await;
        let memory = InMemoryKnowledgeRepository::default();
        let question = "É POSSÍVEL INTEGRAR COM SAP?";
        let answer = "Sim, exportamos os lançamentos conciliados.";
        repo.upsert(question, answer, "integracao", &keywords(&["INTEGRAÇÃO", "ERP"]))
            .await
            .expect("seed");
        memory.upsert(question, answer, "integracao", &["INTEGRAÇÃO", "ERP"]).await;

        let sql_exact = repo.search_exact("é possível integrar com sap").await.expect("search");
        let memory_exact = memory.search_exact("é possível integrar com sap").await.expect("search");
        assert_eq!(sql_exact.map(|entry| entry.question), Some(question.to_string()));
        assert_eq!(memory_exact.map(|entry| entry.question), Some(question.to_string()));

        let by_keyword = repo.search_exact("integração").await.expect("search");
        assert!(by_keyword.is_some());

        let (entry, score) =
            repo.search_fulltext("integração possível").await.expect("search").expect("hit");
        let (_, memory_score) =
            memory.search_fulltext("integração possível").await.expect("search").expect("hit");
        assert_eq!(entry.category, "integracao");
        assert_eq!(score, 1.0);
        assert_eq!(score, memory_score);
    }
}
