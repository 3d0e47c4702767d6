use std::collections::HashSet;

use ednna_core::domain::chat::GREETING_CATEGORY;
use ednna_core::lexicon::Lexicon;
use ednna_core::store::KnowledgeStore;
use ednna_db::repositories::SqlKnowledgeRepository;
use ednna_db::{connect_with_settings, migrations, KnowledgeSeedDataset};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

async fn seeded_repository() -> SeedContractTestResult<SqlKnowledgeRepository> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect failed: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrations failed: {error}"))?;
    KnowledgeSeedDataset::load(&pool).await.map_err(|error| format!("seed failed: {error}"))?;
    Ok(SqlKnowledgeRepository::new(pool))
}

#[test]
fn seed_questions_are_unique() -> SeedContractTestResult {
    let contract = KnowledgeSeedDataset::contract().map_err(|error| error.to_string())?;
    let mut seen = HashSet::new();

    for entry in &contract.entries {
        require!(
            seen.insert(entry.question.to_lowercase()),
            "duplicate seed question `{}`",
            entry.question
        );
        require!(!entry.answer.trim().is_empty(), "seed `{}` has no answer", entry.question);
    }
    Ok(())
}

#[tokio::test]
async fn every_topic_follow_up_resolves_to_a_seeded_answer() -> SeedContractTestResult {
    let lexicon = Lexicon::builtin().map_err(|error| error.to_string())?;
    let repository = seeded_repository().await?;

    for topic in &lexicon.topics {
        let hit = repository
            .search_exact(&topic.canonical_question)
            .await
            .map_err(|error| error.to_string())?;
        require!(
            hit.is_some(),
            "topic `{}` canonical question `{}` has no seeded answer",
            topic.id,
            topic.canonical_question
        );
    }
    Ok(())
}

#[tokio::test]
async fn greeting_answer_is_seeded() -> SeedContractTestResult {
    let repository = seeded_repository().await?;
    let greeting = repository
        .find_by_category(GREETING_CATEGORY)
        .await
        .map_err(|error| error.to_string())?;

    require!(greeting.is_some(), "no `{GREETING_CATEGORY}` entry in the seed dataset");
    Ok(())
}
