use std::sync::Arc;

use ednna_agent::{Collaborators, DialogueOrchestrator};
use ednna_core::config::{AppConfig, ConfigError, LoadOptions};
use ednna_core::lexicon::{Lexicon, LexiconError};
use ednna_db::repositories::{
    SqlConversationLog, SqlKnowledgeRepository, SqlPendingRepository, SqlProfileRepository,
};
use ednna_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<DialogueOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("lexicon could not be loaded: {0}")]
    Lexicon(#[from] LexiconError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let lexicon = Arc::new(Lexicon::load(config.pipeline.lexicon_path.as_deref())?);
    info!(
        event_name = "system.bootstrap.lexicon_loaded",
        correlation_id = "bootstrap",
        topics = lexicon.topics.len(),
        custom = config.pipeline.lexicon_path.is_some(),
        "lexicon loaded"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let orchestrator =
        DialogueOrchestrator::new(lexicon, &config.pipeline, sql_collaborators(&db_pool));

    Ok(Application { config, db_pool, orchestrator: Arc::new(orchestrator) })
}

pub fn sql_collaborators(db_pool: &DbPool) -> Collaborators {
    Collaborators {
        knowledge: Arc::new(SqlKnowledgeRepository::new(db_pool.clone())),
        profiles: Arc::new(SqlProfileRepository::new(db_pool.clone())),
        pending: Arc::new(SqlPendingRepository::new(db_pool.clone())),
        conversations: Arc::new(SqlConversationLog::new(db_pool.clone())),
    }
}
