use std::sync::Arc;

use crate::commands::{current_thread_runtime, CommandResult};
use ednna_agent::{Collaborators, DialogueOrchestrator};
use ednna_core::config::{AppConfig, LoadOptions};
use ednna_core::domain::conversation::UserId;
use ednna_core::lexicon::Lexicon;
use ednna_db::repositories::{
    SqlConversationLog, SqlKnowledgeRepository, SqlPendingRepository, SqlProfileRepository,
};
use ednna_db::{connect_with_settings, migrations};

pub const DEFAULT_USER: &str = "cli";

/// Runs one turn against the configured database. History is not carried
/// between invocations, so follow-up rewriting never applies here.
pub fn run(message: &str, user: &str) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_input", "message must not be empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let lexicon = match Lexicon::load(config.pipeline.lexicon_path.as_deref()) {
        Ok(lexicon) => Arc::new(lexicon),
        Err(error) => return CommandResult::failure("ask", "lexicon_load", error.to_string(), 2),
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_step("ask", failure),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let stores = Collaborators {
            knowledge: Arc::new(SqlKnowledgeRepository::new(pool.clone())),
            profiles: Arc::new(SqlProfileRepository::new(pool.clone())),
            pending: Arc::new(SqlPendingRepository::new(pool.clone())),
            conversations: Arc::new(SqlConversationLog::new(pool.clone())),
        };
        let orchestrator = DialogueOrchestrator::new(lexicon, &config.pipeline, stores);
        let reply = orchestrator.process_turn(message, &UserId(user.to_string()), &[]).await;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(reply)
    });

    match result {
        Ok(reply) => {
            let details = serde_json::to_value(&reply).ok();
            CommandResult::success_with_details("ask", reply.response, details)
        }
        Err(failure) => CommandResult::from_step("ask", failure),
    }
}
