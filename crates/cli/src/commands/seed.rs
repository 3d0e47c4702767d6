use crate::commands::{current_thread_runtime, CommandResult, StepFailure};
use ednna_core::config::{AppConfig, LoadOptions};
use ednna_db::{connect_with_settings, migrations, KnowledgeSeedDataset, SeedResult};
use serde_json::json;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_step("seed", failure),
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

        let seeded = KnowledgeSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = KnowledgeSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome: Result<SeedResult, StepFailure> = if verification.all_passed {
            Ok(seeded)
        } else {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success_with_details(
            "seed",
            format!(
                "knowledge base seeded with {} entries (dataset {})",
                seeded.entries_seeded, seeded.dataset_version
            ),
            Some(json!({
                "dataset_version": seeded.dataset_version,
                "entries_seeded": seeded.entries_seeded,
            })),
        ),
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some seed entries failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}
