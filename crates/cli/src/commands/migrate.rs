use crate::commands::{current_thread_runtime, CommandResult};
use ednna_core::config::{AppConfig, LoadOptions};
use ednna_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_step("migrate", failure),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let known = migrations::MIGRATOR.iter().count();
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(known)
    });

    match result {
        Ok(known) => CommandResult::success(
            "migrate",
            format!("schema up to date ({known} known migrations)"),
        ),
        Err(failure) => CommandResult::from_step("migrate", failure),
    }
}
