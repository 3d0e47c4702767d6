use crate::commands::{current_thread_runtime, CommandResult};
use ednna_core::config::{AppConfig, LoadOptions};
use ednna_core::domain::chat::GREETING_CATEGORY;
use ednna_core::lexicon::Lexicon;
use ednna_db::repositories::{RepositoryError, SqlKnowledgeRepository};
use ednna_db::{connect_with_settings, DbPool};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self::new(name, CheckStatus::Skipped, format!("skipped because {reason}"))
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_lexicon(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            let details = error.to_string();
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, details));
            let reason = "configuration did not load";
            checks.push(DoctorCheck::skipped("lexicon", reason));
            checks.push(DoctorCheck::skipped("database_connectivity", reason));
            checks.push(DoctorCheck::skipped("knowledge_base", reason));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_lexicon(config: &AppConfig) -> DoctorCheck {
    let source = config
        .pipeline
        .lexicon_path
        .as_ref()
        .map_or_else(|| "built-in".to_string(), |path| path.display().to_string());

    match Lexicon::load(config.pipeline.lexicon_path.as_deref()) {
        Ok(lexicon) => DoctorCheck::new(
            "lexicon",
            CheckStatus::Pass,
            format!("{source} lexicon compiled with {} topics", lexicon.topics.len()),
        ),
        Err(error) => DoctorCheck::new("lexicon", CheckStatus::Fail, error.to_string()),
    }
}

/// Connectivity first; the knowledge base is only inspected once a
/// connection exists.
fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err((_, message, _)) => {
            return vec![
                DoctorCheck::new("database_connectivity", CheckStatus::Fail, message),
                DoctorCheck::skipped("knowledge_base", "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::new(
                        "database_connectivity",
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("knowledge_base", "the database is unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck::new(
            "database_connectivity",
            CheckStatus::Pass,
            format!("connected using `{}`", config.database.url),
        );
        let knowledge = check_knowledge_base(&pool).await;
        pool.close().await;
        vec![connectivity, knowledge]
    })
}

async fn check_knowledge_base(pool: &DbPool) -> DoctorCheck {
    match knowledge_counts(pool).await {
        Ok((_, 0)) => DoctorCheck::new(
            "knowledge_base",
            CheckStatus::Fail,
            format!("no `{GREETING_CATEGORY}` entry; run `ednna seed`"),
        ),
        Ok((entries, _)) => DoctorCheck::new(
            "knowledge_base",
            CheckStatus::Pass,
            format!("{entries} entries including a `{GREETING_CATEGORY}` answer"),
        ),
        Err(error) => DoctorCheck::new(
            "knowledge_base",
            CheckStatus::Fail,
            format!("knowledge base unreadable ({error}); run `ednna migrate`"),
        ),
    }
}

async fn knowledge_counts(pool: &DbPool) -> Result<(i64, i64), RepositoryError> {
    let repository = SqlKnowledgeRepository::new(pool.clone());
    let entries = repository.count().await?;
    let greetings = repository.count_in_category(GREETING_CATEGORY).await?;
    Ok((entries, greetings))
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
