use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ednna_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// Dotted key, rendered value and the env vars that can set it.
type ConfigField = (&'static str, String, &'static [&'static str]);

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields(&config) {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> [ConfigField; 11] {
    let lexicon_path = config
        .pipeline
        .lexicon_path
        .as_ref()
        .map_or_else(|| "<built-in>".to_string(), |path| path.display().to_string());

    [
        ("database.url", config.database.url.clone(), &["EDNNA_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["EDNNA_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["EDNNA_DATABASE_TIMEOUT_SECS"],
        ),
        ("server.bind_address", config.server.bind_address.clone(), &["EDNNA_SERVER_BIND_ADDRESS"]),
        ("server.port", config.server.port.to_string(), &["EDNNA_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["EDNNA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["EDNNA_LOGGING_LEVEL", "EDNNA_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["EDNNA_LOGGING_FORMAT", "EDNNA_LOG_FORMAT"],
        ),
        (
            "pipeline.fuzzy_threshold",
            config.pipeline.fuzzy_threshold.to_string(),
            &["EDNNA_PIPELINE_FUZZY_THRESHOLD"],
        ),
        (
            "pipeline.pending_window_secs",
            config.pipeline.pending_window_secs.to_string(),
            &["EDNNA_PIPELINE_PENDING_WINDOW_SECS"],
        ),
        ("pipeline.lexicon_path", lexicon_path, &["EDNNA_PIPELINE_LEXICON_PATH"]),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["ednna.toml", "config/ednna.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
