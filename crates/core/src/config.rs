use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Knobs of the per-turn pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// A fuzzy knowledge hit must score strictly above this value.
    pub fuzzy_threshold: f64,
    /// Repeats of the same unknown question inside this window are not recorded again.
    pub pending_window_secs: u64,
    /// Rule tables file; the built-in tables are used when unset.
    pub lexicon_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 0.5, pending_window_secs: 3600, lexicon_path: None }
    }
}

impl PipelineConfig {
    pub fn pending_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.pending_window_secs).unwrap_or(i64::MAX))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub fuzzy_threshold: Option<f64>,
    pub lexicon_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://ednna.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            pipeline: PipelineConfig::default(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ednna.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(fuzzy_threshold) = pipeline.fuzzy_threshold {
                self.pipeline.fuzzy_threshold = fuzzy_threshold;
            }
            if let Some(pending_window_secs) = pipeline.pending_window_secs {
                self.pipeline.pending_window_secs = pending_window_secs;
            }
            if let Some(lexicon_path) = pipeline.lexicon_path {
                self.pipeline.lexicon_path = Some(lexicon_path);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("EDNNA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("EDNNA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("EDNNA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("EDNNA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("EDNNA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("EDNNA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("EDNNA_SERVER_PORT") {
            self.server.port = parse_u16("EDNNA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("EDNNA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("EDNNA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("EDNNA_LOGGING_LEVEL").or_else(|| read_env("EDNNA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("EDNNA_LOGGING_FORMAT").or_else(|| read_env("EDNNA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("EDNNA_PIPELINE_FUZZY_THRESHOLD") {
            self.pipeline.fuzzy_threshold = parse_f64("EDNNA_PIPELINE_FUZZY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("EDNNA_PIPELINE_PENDING_WINDOW_SECS") {
            self.pipeline.pending_window_secs =
                parse_u64("EDNNA_PIPELINE_PENDING_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("EDNNA_PIPELINE_LEXICON_PATH") {
            self.pipeline.lexicon_path = Some(PathBuf::from(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(fuzzy_threshold) = overrides.fuzzy_threshold {
            self.pipeline.fuzzy_threshold = fuzzy_threshold;
        }
        if let Some(lexicon_path) = overrides.lexicon_path {
            self.pipeline.lexicon_path = Some(lexicon_path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_pipeline(&self.pipeline)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ednna.toml"), PathBuf::from("config/ednna.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    let threshold = pipeline.fuzzy_threshold;
    if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
        return Err(ConfigError::Validation(
            "pipeline.fuzzy_threshold must be in range (0, 1]".to_string(),
        ));
    }

    if pipeline.pending_window_secs == 0 {
        return Err(ConfigError::Validation(
            "pipeline.pending_window_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(path) = &pipeline.lexicon_path {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "pipeline.lexicon_path `{}` does not exist",
                path.display()
            )));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    pipeline: Option<PipelinePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    fuzzy_threshold: Option<f64>,
    pending_window_secs: Option<u64>,
    lexicon_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.pipeline.fuzzy_threshold == 0.5, "default threshold should be 0.5")?;
        ensure(config.pipeline.pending_window_secs == 3600, "default window should be one hour")?;
        ensure(config.pipeline.lexicon_path.is_none(), "built-in lexicon is the default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_EDNNA_DB_FILE", "from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ednna.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_EDNNA_DB_FILE}"

[pipeline]
fuzzy_threshold = 0.65
pending_window_secs = 600
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-env.db",
                "database url should be interpolated from environment",
            )?;
            ensure(config.pipeline.fuzzy_threshold == 0.65, "threshold should come from file")?;
            ensure(
                config.pipeline.pending_window() == chrono::Duration::minutes(10),
                "window should come from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_EDNNA_DB_FILE"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("ednna.toml");
        fs::write(&path, "[database]\nurl = \"${EDNNA_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected interpolation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(
                error,
                ConfigError::MissingEnvInterpolation { ref var } if var == "EDNNA_TEST_UNSET_VARIABLE"
            ),
            "missing variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EDNNA_LOG_LEVEL", "warn");
        env::set_var("EDNNA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["EDNNA_LOG_LEVEL", "EDNNA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EDNNA_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("EDNNA_PIPELINE_FUZZY_THRESHOLD", "0.7");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ednna.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"

[pipeline]
fuzzy_threshold = 0.6
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.pipeline.fuzzy_threshold == 0.7,
                "env threshold should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["EDNNA_DATABASE_URL", "EDNNA_PIPELINE_FUZZY_THRESHOLD"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EDNNA_PIPELINE_FUZZY_THRESHOLD", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("pipeline.fuzzy_threshold")
            );
            ensure(has_message, "validation failure should mention pipeline.fuzzy_threshold")
        })();

        clear_vars(&["EDNNA_PIPELINE_FUZZY_THRESHOLD"]);
        result
    }

    #[test]
    fn malformed_numeric_env_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EDNNA_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. } if key == "EDNNA_SERVER_PORT"
                ),
                "invalid override should name the variable",
            )
        })();

        clear_vars(&["EDNNA_SERVER_PORT"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let missing = dir.path().join("absent.toml");
        let error = match AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected missing file failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::MissingConfigFile(ref path) if *path == missing),
            "missing file should be reported",
        )
    }
}
