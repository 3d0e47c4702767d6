pub mod ask;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Error class, message and exit code of a failed step.
pub(crate) type StepFailure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_details(command, message, None)
    }

    pub fn success_with_details(
        command: &str,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            details,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            details: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn from_step(command: &str, failure: StepFailure) -> Self {
        let (error_class, message, exit_code) = failure;
        Self::failure(command, error_class, message, exit_code)
    }
}

pub(crate) fn current_thread_runtime() -> Result<tokio::runtime::Runtime, StepFailure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        ("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::CommandResult;

    #[test]
    fn failure_payload_carries_class_and_code() {
        let result = CommandResult::failure("seed", "seed_verification", "missing entries", 6);
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 6);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "seed_verification");
        assert!(payload.get("details").is_none());
    }

    #[test]
    fn details_are_emitted_only_when_present() {
        let details = Some(json!({"intent": "saudacao"}));
        let result = CommandResult::success_with_details("ask", "Olá!", details);
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(payload["details"]["intent"], "saudacao");
        assert_eq!(payload["error_class"], Value::Null);
    }
}
