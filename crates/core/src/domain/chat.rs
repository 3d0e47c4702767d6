use serde::{Deserialize, Serialize};

pub const GREETING_CATEGORY: &str = "saudacao";
pub const FAREWELL_CATEGORY: &str = "despedida";

/// Closed set of reasons a response was produced. Knowledge hits carry the
/// matched entry's category verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Intent {
    Greeting,
    Farewell,
    Filtered,
    Category(String),
    Unknown,
    Error,
}

impl Intent {
    pub fn label(&self) -> &str {
        match self {
            Self::Greeting => GREETING_CATEGORY,
            Self::Farewell => FAREWELL_CATEGORY,
            Self::Filtered => "filtered",
            Self::Category(category) => category,
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

impl From<Intent> for String {
    fn from(value: Intent) -> Self {
        value.label().to_string()
    }
}

impl From<String> for Intent {
    fn from(value: String) -> Self {
        match value.as_str() {
            GREETING_CATEGORY => Self::Greeting,
            FAREWELL_CATEGORY => Self::Farewell,
            "filtered" => Self::Filtered,
            "unknown" => Self::Unknown,
            "error" => Self::Error,
            _ => Self::Category(value),
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub response: String,
    pub intent: Intent,
    pub confidence: f64,
}

impl ChatResult {
    pub fn new(response: impl Into<String>, intent: Intent, confidence: f64) -> Self {
        Self { response: response.into(), intent, confidence: confidence.clamp(0.0, 1.0) }
    }
}
