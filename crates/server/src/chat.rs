use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use ednna_agent::DialogueOrchestrator;
use ednna_core::domain::chat::ChatResult;
use ednna_core::domain::conversation::{ConversationTurn, Role, UserId};
use ednna_core::errors::ApplicationError;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::ApiError;

/// Used when the widget posts no `user_id`.
pub const ANONYMOUS_USER_ID: &str = "1";

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<DialogueOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// The web widget sends either a string or a number.
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
    /// Stamped with the receive time when the widget omits it.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatRequest {
    fn user_id(&self) -> UserId {
        let raw = match &self.user_id {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => ANONYMOUS_USER_ID.to_string(),
        };
        UserId(raw)
    }

    fn history(&self) -> Vec<ConversationTurn> {
        let now = Utc::now();
        self.history
            .iter()
            .map(|turn| ConversationTurn {
                role: turn.role,
                text: turn.text.clone(),
                timestamp: turn.timestamp.unwrap_or(now),
            })
            .collect()
    }
}

pub fn router(orchestrator: Arc<DialogueOrchestrator>) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(ChatState { orchestrator })
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApplicationError::InvalidInput(format!("Dados JSON inválidos: {rejection}"))
            .into_interface(Uuid::new_v4().to_string())
    })?;

    if request.message.trim().is_empty() {
        return Err(ApplicationError::InvalidInput("Mensagem vazia".to_string())
            .into_interface(Uuid::new_v4().to_string())
            .into());
    }

    let history = request.history();
    let result =
        state.orchestrator.process_turn(&request.message, &request.user_id(), &history).await;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use ednna_agent::{Collaborators, DialogueOrchestrator};
    use ednna_core::config::PipelineConfig;
    use ednna_core::lexicon::Lexicon;
    use ednna_db::repositories::{
        InMemoryConversationLog, InMemoryKnowledgeRepository, InMemoryPendingRepository,
        InMemoryProfileRepository,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ChatRequest};

    fn app() -> (Router, Arc<InMemoryPendingRepository>) {
        let pending = Arc::new(InMemoryPendingRepository::default());
        let stores = Collaborators {
            knowledge: Arc::new(InMemoryKnowledgeRepository::default()),
            profiles: Arc::new(InMemoryProfileRepository::default()),
            pending: pending.clone(),
            conversations: Arc::new(InMemoryConversationLog::default()),
        };
        let lexicon = Arc::new(Lexicon::builtin().expect("builtin lexicon"));
        let orchestrator = DialogueOrchestrator::new(lexicon, &PipelineConfig::default(), stores);
        (router(Arc::new(orchestrator)), pending)
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn chat_returns_the_turn_result() {
        let (app, _) = app();
        let body = json!({"message": "vc e burro", "user_id": "u-1"}).to_string();

        let (status, payload) = post(app, &body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["intent"], "filtered");
        assert_eq!(payload["confidence"], 0.99);
    }

    #[tokio::test]
    async fn blank_message_is_a_bad_request() {
        let (app, pending) = app();

        let (status, payload) = post(app, &json!({"message": "   "}).to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["detail"].as_str().unwrap_or_default().contains("Mensagem vazia"));
        assert!(pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let (app, _) = app();

        let (status, payload) = post(app, "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn numeric_user_ids_are_accepted() {
        let (app, pending) = app();
        let body = json!({"message": "vocês têm aplicativo para iphone?", "user_id": 42});

        let (status, payload) = post(app, &body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["intent"], "unknown");
        let recorded = pending.all().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].user_id.as_str(), "42");
    }

    #[tokio::test]
    async fn history_drives_follow_up_resolution() {
        let (app, _) = app();
        let body = json!({
            "message": "e",
            "user_id": "u-2",
            "history": [
                {"role": "user", "text": "o que é o teia card?"},
                {"role": "bot", "text": "É a nossa plataforma."}
            ]
        });

        let (status, payload) = post(app, &body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_ne!(payload["intent"], "error");
    }

    #[test]
    fn history_keeps_sent_timestamps_and_stamps_missing_ones() {
        let request: ChatRequest = serde_json::from_value(json!({
            "message": "e o prazo?",
            "history": [
                {"role": "user", "text": "o que é edi", "timestamp": "2026-03-01T12:30:00Z"},
                {"role": "bot", "text": "EDI é a troca de arquivos."}
            ]
        }))
        .expect("request");

        let before = chrono::Utc::now();
        let history = request.history();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp.to_rfc3339(), "2026-03-01T12:30:00+00:00");
        assert!(history[1].timestamp >= before);
    }
}
