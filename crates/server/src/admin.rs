use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use ednna_core::domain::knowledge::{derive_keywords, PendingQuestion};
use ednna_core::errors::ApplicationError;
use ednna_db::repositories::{RepositoryError, SqlKnowledgeRepository, SqlPendingRepository};
use ednna_db::DbPool;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::ApiError;

pub const LEARN_PAGE_SIZE: u32 = 50;

#[derive(Clone)]
pub struct AdminState {
    db_pool: DbPool,
}

#[derive(Debug, Serialize)]
pub struct LearnResponse {
    pub questions: Vec<PendingQuestion>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeachRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct TeachResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub entry_id: i64,
    pub keywords: Vec<String>,
    pub answered_questions: u64,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/admin/learn", get(learn))
        .route("/admin/teach", post(teach))
        .with_state(AdminState { db_pool })
}

/// Newest pending questions for the teaching dashboard.
pub async fn learn(State(state): State<AdminState>) -> Result<Json<LearnResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let questions = SqlPendingRepository::new(state.db_pool)
        .list_pending(LEARN_PAGE_SIZE)
        .await
        .map_err(|error| unavailable(error, "pending", &correlation_id))?;

    Ok(Json(LearnResponse { questions }))
}

pub async fn teach(
    State(state): State<AdminState>,
    payload: Result<Json<TeachRequest>, JsonRejection>,
) -> Result<Json<TeachResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(request) = payload.map_err(|rejection| {
        ApplicationError::InvalidInput(format!("Dados JSON inválidos: {rejection}"))
            .into_interface(correlation_id.clone())
    })?;

    let question = request.question.trim();
    let answer = request.answer.trim();
    let category = request.category.trim();
    if question.is_empty() || answer.is_empty() || category.is_empty() {
        return Err(ApplicationError::InvalidInput(
            "Todos os campos são obrigatórios".to_string(),
        )
        .into_interface(correlation_id)
        .into());
    }

    let keywords = derive_keywords(answer);
    let entry_id = SqlKnowledgeRepository::new(state.db_pool.clone())
        .upsert(question, answer, category, &keywords)
        .await
        .map_err(|error| unavailable(error, "knowledge", &correlation_id))?;
    let answered_questions = SqlPendingRepository::new(state.db_pool)
        .mark_answered(question)
        .await
        .map_err(|error| unavailable(error, "pending", &correlation_id))?;

    info!(
        event_name = "admin.teach.completed",
        correlation_id = %correlation_id,
        entry_id,
        category,
        answered_questions,
        "knowledge entry taught"
    );

    Ok(Json(TeachResponse {
        status: "success",
        message: "Ednna aprendeu com sucesso!",
        entry_id,
        keywords,
        answered_questions,
    }))
}

fn unavailable(error: RepositoryError, store: &'static str, correlation_id: &str) -> ApiError {
    ApplicationError::Store(error.into_store_error(store)).into_interface(correlation_id).into()
}
