use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ednna_core::errors::InterfaceError;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// Response wrapper so handlers can return `Result<_, ApiError>`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        warn!(
            event_name = "http.request.rejected",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "request rejected"
        );

        let body = ErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
