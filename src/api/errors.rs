use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::exam::session::SessionError;
use crate::services::correction::CorrectionSubmitError;
use crate::services::generation::GenerationError;
use crate::services::rendezvous::RendezvousError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    GatewayTimeout(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::BadRequest(message) => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Conflict(message) => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::BadGateway(message) => {
                tracing::error!(error = %message, "Upstream workflow failure");
                let status = StatusCode::BAD_GATEWAY;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::GatewayTimeout(message) => {
                let status = StatusCode::GATEWAY_TIMEOUT;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match &err {
            SessionError::EmptyAnswers => ApiError::BadRequest(err.to_string()),
            SessionError::InvalidTransition { .. }
            | SessionError::NoAttempt
            | SessionError::SubmissionInFlight
            | SessionError::AnswersLocked(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match &err {
            GenerationError::Timeout => ApiError::GatewayTimeout("Exam generation timed out"),
            GenerationError::Rejected { .. }
            | GenerationError::Request(_)
            | GenerationError::Failed => ApiError::BadGateway(err.to_string()),
            GenerationError::Db(inner) => ApiError::internal(inner, "Generation polling failed"),
        }
    }
}

impl From<CorrectionSubmitError> for ApiError {
    fn from(err: CorrectionSubmitError) -> Self {
        ApiError::BadGateway(err.to_string())
    }
}

impl From<RendezvousError> for ApiError {
    fn from(err: RendezvousError) -> Self {
        match err {
            RendezvousError::Timeout => {
                ApiError::GatewayTimeout("Correction did not arrive in time")
            }
            RendezvousError::Store(inner) => {
                ApiError::internal(inner, "Failed to poll correction results")
            }
        }
    }
}
