use crate::orchestrator::OrchestratorError;
use axum::{http, response, Json};
use serde_json::json;
use std::{error, fmt};
use validator::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    // 4xx
    BadRequest(String),
    QuotaExceeded(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Validation(ValidationErrors),

    // upstream
    Backend(String),
    TaskTimeout(String),

    // 5xx
    Internal(anyhow::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Validation(err) => write!(f, "Validation error: {}", err),
            AppError::Backend(msg) => write!(f, "Backend error: {}", msg),
            AppError::TaskTimeout(msg) => write!(f, "Task timeout: {}", msg),
            AppError::Internal(err) => write!(f, "Internal error: {}", err),
        }
    }
}

impl error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(err)
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Api { status: 404, message } => AppError::NotFound(message),
            OrchestratorError::Api { status: 403, message } => AppError::Unauthorized(message),
            OrchestratorError::Api { status: 409, message } => AppError::Conflict(message),
            OrchestratorError::TaskTimeout { .. } => AppError::TaskTimeout(err.to_string()),
            other => AppError::Backend(other.to_string()),
        }
    }
}

impl response::IntoResponse for AppError {
    fn into_response(self) -> response::Response {
        let (status, error_type, message) = match &self {
            // 4xx
            AppError::BadRequest(msg) => {
                (http::StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            AppError::QuotaExceeded(msg) => {
                (http::StatusCode::FORBIDDEN, "quota_exceeded", msg.clone())
            }
            AppError::Unauthorized(msg) => {
                (http::StatusCode::FORBIDDEN, "unauthorized", msg.clone())
            }
            AppError::NotFound(msg) => (http::StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Conflict(msg) => (http::StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Validation(errors) => (
                http::StatusCode::BAD_REQUEST,
                "validation_error",
                format_validation_errors(errors),
            ),

            // upstream failures keep the backend's text: callers need it to
            // diagnose orchestrator-side refusals
            AppError::Backend(msg) => {
                tracing::error!("Backend error: {}", msg);
                (http::StatusCode::BAD_GATEWAY, "backend_error", msg.clone())
            }
            AppError::TaskTimeout(msg) => {
                tracing::error!("Task timeout: {}", msg);
                (
                    http::StatusCode::GATEWAY_TIMEOUT,
                    "task_timeout",
                    msg.clone(),
                )
            }

            // 5xx
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        AppError::QuotaExceeded(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        AppError::Internal(err.into())
    }
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for field '{}'", field));

            messages.push(message);
        }
    }

    messages.join(", ")
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
