//! Error types for the lock subsystem

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock subsystem error types
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Project is already locked by {locked_by}")]
    Conflict {
        locked_by: String,
        locked_at: DateTime<Utc>,
    },

    #[error("Project {0} not found")]
    ProjectNotFound(String),

    #[error("No active lock found for project {0}")]
    NoActiveLock(String),

    #[error("Document not found: {project_id}/{file_name}")]
    DocumentNotFound {
        project_id: String,
        file_name: String,
    },

    #[error("API key {0} not found")]
    ApiKeyNotFound(String),

    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LockError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        LockError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether a retry of the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LockError::Unavailable(_))
    }

    /// Convert to API error code
    pub fn code(&self) -> &'static str {
        match self {
            LockError::Conflict { .. } => "LOCK_CONFLICT",
            LockError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            LockError::NoActiveLock(_) => "LOCK_NOT_FOUND",
            LockError::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            LockError::ApiKeyNotFound(_) => "API_KEY_NOT_FOUND",
            LockError::Invalid { .. } => "VALIDATION_ERROR",
            LockError::Unauthorized(_) => "UNAUTHORIZED",
            LockError::Forbidden(_) => "FORBIDDEN",
            LockError::Unavailable(_) => "UNAVAILABLE",
            LockError::Database(_) => "DATABASE_ERROR",
            LockError::Io(_) => "IO_ERROR",
            LockError::Serialization(_) => "SERIALIZATION_ERROR",
            LockError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            LockError::Conflict { .. } => StatusCode::CONFLICT,

            LockError::ProjectNotFound(_)
            | LockError::NoActiveLock(_)
            | LockError::DocumentNotFound { .. }
            | LockError::ApiKeyNotFound(_) => StatusCode::NOT_FOUND,

            LockError::Invalid { .. } => StatusCode::BAD_REQUEST,
            LockError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LockError::Forbidden(_) => StatusCode::FORBIDDEN,
            LockError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            LockError::Database(_)
            | LockError::Io(_)
            | LockError::Serialization(_)
            | LockError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Contextual payload for the API body
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            LockError::Conflict {
                locked_by,
                locked_at,
            } => Some(serde_json::json!({
                "lockedBy": locked_by,
                "lockedAt": locked_at,
            })),
            LockError::Invalid { field, .. } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

// SQLITE_BUSY, SQLITE_LOCKED and their extended codes
fn is_busy_code(code: &str) -> bool {
    matches!(code, "5" | "6" | "261" | "517" | "262")
}

impl From<sqlx::Error> for LockError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => LockError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) if db.code().as_deref().is_some_and(is_busy_code) => {
                LockError::Unavailable(err.to_string())
            }
            _ => LockError::Database(err.to_string()),
        }
    }
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LockError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                LockError::invalid(camel_case(field), message)
            }
            None => LockError::invalid("request", errors.to_string()),
        }
    }
}

/// Malformed bodies become `Invalid`, naming the offending field when serde
/// reports a path to it
impl From<JsonRejection> for LockError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        let detail = text
            .split_once("target type: ")
            .map(|(_, detail)| detail)
            .unwrap_or(&text);
        match detail.split_once(": ") {
            Some((path, message)) if !path.is_empty() && !path.contains(char::is_whitespace) => {
                LockError::invalid(path, message)
            }
            _ => LockError::invalid("body", detail),
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for LockError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }
        let body = ApiError {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        };

        (status, axum::Json(body)).into_response()
    }
}
