//! HTTP-facing error model.
//! Component errors from the explorer core are mapped here to a status code,
//! a stable machine code, and the human message the browser UI displays.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::explorer::{ArchiveError, Denied, ListError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Denied { code: String, message: String },
    NotFound { code: String, message: String },
    UserInput { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Denied { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Denied { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn denied<S: Into<String>>(code: S, msg: S) -> Self { AppError::Denied { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Denied { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::UserInput { .. } => 400,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<Denied> for AppError {
    fn from(_: Denied) -> Self { AppError::denied("access_denied", "Access denied") }
}

impl From<ListError> for AppError {
    fn from(err: ListError) -> Self {
        match err {
            ListError::NotFound => AppError::not_found("not_found", "Directory not found"),
            ListError::NotADirectory => AppError::user("not_a_directory", "Not a directory"),
            ListError::Io(_) => AppError::internal("internal", "Internal server error"),
        }
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound => AppError::not_found("not_found", "Directory not found"),
            ArchiveError::NotADirectory => AppError::user("not_a_directory", "Not a directory"),
            ArchiveError::Io(_) | ArchiveError::Zip(_) | ArchiveError::Walk(_) => {
                AppError::internal("archive_failed", "Failed to create archive")
            }
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(_: tokio::task::JoinError) -> Self { AppError::internal("internal_panic", "Internal server error") }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "error": self.message(),
        });
        (status, Json(body)).into_response()
    }
}
