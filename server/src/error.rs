// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Our custom error type for the application.
///
/// Storage failures are surfaced, never silently retried; retry policy
/// belongs to the caller. Every other variant maps to a client-facing
/// status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("work order {0} does not exist")]
    InvalidReference(i64),

    #[error("service report {0} is already approved")]
    AlreadyApproved(i64),

    #[error("{0}")]
    Validation(String),

    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidReference(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyApproved(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Allows converting an `sqlx::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.into())
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let message = match &self {
            // Log the internal error for debugging, but never leak it.
            AppError::Storage(err) => {
                tracing::error!("Internal server error: {:?}", err);
                "An internal error occurred.".to_string()
            }
            other => other.to_string(),
        };

        tracing::error!(
            "Responding with error: status_code={}, message={}",
            code.as_u16(),
            message
        );
        (code, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
