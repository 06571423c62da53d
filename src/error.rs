use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{bmi::BmiError, repository::RepositoryError, session::EncodeError};

/// AppError
///
/// Handler-level failures. Client errors carry their message through; everything that maps
/// to a 500 is logged here and replaced by a generic body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Bmi(#[from] BmiError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Session(#[from] EncodeError),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "details": errors }),
            ),
            AppError::Bmi(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": self.to_string() }),
            ),
            AppError::Repository(RepositoryError::Conflict(_)) => {
                tracing::info!(error = %self, "unique constraint rejected write");
                (StatusCode::BAD_REQUEST, json!({ "error": "Already exists" }))
            }
            AppError::Repository(_)
            | AppError::Session(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
