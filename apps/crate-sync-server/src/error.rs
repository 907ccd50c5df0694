//! Error types for the Crate Sync server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::sync::StoreError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
///
/// Responses carry a short plain-text body; details only go to the log.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidJson(e) => {
                tracing::debug!("Rejected body: {}", e);
                (StatusCode::BAD_REQUEST, "invalid json")
            }
            AppError::Unauthorized(e) => {
                tracing::warn!("Rejected push: {}", e);
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            AppError::Store(StoreError::DeadlineExceeded) => {
                tracing::error!("Store deadline exceeded");
                (StatusCode::INTERNAL_SERVER_ERROR, "deadline exceeded")
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "error")
            }
        };

        (status, message).into_response()
    }
}
