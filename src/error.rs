use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::RideStatus;

#[derive(Debug, Error)]
pub enum AppError {
    // Ride errors
    #[error("Ride not found")]
    RideNotFound,
    #[error("Ride is no longer available")]
    RideUnavailable,
    #[error("Cannot change ride status from {from} to {to}")]
    InvalidTransition { from: RideStatus, to: RideStatus },

    // Directory errors
    #[error("Driver not found")]
    DriverNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("User is referenced by existing rides")]
    UserInUse,
    #[error("Phone number already registered for this user type")]
    PhoneTaken,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,

            AppError::RideNotFound | AppError::DriverNotFound | AppError::UserNotFound => {
                StatusCode::NOT_FOUND
            }

            AppError::RideUnavailable
            | AppError::InvalidTransition { .. }
            | AppError::UserInUse
            | AppError::PhoneTaken => StatusCode::CONFLICT,

            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Validation(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),

            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }

            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// Extractor rejections keep axum's message but use our status and body.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            return AppError::Internal(anyhow::anyhow!(rejection.body_text()));
        }
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
