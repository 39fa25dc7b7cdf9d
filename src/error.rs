use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::token::TokenError;
use crate::cache::CacheError;
use crate::utils::{error_codes, error_to_api_response};
use crate::validation::FieldError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(String),

    #[error("too many requests, retry in {window_secs} seconds")]
    RateLimited { window_secs: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("token error: {0}")]
    Token(#[from] TokenError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Token(TokenError::Invalid(_)) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> i32 {
        match self.status_code() {
            StatusCode::BAD_REQUEST => error_codes::VALIDATION_ERROR,
            StatusCode::CONFLICT => error_codes::USER_EXISTS,
            StatusCode::UNAUTHORIZED => error_codes::AUTH_FAILED,
            StatusCode::NOT_FOUND => error_codes::NOT_FOUND,
            StatusCode::TOO_MANY_REQUESTS => error_codes::RATE_LIMIT,
            _ => error_codes::INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let message = if status.is_server_error() && !cfg!(debug_assertions) {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        match self {
            AppError::Validation(fields) => {
                (status, error_to_api_response(code, message, Some(fields))).into_response()
            }
            _ => (status, error_to_api_response::<()>(code, message, None)).into_response(),
        }
    }
}
