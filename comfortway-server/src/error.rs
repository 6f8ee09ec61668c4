//! API error types

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Email is required")]
    EmailRequired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("No token provided")]
    NotAuthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired sign-in link")]
    InvalidLink,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Verification required")]
    VerificationRequired,

    #[error("Forbidden")]
    Forbidden,

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmailRequired | ApiError::InvalidInput(_) | ApiError::InvalidRole(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::NotAuthenticated
            | ApiError::InvalidCredentials
            | ApiError::InvalidLink
            | ApiError::InvalidToken
            | ApiError::TokenExpired
            | ApiError::VerificationRequired => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<comfortway_core::Error> for ApiError {
    fn from(err: comfortway_core::Error) -> Self {
        use comfortway_core::Error;

        match err {
            Error::InvalidToken(reason) => {
                tracing::debug!(%reason, "Rejected session token");
                ApiError::InvalidToken
            }
            Error::TokenExpired => ApiError::TokenExpired,
            Error::VerificationRequired => ApiError::VerificationRequired,
            Error::InvalidLink(reason) => {
                tracing::debug!(%reason, "Rejected sign-in link");
                ApiError::InvalidLink
            }
            Error::InvalidRole(role) => ApiError::InvalidRole(role),
            Error::Forbidden => ApiError::Forbidden,
            Error::Encoding(msg) => ApiError::Upstream(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::InvalidInput(details) => {
                json!({ "error": "Invalid input", "details": details })
            }
            ApiError::InvalidRole(role) => {
                json!({ "error": "Invalid role", "details": role })
            }
            ApiError::Upstream(details) => {
                tracing::error!("Upstream failure: {}", details);
                json!({ "error": "Upstream service failure", "details": details })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
