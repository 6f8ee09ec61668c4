//! Error types for Comfort Way core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Verification required")]
    VerificationRequired,

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}
