//! Federated identity provider

pub mod http;

pub use http::{HttpIdentityProvider, IdentityProviderConfig};

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;

/// Profile asserted by the identity provider for a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    /// Principal id at the provider
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider looked at the assertion and refused it
    #[error("assertion rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered nonsense
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected(reason) => {
                tracing::debug!(%reason, "Federated assertion rejected");
                ApiError::InvalidCredentials
            }
            ProviderError::Unavailable(reason) => ApiError::Upstream(reason),
        }
    }
}

/// Trait for the external identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate a federated ID token and return the asserted profile
    async fn verify_id_token(&self, id_token: &str) -> Result<FederatedProfile, ProviderError>;

    /// Delete the principal's account at the provider
    async fn delete_account(&self, uid: &str) -> Result<(), ProviderError>;
}

/// Allow using Box<dyn IdentityProvider> as an IdentityProvider
#[async_trait]
impl IdentityProvider for Box<dyn IdentityProvider> {
    async fn verify_id_token(&self, id_token: &str) -> Result<FederatedProfile, ProviderError> {
        (**self).verify_id_token(id_token).await
    }

    async fn delete_account(&self, uid: &str) -> Result<(), ProviderError> {
        (**self).delete_account(uid).await
    }
}
