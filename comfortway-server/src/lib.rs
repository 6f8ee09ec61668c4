//! Comfort Way backend server
//!
//! JSON REST API over a document store, with JWT sessions layered on
//! password, federated and email-link authentication.

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod directory;
pub mod email;
pub mod error;
pub mod provider;
pub mod resources;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use credentials::{Authenticated, CredentialVerifier};
pub use directory::{NewUser, UserDirectory, UserUpdate};
pub use email::{ConsoleEmailSender, EmailSender, SmtpConfig, SmtpEmailSender};
pub use error::ApiError;
pub use provider::{FederatedProfile, HttpIdentityProvider, IdentityProvider, ProviderError};
pub use resources::{ResourceService, ResourceSpec};
pub use state::AppState;
pub use store::{DocumentStore, InMemoryDocumentStore, SqliteDocumentStore};
