//! Application state shared by all handlers

use std::sync::Arc;

use chrono::Duration;
use comfortway_core::{LinkSigner, SessionIssuer};

use crate::config::Config;
use crate::credentials::CredentialVerifier;
use crate::directory::UserDirectory;
use crate::email::EmailSender;
use crate::provider::IdentityProvider;
use crate::resources::ResourceService;
use crate::store::DocumentStore;

/// Collaborators are built once in `main` and shared behind an `Arc`
pub struct AppState<D, P, E> {
    pub config: Config,
    pub store: Arc<D>,
    pub sessions: SessionIssuer,
    pub directory: UserDirectory<D, P>,
    pub credentials: CredentialVerifier<D, P, E>,
    pub resources: ResourceService<D>,
}

impl<D, P, E> AppState<D, P, E>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    pub fn new(config: Config, store: D, provider: P, email_sender: E) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(provider);
        let secret = config.jwt_secret.as_bytes();

        let sessions =
            SessionIssuer::new(secret).with_validity(Duration::hours(config.session_ttl_hours));
        let links = LinkSigner::new(secret)
            .with_validity(Duration::minutes(config.email_link_ttl_minutes));

        let directory = UserDirectory::new(Arc::clone(&store), Arc::clone(&provider))
            .with_hash_cost(config.bcrypt_cost);
        let credentials = CredentialVerifier::new(
            directory.clone(),
            Arc::clone(&store),
            provider,
            Arc::new(email_sender),
            links,
            config.public_base_url.clone(),
        );
        let resources = ResourceService::new(Arc::clone(&store));

        Self {
            config,
            store,
            sessions,
            directory,
            credentials,
            resources,
        }
    }
}
