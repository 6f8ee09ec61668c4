//! Credential verifier
//!
//! Turns a presented secret (password, federated ID token or emailed
//! sign-in link) into a verified identity. Outputs are always the public
//! [`Identity`] shape.

use std::sync::Arc;

use chrono::Duration;
use comfortway_core::LinkSigner;
use futures::future::join_all;
use serde_json::{json, Value};
use url::Url;

use crate::crypto::{generate_id, verify_password_blocking};
use crate::directory::{normalize_email, NewUser, UserDirectory};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::{FederatedProfile, IdentityProvider};
use crate::store::{
    timestamp, DocumentStore, EmailLinkRecord, Fields, Identity, Provider, Query, StoreResult,
    EMAIL_LINKS,
};

/// Path the emailed link points at
pub const EMAIL_LINK_COMPLETE_PATH: &str = "/v1/auth/email-link/complete";

/// Query parameter carrying the link code
pub const LINK_CODE_PARAM: &str = "oobCode";

/// A successful authentication
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    /// The identity was created by this call
    pub is_new_user: bool,
}

/// Pull the link code out of a full sign-in URL, or accept a bare code
pub fn extract_code(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    match Url::parse(link) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == LINK_CODE_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) if !link.contains(char::is_whitespace) => Some(link.to_string()),
        Err(_) => None,
    }
}

pub struct CredentialVerifier<D, P, E> {
    directory: UserDirectory<D, P>,
    store: Arc<D>,
    provider: Arc<P>,
    email_sender: Arc<E>,
    links: LinkSigner,
    public_base_url: String,
}

impl<D, P, E> CredentialVerifier<D, P, E>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    pub fn new(
        directory: UserDirectory<D, P>,
        store: Arc<D>,
        provider: Arc<P>,
        email_sender: Arc<E>,
        links: LinkSigner,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            store,
            provider,
            email_sender,
            links,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Check an email/password pair
    pub async fn verify_password(&self, email: &str, plaintext: &str) -> StoreResult<Identity> {
        let record = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User".to_string()))?;

        // Federated-only accounts have no password to compare against
        let hash = record
            .password_hash
            .clone()
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password_blocking(plaintext.to_string(), hash).await? {
            tracing::debug!(user_id = %record.id, "Password mismatch");
            return Err(ApiError::InvalidCredentials);
        }

        let record = self.directory.record_login(&record.id, None).await?;
        tracing::info!(user_id = %record.id, "Password login");
        Ok(record.to_identity())
    }

    /// Exchange a federated ID token for a local identity
    pub async fn verify_federated(&self, id_token: &str) -> StoreResult<Authenticated> {
        let profile = self.provider.verify_id_token(id_token).await?;
        let authenticated = self
            .find_or_create(&profile.email, Provider::Google, Some(&profile))
            .await?;

        tracing::info!(
            user_id = %authenticated.identity.id,
            is_new_user = authenticated.is_new_user,
            "Federated login"
        );
        Ok(authenticated)
    }

    /// Look up the identity for `email`, creating it on first sight
    pub async fn find_or_create(
        &self,
        email: &str,
        provider: Provider,
        profile: Option<&FederatedProfile>,
    ) -> StoreResult<Authenticated> {
        if let Some(record) = self.directory.find_by_email(email).await? {
            let record = self.directory.record_login(&record.id, profile).await?;
            return Ok(Authenticated {
                identity: record.to_identity(),
                is_new_user: false,
            });
        }

        let new_user = NewUser {
            email: email.to_string(),
            provider,
            federated_uid: profile.map(|p| p.uid.clone()),
            display_name: profile.and_then(|p| p.display_name.clone()),
            photo_url: profile.and_then(|p| p.photo_url.clone()),
            ..Default::default()
        };

        let (record, is_new_user) = match self.directory.create_record(new_user).await {
            Ok(record) => (record, true),
            // Lost a race with a concurrent first login
            Err(ApiError::AlreadyExists(_)) => match self.directory.find_by_email(email).await? {
                Some(record) => (record, false),
                // Claimed but the user document is not written yet
                None => {
                    tracing::warn!(email = %email, "Email claim pending, sign-in should be retried");
                    return Err(ApiError::Upstream(
                        "Account creation in progress, retry shortly".to_string(),
                    ));
                }
            },
            Err(e) => return Err(e),
        };

        let record = self.directory.record_login(&record.id, profile).await?;
        Ok(Authenticated {
            identity: record.to_identity(),
            is_new_user,
        })
    }

    /// Record a pending link and mail it. Returns the link id.
    pub async fn request_link(&self, email: &str) -> StoreResult<String> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ApiError::EmailRequired);
        }

        let record = EmailLinkRecord {
            id: generate_id(),
            email: email.clone(),
            created_at: timestamp::now(),
            verified: false,
            verified_at: None,
        };
        self.store
            .insert_with_id(EMAIL_LINKS, &record.id, record.to_fields()?)
            .await?;

        let code = self.links.sign(&record.id, &email)?;
        let link = self.link_url(&code, &email)?;

        let sender = Arc::clone(&self.email_sender);
        let to = email.clone();
        let sent = tokio::task::spawn_blocking(move || sender.send_sign_in_link(&to, &link))
            .await
            .map_err(|e| format!("mail task failed: {}", e))
            .and_then(|r| r);

        if let Err(e) = sent {
            tracing::error!(email = %email, link_id = %record.id, error = %e, "Failed to send sign-in link");
            if let Err(cleanup) = self.store.delete(EMAIL_LINKS, &record.id).await {
                tracing::warn!(link_id = %record.id, error = %cleanup, "Failed to remove undelivered link");
            }
            return Err(ApiError::Upstream(format!("Failed to send sign-in link: {}", e)));
        }

        tracing::info!(email = %email, link_id = %record.id, "Sign-in link requested");
        Ok(record.id)
    }

    /// Redeem an emailed link. Each link works once.
    pub async fn redeem_link(&self, email: &str, link: &str) -> StoreResult<Authenticated> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ApiError::EmailRequired);
        }

        let code = extract_code(link).ok_or(ApiError::InvalidLink)?;
        let claims = self.links.verify(&code, &email)?;

        let record = match self.store.get(EMAIL_LINKS, claims.link_id()).await? {
            Some(doc) => EmailLinkRecord::from_document(doc)?,
            None => {
                tracing::debug!(link_id = %claims.link_id(), "Link record missing");
                return Err(ApiError::InvalidLink);
            }
        };
        if record.email != email || record.verified {
            tracing::debug!(link_id = %record.id, verified = record.verified, "Link already used or mismatched");
            return Err(ApiError::InvalidLink);
        }

        let verified = verified_fields();
        self.store
            .merge(EMAIL_LINKS, &record.id, verified.clone())
            .await?;

        // Any other outstanding links for this address are settled too
        let others = self
            .store
            .query(EMAIL_LINKS, &Query::new().where_eq("email", email.as_str()))
            .await?
            .into_iter()
            .filter(|doc| doc.id != record.id)
            .filter(|doc| doc.get("verified") != Some(&Value::Bool(true)))
            .collect::<Vec<_>>();

        let results = join_all(
            others
                .iter()
                .map(|doc| self.store.merge(EMAIL_LINKS, &doc.id, verified.clone())),
        )
        .await;
        for (doc, result) in others.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(link_id = %doc.id, error = %e, "Failed to mark link verified");
            }
        }

        let authenticated = self
            .find_or_create(&email, Provider::EmailLink, None)
            .await?;
        tracing::info!(
            user_id = %authenticated.identity.id,
            link_id = %record.id,
            is_new_user = authenticated.is_new_user,
            "Email link redeemed"
        );
        Ok(authenticated)
    }

    /// Delete link records older than `max_age`. Returns how many went.
    pub async fn purge_stale_links(&self, max_age: Duration) -> StoreResult<usize> {
        let cutoff = timestamp::now() - max_age;
        let mut purged = 0;

        for doc in self.store.query(EMAIL_LINKS, &Query::new()).await? {
            let id = doc.id.clone();
            let stale = match EmailLinkRecord::from_document(doc) {
                Ok(record) => record.created_at < cutoff,
                Err(e) => {
                    tracing::warn!(link_id = %id, error = %e, "Purging malformed link record");
                    true
                }
            };
            if stale && self.store.delete(EMAIL_LINKS, &id).await? {
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::info!(purged, "Purged stale sign-in links");
        }
        Ok(purged)
    }

    pub fn link_url(&self, code: &str, email: &str) -> StoreResult<String> {
        let base = format!("{}{}", self.public_base_url, EMAIL_LINK_COMPLETE_PATH);
        Url::parse_with_params(&base, &[(LINK_CODE_PARAM, code), ("email", email)])
            .map(String::from)
            .map_err(|e| ApiError::Upstream(format!("Invalid public base URL: {}", e)))
    }
}

fn verified_fields() -> Fields {
    let mut fields = Fields::new();
    fields.insert("verified".to_string(), json!(true));
    fields.insert(
        "verifiedAt".to_string(),
        json!(timestamp::format(&timestamp::now())),
    );
    fields
}
