//! User directory
//!
//! Authoritative mapping from identity to profile and role. Emails are
//! unique: each identity owns an `emailIndex/<normalized email>` document
//! pointing back at its id, which gives O(1) lookups and a create-if-absent
//! claim for registration.
//!
//! Registration is a two-step saga. The email claim is written first, then
//! the user document. If the second write fails the claim is released. A
//! claim left behind by a crashed process (no user document, older than
//! [`ORPHAN_CLAIM_GRACE_SECS`]) is taken over by the next registration.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use comfortway_core::Role;
use serde::Deserialize;

use crate::crypto::{generate_id, hash_password_blocking, validate_password, BCRYPT_COST};
use crate::error::ApiError;
use crate::provider::{FederatedProfile, IdentityProvider};
use crate::store::{
    timestamp, DocumentStore, EmailIndexEntry, Identity, Provider, Query, StoreResult, UserRecord,
    EMAIL_INDEX, USERS,
};

/// Age after which a claim without a user document counts as abandoned
pub const ORPHAN_CLAIM_GRACE_SECS: i64 = 60;

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input for [`UserDirectory::create`]
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Unparsed; `None` means the default role
    pub role: Option<String>,
    pub provider: Provider,
    pub federated_uid: Option<String>,
}

/// Partial update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Option<String>,
}

impl UserUpdate {
    pub fn changes_role(&self) -> bool {
        self.role.is_some()
    }
}

pub struct UserDirectory<D, P> {
    store: Arc<D>,
    provider: Arc<P>,
    hash_cost: u32,
}

impl<D, P> Clone for UserDirectory<D, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
            hash_cost: self.hash_cost,
        }
    }
}

impl<D, P> UserDirectory<D, P>
where
    D: DocumentStore,
    P: IdentityProvider,
{
    pub fn new(store: Arc<D>, provider: Arc<P>) -> Self {
        Self {
            store,
            provider,
            hash_cost: BCRYPT_COST,
        }
    }

    /// Override the bcrypt cost (tests use the minimum)
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn create(&self, new_user: NewUser) -> StoreResult<Identity> {
        Ok(self.create_record(new_user).await?.to_identity())
    }

    pub async fn create_record(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() {
            return Err(ApiError::InvalidInput("Email is required".to_string()));
        }

        let role = match new_user.role.as_deref() {
            Some(role) => role.parse::<Role>()?,
            None => Role::default(),
        };

        let password_hash = match new_user.password {
            Some(password) => {
                validate_password(&password)?;
                Some(hash_password_blocking(password, self.hash_cost).await?)
            }
            None => None,
        };

        let now = timestamp::now();
        let record = UserRecord {
            id: generate_id(),
            email,
            password_hash,
            role,
            provider: new_user.provider,
            federated_uid: new_user.federated_uid,
            display_name: new_user.display_name.filter(|s| !s.trim().is_empty()),
            photo_url: new_user.photo_url.filter(|s| !s.trim().is_empty()),
            created_at: now,
            updated_at: None,
            last_login: None,
        };

        self.claim_email(&record.email, &record.id, now).await?;

        let written = match record.to_fields() {
            Ok(fields) => self.store.put(USERS, &record.id, fields).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(user_id = %record.id, email = %record.email, error = %e, "User write failed, releasing email claim");
            if let Err(cleanup) = self.release_claim(&record.email, &record.id).await {
                tracing::error!(email = %record.email, error = %cleanup, "Failed to release email claim");
            }
            return Err(e);
        }

        tracing::info!(
            user_id = %record.id,
            email = %record.email,
            role = %record.role,
            provider = record.provider.as_str(),
            "User created"
        );
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Identity> {
        Ok(self.get_record(id).await?.to_identity())
    }

    pub async fn get_record(&self, id: &str) -> StoreResult<UserRecord> {
        let doc = self
            .store
            .get(USERS, id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User".to_string()))?;
        UserRecord::from_document(doc)
    }

    /// Resolve an email through the index
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let email = normalize_email(email);
        let Some(doc) = self.store.get(EMAIL_INDEX, &email).await? else {
            return Ok(None);
        };
        let claim = EmailIndexEntry::from_document(doc)?;

        match self.store.get(USERS, &claim.user_id).await? {
            Some(doc) => Ok(Some(UserRecord::from_document(doc)?)),
            // Claimed but never written
            None => Ok(None),
        }
    }

    /// All users, newest first, optionally restricted to one role
    pub async fn list(&self, role: Option<Role>) -> StoreResult<Vec<Identity>> {
        let mut query = Query::new().order_by_desc("createdAt");
        if let Some(role) = role {
            query = query.where_eq("role", role.as_str());
        }

        self.store
            .query(USERS, &query)
            .await?
            .into_iter()
            .map(|doc| UserRecord::from_document(doc).map(|r| r.to_identity()))
            .collect()
    }

    pub async fn update(&self, id: &str, update: UserUpdate) -> StoreResult<Identity> {
        let mut record = self.get_record(id).await?;
        let now = timestamp::now();

        if let Some(role) = update.role.as_deref() {
            record.role = role.parse::<Role>()?;
        }
        if let Some(name) = update.display_name {
            record.display_name = Some(name);
        }
        if let Some(photo) = update.photo_url {
            record.photo_url = Some(photo);
        }
        if let Some(password) = update.password {
            validate_password(&password)?;
            record.password_hash = Some(hash_password_blocking(password, self.hash_cost).await?);
        }

        let old_email = record.email.clone();
        if let Some(email) = update.email {
            let email = normalize_email(&email);
            if email.is_empty() {
                return Err(ApiError::InvalidInput("Email must not be empty".to_string()));
            }
            if email != old_email {
                self.claim_email(&email, id, now).await?;
                record.email = email;
            }
        }
        let email_moved = record.email != old_email;

        record.updated_at = Some(now);
        let written = match record.to_fields() {
            Ok(fields) => self.store.merge(USERS, id, fields).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if email_moved {
                if let Err(cleanup) = self.release_claim(&record.email, id).await {
                    tracing::error!(email = %record.email, error = %cleanup, "Failed to release email claim");
                }
            }
            return Err(e);
        }

        if email_moved {
            if let Err(e) = self.release_claim(&old_email, id).await {
                tracing::warn!(email = %old_email, error = %e, "Failed to release previous email claim");
            }
        }

        tracing::info!(user_id = %id, "User updated");
        Ok(record.to_identity())
    }

    /// Stamp `lastLogin`, filling empty profile fields from a federated profile
    pub async fn record_login(
        &self,
        id: &str,
        profile: Option<&FederatedProfile>,
    ) -> StoreResult<UserRecord> {
        let mut record = self.get_record(id).await?;
        record.last_login = Some(timestamp::now());

        if let Some(profile) = profile {
            if record.display_name.is_none() {
                record.display_name = profile.display_name.clone();
            }
            if record.photo_url.is_none() {
                record.photo_url = profile.photo_url.clone();
            }
            if record.federated_uid.is_none() {
                record.federated_uid = Some(profile.uid.clone());
            }
        }

        self.store.merge(USERS, id, record.to_fields()?).await?;
        Ok(record)
    }

    /// Remove a user. Federated account cleanup is best effort.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let record = self.get_record(id).await?;

        if !self.store.delete(USERS, id).await? {
            return Err(ApiError::NotFound("User".to_string()));
        }

        if let Err(e) = self.release_claim(&record.email, id).await {
            tracing::warn!(user_id = %id, email = %record.email, error = %e, "Failed to release email claim");
        }

        if let Some(uid) = &record.federated_uid {
            if let Err(e) = self.provider.delete_account(uid).await {
                tracing::warn!(user_id = %id, federated_uid = %uid, error = %e, "Federated account deletion failed");
            }
        }

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn claim_email(&self, email: &str, user_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let entry = EmailIndexEntry {
            user_id: user_id.to_string(),
            claimed_at: now,
        }
        .to_fields()?;

        match self.store.insert_with_id(EMAIL_INDEX, email, entry.clone()).await {
            Ok(_) => return Ok(()),
            Err(ApiError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        let Some(doc) = self.store.get(EMAIL_INDEX, email).await? else {
            // Released between the two calls
            self.store.insert_with_id(EMAIL_INDEX, email, entry).await?;
            return Ok(());
        };

        let claim = EmailIndexEntry::from_document(doc)?;
        let abandoned = now - claim.claimed_at > Duration::seconds(ORPHAN_CLAIM_GRACE_SECS)
            && self.store.get(USERS, &claim.user_id).await?.is_none();
        if !abandoned {
            return Err(ApiError::AlreadyExists("User".to_string()));
        }

        tracing::warn!(email = %email, stale_user_id = %claim.user_id, "Taking over orphaned email claim");
        self.store.put(EMAIL_INDEX, email, entry).await?;

        // Two registrations can both judge the same claim abandoned. The last
        // write wins; the loser backs off here. Both can still pass this read
        // if their writes and reads interleave exactly, since the store offers
        // no compare-and-swap.
        let winner = match self.store.get(EMAIL_INDEX, email).await? {
            Some(doc) => EmailIndexEntry::from_document(doc)?.user_id,
            None => String::new(),
        };
        if winner != user_id {
            tracing::warn!(email = %email, winner = %winner, "Lost orphaned email claim to another registration");
            return Err(ApiError::AlreadyExists("User".to_string()));
        }
        Ok(())
    }

    /// Delete the claim on `email` if it still belongs to `user_id`
    async fn release_claim(&self, email: &str, user_id: &str) -> StoreResult<()> {
        if let Some(doc) = self.store.get(EMAIL_INDEX, email).await? {
            if EmailIndexEntry::from_document(doc)?.user_id == user_id {
                self.store.delete(EMAIL_INDEX, email).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
    }

    #[test]
    fn test_user_update_accepts_photo_url_key() {
        let update: UserUpdate =
            serde_json::from_str(r#"{"displayName":"Asha","photoURL":"https://x/y.png"}"#).unwrap();
        assert_eq!(update.display_name.as_deref(), Some("Asha"));
        assert_eq!(update.photo_url.as_deref(), Some("https://x/y.png"));
        assert!(!update.changes_role());
    }
}
