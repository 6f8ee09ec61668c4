//! Data models for stored documents

use chrono::{DateTime, Utc};
use comfortway_core::Role;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{timestamp, Document, Fields, StoreResult};
use crate::error::ApiError;

/// Identities, keyed by user id
pub const USERS: &str = "users";

/// Normalized email to user id
pub const EMAIL_INDEX: &str = "emailIndex";

/// Pending email sign-in links
pub const EMAIL_LINKS: &str = "emailLinks";

/// Where an identity assertion came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Self-registration with a password
    #[default]
    Manual,
    /// Federated Google sign-in
    Google,
    /// Passwordless email link
    EmailLink,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Manual => "manual",
            Provider::Google => "google",
            Provider::EmailLink => "email_link",
        }
    }
}

/// A user as stored, including the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(skip)]
    pub id: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub provider: Provider,

    /// Id of the principal at the identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated_uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn from_document(doc: Document) -> StoreResult<Self> {
        let mut record: Self = from_fields(doc.fields)?;
        record.id = doc.id;
        Ok(record)
    }

    pub fn to_fields(&self) -> StoreResult<Fields> {
        to_fields(self)
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// The public shape, without the password hash
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            provider: self.provider,
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login: self.last_login,
        }
    }
}

/// A user as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub provider: Provider,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub last_login: Option<DateTime<Utc>>,
}

/// Claim on a normalized email address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailIndexEntry {
    pub user_id: String,
    #[serde(with = "timestamp")]
    pub claimed_at: DateTime<Utc>,
}

impl EmailIndexEntry {
    pub fn from_document(doc: Document) -> StoreResult<Self> {
        from_fields(doc.fields)
    }

    pub fn to_fields(&self) -> StoreResult<Fields> {
        to_fields(self)
    }
}

/// An in-flight passwordless login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLinkRecord {
    #[serde(skip)]
    pub id: String,
    pub email: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl EmailLinkRecord {
    pub fn from_document(doc: Document) -> StoreResult<Self> {
        let mut record: Self = from_fields(doc.fields)?;
        record.id = doc.id;
        Ok(record)
    }

    pub fn to_fields(&self) -> StoreResult<Fields> {
        to_fields(self)
    }
}

fn from_fields<T: DeserializeOwned>(fields: Fields) -> StoreResult<T> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::Upstream(format!("Malformed stored document: {}", e)))
}

fn to_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::Upstream("Document did not serialize to an object".to_string())),
        Err(e) => Err(ApiError::Upstream(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserRecord {
        UserRecord {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: Some("$2b$04$hash".to_string()),
            role: Role::Sales,
            provider: Provider::Manual,
            federated_uid: None,
            display_name: Some("Asha".to_string()),
            photo_url: None,
            created_at: timestamp::now(),
            updated_at: None,
            last_login: None,
        }
    }

    #[test]
    fn test_user_record_document_round_trip() {
        let original = record();
        let fields = original.to_fields().unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["role"], "sales");
        assert_eq!(fields["provider"], "manual");

        let restored = UserRecord::from_document(Document::new("u1", fields)).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_identity_omits_password_hash() {
        let json = serde_json::to_value(record().to_identity()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["displayName"], "Asha");
        assert_eq!(json["id"], "u1");
    }

    #[test]
    fn test_malformed_document_is_upstream_error() {
        let mut fields = Fields::new();
        fields.insert("email".to_string(), Value::Bool(true));
        let err = UserRecord::from_document(Document::new("u1", fields)).unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
