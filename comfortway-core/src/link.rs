//! Email sign-in link tokens
//!
//! The code embedded in an emailed sign-in link is a JWT scoped to the
//! `email-link` audience, so it can never be replayed as a session token
//! (and a session token is never accepted as a link).

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Audience of every link token
pub const EMAIL_LINK_AUDIENCE: &str = "email-link";

/// Default lifetime of a sign-in link
pub const DEFAULT_LINK_VALIDITY_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkClaims {
    /// Target email address (normalized)
    pub sub: String,

    /// Id of the pending link record
    pub jti: String,

    pub aud: String,

    pub iat: i64,

    pub exp: i64,
}

impl LinkClaims {
    pub fn email(&self) -> &str {
        &self.sub
    }

    pub fn link_id(&self) -> &str {
        &self.jti
    }
}

/// Signs and validates sign-in link codes
#[derive(Clone)]
pub struct LinkSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl LinkSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity: Duration::minutes(DEFAULT_LINK_VALIDITY_MINUTES),
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign a code for the pending link `link_id`
    pub fn sign(&self, link_id: &str, email: &str) -> Result<String> {
        self.sign_at(link_id, email, Utc::now())
    }

    pub fn sign_at(&self, link_id: &str, email: &str, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = LinkClaims {
            sub: email.to_string(),
            jti: link_id.to_string(),
            aud: EMAIL_LINK_AUDIENCE.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.validity).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Validate a code and check it was issued for `email`
    pub fn verify(&self, code: &str, email: &str) -> Result<LinkClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[EMAIL_LINK_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);

        let claims = decode::<LinkClaims>(code, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::InvalidLink("link expired".to_string()),
                _ => Error::InvalidLink(e.to_string()),
            })?;

        if claims.sub != email {
            return Err(Error::InvalidLink("link was issued for another address".to_string()));
        }

        Ok(claims)
    }
}

impl fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSigner")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}
