//! Session tokens
//!
//! A session token is an HS256 JWT binding a principal id, email and role,
//! plus a flag recording whether every login step has been completed.
//! Tokens are stateless: expiry is the only way a session ends short of
//! rotating the signing secret.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Role};

/// Default validity window of a session token
pub const DEFAULT_SESSION_VALIDITY_HOURS: i64 = 24;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal id
    pub sub: String,

    pub email: String,

    pub role: Role,

    /// False while a multi-step login still awaits its second step
    pub verified: bool,

    /// Issued at time (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn principal_id(&self) -> &str {
        &self.sub
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Mints and checks session tokens with a server-held secret
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl SessionIssuer {
    /// Create an issuer with the default 24 hour validity
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity: Duration::hours(DEFAULT_SESSION_VALIDITY_HOURS),
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token for the given principal, valid from now
    pub fn issue(&self, principal_id: &str, email: &str, role: Role, verified: bool) -> Result<String> {
        self.issue_at(principal_id, email, role, verified, Utc::now())
    }

    /// Issue a token as if it had been minted at `issued_at`
    pub fn issue_at(
        &self,
        principal_id: &str,
        email: &str,
        role: Role,
        verified: bool,
        issued_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = SessionClaims {
            sub: principal_id.to_string(),
            email: email.to_string(),
            role,
            verified,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.validity).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Check signature and expiry, ignoring the verified flag
    pub fn decode(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::TokenExpired,
                _ => Error::InvalidToken(e.to_string()),
            })
    }

    /// Decode a token and require a completed login
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let claims = self.decode(token)?;
        if !claims.verified {
            return Err(Error::VerificationRequired);
        }
        Ok(claims)
    }
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}
