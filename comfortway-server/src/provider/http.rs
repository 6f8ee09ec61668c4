//! Identity provider backed by an OAuth tokeninfo endpoint

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{FederatedProfile, IdentityProvider, ProviderError};

/// Google's ID token introspection endpoint
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Clone)]
pub struct IdentityProviderConfig {
    pub tokeninfo_url: String,
    /// Expected `aud`; any audience is accepted when unset
    pub client_id: Option<String>,
    /// Base of the account admin endpoint, `DELETE {accounts_url}/{uid}`
    pub accounts_url: Option<String>,
    pub service_credential: Option<String>,
}

impl std::fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProviderConfig")
            .field("tokeninfo_url", &self.tokeninfo_url)
            .field("client_id", &self.client_id)
            .field("accounts_url", &self.accounts_url)
            .field("service_credential", &self.service_credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
            client_id: None,
            accounts_url: None,
            service_credential: None,
        }
    }
}

impl IdentityProviderConfig {
    /// Read `IDP_TOKENINFO_URL`, `IDP_CLIENT_ID`, `IDP_ACCOUNTS_URL` and
    /// `IDP_SERVICE_CREDENTIAL`
    pub fn from_env() -> Self {
        fn non_empty(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        Self {
            tokeninfo_url: non_empty("IDP_TOKENINFO_URL")
                .unwrap_or_else(|| GOOGLE_TOKENINFO_URL.to_string()),
            client_id: non_empty("IDP_CLIENT_ID"),
            accounts_url: non_empty("IDP_ACCOUNTS_URL"),
            service_credential: non_empty("IDP_SERVICE_CREDENTIAL"),
        }
    }
}

/// Tokeninfo response; the endpoint encodes booleans as strings
#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    aud: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
    picture: Option<String>,
}

impl TokenInfo {
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

pub struct HttpIdentityProvider {
    client: Client,
    config: IdentityProviderConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn tokeninfo_url(&self, id_token: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(&self.config.tokeninfo_url, &[("id_token", id_token)])
            .map_err(|e| ProviderError::Unavailable(format!("bad tokeninfo url: {}", e)))
    }

    fn check(&self, info: TokenInfo) -> Result<FederatedProfile, ProviderError> {
        if let Some(client_id) = &self.config.client_id {
            if &info.aud != client_id {
                return Err(ProviderError::Rejected(format!(
                    "audience mismatch: {}",
                    info.aud
                )));
            }
        }

        if !info.email_verified() {
            return Err(ProviderError::Rejected("email not verified".to_string()));
        }

        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ProviderError::Rejected("no email claim".to_string()))?;

        Ok(FederatedProfile {
            uid: info.sub,
            email,
            display_name: info.name,
            photo_url: info.picture,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_id_token(&self, id_token: &str) -> Result<FederatedProfile, ProviderError> {
        let response = self
            .client
            .get(self.tokeninfo_url(id_token)?)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Rejected(format!("tokeninfo returned {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("tokeninfo returned {}", status)));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("bad tokeninfo body: {}", e)))?;

        self.check(info)
    }

    async fn delete_account(&self, uid: &str) -> Result<(), ProviderError> {
        let Some(accounts_url) = &self.config.accounts_url else {
            tracing::debug!(uid = %uid, "No accounts endpoint configured; skipping federated delete");
            return Ok(());
        };

        let mut url = Url::parse(accounts_url)
            .map_err(|e| ProviderError::Unavailable(format!("bad accounts url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Unavailable("accounts url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(uid);

        let mut request = self.client.delete(url);
        if let Some(credential) = &self.config.service_credential {
            request = request.bearer_auth(credential);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!("account delete returned {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(client_id: Option<&str>) -> HttpIdentityProvider {
        HttpIdentityProvider::new(IdentityProviderConfig {
            client_id: client_id.map(str::to_string),
            ..Default::default()
        })
    }

    fn info(value: serde_json::Value) -> TokenInfo {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_accepts_verified_email() {
        let profile = provider(Some("client-1"))
            .check(info(json!({
                "sub": "g-123",
                "aud": "client-1",
                "email": "a@example.com",
                "email_verified": "true",
                "name": "Asha",
                "picture": "https://example.com/a.png"
            })))
            .unwrap();

        assert_eq!(profile.uid, "g-123");
        assert_eq!(profile.email, "a@example.com");
        assert_eq!(profile.display_name.as_deref(), Some("Asha"));
    }

    #[test]
    fn test_rejects_wrong_audience() {
        let err = provider(Some("client-1"))
            .check(info(json!({
                "sub": "g-123",
                "aud": "someone-else",
                "email": "a@example.com",
                "email_verified": true
            })))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[test]
    fn test_rejects_unverified_email() {
        let err = provider(None)
            .check(info(json!({
                "sub": "g-123",
                "aud": "client-1",
                "email": "a@example.com",
                "email_verified": "false"
            })))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[test]
    fn test_tokeninfo_url_escapes_token() {
        let url = provider(None).tokeninfo_url("a b&c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://oauth2.googleapis.com/tokeninfo?id_token=a+b%26c"
        );
    }

    #[tokio::test]
    async fn test_delete_without_endpoint_is_noop() {
        provider(None).delete_account("g-123").await.unwrap();
    }
}
