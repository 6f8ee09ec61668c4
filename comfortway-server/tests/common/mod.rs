//! Common test utilities for server integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue};
use axum_test::TestServer;
use comfortway_server::provider::{FederatedProfile, IdentityProvider, ProviderError};
use comfortway_server::store::{
    timestamp, Document, DocumentStore, EmailIndexEntry, Fields, Query, StoreResult, EMAIL_INDEX,
};
use comfortway_server::{
    routes, ApiError, AppState, Config, EmailSender, InMemoryDocumentStore, NewUser,
};
use serde_json::{json, Value};

pub const TEST_SECRET: &str = "integration-test-secret";

pub const PASSWORD: &str = "correct-horse-42";

/// Mock email sender that captures sign-in links
#[derive(Default, Clone)]
pub struct MockEmailSender {
    /// Captured (email, link) pairs
    pub sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last link sent to an email
    pub fn get_link(&self, email: &str) -> Option<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(e, _)| e == email)
            .map(|(_, link)| link.clone())
    }

    pub fn count(&self, email: &str) -> usize {
        self.sent.read().unwrap().iter().filter(|(e, _)| e == email).count()
    }
}

impl EmailSender for MockEmailSender {
    fn send_sign_in_link(&self, email: &str, link: &str) -> Result<(), String> {
        self.sent
            .write()
            .unwrap()
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}

/// Identity provider with scripted tokens
#[derive(Default, Clone)]
pub struct MockIdentityProvider {
    tokens: Arc<RwLock<HashMap<String, FederatedProfile>>>,
    /// uids whose account deletion was requested
    pub deleted: Arc<RwLock<Vec<String>>>,
    fail_deletes: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as an assertion of `profile`
    pub fn with_token(&self, token: &str, profile: FederatedProfile) {
        self.tokens.write().unwrap().insert(token.to_string(), profile);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.read().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify_id_token(&self, id_token: &str) -> Result<FederatedProfile, ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("provider down".to_string()));
        }
        self.tokens
            .read()
            .unwrap()
            .get(id_token)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected("unknown token".to_string()))
    }

    async fn delete_account(&self, uid: &str) -> Result<(), ProviderError> {
        self.deleted.write().unwrap().push(uid.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("delete failed".to_string()));
        }
        Ok(())
    }
}

/// In-memory store whose full writes to one collection always fail
pub struct FailingStore {
    inner: InMemoryDocumentStore,
    fail_puts_to: &'static str,
}

impl FailingStore {
    pub fn new(fail_puts_to: &'static str) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            fail_puts_to,
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        self.inner.insert(collection, fields).await
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> StoreResult<Document> {
        self.inner.insert_with_id(collection, id, fields).await
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        if collection == self.fail_puts_to {
            return Err(ApiError::Upstream("injected write failure".to_string()));
        }
        self.inner.put(collection, id, fields).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(collection, query).await
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        self.inner.merge(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.inner.delete(collection, id).await
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        self.inner.collections().await
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        self.inner.count(collection).await
    }
}

/// In-memory store where a rival registration overwrites every email
/// claim takeover right after it lands
pub struct ContestedClaimStore {
    inner: InMemoryDocumentStore,
    rival: &'static str,
}

impl ContestedClaimStore {
    pub fn new(rival: &'static str) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            rival,
        }
    }
}

#[async_trait]
impl DocumentStore for ContestedClaimStore {
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        self.inner.insert(collection, fields).await
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> StoreResult<Document> {
        self.inner.insert_with_id(collection, id, fields).await
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        let written = self.inner.put(collection, id, fields).await?;
        if collection == EMAIL_INDEX {
            let rival = EmailIndexEntry {
                user_id: self.rival.to_string(),
                claimed_at: timestamp::now(),
            };
            self.inner.put(collection, id, rival.to_fields()?).await?;
        }
        Ok(written)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(collection, query).await
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        self.inner.merge(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.inner.delete(collection, id).await
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        self.inner.collections().await
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        self.inner.count(collection).await
    }
}

pub type TestState<D = InMemoryDocumentStore> = AppState<D, MockIdentityProvider, MockEmailSender>;

/// A running test server and handles on its collaborators
pub struct TestContext<D = InMemoryDocumentStore> {
    pub server: TestServer,
    pub state: Arc<TestState<D>>,
    pub email_sender: MockEmailSender,
    pub provider: MockIdentityProvider,
}

/// Defaults with the cheapest bcrypt cost
pub fn test_config() -> Config {
    let mut config = Config::new(TEST_SECRET);
    config.bcrypt_cost = 4;
    config
}

pub fn create_test_server() -> TestContext {
    create_test_server_with(test_config(), InMemoryDocumentStore::new())
}

pub fn create_test_server_with<D: DocumentStore + 'static>(config: Config, store: D) -> TestContext<D> {
    let email_sender = MockEmailSender::new();
    let provider = MockIdentityProvider::new();

    let state = Arc::new(AppState::new(
        config,
        store,
        provider.clone(),
        email_sender.clone(),
    ));

    let app = routes::create_router(Arc::clone(&state));
    let server = TestServer::new(app).expect("Failed to create test server");

    TestContext {
        server,
        state,
        email_sender,
        provider,
    }
}

/// `Authorization: Bearer <token>` header pair
pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

/// Register through the API; returns (token, user)
pub async fn register(server: &TestServer, email: &str, password: &str) -> (String, Value) {
    let response = server
        .post("/v1/auth/register")
        .json(&json!({ "email": email, "password": password }))
        .await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    (body["token"].as_str().unwrap().to_string(), body["user"].clone())
}

/// Create a user with the given role directly and mint a verified token
pub async fn create_user_with_role<D: DocumentStore + 'static>(
    ctx: &TestContext<D>,
    email: &str,
    role: &str,
) -> (String, String) {
    let user = ctx
        .state
        .directory
        .create(NewUser {
            email: email.to_string(),
            password: Some(PASSWORD.to_string()),
            role: Some(role.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let token = ctx
        .state
        .sessions
        .issue(&user.id, &user.email, user.role, true)
        .unwrap();
    (token, user.id)
}

pub fn profile(uid: &str, email: &str, name: Option<&str>) -> FederatedProfile {
    FederatedProfile {
        uid: uid.to_string(),
        email: email.to_string(),
        display_name: name.map(str::to_string),
        photo_url: Some(format!("https://photos.example.com/{}.png", uid)),
    }
}
