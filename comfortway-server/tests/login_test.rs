//! Tests for password login and the email-link second factor

mod common;

use common::*;
use comfortway_server::directory::NewUser;
use comfortway_server::store::Provider;
use serde_json::{json, Value};

async fn login(ctx: &TestContext, email: &str, password: &str) -> axum_test::TestResponse {
    ctx.server
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .await
}

/// Test: the registered password logs in and stamps lastLogin
#[tokio::test]
async fn test_login_with_correct_password() {
    let ctx = create_test_server();
    register(&ctx.server, "asha@example.com", PASSWORD).await;

    let response = login(&ctx, "Asha@Example.com", PASSWORD).await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["user"]["email"], "asha@example.com");
    assert!(body["user"]["lastLogin"].is_string());
    assert!(body["token"].is_string());
    assert!(body.get("verificationRequired").is_none());
}

/// Test: any other password fails with InvalidCredentials
#[tokio::test]
async fn test_login_with_wrong_password() {
    let ctx = create_test_server();
    register(&ctx.server, "asha@example.com", PASSWORD).await;

    let response = login(&ctx, "asha@example.com", "not-the-password").await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid credentials");
}

/// Test: unknown emails are NotFound
#[tokio::test]
async fn test_login_unknown_email() {
    let ctx = create_test_server();

    let response = login(&ctx, "nobody@example.com", PASSWORD).await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["error"], "User not found");
}

/// Test: accounts without a password cannot use password login
#[tokio::test]
async fn test_login_federated_only_account() {
    let ctx = create_test_server();
    ctx.state
        .directory
        .create(NewUser {
            email: "g@example.com".to_string(),
            provider: Provider::Google,
            federated_uid: Some("g-1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let response = login(&ctx, "g@example.com", PASSWORD).await;

    assert_eq!(response.status_code(), 401);
}

/// Test: with the second factor on, login yields an unverified token
/// that only becomes usable once the emailed link is redeemed
#[tokio::test]
async fn test_second_factor_flow() {
    let mut config = test_config();
    config.require_email_link_2fa = true;
    let ctx = create_test_server_with(config, comfortway_server::InMemoryDocumentStore::new());

    ctx.state
        .directory
        .create(NewUser {
            email: "asha@example.com".to_string(),
            password: Some(PASSWORD.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/v1/auth/login")
        .json(&json!({ "email": "asha@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["verificationRequired"], true);
    assert!(body["linkId"].is_string());
    let pending_token = body["token"].as_str().unwrap().to_string();

    // The unverified token is refused
    let (name, value) = bearer(&pending_token);
    let response = ctx.server.get("/v1/auth/me").add_header(name, value).await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"], "Verification required");

    // Redeeming the link gives a verified token
    let link = ctx.email_sender.get_link("asha@example.com").expect("No link sent");
    let response = ctx
        .server
        .post("/v1/auth/email-link/complete")
        .json(&json!({ "email": "asha@example.com", "link": link }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["isNewUser"], false);

    let (name, value) = bearer(body["token"].as_str().unwrap());
    let response = ctx.server.get("/v1/auth/me").add_header(name, value).await;
    assert_eq!(response.status_code(), 200);
}
