//! Authentication endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use comfortway_core::policy::can_access_admin_only;
use comfortway_core::Role;
use serde::{Deserialize, Serialize};

use super::session::{issue_session, optional_session, require_session};
use super::ApiJson;
use crate::credentials::Authenticated;
use crate::directory::NewUser;
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::IdentityProvider;
use crate::state::AppState;
use crate::store::{DocumentStore, Identity, Provider};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    #[serde(default)]
    pub id_token: String,
}

#[derive(Deserialize)]
pub struct EmailLinkRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct CompleteEmailLinkRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub link: String,
}

/// Query string of the emailed sign-in link
#[derive(Deserialize)]
pub struct EmailLinkCallback {
    #[serde(default, rename = "oobCode")]
    pub oob_code: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub user: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub user: Identity,
    pub is_new_user: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLinkResponse {
    pub link_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: Identity,
}

/// Token for a password login. With the email-link second factor enabled
/// the token stays unverified and a sign-in link is sent.
async fn password_session<D, P, E>(
    state: &AppState<D, P, E>,
    user: Identity,
) -> Result<SessionResponse, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    if !state.config.require_email_link_2fa {
        return Ok(SessionResponse {
            token: issue_session(state, &user, true)?,
            user,
            verification_required: None,
            link_id: None,
        });
    }

    let link_id = state.credentials.request_link(&user.email).await?;
    Ok(SessionResponse {
        token: issue_session(state, &user, false)?,
        user,
        verification_required: Some(true),
        link_id: Some(link_id),
    })
}

fn sign_in_response<D, P, E>(
    state: &AppState<D, P, E>,
    authenticated: Authenticated,
) -> Result<SignInResponse, ApiError> {
    let Authenticated {
        identity,
        is_new_user,
    } = authenticated;

    let message = if is_new_user {
        "Account created and signed in"
    } else {
        "Signed in successfully"
    };

    Ok(SignInResponse {
        token: issue_session(state, &identity, true)?,
        user: identity,
        is_new_user,
        message: message.to_string(),
    })
}

/// POST /v1/auth/register
pub async fn register<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    }

    // Only an admin may hand out anything above the default role
    let role = req.role.as_deref().map(str::parse::<Role>).transpose()?;
    if role.is_some_and(|r| r != Role::default()) {
        let claims = optional_session(&state, &headers)?.ok_or(ApiError::Forbidden)?;
        can_access_admin_only(&claims).require()?;
    }

    let user = state
        .directory
        .create(NewUser {
            email: req.email,
            password: Some(req.password),
            display_name: req.name,
            photo_url: req.photo_url,
            role: role.map(|r| r.as_str().to_string()),
            provider: Provider::Manual,
            federated_uid: None,
        })
        .await?;

    let response = password_session(&state, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /v1/auth/login
pub async fn login<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    }

    let user = state
        .credentials
        .verify_password(&req.email, &req.password)
        .await?;
    Ok(Json(password_session(&state, user).await?))
}

/// POST /v1/auth/google
pub async fn google<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    ApiJson(req): ApiJson<GoogleRequest>,
) -> Result<Json<SignInResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    if req.id_token.trim().is_empty() {
        return Err(ApiError::InvalidInput("ID token is required".to_string()));
    }

    let authenticated = state.credentials.verify_federated(req.id_token.trim()).await?;
    Ok(Json(sign_in_response(&state, authenticated)?))
}

/// POST /v1/auth/email-link
pub async fn request_email_link<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    ApiJson(req): ApiJson<EmailLinkRequest>,
) -> Result<Json<EmailLinkResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let link_id = state.credentials.request_link(&req.email).await?;
    Ok(Json(EmailLinkResponse {
        link_id,
        message: "Sign-in link sent".to_string(),
    }))
}

/// POST /v1/auth/email-link/complete
pub async fn complete_email_link<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    ApiJson(req): ApiJson<CompleteEmailLinkRequest>,
) -> Result<Json<SignInResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let authenticated = state.credentials.redeem_link(&req.email, &req.link).await?;
    Ok(Json(sign_in_response(&state, authenticated)?))
}

/// GET /v1/auth/email-link/complete
///
/// Target of the emailed link itself, so following it signs the user in.
pub async fn follow_email_link<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Query(callback): Query<EmailLinkCallback>,
) -> Result<Json<SignInResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let authenticated = state
        .credentials
        .redeem_link(&callback.email, &callback.oob_code)
        .await?;
    Ok(Json(sign_in_response(&state, authenticated)?))
}

/// GET /v1/auth/me
pub async fn me<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    let user = state.directory.get(claims.principal_id()).await?;
    Ok(Json(MeResponse { user }))
}
