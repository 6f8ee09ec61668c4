//! User administration endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use comfortway_core::policy::{can_access_admin_only, can_access_own_or_admin};
use comfortway_core::Role;
use serde::{Deserialize, Serialize};

use super::session::require_session;
use super::ApiJson;
use crate::directory::{NewUser, UserUpdate};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::IdentityProvider;
use crate::state::AppState;
use crate::store::{DocumentStore, Identity, Provider};

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    #[serde(alias = "name")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /v1/auth/users
pub async fn list_users<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<Identity>>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_admin_only(&claims).require()?;

    let role = query
        .role
        .as_deref()
        .filter(|r| !r.is_empty())
        .map(str::parse::<Role>)
        .transpose()?;
    Ok(Json(state.directory.list(role).await?))
}

/// POST /v1/auth/users
pub async fn create_user<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Identity>), ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_admin_only(&claims).require()?;

    let user = state
        .directory
        .create(NewUser {
            email: req.email,
            password: req.password,
            display_name: req.display_name,
            photo_url: req.photo_url,
            role: req.role,
            provider: Provider::Manual,
            federated_uid: None,
        })
        .await?;

    tracing::info!(admin_id = %claims.principal_id(), user_id = %user.id, "User created by admin");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /v1/auth/users/:id
pub async fn get_user<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Identity>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_own_or_admin(&claims, &id).require()?;

    Ok(Json(state.directory.get(&id).await?))
}

/// PUT /v1/auth/users/:id
pub async fn update_user<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<Identity>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_own_or_admin(&claims, &id).require()?;
    if update.changes_role() {
        can_access_admin_only(&claims).require()?;
    }

    Ok(Json(state.directory.update(&id, update).await?))
}

/// DELETE /v1/auth/users/:id
pub async fn delete_user<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_admin_only(&claims).require()?;

    state.directory.delete(&id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
