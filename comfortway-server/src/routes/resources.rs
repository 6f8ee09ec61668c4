//! Generic CRUD endpoints for business collections

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use comfortway_core::policy::{can_access_admin_only, can_access_own_or_admin, can_access_role_set};
use serde_json::{json, Value};

use super::session::require_session;
use super::{envelope, into_fields, ApiJson};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::IdentityProvider;
use crate::resources::ResourceSpec;
use crate::state::AppState;
use crate::store::DocumentStore;

type Spec = Extension<&'static ResourceSpec>;

/// POST {mount}/{create}
pub async fn create<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Extension(spec): Spec,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_role_set(&claims, spec.writers).require()?;

    let doc = state.resources.create(spec, into_fields(body)?).await?;
    Ok((
        StatusCode::CREATED,
        envelope(format!("{} created successfully", spec.label), doc),
    ))
}

/// GET {mount}/{list}
pub async fn list<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Extension(spec): Spec,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    require_session(&state, &headers)?;

    let docs = state.resources.list(spec).await?;
    Ok(envelope(format!("{} fetched successfully", spec.plural), docs))
}

/// GET {mount}/{get}/:id
pub async fn get_one<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Extension(spec): Spec,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    require_session(&state, &headers)?;

    let doc = state.resources.get(spec, &id).await?;
    Ok(envelope(format!("{} fetched successfully", spec.label), doc))
}

/// GET {mount}/{lookup}/:value
pub async fn list_by<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Extension(spec): Spec,
    headers: HeaderMap,
    Path(value): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    let lookup = spec
        .lookup
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Route".to_string()))?;
    if lookup.owner {
        can_access_own_or_admin(&claims, &value).require()?;
    }

    let docs = state.resources.list_by(spec, lookup.field, &value).await?;
    Ok(envelope(format!("{} fetched successfully", spec.plural), docs))
}

/// PUT {mount}/{update}/:id
pub async fn update<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Extension(spec): Spec,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_role_set(&claims, spec.writers).require()?;

    let doc = state.resources.update(spec, &id, into_fields(body)?).await?;
    Ok(envelope(format!("{} updated successfully", spec.label), doc))
}

/// DELETE {mount}/{delete}/:id
pub async fn remove<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    Extension(spec): Spec,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_admin_only(&claims).require()?;

    state.resources.delete(spec, &id).await?;
    Ok(envelope(
        format!("{} deleted successfully", spec.label),
        json!({ "id": id }),
    ))
}
