//! Collection statistics

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use comfortway_core::policy::can_access_admin_only;
use serde_json::Value;

use super::envelope;
use super::session::require_session;
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::IdentityProvider;
use crate::state::AppState;
use crate::store::DocumentStore;

/// GET /v1/stats
pub async fn get_stats<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_admin_only(&claims).require()?;

    let counts = state.resources.collection_counts().await?;
    Ok(envelope("Stats fetched successfully", counts))
}
