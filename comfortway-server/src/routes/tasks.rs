//! Task assignment endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use comfortway_core::policy::can_access_role_set;
use comfortway_core::Role;
use serde::Deserialize;
use serde_json::Value;

use super::session::require_session;
use super::{envelope, ApiJson};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::IdentityProvider;
use crate::state::AppState;
use crate::store::DocumentStore;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTaskRequest {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignRequest {
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub user_id: String,
}

/// Assignment routes, mounted under the tasks collection
pub fn router<D, P, E>() -> Router<Arc<AppState<D, P, E>>>
where
    D: DocumentStore + 'static,
    P: IdentityProvider + 'static,
    E: EmailSender + 'static,
{
    Router::new()
        .route("/assignTask", post(assign_task::<D, P, E>))
        .route("/bulkAssignTasks", post(bulk_assign_tasks::<D, P, E>))
}

/// POST /v1/tasks/assignTask
pub async fn assign_task<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<AssignTaskRequest>,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_role_set(&claims, &Role::STAFF).require()?;

    if req.task_id.is_empty() || req.user_id.is_empty() {
        return Err(ApiError::InvalidInput(
            "taskId and userId are required".to_string(),
        ));
    }

    let task = state.resources.assign_task(&req.task_id, &req.user_id).await?;
    Ok(envelope("Task assigned successfully", task))
}

/// POST /v1/tasks/bulkAssignTasks
pub async fn bulk_assign_tasks<D, P, E>(
    State(state): State<Arc<AppState<D, P, E>>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<BulkAssignRequest>,
) -> Result<Json<Value>, ApiError>
where
    D: DocumentStore,
    P: IdentityProvider,
    E: EmailSender + 'static,
{
    let claims = require_session(&state, &headers)?;
    can_access_role_set(&claims, &Role::STAFF).require()?;

    if req.task_ids.is_empty() || req.user_id.is_empty() {
        return Err(ApiError::InvalidInput(
            "taskIds and userId are required".to_string(),
        ));
    }

    let outcome = state
        .resources
        .bulk_assign(&req.task_ids, &req.user_id)
        .await;
    Ok(envelope("Tasks bulk assigned successfully", outcome))
}
