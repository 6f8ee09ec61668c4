//! HTTP routes

mod auth;
mod resources;
mod session;
mod stats;
mod tasks;
mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::email::EmailSender;
use crate::error::ApiError;
use crate::provider::IdentityProvider;
use crate::resources::{ResourceSpec, RESOURCES, TASKS};
use crate::state::AppState;
use crate::store::{DocumentStore, Fields};

pub use session::{bearer_token, issue_session, optional_session, require_session};

/// Create the router with all routes
pub fn create_router<D, P, E>(state: Arc<AppState<D, P, E>>) -> Router
where
    D: DocumentStore + 'static,
    P: IdentityProvider + 'static,
    E: EmailSender + 'static,
{
    let cors = cors_layer(&state.config.cors_origins);

    let mut router = Router::new()
        .route("/", get(welcome))
        .nest("/v1/auth", auth_router())
        .route("/v1/stats", get(stats::get_stats::<D, P, E>));

    for spec in RESOURCES {
        let mut resource = resource_router::<D, P, E>(spec);
        if spec.collection == TASKS.collection {
            resource = resource.merge(tasks::router::<D, P, E>());
        }
        router = router.nest(spec.mount, resource);
    }

    router
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn auth_router<D, P, E>() -> Router<Arc<AppState<D, P, E>>>
where
    D: DocumentStore + 'static,
    P: IdentityProvider + 'static,
    E: EmailSender + 'static,
{
    Router::new()
        .route("/register", post(auth::register::<D, P, E>))
        .route("/login", post(auth::login::<D, P, E>))
        .route("/google", post(auth::google::<D, P, E>))
        .route("/email-link", post(auth::request_email_link::<D, P, E>))
        .route(
            "/email-link/complete",
            get(auth::follow_email_link::<D, P, E>).post(auth::complete_email_link::<D, P, E>),
        )
        .route("/me", get(auth::me::<D, P, E>))
        .route(
            "/users",
            get(users::list_users::<D, P, E>).post(users::create_user::<D, P, E>),
        )
        .route(
            "/users/:id",
            get(users::get_user::<D, P, E>)
                .put(users::update_user::<D, P, E>)
                .delete(users::delete_user::<D, P, E>),
        )
}

/// CRUD routes for one collection, relative to its mount point
fn resource_router<D, P, E>(spec: &'static ResourceSpec) -> Router<Arc<AppState<D, P, E>>>
where
    D: DocumentStore + 'static,
    P: IdentityProvider + 'static,
    E: EmailSender + 'static,
{
    let names = &spec.routes;
    let mut router = Router::new()
        .route(&format!("/{}", names.create), post(resources::create::<D, P, E>))
        .route(&format!("/{}", names.list), get(resources::list::<D, P, E>))
        .route(&format!("/{}/:id", names.get), get(resources::get_one::<D, P, E>))
        .route(&format!("/{}/:id", names.update), put(resources::update::<D, P, E>))
        .route(&format!("/{}/:id", names.delete), delete(resources::remove::<D, P, E>));

    if let Some(lookup) = &spec.lookup {
        router = router.route(
            &format!("/{}/:value", lookup.route),
            get(resources::list_by::<D, P, E>),
        );
    }

    router.layer(Extension(spec))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            HeaderName::from_static("content-range"),
            HeaderName::from_static("x-content-range"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}

async fn welcome() -> &'static str {
    "Welcome to the comfort way"
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route".to_string())
}

/// JSON body extractor whose rejections use the API error envelope
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Success envelope used by resource routes
pub fn envelope<T: Serialize>(message: impl Into<String>, data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message.into(),
        "data": data,
    }))
}

/// Require a JSON object body
pub fn into_fields(body: Value) -> Result<Fields, ApiError> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::InvalidInput(
            "Request body must be a JSON object".to_string(),
        )),
    }
}
