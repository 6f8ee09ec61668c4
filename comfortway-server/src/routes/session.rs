//! Bearer session handling

use axum::http::{header, HeaderMap};
use comfortway_core::SessionClaims;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Identity;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::NotAuthenticated)?
        .to_str()
        .map_err(|_| ApiError::NotAuthenticated)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(ApiError::NotAuthenticated)?
        .trim();
    if token.is_empty() {
        return Err(ApiError::NotAuthenticated);
    }
    Ok(token)
}

/// Verified session claims for the request, or fail
pub fn require_session<D, P, E>(
    state: &AppState<D, P, E>,
    headers: &HeaderMap,
) -> Result<SessionClaims, ApiError> {
    let token = bearer_token(headers)?;
    Ok(state.sessions.verify(token)?)
}

/// Like [`require_session`], but a missing header is not an error
pub fn optional_session<D, P, E>(
    state: &AppState<D, P, E>,
    headers: &HeaderMap,
) -> Result<Option<SessionClaims>, ApiError> {
    if !headers.contains_key(header::AUTHORIZATION) {
        return Ok(None);
    }
    require_session(state, headers).map(Some)
}

/// Mint a session token for an identity
pub fn issue_session<D, P, E>(
    state: &AppState<D, P, E>,
    identity: &Identity,
    verified: bool,
) -> Result<String, ApiError> {
    Ok(state
        .sessions
        .issue(&identity.id, &identity.email, identity.role, verified)?)
}
