//! Bearer-token middleware for spz-planner
//!
//! Three tiers, applied as route layers:
//! - [`require_session`]: a valid token; inserts [`CurrentSession`]
//! - [`require_approved`]: the session's identity is approved
//! - [`require_admin`]: the session's identity is an admin
//!
//! The approval and admin checks re-read the identity from storage when the
//! cached flag would deny access, so an approval granted mid-session is
//! picked up on the next request.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::identity::{self, SessionHandle};
use crate::AppState;

/// The authenticated session behind the current request
#[derive(Clone)]
pub struct CurrentSession {
    pub token: String,
    pub user_id: String,
    pub handle: SessionHandle,
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn current(request: &Request) -> ApiResult<CurrentSession> {
    request
        .extensions()
        .get::<CurrentSession>()
        .cloned()
        .ok_or_else(|| ApiError::Auth("sign-in required".to_string()))
}

pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Auth("sign-in required".to_string()))?
        .to_string();

    let handle = identity::resume(&state, &token)
        .await?
        .ok_or_else(|| ApiError::Auth("session expired or unknown".to_string()))?;
    let user_id = handle.lock().await.identity().user_id.clone();

    request.extensions_mut().insert(CurrentSession {
        token,
        user_id,
        handle,
    });
    Ok(next.run(request).await)
}

pub async fn require_approved(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = current(&request)?;
    let approved = {
        let mut guard = session.handle.lock().await;
        if guard.identity().is_approved {
            true
        } else {
            identity::refresh(&state, &mut guard).await?.is_approved
        }
    };

    if !approved {
        debug!(user_id = %session.user_id, "Rejected request from unapproved account");
        return Err(ApiError::Forbidden("account is awaiting approval".to_string()));
    }
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = current(&request)?;
    let is_admin = {
        let mut guard = session.handle.lock().await;
        identity::refresh(&state, &mut guard).await?.is_admin
    };

    if !is_admin {
        return Err(ApiError::Forbidden("administrator access required".to_string()));
    }
    Ok(next.run(request).await)
}
