//! Sign-up, sign-in, recovery and identity endpoints

use axum::{
    extract::State,
    response::{sse::Event, Sse},
    Extension, Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use super::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::identity::{self, Identity, SignedIn};
use crate::realtime::poll_stream;
use crate::store::AuthStore;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryExchange {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordUpdate {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
            message: message.into(),
        })
    }
}

/// POST /api/auth/signup
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<Json<SignedIn>> {
    Ok(Json(identity::sign_up(&state, &req.email, &req.password, req.admin).await?))
}

/// POST /api/auth/signin
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<SignedIn>> {
    Ok(Json(identity::sign_in(&state, &req.email, &req.password).await?))
}

/// POST /api/auth/signout
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<StatusResponse>> {
    identity::sign_out(&state, &session.token).await?;
    Ok(StatusResponse::ok("signed out"))
}

/// GET /api/auth/me
///
/// Re-reads the identity so approval granted since sign-in shows up.
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Identity>> {
    let mut guard = session.handle.lock().await;
    Ok(Json(identity::refresh(&state, &mut guard).await?))
}

/// POST /api/auth/password
pub async fn update_password(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<PasswordUpdate>,
) -> ApiResult<Json<StatusResponse>> {
    identity::update_password(&state, &session.user_id, &req.password).await?;
    Ok(StatusResponse::ok("password updated"))
}

/// POST /api/auth/recovery
///
/// The response is identical whether or not the address is registered.
pub async fn request_recovery(
    State(state): State<AppState>,
    Json(req): Json<RecoveryRequest>,
) -> ApiResult<Json<StatusResponse>> {
    identity::request_recovery(&state, &req.email).await?;
    Ok(StatusResponse::ok(
        "if the address is registered, a recovery link has been issued",
    ))
}

/// POST /api/auth/recovery/exchange
pub async fn exchange_recovery(
    State(state): State<AppState>,
    Json(req): Json<RecoveryExchange>,
) -> ApiResult<Json<SignedIn>> {
    Ok(Json(identity::exchange_recovery(&state, &req.token).await?))
}

/// GET /api/auth/approval/stream
///
/// Emits `Identity` whenever the caller's flags change.
pub async fn approval_stream(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let auth = AuthStore::new(state.db.clone());
    let user_id = session.user_id.clone();
    let snapshots = poll_stream(
        state.config.poll_interval,
        &state.events,
        session.user_id,
        move || {
            let auth = auth.clone();
            let user_id = user_id.clone();
            async move {
                auth.find_by_id(&user_id)
                    .await?
                    .map(|record| Identity::from_record(&record))
                    .ok_or_else(|| ApiError::Auth("account no longer exists".to_string()))
            }
        },
    );
    spz_common::sse::json_sse("Identity", snapshots)
}
