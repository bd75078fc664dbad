//! Admin dashboard endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use super::auth::CurrentSession;
use crate::admin::{self, GrowthPoint, UserInspection, UserSummary};
use crate::error::ApiResult;
use crate::store::{AdminStore, DeletionReport};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub user_id: String,
    pub is_approved: bool,
}

fn admin_store(state: &AppState) -> AdminStore {
    AdminStore::new(state.db.clone())
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(admin::list_users(&admin_store(&state)).await?))
}

/// GET /api/admin/users/:user_id
pub async fn inspect_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserInspection>> {
    Ok(Json(admin::inspect(&admin_store(&state), &user_id).await?))
}

/// POST /api/admin/users/:user_id/approve
pub async fn approve_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ApproveResponse>> {
    admin::approve(&admin_store(&state), &state.events, &user_id).await?;
    Ok(Json(ApproveResponse {
        user_id,
        is_approved: true,
    }))
}

/// DELETE /api/admin/users/:user_id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<DeletionReport>> {
    let report = admin::delete_user(&admin_store(&state), &state.sessions, &session.user_id, &user_id).await?;
    Ok(Json(report))
}

/// GET /api/admin/growth
pub async fn growth(State(state): State<AppState>) -> ApiResult<Json<Vec<GrowthPoint>>> {
    Ok(Json(admin::growth(&admin_store(&state)).await?))
}
