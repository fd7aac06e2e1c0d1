use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::get_session_user;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::models::{StatusPatch, UserRecord};
use crate::services::LogPage;

#[derive(Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

const fn default_page() -> u64 {
    1
}

const fn default_page_size() -> u64 {
    25
}

#[derive(Deserialize)]
pub struct RegistrationToggle {
    pub is_open: bool,
}

#[derive(Serialize)]
pub struct RegistrationState {
    pub is_open: bool,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserRecord>>>, ApiError> {
    let users = state.shared.admin_service.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

/// PATCH /admin/users/{id}/status
///
/// Accepts any subset of `is_approved` and `status`; the console's
/// approve/ban/unban buttons are all shapes of this request.
pub async fn set_user_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(patch): Json<StatusPatch>,
) -> Result<Json<ApiResponse<UserRecord>>, ApiError> {
    let user = state.shared.admin_service.set_user_status(id, patch).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /admin/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let actor = get_session_user(&session).await?;

    state.shared.admin_service.delete_user(actor.id, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User deleted".to_string(),
    })))
}

/// GET /admin/registration
pub async fn get_registration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RegistrationState>>, ApiError> {
    let is_open = state.shared.admin_service.registration_open().await?;
    Ok(Json(ApiResponse::success(RegistrationState { is_open })))
}

/// PUT /admin/registration
pub async fn set_registration(
    State(state): State<Arc<AppState>>,
    Json(toggle): Json<RegistrationToggle>,
) -> Result<Json<ApiResponse<RegistrationState>>, ApiError> {
    state
        .shared
        .admin_service
        .set_registration_open(toggle.is_open)
        .await?;

    Ok(Json(ApiResponse::success(RegistrationState {
        is_open: toggle.is_open,
    })))
}

/// GET /admin/logs
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ApiResponse<LogPage>>, ApiError> {
    let page = state
        .shared
        .admin_service
        .list_logs(query.page, query.page_size)
        .await?;

    Ok(Json(ApiResponse::success(page)))
}
