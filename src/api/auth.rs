use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::models::{Role, UserRecord};

const SESSION_USER_KEY: &str = "user";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub user: UserRecord,
    pub requires_approval: bool,
    pub message: String,
}

/// What lives in the session cookie. Role is re-checked against the
/// directory on every admin request, never trusted from here alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&UserRecord> for SessionUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires a logged-in session.
pub async fn auth_middleware(
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if let Ok(Some(user)) = session.get::<SessionUser>(SESSION_USER_KEY).await {
        tracing::Span::current().record("user_id", user.id);
        return Ok(next.run(request).await);
    }

    let response = (StatusCode::UNAUTHORIZED, "Unauthorized");
    Ok(response.into_response())
}

/// Requires an admin. The role is re-read from the directory so a demotion
/// or ban takes effect mid-session.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let session_user = get_session_user(&session).await?;

    let user = state
        .shared
        .auth_service
        .current_user(session_user.id)
        .await?;

    if user.role != Role::Admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserRecord>>, ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .shared
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;

    session
        .insert(SESSION_USER_KEY, SessionUser::from(&user))
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(Json(ApiResponse::success(user)))
}

/// POST /auth/signup
///
/// Accounts created under the approval gate get no session; the response
/// tells the client to show the pending-approval notice instead.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SignupResponse>>), ApiError> {
    let outcome = state
        .shared
        .auth_service
        .signup(&payload.name, &payload.email, &payload.password)
        .await?;

    let message = if outcome.requires_approval {
        "Registration successful! Your account is pending admin approval.".to_string()
    } else {
        session
            .insert(SESSION_USER_KEY, SessionUser::from(&outcome.user))
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
        "Account created".to_string()
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SignupResponse {
            requires_approval: outcome.requires_approval,
            user: outcome.user,
            message,
        })),
    ))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to end session: {e}")))?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    })))
}

/// GET /auth/me
///
/// Re-applies the account gates, so a banned or un-approved user loses
/// access on their next request rather than at next login.
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<UserRecord>>, ApiError> {
    let session_user = get_session_user(&session).await?;

    let user = match state
        .shared
        .auth_service
        .current_user(session_user.id)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            // Dead accounts drop their session immediately.
            let _ = session.flush().await;
            return Err(err.into());
        }
    };

    Ok(Json(ApiResponse::success(user)))
}

// ============================================================================
// Helpers
// ============================================================================

pub async fn get_session_user(session: &Session) -> Result<SessionUser, ApiError> {
    session
        .get::<SessionUser>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
}
