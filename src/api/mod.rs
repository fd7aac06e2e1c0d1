use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::state::SharedState;

mod admin;
mod assets;
pub mod auth;
mod error;
pub mod events;
mod export;
mod observability;
mod system;
mod types;
mod workspace;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies, session_minutes, max_upload_bytes) = {
        let config = state.shared.config.read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.auth.session_minutes,
            config.max_upload_bytes(),
        )
    };

    let protected_routes = create_protected_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session_minutes,
        )));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/login", post(auth::login))
        .route("/auth/signup", post(auth::signup))
        .layer(session_layer)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .fallback(assets::serve_asset)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}/status", patch(admin::set_user_status))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/registration", get(admin::get_registration))
        .route("/admin/registration", put(admin::set_registration))
        .route("/admin/logs", get(admin::list_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::get_current_user))
        .route("/workspaces", post(workspace::upload))
        .route("/workspaces/{id}", get(workspace::get_workspace))
        .route("/workspaces/{id}", delete(workspace::close_workspace))
        .route("/workspaces/{id}/playback", get(workspace::get_playback))
        .route("/workspaces/{id}/playback/play", post(workspace::play))
        .route("/workspaces/{id}/playback/pause", post(workspace::pause))
        .route("/workspaces/{id}/playback/seek", post(workspace::seek))
        .route("/workspaces/{id}/assets", get(workspace::list_assets))
        .route("/workspaces/{id}/assets/{key}", get(workspace::get_asset))
        .route(
            "/workspaces/{id}/assets/{key}",
            put(workspace::replace_asset),
        )
        .route("/workspaces/{id}/frames", get(workspace::frame_stream))
        .route(
            "/workspaces/{id}/export/layers",
            post(export::export_layers),
        )
        .route(
            "/workspaces/{id}/export/frames",
            post(export::export_frames),
        )
        .route("/workspaces/{id}/export/movie", post(export::export_movie))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .merge(events::router())
        .merge(admin_routes)
        .route_layer(middleware::from_fn(auth::auth_middleware))
}
