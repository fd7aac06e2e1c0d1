use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use super::auth::get_session_user;
use super::{ApiError, ApiResponse, AppState, AssetDto, MessageResponse, PlaybackDto, WorkspaceDto};
use crate::animation::EncodedImage;
use crate::domain::events::NotificationEvent;
use crate::workspace::Workspace;

#[derive(Deserialize)]
pub struct UploadQuery {
    /// Original file name, carried as a query parameter because the body
    /// is the raw file.
    pub name: String,
}

#[derive(Deserialize)]
pub struct SeekRequest {
    pub frame: u32,
}

#[derive(Serialize)]
pub struct AssetImageDto {
    pub key: String,
    pub modified: bool,
    pub data_uri: String,
}

#[derive(Deserialize)]
pub struct ReplaceAssetRequest {
    pub data_uri: String,
}

/// POST /workspaces?name=<file.svga>
///
/// Body is the raw uploaded file. On success the parsed movie becomes a
/// live workspace and the load is announced on the event bus.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    session: Session,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<WorkspaceDto>>), ApiError> {
    let user = get_session_user(&session).await?;

    let file_name = query.name.trim().to_string();
    if file_name.is_empty() {
        return Err(ApiError::validation("File name is required"));
    }
    if body.is_empty() {
        return Err(ApiError::validation("File body is empty"));
    }

    let file_size = body.len() as i64;
    let movie = state.shared.decoder.decode(&body)?;

    let workspace = Workspace::new(file_name.clone(), file_size, movie);
    let dto = WorkspaceDto::from_workspace(&workspace);
    let dimensions = workspace.movie.dimensions();
    let frames = workspace.movie.frames;

    state.shared.workspaces.insert(workspace).await;

    info!(
        file_name = %file_name,
        file_size,
        dimensions = %dimensions,
        frames,
        "File loaded into workspace"
    );
    let _ = state.shared.event_bus.send(NotificationEvent::FileProcessed {
        file_name,
        user_email: user.email,
        user_name: user.name,
        file_size,
        dimensions,
        frames: frames as i32,
    });

    Ok((StatusCode::CREATED, Json(ApiResponse::success(dto))))
}

/// GET /workspaces/{id}
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkspaceDto>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let ws = ws.lock().await;
    Ok(Json(ApiResponse::success(WorkspaceDto::from_workspace(
        &ws,
    ))))
}

/// DELETE /workspaces/{id}
///
/// Closing a workspace discards every edit made in it.
pub async fn close_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if !state.shared.workspaces.remove(id).await {
        return Err(ApiError::workspace_not_found(id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Workspace closed".to_string(),
    })))
}

// ============================================================================
// Playback
// ============================================================================

/// GET /workspaces/{id}/playback
pub async fn get_playback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PlaybackDto>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let ws = ws.lock().await;
    Ok(Json(ApiResponse::success(playback_dto(&ws))))
}

/// POST /workspaces/{id}/playback/play
pub async fn play(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PlaybackDto>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let mut ws = ws.lock().await;
    ws.playback.play();
    Ok(Json(ApiResponse::success(playback_dto(&ws))))
}

/// POST /workspaces/{id}/playback/pause
pub async fn pause(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PlaybackDto>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let mut ws = ws.lock().await;
    ws.playback.pause();
    Ok(Json(ApiResponse::success(playback_dto(&ws))))
}

/// POST /workspaces/{id}/playback/seek
pub async fn seek(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SeekRequest>,
) -> Result<Json<ApiResponse<PlaybackDto>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let mut ws = ws.lock().await;
    ws.playback.seek(request.frame);
    Ok(Json(ApiResponse::success(playback_dto(&ws))))
}

// ============================================================================
// Assets
// ============================================================================

/// GET /workspaces/{id}/assets
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<AssetDto>>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let ws = ws.lock().await;

    let assets = ws
        .asset_keys()
        .into_iter()
        .map(|key| AssetDto {
            modified: ws.modified_keys.contains(&key),
            key,
        })
        .collect();

    Ok(Json(ApiResponse::success(assets)))
}

/// GET /workspaces/{id}/assets/{key}
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<AssetImageDto>>, ApiError> {
    let ws = lookup(&state, id).await?;
    let ws = ws.lock().await;

    let bytes = ws
        .asset_bytes(&key)
        .ok_or_else(|| ApiError::NotFound(format!("Asset '{key}' not found")))?;

    let image = EncodedImage::sniff(bytes.to_vec())
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    Ok(Json(ApiResponse::success(AssetImageDto {
        modified: ws.modified_keys.contains(&key),
        data_uri: image.to_data_uri(),
        key,
    })))
}

/// PUT /workspaces/{id}/assets/{key}
///
/// Replaces a layer image with the decoded payload of a data URI. Keys
/// not present in the movie are rejected; replacement never adds layers.
pub async fn replace_asset(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(Uuid, String)>,
    Json(request): Json<ReplaceAssetRequest>,
) -> Result<Json<ApiResponse<AssetDto>>, ApiError> {
    let image = EncodedImage::from_data_uri(&request.data_uri)
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let ws = lookup(&state, id).await?;
    let mut ws = ws.lock().await;

    if !ws.replace_asset(&key, image.bytes) {
        return Err(ApiError::NotFound(format!("Asset '{key}' not found")));
    }

    info!(workspace = %id, key = %key, "Layer image replaced");

    Ok(Json(ApiResponse::success(AssetDto {
        modified: true,
        key,
    })))
}

// ============================================================================
// Frame stream
// ============================================================================

/// GET /workspaces/{id}/frames
///
/// SSE stream of the playback clock, sampled at the movie's frame rate.
/// Dropping the connection is the unsubscribe; nothing persists server
/// side once the stream ends.
pub async fn frame_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let ws = lookup(&state, id).await?;

    let fps = {
        let ws = ws.lock().await;
        ws.playback.fps()
    };
    // A zero period panics; movies faster than 1000 fps are sampled
    // every millisecond instead.
    let period_ms = (1000 / u64::from(fps.max(1))).max(1);
    let interval = tokio::time::interval(Duration::from_millis(period_ms));

    let stream = stream::unfold((ws, interval), |(ws, mut interval)| async move {
        interval.tick().await;

        let dto = {
            let ws = ws.lock().await;
            playback_dto(&ws)
        };
        let json = serde_json::to_string(&dto).unwrap_or_default();

        Some((Ok(Event::default().data(json)), (ws, interval)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

// ============================================================================
// Helpers
// ============================================================================

async fn lookup(
    state: &Arc<AppState>,
    id: Uuid,
) -> Result<Arc<tokio::sync::Mutex<Workspace>>, ApiError> {
    state
        .shared
        .workspaces
        .get(id)
        .await
        .ok_or_else(|| ApiError::workspace_not_found(id))
}

fn playback_dto(ws: &Workspace) -> PlaybackDto {
    PlaybackDto {
        is_playing: ws.playback.is_playing(),
        current_frame: ws.playback.current_frame(),
        fps: ws.playback.fps(),
        total_frames: ws.playback.total_frames(),
    }
}
