use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::export::{ExportArtifact, ExportFormat};

#[derive(Deserialize)]
pub struct MovieExportRequest {
    pub format: ExportFormat,
}

/// POST /workspaces/{id}/export/layers
///
/// Returns 204 with no body when the movie carries no layers; there is
/// no point shipping an empty archive.
pub async fn export_layers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let ws = state
        .shared
        .workspaces
        .get(id)
        .await
        .ok_or_else(|| ApiError::workspace_not_found(id))?;

    let ws = ws.lock().await;
    let artifact = state.shared.export_service.export_layers(&ws)?;

    match artifact {
        Some(artifact) => Ok(download(artifact)),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /workspaces/{id}/export/frames
pub async fn export_frames(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let ws = state
        .shared
        .workspaces
        .get(id)
        .await
        .ok_or_else(|| ApiError::workspace_not_found(id))?;

    // The workspace stays locked for the whole capture, so playback
    // control and concurrent exports queue up behind it.
    let mut ws = ws.lock().await;
    let artifact = state.shared.export_service.export_frames(&mut ws).await?;

    Ok(download(artifact))
}

/// POST /workspaces/{id}/export/movie
pub async fn export_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<MovieExportRequest>,
) -> Result<Response, ApiError> {
    let ws = state
        .shared
        .workspaces
        .get(id)
        .await
        .ok_or_else(|| ApiError::workspace_not_found(id))?;

    let mut ws = ws.lock().await;
    let artifact = state
        .shared
        .export_service
        .export_movie(&mut ws, request.format)
        .await?;

    Ok(download(artifact))
}

fn download(artifact: ExportArtifact) -> Response {
    (
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        Body::from(artifact.bytes),
    )
        .into_response()
}
