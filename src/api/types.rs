use serde::Serialize;

use crate::animation::FileMetadata;
use crate::workspace::Workspace;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceDto {
    pub id: String,
    pub metadata: FileMetadata,
    pub is_playing: bool,
    pub current_frame: u32,
    pub modified_keys: Vec<String>,
}

impl WorkspaceDto {
    pub fn from_workspace(ws: &Workspace) -> Self {
        let mut modified_keys: Vec<String> = ws.modified_keys.iter().cloned().collect();
        crate::animation::assets::sort_asset_keys(&mut modified_keys);

        Self {
            id: ws.id.to_string(),
            metadata: ws.metadata.clone(),
            is_playing: ws.playback.is_playing(),
            current_frame: ws.playback.current_frame(),
            modified_keys,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssetDto {
    pub key: String,
    pub modified: bool,
}

#[derive(Debug, Serialize)]
pub struct PlaybackDto {
    pub is_playing: bool,
    pub current_frame: u32,
    pub fps: u32,
    pub total_frames: u32,
}
