//! In-memory workspaces, one per loaded file.
//!
//! A workspace owns the parsed movie, its playback clock, and any layer
//! replacements made in the editor. Workspaces live only as long as the
//! process; closing one discards all edits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::animation::{FileMetadata, Movie, PlaybackState};
use crate::animation::assets::sort_asset_keys;

#[derive(Debug)]
pub struct Workspace {
    pub id: Uuid,
    pub metadata: FileMetadata,
    pub movie: Movie,
    pub playback: PlaybackState,
    /// Replacement layer bytes, keyed by asset key.
    pub overrides: HashMap<String, Vec<u8>>,
    /// Keys touched by the editor; the layer dump exports exactly these.
    pub modified_keys: HashSet<String>,
}

impl Workspace {
    #[must_use]
    pub fn new(file_name: String, file_size: i64, movie: Movie) -> Self {
        let metadata = FileMetadata {
            file_name,
            file_size,
            width: movie.width,
            height: movie.height,
            fps: movie.fps,
            frames: movie.frames,
        };
        let playback = PlaybackState::new(movie.fps, movie.frames);

        Self {
            id: Uuid::new_v4(),
            metadata,
            movie,
            playback,
            overrides: HashMap::new(),
            modified_keys: HashSet::new(),
        }
    }

    /// The uploaded file name without its extension, used as the stem for
    /// every exported archive name.
    #[must_use]
    pub fn base_name(&self) -> &str {
        self.metadata
            .file_name
            .rsplit_once('.')
            .map_or(self.metadata.file_name.as_str(), |(stem, _)| stem)
    }

    /// Asset keys in display order.
    #[must_use]
    pub fn asset_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.movie.images.keys().cloned().collect();
        sort_asset_keys(&mut keys);
        keys
    }

    /// Current bytes for a key: the replacement if one was made, otherwise
    /// the movie's own image.
    #[must_use]
    pub fn asset_bytes(&self, key: &str) -> Option<&[u8]> {
        self.overrides
            .get(key)
            .or_else(|| self.movie.images.get(key))
            .map(Vec::as_slice)
    }

    /// Replaces a layer image. Returns false if the key does not exist in
    /// the movie; replacements never invent new layers.
    pub fn replace_asset(&mut self, key: &str, bytes: Vec<u8>) -> bool {
        if !self.movie.images.contains_key(key) {
            return false;
        }
        self.overrides.insert(key.to_string(), bytes);
        self.modified_keys.insert(key.to_string());
        true
    }
}

/// Registry of live workspaces. Each workspace sits behind its own mutex,
/// so playback control and export never block unrelated workspaces.
#[derive(Clone, Default)]
pub struct WorkspaceRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Workspace>>>>>,
}

impl WorkspaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, workspace: Workspace) -> Uuid {
        let id = workspace.id;
        self.inner
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(workspace)));
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Workspace>>> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}
