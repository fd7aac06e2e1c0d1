//! Animation domain: parsed movies, playback state, and frame rendering.

pub mod assets;
pub mod decoder;
pub mod host;
pub mod renderer;

pub use assets::EncodedImage;
pub use decoder::{DecodeError, MovieDecoder, ZipContainerDecoder};
pub use host::PlaybackState;
pub use renderer::{FrameRenderer, LayerCompositor, RenderError};

use std::collections::BTreeMap;

use serde::Serialize;

/// A parsed animation movie. Image bytes are kept as stored in the
/// container; decoding to pixels happens at render time.
#[derive(Debug, Clone)]
pub struct Movie {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: u32,
    /// Layer images keyed by asset key. `BTreeMap` keeps listing stable.
    pub images: BTreeMap<String, Vec<u8>>,
}

impl Movie {
    /// Dimensions in the `WxH` form shown in the console's log feed.
    #[must_use]
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Metadata captured at upload time and surfaced in the info panel.
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: i64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: u32,
}
