//! Frame rendering.
//!
//! The renderer sits behind a trait so the export pipeline does not care
//! how pixels are produced. The built-in implementation composites layer
//! images over a transparent canvas; it does not apply per-frame sprite
//! transforms.

use std::collections::{HashMap, HashSet};

use image::RgbaImage;
use image::imageops::overlay;
use thiserror::Error;
use tracing::warn;

use crate::animation::Movie;
use crate::animation::assets::sort_asset_keys;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Frame {frame} is out of range (movie has {total} frames)")]
    FrameOutOfRange { frame: u32, total: u32 },

    #[error("Movie has a degenerate {width}x{height} canvas")]
    EmptyCanvas { width: u32, height: u32 },
}

pub trait FrameRenderer: Send + Sync {
    /// Renders one frame to RGBA pixels. `overrides` maps asset keys to
    /// replacement image bytes and wins over the movie's own images.
    fn render(
        &self,
        movie: &Movie,
        overrides: &HashMap<String, Vec<u8>>,
        frame: u32,
    ) -> Result<RgbaImage, RenderError>;
}

/// Stacks layer images in asset-key order onto the movie canvas.
/// Entries that do not decode as images are skipped with a warning.
#[derive(Debug, Default)]
pub struct LayerCompositor;

impl FrameRenderer for LayerCompositor {
    fn render(
        &self,
        movie: &Movie,
        overrides: &HashMap<String, Vec<u8>>,
        frame: u32,
    ) -> Result<RgbaImage, RenderError> {
        if frame >= movie.frames {
            return Err(RenderError::FrameOutOfRange {
                frame,
                total: movie.frames,
            });
        }
        if movie.width == 0 || movie.height == 0 {
            return Err(RenderError::EmptyCanvas {
                width: movie.width,
                height: movie.height,
            });
        }

        let mut canvas = RgbaImage::new(movie.width, movie.height);

        let mut keys: Vec<String> = movie
            .images
            .keys()
            .cloned()
            .chain(overrides.keys().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        sort_asset_keys(&mut keys);

        for key in keys {
            let bytes = overrides
                .get(&key)
                .or_else(|| movie.images.get(&key));
            let Some(bytes) = bytes else { continue };

            match image::load_from_memory(bytes) {
                Ok(layer) => overlay(&mut canvas, &layer.to_rgba8(), 0, 0),
                Err(e) => warn!(key = %key, error = %e, "Skipping undecodable layer"),
            }
        }

        Ok(canvas)
    }
}
