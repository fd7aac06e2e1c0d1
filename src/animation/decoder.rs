//! Container decoding for uploaded animation files.
//!
//! Version 1.x files are zip containers holding a `movie.spec` JSON
//! descriptor plus one image per layer key. Version 2.x files are
//! zlib-wrapped protobuf and are reported as unsupported rather than
//! guessed at.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::animation::Movie;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const ZLIB_MAGIC: u8 = 0x78;
const SPEC_ENTRY: &str = "movie.spec";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Not a recognized animation file")]
    NotSvga,

    /// 2.x zlib/protobuf containers.
    #[error("Version 2.x files are not supported, re-export as 1.x")]
    UnsupportedVersion,

    #[error("File exceeds the {limit_mb} MB upload limit")]
    TooLarge { limit_mb: u64 },

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Container has no movie.spec descriptor")]
    MissingSpec,

    #[error("Invalid movie descriptor: {0}")]
    InvalidSpec(String),
}

/// Boundary for container parsing. Kept as a trait so the HTTP layer never
/// depends on a concrete container format.
pub trait MovieDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Movie, DecodeError>;
}

#[derive(Deserialize)]
struct SpecFile {
    movie: SpecMovie,
}

#[derive(Deserialize)]
struct SpecMovie {
    #[serde(rename = "viewBox")]
    view_box: SpecViewBox,
    fps: f64,
    frames: f64,
}

#[derive(Deserialize)]
struct SpecViewBox {
    width: f64,
    height: f64,
}

/// Buffer size to reserve for a zip entry whose header declares
/// `declared` bytes, clamped to the upload limit.
const fn alloc_hint(declared: u64, max_bytes: usize) -> usize {
    if declared > max_bytes as u64 {
        max_bytes
    } else {
        declared as usize
    }
}

/// Decoder for 1.x zip containers.
pub struct ZipContainerDecoder {
    max_bytes: usize,
}

impl ZipContainerDecoder {
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    fn parse_spec(json: &[u8]) -> Result<SpecFile, DecodeError> {
        serde_json::from_slice(json).map_err(|e| DecodeError::InvalidSpec(e.to_string()))
    }

    /// Layer keys are the entry names with any image extension removed.
    fn entry_key(name: &str) -> String {
        name.rsplit_once('.')
            .map_or(name, |(stem, _ext)| stem)
            .to_string()
    }
}

impl MovieDecoder for ZipContainerDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Movie, DecodeError> {
        if bytes.len() > self.max_bytes {
            return Err(DecodeError::TooLarge {
                limit_mb: (self.max_bytes / (1024 * 1024)) as u64,
            });
        }

        if bytes.len() < 4 {
            return Err(DecodeError::NotSvga);
        }

        if bytes[0] == ZLIB_MAGIC && matches!(bytes[1], 0x01 | 0x5E | 0x9C | 0xDA) {
            return Err(DecodeError::UnsupportedVersion);
        }

        if bytes[..4] != ZIP_MAGIC {
            return Err(DecodeError::NotSvga);
        }

        let cursor = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|e| DecodeError::CorruptContainer(e.to_string()))?;

        let mut spec: Option<SpecFile> = None;
        let mut images = BTreeMap::new();

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| DecodeError::CorruptContainer(e.to_string()))?;

            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            // The declared uncompressed size comes straight from the zip
            // header; never trust it for the pre-allocation.
            let mut contents = Vec::with_capacity(alloc_hint(entry.size(), self.max_bytes));
            entry
                .read_to_end(&mut contents)
                .map_err(|e| DecodeError::CorruptContainer(e.to_string()))?;

            if name == SPEC_ENTRY {
                spec = Some(Self::parse_spec(&contents)?);
            } else if image::guess_format(&contents).is_ok() {
                images.insert(Self::entry_key(&name), contents);
            } else {
                // Audio tracks and other non-image payloads are not layers.
                debug!(entry = %name, "Skipping non-image container entry");
            }
        }

        let spec = spec.ok_or(DecodeError::MissingSpec)?;

        let width = spec.movie.view_box.width.round();
        let height = spec.movie.view_box.height.round();
        let fps = spec.movie.fps.round();
        let frames = spec.movie.frames.round();

        if width < 1.0 || height < 1.0 {
            return Err(DecodeError::InvalidSpec(format!(
                "viewBox {width}x{height} is not renderable"
            )));
        }
        if fps < 1.0 {
            return Err(DecodeError::InvalidSpec(format!("fps {fps} out of range")));
        }
        if frames < 1.0 {
            return Err(DecodeError::InvalidSpec(format!(
                "frame count {frames} out of range"
            )));
        }

        debug!(
            width,
            height,
            fps,
            frames,
            image_count = images.len(),
            "Decoded movie container"
        );

        Ok(Movie {
            width: width as u32,
            height: height as u32,
            fps: fps as u32,
            frames: frames as u32,
            images,
        })
    }
}
