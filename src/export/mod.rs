//! Export pipeline: layer dumps, frame captures, and animated re-exports.
//!
//! Everything is produced in memory as a finished artifact; nothing is
//! written to disk. Progress is reported over the event bus so the UI can
//! show the export overlay.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::animation::renderer::{FrameRenderer, RenderError};
use crate::domain::events::NotificationEvent;
use crate::workspace::Workspace;

/// Formats offered by the export dialog. Only GIF has a real encoder;
/// the rest deliver the captured frames as a zip instead of pretending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Gif,
    Webp,
    Apng,
    Vap,
}

impl ExportFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Apng => "apng",
            Self::Vap => "vap",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to encode frame: {0}")]
    Encode(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// A finished export, ready to stream as a download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub entries: usize,
}

pub struct ExportService {
    renderer: Arc<dyn FrameRenderer>,
    event_bus: broadcast::Sender<NotificationEvent>,
    /// Delay after each seek before sampling the frame.
    frame_settle: Duration,
}

impl ExportService {
    #[must_use]
    pub fn new(
        renderer: Arc<dyn FrameRenderer>,
        event_bus: broadcast::Sender<NotificationEvent>,
        frame_settle: Duration,
    ) -> Self {
        Self {
            renderer,
            event_bus,
            frame_settle,
        }
    }

    fn emit(&self, event: NotificationEvent) {
        let _ = self.event_bus.send(event);
    }

    fn phase(&self, workspace: &Workspace, label: &str) {
        self.emit(NotificationEvent::ExportPhase {
            workspace: workspace.id.to_string(),
            label: label.to_string(),
        });
    }

    /// Dumps every known layer as a `<key>.png` entry in
    /// `<basename>_assets.zip`, using the replacement bytes where a layer
    /// was swapped. Returns `None` when the movie has no layers at all.
    pub fn export_layers(
        &self,
        workspace: &Workspace,
    ) -> Result<Option<ExportArtifact>, ExportError> {
        if workspace.movie.images.is_empty() {
            return Ok(None);
        }

        let keys = workspace.asset_keys();

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut entries = 0;
        for key in keys {
            let Some(bytes) = workspace.asset_bytes(&key) else {
                continue;
            };

            writer.start_file(format!("{key}.png"), options)?;
            writer.write_all(&as_png(bytes)?).map_err(zip::result::ZipError::from)?;
            entries += 1;
        }

        let bytes = writer.finish()?.into_inner();
        let file_name = format!("{}_assets.zip", workspace.base_name());

        info!(file_name = %file_name, entries, "Layer dump exported");
        self.emit(NotificationEvent::ExportFinished {
            workspace: workspace.id.to_string(),
            file_name: file_name.clone(),
            entries,
        });

        Ok(Some(ExportArtifact {
            file_name,
            content_type: "application/zip",
            bytes,
            entries,
        }))
    }

    /// Captures every frame into `frame_NNNN.png` entries in
    /// `<basename>_frames.zip`.
    pub async fn export_frames(
        &self,
        workspace: &mut Workspace,
    ) -> Result<ExportArtifact, ExportError> {
        self.emit(NotificationEvent::ExportStarted {
            workspace: workspace.id.to_string(),
            kind: "frames".to_string(),
        });

        let result = self.build_frame_archive(workspace).await;
        if result.is_err() {
            self.emit(NotificationEvent::ExportFailed {
                workspace: workspace.id.to_string(),
            });
        }
        result
    }

    /// Re-exports the movie in the requested format. GIF is encoded for
    /// real; the other formats fall back to a frame archive.
    pub async fn export_movie(
        &self,
        workspace: &mut Workspace,
        format: ExportFormat,
    ) -> Result<ExportArtifact, ExportError> {
        self.emit(NotificationEvent::ExportStarted {
            workspace: workspace.id.to_string(),
            kind: format.as_str().to_string(),
        });

        let result = self.build_movie(workspace, format).await;
        if result.is_err() {
            self.emit(NotificationEvent::ExportFailed {
                workspace: workspace.id.to_string(),
            });
        }
        result
    }

    async fn build_movie(
        &self,
        workspace: &mut Workspace,
        format: ExportFormat,
    ) -> Result<ExportArtifact, ExportError> {
        self.phase(workspace, "Capturing frames");
        self.progress(workspace, 30);
        let frames = self.capture_frames(workspace, (30, 60)).await?;

        self.phase(workspace, "Encoding");
        self.progress(workspace, 60);

        let artifact = match format {
            ExportFormat::Gif => {
                let bytes = encode_gif(&frames, workspace.movie.fps)?;
                ExportArtifact {
                    file_name: format!("{}.gif", workspace.base_name()),
                    content_type: "image/gif",
                    entries: frames.len(),
                    bytes,
                }
            }
            ExportFormat::Webp | ExportFormat::Apng | ExportFormat::Vap => {
                warn!(format = %format, "No encoder for format, delivering frame archive");
                let bytes = zip_frames(&frames)?;
                ExportArtifact {
                    file_name: format!("{}_frames.zip", workspace.base_name()),
                    content_type: "application/zip",
                    entries: frames.len(),
                    bytes,
                }
            }
        };

        self.phase(workspace, "Finalizing");
        self.progress(workspace, 90);

        info!(
            file_name = %artifact.file_name,
            format = %format,
            frames = artifact.entries,
            "Movie exported"
        );
        self.emit(NotificationEvent::ExportFinished {
            workspace: workspace.id.to_string(),
            file_name: artifact.file_name.clone(),
            entries: artifact.entries,
        });

        Ok(artifact)
    }

    async fn build_frame_archive(
        &self,
        workspace: &mut Workspace,
    ) -> Result<ExportArtifact, ExportError> {
        let frames = self.capture_frames(workspace, (0, 100)).await?;
        let bytes = zip_frames(&frames)?;
        let file_name = format!("{}_frames.zip", workspace.base_name());

        info!(file_name = %file_name, frames = frames.len(), "Frame archive exported");
        self.emit(NotificationEvent::ExportFinished {
            workspace: workspace.id.to_string(),
            file_name: file_name.clone(),
            entries: frames.len(),
        });

        Ok(ExportArtifact {
            file_name,
            content_type: "application/zip",
            entries: frames.len(),
            bytes,
        })
    }

    fn progress(&self, workspace: &Workspace, percent: u8) {
        self.emit(NotificationEvent::ExportProgress {
            workspace: workspace.id.to_string(),
            percent,
        });
    }

    /// Steps through every frame with playback paused, restoring the
    /// previous playback state afterwards even on failure. Progress is
    /// reported within `band` so a capture embedded in a longer pipeline
    /// never moves the percent backwards.
    async fn capture_frames(
        &self,
        workspace: &mut Workspace,
        band: (u8, u8),
    ) -> Result<Vec<RgbaImage>, ExportError> {
        let was_playing = workspace.playback.is_playing();
        let resume_frame = workspace.playback.current_frame();
        workspace.playback.pause();

        let result = self.capture_frames_inner(workspace, band).await;

        workspace.playback.seek(resume_frame);
        if was_playing {
            workspace.playback.play();
        }

        result
    }

    async fn capture_frames_inner(
        &self,
        workspace: &mut Workspace,
        (lo, hi): (u8, u8),
    ) -> Result<Vec<RgbaImage>, ExportError> {
        let total = workspace.movie.frames;
        let span = u64::from(hi.saturating_sub(lo));
        let mut frames = Vec::with_capacity(total as usize);

        for index in 0..total {
            workspace.playback.seek(index);
            if !self.frame_settle.is_zero() {
                tokio::time::sleep(self.frame_settle).await;
            }

            let frame = self
                .renderer
                .render(&workspace.movie, &workspace.overrides, index)?;
            frames.push(frame);

            let percent = lo + (u64::from(index) * span / u64::from(total)) as u8;
            self.progress(workspace, percent);
        }

        Ok(frames)
    }
}

fn as_png(bytes: &[u8]) -> Result<Vec<u8>, ExportError> {
    if matches!(image::guess_format(bytes), Ok(ImageFormat::Png)) {
        return Ok(bytes.to_vec());
    }

    let decoded = image::load_from_memory(bytes)?;
    let mut buf = std::io::Cursor::new(Vec::new());
    decoded.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn png_bytes(frame: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    frame.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn zip_frames(frames: &[RgbaImage]) -> Result<Vec<u8>, ExportError> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (index, frame) in frames.iter().enumerate() {
        writer.start_file(format!("frame_{index:04}.png"), options)?;
        writer
            .write_all(&png_bytes(frame)?)
            .map_err(zip::result::ZipError::from)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn encode_gif(frames: &[RgbaImage], fps: u32) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite)?;

        let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
        for frame in frames {
            encoder.encode_frame(Frame::from_parts(frame.clone(), 0, 0, delay))?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::renderer::LayerCompositor;
    use crate::animation::Movie;
    use image::Rgba;
    use std::collections::BTreeMap;

    fn png(color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, Rgba(color));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn workspace(frames: u32) -> Workspace {
        let mut images = BTreeMap::new();
        images.insert("img_1".to_string(), png([255, 0, 0, 255]));

        Workspace::new(
            "demo.svga".to_string(),
            512,
            Movie {
                width: 2,
                height: 2,
                fps: 20,
                frames,
                images,
            },
        )
    }

    fn service() -> (ExportService, broadcast::Receiver<NotificationEvent>) {
        let (tx, rx) = broadcast::channel(256);
        (
            ExportService::new(Arc::new(LayerCompositor), tx, Duration::ZERO),
            rx,
        )
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_frame_archive_naming_and_count() {
        let (service, _rx) = service();
        let mut ws = workspace(3);

        let artifact = service.export_frames(&mut ws).await.unwrap();
        assert_eq!(artifact.file_name, "demo_frames.zip");
        assert_eq!(artifact.entries, 3);
        assert_eq!(
            entry_names(&artifact.bytes),
            vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
        );
    }

    #[tokio::test]
    async fn test_export_restores_playback_state() {
        let (service, _rx) = service();
        let mut ws = workspace(3);
        ws.playback.play();

        service.export_frames(&mut ws).await.unwrap();
        assert!(ws.playback.is_playing());

        ws.playback.pause();
        ws.playback.seek(1);
        service.export_frames(&mut ws).await.unwrap();
        assert!(!ws.playback.is_playing());
        assert_eq!(ws.playback.current_frame(), 1);
    }

    #[tokio::test]
    async fn test_layer_dump_skipped_without_assets() {
        let (service, _rx) = service();
        let ws = Workspace::new(
            "empty.svga".to_string(),
            64,
            Movie {
                width: 2,
                height: 2,
                fps: 20,
                frames: 2,
                images: BTreeMap::new(),
            },
        );
        assert!(service.export_layers(&ws).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_layer_dump_covers_every_key_with_current_bytes() {
        let (service, _rx) = service();
        let mut ws = workspace(2);
        ws.movie
            .images
            .insert("img_2".to_string(), png([0, 255, 0, 255]));

        let replacement = png([0, 0, 255, 255]);
        assert!(ws.replace_asset("img_2", replacement.clone()));

        let artifact = service.export_layers(&ws).unwrap().unwrap();
        assert_eq!(artifact.file_name, "demo_assets.zip");
        assert_eq!(entry_names(&artifact.bytes), vec!["img_1.png", "img_2.png"]);

        // The swapped layer comes out with its replacement bytes.
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(&artifact.bytes[..])).unwrap();
        let mut entry = archive.by_name("img_2.png").unwrap();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut bytes).unwrap();
        assert_eq!(bytes, replacement);
    }

    #[tokio::test]
    async fn test_gif_export_is_a_real_gif() {
        let (service, _rx) = service();
        let mut ws = workspace(2);

        let artifact = service
            .export_movie(&mut ws, ExportFormat::Gif)
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "demo.gif");
        assert_eq!(artifact.content_type, "image/gif");
        assert_eq!(&artifact.bytes[..6], b"GIF89a");
    }

    #[tokio::test]
    async fn test_unencodable_format_falls_back_to_frames() {
        let (service, _rx) = service();
        let mut ws = workspace(2);

        let artifact = service
            .export_movie(&mut ws, ExportFormat::Webp)
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "demo_frames.zip");
        assert_eq!(artifact.entries, 2);
    }

    #[tokio::test]
    async fn test_progress_advances_per_frame_then_finishes() {
        let (service, mut rx) = service();
        let mut ws = workspace(4);

        service.export_frames(&mut ws).await.unwrap();

        let mut percents = Vec::new();
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                NotificationEvent::ExportProgress { percent, .. } => percents.push(percent),
                NotificationEvent::ExportFinished { .. } => finished = true,
                _ => {}
            }
        }
        assert_eq!(percents, vec![0, 25, 50, 75]);
        assert!(finished);
    }

    #[tokio::test]
    async fn test_movie_export_progress_never_goes_backwards() {
        let (service, mut rx) = service();
        let mut ws = workspace(4);

        service
            .export_movie(&mut ws, ExportFormat::Gif)
            .await
            .unwrap();

        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let NotificationEvent::ExportProgress { percent, .. } = event {
                percents.push(percent);
            }
        }
        // Capture percents are scaled into the 30-60 band between the
        // phase markers, so the sequence is monotonic end to end.
        assert!(
            percents.windows(2).all(|w| w[0] <= w[1]),
            "progress moved backwards: {percents:?}"
        );
        assert_eq!(percents.first(), Some(&30));
        assert_eq!(percents.last(), Some(&90));
    }

    #[test]
    fn test_layer_dump_reencodes_non_png() {
        // A JPEG replacement still comes out as a .png entry.
        let img = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let mut jpeg = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();

        let out = as_png(&jpeg.into_inner()).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);

        // Bytes that are already PNG pass through untouched.
        let again = as_png(&out).unwrap();
        assert_eq!(again, out);
    }
}
