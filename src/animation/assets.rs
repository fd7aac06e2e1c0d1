//! Layer asset handling: data URI codec, mime sniffing, and the key
//! ordering used by the asset panel and archive layouts.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ImageFormat;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Not a data URI")]
    NotDataUri,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Unrecognized image data")]
    UnrecognizedImage,
}

/// An image plus its sniffed mime type, ready to travel as a data URI.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedImage {
    pub mime: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// Wraps raw bytes, sniffing the format from magic bytes.
    pub fn sniff(bytes: Vec<u8>) -> Result<Self, AssetError> {
        let format = image::guess_format(&bytes).map_err(|_| AssetError::UnrecognizedImage)?;
        let mime = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
            _ => "application/octet-stream",
        };
        Ok(Self { mime, bytes })
    }

    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }

    /// Parses a `data:<mime>;base64,<payload>` URI back into bytes. The
    /// declared mime is ignored; the bytes are re-sniffed.
    pub fn from_data_uri(uri: &str) -> Result<Self, AssetError> {
        let rest = uri.strip_prefix("data:").ok_or(AssetError::NotDataUri)?;
        let (_mime, payload) = rest.split_once(";base64,").ok_or(AssetError::NotDataUri)?;

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| AssetError::InvalidBase64(e.to_string()))?;

        Self::sniff(bytes)
    }
}

/// Orders asset keys by the first integer embedded in them, so `img_2`
/// sorts before `img_10`. Keys without digits come last, alphabetically.
pub fn sort_asset_keys(keys: &mut [String]) {
    keys.sort_by(|a, b| {
        let na = first_number(a);
        let nb = first_number(b);
        na.cmp(&nb).then_with(|| a.cmp(b))
    });
}

fn first_number(key: &str) -> u64 {
    let digits: String = key
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(u64::MAX)
}
