//! Image loading utilities.
//!
//! Supports loading images from files, URLs, and base64-encoded data URIs,
//! and decoding them into premultiplied pixmaps for compositing.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// GIF (first frame only).
    Gif,
    /// WebP (alpha support).
    WebP,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    /// MIME type for data URIs.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Split a data URI into its MIME type and decoded payload.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns an error if the data URI is malformed.
pub fn parse_data_uri(uri: &str) -> RenderResult<(String, Vec<u8>)> {
    let uri_data = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;

    let (metadata, encoded_data) = uri_data
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    let mime = metadata
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_string();

    let bytes = if metadata.contains(";base64") {
        general_purpose::STANDARD
            .decode(encoded_data.trim())
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))?
    } else {
        percent_decode(encoded_data)?
    };

    Ok((mime, bytes))
}

/// Encode bytes as a data URI, sniffing the MIME type from magic bytes.
#[must_use]
pub fn to_data_uri(bytes: &[u8]) -> String {
    let mime = ImageFormat::from_magic_bytes(bytes).mime();
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// Percent-decoding for non-base64 data URIs.
fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}

/// Read image dimensions without decoding pixel data.
///
/// # Errors
///
/// Returns an error if the format is unrecognised or the header is corrupt.
pub fn image_dimensions(data: &[u8]) -> RenderResult<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| RenderError::Resource(format!("Failed to read image header: {e}")))?
        .into_dimensions()
        .map_err(|e| RenderError::Resource(format!("Failed to read image size: {e}")))
}

/// Decode an image into a premultiplied pixmap.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn decode_pixmap(data: &[u8]) -> RenderResult<tiny_skia::Pixmap> {
    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixels = rgba.into_raw();
    premultiply(&mut pixels);

    let size = tiny_skia::IntSize::from_wh(width, height)
        .ok_or_else(|| RenderError::Resource(format!("Invalid image size {width}x{height}")))?;
    tiny_skia::Pixmap::from_vec(pixels, size)
        .ok_or_else(|| RenderError::Resource("Failed to create pixmap from image".to_string()))
}

#[allow(clippy::cast_possible_truncation)]
fn premultiply(rgba: &mut [u8]) {
    for pixel in rgba.chunks_exact_mut(4) {
        let alpha = u16::from(pixel[3]);
        for channel in &mut pixel[..3] {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }
}

/// Fetches raw image bytes for a `src` value.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetch the bytes behind `src`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Resource`] if the source cannot be read.
    async fn fetch(&self, src: &str) -> RenderResult<Vec<u8>>;
}

/// Loader for data URIs, local files and (with the `http` feature) URLs.
#[derive(Debug, Clone, Default)]
pub struct DefaultImageLoader {
    resources_dir: Option<PathBuf>,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl DefaultImageLoader {
    /// Create a loader resolving relative paths against the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir`.
    #[must_use]
    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = Some(dir.into());
        self
    }

    fn resolve_path(&self, src: &str) -> PathBuf {
        let path = PathBuf::from(src.strip_prefix("file://").unwrap_or(src));
        match &self.resources_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }

    #[cfg(feature = "http")]
    async fn fetch_http(&self, url: &str) -> RenderResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RenderError::Resource(format!("Failed to fetch {url}: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Resource(format!("Failed to read {url}: {e}")))?;
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "http"))]
    #[allow(clippy::unused_async)]
    async fn fetch_http(&self, url: &str) -> RenderResult<Vec<u8>> {
        Err(RenderError::Resource(format!(
            "Cannot fetch {url}: built without HTTP support"
        )))
    }
}

#[async_trait]
impl ImageLoader for DefaultImageLoader {
    async fn fetch(&self, src: &str) -> RenderResult<Vec<u8>> {
        if src.starts_with("data:") {
            return parse_data_uri(src).map(|(_, bytes)| bytes);
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            tracing::debug!(url = src, "Fetching remote image");
            return self.fetch_http(src).await;
        }
        let path = self.resolve_path(src);
        tokio::fs::read(&path)
            .await
            .map_err(|e| RenderError::Resource(format!("Failed to read {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 red PNG.
    const RED_PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GI"), ImageFormat::Unknown);
    }

    #[test]
    fn test_data_uri_roundtrip() {
        let uri = format!("data:image/png;base64,{RED_PIXEL_PNG}");
        let (mime, bytes) = parse_data_uri(&uri).expect("valid data URI");
        assert_eq!(mime, "image/png");
        assert_eq!(to_data_uri(&bytes), uri);
    }

    #[test]
    fn test_percent_encoded_data_uri() {
        let (mime, bytes) = parse_data_uri("data:text/plain,a%20b").expect("valid");
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"a b");
        assert!(parse_data_uri("data:,%zz").is_err());
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(parse_data_uri("not a data uri").is_err());
        assert!(parse_data_uri("data:image/png").is_err());
    }

    #[test]
    fn test_decode_pixmap() {
        let (_, bytes) =
            parse_data_uri(&format!("data:image/png;base64,{RED_PIXEL_PNG}")).expect("valid");
        assert_eq!(image_dimensions(&bytes).expect("size"), (1, 1));

        let pixmap = decode_pixmap(&bytes).expect("decode");
        assert_eq!((pixmap.width(), pixmap.height()), (1, 1));
        assert!(decode_pixmap(b"garbage").is_err());
    }

    #[test]
    fn test_premultiply() {
        let mut px = [255, 128, 0, 128];
        premultiply(&mut px);
        assert_eq!(px, [128, 64, 0, 128]);
    }

    #[tokio::test]
    async fn test_loader_reads_relative_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("pixel.bin"), b"bytes").expect("write");

        let loader = DefaultImageLoader::new().with_resources_dir(dir.path());
        assert_eq!(loader.fetch("pixel.bin").await.expect("fetch"), b"bytes");
        assert!(loader.fetch("missing.png").await.is_err());
    }
}
