//! Output encoding and file naming.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose, Engine as _};
use image::ImageEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::style::Color;

/// Default filename prefix.
pub const DEFAULT_PREFIX: &str = "meme";

/// Output image format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG, lossless with alpha.
    #[default]
    Png,
    /// JPEG, alpha flattened onto a background.
    Jpeg,
}

impl OutputFormat {
    /// File extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    /// MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(RenderError::Encode(format!("Unsupported format: {other}"))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Map a `0.0..=1.0` quality factor to a JPEG quality of `1..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality.is_nan() { 1.0 } else { quality.clamp(0.0, 1.0) };
    ((q * 100.0).round() as u8).max(1)
}

/// Encode a pixmap as PNG.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if encoding fails.
pub fn encode_png(pixmap: &tiny_skia::Pixmap) -> RenderResult<Vec<u8>> {
    pixmap
        .encode_png()
        .map_err(|e| RenderError::Encode(format!("PNG encoding failed: {e}")))
}

/// Encode a pixmap as JPEG, flattening alpha onto `background`.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if encoding fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_jpeg(
    pixmap: &tiny_skia::Pixmap,
    quality: f32,
    background: Color,
) -> RenderResult<Vec<u8>> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let bg = [
        f32::from(background.r),
        f32::from(background.g),
        f32::from(background.b),
    ];
    let mut rgb_data = Vec::with_capacity(width as usize * height as usize * 3);
    // Pixmap data is premultiplied: out = src + bg * (1 - alpha).
    for pixel in pixmap.data().chunks_exact(4) {
        let inv = 1.0 - f32::from(pixel[3]) / 255.0;
        for (channel, bg) in pixel[..3].iter().zip(bg) {
            rgb_data.push(bg.mul_add(inv, f32::from(*channel)).round().min(255.0) as u8);
        }
    }

    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
    encoder
        .write_image(&rgb_data, width, height, image::ColorType::Rgb8.into())
        .map_err(|e| RenderError::Encode(format!("JPEG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Encode a pixmap in `format`.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if encoding fails.
pub fn encode(
    pixmap: &tiny_skia::Pixmap,
    format: OutputFormat,
    quality: f32,
    jpeg_background: Color,
) -> RenderResult<Vec<u8>> {
    match format {
        OutputFormat::Png => encode_png(pixmap),
        OutputFormat::Jpeg => encode_jpeg(pixmap, quality, jpeg_background),
    }
}

/// `data:<mime>;base64,<payload>`.
#[must_use]
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// Default filename stem, `meme-<unix millis>`.
#[must_use]
pub fn default_stem() -> String {
    format!("{DEFAULT_PREFIX}-{}", unix_millis())
}

/// Append the format's extension unless `stem` already ends with it.
#[must_use]
pub fn filename_with_extension(stem: &str, format: OutputFormat) -> String {
    let ext = format.extension();
    let has_ext = stem
        .rsplit_once('.')
        .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext));
    if has_ext {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_transparent_red() -> tiny_skia::Pixmap {
        let mut pixmap = tiny_skia::Pixmap::new(4, 4).expect("pixmap");
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 128));
        pixmap
    }

    #[test]
    fn test_png_magic() {
        let png = encode_png(&half_transparent_red()).expect("png");
        assert_eq!(&png[0..4], &[137, 80, 78, 71]);
    }

    #[test]
    fn test_jpeg_magic() {
        let jpeg = encode(&half_transparent_red(), OutputFormat::Jpeg, 0.9, Color::WHITE)
            .expect("jpeg");
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.85), 85);
        assert_eq!(jpeg_quality(7.0), 100);
    }

    #[test]
    fn test_filenames() {
        assert_eq!(filename_with_extension("meme-1", OutputFormat::Png), "meme-1.png");
        assert_eq!(filename_with_extension("x.jpeg", OutputFormat::Jpeg), "x.jpeg");
        assert!(default_stem().starts_with("meme-"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JPG".parse::<OutputFormat>().expect("jpg"), OutputFormat::Jpeg);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
    }
}
