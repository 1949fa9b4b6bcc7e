//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rendering or exporting a meme.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No element carries the meme container marker.
    #[error("container not found")]
    ContainerNotFound,

    /// The container holds no reference image.
    #[error("no image found")]
    NoImageFound,

    /// The raster step produced no usable buffer.
    #[error("Rasterization failed: {0}")]
    Rasterization(String),

    /// PNG/JPEG encoding failed.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Resource loading or decoding failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Writing the output file failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// The intermediate SVG could not be parsed.
    #[error("SVG parsing failed: {0}")]
    Svg(String),
}
