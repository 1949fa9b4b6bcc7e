//! # Meme Renderer
//!
//! Turns meme documents into render trees and render trees into images.
//!
//! ## Export Strategies
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               MemeExporter                  │
//! ├──────────────────────┬──────────────────────┤
//! │ DOM snapshot         │ Direct paint         │
//! │ live tree → clone →  │ Composition →        │
//! │ reconcile → SVG      │ tiny-skia commands   │
//! ├──────────────────────┴──────────────────────┤
//! │   resvg / tiny-skia  →  PNG / JPEG  → sink  │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod composer;
pub mod download;
pub mod encode;
pub mod error;
pub mod export;
pub mod image;
pub mod layout;
pub mod live;
pub mod raster;
pub mod reconcile;
pub mod snapshot;
pub mod style;
pub mod tree;

pub use composer::{
    Background, ComposeElement, ComposeImage, ComposeRect, ComposeText, ComposerConfig,
    Composition, DirectComposer, ImageFit,
};
pub use download::{DirectorySink, DownloadSink, MemorySink};
pub use encode::OutputFormat;
pub use error::{RenderError, RenderResult};
pub use export::{ExportConfig, ExportOptions, ExportOutput, ExportStrategy, MemeExporter};
pub use crate::image::{DefaultImageLoader, ImageLoader};
pub use layout::{CanvasConfig, MemeLayout};
pub use live::LiveRenderer;
pub use snapshot::{DomSnapshotter, Snapshot};
pub use tree::RenderNode;
