//! # DOM Snapshot
//!
//! Exports what the editor shows. The live tree is never modified: the
//! meme container is cloned, normalized to exact pixel dimensions,
//! reconciled with the live styles and rasterized.
//!
//! ```text
//! live tree ──► locate container + reference img ──► clone + normalize
//!     │                                                   │
//!     └────────────── reconcile text styles ◄─────────────┘
//!                            │
//!                  inline images ──► SVG ──► Pixmap
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use usvg::fontdb;

use crate::error::{RenderError, RenderResult};
use crate::image::{to_data_uri, ImageLoader};
use crate::raster::{rasterize_svg, to_svg};
use crate::reconcile::{reconcile, ReconcileReport};
use crate::style::{parse_px, prop, px};
use crate::tree::{marked, RenderNode, MEME_CONTAINER};

/// A rasterized snapshot.
#[derive(Debug)]
pub struct Snapshot {
    /// Rendered pixels, transparent where nothing was painted.
    pub pixmap: tiny_skia::Pixmap,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output pixels per tree pixel.
    pub scale: f32,
    /// Intermediate SVG the pixmap was rendered from.
    pub svg: String,
    /// Reconciled elements per role.
    pub report: ReconcileReport,
}

/// Locate the meme container and its reference image.
///
/// # Errors
///
/// Returns [`RenderError::ContainerNotFound`] or [`RenderError::NoImageFound`].
pub fn locate(root: &RenderNode) -> RenderResult<(&RenderNode, &RenderNode)> {
    let container = root
        .find(&marked(MEME_CONTAINER))
        .ok_or(RenderError::ContainerNotFound)?;
    let image = container
        .find(&RenderNode::is_img)
        .ok_or(RenderError::NoImageFound)?;
    Ok((container, image))
}

/// Export resolution of the reference image.
///
/// The intrinsic size wins over the on-screen size, so zoom never changes
/// the output.
///
/// # Errors
///
/// Returns [`RenderError::Rasterization`] if the image has no usable size.
#[allow(clippy::cast_precision_loss)]
pub fn target_size(image: &RenderNode) -> RenderResult<(f32, f32)> {
    image
        .natural_size
        .filter(|(w, h)| *w > 0 && *h > 0)
        .map(|(w, h)| (w as f32, h as f32))
        .or_else(|| image.rendered_size.filter(|(w, h)| *w > 0.0 && *h > 0.0))
        .ok_or_else(|| RenderError::Rasterization("reference image has no size".to_string()))
}

/// Clone `container` with explicit pixel sizes and neutral chrome.
///
/// `layout` is the container's laid-out size. The clone has a transparent
/// background, no margin or padding and no zoom transform; its first
/// image gets explicit pixel dimensions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalized_clone(container: &RenderNode, layout: (f32, f32)) -> RenderNode {
    let mut clone = container.clone();
    clone.inline.set(prop::WIDTH, px(layout.0));
    clone.inline.set(prop::HEIGHT, px(layout.1));
    clone.inline.set(prop::BACKGROUND_COLOR, "transparent");
    clone.inline.set(prop::MARGIN, "0");
    clone.inline.set(prop::PADDING, "0");
    clone.inline.remove(prop::TRANSFORM);

    if let Some(path) = clone.paths(&RenderNode::is_img).into_iter().next() {
        if let Some(img) = clone.at_mut(&path) {
            let width = img
                .computed
                .get(prop::WIDTH)
                .and_then(parse_px)
                .unwrap_or(layout.0);
            let height = img.computed.get(prop::HEIGHT).and_then(parse_px).or_else(|| {
                img.natural_size
                    .filter(|(w, _)| *w > 0)
                    .map(|(w, h)| width * h as f32 / w as f32)
            });
            img.inline.set(prop::WIDTH, px(width));
            if let Some(height) = height {
                img.inline.set(prop::HEIGHT, px(height));
            }
        }
    }
    clone
}

/// Replace every non-`data:` image source with an inline data URI.
///
/// Sources that cannot be fetched are dropped with a warning; the image
/// then paints nothing instead of failing the export.
pub async fn inline_images(tree: &mut RenderNode, loader: &dyn ImageLoader) -> usize {
    let mut inlined = 0;
    for path in tree.paths(&RenderNode::is_img) {
        let Some(src) = tree
            .at(&path)
            .and_then(|n| n.src.clone())
            .filter(|s| !s.is_empty() && !s.starts_with("data:"))
        else {
            continue;
        };
        let fetched = loader.fetch(&src).await;
        let Some(node) = tree.at_mut(&path) else {
            continue;
        };
        match fetched {
            Ok(bytes) => {
                node.src = Some(to_data_uri(&bytes));
                inlined += 1;
            }
            Err(e) => {
                tracing::warn!(src = %src, error = %e, "Dropping image that could not be loaded");
                node.src = None;
            }
        }
    }
    inlined
}

/// Captures live trees into pixmaps.
#[derive(Debug, Clone)]
pub struct DomSnapshotter {
    fontdb: Arc<fontdb::Database>,
    resources_dir: Option<PathBuf>,
}

impl DomSnapshotter {
    /// Create a snapshotter rendering text with `fontdb`.
    #[must_use]
    pub fn new(fontdb: Arc<fontdb::Database>) -> Self {
        Self {
            fontdb,
            resources_dir: None,
        }
    }

    /// Resolve relative image paths against `dir` during rasterization.
    #[must_use]
    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = Some(dir.into());
        self
    }

    /// Snapshot the meme container found under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContainerNotFound`] or
    /// [`RenderError::NoImageFound`] when the tree lacks the expected
    /// structure, and a rasterization error when painting fails.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub async fn capture(
        &self,
        root: &RenderNode,
        loader: &dyn ImageLoader,
    ) -> RenderResult<Snapshot> {
        let (container, image) = locate(root)?;
        let (target_w, target_h) = target_size(image)?;
        tracing::debug!(
            src = image.src.as_deref().unwrap_or_default(),
            target_w,
            target_h,
            "Found reference image"
        );

        let layout_w = container
            .resolved(prop::WIDTH)
            .and_then(parse_px)
            .filter(|w| *w > 0.0)
            .unwrap_or(target_w);
        let layout_h = container
            .resolved(prop::HEIGHT)
            .and_then(parse_px)
            .filter(|h| *h > 0.0)
            .unwrap_or(target_h);
        let scale = target_w / layout_w;
        let width = target_w.round().max(1.0) as u32;
        let height = (layout_h * scale).round().max(1.0) as u32;

        let mut clone = normalized_clone(container, (layout_w, layout_h));
        let report = reconcile(container, &mut clone);
        let inlined = inline_images(&mut clone, loader).await;

        let svg = to_svg(&clone, width, height, scale);
        let pixmap = rasterize_svg(&svg, &self.fontdb, self.resources_dir.as_deref())?;
        if pixmap.width() != width || pixmap.height() != height {
            return Err(RenderError::Rasterization(format!(
                "expected {width}x{height}, got {}x{}",
                pixmap.width(),
                pixmap.height()
            )));
        }
        tracing::debug!(width, height, scale, inlined, "Snapshot rasterized");

        Ok(Snapshot {
            pixmap,
            width,
            height,
            scale,
            svg,
            report,
        })
    }
}
