//! # Meme Export
//!
//! One entry point for every way a meme leaves the editor.
//!
//! | Input | Path |
//! |-------|------|
//! | live [`RenderNode`] tree | DOM snapshot |
//! | [`Document`] + [`ExportStrategy::DomSnapshot`] | live render, then DOM snapshot |
//! | [`Document`] + [`ExportStrategy::DirectPaint`] | [`Composition::from_document`], then direct paint |
//! | [`Composition`] | direct paint, always PNG |
//!
//! All paths share encoding, file naming, saving and the outcome toast.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use meme_core::{Document, Notifier, Toast};
use serde::{Deserialize, Serialize};
use usvg::fontdb;

use crate::composer::{Composition, ComposerConfig, DirectComposer};
use crate::download::DownloadSink;
use crate::encode::{data_uri, default_stem, encode, filename_with_extension, OutputFormat};
use crate::error::{RenderError, RenderResult};
use crate::image::{image_dimensions, ImageLoader};
use crate::layout::CanvasConfig;
use crate::live::LiveRenderer;
use crate::raster::font_database;
use crate::snapshot::DomSnapshotter;
use crate::style::{parse_color, Color};
use crate::tree::RenderNode;

/// How a [`Document`] is turned into pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportStrategy {
    /// Render the live tree and snapshot it.
    #[default]
    DomSnapshot,
    /// Paint the element model directly.
    DirectPaint,
}

impl std::str::FromStr for ExportStrategy {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snapshot" | "dom" | "dom-snapshot" => Ok(Self::DomSnapshot),
            "direct" | "paint" | "direct-paint" => Ok(Self::DirectPaint),
            other => Err(RenderError::Encode(format!("Unknown export strategy: {other}"))),
        }
    }
}

/// Per-export options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Output format.
    pub format: OutputFormat,
    /// Encoder quality in `0.0..=1.0`; only JPEG uses it.
    pub quality: f32,
    /// Output filename; defaults to `meme-<unix millis>`.
    pub filename: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: 1.0,
            filename: None,
        }
    }
}

impl ExportOptions {
    /// JPEG at `quality`.
    #[must_use]
    pub fn jpeg(quality: f32) -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality,
            filename: None,
        }
    }

    /// Use `filename` instead of the timestamped default.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    fn resolved_filename(&self) -> String {
        let stem = self.filename.clone().unwrap_or_else(default_stem);
        filename_with_extension(&stem, self.format)
    }
}

/// Exporter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Strategy for document exports.
    pub strategy: ExportStrategy,
    /// Fill behind transparent pixels in JPEG output.
    pub jpeg_background: String,
    /// Load system fonts for text rendering.
    pub load_system_fonts: bool,
    /// Extra font directories.
    pub font_dirs: Vec<PathBuf>,
    /// Base directory for relative image paths.
    pub resources_dir: Option<PathBuf>,
    /// Live canvas zoom used when rendering documents for a snapshot.
    pub zoom: f32,
    /// Live canvas styling.
    pub canvas: CanvasConfig,
    /// Direct composer settings.
    pub composer: ComposerConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            strategy: ExportStrategy::DomSnapshot,
            jpeg_background: "#ffffff".to_string(),
            load_system_fonts: true,
            font_dirs: Vec::new(),
            resources_dir: None,
            zoom: 1.0,
            canvas: CanvasConfig::default(),
            composer: ComposerConfig::default(),
        }
    }
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// Encoded file bytes.
    pub bytes: Vec<u8>,
    /// The same bytes as a data URI.
    pub data_uri: String,
    /// Filename the sink received.
    pub filename: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoded format.
    pub format: OutputFormat,
    /// Location reported by the sink.
    pub saved_to: String,
}

/// Exports memes and reports the outcome.
pub struct MemeExporter {
    config: ExportConfig,
    loader: Arc<dyn ImageLoader>,
    sink: Arc<dyn DownloadSink>,
    notifier: Arc<dyn Notifier>,
    fontdb: Arc<fontdb::Database>,
    renderer: LiveRenderer,
}

impl std::fmt::Debug for MemeExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemeExporter")
            .field("config", &self.config)
            .field("font_faces", &self.fontdb.len())
            .finish_non_exhaustive()
    }
}

impl MemeExporter {
    /// Create an exporter, loading fonts as configured.
    #[must_use]
    pub fn new(
        config: ExportConfig,
        loader: Arc<dyn ImageLoader>,
        sink: Arc<dyn DownloadSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let fontdb = font_database(config.load_system_fonts, &config.font_dirs);
        let renderer = LiveRenderer::new(config.canvas.clone());
        Self {
            config,
            loader,
            sink,
            notifier,
            fontdb,
            renderer,
        }
    }

    /// Replace the font database.
    #[must_use]
    pub fn with_fontdb(mut self, fontdb: Arc<fontdb::Database>) -> Self {
        self.fontdb = fontdb;
        self
    }

    /// Exporter configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Live renderer used for document snapshots.
    #[must_use]
    pub fn renderer(&self) -> &LiveRenderer {
        &self.renderer
    }

    /// Snapshot a live render tree.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContainerNotFound`] or
    /// [`RenderError::NoImageFound`] when the tree lacks the expected
    /// structure, and rendering, encoding or saving errors otherwise.
    /// A failure toast is sent in every error case.
    pub async fn export_tree(
        &self,
        root: &RenderNode,
        options: &ExportOptions,
    ) -> RenderResult<ExportOutput> {
        let result = self
            .snapshot(root)
            .await
            .and_then(|pixmap| self.deliver(&pixmap, options));
        self.report(result)
    }

    /// Export a document with the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be loaded or any export
    /// step fails. A failure toast is sent in every error case.
    pub async fn export_document(
        &self,
        doc: &Document,
        options: &ExportOptions,
    ) -> RenderResult<ExportOutput> {
        let result = self
            .paint_document(doc)
            .await
            .and_then(|pixmap| self.deliver(&pixmap, options));
        self.report(result)
    }

    /// Paint a composition and save it as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the canvas cannot be painted, encoded or saved.
    /// A failure toast is sent in every error case.
    pub async fn export_composition(
        &self,
        composition: &Composition,
        filename: Option<&str>,
    ) -> RenderResult<ExportOutput> {
        let options = ExportOptions {
            filename: filename.map(str::to_string),
            ..ExportOptions::default()
        };
        let result = self
            .composer()
            .compose(composition)
            .await
            .and_then(|pixmap| self.deliver(&pixmap, &options));
        self.report(result)
    }

    fn composer(&self) -> DirectComposer {
        DirectComposer::new(
            Arc::clone(&self.loader),
            Arc::clone(&self.fontdb),
            self.config.composer.clone(),
        )
    }

    fn snapshotter(&self) -> DomSnapshotter {
        let snapshotter = DomSnapshotter::new(Arc::clone(&self.fontdb));
        match &self.config.resources_dir {
            Some(dir) => snapshotter.with_resources_dir(dir.clone()),
            None => snapshotter,
        }
    }

    async fn snapshot(&self, root: &RenderNode) -> RenderResult<tiny_skia::Pixmap> {
        let snapshot = self.snapshotter().capture(root, self.loader.as_ref()).await?;
        Ok(snapshot.pixmap)
    }

    async fn paint_document(&self, doc: &Document) -> RenderResult<tiny_skia::Pixmap> {
        let template = self.loader.fetch(doc.template()).await?;
        let natural = image_dimensions(&template)?;
        tracing::debug!(
            strategy = ?self.config.strategy,
            width = natural.0,
            height = natural.1,
            "Exporting document"
        );
        match self.config.strategy {
            ExportStrategy::DomSnapshot => {
                let tree = self
                    .renderer
                    .render(doc, natural, self.config.zoom, Instant::now());
                self.snapshot(&tree).await
            }
            ExportStrategy::DirectPaint => {
                let composition = Composition::from_document(doc, natural, &self.config.canvas);
                self.composer().compose(&composition).await
            }
        }
    }

    fn deliver(
        &self,
        pixmap: &tiny_skia::Pixmap,
        options: &ExportOptions,
    ) -> RenderResult<ExportOutput> {
        let background = parse_color(&self.config.jpeg_background).unwrap_or(Color::WHITE);
        let bytes = encode(pixmap, options.format, options.quality, background)?;
        let filename = options.resolved_filename();
        let saved_to = self.sink.save(&filename, &bytes)?;
        Ok(ExportOutput {
            data_uri: data_uri(options.format.mime(), &bytes),
            bytes,
            filename,
            width: pixmap.width(),
            height: pixmap.height(),
            format: options.format,
            saved_to,
        })
    }

    fn report(&self, result: RenderResult<ExportOutput>) -> RenderResult<ExportOutput> {
        match &result {
            Ok(output) => {
                tracing::info!(
                    filename = %output.filename,
                    width = output.width,
                    height = output.height,
                    size = output.bytes.len(),
                    "Export complete"
                );
                self.notifier.notify(Toast::info(
                    "Download successful!",
                    "Your meme has been downloaded.",
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                self.notifier
                    .notify(Toast::destructive("Download failed", e.to_string()));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MemorySink;
    use crate::image::DefaultImageLoader;
    use meme_core::{RecordingNotifier, ToastVariant};

    fn exporter(
        config: ExportConfig,
    ) -> (MemeExporter, Arc<MemorySink>, Arc<RecordingNotifier>) {
        let sink = Arc::new(MemorySink::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = ExportConfig {
            load_system_fonts: false,
            ..config
        };
        let exporter = MemeExporter::new(
            config,
            Arc::new(DefaultImageLoader::new()),
            sink.clone(),
            notifier.clone(),
        );
        (exporter, sink, notifier)
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "snapshot".parse::<ExportStrategy>().expect("strategy"),
            ExportStrategy::DomSnapshot
        );
        assert_eq!(
            "direct".parse::<ExportStrategy>().expect("strategy"),
            ExportStrategy::DirectPaint
        );
        assert!("gif".parse::<ExportStrategy>().is_err());
    }

    #[test]
    fn test_filename_resolution() {
        let named = ExportOptions::jpeg(0.8).with_filename("funny");
        assert_eq!(named.resolved_filename(), "funny.jpeg");
        let default = ExportOptions::default().resolved_filename();
        assert!(default.starts_with("meme-"));
        assert!(default.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_missing_container_reports_failure() {
        let (exporter, sink, notifier) = exporter(ExportConfig::default());
        let err = exporter
            .export_tree(&RenderNode::div(), &ExportOptions::default())
            .await
            .expect_err("no container");

        assert!(matches!(err, RenderError::ContainerNotFound));
        assert!(sink.is_empty());
        let toast = notifier.last().expect("toast");
        assert_eq!(toast.title, "Download failed");
        assert_eq!(toast.description, "container not found");
        assert_eq!(toast.variant, ToastVariant::Destructive);
    }

    #[tokio::test]
    async fn test_unloadable_template_reports_failure() {
        let (exporter, sink, notifier) = exporter(ExportConfig::default());
        let doc = Document::new("does-not-exist.png");
        assert!(exporter
            .export_document(&doc, &ExportOptions::default())
            .await
            .is_err());
        assert!(sink.is_empty());
        assert_eq!(
            notifier.last().expect("toast").variant,
            ToastVariant::Destructive
        );
    }
}
