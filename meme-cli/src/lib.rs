//! # Meme CLI
//!
//! Headless exporter for meme documents and template-editor compositions.
//!
//! ## Usage
//!
//! ```bash
//! meme init --output meme.json --template drake.png
//! meme export --document meme.json --format jpeg --quality 0.9 --out-dir out
//! meme compose --composition poster.json --out-dir out
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `OutputArgs` - Shared output and font settings, folded into an `ExportConfig`
//! - [`run`] - Executes a parsed command against `meme-renderer`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use meme_core::{CoreError, Document, TracingNotifier};
use meme_renderer::{
    Composition, DefaultImageLoader, DirectorySink, ExportConfig, ExportOptions, ExportOutput,
    ExportStrategy, MemeExporter, OutputFormat, RenderError,
};
use thiserror::Error;

/// Errors from CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading or writing a file failed.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The document could not be built or parsed.
    #[error(transparent)]
    Document(#[from] CoreError),

    /// The composition file is not valid JSON.
    #[error("Invalid composition: {0}")]
    Composition(#[from] serde_json::Error),

    /// The export failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for CLI commands.
pub type CliResult<T> = std::result::Result<T, CliError>;

/// Command-line arguments for `meme`.
#[derive(Debug, Clone, Parser)]
#[command(name = "meme")]
#[command(about = "Compose and export memes from JSON documents")]
#[command(version)]
pub struct CliArgs {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Export a meme document
    Export(ExportArgs),
    /// Paint a template-editor composition (always PNG)
    Compose(ComposeArgs),
    /// Write a default document
    Init(InitArgs),
}

/// Output location and font settings shared by the export commands.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Directory exported files are saved to
    #[arg(long, env = "MEME_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Output filename without extension (default: meme-<unix millis>)
    #[arg(long)]
    pub filename: Option<String>,

    /// Additional font directory; repeatable
    #[arg(long = "font-dir")]
    pub font_dirs: Vec<PathBuf>,

    /// Skip loading system fonts
    #[arg(long, env = "MEME_NO_SYSTEM_FONTS")]
    pub no_system_fonts: bool,
}

impl OutputArgs {
    /// Apply these settings to `config`.
    pub fn apply(&self, config: &mut ExportConfig) {
        config.load_system_fonts = !self.no_system_fonts;
        config.font_dirs.clone_from(&self.font_dirs);
    }
}

/// Arguments for `meme export`.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Document JSON file
    #[arg(long)]
    pub document: PathBuf,

    /// Export strategy: snapshot or direct
    #[arg(long, env = "MEME_EXPORT_STRATEGY", default_value = "snapshot")]
    pub strategy: ExportStrategy,

    /// Output format: png or jpeg
    #[arg(long, env = "MEME_EXPORT_FORMAT", default_value = "png")]
    pub format: OutputFormat,

    /// Encoder quality in 0.0..=1.0 (JPEG only)
    #[arg(long, default_value_t = 1.0)]
    pub quality: f32,

    /// Live canvas zoom; does not change the output resolution
    #[arg(long, env = "MEME_ZOOM", default_value_t = 1.0)]
    pub zoom: f32,

    /// Output settings
    #[command(flatten)]
    pub output: OutputArgs,
}

impl ExportArgs {
    /// Exporter configuration for this command.
    ///
    /// Relative template and overlay paths resolve against the document's
    /// directory.
    #[must_use]
    pub fn export_config(&self) -> ExportConfig {
        let mut config = ExportConfig {
            strategy: self.strategy,
            zoom: self.zoom,
            resources_dir: Some(parent_dir(&self.document)),
            ..ExportConfig::default()
        };
        self.output.apply(&mut config);
        config
    }

    /// Per-export options for this command.
    #[must_use]
    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            format: self.format,
            quality: self.quality.clamp(0.0, 1.0),
            filename: self.output.filename.clone(),
        }
    }
}

/// Arguments for `meme compose`.
#[derive(Debug, Clone, Args)]
pub struct ComposeArgs {
    /// Composition JSON file
    #[arg(long)]
    pub composition: PathBuf,

    /// Output settings
    #[command(flatten)]
    pub output: OutputArgs,
}

impl ComposeArgs {
    /// Exporter configuration for this command.
    #[must_use]
    pub fn export_config(&self) -> ExportConfig {
        let mut config = ExportConfig {
            strategy: ExportStrategy::DirectPaint,
            resources_dir: Some(parent_dir(&self.composition)),
            ..ExportConfig::default()
        };
        self.output.apply(&mut config);
        config
    }
}

/// Arguments for `meme init`.
#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Where to write the document
    #[arg(long)]
    pub output: PathBuf,

    /// Template image path, URL or data URI
    #[arg(long, default_value = "template.png")]
    pub template: String,
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

async fn read(path: &Path) -> CliResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn exporter(config: ExportConfig, out_dir: &Path) -> MemeExporter {
    let loader = match &config.resources_dir {
        Some(dir) => DefaultImageLoader::new().with_resources_dir(dir.clone()),
        None => DefaultImageLoader::new(),
    };
    MemeExporter::new(
        config,
        Arc::new(loader),
        Arc::new(DirectorySink::new(out_dir)),
        Arc::new(TracingNotifier),
    )
}

/// Run a parsed command.
///
/// Returns the export result for `export` and `compose`, and `None`
/// for `init`.
///
/// # Errors
///
/// Returns an error if an input file cannot be read or parsed, or the
/// export fails.
pub async fn run(args: CliArgs) -> CliResult<Option<ExportOutput>> {
    match args.command {
        Command::Export(args) => export(&args).await.map(Some),
        Command::Compose(args) => compose(&args).await.map(Some),
        Command::Init(args) => {
            init(&args).await?;
            Ok(None)
        }
    }
}

async fn export(args: &ExportArgs) -> CliResult<ExportOutput> {
    let doc = Document::from_json(&read(&args.document).await?)?;
    tracing::info!(
        document = %args.document.display(),
        strategy = ?args.strategy,
        format = %args.format,
        "Exporting document"
    );
    let output = exporter(args.export_config(), &args.output.out_dir)
        .export_document(&doc, &args.options())
        .await?;
    Ok(output)
}

async fn compose(args: &ComposeArgs) -> CliResult<ExportOutput> {
    let composition: Composition = serde_json::from_str(&read(&args.composition).await?)?;
    tracing::info!(
        composition = %args.composition.display(),
        width = composition.width,
        height = composition.height,
        elements = composition.elements.len(),
        "Composing"
    );
    let output = exporter(args.export_config(), &args.output.out_dir)
        .export_composition(&composition, args.output.filename.as_deref())
        .await?;
    Ok(output)
}

async fn init(args: &InitArgs) -> CliResult<()> {
    let json = Document::new(args.template.clone()).to_json()?;
    tokio::fs::write(&args.output, json)
        .await
        .map_err(|source| CliError::Io {
            path: args.output.clone(),
            source,
        })?;
    tracing::info!(path = %args.output.display(), "Wrote default document");
    Ok(())
}
