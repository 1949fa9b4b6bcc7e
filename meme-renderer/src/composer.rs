//! # Direct Composer
//!
//! Paints a meme from explicit drawing commands instead of a render
//! tree: a background (solid color, linear gradient or stretched image)
//! followed by text, image and rectangle elements in order.
//!
//! Image elements that fail to load or decode are logged and skipped. A
//! background image that fails falls back to solid white. Groups paint
//! onto their own layer, which is then composited with one transform and
//! opacity.

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use meme_core::{Document, TextElement};
use serde::{Deserialize, Serialize};
use tiny_skia::{
    FilterQuality, GradientStop, LinearGradient, Paint, Pattern, PixmapPaint, Point, Rect, Shader,
    SpreadMode, Transform,
};
use usvg::fontdb;

use crate::error::{RenderError, RenderResult};
use crate::image::{decode_pixmap, to_data_uri, ImageLoader};
use crate::layout::{BarLayout, CanvasConfig, MemeLayout};
use crate::raster::{escape_xml, paint_svg};
use crate::style::{parse_color, Color, TextAlign};

/// Settings for direct composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Canvas width for template-editor compositions.
    pub width: u32,
    /// Canvas height for template-editor compositions.
    pub height: u32,
    /// Text outline color.
    pub stroke_color: String,
    /// Caption font size of preset templates.
    pub preset_font_size: f32,
    /// Caption outline width of preset templates.
    pub preset_stroke_width: f32,
    /// Caption font family of preset templates.
    pub preset_font_family: String,
    /// Caption fill color of preset templates.
    pub preset_text_color: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            stroke_color: "#000000".to_string(),
            preset_font_size: 40.0,
            preset_stroke_width: 3.0,
            preset_font_family: "Arial".to_string(),
            preset_text_color: "#ffffff".to_string(),
        }
    }
}

/// Canvas background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Background {
    /// Solid CSS color.
    Color(String),
    /// CSS `linear-gradient(...)`.
    Gradient(String),
    /// Image stretched over the canvas.
    Image(String),
}

impl Default for Background {
    fn default() -> Self {
        Self::Color("#ffffff".to_string())
    }
}

impl Background {
    /// Classify a CSS background value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("linear-gradient(") {
            Self::Gradient(value.to_string())
        } else if parse_color(value).is_some() {
            Self::Color(value.to_string())
        } else {
            Self::Image(value.to_string())
        }
    }
}

/// A parsed linear gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// CSS angle: 0 points up, angles grow clockwise.
    pub angle: f32,
    /// Color stops with offsets in `0.0..=1.0`.
    pub stops: Vec<(f32, Color)>,
}

impl Gradient {
    /// Parse `linear-gradient(<angle>|to <side>, <color> [<pos>%], ...)`.
    ///
    /// Without an angle the gradient runs top to bottom. Stops without a
    /// position are spread evenly.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn parse(value: &str) -> Option<Self> {
        let args = value
            .trim()
            .strip_prefix("linear-gradient(")?
            .strip_suffix(')')?;
        let mut parts = split_top_level(args);
        let angle = parts.first().and_then(|p| parse_direction(p));
        if angle.is_some() {
            parts.remove(0);
        }

        let count = parts.len();
        if count < 2 {
            return None;
        }
        let mut stops = Vec::with_capacity(count);
        for (i, part) in parts.iter().enumerate() {
            let even = i as f32 / (count - 1) as f32;
            let (color, pos) = match part.rsplit_once(char::is_whitespace) {
                Some((color, pos)) if pos.ends_with('%') => {
                    let pos = pos.trim_end_matches('%').parse::<f32>().ok()? / 100.0;
                    (color.trim(), pos)
                }
                _ => (part.trim(), even),
            };
            stops.push((pos.clamp(0.0, 1.0), parse_color(color)?));
        }
        Some(Self {
            angle: angle.unwrap_or(180.0),
            stops,
        })
    }

    /// Gradient line endpoints for a `width × height` box.
    #[must_use]
    pub fn endpoints(&self, width: f32, height: f32) -> (Point, Point) {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let half = ((width * sin).abs() + (height * cos).abs()) / 2.0;
        let (cx, cy) = (width / 2.0, height / 2.0);
        let (dx, dy) = (sin * half, -cos * half);
        (
            Point::from_xy(cx - dx, cy - dy),
            Point::from_xy(cx + dx, cy + dy),
        )
    }

    fn shader(&self, width: f32, height: f32) -> Option<Shader<'static>> {
        let (start, end) = self.endpoints(width, height);
        let stops = self
            .stops
            .iter()
            .map(|(pos, color)| GradientStop::new(*pos, color.to_skia()))
            .collect();
        LinearGradient::new(start, end, stops, SpreadMode::Pad, Transform::identity())
    }
}

fn split_top_level(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in args.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current).trim().to_string());
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts
}

fn parse_direction(value: &str) -> Option<f32> {
    let value = value.trim();
    if let Some(deg) = value.strip_suffix("deg") {
        return deg.trim().parse().ok();
    }
    if let Some(turn) = value.strip_suffix("turn") {
        return turn.trim().parse::<f32>().ok().map(|t| t * 360.0);
    }
    let side = value.strip_prefix("to ")?;
    let mut words: Vec<&str> = side.split_whitespace().collect();
    words.sort_unstable();
    match words.as_slice() {
        ["top"] => Some(0.0),
        ["right"] => Some(90.0),
        ["bottom"] => Some(180.0),
        ["left"] => Some(270.0),
        ["right", "top"] => Some(45.0),
        ["bottom", "right"] => Some(135.0),
        ["bottom", "left"] => Some(225.0),
        ["left", "top"] => Some(315.0),
        _ => None,
    }
}

/// A text element. `(x, y)` is the anchor of the first baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeText {
    /// Content; `\n` starts a new line.
    pub text: String,
    /// Anchor x.
    pub x: f32,
    /// First baseline y.
    pub y: f32,
    /// Font size in pixels.
    pub font_size: f32,
    /// CSS font weight.
    pub font_weight: String,
    /// Font family.
    pub font_family: String,
    /// Fill color.
    pub color: String,
    /// Outline width; zero disables the outline.
    pub stroke_width: f32,
    /// Which side of the anchor the text extends from.
    pub align: TextAlign,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
    /// Uniform scale.
    pub scale: f32,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Rotation/scale pivot; defaults to the anchor.
    pub pivot: Option<(f32, f32)>,
}

impl Default for ComposeText {
    fn default() -> Self {
        Self {
            text: String::new(),
            x: 0.0,
            y: 0.0,
            font_size: 24.0,
            font_weight: "bold".to_string(),
            font_family: "Arial".to_string(),
            color: "#ffffff".to_string(),
            stroke_width: 2.0,
            align: TextAlign::Left,
            line_height: 1.2,
            rotation: 0.0,
            scale: 1.0,
            opacity: 1.0,
            pivot: None,
        }
    }
}

/// How an image fills its box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    /// Stretch to the box.
    #[default]
    Fill,
    /// Keep aspect ratio, crop to the box.
    Cover,
}

/// An image element placed by its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeImage {
    /// Image source (data URI, path or URL).
    pub src: String,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
    /// Fit mode.
    pub fit: ImageFit,
    /// CSS filter functions, e.g. `grayscale(100%)`.
    pub filter: Option<String>,
    /// Clockwise rotation about the box center, in degrees.
    pub rotation: f32,
    /// Uniform scale about the box center.
    pub scale: f32,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f32,
}

impl Default for ComposeImage {
    fn default() -> Self {
        Self {
            src: String::new(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            fit: ImageFit::Fill,
            filter: None,
            rotation: 0.0,
            scale: 1.0,
            opacity: 1.0,
        }
    }
}

impl ComposeImage {
    fn transform(&self) -> Transform {
        let (cx, cy) = (self.x + self.width / 2.0, self.y + self.height / 2.0);
        Transform::from_translate(cx, cy)
            .pre_concat(Transform::from_rotate(self.rotation))
            .pre_scale(self.scale, self.scale)
            .pre_translate(-cx, -cy)
    }
}

/// A filled rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Fill color.
    pub color: String,
}

/// Elements sharing one transform and opacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeGroup {
    /// Members, painted in order.
    pub elements: Vec<ComposeElement>,
    /// Rotation/scale pivot.
    pub pivot: (f32, f32),
    /// Clockwise rotation in degrees.
    pub rotation: f32,
    /// Uniform scale.
    pub scale: f32,
    /// Opacity of the whole group in `0.0..=1.0`.
    pub opacity: f32,
}

impl Default for ComposeGroup {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            pivot: (0.0, 0.0),
            rotation: 0.0,
            scale: 1.0,
            opacity: 1.0,
        }
    }
}

impl ComposeGroup {
    fn transform(&self) -> Transform {
        let (px, py) = self.pivot;
        Transform::from_translate(px, py)
            .pre_concat(Transform::from_rotate(self.rotation))
            .pre_scale(self.scale, self.scale)
            .pre_translate(-px, -py)
    }
}

/// One drawing command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComposeElement {
    /// Text with optional outline.
    Text(ComposeText),
    /// Image.
    Image(ComposeImage),
    /// Solid rectangle.
    Rect(ComposeRect),
    /// Layered group.
    Group(ComposeGroup),
}

/// A complete set of drawing commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Background painted first.
    #[serde(default)]
    pub background: Background,
    /// Elements painted in order.
    #[serde(default)]
    pub elements: Vec<ComposeElement>,
}

impl Composition {
    /// Empty composition with the configured canvas size.
    #[must_use]
    pub fn new(config: &ComposerConfig, background: Background) -> Self {
        Self {
            width: config.width,
            height: config.height,
            background,
            elements: Vec::new(),
        }
    }

    /// Add an element.
    #[must_use]
    pub fn with_element(mut self, element: ComposeElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Preset template: the image stretched over the canvas with up to two
    /// outlined captions, the first near the top and the second near the
    /// bottom. Empty captions are skipped.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn preset(template: &str, captions: &[&str], config: &ComposerConfig) -> Self {
        let (width, height) = (config.width as f32, config.height as f32);
        let mut composition = Self::new(config, Background::default()).with_element(
            ComposeElement::Image(ComposeImage {
                src: template.to_string(),
                width,
                height,
                ..ComposeImage::default()
            }),
        );
        for (index, caption) in captions.iter().take(2).enumerate() {
            if caption.is_empty() {
                continue;
            }
            let y = if index == 0 { 60.0 } else { height - 40.0 };
            composition.elements.push(ComposeElement::Text(ComposeText {
                text: (*caption).to_string(),
                x: width / 2.0,
                y,
                font_size: config.preset_font_size,
                font_weight: "bold".to_string(),
                font_family: config.preset_font_family.clone(),
                color: config.preset_text_color.clone(),
                stroke_width: config.preset_stroke_width,
                align: TextAlign::Center,
                ..ComposeText::default()
            }));
        }
        composition
    }

    /// Project a document onto drawing commands at the template's natural
    /// size. Geometry matches what the live renderer lays out, so both
    /// export strategies agree without any style reconciliation.
    #[must_use]
    pub fn from_document(doc: &Document, natural: (u32, u32), canvas: &CanvasConfig) -> Self {
        let layout = MemeLayout::compute(doc, canvas, natural);
        let (width, height) = layout.pixel_size();

        let filter = Some(doc.image_filter().trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        let mut elements = vec![ComposeElement::Image(ComposeImage {
            src: doc.template().to_string(),
            x: 0.0,
            y: layout.image_top,
            width: layout.width,
            height: layout.image_height,
            filter,
            ..ComposeImage::default()
        })];

        // Captions are exported above overlays.
        for image in doc.images() {
            let (w, h) = image.scaled_size();
            let (w, h) = (w * layout.unit, h * layout.unit);
            let (cx, cy) = layout.image_point(image.x, image.y);
            elements.push(ComposeElement::Image(ComposeImage {
                src: image.src.clone(),
                x: cx - w / 2.0,
                y: cy - h / 2.0,
                width: w,
                height: h,
                fit: ImageFit::Cover,
                filter: None,
                rotation: f32::from(image.rotation),
                scale: 1.0,
                opacity: image.opacity_fraction(),
            }));
        }

        for text in doc.regular_texts().filter(|t| !t.is_placeholder()) {
            let block = layout.text_block(&text.text, text, canvas);
            let (cx, cy) = layout.image_point(text.x, text.y);
            let pad_v = canvas.text_padding.0 * layout.unit;
            elements.push(ComposeElement::Text(ComposeText {
                text: block.lines.join("\n"),
                x: cx,
                y: cy - block.height / 2.0 + pad_v + block.first_baseline(),
                font_size: block.font_px,
                font_weight: canvas.text_font_weight.clone(),
                line_height: canvas.line_height,
                align: TextAlign::Center,
                pivot: Some((cx, cy)),
                ..text_paint(text)
            }));
        }

        // Bars follow the image area in paint order, so a rotated bar
        // covers the template.
        for (text, bar) in [
            (doc.header(), layout.header.as_ref()),
            (doc.footer(), layout.footer.as_ref()),
        ] {
            if let (Some(text), Some(bar)) = (text, bar) {
                elements.push(ComposeElement::Group(bar_group(text, bar, &layout, canvas)));
            }
        }

        Self {
            width,
            height,
            background: Background::Color("transparent".to_string()),
            elements,
        }
    }
}

/// A header or footer bar: background, border and text, rotated, scaled
/// and faded as one about the bar's center.
fn bar_group(
    text: &TextElement,
    bar: &BarLayout,
    layout: &MemeLayout,
    canvas: &CanvasConfig,
) -> ComposeGroup {
    let is_header = bar.top < layout.image_top;
    let border_y = if is_header {
        bar.top + bar.block.height
    } else {
        bar.top
    };
    let text_top = if is_header { bar.top } else { bar.top + bar.border };
    let pad = (canvas.bar_padding.0 * layout.unit, canvas.bar_padding.1 * layout.unit);
    let x = match canvas.bar_align {
        TextAlign::Left => pad.1,
        TextAlign::Center => layout.width / 2.0,
        TextAlign::Right => layout.width - pad.1,
    };

    let elements = vec![
        ComposeElement::Rect(ComposeRect {
            x: 0.0,
            y: bar.top,
            width: layout.width,
            height: bar.height(),
            color: "#ffffff".to_string(),
        }),
        ComposeElement::Rect(ComposeRect {
            x: 0.0,
            y: border_y,
            width: layout.width,
            height: bar.border,
            color: "#000000".to_string(),
        }),
        ComposeElement::Text(ComposeText {
            text: bar.block.lines.join("\n"),
            x,
            y: text_top + pad.0 + bar.block.first_baseline(),
            font_size: bar.block.font_px,
            font_weight: canvas.bar_font_weight.clone(),
            line_height: canvas.line_height,
            align: canvas.bar_align,
            rotation: 0.0,
            scale: 1.0,
            opacity: 1.0,
            ..text_paint(text)
        }),
    ];
    ComposeGroup {
        elements,
        pivot: (layout.width / 2.0, bar.top + bar.height() / 2.0),
        rotation: f32::from(text.rotation),
        scale: text.scale,
        opacity: text.opacity_fraction(),
    }
}

fn text_paint(text: &TextElement) -> ComposeText {
    ComposeText {
        font_family: text.font_family.clone(),
        color: text.color.clone(),
        stroke_width: 0.0,
        rotation: f32::from(text.rotation),
        scale: text.scale,
        opacity: text.opacity_fraction(),
        ..ComposeText::default()
    }
}

/// Paints compositions onto pixmaps.
#[derive(Clone)]
pub struct DirectComposer {
    loader: Arc<dyn ImageLoader>,
    fontdb: Arc<fontdb::Database>,
    config: ComposerConfig,
}

impl std::fmt::Debug for DirectComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectComposer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DirectComposer {
    /// Create a composer.
    #[must_use]
    pub fn new(
        loader: Arc<dyn ImageLoader>,
        fontdb: Arc<fontdb::Database>,
        config: ComposerConfig,
    ) -> Self {
        Self {
            loader,
            fontdb,
            config,
        }
    }

    /// Composer settings.
    #[must_use]
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Paint `composition` onto a new pixmap.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Rasterization`] if the canvas cannot be
    /// allocated or a text element cannot be laid out.
    pub async fn compose(&self, composition: &Composition) -> RenderResult<tiny_skia::Pixmap> {
        let mut pixmap = canvas(composition.width, composition.height)?;
        self.paint_background(&mut pixmap, &composition.background)
            .await;
        let skipped = self
            .paint_elements(&mut pixmap, &composition.elements)
            .await?;
        tracing::debug!(
            width = composition.width,
            height = composition.height,
            elements = composition.elements.len(),
            skipped,
            "Composition painted"
        );
        Ok(pixmap)
    }

    /// Paint `elements` in order; returns how many images were skipped.
    async fn paint_elements(
        &self,
        pixmap: &mut tiny_skia::Pixmap,
        elements: &[ComposeElement],
    ) -> RenderResult<usize> {
        let mut skipped = 0usize;
        for element in elements {
            match element {
                ComposeElement::Text(text) => self.paint_text(pixmap, text)?,
                ComposeElement::Image(image) => {
                    if let Err(e) = self.paint_image(pixmap, image).await {
                        tracing::warn!(src = %abbreviate(&image.src), error = %e, "Skipping image element");
                        skipped += 1;
                    }
                }
                ComposeElement::Rect(rect) => paint_rect(pixmap, rect),
                ComposeElement::Group(group) => skipped += self.paint_group(pixmap, group).await?,
            }
        }
        Ok(skipped)
    }

    fn paint_group<'a>(
        &'a self,
        pixmap: &'a mut tiny_skia::Pixmap,
        group: &'a ComposeGroup,
    ) -> Pin<Box<dyn Future<Output = RenderResult<usize>> + Send + 'a>> {
        Box::pin(async move {
            let mut layer = canvas(pixmap.width(), pixmap.height())?;
            let skipped = self.paint_elements(&mut layer, &group.elements).await?;
            let paint = PixmapPaint {
                opacity: group.opacity.clamp(0.0, 1.0),
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            };
            pixmap.draw_pixmap(0, 0, layer.as_ref(), &paint, group.transform(), None);
            Ok(skipped)
        })
    }

    #[allow(clippy::cast_precision_loss)]
    async fn paint_background(&self, pixmap: &mut tiny_skia::Pixmap, background: &Background) {
        let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
        match background {
            Background::Color(value) => {
                let color = parse_color(value).unwrap_or_else(|| {
                    tracing::warn!(value = %value, "Unknown background color, using white");
                    Color::WHITE
                });
                pixmap.fill(color.to_skia());
            }
            Background::Gradient(value) => {
                let shader = Gradient::parse(value).and_then(|g| g.shader(w, h));
                match (shader, Rect::from_xywh(0.0, 0.0, w, h)) {
                    (Some(shader), Some(rect)) => {
                        let paint = Paint {
                            shader,
                            ..Paint::default()
                        };
                        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                    }
                    _ => {
                        tracing::warn!(value = %value, "Invalid gradient, using white background");
                        pixmap.fill(tiny_skia::Color::WHITE);
                    }
                }
            }
            Background::Image(src) => {
                let image = ComposeImage {
                    src: src.clone(),
                    width: w,
                    height: h,
                    ..ComposeImage::default()
                };
                if let Err(e) = self.paint_image(pixmap, &image).await {
                    tracing::warn!(src = %abbreviate(src), error = %e, "Background image failed to load, using white background");
                    pixmap.fill(tiny_skia::Color::WHITE);
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    async fn paint_image(
        &self,
        pixmap: &mut tiny_skia::Pixmap,
        image: &ComposeImage,
    ) -> RenderResult<()> {
        let bytes = self.loader.fetch(&image.src).await?;
        let decoded = decode_pixmap(&bytes)?;

        if let Some(filter) = image.filter.as_deref() {
            return self.paint_filtered_image(pixmap, image, &bytes, filter);
        }

        let rect = Rect::from_xywh(image.x, image.y, image.width, image.height)
            .ok_or_else(|| RenderError::Rasterization("Empty image box".to_string()))?;
        let (iw, ih) = (decoded.width() as f32, decoded.height() as f32);
        let (sx, sy) = match image.fit {
            ImageFit::Fill => (image.width / iw, image.height / ih),
            ImageFit::Cover => {
                let s = (image.width / iw).max(image.height / ih);
                (s, s)
            }
        };
        let tx = image.x + (image.width - iw * sx) / 2.0;
        let ty = image.y + (image.height - ih * sy) / 2.0;
        let paint = Paint {
            shader: Pattern::new(
                decoded.as_ref(),
                SpreadMode::Pad,
                FilterQuality::Bilinear,
                image.opacity.clamp(0.0, 1.0),
                Transform::from_row(sx, 0.0, 0.0, sy, tx, ty),
            ),
            ..Paint::default()
        };
        pixmap.fill_rect(rect, &paint, image.transform(), None);
        Ok(())
    }

    fn paint_filtered_image(
        &self,
        pixmap: &mut tiny_skia::Pixmap,
        image: &ComposeImage,
        bytes: &[u8],
        filter: &str,
    ) -> RenderResult<()> {
        let aspect = match image.fit {
            ImageFit::Fill => "none",
            ImageFit::Cover => "xMidYMid slice",
        };
        let t = image.transform();
        let mut svg = svg_open(pixmap);
        let _ = write!(
            svg,
            "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"{aspect}\" filter=\"{}\" opacity=\"{}\" transform=\"matrix({} {} {} {} {} {})\" href=\"{}\"/></svg>",
            image.x,
            image.y,
            image.width,
            image.height,
            escape_xml(filter),
            image.opacity.clamp(0.0, 1.0),
            t.sx,
            t.ky,
            t.kx,
            t.sy,
            t.tx,
            t.ty,
            to_data_uri(bytes)
        );
        paint_svg(&svg, &self.fontdb, pixmap)
    }

    fn paint_text(&self, pixmap: &mut tiny_skia::Pixmap, text: &ComposeText) -> RenderResult<()> {
        if text.text.is_empty() {
            return Ok(());
        }
        let fill = parse_color(&text.color).unwrap_or(Color::WHITE);
        let stroke = parse_color(&self.config.stroke_color).unwrap_or(Color::BLACK);
        let (px, py) = text.pivot.unwrap_or((text.x, text.y));

        let mut svg = svg_open(pixmap);
        let _ = write!(
            svg,
            "<text font-size=\"{}\" font-family=\"{}, sans-serif\" font-weight=\"{}\" fill=\"{}\" fill-opacity=\"{}\" text-anchor=\"{}\" opacity=\"{}\" transform=\"translate({px} {py}) rotate({}) scale({}) translate({} {})\" xml:space=\"preserve\"",
            text.font_size,
            escape_xml(&text.font_family),
            escape_xml(&text.font_weight),
            fill.svg_rgb(),
            fill.alpha(),
            text.align.svg_anchor(),
            text.opacity.clamp(0.0, 1.0),
            text.rotation,
            text.scale,
            -px,
            -py
        );
        if text.stroke_width > 0.0 {
            let _ = write!(
                svg,
                " stroke=\"{}\" stroke-opacity=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"round\" paint-order=\"stroke\"",
                stroke.svg_rgb(),
                stroke.alpha(),
                text.stroke_width
            );
        }
        svg.push('>');
        let line_px = text.font_size * text.line_height;
        let mut y = text.y;
        for line in text.text.split('\n') {
            let _ = write!(
                svg,
                "<tspan x=\"{}\" y=\"{y}\">{}</tspan>",
                text.x,
                escape_xml(line)
            );
            y += line_px;
        }
        svg.push_str("</text></svg>");
        paint_svg(&svg, &self.fontdb, pixmap)
            .map_err(|e| RenderError::Rasterization(format!("Text element failed: {e}")))
    }
}

fn canvas(width: u32, height: u32) -> RenderResult<tiny_skia::Pixmap> {
    tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        RenderError::Rasterization(format!("Failed to create {width}x{height} canvas"))
    })
}

fn paint_rect(pixmap: &mut tiny_skia::Pixmap, rect: &ComposeRect) {
    let Some(area) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
        return;
    };
    let color = parse_color(&rect.color).unwrap_or(Color::BLACK);
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    pixmap.fill_rect(area, &paint, Transform::identity(), None);
}

fn svg_open(pixmap: &tiny_skia::Pixmap) -> String {
    let (w, h) = (pixmap.width(), pixmap.height());
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">"
    )
}

/// Data URIs are long; log only their head.
fn abbreviate(src: &str) -> &str {
    match src.char_indices().nth(64) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DefaultImageLoader;
    use async_trait::async_trait;

    struct NoImages;

    #[async_trait]
    impl ImageLoader for NoImages {
        async fn fetch(&self, src: &str) -> RenderResult<Vec<u8>> {
            Err(RenderError::Resource(format!("unavailable: {src}")))
        }
    }

    fn composer(loader: Arc<dyn ImageLoader>) -> DirectComposer {
        DirectComposer::new(
            loader,
            Arc::new(fontdb::Database::new()),
            ComposerConfig::default(),
        )
    }

    fn png_data_uri(w: u32, h: u32, rgba: [u8; 4]) -> String {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode png");
        to_data_uri(buf.get_ref())
    }

    fn flatten(elements: &[ComposeElement]) -> Vec<&ComposeElement> {
        let mut out = Vec::new();
        for element in elements {
            match element {
                ComposeElement::Group(group) => out.extend(flatten(&group.elements)),
                other => out.push(other),
            }
        }
        out
    }

    fn rgba(pixmap: &tiny_skia::Pixmap, x: u32, y: u32) -> [u8; 4] {
        let c = pixmap.pixel(x, y).expect("pixel").demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn test_background_classification() {
        assert_eq!(Background::parse("#ff0000"), Background::Color("#ff0000".to_string()));
        assert!(matches!(
            Background::parse("linear-gradient(90deg, red, blue)"),
            Background::Gradient(_)
        ));
        assert!(matches!(Background::parse("bg.png"), Background::Image(_)));
    }

    #[test]
    fn test_gradient_parsing() {
        let g = Gradient::parse("linear-gradient(45deg, #ff0000 0%, rgba(0, 0, 255, 0.5) 100%)")
            .expect("gradient");
        assert!((g.angle - 45.0).abs() < f32::EPSILON);
        assert_eq!(g.stops.len(), 2);
        assert_eq!(g.stops[1].1, Color::rgba(0, 0, 255, 128));

        let g = Gradient::parse("linear-gradient(to right, red, green, blue)").expect("gradient");
        assert!((g.angle - 90.0).abs() < f32::EPSILON);
        assert!((g.stops[1].0 - 0.5).abs() < f32::EPSILON);

        assert!(Gradient::parse("linear-gradient(red)").is_none());
    }

    #[test]
    fn test_gradient_endpoints_horizontal() {
        let g = Gradient::parse("linear-gradient(90deg, red, blue)").expect("gradient");
        let (start, end) = g.endpoints(200.0, 100.0);
        assert!(start.x.abs() < 1e-3 && (start.y - 50.0).abs() < 1e-3);
        assert!((end.x - 200.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_background_image_failure_falls_back_to_white() {
        let composition = Composition {
            width: 20,
            height: 10,
            background: Background::Image("missing.png".to_string()),
            elements: Vec::new(),
        };
        let pixmap = composer(Arc::new(NoImages))
            .compose(&composition)
            .await
            .expect("compose");
        assert_eq!(rgba(&pixmap, 5, 5), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn test_failed_image_element_is_skipped() {
        let composition = Composition {
            width: 20,
            height: 10,
            background: Background::Color("#000000".to_string()),
            elements: vec![ComposeElement::Image(ComposeImage {
                src: "missing.png".to_string(),
                ..ComposeImage::default()
            })],
        };
        let pixmap = composer(Arc::new(NoImages))
            .compose(&composition)
            .await
            .expect("compose");
        assert_eq!(rgba(&pixmap, 5, 5), [0, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_image_is_stretched_into_its_box() {
        let composition = Composition {
            width: 40,
            height: 40,
            background: Background::Color("#ffffff".to_string()),
            elements: vec![ComposeElement::Image(ComposeImage {
                src: png_data_uri(2, 2, [255, 0, 0, 255]),
                x: 10.0,
                y: 10.0,
                width: 20.0,
                height: 20.0,
                ..ComposeImage::default()
            })],
        };
        let pixmap = composer(Arc::new(DefaultImageLoader::new()))
            .compose(&composition)
            .await
            .expect("compose");
        assert_eq!(rgba(&pixmap, 20, 20), [255, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 5, 5), [255, 255, 255, 255]);
        assert_eq!(rgba(&pixmap, 35, 35), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn test_gradient_background() {
        let composition = Composition {
            width: 100,
            height: 10,
            background: Background::Gradient(
                "linear-gradient(90deg, #ff0000, #0000ff)".to_string(),
            ),
            elements: Vec::new(),
        };
        let pixmap = composer(Arc::new(NoImages))
            .compose(&composition)
            .await
            .expect("compose");
        let left = rgba(&pixmap, 1, 5);
        let right = rgba(&pixmap, 98, 5);
        assert!(left[0] > 200 && left[2] < 50);
        assert!(right[2] > 200 && right[0] < 50);
    }

    #[test]
    fn test_preset_layout() {
        let config = ComposerConfig::default();
        let composition = Composition::preset("t.png", &["TOP", "", "IGNORED"], &config);
        assert_eq!((composition.width, composition.height), (800, 600));
        // Template plus the one non-empty caption among the first two.
        assert_eq!(composition.elements.len(), 2);
        let ComposeElement::Text(top) = &composition.elements[1] else {
            panic!("expected text");
        };
        assert!((top.x - 400.0).abs() < f32::EPSILON);
        assert!((top.y - 60.0).abs() < f32::EPSILON);
        assert!((top.stroke_width - 3.0).abs() < f32::EPSILON);
        assert_eq!(top.align, TextAlign::Center);

        let both = Composition::preset("t.png", &["A", "B"], &config);
        let ComposeElement::Text(bottom) = &both.elements[2] else {
            panic!("expected text");
        };
        assert!((bottom.y - 560.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_document_skips_placeholders() {
        let mut doc = Document::new("t.png");
        doc.update_text(
            meme_core::ElementId(2),
            meme_core::TextPatch {
                text: Some(String::new()),
                ..meme_core::TextPatch::default()
            },
        )
        .expect("update");
        let composition = Composition::from_document(&doc, (512, 512), &CanvasConfig::default());
        let texts: Vec<_> = flatten(&composition.elements)
            .into_iter()
            .filter_map(|e| match e {
                ComposeElement::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect();
        // Header and footer only.
        assert_eq!(texts.len(), 2);
        assert!(composition.height > 512);
        assert_eq!(
            composition.background,
            Background::Color("transparent".to_string())
        );
    }

    #[test]
    fn test_from_document_groups_bars_with_their_transform() {
        let mut doc = Document::new("t.png");
        doc.update_text(
            meme_core::ElementId(1),
            meme_core::TextPatch {
                rotation: Some(90),
                opacity: Some(50),
                ..meme_core::TextPatch::default()
            },
        )
        .expect("update");
        let composition = Composition::from_document(&doc, (512, 512), &CanvasConfig::default());

        // Template first, bars last.
        assert!(matches!(composition.elements[0], ComposeElement::Image(_)));
        let groups: Vec<&ComposeGroup> = composition
            .elements
            .iter()
            .filter_map(|e| match e {
                ComposeElement::Group(g) => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(groups.len(), 2);
        assert!(matches!(
            composition.elements.last(),
            Some(ComposeElement::Group(_))
        ));

        let header = groups[0];
        assert!((header.rotation - 90.0).abs() < f32::EPSILON);
        assert!((header.opacity - 0.5).abs() < f32::EPSILON);
        assert!((header.pivot.0 - 256.0).abs() < f32::EPSILON);
        // The group carries the transform; members stay upright.
        for member in &header.elements {
            if let ComposeElement::Text(t) = member {
                assert!(t.rotation.abs() < f32::EPSILON);
                assert!((t.opacity - 1.0).abs() < f32::EPSILON);
            }
        }
        assert!(groups[1].rotation.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_group_is_rotated_about_its_pivot() {
        // A 40x10 bar across the top, turned upright about its center.
        let composition = Composition {
            width: 40,
            height: 40,
            background: Background::Color("#ffffff".to_string()),
            elements: vec![ComposeElement::Group(ComposeGroup {
                elements: vec![ComposeElement::Rect(ComposeRect {
                    x: 0.0,
                    y: 15.0,
                    width: 40.0,
                    height: 10.0,
                    color: "#000000".to_string(),
                })],
                pivot: (20.0, 20.0),
                rotation: 90.0,
                ..ComposeGroup::default()
            })],
        };
        let pixmap = composer(Arc::new(NoImages))
            .compose(&composition)
            .await
            .expect("compose");
        let [r, g, b, a] = rgba(&pixmap, 20, 3);
        assert!(r < 8 && g < 8 && b < 8 && a == 255, "{r} {g} {b} {a}");
        let [r, g, b, _] = rgba(&pixmap, 3, 20);
        assert!(r > 247 && g > 247 && b > 247, "{r} {g} {b}");
    }

    #[tokio::test]
    async fn test_group_opacity_applies_once() {
        let rect = |color: &str| {
            ComposeElement::Rect(ComposeRect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                color: color.to_string(),
            })
        };
        let composition = Composition {
            width: 10,
            height: 10,
            background: Background::Color("#ffffff".to_string()),
            elements: vec![ComposeElement::Group(ComposeGroup {
                elements: vec![rect("#ff0000"), rect("#000000")],
                opacity: 0.5,
                ..ComposeGroup::default()
            })],
        };
        let pixmap = composer(Arc::new(NoImages))
            .compose(&composition)
            .await
            .expect("compose");
        // Half black over white; the red underneath never shows.
        let [r, g, b, a] = rgba(&pixmap, 5, 5);
        assert_eq!(a, 255);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!((126..=129).contains(&r), "{r}");
    }

    #[test]
    fn test_from_document_carries_element_transforms() {
        let mut doc = Document::new("t.png");
        let id = doc.add_image(
            "s.png",
            meme_core::ImageSourceKind::Sticker,
            std::time::Instant::now(),
        );
        doc.update_image(
            id,
            meme_core::ImagePatch {
                rotation: Some(45),
                opacity: Some(50),
                ..meme_core::ImagePatch::default()
            },
        )
        .expect("update");
        let composition = Composition::from_document(&doc, (512, 512), &CanvasConfig::default());
        let overlay = composition
            .elements
            .iter()
            .find_map(|e| match e {
                ComposeElement::Image(i) if i.src == "s.png" => Some(i),
                _ => None,
            })
            .expect("overlay");
        assert!((overlay.rotation - 45.0).abs() < f32::EPSILON);
        assert!((overlay.opacity - 0.5).abs() < f32::EPSILON);
        assert_eq!(overlay.fit, ImageFit::Cover);
    }

    #[test]
    fn test_composition_json() {
        let json = r##"{
            "width": 800,
            "height": 600,
            "background": {"type": "color", "value": "#123456"},
            "elements": [
                {"type": "text", "text": "hi", "x": 10, "y": 34},
                {"type": "image", "src": "a.png", "x": 5, "y": 5}
            ]
        }"##;
        let composition: Composition = serde_json::from_str(json).expect("parse");
        let ComposeElement::Image(image) = &composition.elements[1] else {
            panic!("expected image");
        };
        assert!((image.width - 100.0).abs() < f32::EPSILON);
        let ComposeElement::Text(text) = &composition.elements[0] else {
            panic!("expected text");
        };
        assert!((text.stroke_width - 2.0).abs() < f32::EPSILON);
    }
}
