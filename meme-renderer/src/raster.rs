//! # Tree Rasterizer
//!
//! Paints a render tree into a bitmap. The tree is first written out as
//! SVG, then parsed by usvg and rendered with resvg onto a transparent
//! tiny-skia pixmap.
//!
//! Only inline style is honored. Editing affordances, `display: none`
//! and `visibility: hidden` subtrees are skipped. Within a parent,
//! children are placed in document order (static flow or absolute
//! `left`/`top`) and painted in ascending `z-index`, ties keeping
//! document order.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use usvg::fontdb;

use crate::error::{RenderError, RenderResult};
use crate::layout::TextBlock;
use crate::style::{
    parse_box, parse_color, parse_length, parse_px, parse_text_shadow, parse_transform, prop,
    transform_matrix, Color, TextAlign,
};
use crate::tree::RenderNode;

const DEFAULT_FONT_PX: f32 = 16.0;
const DEFAULT_LINE_HEIGHT: f32 = 1.2;
const FALLBACK_FAMILY: &str = "sans-serif";

/// Build a font database from system fonts and extra directories.
#[must_use]
pub fn font_database(load_system_fonts: bool, font_dirs: &[PathBuf]) -> Arc<fontdb::Database> {
    let mut db = fontdb::Database::new();
    if load_system_fonts {
        db.load_system_fonts();
    }
    for dir in font_dirs {
        db.load_fonts_dir(dir);
    }
    tracing::debug!(faces = db.len(), "Font database ready");
    Arc::new(db)
}

/// Parse an SVG document with the given fonts.
///
/// # Errors
///
/// Returns [`RenderError::Svg`] if the SVG cannot be parsed.
pub fn parse_svg(
    svg: &str,
    fontdb: &Arc<fontdb::Database>,
    resources_dir: Option<&Path>,
) -> RenderResult<usvg::Tree> {
    let mut opt = usvg::Options::default();
    opt.fontdb = Arc::clone(fontdb);
    opt.resources_dir = resources_dir.map(Path::to_path_buf);
    usvg::Tree::from_str(svg, &opt).map_err(|e| RenderError::Svg(e.to_string()))
}

/// Rasterize an SVG document onto a transparent pixmap of its own size.
///
/// # Errors
///
/// Returns [`RenderError::Svg`] if the SVG cannot be parsed and
/// [`RenderError::Rasterization`] if no pixmap can be allocated.
pub fn rasterize_svg(
    svg: &str,
    fontdb: &Arc<fontdb::Database>,
    resources_dir: Option<&Path>,
) -> RenderResult<tiny_skia::Pixmap> {
    let tree = parse_svg(svg, fontdb, resources_dir)?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        RenderError::Rasterization(format!(
            "Failed to create {}x{} pixmap",
            size.width(),
            size.height()
        ))
    })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Paint an SVG document over the existing content of `pixmap`.
///
/// # Errors
///
/// Returns [`RenderError::Svg`] if the SVG cannot be parsed.
pub fn paint_svg(
    svg: &str,
    fontdb: &Arc<fontdb::Database>,
    pixmap: &mut tiny_skia::Pixmap,
) -> RenderResult<()> {
    let tree = parse_svg(svg, fontdb, None)?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Ok(())
}

/// Write `root` as an SVG document of `width × height` output pixels.
///
/// Layout happens in tree pixels; `scale` maps them to output pixels.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_svg(root: &RenderNode, width: u32, height: u32, scale: f32) -> String {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let mut writer = SvgWriter {
        svg: String::with_capacity(8192),
    };
    let _ = write!(
        writer.svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    );
    let _ = write!(writer.svg, "<g transform=\"scale({scale})\">");
    if !is_hidden(root) {
        let viewport = (width as f32 / scale, height as f32 / scale);
        let size = box_size(root, viewport, false);
        writer.node(root, 0.0, 0.0, size);
    }
    writer.svg.push_str("</g></svg>");
    writer.svg
}

struct SvgWriter {
    svg: String,
}

impl SvgWriter {
    fn node(&mut self, node: &RenderNode, x: f32, y: f32, size: (f32, f32)) {
        let (w, h) = size;
        let ops = node
            .inline
            .get(prop::TRANSFORM)
            .map(parse_transform)
            .unwrap_or_default();
        let m = tiny_skia::Transform::from_translate(x, y).pre_concat(transform_matrix(&ops, w, h));
        let _ = write!(
            self.svg,
            "<g transform=\"matrix({} {} {} {} {} {})\"",
            m.sx, m.ky, m.kx, m.sy, m.tx, m.ty
        );
        let opacity = node
            .inline
            .get(prop::OPACITY)
            .and_then(|v| v.trim().parse::<f32>().ok())
            .map_or(1.0, |o| o.clamp(0.0, 1.0));
        if opacity < 1.0 {
            let _ = write!(self.svg, " opacity=\"{opacity}\"");
        }
        self.svg.push('>');

        let borders = Borders::of(node);
        self.background(node, w, h);
        self.borders(&borders, w, h);
        self.outline(node, w, h);
        if node.is_img() {
            self.image(node, w, h);
        }
        if let Some(text) = node.text.as_deref().filter(|t| !t.is_empty()) {
            self.text(node, text, w, h, &borders);
        }
        self.children(node, w, h);

        self.svg.push_str("</g>");
    }

    fn children(&mut self, node: &RenderNode, w: f32, h: f32) {
        let pad = padding(node);
        let content_w = (w - pad[1] - pad[3]).max(0.0);
        let mut cursor = pad[0] + Borders::of(node).top;

        let mut placed = Vec::new();
        for child in node.children.iter().filter(|c| !is_hidden(c)) {
            let (x, y, size) = if is_absolute(child) {
                let size = box_size(child, (w, h), true);
                let left = offset(child, prop::LEFT, w);
                let top = offset(child, prop::TOP, h);
                (left, top, size)
            } else {
                let size = box_size(child, (content_w, h), false);
                let y = cursor;
                cursor += size.1;
                (pad[3], y, size)
            };
            placed.push((z_index(child), child, x, y, size));
        }
        placed.sort_by_key(|p| p.0);
        for (_, child, x, y, size) in placed {
            self.node(child, x, y, size);
        }
    }

    fn background(&mut self, node: &RenderNode, w: f32, h: f32) {
        let Some(color) = node
            .inline
            .get(prop::BACKGROUND_COLOR)
            .and_then(parse_color)
            .filter(|c| !c.is_transparent())
        else {
            return;
        };
        let radius = node
            .inline
            .get(prop::BORDER_RADIUS)
            .and_then(parse_px)
            .unwrap_or(0.0);
        let _ = write!(
            self.svg,
            "<rect width=\"{w}\" height=\"{h}\" rx=\"{radius}\" fill=\"{}\" fill-opacity=\"{}\"/>",
            color.svg_rgb(),
            color.alpha()
        );
    }

    fn borders(&mut self, borders: &Borders, w: f32, h: f32) {
        if let Some(color) = borders.top_color {
            let _ = write!(
                self.svg,
                "<rect width=\"{w}\" height=\"{}\" fill=\"{}\" fill-opacity=\"{}\"/>",
                borders.top,
                color.svg_rgb(),
                color.alpha()
            );
        }
        if let Some(color) = borders.bottom_color {
            let _ = write!(
                self.svg,
                "<rect y=\"{}\" width=\"{w}\" height=\"{}\" fill=\"{}\" fill-opacity=\"{}\"/>",
                h - borders.bottom,
                borders.bottom,
                color.svg_rgb(),
                color.alpha()
            );
        }
    }

    fn outline(&mut self, node: &RenderNode, w: f32, h: f32) {
        let Some((width, color)) = node.inline.get(prop::OUTLINE).and_then(parse_border) else {
            return;
        };
        let _ = write!(
            self.svg,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{}\" stroke-opacity=\"{}\" stroke-width=\"{width}\"/>",
            -width / 2.0,
            -width / 2.0,
            w + width,
            h + width,
            color.svg_rgb(),
            color.alpha()
        );
    }

    fn image(&mut self, node: &RenderNode, w: f32, h: f32) {
        // A source dropped during inlining paints nothing.
        let Some(src) = node.src.as_deref().filter(|s| !s.is_empty()) else {
            return;
        };
        let aspect = match node.inline.get(prop::OBJECT_FIT).map(str::trim) {
            Some("cover") => "xMidYMid slice",
            Some("contain") => "xMidYMid meet",
            _ => "none",
        };
        let _ = write!(
            self.svg,
            "<image width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"{aspect}\" href=\"{}\"",
            escape_xml(src)
        );
        if let Some(filter) = node
            .inline
            .get(prop::FILTER)
            .map(str::trim)
            .filter(|f| !f.is_empty() && *f != "none")
        {
            let _ = write!(self.svg, " filter=\"{}\"", escape_xml(filter));
        }
        self.svg.push_str("/>");
    }

    fn text(&mut self, node: &RenderNode, text: &str, w: f32, h: f32, borders: &Borders) {
        let style = TextStyle::of(node);
        let pad = padding(node);
        let content_w = (w - pad[1] - pad[3]).max(0.0);
        let content_h = (h - borders.top - borders.bottom - pad[0] - pad[2]).max(0.0);
        let block = TextBlock::measure(
            text,
            style.font_px,
            style.line_height,
            (0.0, 0.0),
            style.wrap.then_some(content_w),
            0.0,
        );

        // Vertically centered in the content box.
        let top = borders.top + pad[0] + (content_h - block.height) / 2.0;
        let x = match style.align {
            TextAlign::Left => pad[3],
            TextAlign::Center => pad[3] + content_w / 2.0,
            TextAlign::Right => w - pad[1],
        };
        let baseline = top + block.first_baseline();

        if let Some(shadow) = node.inline.get(prop::TEXT_SHADOW).and_then(parse_text_shadow) {
            let _ = write!(
                self.svg,
                "<g transform=\"translate({} {})\"",
                shadow.dx, shadow.dy
            );
            if shadow.blur > 0.0 {
                let _ = write!(self.svg, " filter=\"blur({}px)\"", shadow.blur / 2.0);
            }
            self.svg.push('>');
            self.text_lines(&style, shadow.color, &block, x, baseline);
            self.svg.push_str("</g>");
        }
        self.text_lines(&style, style.color, &block, x, baseline);
    }

    fn text_lines(&mut self, style: &TextStyle, color: Color, block: &TextBlock, x: f32, baseline: f32) {
        let _ = write!(
            self.svg,
            "<text font-size=\"{}\" font-family=\"{}\" font-weight=\"{}\" fill=\"{}\" fill-opacity=\"{}\" text-anchor=\"{}\" xml:space=\"preserve\">",
            style.font_px,
            escape_xml(&style.family),
            escape_xml(&style.weight),
            color.svg_rgb(),
            color.alpha(),
            style.align.svg_anchor()
        );
        let mut y = baseline;
        for line in &block.lines {
            let _ = write!(
                self.svg,
                "<tspan x=\"{x}\" y=\"{y}\">{}</tspan>",
                escape_xml(line)
            );
            y += block.line_px;
        }
        self.svg.push_str("</text>");
    }
}

/// Text styling resolved from inline style.
struct TextStyle {
    font_px: f32,
    line_height: f32,
    family: String,
    weight: String,
    color: Color,
    align: TextAlign,
    wrap: bool,
}

impl TextStyle {
    fn of(node: &RenderNode) -> Self {
        let font_px = node
            .inline
            .get(prop::FONT_SIZE)
            .and_then(parse_px)
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_FONT_PX);
        let line_height = node
            .inline
            .get(prop::LINE_HEIGHT)
            .map(str::trim)
            .and_then(|v| match v.strip_suffix("px") {
                Some(px) => px.trim().parse::<f32>().ok().map(|px| px / font_px),
                None => v.parse().ok(),
            })
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_LINE_HEIGHT);
        let family = node
            .inline
            .get(prop::FONT_FAMILY)
            .map_or_else(
                || FALLBACK_FAMILY.to_string(),
                |f| format!("{f}, {FALLBACK_FAMILY}"),
            );
        Self {
            font_px,
            line_height,
            family,
            weight: node
                .inline
                .get(prop::FONT_WEIGHT)
                .unwrap_or("normal")
                .to_string(),
            color: node
                .inline
                .get(prop::COLOR)
                .and_then(parse_color)
                .unwrap_or(Color::BLACK),
            align: node
                .inline
                .get(prop::TEXT_ALIGN)
                .map_or(TextAlign::Left, TextAlign::parse),
            wrap: !matches!(node.inline.get(prop::WHITE_SPACE), Some("pre" | "nowrap")),
        }
    }
}

#[derive(Debug, Default)]
struct Borders {
    top: f32,
    top_color: Option<Color>,
    bottom: f32,
    bottom_color: Option<Color>,
}

impl Borders {
    fn of(node: &RenderNode) -> Self {
        let mut borders = Self::default();
        if let Some((w, c)) = node.inline.get(prop::BORDER_TOP).and_then(parse_border) {
            borders.top = w;
            borders.top_color = Some(c);
        }
        if let Some((w, c)) = node.inline.get(prop::BORDER_BOTTOM).and_then(parse_border) {
            borders.bottom = w;
            borders.bottom_color = Some(c);
        }
        borders
    }
}

/// Parse `2px solid #000` into width and color. `none` and zero widths yield `None`.
fn parse_border(value: &str) -> Option<(f32, Color)> {
    let mut width = None;
    let mut color = Color::BLACK;
    let mut rest = value.trim();
    while !rest.is_empty() {
        let end = if rest.starts_with("rgb") {
            rest.find(')').map_or(rest.len(), |i| i + 1)
        } else {
            rest.find(char::is_whitespace).unwrap_or(rest.len())
        };
        let token = &rest[..end];
        if token == "none" {
            return None;
        }
        if let Some(w) = parse_px(token) {
            width = Some(w);
        } else if let Some(c) = parse_color(token) {
            color = c;
        }
        rest = rest[end..].trim_start();
    }
    width.filter(|w| *w > 0.0).map(|w| (w, color))
}

fn padding(node: &RenderNode) -> [f32; 4] {
    node.inline
        .get(prop::PADDING)
        .and_then(parse_box)
        .unwrap_or_default()
}

fn is_hidden(node: &RenderNode) -> bool {
    node.is_editor_affordance()
        || node.inline.get(prop::DISPLAY).map(str::trim) == Some("none")
        || node.inline.get(prop::VISIBILITY).map(str::trim) == Some("hidden")
}

fn is_absolute(node: &RenderNode) -> bool {
    matches!(
        node.inline.get(prop::POSITION).map(str::trim),
        Some("absolute" | "fixed")
    )
}

fn fills_parent(node: &RenderNode) -> bool {
    node.inline.get(prop::INSET).and_then(parse_px) == Some(0.0)
}

fn offset(node: &RenderNode, name: &str, base: f32) -> f32 {
    node.inline
        .get(name)
        .and_then(parse_length)
        .map_or(0.0, |l| l.resolve(base))
}

fn z_index(node: &RenderNode) -> i32 {
    node.inline
        .get(prop::Z_INDEX)
        .and_then(|z| z.trim().parse().ok())
        .unwrap_or(0)
}

/// Border-box size of `node` inside a containing block of `container` size.
fn box_size(node: &RenderNode, container: (f32, f32), absolute: bool) -> (f32, f32) {
    let explicit = |name: &str, base: f32| {
        node.inline
            .get(name)
            .and_then(parse_length)
            .map(|l| l.resolve(base))
    };
    let fill = absolute && fills_parent(node);
    let text = node.text.as_deref().filter(|t| !t.is_empty());
    let pad = padding(node);
    let borders = Borders::of(node);

    let width = explicit(prop::WIDTH, container.0)
        .or_else(|| fill.then_some(container.0))
        .unwrap_or_else(|| match (absolute, text) {
            (true, Some(text)) => {
                let style = TextStyle::of(node);
                let min_width = node
                    .inline
                    .get(prop::MIN_WIDTH)
                    .and_then(parse_px)
                    .unwrap_or(0.0);
                TextBlock::measure(
                    text,
                    style.font_px,
                    style.line_height,
                    (pad[0], pad[1]),
                    None,
                    min_width,
                )
                .width
            }
            (true, None) => 0.0,
            (false, _) => container.0,
        });

    let height = explicit(prop::HEIGHT, container.1)
        .or_else(|| fill.then_some(container.1))
        .unwrap_or_else(|| {
            let content = if let Some(text) = text {
                let style = TextStyle::of(node);
                let content_w = (width - pad[1] - pad[3]).max(0.0);
                TextBlock::measure(
                    text,
                    style.font_px,
                    style.line_height,
                    (0.0, 0.0),
                    style.wrap.then_some(content_w),
                    0.0,
                )
                .height
            } else {
                let content_w = (width - pad[1] - pad[3]).max(0.0);
                node.children
                    .iter()
                    .filter(|c| !is_hidden(c) && !is_absolute(c))
                    .map(|c| box_size(c, (content_w, container.1), false).1)
                    .sum()
            };
            content + pad[0] + pad[2] + borders.top + borders.bottom
        });

    (width.max(0.0), height.max(0.0))
}

/// Escape special XML characters.
pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
