//! Meme layout metrics and text measurement.
//!
//! Shared by the live renderer, the rasterizer's auto-sizing and the
//! direct composer, so all three agree on where text lands.
//!
//! Typography is defined against a base layout width: at a template
//! width of `base_layout_width` one font unit is one pixel, and all
//! lengths scale linearly with the template's natural width.

use meme_core::{Document, TextElement};
use serde::{Deserialize, Serialize};

use crate::style::TextAlign;

/// Average glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f32 = 0.6;

/// Styling for the live meme canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Header/footer padding `(vertical, horizontal)` in layout pixels.
    pub bar_padding: (f32, f32),
    /// Header/footer text alignment.
    pub bar_align: TextAlign,
    /// Header/footer separator border width.
    pub bar_border_width: f32,
    /// Header/footer font-size multiplier.
    pub bar_font_multiplier: f32,
    /// Header/footer font weight.
    pub bar_font_weight: String,
    /// Regular text font-size multiplier.
    pub text_font_multiplier: f32,
    /// Regular text font weight.
    pub text_font_weight: String,
    /// Regular text padding `(vertical, horizontal)`.
    pub text_padding: (f32, f32),
    /// Regular text minimum width.
    pub text_min_width: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    /// Template width at which one layout unit is one pixel.
    pub base_layout_width: f32,
    /// Container margin `[top, right, bottom, left]`.
    pub container_margin: [f32; 4],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            bar_padding: (3.0, 5.0),
            bar_align: TextAlign::Left,
            bar_border_width: 2.0,
            bar_font_multiplier: 0.4,
            bar_font_weight: "900".to_string(),
            text_font_multiplier: 0.4,
            text_font_weight: "900".to_string(),
            text_padding: (4.0, 8.0),
            text_min_width: 60.0,
            line_height: 1.2,
            base_layout_width: 512.0,
            container_margin: [16.0, 0.0, 16.0, 0.0],
        }
    }
}

/// Width of one line of text.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn measure_line(line: &str, font_px: f32) -> f32 {
    line.chars().count() as f32 * font_px * GLYPH_ADVANCE
}

/// Split text into lines.
///
/// Explicit newlines always break. With `wrap`, words are also packed
/// greedily into `max_width`; a single word wider than that stays whole.
#[must_use]
pub fn wrap_lines(text: &str, font_px: f32, max_width: Option<f32>) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let Some(max_width) = max_width else {
            lines.push(raw.to_string());
            continue;
        };
        let mut current = String::new();
        for word in raw.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if !current.is_empty() && measure_line(&candidate, font_px) > max_width {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

/// Measured text block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Lines after wrapping.
    pub lines: Vec<String>,
    /// Font size in pixels.
    pub font_px: f32,
    /// Line box height in pixels.
    pub line_px: f32,
    /// Border-box width.
    pub width: f32,
    /// Border-box height.
    pub height: f32,
}

impl TextBlock {
    /// Measure `text` with padding `(vertical, horizontal)`.
    ///
    /// With `fixed_width`, lines wrap to the content width and the block
    /// takes that width; otherwise it shrinks to fit, but not below `min_width`.
    #[must_use]
    pub fn measure(
        text: &str,
        font_px: f32,
        line_height: f32,
        padding: (f32, f32),
        fixed_width: Option<f32>,
        min_width: f32,
    ) -> Self {
        let content_limit = fixed_width.map(|w| (w - 2.0 * padding.1).max(0.0));
        let lines = wrap_lines(text, font_px, content_limit);
        let line_px = font_px * line_height;
        let widest = lines
            .iter()
            .map(|l| measure_line(l, font_px))
            .fold(0.0_f32, f32::max);
        let width = fixed_width.unwrap_or_else(|| (widest + 2.0 * padding.1).max(min_width));
        #[allow(clippy::cast_precision_loss)]
        let height = lines.len() as f32 * line_px + 2.0 * padding.0;
        Self {
            lines,
            font_px,
            line_px,
            width,
            height,
        }
    }

    /// Baseline offset of the first line from the content top.
    #[must_use]
    pub fn first_baseline(&self) -> f32 {
        (self.line_px - self.font_px) / 2.0 + self.font_px * 0.8
    }
}

/// Placement of a header or footer bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLayout {
    /// Top edge in canvas pixels.
    pub top: f32,
    /// Measured text block (width is the canvas width).
    pub block: TextBlock,
    /// Border width in pixels.
    pub border: f32,
}

impl BarLayout {
    /// Total bar height including the border.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.block.height + self.border
    }
}

/// Resolved geometry of a document at a given template size.
#[derive(Debug, Clone, PartialEq)]
pub struct MemeLayout {
    /// Pixels per layout unit.
    pub unit: f32,
    /// Canvas width (template natural width).
    pub width: f32,
    /// Header bar, if shown.
    pub header: Option<BarLayout>,
    /// Top of the image area.
    pub image_top: f32,
    /// Image area height (template natural height).
    pub image_height: f32,
    /// Footer bar, if shown.
    pub footer: Option<BarLayout>,
    /// Canvas height.
    pub height: f32,
}

impl MemeLayout {
    /// Lay out `doc` for a template of `natural` size.
    ///
    /// Bars are only shown when their text is non-empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(doc: &Document, config: &CanvasConfig, natural: (u32, u32)) -> Self {
        let width = natural.0.max(1) as f32;
        let image_height = natural.1.max(1) as f32;
        let unit = width / config.base_layout_width.max(1.0);

        let header = doc
            .header()
            .filter(|t| !t.text.is_empty())
            .map(|t| bar_layout(t, config, unit, width, 0.0));
        let image_top = header.as_ref().map_or(0.0, BarLayout::height);
        let footer = doc
            .footer()
            .filter(|t| !t.text.is_empty())
            .map(|t| bar_layout(t, config, unit, width, image_top + image_height));
        let height = image_top + image_height + footer.as_ref().map_or(0.0, BarLayout::height);

        Self {
            unit,
            width,
            header,
            image_top,
            image_height,
            footer,
            height,
        }
    }

    /// Font size of a bar in pixels.
    #[must_use]
    pub fn bar_font_px(&self, text: &TextElement, config: &CanvasConfig) -> f32 {
        text.font_size * config.bar_font_multiplier * self.unit
    }

    /// Font size of a regular text element in pixels.
    #[must_use]
    pub fn text_font_px(&self, text: &TextElement, config: &CanvasConfig) -> f32 {
        text.font_size * config.text_font_multiplier * self.unit
    }

    /// Measured block of a regular text element.
    #[must_use]
    pub fn text_block(&self, content: &str, text: &TextElement, config: &CanvasConfig) -> TextBlock {
        TextBlock::measure(
            content,
            self.text_font_px(text, config),
            config.line_height,
            (config.text_padding.0 * self.unit, config.text_padding.1 * self.unit),
            None,
            config.text_min_width * self.unit,
        )
    }

    /// Canvas point for a percentage position inside the image area.
    #[must_use]
    pub fn image_point(&self, x_percent: f32, y_percent: f32) -> (f32, f32) {
        (
            self.width * x_percent / 100.0,
            self.image_top + self.image_height * y_percent / 100.0,
        )
    }

    /// Canvas size rounded to whole pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

fn bar_layout(
    text: &TextElement,
    config: &CanvasConfig,
    unit: f32,
    width: f32,
    top: f32,
) -> BarLayout {
    let font_px = text.font_size * config.bar_font_multiplier * unit;
    let block = TextBlock::measure(
        &text.text,
        font_px,
        config.line_height,
        (config.bar_padding.0 * unit, config.bar_padding.1 * unit),
        Some(width),
        0.0,
    );
    BarLayout {
        top,
        block,
        border: config.bar_border_width * unit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meme_core::{ElementId, TextPatch};

    #[test]
    fn test_wrap_respects_newlines() {
        let lines = wrap_lines("a\nb c", 10.0, None);
        assert_eq!(lines, vec!["a", "b c"]);
    }

    #[test]
    fn test_wrap_packs_words() {
        // Each char is 6px at 10px font; 30px fits five chars.
        let lines = wrap_lines("aa bb cc", 10.0, Some(30.0));
        assert_eq!(lines, vec!["aa bb", "cc"]);
    }

    #[test]
    fn test_min_width() {
        let block = TextBlock::measure("a", 10.0, 1.2, (0.0, 0.0), None, 60.0);
        assert!((block.width - 60.0).abs() < f32::EPSILON);
        assert!((block.height - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_layout_without_bars_is_natural_size() {
        let mut doc = Document::new("t.png");
        for id in [1, 3] {
            doc.update_text(
                ElementId(id),
                TextPatch {
                    text: Some(String::new()),
                    ..TextPatch::default()
                },
            )
            .expect("update");
        }
        let layout = MemeLayout::compute(&doc, &CanvasConfig::default(), (500, 400));
        assert_eq!(layout.pixel_size(), (500, 400));
        assert!(layout.header.is_none());
    }

    #[test]
    fn test_bars_extend_canvas() {
        let doc = Document::new("t.png");
        let layout = MemeLayout::compute(&doc, &CanvasConfig::default(), (512, 512));
        let header = layout.header.as_ref().expect("header");

        // 28 * 0.4 = 11.2px font, one line of 13.44px, 3px padding twice, 2px border.
        assert!((header.height() - (11.2 * 1.2 + 6.0 + 2.0)).abs() < 1e-3);
        assert!((layout.image_top - header.height()).abs() < f32::EPSILON);
        assert!(layout.height > 512.0 + 2.0 * header.height() - 1e-3);
    }

    #[test]
    fn test_image_point() {
        let doc = Document::new("t.png");
        let layout = MemeLayout::compute(&doc, &CanvasConfig::default(), (200, 100));
        let (x, y) = layout.image_point(50.0, 50.0);
        assert!((x - 100.0).abs() < f32::EPSILON);
        assert!((y - (layout.image_top + 50.0)).abs() < 1e-4);
    }
}
