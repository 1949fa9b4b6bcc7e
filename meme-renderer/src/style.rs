//! CSS-like style values.
//!
//! Only the subset the meme render tree uses: pixel/percent lengths, box
//! shorthands, colors, transform lists and text shadows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Style property names.
pub mod prop {
    #![allow(missing_docs)]
    pub const POSITION: &str = "position";
    pub const DISPLAY: &str = "display";
    pub const VISIBILITY: &str = "visibility";
    pub const LEFT: &str = "left";
    pub const TOP: &str = "top";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const MIN_WIDTH: &str = "min-width";
    pub const MARGIN: &str = "margin";
    pub const PADDING: &str = "padding";
    pub const TRANSFORM: &str = "transform";
    pub const FONT_SIZE: &str = "font-size";
    pub const FONT_FAMILY: &str = "font-family";
    pub const FONT_WEIGHT: &str = "font-weight";
    pub const COLOR: &str = "color";
    pub const TEXT_ALIGN: &str = "text-align";
    pub const TEXT_SHADOW: &str = "text-shadow";
    pub const LINE_HEIGHT: &str = "line-height";
    pub const WHITE_SPACE: &str = "white-space";
    pub const BACKGROUND_COLOR: &str = "background-color";
    pub const BORDER_RADIUS: &str = "border-radius";
    pub const BORDER_TOP: &str = "border-top";
    pub const BORDER_BOTTOM: &str = "border-bottom";
    pub const OPACITY: &str = "opacity";
    pub const Z_INDEX: &str = "z-index";
    pub const FILTER: &str = "filter";
    pub const OBJECT_FIT: &str = "object-fit";
    pub const OUTLINE: &str = "outline";
    pub const INSET: &str = "inset";
}

/// An ordered property → value map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleMap(BTreeMap<String, String>);

impl StyleMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Set a property value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Builder form of [`StyleMap::set`].
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove a property.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Whether a property is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no properties are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Format a pixel length.
#[must_use]
pub fn px(value: f32) -> String {
    format!("{}px", round2(value))
}

/// Format a percentage.
#[must_use]
pub fn percent(value: f32) -> String {
    format!("{}%", round2(value))
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// A CSS length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    /// Absolute pixels.
    Px(f32),
    /// Percentage of a reference length.
    Percent(f32),
}

impl Length {
    /// Resolve against `base` (used for percentages).
    #[must_use]
    pub fn resolve(self, base: f32) -> f32 {
        match self {
            Self::Px(v) => v,
            Self::Percent(p) => base * p / 100.0,
        }
    }
}

/// Parse `12px`, `50%` or a bare number (pixels).
#[must_use]
pub fn parse_length(value: &str) -> Option<Length> {
    let value = value.trim();
    if let Some(p) = value.strip_suffix('%') {
        return p.trim().parse().ok().map(Length::Percent);
    }
    let number = value.strip_suffix("px").unwrap_or(value);
    number.trim().parse().ok().map(Length::Px)
}

/// Parse a pixel-only length. `auto` and percentages yield `None`.
#[must_use]
pub fn parse_px(value: &str) -> Option<f32> {
    match parse_length(value)? {
        Length::Px(v) => Some(v),
        Length::Percent(_) => None,
    }
}

/// Parse a box shorthand (`padding`, `margin`) into `[top, right, bottom, left]`.
#[must_use]
pub fn parse_box(value: &str) -> Option<[f32; 4]> {
    let parts: Vec<f32> = value
        .split_whitespace()
        .map(parse_px)
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [a] => Some([*a, *a, *a, *a]),
        [v, h] => Some([*v, *h, *v, *h]),
        [t, h, b] => Some([*t, *h, *b, *h]),
        [t, r, b, l] => Some([*t, *r, *b, *l]),
        _ => None,
    }
}

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color with alpha.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Whether the color is fully transparent.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// `rgb(r,g,b)` without alpha, for SVG `fill`.
    #[must_use]
    pub fn svg_rgb(self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    /// Alpha as `0.0..=1.0`, for SVG `*-opacity`.
    #[must_use]
    pub fn alpha(self) -> f32 {
        f32::from(self.a) / 255.0
    }

    /// Convert to a tiny-skia color.
    #[must_use]
    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()` or a named color.
#[must_use]
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args);
    }
    let named = match value.as_str() {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "transparent" => Color::TRANSPARENT,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        "yellow" => Color::rgb(255, 255, 0),
        "orange" => Color::rgb(255, 165, 0),
        "purple" => Color::rgb(128, 0, 128),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        _ => return None,
    };
    Some(named)
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..=i)?, 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    let channel = |s: &str| -> Option<u8> {
        let v: f32 = s.trim().parse().ok()?;
        Some(v.clamp(0.0, 255.0).round() as u8)
    };
    let alpha = |s: &str| -> Option<u8> {
        let s = s.trim();
        let v: f32 = match s.strip_suffix('%') {
            Some(p) => p.parse::<f32>().ok()? / 100.0,
            None => s.parse().ok()?,
        };
        Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
    };
    match parts.as_slice() {
        [r, g, b] => Some(Color::rgb(channel(r)?, channel(g)?, channel(b)?)),
        [r, g, b, a] => Some(Color::rgba(channel(r)?, channel(g)?, channel(b)?, alpha(a)?)),
        _ => None,
    }
}

/// One function of a `transform` list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    /// `translate(x, y)`; percentages refer to the element's own box.
    Translate(Length, Length),
    /// `rotate(a)` in degrees, clockwise.
    Rotate(f32),
    /// `scale(sx, sy)`.
    Scale(f32, f32),
}

/// Parse a transform list such as `translate(-50%, -50%) rotate(15deg) scale(1.2)`.
///
/// Unknown functions are skipped.
#[must_use]
pub fn parse_transform(value: &str) -> Vec<TransformOp> {
    let mut ops = Vec::new();
    for func in value.split(')') {
        let Some((name, args)) = func.split_once('(') else {
            continue;
        };
        let args: Vec<&str> = args
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        let op = match (name.trim(), args.as_slice()) {
            ("translate", [x]) => parse_length(x).map(|x| TransformOp::Translate(x, Length::Px(0.0))),
            ("translate", [x, y]) => parse_length(x)
                .zip(parse_length(y))
                .map(|(x, y)| TransformOp::Translate(x, y)),
            ("translateX", [x]) => parse_length(x).map(|x| TransformOp::Translate(x, Length::Px(0.0))),
            ("translateY", [y]) => parse_length(y).map(|y| TransformOp::Translate(Length::Px(0.0), y)),
            ("rotate", [a]) => parse_angle(a).map(TransformOp::Rotate),
            ("scale", [s]) => s.parse().ok().map(|s| TransformOp::Scale(s, s)),
            ("scale", [sx, sy]) => sx
                .parse()
                .ok()
                .zip(sy.parse().ok())
                .map(|(sx, sy)| TransformOp::Scale(sx, sy)),
            _ => None,
        };
        if let Some(op) = op {
            ops.push(op);
        }
    }
    ops
}

fn parse_angle(value: &str) -> Option<f32> {
    let value = value.trim();
    if let Some(deg) = value.strip_suffix("deg") {
        return deg.parse().ok();
    }
    if let Some(turn) = value.strip_suffix("turn") {
        return turn.parse::<f32>().ok().map(|t| t * 360.0);
    }
    if let Some(rad) = value.strip_suffix("rad") {
        return rad.parse::<f32>().ok().map(f32::to_degrees);
    }
    value.parse().ok()
}

/// Matrix for a transform list applied around the center of a `width × height` box.
#[must_use]
pub fn transform_matrix(ops: &[TransformOp], width: f32, height: f32) -> tiny_skia::Transform {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let mut matrix = tiny_skia::Transform::from_translate(cx, cy);
    for op in ops {
        let step = match *op {
            TransformOp::Translate(x, y) => {
                tiny_skia::Transform::from_translate(x.resolve(width), y.resolve(height))
            }
            TransformOp::Rotate(deg) => tiny_skia::Transform::from_rotate(deg),
            TransformOp::Scale(sx, sy) => tiny_skia::Transform::from_scale(sx, sy),
        };
        matrix = matrix.pre_concat(step);
    }
    matrix.pre_translate(-cx, -cy)
}

/// First shadow of a `text-shadow` value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextShadow {
    /// Horizontal offset.
    pub dx: f32,
    /// Vertical offset.
    pub dy: f32,
    /// Blur radius.
    pub blur: f32,
    /// Shadow color.
    pub color: Color,
}

/// Parse `2px 2px 4px rgba(0,0,0,0.8)` (color may come first or last).
#[must_use]
pub fn parse_text_shadow(value: &str) -> Option<TextShadow> {
    let value = value.trim();
    if value.is_empty() || value == "none" {
        return None;
    }
    // Only the first shadow; commas inside rgb() must not split.
    let mut depth = 0usize;
    let end = value
        .char_indices()
        .find(|&(_, c)| {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            c == ',' && depth == 0
        })
        .map_or(value.len(), |(i, _)| i);
    let first = &value[..end];

    let mut lengths = Vec::new();
    let mut color = Color::BLACK;
    let mut rest = first.trim();
    while !rest.is_empty() {
        let token_end = if rest.starts_with("rgb") {
            rest.find(')').map_or(rest.len(), |i| i + 1)
        } else {
            rest.find(char::is_whitespace).unwrap_or(rest.len())
        };
        let token = &rest[..token_end];
        if let Some(len) = parse_px(token) {
            lengths.push(len);
        } else if let Some(c) = parse_color(token) {
            color = c;
        }
        rest = rest[token_end..].trim_start();
    }
    match lengths.as_slice() {
        [dx, dy] => Some(TextShadow {
            dx: *dx,
            dy: *dy,
            blur: 0.0,
            color,
        }),
        [dx, dy, blur, ..] => Some(TextShadow {
            dx: *dx,
            dy: *dy,
            blur: *blur,
            color,
        }),
        _ => None,
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Start edge.
    #[default]
    Left,
    /// Centered.
    Center,
    /// End edge.
    Right,
}

impl TextAlign {
    /// Parse a `text-align` value; unknown values map to `Left`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "center" => Self::Center,
            "right" | "end" => Self::Right,
            _ => Self::Left,
        }
    }

    /// CSS keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    /// SVG `text-anchor` value.
    #[must_use]
    pub const fn svg_anchor(self) -> &'static str {
        match self {
            Self::Left => "start",
            Self::Center => "middle",
            Self::Right => "end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("12px"), Some(Length::Px(12.0)));
        assert_eq!(parse_length(" 50% "), Some(Length::Percent(50.0)));
        assert_eq!(parse_length("0"), Some(Length::Px(0.0)));
        assert_eq!(parse_length("auto"), None);
        assert_eq!(parse_px("40%"), None);
    }

    #[test]
    fn test_parse_box() {
        assert_eq!(parse_box("3px 5px"), Some([3.0, 5.0, 3.0, 5.0]));
        assert_eq!(parse_box("16px 0 16px 0"), Some([16.0, 0.0, 16.0, 0.0]));
        assert_eq!(parse_box("0"), Some([0.0; 4]));
        assert_eq!(parse_box("auto"), None);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#FFF"), Some(Color::WHITE));
        assert_eq!(parse_color("#000000"), Some(Color::BLACK));
        assert_eq!(
            parse_color("rgba(96, 165, 250, 0.5)"),
            Some(Color::rgba(96, 165, 250, 128))
        );
        assert_eq!(parse_color("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(parse_color("nonsense"), None);
    }

    #[test]
    fn test_parse_transform() {
        let ops = parse_transform("translate(-50%, -50%) rotate(15deg) scale(1.5)");
        assert_eq!(
            ops,
            vec![
                TransformOp::Translate(Length::Percent(-50.0), Length::Percent(-50.0)),
                TransformOp::Rotate(15.0),
                TransformOp::Scale(1.5, 1.5),
            ]
        );
        assert!(parse_transform("none").is_empty());
    }

    #[test]
    fn test_transform_matrix_translate_percent() {
        let ops = parse_transform("translate(-50%, -50%)");
        let m = transform_matrix(&ops, 100.0, 40.0);
        assert!((m.tx - -50.0).abs() < 1e-4);
        assert!((m.ty - -20.0).abs() < 1e-4);
    }

    #[test]
    fn test_transform_matrix_scales_around_center() {
        let m = transform_matrix(&[TransformOp::Scale(2.0, 2.0)], 10.0, 10.0);
        // The center (5, 5) is a fixed point.
        let mut p = [tiny_skia::Point::from_xy(5.0, 5.0)];
        m.map_points(&mut p);
        assert!((p[0].x - 5.0).abs() < 1e-4);
        assert!((p[0].y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_parse_text_shadow() {
        let shadow = parse_text_shadow("2px 2px 4px rgba(0, 0, 0, 0.8)").expect("shadow");
        assert!((shadow.dx - 2.0).abs() < f32::EPSILON);
        assert!((shadow.blur - 4.0).abs() < f32::EPSILON);
        assert_eq!(shadow.color, Color::rgba(0, 0, 0, 204));
        assert!(parse_text_shadow("none").is_none());
    }
}
