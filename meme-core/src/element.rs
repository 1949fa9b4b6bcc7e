//! Meme elements - text captions and image overlays.

use serde::{Deserialize, Serialize};

/// Rotation increment applied by a single rotate action, in degrees.
pub const ROTATION_STEP_DEG: u16 = 15;
/// Scale increment applied by a single scale-up / scale-down action.
pub const SCALE_STEP: f32 = 0.1;
/// Smallest allowed element scale.
pub const MIN_SCALE: f32 = 0.3;
/// Largest allowed element scale.
pub const MAX_SCALE: f32 = 3.0;
/// Lower drag bound, percent of the container.
pub const DRAG_MIN_PERCENT: f32 = 5.0;
/// Upper drag bound, percent of the container.
pub const DRAG_MAX_PERCENT: f32 = 95.0;

/// Identifier of an element, unique within one document.
///
/// Text and image elements share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Layout role of a text element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextRole {
    /// Full-width bar pinned above the template image.
    Header,
    /// Full-width bar pinned below the template image.
    Footer,
    /// Freely positioned, center-anchored caption over the image.
    Text,
}

impl TextRole {
    /// Whether the role is a pinned bar rather than a free overlay.
    #[must_use]
    pub fn is_bar(self) -> bool {
        matches!(self, Self::Header | Self::Footer)
    }
}

impl std::fmt::Display for TextRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Footer => "footer",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// Where an image overlay came from. Controls its default size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSourceKind {
    /// User file upload.
    Upload,
    /// Emoji picker.
    Emoji,
    /// Sticker picker.
    Sticker,
    /// Bundled asset.
    Asset,
}

impl ImageSourceKind {
    /// Default base size (width, height) in pixels.
    #[must_use]
    pub fn default_size(self) -> (f32, f32) {
        match self {
            Self::Emoji => (60.0, 60.0),
            Self::Upload | Self::Sticker | Self::Asset => (100.0, 100.0),
        }
    }
}

/// Clamp a position percentage to the draggable range.
#[must_use]
pub fn clamp_drag_percent(value: f32) -> f32 {
    if value.is_nan() {
        return DRAG_MIN_PERCENT;
    }
    value.clamp(DRAG_MIN_PERCENT, DRAG_MAX_PERCENT)
}

/// Clamp a stored position percentage to `[0, 100]`. NaN centers.
#[must_use]
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        return 50.0;
    }
    value.clamp(0.0, 100.0)
}

/// Clamp a scale factor to `[MIN_SCALE, MAX_SCALE]`.
#[must_use]
pub fn clamp_scale(value: f32) -> f32 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(MIN_SCALE, MAX_SCALE)
}

/// Advance a rotation by one step, wrapping at 360.
#[must_use]
pub fn next_rotation(rotation: u16) -> u16 {
    (rotation % 360 + ROTATION_STEP_DEG) % 360
}

/// A text caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    /// Unique identifier.
    pub id: ElementId,
    /// Layout role. Fixed at creation.
    pub role: TextRole,
    /// Literal content.
    pub text: String,
    /// Horizontal center, percent of the image area (0-100).
    pub x: f32,
    /// Vertical center, percent of the image area (0-100).
    pub y: f32,
    /// Base font size in points, before the role multiplier.
    pub font_size: f32,
    /// CSS color.
    pub color: String,
    /// CSS font weight.
    pub font_weight: String,
    /// Font family name.
    pub font_family: String,
    /// Opacity percentage (0-100).
    pub opacity: u8,
    /// Rotation in whole degrees, `0..360`.
    pub rotation: u16,
    /// Scale factor, `MIN_SCALE..=MAX_SCALE`.
    pub scale: f32,
}

impl TextElement {
    /// Create a text element with editor defaults for `role`.
    #[must_use]
    pub fn new(id: ElementId, role: TextRole) -> Self {
        let (text, y) = match role {
            TextRole::Header => ("Header text", 10.0),
            TextRole::Footer => ("Footer text", 90.0),
            TextRole::Text => ("New text", 50.0),
        };
        Self {
            id,
            role,
            text: text.to_string(),
            x: 50.0,
            y,
            font_size: 32.0,
            color: "#FFFFFF".to_string(),
            font_weight: "bold".to_string(),
            font_family: "Arial".to_string(),
            opacity: 100,
            rotation: 0,
            scale: 1.0,
        }
    }

    /// Set the content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the position (clamped to the drag range).
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = clamp_drag_percent(x);
        self.y = clamp_drag_percent(y);
        self
    }

    /// Set font size, color and family.
    #[must_use]
    pub fn with_font(mut self, size: f32, color: &str, family: &str) -> Self {
        self.font_size = size;
        self.color = color.to_string();
        self.font_family = family.to_string();
        self
    }

    /// Opacity as a `0.0..=1.0` fraction.
    #[must_use]
    pub fn opacity_fraction(&self) -> f32 {
        f32::from(self.opacity.min(100)) / 100.0
    }

    /// Whether this element shows placeholder text instead of content.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.text.is_empty()
    }

    /// Rotate by one step.
    pub fn rotate(&mut self) {
        self.rotation = next_rotation(self.rotation);
    }

    /// Grow by one scale step, capped at `MAX_SCALE`.
    pub fn scale_up(&mut self) {
        self.scale = clamp_scale(self.scale + SCALE_STEP);
    }

    /// Shrink by one scale step, floored at `MIN_SCALE`.
    pub fn scale_down(&mut self) {
        self.scale = clamp_scale(self.scale - SCALE_STEP);
    }

    /// Bring every numeric field back into its valid range.
    pub fn normalize(&mut self) {
        self.x = clamp_percent(self.x);
        self.y = clamp_percent(self.y);
        self.font_size = self.font_size.max(1.0);
        self.opacity = self.opacity.min(100);
        self.rotation %= 360;
        self.scale = clamp_scale(self.scale);
    }

    /// Apply a partial update. Role and id are never changed.
    pub fn apply(&mut self, patch: TextPatch) {
        if let Some(text) = patch.text {
            self.text = text;
        }
        if let Some(x) = patch.x {
            self.x = clamp_percent(x);
        }
        if let Some(y) = patch.y {
            self.y = clamp_percent(y);
        }
        if let Some(size) = patch.font_size {
            self.font_size = size.max(1.0);
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(weight) = patch.font_weight {
            self.font_weight = weight;
        }
        if let Some(family) = patch.font_family {
            self.font_family = family;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.min(100);
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation % 360;
        }
        if let Some(scale) = patch.scale {
            self.scale = clamp_scale(scale);
        }
    }
}

/// Partial update for a [`TextElement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TextPatch {
    pub text: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub font_size: Option<f32>,
    pub color: Option<String>,
    pub font_weight: Option<String>,
    pub font_family: Option<String>,
    pub opacity: Option<u8>,
    pub rotation: Option<u16>,
    pub scale: Option<f32>,
}

/// An image overlay (upload, emoji, sticker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    /// Unique identifier.
    pub id: ElementId,
    /// Image payload as a data URI, file path or URL.
    pub src: String,
    /// Horizontal center, percent of the image area.
    pub x: f32,
    /// Vertical center, percent of the image area.
    pub y: f32,
    /// Base width in pixels, before scale.
    pub width: f32,
    /// Base height in pixels, before scale.
    pub height: f32,
    /// Opacity percentage (0-100).
    pub opacity: u8,
    /// Rotation in whole degrees, `0..360`.
    pub rotation: u16,
    /// Scale factor, `MIN_SCALE..=MAX_SCALE`.
    pub scale: f32,
}

impl ImageElement {
    /// Create an overlay centered on the image area.
    #[must_use]
    pub fn new(id: ElementId, src: impl Into<String>, kind: ImageSourceKind) -> Self {
        let (width, height) = kind.default_size();
        Self {
            id,
            src: src.into(),
            x: 50.0,
            y: 50.0,
            width,
            height,
            opacity: 100,
            rotation: 0,
            scale: 1.0,
        }
    }

    /// Opacity as a `0.0..=1.0` fraction.
    #[must_use]
    pub fn opacity_fraction(&self) -> f32 {
        f32::from(self.opacity.min(100)) / 100.0
    }

    /// Rendered size after scale.
    #[must_use]
    pub fn scaled_size(&self) -> (f32, f32) {
        (self.width * self.scale, self.height * self.scale)
    }

    /// Rotate by one step.
    pub fn rotate(&mut self) {
        self.rotation = next_rotation(self.rotation);
    }

    /// Grow by one scale step, capped at `MAX_SCALE`.
    pub fn scale_up(&mut self) {
        self.scale = clamp_scale(self.scale + SCALE_STEP);
    }

    /// Shrink by one scale step, floored at `MIN_SCALE`.
    pub fn scale_down(&mut self) {
        self.scale = clamp_scale(self.scale - SCALE_STEP);
    }

    /// Bring every numeric field back into its valid range.
    pub fn normalize(&mut self) {
        self.x = clamp_percent(self.x);
        self.y = clamp_percent(self.y);
        self.width = self.width.max(1.0);
        self.height = self.height.max(1.0);
        self.opacity = self.opacity.min(100);
        self.rotation %= 360;
        self.scale = clamp_scale(self.scale);
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: ImagePatch) {
        if let Some(x) = patch.x {
            self.x = clamp_percent(x);
        }
        if let Some(y) = patch.y {
            self.y = clamp_percent(y);
        }
        if let Some(width) = patch.width {
            self.width = width.max(1.0);
        }
        if let Some(height) = patch.height {
            self.height = height.max(1.0);
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.min(100);
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation % 360;
        }
        if let Some(scale) = patch.scale {
            self.scale = clamp_scale(scale);
        }
    }
}

/// Partial update for an [`ImageElement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ImagePatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub opacity: Option<u8>,
    pub rotation: Option<u16>,
    pub scale: Option<f32>,
}
