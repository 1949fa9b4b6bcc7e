//! Pointer events for element interaction.

use serde::{Deserialize, Serialize};

/// Device that produced a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerSource {
    /// Mouse or pen.
    Mouse,
    /// Finger on a touch screen.
    Touch,
}

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Button pressed / finger down.
    Down,
    /// Pointer moved.
    Move,
    /// Button released / finger lifted.
    Up,
    /// Pointer left the container.
    Leave,
    /// Touch cancelled by the platform.
    Cancel,
}

impl PointerPhase {
    /// Whether this phase ends an active drag.
    #[must_use]
    pub const fn ends_drag(self) -> bool {
        matches!(self, Self::Up | Self::Leave | Self::Cancel)
    }
}

/// A pointer event in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// X position in pixels.
    pub x: f32,
    /// Y position in pixels.
    pub y: f32,
    /// Input device.
    pub source: PointerSource,
    /// Event phase.
    pub phase: PointerPhase,
}

impl PointerEvent {
    /// Create a mouse event.
    #[must_use]
    pub const fn mouse(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            source: PointerSource::Mouse,
            phase,
        }
    }

    /// Create a touch event.
    #[must_use]
    pub const fn touch(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            source: PointerSource::Touch,
            phase,
        }
    }
}

/// An axis-aligned bounding box in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Bounds {
    /// Create a bounding box.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}
