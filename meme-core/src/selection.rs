//! # Expiring Selection
//!
//! The currently selected element, with an idle timeout.
//!
//! Selection is a value plus the instant of the last interaction. It is
//! checked lazily on read: once the idle window has elapsed the selection
//! reads as empty and is dropped on the next mutable access.
//!
//! ```text
//! select_at(Text 2, t) ──► refresh_at(t + 1s) ──► current_at(t + 4s) == None
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::element::ElementId;

/// Idle period after which the selection clears itself.
pub const SELECTION_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reference to a selectable element. Text and image are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum ElementRef {
    /// A text element.
    Text(ElementId),
    /// An image overlay.
    Image(ElementId),
}

impl ElementRef {
    /// The referenced element id.
    #[must_use]
    pub const fn id(self) -> ElementId {
        match self {
            Self::Text(id) | Self::Image(id) => id,
        }
    }

    /// Whether this refers to a text element.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Selected {
    element: ElementRef,
    touched_at: Instant,
}

/// Selection that expires after a period without interaction.
#[derive(Debug, Clone)]
pub struct ExpiringSelection {
    selected: Option<Selected>,
}

impl Default for ExpiringSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiringSelection {
    /// Create an empty selection.
    #[must_use]
    pub const fn new() -> Self {
        Self { selected: None }
    }

    /// Select `element` at `now`, replacing any previous selection.
    pub fn select_at(&mut self, element: ElementRef, now: Instant) {
        tracing::trace!(?element, "Selection changed");
        self.selected = Some(Selected {
            element,
            touched_at: now,
        });
    }

    /// Restart the idle window if something is still selected at `now`.
    pub fn refresh_at(&mut self, now: Instant) {
        self.expire_at(now);
        if let Some(selected) = self.selected.as_mut() {
            selected.touched_at = now;
        }
    }

    /// The selection as seen at `now`, or `None` if it has expired.
    #[must_use]
    pub fn current_at(&self, now: Instant) -> Option<ElementRef> {
        self.selected
            .filter(|s| now.saturating_duration_since(s.touched_at) < SELECTION_IDLE_TIMEOUT)
            .map(|s| s.element)
    }

    /// Drop the selection if it has expired at `now`.
    pub fn expire_at(&mut self, now: Instant) {
        if self.selected.is_some() && self.current_at(now).is_none() {
            tracing::trace!("Selection expired");
            self.selected = None;
        }
    }

    /// Clear the selection.
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Clear the selection if it refers to `element`.
    pub fn clear_if(&mut self, element: ElementRef) {
        if self.selected.is_some_and(|s| s.element == element) {
            self.selected = None;
        }
    }
}
