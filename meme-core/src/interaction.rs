//! # Interaction Engine
//!
//! Pointer and touch driven drag, plus rotate/scale steps on the selection.
//!
//! A drag captures the offset between the pointer and the element's
//! rendered center once, at pointer-down. Every move then places the
//! element center at `pointer - offset`, expressed as a percentage of the
//! container and clamped to `[5, 95]` on both axes.
//!
//! Mouse and touch behave identically, except that touch moves during a
//! drag ask the host to suppress page scrolling.

use std::time::Instant;

use crate::document::Document;
use crate::element::{clamp_drag_percent, ImageElement, TextElement};
use crate::error::{CoreError, CoreResult};
use crate::event::{Bounds, PointerEvent, PointerPhase, PointerSource};
use crate::selection::ElementRef;

/// What the host should do after an event was handled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerOutcome {
    /// Suppress default scrolling for this event.
    pub prevent_scroll: bool,
    /// New `(x, y)` percentage position of the dragged element, if it moved.
    pub position: Option<(f32, f32)>,
    /// Whether a drag is in progress after this event.
    pub dragging: bool,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    element: ElementRef,
    offset: (f32, f32),
}

/// Drives element drag, rotate and scale from pointer input.
#[derive(Debug, Default)]
pub struct InteractionEngine {
    drag: Option<DragState>,
}

impl InteractionEngine {
    /// Create an idle engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The element currently being dragged.
    #[must_use]
    pub fn dragging(&self) -> Option<ElementRef> {
        self.drag.map(|d| d.element)
    }

    /// Start dragging `element`, whose rendered box is `element_bounds`.
    ///
    /// Selects the element, replacing any previous selection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the element does not exist.
    pub fn pointer_down(
        &mut self,
        doc: &mut Document,
        element: ElementRef,
        element_bounds: Bounds,
        event: PointerEvent,
        now: Instant,
    ) -> CoreResult<PointerOutcome> {
        doc.select_at(element, now)?;
        let (cx, cy) = element_bounds.center();
        let offset = (event.x - cx, event.y - cy);
        self.drag = Some(DragState { element, offset });
        tracing::trace!(?element, ?offset, "Drag started");

        Ok(PointerOutcome {
            prevent_scroll: event.source == PointerSource::Touch,
            position: None,
            dragging: true,
        })
    }

    /// Move the dragged element, if any.
    ///
    /// `container` is the current bounding box of the image area.
    pub fn pointer_move(
        &mut self,
        doc: &mut Document,
        container: Bounds,
        event: PointerEvent,
        now: Instant,
    ) -> PointerOutcome {
        let Some(drag) = self.drag else {
            return PointerOutcome::default();
        };
        let prevent_scroll = event.source == PointerSource::Touch;
        if container.width <= 0.0 || container.height <= 0.0 {
            return PointerOutcome {
                prevent_scroll,
                position: None,
                dragging: true,
            };
        }

        let x = clamp_drag_percent(
            (event.x - drag.offset.0 - container.x) / container.width * 100.0,
        );
        let y = clamp_drag_percent(
            (event.y - drag.offset.1 - container.y) / container.height * 100.0,
        );

        let moved = match drag.element {
            ElementRef::Text(id) => doc.text_mut(id).map(|t| {
                t.x = x;
                t.y = y;
            }),
            ElementRef::Image(id) => doc.image_mut(id).map(|i| {
                i.x = x;
                i.y = y;
            }),
        };
        if moved.is_none() {
            tracing::debug!(element = ?drag.element, "Dragged element vanished");
            self.drag = None;
            return PointerOutcome {
                prevent_scroll,
                ..PointerOutcome::default()
            };
        }
        doc.refresh_selection_at(now);

        PointerOutcome {
            prevent_scroll,
            position: Some((x, y)),
            dragging: true,
        }
    }

    /// End the drag. The selection is kept.
    pub fn pointer_up(&mut self) -> PointerOutcome {
        if let Some(drag) = self.drag.take() {
            tracing::trace!(element = ?drag.element, "Drag ended");
        }
        PointerOutcome::default()
    }

    /// Dispatch a pointer event.
    ///
    /// `target` is the element under the pointer and its rendered box; it
    /// is only consulted for [`PointerPhase::Down`].
    ///
    /// # Errors
    ///
    /// Returns an error if a pointer-down targets a missing element.
    pub fn handle(
        &mut self,
        doc: &mut Document,
        event: PointerEvent,
        target: Option<(ElementRef, Bounds)>,
        container: Bounds,
        now: Instant,
    ) -> CoreResult<PointerOutcome> {
        match event.phase {
            PointerPhase::Down => match target {
                Some((element, bounds)) => self.pointer_down(doc, element, bounds, event, now),
                None => Ok(self.pointer_up()),
            },
            phase if phase.ends_drag() => Ok(self.pointer_up()),
            _ => Ok(self.pointer_move(doc, container, event, now)),
        }
    }

    /// Rotate the selected element by one step.
    ///
    /// Returns the rotated element, or `None` if nothing is selected.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the selection is stale.
    pub fn rotate_selected(
        &mut self,
        doc: &mut Document,
        now: Instant,
    ) -> CoreResult<Option<ElementRef>> {
        self.apply_to_selected(doc, now, TextElement::rotate, ImageElement::rotate)
    }

    /// Scale the selected element up by one step.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the selection is stale.
    pub fn scale_selected_up(
        &mut self,
        doc: &mut Document,
        now: Instant,
    ) -> CoreResult<Option<ElementRef>> {
        self.apply_to_selected(doc, now, TextElement::scale_up, ImageElement::scale_up)
    }

    /// Scale the selected element down by one step.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the selection is stale.
    pub fn scale_selected_down(
        &mut self,
        doc: &mut Document,
        now: Instant,
    ) -> CoreResult<Option<ElementRef>> {
        self.apply_to_selected(doc, now, TextElement::scale_down, ImageElement::scale_down)
    }

    fn apply_to_selected(
        &mut self,
        doc: &mut Document,
        now: Instant,
        on_text: impl FnOnce(&mut TextElement),
        on_image: impl FnOnce(&mut ImageElement),
    ) -> CoreResult<Option<ElementRef>> {
        let Some(selected) = doc.selection_at(now) else {
            return Ok(None);
        };
        match selected {
            ElementRef::Text(id) => on_text(doc.text_mut(id).ok_or(CoreError::ElementNotFound(id))?),
            ElementRef::Image(id) => {
                on_image(doc.image_mut(id).ok_or(CoreError::ElementNotFound(id))?);
            }
        }
        doc.refresh_selection_at(now);
        Ok(Some(selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementId, ImageSourceKind};

    fn container() -> Bounds {
        Bounds::new(100.0, 50.0, 400.0, 200.0)
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let now = Instant::now();
        let body = ElementRef::Text(ElementId(2));

        // Element centered at (300, 110); grabbed 10px right of center.
        let element_box = Bounds::new(250.0, 100.0, 100.0, 20.0);
        engine
            .pointer_down(
                &mut doc,
                body,
                element_box,
                PointerEvent::mouse(PointerPhase::Down, 310.0, 110.0),
                now,
            )
            .expect("down");

        let outcome = engine.pointer_move(
            &mut doc,
            container(),
            PointerEvent::mouse(PointerPhase::Move, 310.0, 150.0),
            now,
        );
        assert_eq!(outcome.position, Some((50.0, 50.0)));
        assert!(!outcome.prevent_scroll);
    }

    #[test]
    fn test_drag_clamped_far_outside() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let now = Instant::now();
        let id = doc.add_image("x.png", ImageSourceKind::Upload, now);
        let image = ElementRef::Image(id);

        engine
            .pointer_down(
                &mut doc,
                image,
                Bounds::new(250.0, 100.0, 100.0, 100.0),
                PointerEvent::touch(PointerPhase::Down, 300.0, 150.0),
                now,
            )
            .expect("down");
        let outcome = engine.pointer_move(
            &mut doc,
            container(),
            PointerEvent::touch(PointerPhase::Move, -5000.0, 9000.0),
            now,
        );

        assert_eq!(outcome.position, Some((5.0, 95.0)));
        assert!(outcome.prevent_scroll);
        let moved = doc.image(id).expect("image");
        assert_eq!((moved.x, moved.y), (5.0, 95.0));
    }

    #[test]
    fn test_pointer_up_keeps_selection() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let now = Instant::now();
        let body = ElementRef::Text(ElementId(2));

        engine
            .handle(
                &mut doc,
                PointerEvent::mouse(PointerPhase::Down, 0.0, 0.0),
                Some((body, Bounds::new(0.0, 0.0, 10.0, 10.0))),
                container(),
                now,
            )
            .expect("down");
        engine
            .handle(
                &mut doc,
                PointerEvent::mouse(PointerPhase::Leave, 0.0, 0.0),
                None,
                container(),
                now,
            )
            .expect("leave");

        assert!(engine.dragging().is_none());
        assert_eq!(doc.selection_at(now), Some(body));
    }

    #[test]
    fn test_touch_cancel_ends_drag() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let now = Instant::now();
        let body = ElementRef::Text(ElementId(2));
        let before = doc.text(ElementId(2)).cloned();

        engine
            .handle(
                &mut doc,
                PointerEvent::touch(PointerPhase::Down, 5.0, 5.0),
                Some((body, Bounds::new(0.0, 0.0, 10.0, 10.0))),
                container(),
                now,
            )
            .expect("down");
        let outcome = engine
            .handle(
                &mut doc,
                PointerEvent::touch(PointerPhase::Cancel, 300.0, 150.0),
                None,
                container(),
                now,
            )
            .expect("cancel");

        assert_eq!(outcome, PointerOutcome::default());
        assert!(engine.dragging().is_none());
        assert_eq!(doc.text(ElementId(2)).cloned(), before);
    }

    #[test]
    fn test_move_without_drag_is_ignored() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let before = doc.texts().to_vec();

        let outcome = engine.pointer_move(
            &mut doc,
            container(),
            PointerEvent::touch(PointerPhase::Move, 10.0, 10.0),
            Instant::now(),
        );
        assert_eq!(outcome, PointerOutcome::default());
        assert_eq!(doc.texts(), before.as_slice());
    }

    #[test]
    fn test_rotate_and_scale_selected() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let now = Instant::now();
        doc.select_at(ElementRef::Text(ElementId(2)), now).expect("select");

        engine.rotate_selected(&mut doc, now).expect("rotate");
        engine.scale_selected_up(&mut doc, now).expect("scale");

        let body = doc.text(ElementId(2)).expect("body");
        assert_eq!(body.rotation, 15);
        assert!((body.scale - 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_rotate_without_selection() {
        let mut doc = Document::new("t.png");
        let mut engine = InteractionEngine::new();
        let result = engine.rotate_selected(&mut doc, Instant::now()).expect("ok");
        assert!(result.is_none());
        assert!(doc.texts().iter().all(|t| t.rotation == 0));
    }
}
