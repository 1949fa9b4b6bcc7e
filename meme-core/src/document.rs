//! # Meme Document
//!
//! A template image plus its text and image overlays.
//!
//! ## Invariants
//!
//! - At most one header and one footer.
//! - At least one text element at all times.
//! - Element ids are unique across text and image elements.
//! - At most one element is selected, text or image.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::element::{
    ElementId, ImageElement, ImagePatch, ImageSourceKind, TextElement, TextPatch, TextRole,
};
use crate::error::{CoreError, CoreResult};
use crate::selection::{ElementRef, ExpiringSelection};

/// Text shown by default in header and footer bars.
pub const DEFAULT_BAR_TEXT: &str = "Place your text here";

/// A meme under construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Template image as a data URI, file path or URL.
    template: String,
    /// CSS filter expression applied to the template image only.
    #[serde(default)]
    image_filter: String,
    /// Text elements.
    texts: Vec<TextElement>,
    /// Image overlays.
    #[serde(default)]
    images: Vec<ImageElement>,
    #[serde(skip)]
    selection: ExpiringSelection,
}

impl Document {
    /// Create a document with the default header, body text and footer.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        let header = TextElement::new(ElementId(1), TextRole::Header)
            .with_text(DEFAULT_BAR_TEXT)
            .with_position(50.0, 8.0)
            .with_font(28.0, "#000000", "Arial");
        let body = TextElement::new(ElementId(2), TextRole::Text)
            .with_text("Meme text goes here")
            .with_position(50.0, 30.0)
            .with_font(32.0, "#FFFFFF", "Impact");
        let footer = TextElement::new(ElementId(3), TextRole::Footer)
            .with_text(DEFAULT_BAR_TEXT)
            .with_position(50.0, 92.0)
            .with_font(28.0, "#000000", "Arial");

        Self {
            template: template.into(),
            image_filter: String::new(),
            texts: vec![header, body, footer],
            images: Vec::new(),
            selection: ExpiringSelection::new(),
        }
    }

    /// Build a document from explicit elements.
    ///
    /// # Errors
    ///
    /// Returns an error if the elements violate a document invariant.
    pub fn from_parts(
        template: impl Into<String>,
        texts: Vec<TextElement>,
        images: Vec<ImageElement>,
    ) -> CoreResult<Self> {
        let mut doc = Self {
            template: template.into(),
            image_filter: String::new(),
            texts,
            images,
            selection: ExpiringSelection::new(),
        };
        doc.validate()?;
        doc.normalize();
        Ok(doc)
    }

    /// Clamp element positions and transforms loaded from outside.
    fn normalize(&mut self) {
        self.texts.iter_mut().for_each(TextElement::normalize);
        self.images.iter_mut().for_each(ImageElement::normalize);
    }

    fn validate(&self) -> CoreResult<()> {
        if self.texts.is_empty() {
            return Err(CoreError::LastTextElement);
        }
        for role in [TextRole::Header, TextRole::Footer] {
            if self.texts.iter().filter(|t| t.role == role).count() > 1 {
                return Err(CoreError::DuplicateRole(role));
            }
        }
        let mut ids: Vec<ElementId> = self
            .texts
            .iter()
            .map(|t| t.id)
            .chain(self.images.iter().map(|i| i.id))
            .collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(CoreError::InvalidOperation(format!(
                "duplicate element id {}",
                pair[0]
            )));
        }
        Ok(())
    }

    fn next_id(&self) -> ElementId {
        let max = self
            .texts
            .iter()
            .map(|t| t.id.0)
            .chain(self.images.iter().map(|i| i.id.0))
            .max()
            .unwrap_or(0);
        ElementId(max + 1)
    }

    // ---------------------------------------------------------------------
    // Template
    // ---------------------------------------------------------------------

    /// Template image source.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Replace the template image.
    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
        tracing::debug!("Template replaced");
    }

    /// Filter expression applied to the template image.
    #[must_use]
    pub fn image_filter(&self) -> &str {
        &self.image_filter
    }

    /// Set the template filter expression. An empty string removes it.
    pub fn set_image_filter(&mut self, filter: impl Into<String>) {
        self.image_filter = filter.into();
    }

    // ---------------------------------------------------------------------
    // Text elements
    // ---------------------------------------------------------------------

    /// All text elements.
    #[must_use]
    pub fn texts(&self) -> &[TextElement] {
        &self.texts
    }

    /// Look up a text element.
    #[must_use]
    pub fn text(&self, id: ElementId) -> Option<&TextElement> {
        self.texts.iter().find(|t| t.id == id)
    }

    /// Look up a text element mutably.
    pub fn text_mut(&mut self, id: ElementId) -> Option<&mut TextElement> {
        self.texts.iter_mut().find(|t| t.id == id)
    }

    /// The header element, if any.
    #[must_use]
    pub fn header(&self) -> Option<&TextElement> {
        self.texts.iter().find(|t| t.role == TextRole::Header)
    }

    /// The footer element, if any.
    #[must_use]
    pub fn footer(&self) -> Option<&TextElement> {
        self.texts.iter().find(|t| t.role == TextRole::Footer)
    }

    /// Freely positioned text elements, in document order.
    pub fn regular_texts(&self) -> impl Iterator<Item = &TextElement> {
        self.texts.iter().filter(|t| t.role == TextRole::Text)
    }

    /// Add a text element with role defaults and select it at `now`.
    ///
    /// Adding a second header or footer is a no-op and returns `None`.
    pub fn add_text(&mut self, role: TextRole, now: Instant) -> Option<ElementId> {
        if role.is_bar() && self.texts.iter().any(|t| t.role == role) {
            tracing::debug!(%role, "Ignoring duplicate bar element");
            return None;
        }
        let id = self.next_id();
        self.texts.push(TextElement::new(id, role));
        self.selection.select_at(ElementRef::Text(id), now);
        tracing::debug!(%id, %role, "Added text element");
        Some(id)
    }

    /// Remove a text element.
    ///
    /// If it was selected at `now`, selection moves to the first remaining
    /// text with a fresh idle window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LastTextElement`] if it is the only text element,
    /// or [`CoreError::ElementNotFound`] if no such element exists.
    pub fn remove_text(&mut self, id: ElementId, now: Instant) -> CoreResult<TextElement> {
        let index = self
            .texts
            .iter()
            .position(|t| t.id == id)
            .ok_or(CoreError::ElementNotFound(id))?;
        if self.texts.len() <= 1 {
            return Err(CoreError::LastTextElement);
        }
        let removed = self.texts.remove(index);
        if self.selection.current_at(now) == Some(ElementRef::Text(id)) {
            if let Some(first) = self.texts.first() {
                self.selection.select_at(ElementRef::Text(first.id), now);
            }
        }
        tracing::debug!(%id, "Removed text element");
        Ok(removed)
    }

    /// Apply a partial update to a text element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if no such element exists.
    pub fn update_text(&mut self, id: ElementId, patch: TextPatch) -> CoreResult<()> {
        let text = self.text_mut(id).ok_or(CoreError::ElementNotFound(id))?;
        text.apply(patch);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Image elements
    // ---------------------------------------------------------------------

    /// All image overlays.
    #[must_use]
    pub fn images(&self) -> &[ImageElement] {
        &self.images
    }

    /// Look up an image overlay.
    #[must_use]
    pub fn image(&self, id: ElementId) -> Option<&ImageElement> {
        self.images.iter().find(|i| i.id == id)
    }

    /// Look up an image overlay mutably.
    pub fn image_mut(&mut self, id: ElementId) -> Option<&mut ImageElement> {
        self.images.iter_mut().find(|i| i.id == id)
    }

    /// Add an image overlay at the center and select it at `now`.
    pub fn add_image(
        &mut self,
        src: impl Into<String>,
        kind: ImageSourceKind,
        now: Instant,
    ) -> ElementId {
        let id = self.next_id();
        self.images.push(ImageElement::new(id, src, kind));
        self.selection.select_at(ElementRef::Image(id), now);
        tracing::debug!(%id, ?kind, "Added image element");
        id
    }

    /// Remove an image overlay.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if no such element exists.
    pub fn remove_image(&mut self, id: ElementId) -> CoreResult<ImageElement> {
        let index = self
            .images
            .iter()
            .position(|i| i.id == id)
            .ok_or(CoreError::ElementNotFound(id))?;
        self.selection.clear_if(ElementRef::Image(id));
        Ok(self.images.remove(index))
    }

    /// Apply a partial update to an image overlay.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if no such element exists.
    pub fn update_image(&mut self, id: ElementId, patch: ImagePatch) -> CoreResult<()> {
        let image = self.image_mut(id).ok_or(CoreError::ElementNotFound(id))?;
        image.apply(patch);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Whether the referenced element exists.
    #[must_use]
    pub fn contains(&self, element: ElementRef) -> bool {
        match element {
            ElementRef::Text(id) => self.text(id).is_some(),
            ElementRef::Image(id) => self.image(id).is_some(),
        }
    }

    /// Select an element at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the element does not exist.
    pub fn select_at(&mut self, element: ElementRef, now: Instant) -> CoreResult<()> {
        if !self.contains(element) {
            return Err(CoreError::ElementNotFound(element.id()));
        }
        self.selection.select_at(element, now);
        Ok(())
    }

    /// Select an element now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the element does not exist.
    pub fn select(&mut self, element: ElementRef) -> CoreResult<()> {
        self.select_at(element, Instant::now())
    }

    /// The selection as seen at `now`.
    #[must_use]
    pub fn selection_at(&self, now: Instant) -> Option<ElementRef> {
        self.selection
            .current_at(now)
            .filter(|element| self.contains(*element))
    }

    /// The selection as seen now.
    #[must_use]
    pub fn selection(&self) -> Option<ElementRef> {
        self.selection_at(Instant::now())
    }

    /// Restart the selection idle window at `now`.
    pub fn refresh_selection_at(&mut self, now: Instant) {
        self.selection.refresh_at(now);
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    /// Serialize to pretty JSON. Selection is not persisted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON and check invariants.
    ///
    /// Out-of-range positions, rotations, scales and opacities are clamped
    /// into range rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] for malformed JSON, or an
    /// invariant error for a structurally invalid document.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        doc.normalize();
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_document() {
        let doc = Document::new("template.png");
        assert_eq!(doc.texts().len(), 3);
        assert_eq!(doc.header().map(|t| t.text.as_str()), Some(DEFAULT_BAR_TEXT));
        assert_eq!(doc.footer().map(|t| t.y), Some(92.0));
        assert_eq!(doc.regular_texts().count(), 1);
        assert!(doc.selection().is_none());
    }

    #[test]
    fn test_duplicate_header_is_noop() {
        let mut doc = Document::new("t.png");
        let before = doc.header().cloned();
        let now = Instant::now();

        assert_eq!(doc.add_text(TextRole::Header, now), None);
        assert_eq!(doc.add_text(TextRole::Footer, now), None);
        assert_eq!(doc.texts().len(), 3);
        assert_eq!(doc.header().cloned(), before);
    }

    #[test]
    fn test_add_text_selects_it() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        let id = doc
            .add_text(TextRole::Text, now)
            .expect("regular text is always added");

        assert_eq!(id, ElementId(4));
        assert_eq!(doc.selection_at(now), Some(ElementRef::Text(id)));
        assert_eq!(doc.text(id).map(|t| t.text.as_str()), Some("New text"));
    }

    #[test]
    fn test_added_text_selection_starts_at_given_instant() {
        let mut doc = Document::new("t.png");
        let start = Instant::now();
        let id = doc.add_text(TextRole::Text, start).expect("added");

        assert_eq!(
            doc.selection_at(start + Duration::from_millis(2999)),
            Some(ElementRef::Text(id))
        );
        assert_eq!(doc.selection_at(start + Duration::from_secs(3)), None);
    }

    #[test]
    fn test_header_can_be_readded_after_removal() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        doc.remove_text(ElementId(1), now).expect("remove header");
        assert!(doc.add_text(TextRole::Header, now).is_some());
    }

    #[test]
    fn test_last_text_not_removable() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        doc.remove_text(ElementId(1), now).expect("remove header");
        doc.remove_text(ElementId(2), now).expect("remove body");

        let err = doc.remove_text(ElementId(3), now).expect_err("last text");
        assert!(matches!(err, CoreError::LastTextElement));
        assert_eq!(doc.texts().len(), 1);
    }

    #[test]
    fn test_remove_selected_moves_selection() {
        let mut doc = Document::new("t.png");
        let start = Instant::now();
        doc.select_at(ElementRef::Text(ElementId(2)), start)
            .expect("select");
        let later = start + Duration::from_secs(2);
        doc.remove_text(ElementId(2), later).expect("remove");

        // The moved selection gets its own idle window.
        let after = later + Duration::from_secs(2);
        assert_eq!(doc.selection_at(after), Some(ElementRef::Text(ElementId(1))));
    }

    #[test]
    fn test_remove_after_expiry_selects_nothing() {
        let mut doc = Document::new("t.png");
        let start = Instant::now();
        doc.select_at(ElementRef::Text(ElementId(2)), start)
            .expect("select");
        let later = start + Duration::from_secs(5);
        doc.remove_text(ElementId(2), later).expect("remove");

        assert_eq!(doc.selection_at(later), None);
    }

    #[test]
    fn test_image_ids_share_space() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        let image = doc.add_image("data:image/png;base64,", ImageSourceKind::Emoji, now);
        let text = doc.add_text(TextRole::Text, now).expect("added");

        assert_eq!(image, ElementId(4));
        assert_eq!(text, ElementId(5));
        assert_eq!(doc.selection_at(now), Some(ElementRef::Text(text)));
    }

    #[test]
    fn test_remove_image_clears_selection() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        let id = doc.add_image("x.png", ImageSourceKind::Upload, now);
        doc.remove_image(id).expect("remove");
        assert!(doc.selection_at(now).is_none());
    }

    #[test]
    fn test_selection_auto_clears() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        doc.select_at(ElementRef::Text(ElementId(2)), now).expect("select");

        assert!(doc.selection_at(now + Duration::from_secs(1)).is_some());
        assert!(doc.selection_at(now + Duration::from_secs(3)).is_none());
    }

    #[test]
    fn test_select_missing_element() {
        let mut doc = Document::new("t.png");
        let err = doc.select(ElementRef::Image(ElementId(99))).expect_err("missing");
        assert!(matches!(err, CoreError::ElementNotFound(ElementId(99))));
    }

    #[test]
    fn test_from_parts_rejects_two_headers() {
        let texts = vec![
            TextElement::new(ElementId(1), TextRole::Header),
            TextElement::new(ElementId(2), TextRole::Header),
        ];
        let err = Document::from_parts("t.png", texts, Vec::new()).expect_err("invalid");
        assert!(matches!(err, CoreError::DuplicateRole(TextRole::Header)));
    }

    #[test]
    fn test_from_parts_rejects_duplicate_ids() {
        let texts = vec![TextElement::new(ElementId(1), TextRole::Text)];
        let images = vec![ImageElement::new(
            ElementId(1),
            "x.png",
            ImageSourceKind::Sticker,
        )];
        assert!(Document::from_parts("t.png", texts, images).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut doc = Document::new("t.png");
        doc.set_image_filter("grayscale(100%)");
        doc.add_image(
            "data:image/png;base64,AAAA",
            ImageSourceKind::Sticker,
            Instant::now(),
        );

        let json = doc.to_json().expect("serialize");
        let restored = Document::from_json(&json).expect("deserialize");
        assert_eq!(restored.texts(), doc.texts());
        assert_eq!(restored.images(), doc.images());
        assert_eq!(restored.image_filter(), "grayscale(100%)");
        assert!(restored.selection().is_none());
    }

    #[test]
    fn test_from_json_rejects_empty_texts() {
        let json = r#"{"template":"t.png","texts":[]}"#;
        assert!(matches!(
            Document::from_json(json),
            Err(CoreError::LastTextElement)
        ));
    }

    #[test]
    fn test_from_json_clamps_out_of_range_elements() {
        let mut doc = Document::new("t.png");
        doc.add_image("x.png", ImageSourceKind::Sticker, Instant::now());
        let mut value: serde_json::Value =
            serde_json::from_str(&doc.to_json().expect("serialize")).expect("value");
        value["texts"][1]["scale"] = 10.0.into();
        value["texts"][1]["rotation"] = 720.into();
        value["texts"][1]["opacity"] = 250.into();
        value["texts"][1]["x"] = 500.0.into();
        value["images"][0]["y"] = (-40.0).into();
        value["images"][0]["rotation"] = 375.into();

        let loaded = Document::from_json(&value.to_string()).expect("load");

        let body = loaded.text(ElementId(2)).expect("body");
        assert!((body.scale - crate::element::MAX_SCALE).abs() < f32::EPSILON);
        assert_eq!(body.rotation, 0);
        assert_eq!(body.opacity, 100);
        assert!((body.x - 100.0).abs() < f32::EPSILON);
        let image = &loaded.images()[0];
        assert!(image.y.abs() < f32::EPSILON);
        assert_eq!(image.rotation, 15);
    }
}
