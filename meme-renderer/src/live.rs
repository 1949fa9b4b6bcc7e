//! # Live Renderer
//!
//! Turns a [`Document`] into the render tree the editor displays.
//!
//! ```text
//! div[data-meme-container]
//! ├── div[data-header-text]        full-width bar above the image
//! ├── div (image area, relative)
//! │   ├── img                      template, natural aspect, full width
//! │   ├── div[data-regular-text]*  centered at (x%, y%) of the image area
//! │   └── div > img*               image overlays
//! └── div[data-footer-text]        full-width bar below the image
//! ```
//!
//! Layout happens in template pixel space: the container is as wide as
//! the template's natural width. Zoom is applied as a transform on the
//! container, so it changes on-screen size only.
//!
//! Inline styles carry what the editor sets directly on each element.
//! Class-derived values (bar backgrounds, measured boxes, text centering)
//! only appear in `computed`.

use std::time::Instant;

use meme_core::{Document, ElementRef, ImageElement, TextElement};

use crate::layout::{BarLayout, CanvasConfig, MemeLayout};
use crate::style::{percent, prop, px};
use crate::tree::{
    RenderNode, FOOTER_TEXT, HEADER_TEXT, MEME_CONTAINER, PLACEHOLDER, REGULAR_TEXT,
    SELECTION_RING,
};

/// Text shown for an empty regular caption.
pub const PLACEHOLDER_TEXT: &str = "Place your text here";

const BAR_BACKGROUND: &str = "#ffffff";
const BAR_BORDER_COLOR: &str = "#000000";
const RING_OUTLINE: &str = "2px solid rgba(96, 165, 250, 0.5)";
const RING_FILL: &str = "rgba(239, 246, 255, 0.2)";

/// Renders documents into live render trees.
#[derive(Debug, Clone, Default)]
pub struct LiveRenderer {
    config: CanvasConfig,
}

impl LiveRenderer {
    /// Create a renderer with the given canvas styling.
    #[must_use]
    pub fn new(config: CanvasConfig) -> Self {
        Self { config }
    }

    /// Canvas styling.
    #[must_use]
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Render `doc` over a template of `template_size` natural pixels.
    ///
    /// The selection is evaluated at `now`; the selected element gets a
    /// highlight ring and a raised z-index.
    #[must_use]
    pub fn render(
        &self,
        doc: &Document,
        template_size: (u32, u32),
        zoom: f32,
        now: Instant,
    ) -> RenderNode {
        let layout = MemeLayout::compute(doc, &self.config, template_size);
        let selected = doc.selection_at(now);
        let is_selected = |element: ElementRef| selected == Some(element);

        let margin = self.config.container_margin;
        let mut container = RenderNode::div()
            .with_attr(MEME_CONTAINER, "")
            .with_classes("relative bg-white overflow-hidden select-none")
            .with_inline(prop::POSITION, "relative")
            .with_inline(
                prop::MARGIN,
                format!("{} {} {} {}", px(margin[0]), px(margin[1]), px(margin[2]), px(margin[3])),
            )
            .with_inline(prop::PADDING, "0")
            .with_computed(prop::WIDTH, px(layout.width))
            .with_computed(prop::HEIGHT, px(layout.height))
            .with_computed(prop::BACKGROUND_COLOR, BAR_BACKGROUND);
        if (zoom - 1.0).abs() > f32::EPSILON {
            container.inline.set(prop::TRANSFORM, format!("scale({zoom})"));
        }

        if let (Some(text), Some(bar)) = (doc.header(), layout.header.as_ref()) {
            let node = self.bar(text, bar, &layout, true, is_selected(ElementRef::Text(text.id)));
            container.children.push(node);
        }

        let mut image_area = RenderNode::div()
            .with_classes("relative select-none")
            .with_inline(prop::POSITION, "relative")
            .with_computed(prop::WIDTH, px(layout.width))
            .with_computed(prop::HEIGHT, px(layout.image_height))
            .with_child(template_image(doc, &layout, template_size, zoom));
        for text in doc.regular_texts() {
            let node = self.regular_text(text, &layout, is_selected(ElementRef::Text(text.id)));
            image_area.children.push(node);
        }
        for image in doc.images() {
            let node = overlay(image, &layout, is_selected(ElementRef::Image(image.id)));
            image_area.children.push(node);
        }
        container.children.push(image_area);

        if let (Some(text), Some(bar)) = (doc.footer(), layout.footer.as_ref()) {
            let node = self.bar(text, bar, &layout, false, is_selected(ElementRef::Text(text.id)));
            container.children.push(node);
        }

        tracing::trace!(
            width = layout.width,
            height = layout.height,
            zoom,
            "Rendered live tree"
        );
        container
    }

    fn bar(
        &self,
        text: &TextElement,
        bar: &BarLayout,
        layout: &MemeLayout,
        header: bool,
        selected: bool,
    ) -> RenderNode {
        let config = &self.config;
        let (marker, classes, border_side) = if header {
            (
                HEADER_TEXT,
                "w-full font-bold flex items-center bg-white border-b-2 border-black",
                prop::BORDER_BOTTOM,
            )
        } else {
            (
                FOOTER_TEXT,
                "w-full font-bold flex items-center bg-white border-t-2 border-black",
                prop::BORDER_TOP,
            )
        };
        let (pad_v, pad_h) = (config.bar_padding.0 * layout.unit, config.bar_padding.1 * layout.unit);

        let mut node = RenderNode::div()
            .with_attr(marker, "")
            .with_classes(classes)
            .with_inline(prop::FONT_SIZE, px(bar.block.font_px))
            .with_inline(prop::COLOR, text.color.clone())
            .with_inline(prop::FONT_FAMILY, text.font_family.clone())
            .with_inline(prop::FONT_WEIGHT, config.bar_font_weight.clone())
            .with_inline(prop::LINE_HEIGHT, config.line_height.to_string())
            .with_inline(prop::OPACITY, text.opacity_fraction().to_string())
            .with_inline(
                prop::TRANSFORM,
                format!("rotate({}deg) scale({})", text.rotation, text.scale),
            )
            .with_inline(prop::Z_INDEX, z_index(selected))
            .with_inline(prop::WHITE_SPACE, "pre-wrap")
            .with_inline(prop::PADDING, format!("{} {}", px(pad_v), px(pad_h)))
            .with_inline(prop::MARGIN, "0")
            .with_inline(prop::TEXT_ALIGN, config.bar_align.as_str())
            .with_inline(
                border_side,
                format!("{} solid {BAR_BORDER_COLOR}", px(bar.border)),
            )
            .with_computed(prop::POSITION, "static")
            .with_computed(prop::DISPLAY, "flex")
            .with_computed(prop::LEFT, "auto")
            .with_computed(prop::TOP, "auto")
            .with_computed(prop::WIDTH, px(layout.width))
            .with_computed(prop::HEIGHT, px(bar.height()))
            .with_computed(prop::BACKGROUND_COLOR, BAR_BACKGROUND)
            .with_text(text.text.clone());
        if selected {
            node.children.push(selection_ring(true));
        }
        node
    }

    fn regular_text(&self, text: &TextElement, layout: &MemeLayout, selected: bool) -> RenderNode {
        let config = &self.config;
        let content = if text.is_placeholder() {
            PLACEHOLDER_TEXT
        } else {
            text.text.as_str()
        };
        let block = layout.text_block(content, text, config);
        let (pad_v, pad_h) = (
            config.text_padding.0 * layout.unit,
            config.text_padding.1 * layout.unit,
        );

        let mut node = RenderNode::div()
            .with_attr(REGULAR_TEXT, "true")
            .with_classes("absolute cursor-move select-none font-bold text-center px-2 py-1")
            .with_inline(prop::POSITION, "absolute")
            .with_inline(prop::LEFT, percent(text.x))
            .with_inline(prop::TOP, percent(text.y))
            .with_inline(prop::FONT_SIZE, px(block.font_px))
            .with_inline(prop::COLOR, text.color.clone())
            .with_inline(prop::FONT_FAMILY, text.font_family.clone())
            .with_inline(prop::FONT_WEIGHT, config.text_font_weight.clone())
            .with_inline(prop::OPACITY, text.opacity_fraction().to_string())
            .with_inline(
                prop::TRANSFORM,
                format!(
                    "translate(-50%, -50%) rotate({}deg) scale({})",
                    text.rotation, text.scale
                ),
            )
            .with_inline(prop::MIN_WIDTH, px(config.text_min_width * layout.unit))
            .with_inline(prop::Z_INDEX, z_index(selected))
            .with_inline(prop::WHITE_SPACE, "pre")
            .with_computed(prop::LEFT, px(layout.width * text.x / 100.0))
            .with_computed(prop::TOP, px(layout.image_height * text.y / 100.0))
            .with_computed(prop::WIDTH, px(block.width))
            .with_computed(prop::HEIGHT, px(block.height))
            .with_computed(prop::TEXT_ALIGN, "center")
            .with_computed(prop::PADDING, format!("{} {}", px(pad_v), px(pad_h)))
            .with_computed(prop::LINE_HEIGHT, config.line_height.to_string())
            .with_text(content);
        if text.is_placeholder() {
            node.attrs.insert(PLACEHOLDER.to_string(), String::new());
        }
        if selected {
            node.children.push(selection_ring(true));
        }
        node
    }
}

fn template_image(
    doc: &Document,
    layout: &MemeLayout,
    template_size: (u32, u32),
    zoom: f32,
) -> RenderNode {
    let mut img = RenderNode::img(doc.template())
        .with_classes("w-full block")
        .with_inline(prop::DISPLAY, "block")
        .with_inline(prop::WIDTH, "100%")
        .with_computed(prop::WIDTH, px(layout.width))
        .with_computed(prop::HEIGHT, px(layout.image_height));
    if !doc.image_filter().is_empty() {
        img.inline.set(prop::FILTER, doc.image_filter());
    }
    img.natural_size = Some(template_size);
    img.rendered_size = Some((layout.width * zoom, layout.image_height * zoom));
    img
}

fn overlay(image: &ImageElement, layout: &MemeLayout, selected: bool) -> RenderNode {
    let (w, h) = image.scaled_size();
    let (w, h) = (w * layout.unit, h * layout.unit);
    let mut node = RenderNode::div()
        .with_classes("absolute cursor-move")
        .with_inline(prop::POSITION, "absolute")
        .with_inline(prop::LEFT, percent(image.x))
        .with_inline(prop::TOP, percent(image.y))
        .with_inline(prop::WIDTH, px(w))
        .with_inline(prop::HEIGHT, px(h))
        .with_inline(prop::OPACITY, image.opacity_fraction().to_string())
        .with_inline(
            prop::TRANSFORM,
            format!("translate(-50%, -50%) rotate({}deg)", image.rotation),
        )
        .with_inline(prop::Z_INDEX, z_index(selected))
        .with_computed(prop::LEFT, px(layout.width * image.x / 100.0))
        .with_computed(prop::TOP, px(layout.image_height * image.y / 100.0))
        .with_child(
            RenderNode::img(image.src.clone())
                .with_classes("w-full h-full object-cover")
                .with_inline(prop::DISPLAY, "block")
                .with_inline(prop::WIDTH, "100%")
                .with_inline(prop::HEIGHT, "100%")
                .with_inline(prop::OBJECT_FIT, "cover"),
        );
    if selected {
        node.children.push(selection_ring(false));
    }
    node
}

fn selection_ring(tinted: bool) -> RenderNode {
    let mut ring = RenderNode::div()
        .with_attr(SELECTION_RING, "")
        .with_classes("absolute inset-0 ring-2 ring-blue-400 ring-opacity-50 pointer-events-none")
        .with_inline(prop::POSITION, "absolute")
        .with_inline(prop::INSET, "0")
        .with_inline(prop::OUTLINE, RING_OUTLINE);
    if tinted {
        ring.classes
            .extend(["bg-blue-50", "bg-opacity-20"].map(str::to_string));
        ring.inline.set(prop::BACKGROUND_COLOR, RING_FILL);
    }
    ring
}

fn z_index(selected: bool) -> &'static str {
    if selected {
        "10"
    } else {
        "1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::marked;
    use meme_core::{ElementId, ImageSourceKind, TextPatch};

    fn render(doc: &Document, now: Instant) -> RenderNode {
        LiveRenderer::default().render(doc, (512, 512), 1.0, now)
    }

    #[test]
    fn test_structure_and_markers() {
        let doc = Document::new("t.png");
        let tree = render(&doc, Instant::now());

        assert!(tree.has_attr(MEME_CONTAINER));
        assert_eq!(tree.children.len(), 3);
        assert!(tree.children[0].has_attr(HEADER_TEXT));
        assert!(tree.children[2].has_attr(FOOTER_TEXT));
        assert_eq!(tree.find_all(&marked(REGULAR_TEXT)).len(), 1);

        let img = tree.find(&RenderNode::is_img).expect("template img");
        assert_eq!(img.natural_size, Some((512, 512)));
    }

    #[test]
    fn test_empty_bar_is_not_rendered() {
        let mut doc = Document::new("t.png");
        doc.update_text(
            ElementId(1),
            TextPatch {
                text: Some(String::new()),
                ..TextPatch::default()
            },
        )
        .expect("update");
        let tree = render(&doc, Instant::now());
        assert!(tree.find(&marked(HEADER_TEXT)).is_none());
    }

    #[test]
    fn test_placeholder_marker_only_when_empty() {
        let mut doc = Document::new("t.png");
        let tree = render(&doc, Instant::now());
        assert!(tree.find(&marked(PLACEHOLDER)).is_none());

        doc.update_text(
            ElementId(2),
            TextPatch {
                text: Some(String::new()),
                ..TextPatch::default()
            },
        )
        .expect("update");
        let tree = render(&doc, Instant::now());
        let placeholder = tree.find(&marked(PLACEHOLDER)).expect("placeholder");
        assert_eq!(placeholder.text.as_deref(), Some(PLACEHOLDER_TEXT));
    }

    #[test]
    fn test_selected_element_has_ring_and_z_index() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        doc.select_at(ElementRef::Text(ElementId(2)), now).expect("select");
        let tree = render(&doc, now);

        let body = tree.find(&marked(REGULAR_TEXT)).expect("body");
        assert_eq!(body.inline.get(prop::Z_INDEX), Some("10"));
        assert!(body.children.iter().any(|c| c.has_attr(SELECTION_RING)));

        let header = tree.find(&marked(HEADER_TEXT)).expect("header");
        assert_eq!(header.inline.get(prop::Z_INDEX), Some("1"));
        assert!(header.children.is_empty());
    }

    #[test]
    fn test_regular_text_styles() {
        let doc = Document::new("t.png");
        let tree = render(&doc, Instant::now());
        let body = tree.find(&marked(REGULAR_TEXT)).expect("body");

        assert_eq!(body.inline.get(prop::LEFT), Some("50%"));
        assert_eq!(body.inline.get(prop::TOP), Some("30%"));
        assert_eq!(
            body.inline.get(prop::TRANSFORM),
            Some("translate(-50%, -50%) rotate(0deg) scale(1)")
        );
        // Centering comes from a class, so it is only resolved, not inline.
        assert_eq!(body.inline.get(prop::TEXT_ALIGN), None);
        assert_eq!(body.computed.get(prop::TEXT_ALIGN), Some("center"));
        assert_eq!(body.computed.get(prop::LEFT), Some("256px"));
    }

    #[test]
    fn test_zoom_changes_rendered_size_only() {
        let doc = Document::new("t.png");
        let tree = LiveRenderer::default().render(&doc, (400, 300), 0.5, Instant::now());

        assert_eq!(tree.inline.get(prop::TRANSFORM), Some("scale(0.5)"));
        let img = tree.find(&RenderNode::is_img).expect("img");
        assert_eq!(img.natural_size, Some((400, 300)));
        assert_eq!(img.rendered_size, Some((200.0, 150.0)));
        assert_eq!(tree.computed.get(prop::WIDTH), Some("400px"));
    }

    #[test]
    fn test_overlay_size_includes_scale() {
        let mut doc = Document::new("t.png");
        let now = Instant::now();
        let id = doc.add_image("sticker.png", ImageSourceKind::Emoji, now);
        doc.image_mut(id).expect("image").scale = 2.0;
        let tree = render(&doc, now);

        let overlay = tree
            .find(&|n: &RenderNode| n.has_class("cursor-move") && !n.has_attr(REGULAR_TEXT))
            .expect("overlay");
        assert_eq!(overlay.inline.get(prop::WIDTH), Some("120px"));
        assert!(overlay.children[0].is_img());
    }
}
