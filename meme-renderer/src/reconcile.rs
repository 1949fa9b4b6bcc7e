//! Style reconciliation between the live tree and its export clone.
//!
//! The rasterizer only honors inline style, so anything the live layout
//! resolved through classes would be lost on the clone. Before rendering,
//! each text element of the clone receives the resolved values of its
//! live counterpart. Elements are paired by role and by position within
//! that role, both trees being traversed in document order.

use crate::style::prop;
use crate::tree::{marked, RenderNode, FOOTER_TEXT, HEADER_TEXT, REGULAR_TEXT};

/// Properties copied from the live element onto its clone.
pub const COPIED_PROPERTIES: &[&str] = &[
    prop::LEFT,
    prop::TOP,
    prop::TRANSFORM,
    prop::FONT_SIZE,
    prop::FONT_FAMILY,
    prop::FONT_WEIGHT,
    prop::COLOR,
    prop::TEXT_ALIGN,
    prop::TEXT_SHADOW,
    prop::LINE_HEIGHT,
    prop::WHITE_SPACE,
    prop::WIDTH,
    prop::HEIGHT,
    prop::PADDING,
    prop::BACKGROUND_COLOR,
    prop::BORDER_RADIUS,
    prop::OPACITY,
];

/// Number of elements reconciled per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Header bars.
    pub header: usize,
    /// Footer bars.
    pub footer: usize,
    /// Regular captions.
    pub regular: usize,
}

impl ReconcileReport {
    /// Total reconciled elements.
    #[must_use]
    pub fn total(&self) -> usize {
        self.header + self.footer + self.regular
    }
}

/// Copy the resolved style of `source` onto `target` as inline style.
///
/// Afterwards `target` has no margin, sits above everything else and is
/// forced visible.
pub fn copy_element_styles(source: &RenderNode, target: &mut RenderNode) {
    for &name in COPIED_PROPERTIES {
        if let Some(value) = source.resolved(name) {
            target.inline.set(name, value);
        }
    }
    target.inline.set(prop::MARGIN, "0");
    target.inline.set(prop::Z_INDEX, "100");
    target.inline.set(prop::VISIBILITY, "visible");
    target.inline.set(prop::DISPLAY, "block");
}

/// Reconcile every text element of `clone` with `original`.
///
/// Unpaired elements on either side are left alone.
pub fn reconcile(original: &RenderNode, clone: &mut RenderNode) -> ReconcileReport {
    let report = ReconcileReport {
        header: reconcile_role(original, clone, HEADER_TEXT),
        footer: reconcile_role(original, clone, FOOTER_TEXT),
        regular: reconcile_role(original, clone, REGULAR_TEXT),
    };
    tracing::debug!(
        header = report.header,
        footer = report.footer,
        regular = report.regular,
        "Reconciled text styles"
    );
    report
}

fn reconcile_role(original: &RenderNode, clone: &mut RenderNode, marker: &'static str) -> usize {
    let sources = original.find_all(&marked(marker));
    let targets = clone.paths(&marked(marker));
    let mut count = 0;
    for (source, path) in sources.into_iter().zip(targets) {
        if let Some(target) = clone.at_mut(&path) {
            copy_element_styles(source, target);
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(left: &str) -> RenderNode {
        RenderNode::div()
            .with_attr(REGULAR_TEXT, "true")
            .with_inline(prop::LEFT, left)
            .with_computed(prop::TEXT_ALIGN, "center")
            .with_computed(prop::WIDTH, "80px")
    }

    #[test]
    fn test_copy_prefers_inline_then_computed() {
        let source = caption("10%").with_computed(prop::LEFT, "51px");
        let mut target = RenderNode::div();
        copy_element_styles(&source, &mut target);

        assert_eq!(target.inline.get(prop::LEFT), Some("10%"));
        assert_eq!(target.inline.get(prop::TEXT_ALIGN), Some("center"));
        assert_eq!(target.inline.get(prop::Z_INDEX), Some("100"));
        assert_eq!(target.inline.get(prop::MARGIN), Some("0"));
        assert_eq!(target.inline.get(prop::VISIBILITY), Some("visible"));
        assert_eq!(target.inline.get(prop::DISPLAY), Some("block"));
    }

    #[test]
    fn test_pairs_by_position_within_role() {
        let original = RenderNode::div()
            .with_child(caption("10%"))
            .with_child(RenderNode::div().with_child(caption("20%")));
        let mut clone = RenderNode::div()
            .with_child(RenderNode::div().with_attr(REGULAR_TEXT, "true"))
            .with_child(
                RenderNode::div().with_child(RenderNode::div().with_attr(REGULAR_TEXT, "true")),
            );

        let report = reconcile(&original, &mut clone);
        assert_eq!(report.regular, 2);
        assert_eq!(report.total(), 2);
        assert_eq!(clone.children[0].inline.get(prop::LEFT), Some("10%"));
        assert_eq!(
            clone.children[1].children[0].inline.get(prop::LEFT),
            Some("20%")
        );
    }

    #[test]
    fn test_unpaired_elements_are_skipped() {
        let original = RenderNode::div().with_child(caption("10%"));
        let mut clone = RenderNode::div()
            .with_child(RenderNode::div().with_attr(REGULAR_TEXT, "true"))
            .with_child(RenderNode::div().with_attr(REGULAR_TEXT, "true"));

        let report = reconcile(&original, &mut clone);
        assert_eq!(report.regular, 1);
        assert!(clone.children[1].inline.is_empty());
    }
}
