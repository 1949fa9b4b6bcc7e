//! # Render Tree
//!
//! An in-memory stand-in for the editor's DOM: nodes with a tag, marker
//! attributes, classes, inline style and the style the live layout
//! resolved for them.
//!
//! `inline` holds only what was set directly on a node. `computed` holds
//! everything the live layout resolved, including values that came from
//! classes. Export reads `inline` only, which is why the snapshot step
//! copies resolved values onto its clone first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::style::StyleMap;

/// Marks the root of the exportable meme.
pub const MEME_CONTAINER: &str = "data-meme-container";
/// Marks the header bar.
pub const HEADER_TEXT: &str = "data-header-text";
/// Marks the footer bar.
pub const FOOTER_TEXT: &str = "data-footer-text";
/// Marks a freely positioned caption.
pub const REGULAR_TEXT: &str = "data-regular-text";
/// Marks a selection highlight.
pub const SELECTION_RING: &str = "data-selection-ring";
/// Marks a caption showing placeholder text.
pub const PLACEHOLDER: &str = "data-placeholder";

/// Classes identifying editing affordances that must not be exported.
pub const IGNORED_CLASSES: &[&str] = &[
    "ring-2",
    "ring-blue-400",
    "pointer-events-none",
    "resize-handle",
    "control-handle",
];

/// Attributes identifying editing affordances that must not be exported.
pub const IGNORED_ATTRIBUTES: &[&str] = &[SELECTION_RING, PLACEHOLDER];

/// A node of the render tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    /// Element tag (`div`, `img`).
    pub tag: String,
    /// Attributes, including marker attributes.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Class list.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Style set directly on the node.
    #[serde(default)]
    pub inline: StyleMap,
    /// Style resolved by the live layout.
    #[serde(default)]
    pub computed: StyleMap,
    /// Text content.
    #[serde(default)]
    pub text: Option<String>,
    /// Image source for `img` nodes.
    #[serde(default)]
    pub src: Option<String>,
    /// Intrinsic image size for `img` nodes.
    #[serde(default)]
    pub natural_size: Option<(u32, u32)>,
    /// On-screen size after zoom.
    #[serde(default)]
    pub rendered_size: Option<(f32, f32)>,
    /// Child nodes in document order.
    #[serde(default)]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    /// Create a node with the given tag.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    /// Create a `div`.
    #[must_use]
    pub fn div() -> Self {
        Self::new("div")
    }

    /// Create an `img` with a source.
    #[must_use]
    pub fn img(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::new("img")
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    /// Add classes from a space-separated list.
    #[must_use]
    pub fn with_classes(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    /// Set an inline style property.
    #[must_use]
    pub fn with_inline(mut self, name: &str, value: impl Into<String>) -> Self {
        self.inline.set(name, value);
        self
    }

    /// Set a computed style property.
    #[must_use]
    pub fn with_computed(mut self, name: &str, value: impl Into<String>) -> Self {
        self.computed.set(name, value);
        self
    }

    /// Set text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the node carries an attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Whether the node carries a class.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Whether the node is an `img`.
    #[must_use]
    pub fn is_img(&self) -> bool {
        self.tag.eq_ignore_ascii_case("img")
    }

    /// Inline value, falling back to the computed value.
    #[must_use]
    pub fn resolved(&self, name: &str) -> Option<&str> {
        self.inline.get(name).or_else(|| self.computed.get(name))
    }

    /// Whether the node is an editing affordance excluded from export.
    #[must_use]
    pub fn is_editor_affordance(&self) -> bool {
        IGNORED_CLASSES.iter().any(|c| self.has_class(c))
            || IGNORED_ATTRIBUTES.iter().any(|a| self.has_attr(a))
    }

    /// Visit this node and its descendants in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// First node in document order matching `pred`.
    #[must_use]
    pub fn find(&self, pred: &impl Fn(&Self) -> bool) -> Option<&Self> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(pred))
    }

    /// All nodes in document order matching `pred`.
    #[must_use]
    pub fn find_all(&self, pred: &impl Fn(&Self) -> bool) -> Vec<&Self> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if pred(node) {
                found.push(node);
            }
        });
        found
    }

    /// Child-index paths of all nodes matching `pred`, in document order.
    #[must_use]
    pub fn paths(&self, pred: &impl Fn(&Self) -> bool) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let mut current = Vec::new();
        self.collect_paths(pred, &mut current, &mut out);
        out
    }

    fn collect_paths(
        &self,
        pred: &impl Fn(&Self) -> bool,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if pred(self) {
            out.push(current.clone());
        }
        for (i, child) in self.children.iter().enumerate() {
            current.push(i);
            child.collect_paths(pred, current, out);
            current.pop();
        }
    }

    /// Node at a child-index path.
    #[must_use]
    pub fn at(&self, path: &[usize]) -> Option<&Self> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get(i))
    }

    /// Mutable node at a child-index path.
    pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut Self> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }
}

/// Predicate: node carries the marker attribute `name`.
#[must_use]
pub fn marked(name: &'static str) -> impl Fn(&RenderNode) -> bool {
    move |node| node.has_attr(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RenderNode {
        RenderNode::div()
            .with_attr(MEME_CONTAINER, "")
            .with_child(RenderNode::div().with_attr(HEADER_TEXT, "").with_text("TOP"))
            .with_child(
                RenderNode::div()
                    .with_child(RenderNode::img("t.png"))
                    .with_child(
                        RenderNode::div()
                            .with_attr(REGULAR_TEXT, "true")
                            .with_text("mid")
                            .with_child(
                                RenderNode::div()
                                    .with_attr(SELECTION_RING, "")
                                    .with_classes("absolute inset-0 ring-2 ring-blue-400"),
                            ),
                    ),
            )
    }

    #[test]
    fn test_find_first_img() {
        let tree = sample();
        let img = tree.find(&RenderNode::is_img).expect("img");
        assert_eq!(img.src.as_deref(), Some("t.png"));
    }

    #[test]
    fn test_paths_and_at() {
        let mut tree = sample();
        let paths = tree.paths(&marked(REGULAR_TEXT));
        assert_eq!(paths, vec![vec![1, 1]]);

        let node = tree.at_mut(&paths[0]).expect("node");
        node.inline.set("color", "red");
        assert_eq!(
            tree.at(&[1, 1]).and_then(|n| n.inline.get("color")),
            Some("red")
        );
    }

    #[test]
    fn test_affordance_detection() {
        let tree = sample();
        let rings = tree.find_all(&RenderNode::is_editor_affordance);
        assert_eq!(rings.len(), 1);
        assert!(!RenderNode::div()
            .with_classes("absolute")
            .is_editor_affordance());
    }

    #[test]
    fn test_resolved_prefers_inline() {
        let node = RenderNode::div()
            .with_inline("left", "50%")
            .with_computed("left", "250px")
            .with_computed("width", "80px");
        assert_eq!(node.resolved("left"), Some("50%"));
        assert_eq!(node.resolved("width"), Some("80px"));
        assert_eq!(node.resolved("height"), None);
    }
}
