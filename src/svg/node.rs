use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::gradient::GradientNode;
use super::group::{ClipPathNode, GroupNode};
use super::leaf::LeafNode;
use crate::format::{format_float_value, parse_opacity};
use crate::transform::AffineTransform;

static URL_REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^url\(\s*['"]?#([^'")\s]+)['"]?\s*\)$"#).unwrap());

/// Presentation attributes carried on nodes and merged down the tree.
pub const PRESENTATION_ATTRIBUTES: &[&str] = &[
    "clip-rule",
    "color",
    "fill",
    "fill-opacity",
    "fill-rule",
    "opacity",
    "stroke",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "stroke-width",
    "vector-effect",
];

/// Attributes that apply to a single element only.
const NON_INHERITED: &[&str] = &["opacity", "vector-effect"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Leaf(LeafNode),
    Group(GroupNode),
    ClipPath(ClipPathNode),
    Gradient(GradientNode),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Leaf(_) => "leaf",
            NodeKind::Group(_) => "group",
            NodeKind::ClipPath(_) => "clip-path",
            NodeKind::Gradient(_) => "gradient",
        }
    }

    /// Child list of groups and clip paths; empty for other variants.
    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::Group(group) => &group.children,
            NodeKind::ClipPath(clip) => &clip.group.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            NodeKind::Group(group) => Some(&mut group.children),
            NodeKind::ClipPath(clip) => Some(&mut clip.group.children),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SvgNode {
    pub name: String,
    pub tag: String,
    pub line: usize,
    pub attributes: BTreeMap<String, String>,
    pub local_transform: AffineTransform,
    pub stacked_transform: AffineTransform,
    pub stroke_before_fill: bool,
    pub kind: NodeKind,
}

impl SvgNode {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, line: usize, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            line,
            attributes: BTreeMap::new(),
            local_transform: AffineTransform::IDENTITY,
            stacked_transform: AffineTransform::IDENTITY,
            stroke_before_fill: false,
            kind,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Stores a presentation attribute, normalizing rule keywords. Returns
    /// false for names that are not presentation attributes.
    pub fn set_presentation_attribute(&mut self, name: &str, value: &str) -> bool {
        let value = value.trim();
        if name == "paint-order" {
            self.stroke_before_fill = paints_stroke_first(value);
            return true;
        }
        if !PRESENTATION_ATTRIBUTES.contains(&name) || value.is_empty() || value == "inherit" {
            return false;
        }
        let value = match (name, value) {
            ("fill-rule" | "clip-rule", "evenodd") => "evenOdd",
            ("fill-rule" | "clip-rule", "nonzero") => "nonZero",
            _ => value,
        };
        self.attributes.insert(name.to_string(), value.to_string());
        true
    }

    /// Applies `name: value; ...` declarations. Returns the id named by a
    /// `clip-path` or `mask` declaration, if any.
    pub fn apply_declarations(&mut self, declarations: &str) -> Option<String> {
        let mut clip_reference = None;
        for (name, value) in parse_declarations(declarations) {
            if name == "clip-path" || name == "mask" {
                if let Some(id) = url_reference(&value) {
                    clip_reference = Some(id.to_string());
                }
                continue;
            }
            self.set_presentation_attribute(&name, &value);
        }
        clip_reference
    }

    /// Copies attributes this node does not define. Opacity is skipped since
    /// it composes through [`SvgNode::inherit_from`] instead.
    pub fn fill_empty_attributes(&mut self, source: &BTreeMap<String, String>) {
        for (name, value) in source {
            if name == "opacity" {
                continue;
            }
            self.attributes
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Merges the effective attributes of the parent: missing inherited
    /// attributes are copied and opacities multiply.
    pub fn inherit_from(&mut self, parent: &BTreeMap<String, String>) {
        for (name, value) in parent {
            if name == "opacity" {
                let own = self
                    .attribute("opacity")
                    .and_then(parse_opacity)
                    .unwrap_or(1.0);
                let inherited = parse_opacity(value).unwrap_or(1.0);
                self.attributes
                    .insert(name.clone(), format_float_value(own * inherited));
                continue;
            }
            if NON_INHERITED.contains(&name.as_str()) {
                continue;
            }
            self.attributes
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

fn paints_stroke_first(value: &str) -> bool {
    let mut order = value.split_whitespace().filter(|token| *token != "markers");
    order.next() == Some("stroke")
}

/// Splits CSS-style declarations into trimmed `(name, value)` pairs.
pub fn parse_declarations(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            let value = value.trim().trim_end_matches("!important").trim();
            (!name.is_empty() && !value.is_empty())
                .then(|| (name.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

/// Extracts `id` from `url(#id)`.
pub fn url_reference(value: &str) -> Option<&str> {
    URL_REFERENCE_RE
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> SvgNode {
        SvgNode::new("g", "g", 1, NodeKind::Group(GroupNode::default()))
    }

    #[test]
    fn normalizes_fill_rule() {
        let mut node = group();
        assert!(node.set_presentation_attribute("fill-rule", "evenodd"));
        assert!(!node.set_presentation_attribute("font-size", "12"));
        assert_eq!(node.attribute("fill-rule"), Some("evenOdd"));
    }

    #[test]
    fn declarations_set_attributes_and_report_clip() {
        let mut node = group();
        let clip = node.apply_declarations("fill: red; clip-path: url(#c); paint-order: stroke");
        assert_eq!(clip.as_deref(), Some("c"));
        assert_eq!(node.attribute("fill"), Some("red"));
        assert!(node.stroke_before_fill);
    }

    #[test]
    fn inheritance_multiplies_opacity() {
        let mut parent = BTreeMap::new();
        parent.insert("opacity".to_string(), "0.5".to_string());
        parent.insert("fill".to_string(), "red".to_string());
        let mut child = group();
        child.set_presentation_attribute("opacity", "0.5");
        child.set_presentation_attribute("fill", "blue");
        child.inherit_from(&parent);
        assert_eq!(child.attribute("opacity"), Some("0.25"));
        assert_eq!(child.attribute("fill"), Some("blue"));
    }

    #[test]
    fn parses_url_references() {
        assert_eq!(url_reference("url(#grad)"), Some("grad"));
        assert_eq!(url_reference("url('#a-b')"), Some("a-b"));
        assert_eq!(url_reference("red"), None);
    }
}
