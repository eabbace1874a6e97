use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::gradient::{GradientKind, GradientNode};
use super::group::{ClipPathNode, GroupNode, UseReference};
use super::leaf::LeafNode;
use super::node::{NodeId, NodeKind, SvgNode, parse_declarations, url_reference};
use super::shapes::{SHAPE_TAGS, shape_path_data};
use super::{ClipPathReference, SvgTree};
use crate::format::parse_length;
use crate::transform::{AffineTransform, parse_transform_list};
use crate::xml::{XmlDocument, XmlNodeId};

static CLASS_RULE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^{}]+)\{([^}]*)\}").unwrap());

const DESCRIPTIVE_TAGS: &[&str] = &["title", "desc", "metadata"];

/// Elements with no drawable equivalent. Their ids are remembered so that
/// references to them are not reported as missing.
const UNSUPPORTED_TAGS: &[&str] = &[
    "text",
    "image",
    "pattern",
    "filter",
    "marker",
    "foreignObject",
    "animate",
    "animateColor",
    "animateMotion",
    "animateTransform",
    "set",
];

/// Builds an [`SvgTree`] from a parsed XML document, depth first.
pub struct TreeBuilder<'a> {
    document: &'a XmlDocument,
    tree: &'a mut SvgTree,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(document: &'a XmlDocument, tree: &'a mut SvgTree) -> Self {
        Self { document, tree }
    }

    /// Creates the root group from the `<svg>` element and traverses its
    /// content.
    pub fn build(&mut self, svg: XmlNodeId) -> NodeId {
        let root = self.create_node(svg, "root", NodeKind::Group(GroupNode::default()));
        self.tree.set_root(root);
        self.traverse(svg, root, false);
        root
    }

    fn traverse(&mut self, element: XmlNodeId, group: NodeId, in_defs: bool) {
        let children: Vec<XmlNodeId> = self.document.child_elements(element).collect();
        for child in children {
            self.visit(child, group, in_defs);
        }
    }

    fn visit(&mut self, element: XmlNodeId, group: NodeId, in_defs: bool) {
        let document = self.document;
        let Some(tag) = document.element(element).map(|e| e.name.clone()) else {
            return;
        };
        if self.is_hidden(element) {
            debug!(tag = %tag, "skipping element with display=none");
            return;
        }
        if DESCRIPTIVE_TAGS.contains(&tag.as_str()) || tag.contains(':') {
            return;
        }
        if UNSUPPORTED_TAGS.contains(&tag.as_str()) {
            if let Some(id) = document.attribute(element, "id") {
                self.tree.ignore_id(id);
            }
            if !in_defs && matches!(tag.as_str(), "text" | "image") {
                let line = self.line(element);
                self.tree.log_warning(line, format!("<{tag}> is not supported"));
            }
            return;
        }

        match tag.as_str() {
            tag if SHAPE_TAGS.contains(&tag) => {
                let path_data = document
                    .element(element)
                    .and_then(|e| shape_path_data(tag, &e.attributes));
                let leaf = NodeKind::Leaf(LeafNode::with_path_data(path_data));
                let id = self.create_node(element, tag, leaf);
                self.attach(element, id, group);
            }
            "g" | "switch" | "a" => {
                let id = self.create_node(element, &tag, NodeKind::Group(GroupNode::default()));
                self.attach(element, id, group);
                self.traverse(element, id, in_defs);
            }
            "svg" => {
                let id = self.create_node(element, &tag, NodeKind::Group(GroupNode::default()));
                let x = self.length(element, "x");
                let y = self.length(element, "y");
                self.tree
                    .node_mut(id)
                    .local_transform
                    .pre_concatenate(&AffineTransform::translation(x, y));
                self.attach(element, id, group);
                self.traverse(element, id, in_defs);
            }
            "symbol" => {
                let id = self.create_node(element, &tag, NodeKind::Group(GroupNode::default()));
                self.traverse(element, id, in_defs);
            }
            "defs" => self.traverse(element, group, true),
            "clipPath" | "mask" => {
                let clip = ClipPathNode {
                    is_mask: tag == "mask",
                    ..ClipPathNode::default()
                };
                let id = self.create_node(element, &tag, NodeKind::ClipPath(clip));
                self.traverse(element, id, in_defs);
            }
            "use" => {
                let href = document
                    .attribute(element, "xlink:href")
                    .or_else(|| document.attribute(element, "href"))
                    .map(|href| href.trim().trim_start_matches('#').to_string())
                    .unwrap_or_default();
                let reference = UseReference {
                    href,
                    x: self.length(element, "x"),
                    y: self.length(element, "y"),
                    target: None,
                };
                let kind = NodeKind::Group(GroupNode {
                    children: Vec::new(),
                    use_ref: Some(reference),
                });
                let id = self.create_node(element, &tag, kind);
                self.tree.pending_use.insert(id);
                self.attach(element, id, group);
            }
            "linearGradient" | "radialGradient" => {
                let kind = if tag == "linearGradient" {
                    GradientKind::Linear
                } else {
                    GradientKind::Radial
                };
                let gradient = GradientNode::from_element(kind, document, element);
                let has_href = gradient.href.is_some();
                let id = self.create_node(element, &tag, NodeKind::Gradient(gradient));
                if has_href {
                    self.tree.pending_gradients.insert(id);
                }
            }
            "style" => {
                let text = document.text_content(element);
                self.parse_style_sheet(&text);
            }
            _ => debug!(tag = %tag, "ignoring unknown element"),
        }
    }

    fn line(&self, element: XmlNodeId) -> usize {
        self.document.element(element).map_or(0, |e| e.line)
    }

    fn length(&self, element: XmlNodeId, name: &str) -> f64 {
        self.document
            .attribute(element, name)
            .and_then(parse_length)
            .unwrap_or(0.0)
    }

    fn is_hidden(&self, element: XmlNodeId) -> bool {
        if self.document.attribute(element, "display").map(str::trim) == Some("none") {
            return true;
        }
        self.document
            .attribute(element, "style")
            .map(parse_declarations)
            .is_some_and(|declarations| {
                declarations
                    .iter()
                    .any(|(name, value)| name == "display" && value == "none")
            })
    }

    /// Creates a node with presentation attributes, transform, inline style
    /// and id/class registrations applied.
    fn create_node(&mut self, element: XmlNodeId, tag: &str, kind: NodeKind) -> NodeId {
        let document = self.document;
        let line = self.line(element);
        let id_attribute = document.attribute(element, "id");
        let mut node = SvgNode::new(id_attribute.unwrap_or(tag), tag, line, kind);

        if let Some(xml) = document.element(element) {
            let mut names: Vec<&String> = xml.attributes.keys().collect();
            names.sort();
            for name in names {
                node.set_presentation_attribute(name, &xml.attributes[name]);
            }
        }
        if let Some(transform) = document.attribute(element, "transform") {
            let parsed = parse_transform_list(transform);
            node.local_transform = parsed.transform;
            for rejected in parsed.rejected {
                self.tree
                    .log_warning(line, format!("Unsupported transform \"{rejected}\""));
            }
        }
        if let Some(style) = document.attribute(element, "style") {
            node.apply_declarations(style);
        }

        let id = self.tree.add_node(node);
        if let Some(name) = id_attribute {
            self.tree.register_id(name, id);
        }
        if let Some(classes) = document.attribute(element, "class") {
            for class in classes.split_whitespace() {
                self.tree
                    .style_affected
                    .entry(class.to_string())
                    .or_default()
                    .push(id);
            }
        }
        id
    }

    /// Appends `id` to `group` and records a clip-path reference when the
    /// element has one.
    fn attach(&mut self, element: XmlNodeId, id: NodeId, group: NodeId) {
        let document = self.document;
        if let Some(children) = self.tree.node_mut(group).kind.children_mut() {
            children.push(id);
        }
        let style_clip = document.attribute(element, "style").and_then(|style| {
            parse_declarations(style)
                .into_iter()
                .filter(|(name, _)| name == "clip-path" || name == "mask")
                .find_map(|(_, value)| url_reference(&value).map(str::to_string))
        });
        let attribute_clip = ["clip-path", "mask"].iter().find_map(|name| {
            document
                .attribute(element, name)
                .and_then(url_reference)
                .map(str::to_string)
        });
        if let Some(clip) = style_clip.or(attribute_clip) {
            let line = self.line(element);
            self.tree.clip_path_refs.push(ClipPathReference {
                node: id,
                parent: group,
                id: clip,
                line,
            });
        }
    }

    fn parse_style_sheet(&mut self, text: &str) {
        for caps in CLASS_RULE_RE.captures_iter(text) {
            let declarations = caps[2].trim();
            for selector in caps[1].split(',') {
                let Some(class) = selector.trim().strip_prefix('.') else {
                    debug!(selector = selector.trim(), "ignoring non-class selector");
                    continue;
                };
                let rules = self.tree.style_classes.entry(class.to_string()).or_default();
                if !rules.is_empty() && !rules.ends_with(';') {
                    rules.push(';');
                }
                rules.push_str(declarations);
            }
        }
    }
}
