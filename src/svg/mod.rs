//! SVG document model.
//!
//! Nodes live in an arena owned by [`SvgTree`] and refer to each other by
//! [`NodeId`]. A conversion runs the tree through construction, reference
//! resolution, flattening, validation and serialization, in that order.

pub mod builder;
pub mod gradient;
pub mod group;
pub mod leaf;
pub mod node;
pub mod shapes;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use once_cell::unsync::OnceCell;
use tracing::debug;

pub use builder::TreeBuilder;
pub use gradient::{GradientKind, GradientNode, GradientStop, GradientUnits, GradientUsage, SpreadMethod};
pub use group::{ClipPathNode, GroupNode, UseReference};
pub use leaf::LeafNode;
pub use node::{NodeId, NodeKind, SvgNode};

use crate::diagnostic::Diagnostic;
use crate::error::ConvertError;
use crate::format::{CoordinateFormat, format_float_value, parse_length};
use crate::render::escape_xml;
use crate::transform::AffineTransform;
use crate::xml::{XmlDocument, XmlNodeId};

pub(crate) const INDENT: &str = "    ";
pub(crate) const CONTINUATION_INDENT: &str = INDENT;

const ANDROID_NAMESPACE: &str = "http://schemas.android.com/apk/res/android";
const AAPT_NAMESPACE: &str = "http://schemas.android.com/aapt";

/// A `clip-path` or `mask` reference found on a node, resolved after all
/// ids are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPathReference {
    pub node: NodeId,
    pub parent: NodeId,
    pub id: String,
    pub line: usize,
}

/// Per-conversion state: the node arena, id registries and diagnostics.
#[derive(Debug, Default)]
pub struct SvgTree {
    width: Option<f64>,
    height: Option<f64>,
    view_box: Option<[f64; 4]>,
    root: Option<NodeId>,
    nodes: Vec<SvgNode>,
    id_map: HashMap<String, NodeId>,
    ignored_ids: HashSet<String>,
    pub(crate) pending_use: BTreeSet<NodeId>,
    pub(crate) pending_gradients: BTreeSet<NodeId>,
    pub(crate) clip_path_refs: Vec<ClipPathReference>,
    pub(crate) style_affected: BTreeMap<String, Vec<NodeId>>,
    pub(crate) style_classes: BTreeMap<String, String>,
    diagnostics: Vec<Diagnostic>,
    coordinate_format: OnceCell<CoordinateFormat>,
}

impl SvgTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn width(&self) -> Option<f64> {
        self.width
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// `[min_x, min_y, width, height]`.
    pub fn view_box(&self) -> Option<[f64; 4]> {
        self.view_box
    }

    pub fn node(&self, id: NodeId) -> &SvgNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SvgNode {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self, node: SvgNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn log_error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(line, message));
    }

    pub fn log_warning(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(line, message));
    }

    /// Registers `id` for `node`. A later element with the same id wins.
    pub fn register_id(&mut self, id: &str, node: NodeId) {
        if self.id_map.insert(id.to_string(), node).is_some() {
            debug!(id, "duplicate id, keeping the later element");
        }
    }

    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    pub fn ignore_id(&mut self, id: &str) {
        self.ignored_ids.insert(id.to_string());
    }

    pub fn is_ignored(&self, id: &str) -> bool {
        self.ignored_ids.contains(id)
    }

    /// Formatter for output coordinates, derived from the larger viewport
    /// dimension on first use.
    pub fn coordinate_format(&self) -> CoordinateFormat {
        *self.coordinate_format.get_or_init(|| {
            let size = self
                .view_box
                .map(|[_, _, width, height]| width.max(height))
                .unwrap_or(0.0);
            CoordinateFormat::for_viewport(size)
        })
    }

    /// Reads `width`, `height` and `viewBox` from the `<svg>` element. A
    /// missing view box is derived from the dimensions; percentages resolve
    /// against the view box. Returns false when no view box can be found.
    pub fn parse_dimensions(&mut self, document: &XmlDocument, root: XmlNodeId) -> bool {
        let view_box = document.attribute(root, "viewBox").and_then(parse_view_box);
        let dimension = |name: &str, index: usize| -> Option<f64> {
            let value = document.attribute(root, name)?.trim();
            match value.strip_suffix('%') {
                Some(percent) => {
                    let percent = percent.trim().parse::<f64>().ok()?;
                    view_box.map(|view_box| view_box[index] * percent / 100.0)
                }
                None => parse_length(value),
            }
        };
        let width = dimension("width", 2).filter(|w| *w > 0.0);
        let height = dimension("height", 3).filter(|h| *h > 0.0);
        self.view_box = match (view_box, width, height) {
            (Some(view_box), _, _) => Some(view_box),
            (None, Some(width), Some(height)) => Some([0.0, 0.0, width, height]),
            _ => None,
        };
        let Some([_, _, view_width, view_height]) = self.view_box else {
            return false;
        };
        self.width = Some(width.unwrap_or(view_width));
        self.height = Some(height.unwrap_or(view_height));
        true
    }

    /// Deep-copies `id` and everything it owns. Class registrations and
    /// clip-path references of the originals are repeated for the copies;
    /// `parent` is the group the copy will be attached to.
    pub fn deep_copy(&mut self, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let mut copy = self.node(id).clone();
        let copy_id = NodeId(self.nodes.len());
        self.nodes.push(copy.clone());

        match &mut copy.kind {
            NodeKind::Group(group) => {
                group.children = self.copy_children(&group.children, copy_id);
                if let Some(reference) = group.use_ref.as_mut() {
                    reference.target = group.children.first().copied();
                }
            }
            NodeKind::ClipPath(clip) => {
                clip.group.children = self.copy_children(&clip.group.children, copy_id);
                clip.affected = self.copy_children(&clip.affected, copy_id);
            }
            NodeKind::Leaf(leaf) => {
                leaf.fill_gradient = leaf.fill_gradient.map(|g| self.deep_copy(g, None));
                leaf.stroke_gradient = leaf.stroke_gradient.map(|g| self.deep_copy(g, None));
            }
            NodeKind::Gradient(_) => {}
        }
        self.nodes[copy_id.0] = copy;

        for affected in self.style_affected.values_mut() {
            if affected.contains(&id) {
                affected.push(copy_id);
            }
        }
        if let Some(parent) = parent {
            let copied: Vec<ClipPathReference> = self
                .clip_path_refs
                .iter()
                .filter(|reference| reference.node == id)
                .map(|reference| ClipPathReference {
                    node: copy_id,
                    parent,
                    id: reference.id.clone(),
                    line: reference.line,
                })
                .collect();
            self.clip_path_refs.extend(copied);
        }
        copy_id
    }

    fn copy_children(&mut self, children: &[NodeId], parent: NodeId) -> Vec<NodeId> {
        children
            .iter()
            .map(|child| self.deep_copy(*child, Some(parent)))
            .collect()
    }

    /// Applies the declarations of `<style>` class rules to the nodes that
    /// carry those classes. Runs after inline styles, so classes win.
    pub fn apply_style_classes(&mut self) {
        let affected = std::mem::take(&mut self.style_affected);
        for (class, nodes) in &affected {
            let Some(declarations) = self.style_classes.get(class).cloned() else {
                continue;
            };
            for id in nodes {
                if let Some(clip_id) = self.node_mut(*id).apply_declarations(&declarations) {
                    debug!(class = %class, clip_id = %clip_id, "clip path in style class ignored");
                }
            }
        }
        self.style_affected = affected;
    }

    /// Computes stacked transforms and inherited attributes for the whole
    /// tree and rewrites path data into viewport space.
    pub fn flatten(&mut self) -> Result<(), ConvertError> {
        let Some(root) = self.root else {
            return Ok(());
        };
        let [min_x, min_y, _, _] = self.view_box.unwrap_or_default();
        let origin = AffineTransform::translation(-min_x, -min_y);
        self.flatten_node(root, &origin, &BTreeMap::new())
    }

    pub(crate) fn flatten_node(
        &mut self,
        id: NodeId,
        parent_transform: &AffineTransform,
        inherited: &BTreeMap<String, String>,
    ) -> Result<(), ConvertError> {
        if matches!(self.node(id).kind, NodeKind::ClipPath(_)) {
            return self.flatten_clip_path(id, parent_transform, inherited);
        }
        let node = self.node_mut(id);
        node.inherit_from(inherited);
        let mut stacked = *parent_transform;
        stacked.concatenate(&node.local_transform);
        node.stacked_transform = stacked;
        if matches!(node.kind, NodeKind::Leaf(_)) {
            return self.flatten_leaf(id);
        }
        let children = node.kind.children().to_vec();
        let attributes = node.attributes.clone();
        for child in children {
            self.flatten_node(child, &stacked, &attributes)?;
        }
        Ok(())
    }

    /// Runs the tree-level checks: mask colors and presence of content.
    pub fn validate(&mut self) {
        if let Some(root) = self.root {
            self.validate_node(root);
        }
        if !self.has_leaf_content() {
            self.log_error(0, "No vector content found");
        }
    }

    fn validate_node(&mut self, id: NodeId) {
        let children = self.node(id).kind.children().to_vec();
        if let NodeKind::ClipPath(clip) = &self.node(id).kind {
            let affected = clip.affected.clone();
            if clip.is_mask {
                self.validate_mask(id);
            }
            for node in affected {
                self.validate_node(node);
            }
            return;
        }
        for child in children {
            self.validate_node(child);
        }
    }

    /// True when some reachable leaf has non-empty path data.
    pub fn has_leaf_content(&self) -> bool {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            match &self.node(id).kind {
                NodeKind::Leaf(leaf) => {
                    if leaf.path_data.as_deref().is_some_and(|data| !data.is_empty()) {
                        return true;
                    }
                }
                NodeKind::Group(group) => stack.extend(&group.children),
                NodeKind::ClipPath(clip) => stack.extend(&clip.affected),
                NodeKind::Gradient(_) => {}
            }
        }
        false
    }

    /// True when any leaf reachable from the root paints with a gradient.
    pub fn has_gradient(&self) -> bool {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            match &self.node(id).kind {
                NodeKind::Leaf(leaf) => {
                    if leaf.fill_gradient.is_some() || leaf.stroke_gradient.is_some() {
                        return true;
                    }
                }
                NodeKind::Group(group) => stack.extend(&group.children),
                NodeKind::ClipPath(clip) => {
                    stack.extend(&clip.group.children);
                    stack.extend(&clip.affected);
                }
                NodeKind::Gradient(_) => {}
            }
        }
        false
    }

    /// Serializes the flattened tree as a vector drawable document.
    pub fn write_xml(&self) -> String {
        let mut out = String::new();
        let [_, _, view_width, view_height] = self.view_box.unwrap_or_default();
        let width = self.width.unwrap_or(view_width);
        let height = self.height.unwrap_or(view_height);
        out.push_str(&format!("<vector xmlns:android=\"{ANDROID_NAMESPACE}\""));
        if self.has_gradient() {
            out.push_str(&format!("\n{INDENT}xmlns:aapt=\"{AAPT_NAMESPACE}\""));
        }
        for (name, value) in [
            ("width", format!("{}dp", format_float_value(width))),
            ("height", format!("{}dp", format_float_value(height))),
            ("viewportWidth", format_float_value(view_width)),
            ("viewportHeight", format_float_value(view_height)),
        ] {
            out.push_str(&format!("\n{INDENT}android:{name}=\"{}\"", escape_xml(&value)));
        }
        out.push_str(">\n");
        if let Some(root) = self.root {
            self.write_node(root, 1, &mut out);
        }
        out.push_str("</vector>\n");
        out
    }

    pub(crate) fn write_node(&self, id: NodeId, indent: usize, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Group(group) => {
                for child in &group.children {
                    self.write_node(*child, indent, out);
                }
            }
            NodeKind::ClipPath(_) => self.write_clip_path(id, indent, out),
            NodeKind::Leaf(_) => self.write_leaf(id, indent, out),
            NodeKind::Gradient(_) => {}
        }
    }
}

fn parse_view_box(value: &str) -> Option<[f64; 4]> {
    let numbers: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<f64>().ok())
        .collect::<Option<_>>()?;
    match numbers.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Some([*x, *y, *w, *h]),
        _ => None,
    }
}

pub(crate) fn pad(indent: usize) -> String {
    INDENT.repeat(indent)
}
