use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::node::{NodeId, NodeKind};
use super::{CONTINUATION_INDENT, SvgTree, pad};
use crate::color::is_opaque_white;
use crate::error::ConvertError;
use crate::format::parse_opacity;
use crate::render::escape_xml;
use crate::transform::AffineTransform;
use crate::xml::MAX_NESTING_DEPTH;

/// Reference carried by a group created from a `<use>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct UseReference {
    pub href: String,
    pub x: f64,
    pub y: f64,
    /// The instanced copy, once resolved.
    pub target: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    pub children: Vec<NodeId>,
    pub use_ref: Option<UseReference>,
}

/// A group whose children define a clip region for the `affected` nodes.
/// The affected nodes are moved here from their original parent.
#[derive(Debug, Clone, Default)]
pub struct ClipPathNode {
    pub group: GroupNode,
    pub affected: Vec<NodeId>,
    pub is_mask: bool,
}

impl SvgTree {
    fn use_reference(&self, id: NodeId) -> Option<&UseReference> {
        match &self.node(id).kind {
            NodeKind::Group(group) => group.use_ref.as_ref(),
            _ => None,
        }
    }

    /// True when `id` is, or owns, a `use` group that is still unresolved.
    fn contains_pending_use(&self, id: NodeId, pending: &BTreeSet<NodeId>) -> bool {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if pending.contains(&current) {
                return true;
            }
            match &self.node(current).kind {
                NodeKind::Group(group) => stack.extend(&group.children),
                NodeKind::ClipPath(clip) => {
                    stack.extend(&clip.group.children);
                    stack.extend(&clip.affected);
                }
                _ => {}
            }
        }
        false
    }

    /// Number of levels in the subtree rooted at `id`.
    fn subtree_depth(&self, id: NodeId) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(id, 1)];
        while let Some((current, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let kind = &self.node(current).kind;
            if let NodeKind::ClipPath(clip) = kind {
                stack.extend(clip.affected.iter().map(|child| (*child, depth + 1)));
            }
            stack.extend(kind.children().iter().map(|child| (*child, depth + 1)));
        }
        deepest
    }

    /// Instantiates `use` targets in passes. A `use` whose target still
    /// contains unresolved `use` elements waits; a pass that resolves
    /// nothing ends the loop and the remaining references are dropped.
    pub fn resolve_use_references(&mut self) {
        let mut pending: BTreeSet<NodeId> = std::mem::take(&mut self.pending_use);
        while !pending.is_empty() {
            let mut progressed = false;
            for id in pending.clone() {
                let Some(reference) = self.use_reference(id).cloned() else {
                    pending.remove(&id);
                    progressed = true;
                    continue;
                };
                let Some(target) = self.lookup(&reference.href) else {
                    if !self.is_ignored(&reference.href) {
                        let line = self.node(id).line;
                        self.log_error(line, "Referenced id not found");
                    }
                    pending.remove(&id);
                    progressed = true;
                    continue;
                };
                if self.contains_pending_use(target, &pending) {
                    continue;
                }
                if self.subtree_depth(target) > MAX_NESTING_DEPTH {
                    let line = self.node(id).line;
                    self.log_error(line, "Document nested too deeply");
                    pending.remove(&id);
                    progressed = true;
                    continue;
                }

                let copy = self.deep_copy(target, Some(id));
                let use_attributes = self.node(id).attributes.clone();
                let copy_node = self.node_mut(copy);
                copy_node.fill_empty_attributes(&use_attributes);
                copy_node
                    .local_transform
                    .pre_concatenate(&AffineTransform::translation(reference.x, reference.y));
                if let NodeKind::Group(group) = &mut self.node_mut(id).kind {
                    group.children = vec![copy];
                    if let Some(reference) = group.use_ref.as_mut() {
                        reference.target = Some(copy);
                    }
                }
                pending.remove(&id);
                progressed = true;
            }
            if !progressed {
                debug!(count = pending.len(), "dropping circular use references");
                break;
            }
        }
    }

    /// Moves every clipped node under a private copy of its clip path. The
    /// copy takes the node's place in the parent.
    pub fn handle_clip_paths(&mut self) {
        let references = std::mem::take(&mut self.clip_path_refs);
        for reference in &references {
            let Some(target) = self.lookup(&reference.id) else {
                if !self.is_ignored(&reference.id) {
                    self.log_error(reference.line, "Referenced id not found");
                }
                continue;
            };
            if !matches!(self.node(target).kind, NodeKind::ClipPath(_)) {
                self.log_error(reference.line, "Unsupported URL value");
                continue;
            }
            let Some(slot) = self
                .node(reference.parent)
                .kind
                .children()
                .iter()
                .position(|child| *child == reference.node)
            else {
                debug!(id = %reference.id, "clipped node no longer attached to its parent");
                continue;
            };

            let copy = self.deep_copy(target, None);
            let node_transform = self.node(reference.node).local_transform;
            let copy_node = self.node_mut(copy);
            copy_node.local_transform.concatenate(&node_transform);
            if let NodeKind::ClipPath(clip) = &mut copy_node.kind {
                clip.affected.push(reference.node);
            }
            if let Some(children) = self.node_mut(reference.parent).kind.children_mut() {
                children[slot] = copy;
            }
        }
        self.clip_path_refs = references;
    }

    /// Clip content is flattened under the clip path's own transform, the
    /// affected nodes under the parent transform only.
    pub(crate) fn flatten_clip_path(
        &mut self,
        id: NodeId,
        parent_transform: &AffineTransform,
        inherited: &BTreeMap<String, String>,
    ) -> Result<(), ConvertError> {
        let node = self.node_mut(id);
        let mut stacked = *parent_transform;
        stacked.concatenate(&node.local_transform);
        node.stacked_transform = stacked;
        let attributes = node.attributes.clone();
        let (children, affected) = match &node.kind {
            NodeKind::ClipPath(clip) => (clip.group.children.clone(), clip.affected.clone()),
            _ => return Ok(()),
        };
        for child in children {
            self.flatten_node(child, &stacked, &attributes)?;
        }
        for node in affected {
            self.flatten_node(node, parent_transform, inherited)?;
        }
        Ok(())
    }

    /// Masks are written as clip paths, which only works for opaque white
    /// content.
    pub(crate) fn validate_mask(&mut self, id: NodeId) {
        let mut stack = self.node(id).kind.children().to_vec();
        let mut rejected = Vec::new();
        while let Some(current) = stack.pop() {
            match &self.node(current).kind {
                NodeKind::Leaf(_) => {
                    let opaque_white = self
                        .fill_color(current)
                        .is_some_and(|color| is_opaque_white(&color))
                        && is_fully_opaque(self.node(current).attribute("fill-opacity"))
                        && is_fully_opaque(self.node(current).attribute("opacity"));
                    if !opaque_white {
                        rejected.push(self.node(current).line);
                    }
                }
                kind => stack.extend(kind.children()),
            }
        }
        for line in rejected {
            self.log_error(
                line,
                "Semitransparent or colored mask cannot be represented by a vector drawable",
            );
        }
    }

    /// Collects the path data of clip content, grouped by clip rule.
    fn clip_path_data(&self, id: NodeId) -> (Vec<String>, Vec<String>) {
        let mut non_zero = Vec::new();
        let mut even_odd = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).kind.children().iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            match &node.kind {
                NodeKind::Leaf(leaf) => {
                    let Some(data) = leaf.path_data.as_deref().filter(|d| !d.is_empty()) else {
                        continue;
                    };
                    let rule = node.attribute("clip-rule").or_else(|| node.attribute("fill-rule"));
                    let piece = if data.starts_with('M') {
                        data.to_string()
                    } else {
                        format!("M 0,0{data}")
                    };
                    if rule == Some("evenOdd") {
                        even_odd.push(piece);
                    } else {
                        non_zero.push(piece);
                    }
                }
                kind => stack.extend(kind.children().iter().rev()),
            }
        }
        (non_zero, even_odd)
    }

    pub(crate) fn write_clip_path(&self, id: NodeId, indent: usize, out: &mut String) {
        let padding = pad(indent);
        let inner = pad(indent + 1);
        out.push_str(&format!("{padding}<group>\n"));
        let (non_zero, even_odd) = self.clip_path_data(id);
        for (pieces, fill_type) in [(non_zero, None), (even_odd, Some("evenOdd"))] {
            if pieces.is_empty() {
                continue;
            }
            out.push_str(&format!("{inner}<clip-path\n"));
            out.push_str(&format!(
                "{inner}{CONTINUATION_INDENT}android:pathData=\"{}\"",
                escape_xml(&pieces.concat())
            ));
            if let Some(fill_type) = fill_type {
                out.push_str(&format!("\n{inner}{CONTINUATION_INDENT}android:fillType=\"{fill_type}\""));
            }
            out.push_str("/>\n");
        }
        if let NodeKind::ClipPath(clip) = &self.node(id).kind {
            for affected in &clip.affected {
                self.write_node(*affected, indent + 1, out);
            }
        }
        out.push_str(&format!("{padding}</group>\n"));
    }
}

/// Absent opacity counts as opaque.
fn is_fully_opaque(value: Option<&str>) -> bool {
    value.is_none_or(|value| parse_opacity(value) == Some(1.0))
}
