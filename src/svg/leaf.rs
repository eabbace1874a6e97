use tracing::debug;

use super::node::{NodeId, NodeKind, SvgNode, url_reference};
use super::{CONTINUATION_INDENT, SvgTree, pad};
use crate::color::{is_transparent, svg_color_to_vd};
use crate::error::ConvertError;
use crate::format::{format_float_value, parse_length, parse_opacity};
use crate::path::{bounds, has_rel_move_after_close, node_list_to_string, parse_path, transform_nodes};
use crate::render::escape_xml;
use crate::transform::TransformType;

const DEFAULT_FILL_COLOR: &str = "#FF000000";
const DEFAULT_STROKE_WIDTH: &str = "1";

/// A drawable shape: path data plus its own copies of any gradients it
/// paints with.
#[derive(Debug, Clone, Default)]
pub struct LeafNode {
    pub path_data: Option<String>,
    pub fill_gradient: Option<NodeId>,
    pub stroke_gradient: Option<NodeId>,
}

impl LeafNode {
    pub fn with_path_data(path_data: Option<String>) -> Self {
        Self {
            path_data,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paint {
    Fill,
    Stroke,
}

impl Paint {
    fn attribute(self) -> &'static str {
        match self {
            Paint::Fill => "fill",
            Paint::Stroke => "stroke",
        }
    }
}

impl SvgTree {
    pub(crate) fn leaf(&self, id: NodeId) -> Option<&LeafNode> {
        match &self.node(id).kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> Option<&mut LeafNode> {
        match &mut self.node_mut(id).kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Resolves paints, rewrites the path data under the stacked transform
    /// and scales the stroke width. Inherited attributes are already merged.
    pub(crate) fn flatten_leaf(&mut self, id: NodeId) -> Result<(), ConvertError> {
        self.resolve_paint(id, Paint::Fill);
        self.resolve_paint(id, Paint::Stroke);

        let node = self.node(id);
        let line = node.line;
        let stacked = node.stacked_transform;
        let Some(path_data) = self.leaf(id).and_then(|leaf| leaf.path_data.clone()) else {
            return Ok(());
        };

        let mut nodes =
            parse_path(&path_data).map_err(|source| ConvertError::PathData { line, source })?;
        let user_bounds = bounds(&nodes);
        if !stacked.is_identity() || has_rel_move_after_close(&nodes) {
            transform_nodes(&stacked, &mut nodes);
        }
        let format = self.coordinate_format();
        let rewritten = node_list_to_string(&nodes, &format)
            .map_err(|source| ConvertError::PathData { line, source })?;
        if let Some(leaf) = self.leaf_mut(id) {
            leaf.path_data = Some(rewritten);
        }

        self.scale_stroke_width(id);

        let (fill_gradient, stroke_gradient) = match self.leaf(id) {
            Some(leaf) => (leaf.fill_gradient, leaf.stroke_gradient),
            None => (None, None),
        };
        for gradient in [fill_gradient, stroke_gradient].into_iter().flatten() {
            self.flatten_gradient(gradient, &stacked, user_bounds, line);
        }
        Ok(())
    }

    /// Turns a `url(#id)` paint into a private gradient copy and checks that
    /// other paints are colors.
    fn resolve_paint(&mut self, id: NodeId, paint: Paint) {
        let node = self.node(id);
        let line = node.line;
        let Some(value) = node.attribute(paint.attribute()).map(str::to_string) else {
            return;
        };
        if value == "none" {
            return;
        }
        if value == "currentColor" {
            let color = node.attribute("color").unwrap_or("black").to_string();
            self.node_mut(id)
                .attributes
                .insert(paint.attribute().to_string(), color);
            return;
        }
        let Some(reference) = url_reference(&value).map(str::to_string) else {
            if svg_color_to_vd(&value).is_none() {
                self.log_error(line, format!("Unsupported color format \"{value}\""));
            }
            return;
        };

        self.node_mut(id)
            .attributes
            .insert(paint.attribute().to_string(), "none".to_string());
        let Some(target) = self.lookup(&reference) else {
            if !self.is_ignored(&reference) {
                self.log_error(line, "Referenced id not found");
            }
            return;
        };
        if !matches!(self.node(target).kind, NodeKind::Gradient(_)) {
            self.log_error(line, "Unsupported URL value");
            return;
        }
        let copy = self.deep_copy(target, None);
        let has_stops = match &mut self.node_mut(copy).kind {
            NodeKind::Gradient(gradient) => {
                gradient.usage = match paint {
                    Paint::Fill => super::GradientUsage::Fill,
                    Paint::Stroke => super::GradientUsage::Stroke,
                };
                !gradient.stops.is_empty()
            }
            _ => false,
        };
        if !has_stops {
            debug!(reference = %reference, "gradient without stops paints nothing");
            return;
        }
        self.node_mut(id)
            .attributes
            .insert(paint.attribute().to_string(), value);
        if let Some(leaf) = self.leaf_mut(id) {
            match paint {
                Paint::Fill => leaf.fill_gradient = Some(copy),
                Paint::Stroke => leaf.stroke_gradient = Some(copy),
            }
        }
    }

    fn scale_stroke_width(&mut self, id: NodeId) {
        let node = self.node(id);
        let line = node.line;
        let transform_type = node.stacked_transform.transform_type();
        if !transform_type.intersects(TransformType::MASK_SCALE)
            || node.attribute("vector-effect") == Some("non-scaling-stroke")
            || !self.stroke_visible(node)
        {
            return;
        }
        let width = node
            .attribute("stroke-width")
            .and_then(parse_length)
            .unwrap_or(1.0);
        let factor = node.stacked_transform.determinant().abs().sqrt();
        self.node_mut(id).attributes.insert(
            "stroke-width".to_string(),
            format_float_value(width * factor),
        );
        if transform_type.contains(TransformType::GENERAL_SCALE) {
            self.log_warning(line, "Scaling of the stroke width is approximate");
        }
    }

    fn fill_visible(&self, node: &SvgNode) -> bool {
        if self.leaf_gradient(node, Paint::Fill).is_some() {
            return true;
        }
        match node.attribute("fill") {
            None => true,
            Some(value) => paint_color(value).is_some(),
        }
    }

    fn stroke_visible(&self, node: &SvgNode) -> bool {
        if self.leaf_gradient(node, Paint::Stroke).is_some() {
            return true;
        }
        node.attribute("stroke").and_then(paint_color).is_some()
    }

    fn leaf_gradient(&self, node: &SvgNode, paint: Paint) -> Option<NodeId> {
        match (&node.kind, paint) {
            (NodeKind::Leaf(leaf), Paint::Fill) => leaf.fill_gradient,
            (NodeKind::Leaf(leaf), Paint::Stroke) => leaf.stroke_gradient,
            _ => None,
        }
    }

    /// Effective fill color of a leaf, `None` when it paints no fill.
    pub(crate) fn fill_color(&self, id: NodeId) -> Option<String> {
        let node = self.node(id);
        match node.attribute("fill") {
            None => Some(DEFAULT_FILL_COLOR.to_string()),
            Some(value) => paint_color(value),
        }
    }

    pub(crate) fn write_leaf(&self, id: NodeId, indent: usize, out: &mut String) {
        let node = self.node(id);
        let Some(path_data) = self
            .leaf(id)
            .and_then(|leaf| leaf.path_data.as_deref())
            .filter(|data| !data.is_empty())
        else {
            return;
        };
        let fill = self.fill_visible(node);
        let stroke = self.stroke_visible(node);
        if !fill && !stroke {
            return;
        }
        if node.stroke_before_fill && fill && stroke {
            self.write_path(node, path_data, false, true, indent, out);
            self.write_path(node, path_data, true, false, indent, out);
        } else {
            self.write_path(node, path_data, fill, stroke, indent, out);
        }
    }

    fn write_path(
        &self,
        node: &SvgNode,
        path_data: &str,
        show_fill: bool,
        show_stroke: bool,
        indent: usize,
        out: &mut String,
    ) {
        let padding = pad(indent);
        let continuation = format!("{padding}{CONTINUATION_INDENT}");
        let fill_gradient = self.leaf_gradient(node, Paint::Fill).filter(|_| show_fill);
        let stroke_gradient = self.leaf_gradient(node, Paint::Stroke).filter(|_| show_stroke);

        out.push_str(&format!("{padding}<path\n"));
        if show_fill && fill_gradient.is_none() && node.attribute("fill").is_none() {
            out.push_str(&format!("{continuation}android:fillColor=\"{DEFAULT_FILL_COLOR}\"\n"));
        }
        if show_stroke && node.attribute("stroke-width").is_none() {
            out.push_str(&format!("{continuation}android:strokeWidth=\"{DEFAULT_STROKE_WIDTH}\"\n"));
        }
        out.push_str(&format!("{continuation}android:pathData=\"{}\"", escape_xml(path_data)));
        for (name, value) in leaf_attributes(node, show_fill, show_stroke, fill_gradient, stroke_gradient) {
            out.push_str(&format!("\n{continuation}android:{name}=\"{}\"", escape_xml(&value)));
        }

        if fill_gradient.is_none() && stroke_gradient.is_none() {
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        if let Some(gradient) = fill_gradient {
            self.write_gradient(gradient, "android:fillColor", indent + 1, out);
        }
        if let Some(gradient) = stroke_gradient {
            self.write_gradient(gradient, "android:strokeColor", indent + 1, out);
        }
        out.push_str(&format!("{padding}</path>\n"));
    }
}

/// Color of a paint value in drawable notation; `None` for paints that draw
/// nothing.
fn paint_color(value: &str) -> Option<String> {
    if value == "none" {
        return None;
    }
    svg_color_to_vd(value).filter(|color| !is_transparent(color))
}

/// Output attributes in the fixed order expected by the drawable format.
fn leaf_attributes(
    node: &SvgNode,
    show_fill: bool,
    show_stroke: bool,
    fill_gradient: Option<NodeId>,
    stroke_gradient: Option<NodeId>,
) -> Vec<(&'static str, String)> {
    let opacity = node.attribute("opacity").and_then(parse_opacity).unwrap_or(1.0);
    let alpha = |name: &str| node.attribute(name).and_then(parse_opacity).unwrap_or(1.0) * opacity;
    let mut attributes = Vec::new();

    if show_stroke {
        if let Some(join) = node
            .attribute("stroke-linejoin")
            .filter(|join| matches!(*join, "miter" | "round" | "bevel"))
        {
            attributes.push(("strokeLineJoin", join.to_string()));
        }
        if let Some(width) = node.attribute("stroke-width").and_then(parse_length) {
            attributes.push(("strokeWidth", format_float_value(width)));
        }
    }
    if show_fill {
        if fill_gradient.is_none() {
            if let Some(color) = node.attribute("fill").and_then(paint_color) {
                attributes.push(("fillColor", color));
            }
        }
        let fill_alpha = alpha("fill-opacity");
        if fill_alpha != 1.0 {
            attributes.push(("fillAlpha", format_float_value(fill_alpha)));
        }
    }
    if show_stroke {
        if stroke_gradient.is_none() {
            if let Some(color) = node.attribute("stroke").and_then(paint_color) {
                attributes.push(("strokeColor", color));
            }
        }
        let stroke_alpha = alpha("stroke-opacity");
        if stroke_alpha != 1.0 {
            attributes.push(("strokeAlpha", format_float_value(stroke_alpha)));
        }
    }
    if show_fill {
        if let Some(rule) = node.attribute("fill-rule") {
            attributes.push(("fillType", rule.to_string()));
        }
    }
    if show_stroke {
        if let Some(cap) = node
            .attribute("stroke-linecap")
            .filter(|cap| matches!(*cap, "butt" | "round" | "square"))
        {
            attributes.push(("strokeLineCap", cap.to_string()));
        }
        if let Some(limit) = node.attribute("stroke-miterlimit").and_then(parse_length) {
            attributes.push(("strokeMiterLimit", format_float_value(limit)));
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(pairs: &[(&str, &str)]) -> SvgNode {
        let mut node = SvgNode::new(
            "path",
            "path",
            1,
            NodeKind::Leaf(LeafNode::with_path_data(Some("M0,0L1,1".to_string()))),
        );
        for (name, value) in pairs {
            node.set_presentation_attribute(name, value);
        }
        node
    }

    #[test]
    fn attributes_follow_fixed_order() {
        let node = leaf(&[
            ("stroke-linecap", "round"),
            ("fill-rule", "evenodd"),
            ("stroke", "#00f"),
            ("fill", "red"),
            ("stroke-width", "2"),
            ("stroke-linejoin", "bevel"),
            ("opacity", "0.5"),
        ]);
        let names: Vec<&str> = leaf_attributes(&node, true, true, None, None)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            [
                "strokeLineJoin",
                "strokeWidth",
                "fillColor",
                "fillAlpha",
                "strokeColor",
                "strokeAlpha",
                "fillType",
                "strokeLineCap"
            ]
        );
    }

    #[test]
    fn stroke_attributes_are_dropped_when_hidden() {
        let node = leaf(&[("fill", "#fff"), ("stroke-width", "3")]);
        let attributes = leaf_attributes(&node, true, false, None, None);
        assert_eq!(attributes, vec![("fillColor", "#FFFFFF".to_string())]);
    }

    #[test]
    fn transparent_paints_are_invisible() {
        assert_eq!(paint_color("none"), None);
        assert_eq!(paint_color("transparent"), None);
        assert_eq!(paint_color("#00000000"), None);
        assert_eq!(paint_color("red").as_deref(), Some("#FF0000"));
    }
}
