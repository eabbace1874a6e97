use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::node::{NodeId, NodeKind, parse_declarations};
use super::{CONTINUATION_INDENT, SvgTree, pad};
use crate::color::{svg_color_to_vd, with_alpha};
use crate::format::{format_float_value, parse_opacity};
use crate::render::escape_xml;
use crate::transform::{AffineTransform, parse_transform_list};
use crate::xml::{XmlDocument, XmlNodeId};

/// Gradient attributes that an `href` target may supply.
pub const GRADIENT_ATTRIBUTES: &[&str] = &[
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "fx",
    "fy",
    "gradientUnits",
    "gradientTransform",
    "spreadMethod",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradientKind {
    Linear,
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradientUsage {
    Fill,
    Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradientUnits {
    ObjectBoundingBox,
    UserSpaceOnUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpreadMethod {
    Pad,
    Reflect,
    Repeat,
}

impl SpreadMethod {
    fn tile_mode(self) -> &'static str {
        match self {
            SpreadMethod::Pad => "clamp",
            SpreadMethod::Reflect => "mirror",
            SpreadMethod::Repeat => "repeat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientStop {
    /// Color in drawable notation, before `opacity` is applied.
    pub color: String,
    pub offset: f64,
    pub opacity: f64,
}

impl GradientStop {
    fn output_color(&self) -> String {
        with_alpha(&self.color, self.opacity)
    }
}

#[derive(Debug, Clone)]
pub struct GradientNode {
    pub kind: GradientKind,
    pub usage: GradientUsage,
    pub stops: Vec<GradientStop>,
    pub units: GradientUnits,
    pub gradient_transform: AffineTransform,
    pub spread: Option<SpreadMethod>,
    pub href: Option<String>,
    /// Raw values of [`GRADIENT_ATTRIBUTES`] as written on the element.
    pub geometry: BTreeMap<String, String>,
    /// `android:` attributes computed while flattening.
    pub output: Vec<(&'static str, String)>,
}

impl GradientNode {
    pub fn new(kind: GradientKind) -> Self {
        Self {
            kind,
            usage: GradientUsage::Fill,
            stops: Vec::new(),
            units: GradientUnits::ObjectBoundingBox,
            gradient_transform: AffineTransform::IDENTITY,
            spread: None,
            href: None,
            geometry: BTreeMap::new(),
            output: Vec::new(),
        }
    }

    /// Reads geometry, units, transform and stops from a gradient element.
    pub fn from_element(kind: GradientKind, document: &XmlDocument, element: XmlNodeId) -> Self {
        let mut gradient = Self::new(kind);
        for name in GRADIENT_ATTRIBUTES {
            if let Some(value) = document.attribute(element, name) {
                gradient.geometry.insert(name.to_string(), value.trim().to_string());
            }
        }
        gradient.href = document
            .attribute(element, "xlink:href")
            .or_else(|| document.attribute(element, "href"))
            .and_then(|href| href.trim().strip_prefix('#'))
            .map(str::to_string);
        gradient.stops = parse_stops(document, element);
        gradient.refresh();
        gradient
    }

    /// Re-derives the typed fields from [`GradientNode::geometry`].
    pub fn refresh(&mut self) {
        self.units = match self.geometry.get("gradientUnits").map(String::as_str) {
            Some("userSpaceOnUse") => GradientUnits::UserSpaceOnUse,
            _ => GradientUnits::ObjectBoundingBox,
        };
        self.gradient_transform = self
            .geometry
            .get("gradientTransform")
            .map(|value| parse_transform_list(value).transform)
            .unwrap_or(AffineTransform::IDENTITY);
        self.spread = match self.geometry.get("spreadMethod").map(String::as_str) {
            Some("pad") => Some(SpreadMethod::Pad),
            Some("reflect") => Some(SpreadMethod::Reflect),
            Some("repeat") => Some(SpreadMethod::Repeat),
            _ => None,
        };
    }

    /// Takes stops and unset attributes from the gradient named by `href`.
    fn inherit_from(&mut self, target: &GradientNode) {
        if self.stops.is_empty() {
            self.stops = target.stops.clone();
        }
        for (name, value) in &target.geometry {
            self.geometry
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.refresh();
    }

    fn coordinate(&self, name: &str, default: &str, extent: f64) -> f64 {
        let value = self.geometry.get(name).map(String::as_str).unwrap_or(default);
        let user_space = self.units == GradientUnits::UserSpaceOnUse;
        match value.strip_suffix('%') {
            Some(percent) => {
                let fraction = percent.trim().parse::<f64>().unwrap_or(0.0) / 100.0;
                if user_space { fraction * extent } else { fraction }
            }
            None => value
                .strip_suffix("px")
                .unwrap_or(value)
                .trim()
                .parse::<f64>()
                .unwrap_or(0.0),
        }
    }
}

fn parse_stops(document: &XmlDocument, element: XmlNodeId) -> Vec<GradientStop> {
    let mut stops = Vec::new();
    for stop in document.child_elements(element) {
        if document.element(stop).is_none_or(|e| e.name != "stop") {
            continue;
        }
        let mut color = document.attribute(stop, "stop-color").map(str::to_string);
        let mut opacity = document.attribute(stop, "stop-opacity").map(str::to_string);
        if let Some(style) = document.attribute(stop, "style") {
            for (name, value) in parse_declarations(style) {
                match name.as_str() {
                    "stop-color" => color = Some(value),
                    "stop-opacity" => opacity = Some(value),
                    _ => {}
                }
            }
        }
        let offset = document
            .attribute(stop, "offset")
            .and_then(|value| {
                let value = value.trim();
                match value.strip_suffix('%') {
                    Some(percent) => percent.trim().parse::<f64>().ok().map(|p| p / 100.0),
                    None => value.parse::<f64>().ok(),
                }
            })
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let color = color
            .as_deref()
            .and_then(svg_color_to_vd)
            .unwrap_or_else(|| "#000000".to_string());
        let opacity = opacity
            .as_deref()
            .and_then(parse_opacity)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        stops.push(GradientStop {
            color,
            offset,
            opacity,
        });
    }
    stops
}

impl SvgTree {
    fn gradient(&self, id: NodeId) -> Option<&GradientNode> {
        match &self.node(id).kind {
            NodeKind::Gradient(gradient) => Some(gradient),
            _ => None,
        }
    }

    fn gradient_mut(&mut self, id: NodeId) -> Option<&mut GradientNode> {
        match &mut self.node_mut(id).kind {
            NodeKind::Gradient(gradient) => Some(gradient),
            _ => None,
        }
    }

    /// Resolves gradient `href`s in passes until nothing changes. A gradient
    /// whose target is still pending waits for a later pass.
    pub fn resolve_gradient_references(&mut self) {
        let mut pending: BTreeSet<NodeId> = std::mem::take(&mut self.pending_gradients);
        while !pending.is_empty() {
            let mut waiting = BTreeSet::new();
            let mut resolved = BTreeSet::new();
            let mut progressed = false;
            for &id in &pending {
                let Some(href) = self.gradient(id).and_then(|g| g.href.clone()) else {
                    progressed = true;
                    continue;
                };
                let Some(target) = self.lookup(&href) else {
                    if !self.is_ignored(&href) {
                        let line = self.node(id).line;
                        self.log_error(line, "Referenced id not found");
                    }
                    progressed = true;
                    continue;
                };
                if pending.contains(&target) && !resolved.contains(&target) {
                    waiting.insert(id);
                    continue;
                }
                if let Some(source) = self.gradient(target).cloned() {
                    if let Some(gradient) = self.gradient_mut(id) {
                        gradient.inherit_from(&source);
                    }
                } else {
                    debug!(href = %href, "gradient href does not name a gradient");
                }
                resolved.insert(id);
                progressed = true;
            }
            if !progressed {
                debug!(count = waiting.len(), "dropping unresolvable gradient references");
                break;
            }
            pending = waiting;
        }
    }

    /// Maps the gradient geometry of a leaf into viewport space.
    /// `bounds` is the leaf's bounding box in its own user space.
    pub(crate) fn flatten_gradient(
        &mut self,
        id: NodeId,
        stacked: &AffineTransform,
        bounds: Option<(f64, f64, f64, f64)>,
        line: usize,
    ) {
        let [_, _, view_width, view_height] = self.view_box().unwrap_or([0.0, 0.0, 1.0, 1.0]);
        let format = self.coordinate_format();
        let Some(gradient) = self.gradient(id) else {
            return;
        };
        let single_stop = gradient.stops.len() == 1;

        let mut matrix = *stacked;
        if gradient.units == GradientUnits::ObjectBoundingBox {
            let (min_x, min_y, max_x, max_y) = bounds.unwrap_or((0.0, 0.0, 1.0, 1.0));
            matrix.concatenate(&AffineTransform::translation(min_x, min_y));
            matrix.concatenate(&AffineTransform::scaling(max_x - min_x, max_y - min_y));
        }
        matrix.concatenate(&gradient.gradient_transform);

        let diagonal = ((view_width * view_width + view_height * view_height) / 2.0).sqrt();
        let mut output = Vec::new();
        match gradient.kind {
            GradientKind::Linear => {
                output.push(("type", "linear".to_string()));
                let start = matrix.transform_point(
                    gradient.coordinate("x1", "0%", view_width),
                    gradient.coordinate("y1", "0%", view_height),
                );
                let end = matrix.transform_point(
                    gradient.coordinate("x2", "100%", view_width),
                    gradient.coordinate("y2", "0%", view_height),
                );
                output.push(("startX", format.format(start.0)));
                output.push(("startY", format.format(start.1)));
                output.push(("endX", format.format(end.0)));
                output.push(("endY", format.format(end.1)));
            }
            GradientKind::Radial => {
                output.push(("type", "radial".to_string()));
                let center = matrix.transform_point(
                    gradient.coordinate("cx", "50%", view_width),
                    gradient.coordinate("cy", "50%", view_height),
                );
                let radius = gradient.coordinate("r", "50%", diagonal)
                    * matrix.determinant().abs().sqrt();
                output.push(("centerX", format.format(center.0)));
                output.push(("centerY", format.format(center.1)));
                output.push(("gradientRadius", format.format(radius)));
            }
        }
        if let Some(spread) = gradient.spread {
            output.push(("tileMode", spread.tile_mode().to_string()));
        }

        if let Some(gradient) = self.gradient_mut(id) {
            gradient.output = output;
        }
        if single_stop {
            self.log_warning(line, "Gradient has only one color stop");
        }
    }

    pub(crate) fn write_gradient(&self, id: NodeId, target: &str, indent: usize, out: &mut String) {
        let Some(gradient) = self.gradient(id) else {
            return;
        };
        let outer = pad(indent);
        let inner = pad(indent + 1);
        let item = pad(indent + 2);
        out.push_str(&format!("{outer}<aapt:attr name=\"{target}\">\n"));
        out.push_str(&format!("{inner}<gradient"));
        for (name, value) in &gradient.output {
            out.push_str(&format!(
                "\n{inner}{CONTINUATION_INDENT}android:{name}=\"{}\"",
                escape_xml(value)
            ));
        }
        out.push_str(">\n");

        let mut stops = gradient.stops.clone();
        if let [only] = stops.as_slice() {
            stops.push(GradientStop {
                offset: 1.0,
                ..only.clone()
            });
        }
        for stop in &stops {
            out.push_str(&format!(
                "{item}<item android:offset=\"{}\" android:color=\"{}\"/>\n",
                format_float_value(stop.offset),
                stop.output_color()
            ));
        }
        out.push_str(&format!("{inner}</gradient>\n"));
        out.push_str(&format!("{outer}</aapt:attr>\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_xml;

    #[test]
    fn reads_stops_with_style_override() {
        let document = parse_xml(
            r#"<linearGradient id="g" x2="1">
                <stop offset="0%" stop-color="red"/>
                <stop offset="50" stop-color="blue" style="stop-color: #0f0; stop-opacity: 0.5"/>
            </linearGradient>"#,
        );
        let root = document.root().unwrap();
        let gradient = GradientNode::from_element(GradientKind::Linear, &document, root);
        assert_eq!(gradient.stops.len(), 2);
        assert_eq!(gradient.stops[0].color, "#FF0000");
        assert_eq!(gradient.stops[1].offset, 1.0);
        assert_eq!(gradient.stops[1].output_color(), "#8000FF00");
        assert_eq!(gradient.geometry.get("x2").map(String::as_str), Some("1"));
    }

    #[test]
    fn href_supplies_missing_stops_and_attributes() {
        let mut gradient = GradientNode::new(GradientKind::Linear);
        gradient.geometry.insert("x1".into(), "0.2".into());
        let mut source = GradientNode::new(GradientKind::Linear);
        source.geometry.insert("x1".into(), "0.7".into());
        source.geometry.insert("gradientUnits".into(), "userSpaceOnUse".into());
        source.stops.push(GradientStop {
            color: "#FF0000".into(),
            offset: 0.0,
            opacity: 1.0,
        });
        gradient.inherit_from(&source);
        assert_eq!(gradient.stops.len(), 1);
        assert_eq!(gradient.geometry.get("x1").map(String::as_str), Some("0.2"));
        assert_eq!(gradient.units, GradientUnits::UserSpaceOnUse);
    }

    #[test]
    fn percentages_depend_on_units() {
        let mut gradient = GradientNode::new(GradientKind::Radial);
        gradient.geometry.insert("r".into(), "50%".into());
        assert_eq!(gradient.coordinate("r", "50%", 20.0), 0.5);
        gradient.geometry.insert("gradientUnits".into(), "userSpaceOnUse".into());
        gradient.refresh();
        assert_eq!(gradient.coordinate("r", "50%", 20.0), 10.0);
    }
}
