//! Path data for the basic SVG shapes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::format::parse_length;
use crate::path::PathBuilder;

static POINT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?(?:\d*\.\d+|\d+\.?)(?:[eE][-+]?\d+)?").unwrap());

pub const SHAPE_TAGS: &[&str] = &[
    "path", "rect", "circle", "ellipse", "line", "polygon", "polyline",
];

/// Builds path data for a shape element. Returns `None` when the shape has
/// no geometry (zero size, missing `d`, fewer than two points).
pub fn shape_path_data(tag: &str, attributes: &HashMap<String, String>) -> Option<String> {
    let length = |name: &str| attributes.get(name).and_then(|value| parse_length(value));
    match tag {
        "path" => attributes
            .get("d")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        "rect" => rect_path(
            length("x").unwrap_or(0.0),
            length("y").unwrap_or(0.0),
            length("width").unwrap_or(0.0),
            length("height").unwrap_or(0.0),
            length("rx"),
            length("ry"),
        ),
        "circle" => {
            let r = length("r").unwrap_or(0.0);
            ellipse_path(length("cx").unwrap_or(0.0), length("cy").unwrap_or(0.0), r, r)
        }
        "ellipse" => ellipse_path(
            length("cx").unwrap_or(0.0),
            length("cy").unwrap_or(0.0),
            length("rx").unwrap_or(0.0),
            length("ry").unwrap_or(0.0),
        ),
        "line" => {
            let mut builder = PathBuilder::new();
            builder
                .absolute_move_to(length("x1").unwrap_or(0.0), length("y1").unwrap_or(0.0))
                .absolute_line_to(length("x2").unwrap_or(0.0), length("y2").unwrap_or(0.0));
            Some(builder.build())
        }
        "polygon" | "polyline" => {
            point_list_path(attributes.get("points")?, tag == "polygon")
        }
        _ => None,
    }
}

fn rect_path(x: f64, y: f64, width: f64, height: f64, rx: Option<f64>, ry: Option<f64>) -> Option<String> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let (rx, ry) = match (rx.filter(|r| *r > 0.0), ry.filter(|r| *r > 0.0)) {
        (Some(rx), Some(ry)) => (rx, ry),
        (Some(r), None) | (None, Some(r)) => (r, r),
        (None, None) => (0.0, 0.0),
    };
    let rx = rx.min(width / 2.0);
    let ry = ry.min(height / 2.0);
    let mut builder = PathBuilder::new();
    if rx == 0.0 || ry == 0.0 {
        builder
            .absolute_move_to(x, y)
            .relative_horizontal_to(width)
            .relative_vertical_to(height)
            .relative_horizontal_to(-width)
            .relative_vertical_to(-height)
            .relative_close();
        return Some(builder.build());
    }
    let right = x + width;
    let bottom = y + height;
    builder
        .absolute_move_to(x + rx, y)
        .absolute_line_to(right - rx, y)
        .absolute_arc_to(rx, ry, 0.0, false, true, right, y + ry)
        .absolute_line_to(right, bottom - ry)
        .absolute_arc_to(rx, ry, 0.0, false, true, right - rx, bottom)
        .absolute_line_to(x + rx, bottom)
        .absolute_arc_to(rx, ry, 0.0, false, true, x, bottom - ry)
        .absolute_line_to(x, y + ry)
        .absolute_arc_to(rx, ry, 0.0, false, true, x + rx, y)
        .relative_close();
    Some(builder.build())
}

fn ellipse_path(cx: f64, cy: f64, rx: f64, ry: f64) -> Option<String> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let mut builder = PathBuilder::new();
    builder
        .absolute_move_to(cx - rx, cy)
        .relative_arc_to(rx, ry, 0.0, true, true, 2.0 * rx, 0.0)
        .relative_arc_to(rx, ry, 0.0, true, true, -2.0 * rx, 0.0)
        .relative_close();
    Some(builder.build())
}

fn point_list_path(points: &str, closed: bool) -> Option<String> {
    let numbers: Vec<f64> = POINT_NUMBER_RE
        .find_iter(points)
        .filter_map(|number| number.as_str().parse().ok())
        .collect();
    let mut pairs = numbers.chunks_exact(2);
    let first = pairs.next()?;
    let mut builder = PathBuilder::new();
    builder.absolute_move_to(first[0], first[1]);
    for pair in pairs {
        builder.absolute_line_to(pair[0], pair[1]);
    }
    if closed {
        builder.relative_close();
    }
    Some(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_rect_has_four_segments() {
        let data = shape_path_data(
            "rect",
            &attrs(&[("x", "1"), ("y", "2"), ("width", "3"), ("height", "4")]),
        );
        assert_eq!(data.as_deref(), Some("M1,2h3v4h-3v-4z"));
    }

    #[test]
    fn rounded_rect_copies_missing_radius_and_clamps() {
        let data = shape_path_data(
            "rect",
            &attrs(&[("width", "10"), ("height", "4"), ("rx", "3")]),
        )
        .unwrap();
        assert_eq!(data.matches('A').count(), 4);
        assert_eq!(data.matches('L').count(), 4);
        assert!(data.starts_with("M3,0L7,0A3,2,0,0,1,10,2"));
    }

    #[test]
    fn circle_uses_two_relative_arcs() {
        let data = shape_path_data("circle", &attrs(&[("cx", "12"), ("cy", "12"), ("r", "10")]));
        assert_eq!(
            data.as_deref(),
            Some("M2,12a10,10,0,1,1,20,0a10,10,0,1,1,-20,0z")
        );
    }

    #[test]
    fn zero_sized_shapes_have_no_data() {
        assert_eq!(shape_path_data("rect", &attrs(&[("width", "0"), ("height", "4")])), None);
        assert_eq!(shape_path_data("circle", &attrs(&[("r", "0")])), None);
        assert_eq!(shape_path_data("path", &attrs(&[("d", "  ")])), None);
    }

    #[test]
    fn polygon_closes_and_polyline_does_not() {
        let points = attrs(&[("points", "0,0 10,0 10-10")]);
        assert_eq!(
            shape_path_data("polygon", &points).as_deref(),
            Some("M0,0L10,0L10,-10z")
        );
        assert_eq!(
            shape_path_data("polyline", &points).as_deref(),
            Some("M0,0L10,0L10,-10")
        );
    }
}
