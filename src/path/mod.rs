//! SVG path mini-language: parsing, rewriting under an affine transform and
//! serialization.

pub mod builder;
pub mod ellipse;

pub use builder::PathBuilder;
pub use ellipse::EllipseSolver;

use crate::format::CoordinateFormat;
use crate::transform::AffineTransform;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("Invalid number \"{0}\" in path data")]
    InvalidNumber(String),
    #[error("Unsupported path command '{0}'")]
    UnknownCommand(char),
    #[error("Path command '{command}' expects a multiple of {arity} parameters but got {count}")]
    ParamCount {
        command: char,
        arity: usize,
        count: usize,
    },
    #[error("Invalid number: {0}")]
    NonFinite(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    pub command: char,
    pub params: Vec<f64>,
}

impl PathNode {
    pub fn new(command: char, params: Vec<f64>) -> Self {
        Self { command, params }
    }

    pub fn is_relative(&self) -> bool {
        self.command.is_ascii_lowercase()
    }
}

/// Number of parameters consumed by one instance of `command`.
pub fn arity(command: char) -> Option<usize> {
    match command.to_ascii_lowercase() {
        'z' => Some(0),
        'h' | 'v' => Some(1),
        'm' | 'l' | 't' => Some(2),
        'q' | 's' => Some(4),
        'c' => Some(6),
        'a' => Some(7),
        _ => None,
    }
}

fn is_command_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() && ch != 'e' && ch != 'E'
}

pub fn parse_path(data: &str) -> Result<Vec<PathNode>, PathError> {
    let data = data.trim();
    let mut nodes = Vec::new();
    if data.is_empty() {
        return Ok(nodes);
    }

    let mut starts: Vec<usize> = data
        .char_indices()
        .filter(|(_, ch)| is_command_letter(*ch))
        .map(|(idx, _)| idx)
        .collect();
    if starts.first() != Some(&0) {
        let first = data.chars().next().unwrap_or_default();
        return Err(PathError::UnknownCommand(first));
    }
    starts.push(data.len());

    for window in starts.windows(2) {
        let segment = &data[window[0]..window[1]];
        let command = segment.chars().next().unwrap_or_default();
        let arity = arity(command).ok_or(PathError::UnknownCommand(command))?;
        let params = parse_params(command, &segment[1..])?;
        let count = params.len();
        let valid = if arity == 0 {
            count == 0
        } else {
            count > 0 && count % arity == 0
        };
        if !valid {
            return Err(PathError::ParamCount {
                command,
                arity,
                count,
            });
        }
        if nodes.is_empty() && !matches!(command, 'M' | 'm') {
            nodes.push(PathNode::new('M', vec![0.0, 0.0]));
        }
        nodes.push(PathNode::new(command, params));
    }
    Ok(nodes)
}

fn parse_params(command: char, body: &str) -> Result<Vec<f64>, PathError> {
    let is_arc = matches!(command, 'a' | 'A');
    let bytes = body.as_bytes();
    let mut params = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        // Arc flags are a single character and need no separator.
        if is_arc && matches!(params.len() % 7, 3 | 4) {
            let flag = match bytes[i] {
                b'0' => 0.0,
                b'1' => 1.0,
                _ => return Err(PathError::InvalidNumber(token_at(body, i))),
            };
            params.push(flag);
            i += 1;
            continue;
        }
        let start = i;
        if matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let mut seen_digit = false;
        let mut seen_dot = false;
        while i < bytes.len() {
            match bytes[i] {
                b'0'..=b'9' => seen_digit = true,
                b'.' if !seen_dot => seen_dot = true,
                _ => break,
            }
            i += 1;
        }
        if seen_digit && i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
            let mut j = i + 1;
            if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                i = j;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
        if !seen_digit {
            return Err(PathError::InvalidNumber(token_at(body, start)));
        }
        let token = &body[start..i];
        let value = token
            .parse::<f64>()
            .map_err(|_| PathError::InvalidNumber(token.to_string()))?;
        params.push(value);
    }

    if is_arc {
        for arc in params.chunks_mut(7) {
            arc[0] = arc[0].abs();
            if arc.len() > 1 {
                arc[1] = arc[1].abs();
            }
        }
    }
    Ok(params)
}

fn token_at(body: &str, start: usize) -> String {
    body[start..]
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// True when a relative move directly follows a close command.
pub fn has_rel_move_after_close(nodes: &[PathNode]) -> bool {
    nodes
        .windows(2)
        .any(|pair| matches!(pair[0].command, 'z' | 'Z') && pair[1].command == 'm')
}

/// Rewrites every node in place so the path describes the same shape after
/// `matrix` is applied.
pub fn transform_nodes(matrix: &AffineTransform, nodes: &mut [PathNode]) {
    let translation_only = matrix.transform_type().is_translation_only();
    let mut state = PenState::default();
    let mut previous: Option<char> = None;
    for node in nodes.iter_mut() {
        transform_node(node, matrix, translation_only, &mut state, previous);
        previous = Some(node.command);
    }
}

/// Untransformed current point and sub-path start.
#[derive(Debug, Default, Clone, Copy)]
struct PenState {
    x: f64,
    y: f64,
    start_x: f64,
    start_y: f64,
}

fn transform_node(
    node: &mut PathNode,
    matrix: &AffineTransform,
    translation_only: bool,
    pen: &mut PenState,
    previous: Option<char>,
) {
    let step = arity(node.command).unwrap_or(2);
    let len = node.params.len();
    let params = &mut node.params;

    match node.command {
        'z' | 'Z' => {
            pen.x = pen.start_x;
            pen.y = pen.start_y;
        }
        'M' | 'L' | 'T' | 'C' | 'S' | 'Q' => {
            pen.x = params[len - 2];
            pen.y = params[len - 1];
            if node.command == 'M' {
                pen.start_x = params[0];
                pen.start_y = params[1];
            }
            matrix.transform_points(params);
        }
        'm' if matches!(previous, Some('z' | 'Z')) => {
            // A relative move after a close starts from the sub-path start;
            // make it absolute so the matrix can be applied directly.
            node.command = 'M';
            params[0] += pen.start_x;
            params[1] += pen.start_y;
            pen.start_x = params[0];
            pen.start_y = params[1];
            for i in (2..len).step_by(2) {
                params[i] += params[i - 2];
                params[i + 1] += params[i - 1];
            }
            pen.x = params[len - 2];
            pen.y = params[len - 1];
            matrix.transform_points(params);
        }
        'm' => {
            pen.x += params[0];
            pen.y += params[1];
            pen.start_x = pen.x;
            pen.start_y = pen.y;
            if previous.is_none() {
                // A leading 'm' is absolute.
                matrix.transform_points(&mut params[..2]);
            } else if !translation_only {
                matrix.delta_transform_points(&mut params[..2]);
            }
            for pair in params[2..].chunks_exact(2) {
                pen.x += pair[0];
                pen.y += pair[1];
            }
            if !translation_only {
                matrix.delta_transform_points(&mut params[2..]);
            }
        }
        'l' | 't' | 'c' | 's' | 'q' => {
            for segment in params.chunks_exact(step) {
                pen.x += segment[step - 2];
                pen.y += segment[step - 1];
            }
            if !translation_only {
                matrix.delta_transform_points(params);
            }
        }
        'H' | 'V' => {
            let horizontal = node.command == 'H';
            if translation_only {
                let offset = if horizontal { matrix.m02 } else { matrix.m12 };
                for value in params.iter_mut() {
                    if horizontal {
                        pen.x = *value;
                    } else {
                        pen.y = *value;
                    }
                    *value += offset;
                }
            } else {
                let mut points = Vec::with_capacity(len * 2);
                for value in params.iter() {
                    if horizontal {
                        pen.x = *value;
                    } else {
                        pen.y = *value;
                    }
                    points.push(pen.x);
                    points.push(pen.y);
                }
                matrix.transform_points(&mut points);
                node.command = 'L';
                *params = points;
            }
        }
        'h' | 'v' => {
            let horizontal = node.command == 'h';
            let mut deltas = Vec::with_capacity(len * 2);
            for value in params.iter() {
                if horizontal {
                    pen.x += value;
                    deltas.extend([*value, 0.0]);
                } else {
                    pen.y += value;
                    deltas.extend([0.0, *value]);
                }
            }
            if !translation_only {
                matrix.delta_transform_points(&mut deltas);
                node.command = 'l';
                *params = deltas;
            }
        }
        'A' => {
            for arc in params.chunks_exact_mut(7) {
                if !translation_only {
                    let solver = EllipseSolver::new(matrix, arc[0], arc[1], arc[2]);
                    apply_solver(arc, &solver);
                }
                pen.x = arc[5];
                pen.y = arc[6];
                matrix.transform_points(&mut arc[5..7]);
            }
        }
        'a' => {
            for arc in params.chunks_exact_mut(7) {
                pen.x += arc[5];
                pen.y += arc[6];
                if !translation_only {
                    let solver = EllipseSolver::new(matrix, arc[0], arc[1], arc[2]);
                    apply_solver(arc, &solver);
                    matrix.delta_transform_points(&mut arc[5..7]);
                }
            }
        }
        _ => {}
    }
}

fn apply_solver(arc: &mut [f64], solver: &EllipseSolver) {
    arc[0] = solver.major_axis();
    arc[1] = solver.minor_axis();
    arc[2] = solver.rotation_degrees();
    if solver.direction_changed() {
        arc[4] = 1.0 - arc[4];
    }
}

/// Serializes nodes back to path data. Implicit line-to pairs following a
/// move are written as explicit `L`/`l` commands.
pub fn node_list_to_string(
    nodes: &[PathNode],
    format: &CoordinateFormat,
) -> Result<String, PathError> {
    let mut out = String::new();
    for node in nodes {
        out.push(node.command);
        let implicit_line = match node.command {
            'M' if node.params.len() > 2 => Some('L'),
            'm' if node.params.len() > 2 => Some('l'),
            _ => None,
        };
        for (idx, param) in node.params.iter().enumerate() {
            if idx > 0 {
                out.push(if idx % 2 != 0 { ',' } else { ' ' });
            }
            if idx == 2 {
                if let Some(line) = implicit_line {
                    out.push(line);
                }
            }
            if !param.is_finite() {
                return Err(PathError::NonFinite(*param));
            }
            out.push_str(&format.format(*param));
        }
    }
    Ok(out)
}

/// Axis-aligned bounds `(min_x, min_y, max_x, max_y)` of all end and control
/// points. Arcs contribute their end points only.
pub fn bounds(nodes: &[PathNode]) -> Option<(f64, f64, f64, f64)> {
    let mut points = Vec::new();
    let mut pen = PenState::default();
    for node in nodes {
        let relative = node.is_relative();
        let step = arity(node.command).unwrap_or(2);
        match node.command.to_ascii_lowercase() {
            'z' => {
                pen.x = pen.start_x;
                pen.y = pen.start_y;
            }
            'h' | 'v' => {
                for value in &node.params {
                    let target = if node.command.eq_ignore_ascii_case(&'h') {
                        &mut pen.x
                    } else {
                        &mut pen.y
                    };
                    *target = if relative { *target + value } else { *value };
                    points.push((pen.x, pen.y));
                }
            }
            'a' => {
                for arc in node.params.chunks_exact(7) {
                    let (x, y) = absolute(relative, &pen, arc[5], arc[6]);
                    pen.x = x;
                    pen.y = y;
                    points.push((x, y));
                }
            }
            command => {
                for (idx, segment) in node.params.chunks_exact(step).enumerate() {
                    for pair in segment.chunks_exact(2) {
                        points.push(absolute(relative, &pen, pair[0], pair[1]));
                    }
                    let (x, y) = absolute(relative, &pen, segment[step - 2], segment[step - 1]);
                    pen.x = x;
                    pen.y = y;
                    if command == 'm' && idx == 0 {
                        pen.start_x = x;
                        pen.start_y = y;
                    }
                }
            }
        }
    }
    let (first_x, first_y) = *points.first()?;
    Some(points.iter().fold(
        (first_x, first_y, first_x, first_y),
        |(min_x, min_y, max_x, max_y), (x, y)| (min_x.min(*x), min_y.min(*y), max_x.max(*x), max_y.max(*y)),
    ))
}

fn absolute(relative: bool, pen: &PenState, x: f64, y: f64) -> (f64, f64) {
    if relative {
        (pen.x + x, pen.y + y)
    } else {
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::to_radians;

    fn fmt() -> CoordinateFormat {
        CoordinateFormat::with_fraction_digits(3)
    }

    fn round_trip(data: &str, matrix: &AffineTransform) -> String {
        let mut nodes = parse_path(data).unwrap();
        transform_nodes(matrix, &mut nodes);
        node_list_to_string(&nodes, &fmt()).unwrap()
    }

    #[test]
    fn splits_commands_and_numbers() {
        let nodes = parse_path("M10-20L.5.5 1e2,3E-1z").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].params, vec![10.0, -20.0]);
        assert_eq!(nodes[1].params, vec![0.5, 0.5, 100.0, 0.3]);
        assert_eq!(nodes[2].command, 'z');
    }

    #[test]
    fn prepends_implicit_move() {
        let nodes = parse_path("L1 2").unwrap();
        assert_eq!(nodes[0], PathNode::new('M', vec![0.0, 0.0]));
        assert_eq!(nodes[1].command, 'L');
    }

    #[test]
    fn parses_packed_arc_flags_and_forces_positive_radii() {
        let nodes = parse_path("M0 0a-5,5 0 1110 0").unwrap();
        assert_eq!(nodes[1].params, vec![5.0, 5.0, 0.0, 1.0, 1.0, 10.0, 0.0]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_path("M1 #"), Err(PathError::InvalidNumber(_))));
        assert!(matches!(parse_path("M1 2 3"), Err(PathError::ParamCount { .. })));
        assert!(matches!(parse_path("12 4"), Err(PathError::UnknownCommand('1'))));
        assert!(matches!(parse_path("M0 0 A1 1 0 2 0 3 3"), Err(PathError::InvalidNumber(_))));
    }

    #[test]
    fn serializes_implicit_line_to() {
        let nodes = parse_path("m1 2 3 4 5 6").unwrap();
        assert_eq!(node_list_to_string(&nodes, &fmt()).unwrap(), "m1,2 l3,4 5,6");
        let nodes = parse_path("M1 2 3 4").unwrap();
        assert_eq!(node_list_to_string(&nodes, &fmt()).unwrap(), "M1,2 L3,4");
    }

    #[test]
    fn non_finite_parameters_fail() {
        let nodes = vec![PathNode::new('M', vec![f64::NAN, 0.0])];
        assert!(matches!(
            node_list_to_string(&nodes, &fmt()),
            Err(PathError::NonFinite(_))
        ));
    }

    #[test]
    fn translation_keeps_relative_commands() {
        let t = AffineTransform::translation(10.0, 5.0);
        assert_eq!(round_trip("M1 1h2v2H0V3z", &t), "M11,6h2v2H10V8z");
    }

    #[test]
    fn scaling_rewrites_axis_commands_as_lines() {
        let s = AffineTransform::scaling(2.0, 2.0);
        assert_eq!(round_trip("M1 1h2V4", &s), "M2,2l4,0L6,8");
    }

    #[test]
    fn relative_move_after_close_becomes_absolute() {
        let nodes = parse_path("M10 10h5z m2 2 l1 1").unwrap();
        assert!(has_rel_move_after_close(&nodes));
        assert_eq!(
            round_trip("M10 10h5zm2 2 3 3", &AffineTransform::IDENTITY),
            "M10,10h5zM12,12 L15,15"
        );
    }

    #[test]
    fn flip_toggles_arc_sweep() {
        let flip = AffineTransform::scaling(-1.0, 1.0);
        let out = round_trip("M0 0A5 5 0 0 1 10 0", &flip);
        assert_eq!(out, "M0,0A5,5 180,0 0,-10 0");
    }

    #[test]
    fn rotation_rotates_arc_axes() {
        let rotation = AffineTransform::rotation(to_radians(90.0));
        let mut nodes = parse_path("M0 0a4 2 0 0 1 8 0").unwrap();
        transform_nodes(&rotation, &mut nodes);
        let arc = &nodes[1].params;
        assert!((arc[0] - 4.0).abs() < 1e-9);
        assert!((arc[1] - 2.0).abs() < 1e-9);
        assert!((arc[2] - 90.0).abs() < 1e-9);
        assert!(arc[5].abs() < 1e-9 && (arc[6] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn computes_bounds() {
        let nodes = parse_path("M2 3h4v5h-4z").unwrap();
        assert_eq!(bounds(&nodes), Some((2.0, 3.0, 6.0, 8.0)));
        assert_eq!(bounds(&[]), None);
    }
}
