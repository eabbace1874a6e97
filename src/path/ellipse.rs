use crate::transform::{AffineTransform, TransformType, to_degrees, to_radians};

/// Re-derives an elliptical arc's radii and x-axis rotation after an affine
/// transform. The image of an ellipse under an affine map is again an
/// ellipse, generally with different axes and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseSolver {
    major_axis: f64,
    minor_axis: f64,
    rotation_degrees: f64,
    direction_changed: bool,
}

impl EllipseSolver {
    /// `rotation` is the arc's x-axis rotation in degrees. The axes of the
    /// image ellipse depend only on the linear part of `matrix`.
    pub fn new(matrix: &AffineTransform, radius_x: f64, radius_y: f64, rotation: f64) -> Self {
        let determinant = matrix.determinant();
        let direction_changed = determinant < 0.0;
        let theta = to_radians(rotation);
        let (sin, cos) = theta.sin_cos();

        if !matrix.transform_type().contains(TransformType::GENERAL_SCALE) {
            // Similarity: both axes scale by the same factor and stay
            // perpendicular.
            let factor = determinant.abs().sqrt();
            let (dx, dy) = matrix.delta_transform_point(cos, sin);
            return Self {
                major_axis: radius_x * factor,
                minor_axis: radius_y * factor,
                rotation_degrees: to_degrees(dy.atan2(dx)),
                direction_changed,
            };
        }

        // Columns of A = M · R(theta) · diag(rx, ry); the image ellipse is
        // {A·u : |u| = 1}, so its semi-axes are the singular values of A.
        let (p, r) = matrix.delta_transform_point(radius_x * cos, radius_x * sin);
        let (q, s) = matrix.delta_transform_point(-radius_y * sin, radius_y * cos);
        let e = (p + s) / 2.0;
        let f = (p - s) / 2.0;
        let g = (r + q) / 2.0;
        let h = (r - q) / 2.0;
        let big_q = e.hypot(h);
        let big_r = f.hypot(g);
        let angle = (g.atan2(f) + h.atan2(e)) / 2.0;
        Self {
            major_axis: big_q + big_r,
            minor_axis: (big_q - big_r).abs(),
            rotation_degrees: to_degrees(angle),
            direction_changed,
        }
    }

    pub fn major_axis(&self) -> f64 {
        self.major_axis
    }

    pub fn minor_axis(&self) -> f64 {
        self.minor_axis
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    pub fn direction_changed(&self) -> bool {
        self.direction_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(matrix: &AffineTransform, rx: f64, ry: f64, rotation: f64) -> EllipseSolver {
        EllipseSolver::new(matrix, rx, ry, rotation)
    }

    #[test]
    fn uniform_scale_multiplies_radii() {
        let solver = solve(&AffineTransform::scaling(3.0, 3.0), 2.0, 1.0, 30.0);
        assert!((solver.major_axis() - 6.0).abs() < 1e-9);
        assert!((solver.minor_axis() - 3.0).abs() < 1e-9);
        assert!((solver.rotation_degrees() - 30.0).abs() < 1e-9);
        assert!(!solver.direction_changed());
    }

    #[test]
    fn non_uniform_scale_of_circle() {
        let solver = solve(&AffineTransform::scaling(2.0, 1.0), 5.0, 5.0, 0.0);
        assert!((solver.major_axis() - 10.0).abs() < 1e-9);
        assert!((solver.minor_axis() - 5.0).abs() < 1e-9);
        assert!(solver.rotation_degrees().abs() < 1e-9);
    }

    #[test]
    fn non_uniform_scale_of_rotated_ellipse() {
        // An ellipse rotated by 90° has its x radius along the y axis.
        let solver = solve(&AffineTransform::scaling(1.0, 3.0), 2.0, 1.0, 90.0);
        assert!((solver.major_axis() - 6.0).abs() < 1e-9);
        assert!((solver.minor_axis() - 1.0).abs() < 1e-9);
        assert!((solver.rotation_degrees().abs() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn reflection_changes_direction() {
        let solver = solve(&AffineTransform::scaling(1.0, -1.0), 2.0, 2.0, 0.0);
        assert!(solver.direction_changed());
        assert!((solver.major_axis() - 2.0).abs() < 1e-9);
    }
}
