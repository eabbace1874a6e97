use once_cell::sync::Lazy;
use regex::Regex;
use std::f64::consts::FRAC_PI_2;
use std::ops::BitOr;

const TOLERANCE: f64 = 1e-9;

static TRANSFORM_FN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]+)\s*\(([^)]*)\)").unwrap());
static NUMBER_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,]+").unwrap());

/// Classification bits reported by [`AffineTransform::transform_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformType(u32);

impl TransformType {
    pub const IDENTITY: Self = Self(0);
    pub const TRANSLATION: Self = Self(1);
    pub const UNIFORM_SCALE: Self = Self(2);
    pub const GENERAL_SCALE: Self = Self(4);
    pub const FLIP: Self = Self(8);
    pub const QUADRANT_ROTATION: Self = Self(16);
    pub const GENERAL_ROTATION: Self = Self(32);
    pub const MASK_SCALE: Self = Self(2 | 4);
    pub const MASK_ROTATION: Self = Self(16 | 32);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True for the identity and for pure translations.
    pub fn is_translation_only(self) -> bool {
        self.0 & !Self::TRANSLATION.0 == 0
    }
}

impl BitOr for TransformType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A 2×3 affine matrix mapping `(x, y)` to
/// `(m00·x + m01·y + m02, m10·x + m11·y + m12)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub m00: f64,
    pub m01: f64,
    pub m02: f64,
    pub m10: f64,
    pub m11: f64,
    pub m12: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        m00: 1.0,
        m01: 0.0,
        m02: 0.0,
        m10: 0.0,
        m11: 1.0,
        m12: 0.0,
    };

    /// Builds a matrix from SVG `matrix(a b c d e f)` operands.
    pub fn from_svg_matrix(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            m00: a,
            m01: c,
            m02: e,
            m10: b,
            m11: d,
            m12: f,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            m02: tx,
            m12: ty,
            ..Self::IDENTITY
        }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            m00: sx,
            m11: sy,
            ..Self::IDENTITY
        }
    }

    pub fn rotation(theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self {
            m00: cos,
            m01: -sin,
            m10: sin,
            m11: cos,
            ..Self::IDENTITY
        }
    }

    pub fn shearing(shx: f64, shy: f64) -> Self {
        Self {
            m01: shx,
            m10: shy,
            ..Self::IDENTITY
        }
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.concatenate(&Self::translation(tx, ty));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.concatenate(&Self::scaling(sx, sy));
    }

    pub fn rotate(&mut self, theta: f64) {
        self.concatenate(&Self::rotation(theta));
    }

    /// Rotates around the anchor `(x, y)`.
    pub fn rotate_around(&mut self, theta: f64, x: f64, y: f64) {
        self.translate(x, y);
        self.rotate(theta);
        self.translate(-x, -y);
    }

    pub fn shear(&mut self, shx: f64, shy: f64) {
        self.concatenate(&Self::shearing(shx, shy));
    }

    /// `self = self · other`: `other` is applied first.
    pub fn concatenate(&mut self, other: &AffineTransform) {
        *self = multiply(self, other);
    }

    /// `self = other · self`: `self` is applied first.
    pub fn pre_concatenate(&mut self, other: &AffineTransform) {
        *self = multiply(other, self);
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn transform_type(&self) -> TransformType {
        let mut kind = TransformType::IDENTITY;
        if self.m02 != 0.0 || self.m12 != 0.0 {
            kind = kind | TransformType::TRANSLATION;
        }
        if self.m00 == 1.0 && self.m01 == 0.0 && self.m10 == 0.0 && self.m11 == 1.0 {
            return kind;
        }
        let det = self.determinant();
        if det < 0.0 {
            kind = kind | TransformType::FLIP;
        }
        // Columns of the linear part must be orthogonal for a pure
        // rotation/scale decomposition.
        let skew = self.m00 * self.m01 + self.m10 * self.m11;
        if skew.abs() > TOLERANCE {
            return kind | TransformType::GENERAL_SCALE | TransformType::GENERAL_ROTATION;
        }
        let scale_x = self.m00.hypot(self.m10);
        let scale_y = self.m01.hypot(self.m11);
        if (scale_x - scale_y).abs() > TOLERANCE {
            kind = kind | TransformType::GENERAL_SCALE;
        } else if (scale_x - 1.0).abs() > TOLERANCE {
            kind = kind | TransformType::UNIFORM_SCALE;
        }
        let angle = self.m10.atan2(self.m00);
        if angle.abs() > TOLERANCE {
            let quadrants = angle / FRAC_PI_2;
            if (quadrants - quadrants.round()).abs() <= TOLERANCE {
                kind = kind | TransformType::QUADRANT_ROTATION;
            } else {
                kind = kind | TransformType::GENERAL_ROTATION;
            }
        }
        kind
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m00 * x + self.m01 * y + self.m02,
            self.m10 * x + self.m11 * y + self.m12,
        )
    }

    /// Transforms a flat `[x0, y0, x1, y1, ...]` buffer in place.
    pub fn transform_points(&self, coords: &mut [f64]) {
        for pair in coords.chunks_exact_mut(2) {
            let (x, y) = self.transform_point(pair[0], pair[1]);
            pair[0] = x;
            pair[1] = y;
        }
    }

    pub fn delta_transform_point(&self, dx: f64, dy: f64) -> (f64, f64) {
        (
            self.m00 * dx + self.m01 * dy,
            self.m10 * dx + self.m11 * dy,
        )
    }

    /// Like [`transform_points`](Self::transform_points) but ignoring the
    /// translation; used for direction vectors and relative offsets.
    pub fn delta_transform_points(&self, coords: &mut [f64]) {
        for pair in coords.chunks_exact_mut(2) {
            let (x, y) = self.delta_transform_point(pair[0], pair[1]);
            pair[0] = x;
            pair[1] = y;
        }
    }
}

fn multiply(a: &AffineTransform, b: &AffineTransform) -> AffineTransform {
    AffineTransform {
        m00: a.m00 * b.m00 + a.m01 * b.m10,
        m01: a.m00 * b.m01 + a.m01 * b.m11,
        m02: a.m00 * b.m02 + a.m01 * b.m12 + a.m02,
        m10: a.m10 * b.m00 + a.m11 * b.m10,
        m11: a.m10 * b.m01 + a.m11 * b.m11,
        m12: a.m10 * b.m02 + a.m11 * b.m12 + a.m12,
    }
}

pub fn to_radians(degrees: f64) -> f64 {
    degrees.to_radians()
}

pub fn to_degrees(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Result of parsing an SVG `transform` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransform {
    pub transform: AffineTransform,
    /// Functions that were skipped: unknown names or wrong operand counts.
    pub rejected: Vec<String>,
}

pub fn parse_transform_list(value: &str) -> ParsedTransform {
    let mut transform = AffineTransform::IDENTITY;
    let mut rejected = Vec::new();
    for caps in TRANSFORM_FN_RE.captures_iter(value) {
        let name = &caps[1];
        let args: Option<Vec<f64>> = NUMBER_SEPARATOR_RE
            .split(caps[2].trim())
            .filter(|token| !token.is_empty())
            .map(|token| token.parse::<f64>().ok())
            .collect();
        match args.and_then(|args| transform_function(name, &args)) {
            Some(function) => transform.concatenate(&function),
            None => rejected.push(caps[0].to_string()),
        }
    }
    ParsedTransform {
        transform,
        rejected,
    }
}

fn transform_function(name: &str, args: &[f64]) -> Option<AffineTransform> {
    let transform = match (name, args) {
        ("matrix", [a, b, c, d, e, f]) => AffineTransform::from_svg_matrix(*a, *b, *c, *d, *e, *f),
        ("translate", [tx]) => AffineTransform::translation(*tx, 0.0),
        ("translate", [tx, ty]) => AffineTransform::translation(*tx, *ty),
        ("scale", [s]) => AffineTransform::scaling(*s, *s),
        ("scale", [sx, sy]) => AffineTransform::scaling(*sx, *sy),
        ("rotate", [angle]) => AffineTransform::rotation(to_radians(*angle)),
        ("rotate", [angle, cx, cy]) => {
            let mut rotation = AffineTransform::IDENTITY;
            rotation.rotate_around(to_radians(*angle), *cx, *cy);
            rotation
        }
        ("skewX", [angle]) => AffineTransform::shearing(to_radians(*angle).tan(), 0.0),
        ("skewY", [angle]) => AffineTransform::shearing(0.0, to_radians(*angle).tan()),
        _ => return None,
    };
    Some(transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    fn sample_a() -> AffineTransform {
        AffineTransform::from_svg_matrix(1.5, 0.3, -0.7, 2.0, 4.0, -3.0)
    }

    fn sample_b() -> AffineTransform {
        let mut b = AffineTransform::translation(2.0, 5.0);
        b.rotate(0.4);
        b.scale(0.5, 3.0);
        b
    }

    #[test]
    fn concatenate_applies_other_first() {
        let (a, b) = (sample_a(), sample_b());
        let mut ab = a;
        ab.concatenate(&b);
        let (bx, by) = b.transform_point(3.0, -1.0);
        assert!(close(ab.transform_point(3.0, -1.0), a.transform_point(bx, by)));
    }

    #[test]
    fn pre_concatenate_applies_self_first() {
        let (a, b) = (sample_a(), sample_b());
        let mut ab = a;
        ab.pre_concatenate(&b);
        let (ax, ay) = a.transform_point(3.0, -1.0);
        assert!(close(ab.transform_point(3.0, -1.0), b.transform_point(ax, ay)));
    }

    #[test]
    fn determinant_is_multiplicative() {
        let (a, b) = (sample_a(), sample_b());
        let mut ab = a;
        ab.concatenate(&b);
        assert!((ab.determinant() - a.determinant() * b.determinant()).abs() < 1e-9);
    }

    #[test]
    fn identity_is_two_sided() {
        let a = sample_a();
        let mut left = AffineTransform::IDENTITY;
        left.concatenate(&a);
        let mut right = a;
        right.concatenate(&AffineTransform::IDENTITY);
        assert_eq!(left, a);
        assert_eq!(right, a);
        assert!(AffineTransform::IDENTITY.is_identity());
        assert_eq!(AffineTransform::IDENTITY.transform_type(), TransformType::IDENTITY);
    }

    #[test]
    fn rotation_preserves_lengths_and_angles() {
        let r = AffineTransform::rotation(0.7);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
        let u = r.delta_transform_point(3.0, 4.0);
        let v = r.delta_transform_point(-1.0, 2.0);
        assert!((u.0.hypot(u.1) - 5.0).abs() < 1e-9);
        let dot_before = 3.0 * -1.0 + 4.0 * 2.0;
        assert!((u.0 * v.0 + u.1 * v.1 - dot_before).abs() < 1e-9);
        assert!(r.transform_type().contains(TransformType::GENERAL_ROTATION));
    }

    #[test]
    fn reflection_has_negative_determinant() {
        let flip = AffineTransform::scaling(-1.0, 1.0);
        assert!(flip.determinant() < 0.0);
        assert!(flip.transform_type().contains(TransformType::FLIP));
    }

    #[test]
    fn delta_transform_ignores_translation() {
        let mut a = sample_a();
        let linear = a.delta_transform_point(2.0, 7.0);
        a.m02 = 100.0;
        a.m12 = -50.0;
        assert!(close(a.delta_transform_point(2.0, 7.0), linear));
        let full = a.transform_point(2.0, 7.0);
        assert!(close((full.0 - a.m02, full.1 - a.m12), linear));

        let mut buffer = [2.0, 7.0, 1.0, 1.0];
        a.delta_transform_points(&mut buffer);
        assert!(close((buffer[0], buffer[1]), linear));
    }

    #[test]
    fn classifies_transforms() {
        assert!(AffineTransform::translation(1.0, 0.0)
            .transform_type()
            .is_translation_only());
        assert_eq!(
            AffineTransform::scaling(2.0, 2.0).transform_type(),
            TransformType::UNIFORM_SCALE
        );
        assert_eq!(
            AffineTransform::scaling(2.0, 3.0).transform_type(),
            TransformType::GENERAL_SCALE
        );
        assert!(AffineTransform::rotation(to_radians(90.0))
            .transform_type()
            .contains(TransformType::QUADRANT_ROTATION));
        let skew = AffineTransform::shearing(0.5, 0.0).transform_type();
        assert!(skew.contains(TransformType::GENERAL_SCALE));
    }

    #[test]
    fn parses_transform_lists_left_to_right() {
        let parsed = parse_transform_list("translate(10, 20) scale(2)");
        assert!(parsed.rejected.is_empty());
        assert!(close(parsed.transform.transform_point(1.0, 1.0), (12.0, 22.0)));

        let rotated = parse_transform_list("rotate(90 10 10)");
        assert!(close(rotated.transform.transform_point(20.0, 10.0), (10.0, 20.0)));

        let bad = parse_transform_list("scale(1,2,3) wobble(4)");
        assert_eq!(bad.rejected.len(), 2);
        assert!(bad.transform.is_identity());
    }
}
