//! 2D affine transforms

use std::ops::Mul;

/// 2D affine transformation
///
/// Elements are stored as `[a, b, c, d, e, f]`, mapping a point with
///
/// ```text
/// | a  c  e |   | x |
/// | b  d  f | * | y |
/// | 0  0  1 |   | 1 |
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub elements: [f32; 6],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        elements: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    pub const fn new(elements: [f32; 6]) -> Self {
        Self { elements }
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            elements: [1.0, 0.0, 0.0, 1.0, x, y],
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            elements: [sx, 0.0, 0.0, sy, 0.0, 0.0],
        }
    }

    /// Rotation by `angle` radians
    pub fn rotate(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            elements: [c, s, -s, c, 0.0, 0.0],
        }
    }

    pub fn skew_x(angle: f32) -> Self {
        Self {
            elements: [1.0, 0.0, angle.tan(), 1.0, 0.0, 0.0],
        }
    }

    pub fn skew_y(angle: f32) -> Self {
        Self {
            elements: [1.0, angle.tan(), 0.0, 1.0, 0.0, 0.0],
        }
    }

    /// Compose two transforms. The result first applies `self`, then `other`.
    pub fn then(&self, other: &Transform) -> Transform {
        let [a1, b1, c1, d1, e1, f1] = self.elements;
        let [a2, b2, c2, d2, e2, f2] = other.elements;
        Transform {
            elements: [
                a1 * a2 + b1 * c2,
                a1 * b2 + b1 * d2,
                c1 * a2 + d1 * c2,
                c1 * b2 + d1 * d2,
                e1 * a2 + f1 * c2 + e2,
                e1 * b2 + f1 * d2 + f2,
            ],
        }
    }

    /// Compose two transforms. The result first applies `other`, then `self`.
    pub fn pre_then(&self, other: &Transform) -> Transform {
        other.then(self)
    }

    pub fn determinant(&self) -> f32 {
        let [a, b, c, d, _, _] = self.elements;
        a * d - c * b
    }

    /// Inverse transform. Near-singular matrices invert to the identity.
    pub fn inverse(&self) -> Transform {
        let det = self.determinant();
        if det.abs() < 1e-6 {
            return Transform::IDENTITY;
        }
        let [a, b, c, d, e, f] = self.elements;
        let inv = 1.0 / det;
        Transform {
            elements: [
                d * inv,
                -b * inv,
                -c * inv,
                a * inv,
                (c * f - d * e) * inv,
                (b * e - a * f) * inv,
            ],
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.elements;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Pack into three padded columns, the layout of a std140 `mat3`
    pub fn to_mat3x4(&self) -> [f32; 12] {
        let [a, b, c, d, e, f] = self.elements;
        [a, b, 0.0, 0.0, c, d, 0.0, 0.0, e, f, 1.0, 0.0]
    }
}

/// `a * b` applies `a`, then `b`
impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.then(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn test_then_applies_self_first() {
        let t = Transform::translate(10.0, 0.0).then(&Transform::scale(2.0, 2.0));
        // translate to (11, 1), then scale to (22, 2)
        assert!(approx(t.transform_point(1.0, 1.0), (22.0, 2.0)));

        let t = Transform::translate(10.0, 0.0).pre_then(&Transform::scale(2.0, 2.0));
        assert!(approx(t.transform_point(1.0, 1.0), (12.0, 2.0)));
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::rotate(0.7)
            .then(&Transform::scale(3.0, 0.5))
            .then(&Transform::translate(-4.0, 9.0));
        let p = t.transform_point(2.5, -1.5);
        assert!(approx(t.inverse().transform_point(p.0, p.1), (2.5, -1.5)));
    }

    #[test]
    fn test_singular_inverse_is_identity() {
        let t = Transform::scale(0.0, 1.0);
        assert_eq!(t.inverse(), Transform::IDENTITY);
    }

    #[test]
    fn test_mat3x4_packing() {
        let t = Transform::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(
            t.to_mat3x4(),
            [1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0, 5.0, 6.0, 1.0, 0.0]
        );
    }
}
