//! Scissor rectangles

use crate::transform::Transform;

/// Transformed clip rectangle
///
/// `xform` places the rectangle center, `extent` holds half its size. A
/// negative extent means no clipping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scissor {
    pub xform: Transform,
    pub extent: [f32; 2],
}

impl Default for Scissor {
    fn default() -> Self {
        Self::NONE
    }
}

impl Scissor {
    /// Disabled scissor
    pub const NONE: Scissor = Scissor {
        xform: Transform::new([0.0; 6]),
        extent: [-1.0, -1.0],
    };

    /// Clip to `(x, y, w, h)` in the space described by `xform`
    pub fn rect(x: f32, y: f32, w: f32, h: f32, xform: &Transform) -> Self {
        let w = w.max(0.0);
        let h = h.max(0.0);
        Self {
            xform: Transform::translate(x + w * 0.5, y + h * 0.5).then(xform),
            extent: [w * 0.5, h * 0.5],
        }
    }

    /// True when either extent carries the "no scissor" sentinel
    pub fn is_disabled(&self) -> bool {
        self.extent[0] < -0.5 || self.extent[1] < -0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_center_and_extent() {
        let s = Scissor::rect(10.0, 10.0, 20.0, 40.0, &Transform::IDENTITY);
        assert_eq!(s.extent, [10.0, 20.0]);
        assert_eq!(s.xform.transform_point(0.0, 0.0), (20.0, 30.0));
        assert!(!s.is_disabled());
    }

    #[test]
    fn test_negative_size_clamps() {
        let s = Scissor::rect(0.0, 0.0, -5.0, 5.0, &Transform::IDENTITY);
        assert_eq!(s.extent, [0.0, 2.5]);
        assert!(!s.is_disabled());
    }
}
