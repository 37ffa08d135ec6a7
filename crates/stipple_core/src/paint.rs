//! Paint descriptions
//!
//! A paint is a shape in paint space (a rounded rectangle of half-size
//! `extent` with corner `radius`, feathered by `feather`) placed by `xform`,
//! colored from `inner_color` to `outer_color`. Image paints sample `image`
//! over an `extent`-sized rectangle instead.

use crate::color::Color;
use crate::image::ImageId;
use crate::transform::Transform;

/// Distance used to emulate an unbounded linear gradient
const LARGE: f32 = 1e5;

/// Fill or stroke paint
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub xform: Transform,
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub inner_color: Color,
    pub outer_color: Color,
    pub image: Option<ImageId>,
}

impl Default for Paint {
    fn default() -> Self {
        Self::solid(Color::BLACK)
    }
}

impl Paint {
    /// Single-color paint
    pub fn solid(color: Color) -> Self {
        Self {
            xform: Transform::IDENTITY,
            extent: [0.0, 0.0],
            radius: 0.0,
            feather: 1.0,
            inner_color: color,
            outer_color: color,
            image: None,
        }
    }

    /// Linear gradient from `(sx, sy)` to `(ex, ey)`
    pub fn linear_gradient(
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> Self {
        let (mut dx, mut dy) = (ex - sx, ey - sy);
        let d = (dx * dx + dy * dy).sqrt();
        if d > 0.0001 {
            dx /= d;
            dy /= d;
        } else {
            dx = 0.0;
            dy = 1.0;
        }

        Self {
            xform: Transform::new([dy, -dx, dx, dy, sx - dx * LARGE, sy - dy * LARGE]),
            extent: [LARGE, LARGE + d * 0.5],
            radius: 0.0,
            feather: d.max(1.0),
            inner_color,
            outer_color,
            image: None,
        }
    }

    /// Radial gradient centered at `(cx, cy)` between two radii
    pub fn radial_gradient(
        cx: f32,
        cy: f32,
        inner_radius: f32,
        outer_radius: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> Self {
        let r = (inner_radius + outer_radius) * 0.5;
        let f = outer_radius - inner_radius;
        Self {
            xform: Transform::translate(cx, cy),
            extent: [r, r],
            radius: r,
            feather: f.max(1.0),
            inner_color,
            outer_color,
            image: None,
        }
    }

    /// Feathered rounded rectangle, typically used for drop shadows
    #[allow(clippy::too_many_arguments)]
    pub fn box_gradient(
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        feather: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> Self {
        Self {
            xform: Transform::translate(x + w * 0.5, y + h * 0.5),
            extent: [w * 0.5, h * 0.5],
            radius,
            feather: feather.max(1.0),
            inner_color,
            outer_color,
            image: None,
        }
    }

    /// Image tiled from `(ox, oy)` with tile size `w` x `h`, rotated by `angle`
    pub fn image_pattern(
        ox: f32,
        oy: f32,
        w: f32,
        h: f32,
        angle: f32,
        image: ImageId,
        alpha: f32,
    ) -> Self {
        let mut xform = Transform::rotate(angle);
        xform.elements[4] = ox;
        xform.elements[5] = oy;
        let tint = Color::rgba(1.0, 1.0, 1.0, alpha);
        Self {
            xform,
            extent: [w, h],
            radius: 0.0,
            feather: 0.0,
            inner_color: tint,
            outer_color: tint,
            image: Some(image),
        }
    }

    /// Same paint placed by `xform` after the current placement
    pub fn transformed(mut self, xform: &Transform) -> Self {
        self.xform = self.xform.then(xform);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_gradient_degenerate_direction() {
        let p = Paint::linear_gradient(5.0, 5.0, 5.0, 5.0, Color::WHITE, Color::BLACK);
        // zero-length gradients point down
        assert_eq!(p.xform.elements[0], 1.0);
        assert_eq!(p.xform.elements[2], 0.0);
        assert_eq!(p.feather, 1.0);
        assert_eq!(p.extent, [LARGE, LARGE]);
    }

    #[test]
    fn test_radial_gradient_params() {
        let p = Paint::radial_gradient(10.0, 20.0, 4.0, 8.0, Color::WHITE, Color::BLACK);
        assert_eq!(p.radius, 6.0);
        assert_eq!(p.feather, 4.0);
        assert_eq!(p.xform, Transform::translate(10.0, 20.0));
    }

    #[test]
    fn test_box_gradient_centers() {
        let p = Paint::box_gradient(0.0, 0.0, 100.0, 50.0, 4.0, 0.5, Color::BLACK, Color::WHITE);
        assert_eq!(p.extent, [50.0, 25.0]);
        assert_eq!(p.feather, 1.0);
        assert_eq!(p.xform.transform_point(0.0, 0.0), (50.0, 25.0));
    }

    #[test]
    fn test_solid_has_no_image() {
        let p = Paint::solid(Color::RED);
        assert!(p.image.is_none());
        assert_eq!(p.inner_color, p.outer_color);
    }
}
