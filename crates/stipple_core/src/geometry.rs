//! Tessellated path geometry handed to the backends
//!
//! Geometry is produced upstream; backends only copy it into their frame
//! buffers.

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex: position followed by paint-space texture coordinate
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { x, y, u, v }
    }
}

/// Axis-aligned bounds as `[min_x, min_y, max_x, max_y]`
pub type Bounds = [f32; 4];

/// One tessellated sub-path
#[derive(Clone, Copy, Debug, Default)]
pub struct Path<'a> {
    /// Triangle fan covering the interior
    pub fill: &'a [Vertex],
    /// Triangle strip for the stroke outline or anti-aliasing fringe
    pub stroke: &'a [Vertex],
    /// Caller-asserted convexity; backends trust it without checking
    pub convex: bool,
}

impl<'a> Path<'a> {
    pub fn new(fill: &'a [Vertex], stroke: &'a [Vertex], convex: bool) -> Self {
        Self {
            fill,
            stroke,
            convex,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.fill.len() + self.stroke.len()
    }
}

/// Four-vertex triangle strip covering `bounds`
pub fn bounds_quad(bounds: Bounds) -> [Vertex; 4] {
    let [x0, y0, x1, y1] = bounds;
    [
        Vertex::new(x1, y1, 0.5, 1.0),
        Vertex::new(x1, y0, 0.5, 1.0),
        Vertex::new(x0, y1, 0.5, 1.0),
        Vertex::new(x0, y0, 0.5, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 16);
        let v = Vertex::new(1.0, 2.0, 3.0, 4.0);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&v));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_bounds_quad_corners() {
        let quad = bounds_quad([0.0, 0.0, 10.0, 20.0]);
        assert_eq!((quad[0].x, quad[0].y), (10.0, 20.0));
        assert_eq!((quad[3].x, quad[3].y), (0.0, 0.0));
        assert!(quad.iter().all(|v| v.u == 0.5 && v.v == 1.0));
    }
}
