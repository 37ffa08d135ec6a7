//! Per-frame accumulation of draw calls
//!
//! Vertices, path ranges, uniform blocks and calls are appended while a frame
//! is recorded and cleared after it is flushed. Arrays grow through
//! [`growth::reserve`]; offsets are taken only after the reservation so a
//! reallocation can never leave a stale index behind.

use stipple_core::{CompositeOperationState, ImageId, Vertex};

use crate::error::Result;
use crate::growth::{self, CALL_FLOOR, PATH_FLOOR, UNIFORM_FLOOR, VERTEX_FLOOR};
use crate::uniforms::FragUniforms;

/// Vertex ranges of one sub-path within the frame's vertex array
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathRange {
    pub fill_offset: usize,
    pub fill_count: usize,
    pub stroke_offset: usize,
    pub stroke_count: usize,
}

/// How a call is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// Stencil winding fill with a covering quad
    Fill,
    /// Single convex path drawn directly
    ConvexFill,
    Stroke,
    Triangles,
}

impl CallKind {
    /// Uniform blocks the call owns
    pub fn uniform_blocks(self, stencil_strokes: bool) -> usize {
        match self {
            CallKind::Fill => 2,
            CallKind::Stroke if stencil_strokes => 2,
            CallKind::ConvexFill | CallKind::Stroke | CallKind::Triangles => 1,
        }
    }
}

/// One recorded draw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub image: Option<ImageId>,
    pub path_offset: usize,
    pub path_count: usize,
    /// Bounding quad for fills, vertex list for triangles
    pub triangle_offset: usize,
    pub triangle_count: usize,
    /// Index of the first uniform block
    pub uniform_offset: usize,
    pub composite: CompositeOperationState,
}

/// Array lengths at a point in time, used to roll back a failed call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameMark {
    calls: usize,
    paths: usize,
    vertices: usize,
    uniforms: usize,
}

/// Everything recorded for the current frame
#[derive(Debug, Default)]
pub struct FrameData {
    pub calls: Vec<Call>,
    pub paths: Vec<PathRange>,
    pub vertices: Vec<Vertex>,
    pub uniforms: Vec<FragUniforms>,
}

impl FrameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn mark(&self) -> FrameMark {
        FrameMark {
            calls: self.calls.len(),
            paths: self.paths.len(),
            vertices: self.vertices.len(),
            uniforms: self.uniforms.len(),
        }
    }

    /// Drop everything appended since `mark`
    pub fn rollback(&mut self, mark: FrameMark) {
        self.calls.truncate(mark.calls);
        self.paths.truncate(mark.paths);
        self.vertices.truncate(mark.vertices);
        self.uniforms.truncate(mark.uniforms);
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.paths.clear();
        self.vertices.clear();
        self.uniforms.clear();
    }

    /// Reserve room for one more call
    pub fn reserve_call(&mut self) -> Result<()> {
        growth::reserve(&mut self.calls, 1, CALL_FLOOR)
    }

    /// Append a call. Room must have been reserved with [`reserve_call`].
    ///
    /// [`reserve_call`]: FrameData::reserve_call
    pub fn push_call(&mut self, call: Call) {
        self.calls.push(call);
    }

    /// Reserve `count` path ranges, returning the index of the first
    pub fn alloc_paths(&mut self, count: usize) -> Result<usize> {
        growth::reserve(&mut self.paths, count, PATH_FLOOR)?;
        let offset = self.paths.len();
        self.paths.resize(offset + count, PathRange::default());
        Ok(offset)
    }

    /// Reserve room for `count` vertices, returning the index of the first
    pub fn reserve_vertices(&mut self, count: usize) -> Result<usize> {
        growth::reserve(&mut self.vertices, count, VERTEX_FLOOR)?;
        Ok(self.vertices.len())
    }

    /// Append vertices into previously reserved room, returning their offset
    pub fn push_vertices(&mut self, vertices: &[Vertex]) -> usize {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(vertices);
        offset
    }

    /// Reserve `count` zeroed uniform blocks, returning the index of the first
    pub fn alloc_uniforms(&mut self, count: usize) -> Result<usize> {
        growth::reserve(&mut self.uniforms, count, UNIFORM_FLOOR)?;
        let offset = self.uniforms.len();
        self.uniforms.resize(offset + count, FragUniforms::default());
        Ok(offset)
    }

    /// Whether every range `call` references lies inside this frame
    pub fn call_in_bounds(&self, call: &Call, stencil_strokes: bool) -> bool {
        let within = |offset: usize, count: usize, len: usize| {
            offset.checked_add(count).is_some_and(|end| end <= len)
        };
        let vertices = self.vertices.len();

        within(call.path_offset, call.path_count, self.paths.len())
            && within(call.triangle_offset, call.triangle_count, vertices)
            && within(
                call.uniform_offset,
                call.kind.uniform_blocks(stencil_strokes),
                self.uniforms.len(),
            )
            && self.paths[call.path_offset..call.path_offset + call.path_count]
                .iter()
                .all(|p| {
                    within(p.fill_offset, p.fill_count, vertices)
                        && within(p.stroke_offset, p.stroke_count, vertices)
                })
    }

    /// Uniform blocks laid out at `stride` bytes apart
    pub fn uniform_bytes(&self, stride: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; self.uniforms.len() * stride];
        for (block, uniforms) in bytes.chunks_exact_mut(stride).zip(&self.uniforms) {
            let src = bytemuck::bytes_of(uniforms);
            block[..src.len()].copy_from_slice(src);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(kind: CallKind) -> Call {
        Call {
            kind,
            image: None,
            path_offset: 0,
            path_count: 0,
            triangle_offset: 0,
            triangle_count: 0,
            uniform_offset: 0,
            composite: CompositeOperationState::default(),
        }
    }

    #[test]
    fn test_vertices_survive_growth() {
        let mut frame = FrameData::new();
        let mut expected = Vec::new();
        for i in 0..5000 {
            let v = Vertex::new(i as f32, -(i as f32), 0.0, 1.0);
            frame.reserve_vertices(1).unwrap();
            frame.push_vertices(&[v]);
            expected.push(v);
        }
        assert_eq!(frame.vertices, expected);
        assert_eq!(frame.vertices.capacity(), 4097 + 2048);
    }

    #[test]
    fn test_rollback_restores_lengths() {
        let mut frame = FrameData::new();
        frame.reserve_call().unwrap();
        frame.push_call(call(CallKind::Triangles));
        let mark = frame.mark();

        frame.reserve_call().unwrap();
        frame.alloc_paths(3).unwrap();
        frame.reserve_vertices(10).unwrap();
        frame.push_vertices(&[Vertex::default(); 10]);
        frame.alloc_uniforms(2).unwrap();
        frame.push_call(call(CallKind::Fill));

        frame.rollback(mark);
        assert_eq!(frame.mark(), mark);
        assert_eq!(frame.calls.len(), 1);
    }

    #[test]
    fn test_offsets_are_taken_after_reserve() {
        let mut frame = FrameData::new();
        assert_eq!(frame.alloc_paths(2).unwrap(), 0);
        assert_eq!(frame.alloc_paths(200).unwrap(), 2);
        assert_eq!(frame.alloc_uniforms(2).unwrap(), 0);
        assert_eq!(frame.alloc_uniforms(1).unwrap(), 2);
        assert_eq!(frame.paths.len(), 202);
    }

    #[test]
    fn test_uniform_bytes_are_strided() {
        let mut frame = FrameData::new();
        frame.alloc_uniforms(2).unwrap();
        frame.uniforms[1].radius = 3.0;
        let bytes = frame.uniform_bytes(256);
        assert_eq!(bytes.len(), 512);
        let block: FragUniforms =
            bytemuck::pod_read_unaligned(&bytes[256..256 + std::mem::size_of::<FragUniforms>()]);
        assert_eq!(block.radius, 3.0);
    }

    #[test]
    fn test_bounds_check() {
        let mut frame = FrameData::new();
        frame.alloc_uniforms(1).unwrap();
        let mut c = call(CallKind::Fill);
        assert!(!frame.call_in_bounds(&c, true));
        frame.alloc_uniforms(1).unwrap();
        assert!(frame.call_in_bounds(&c, true));
        c.triangle_count = 4;
        assert!(!frame.call_in_bounds(&c, true));
    }
}
