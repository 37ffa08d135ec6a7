//! Fragment uniform blocks and paint conversion
//!
//! Layout matches `FragUniforms` in [`PATH_SHADER`](crate::shaders::PATH_SHADER).

use bytemuck::{Pod, Zeroable};
use stipple_core::{ImageFlags, Paint, Scissor, TextureKind, Transform};

use crate::texture::TextureInfo;

/// Stroke threshold that disables coverage discard
pub const NO_STROKE_THRESHOLD: f32 = -1.0;

/// Coverage threshold for the first stencil-stroke pass
pub const STENCIL_STROKE_THRESHOLD: f32 = 1.0 - 0.5 / 255.0;

/// Fragment shader variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ShaderType {
    FillGradient = 0,
    FillImage = 1,
    /// Stencil-only pass; paint is ignored
    Simple = 2,
    /// Textured triangles sampled at vertex UVs
    Image = 3,
}

/// Texel interpretation tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TexType {
    Premultiplied = 0,
    Straight = 1,
    Alpha = 2,
}

impl TexType {
    pub fn for_texture(kind: TextureKind, flags: ImageFlags) -> Self {
        match kind {
            TextureKind::Rgba if flags.contains(ImageFlags::PREMULTIPLIED) => TexType::Premultiplied,
            TextureKind::Rgba => TexType::Straight,
            TextureKind::Alpha => TexType::Alpha,
        }
    }
}

/// Vertex-stage uniforms, shared by every draw in a frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    /// Viewport size in logical pixels
    pub view_size: [f32; 2],
    pub padding: [f32; 2],
}

impl ViewUniforms {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            view_size: [width, height],
            padding: [0.0; 2],
        }
    }
}

/// Fragment uniform block (176 bytes, std140 compatible)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FragUniforms {
    /// Inverse scissor transform as three padded columns
    pub scissor_mat: [f32; 12],
    /// Inverse paint transform as three padded columns
    pub paint_mat: [f32; 12],
    pub inner_col: [f32; 4],
    pub outer_col: [f32; 4],
    pub scissor_ext: [f32; 2],
    pub scissor_scale: [f32; 2],
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub stroke_mult: f32,
    pub stroke_thr: f32,
    pub tex_type: i32,
    pub shader_type: i32,
}

impl FragUniforms {
    /// Block for stencil-only passes
    pub fn simple() -> Self {
        Self {
            stroke_thr: NO_STROKE_THRESHOLD,
            shader_type: ShaderType::Simple as i32,
            ..Self::default()
        }
    }

    pub fn set_shader_type(&mut self, shader_type: ShaderType) {
        self.shader_type = shader_type as i32;
    }
}

/// Round `size` up to a multiple of `alignment` (zero means unaligned)
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

/// Convert a paint and scissor into a uniform block.
///
/// `width` is the stroke width (or fringe for fills), `fringe` the
/// anti-aliasing feather width. `texture` describes `paint.image` and must be
/// `Some` for image paints.
pub fn convert_paint(
    paint: &Paint,
    scissor: &Scissor,
    width: f32,
    fringe: f32,
    stroke_thr: f32,
    texture: Option<TextureInfo>,
) -> FragUniforms {
    let mut frag = FragUniforms {
        inner_col: paint.inner_color.premultiplied().to_array(),
        outer_col: paint.outer_color.premultiplied().to_array(),
        ..FragUniforms::default()
    };

    if scissor.is_disabled() {
        frag.scissor_mat = [0.0; 12];
        frag.scissor_ext = [1.0, 1.0];
        frag.scissor_scale = [1.0, 1.0];
    } else {
        let [a, b, c, d, _, _] = scissor.xform.elements;
        frag.scissor_mat = scissor.xform.inverse().to_mat3x4();
        frag.scissor_ext = scissor.extent;
        frag.scissor_scale = [
            (a * a + c * c).sqrt() / fringe,
            (b * b + d * d).sqrt() / fringe,
        ];
    }

    frag.extent = paint.extent;
    frag.stroke_mult = (width * 0.5 + fringe * 0.5) / fringe;
    frag.stroke_thr = stroke_thr;

    let inverse = match texture {
        Some(info) => {
            frag.set_shader_type(ShaderType::FillImage);
            frag.tex_type = TexType::for_texture(info.kind, info.flags) as i32;
            if info.flags.contains(ImageFlags::FLIP_Y) {
                let half = frag.extent[1] * 0.5;
                Transform::translate(0.0, -half)
                    .then(&Transform::scale(1.0, -1.0))
                    .then(&Transform::translate(0.0, half))
                    .then(&paint.xform)
                    .inverse()
            } else {
                paint.xform.inverse()
            }
        }
        None => {
            frag.set_shader_type(ShaderType::FillGradient);
            frag.radius = paint.radius;
            frag.feather = paint.feather;
            paint.xform.inverse()
        }
    };
    frag.paint_mat = inverse.to_mat3x4();

    frag
}
