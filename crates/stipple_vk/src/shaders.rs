//! WGSL shader source and SPIR-V translation
//!
//! One module serves every pipeline permutation:
//! - `vs_main`: maps pixel positions to clip space
//! - `fs_main`: paint evaluation without stroke coverage
//! - `fs_edge_aa`: paint evaluation with stroke-edge coverage and threshold discard

use std::ffi::CStr;

use crate::error::{RenderError, Result};

pub const VERTEX_ENTRY: &CStr = c"vs_main";
pub const FRAGMENT_ENTRY: &CStr = c"fs_main";
pub const FRAGMENT_EDGE_AA_ENTRY: &CStr = c"fs_edge_aa";

/// Path shader: gradients, image patterns, stencil-only and textured triangles
pub const PATH_SHADER: &str = r#"
struct ViewUniforms {
    view_size: vec2<f32>,
    padding: vec2<f32>,
}

struct FragUniforms {
    scissor_mat: mat3x3<f32>,
    paint_mat: mat3x3<f32>,
    inner_col: vec4<f32>,
    outer_col: vec4<f32>,
    scissor_ext: vec2<f32>,
    scissor_scale: vec2<f32>,
    extent: vec2<f32>,
    radius: f32,
    feather: f32,
    stroke_mult: f32,
    stroke_thr: f32,
    // 0 = premultiplied rgba, 1 = straight rgba, 2 = alpha
    tex_type: i32,
    // 0 = gradient, 1 = image, 2 = stencil only, 3 = textured triangles
    shader_type: i32,
}

@group(0) @binding(0) var<uniform> viewport: ViewUniforms;
@group(0) @binding(1) var<uniform> frag: FragUniforms;
@group(0) @binding(2) var tex: texture_2d<f32>;
@group(0) @binding(3) var tex_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tcoord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ftcoord: vec2<f32>,
    @location(1) fpos: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.ftcoord = in.tcoord;
    out.fpos = in.position;
    out.position = vec4<f32>(
        2.0 * in.position.x / viewport.view_size.x - 1.0,
        2.0 * in.position.y / viewport.view_size.y - 1.0,
        0.0,
        1.0,
    );
    return out;
}

fn sdroundrect(pt: vec2<f32>, ext: vec2<f32>, rad: f32) -> f32 {
    let ext2 = ext - vec2<f32>(rad, rad);
    let d = abs(pt) - ext2;
    return min(max(d.x, d.y), 0.0) + length(max(d, vec2<f32>(0.0, 0.0))) - rad;
}

fn scissor_mask(p: vec2<f32>) -> f32 {
    var sc = abs((frag.scissor_mat * vec3<f32>(p, 1.0)).xy) - frag.scissor_ext;
    sc = vec2<f32>(0.5, 0.5) - sc * frag.scissor_scale;
    return clamp(sc.x, 0.0, 1.0) * clamp(sc.y, 0.0, 1.0);
}

fn stroke_mask(ftcoord: vec2<f32>) -> f32 {
    return min(1.0, (1.0 - abs(ftcoord.x * 2.0 - 1.0)) * frag.stroke_mult) * min(1.0, ftcoord.y);
}

fn sample_texel(uv: vec2<f32>) -> vec4<f32> {
    var color = textureSampleLevel(tex, tex_sampler, uv, 0.0);
    if (frag.tex_type == 1) {
        color = vec4<f32>(color.xyz * color.w, color.w);
    }
    if (frag.tex_type == 2) {
        color = vec4<f32>(color.x, color.x, color.x, color.x);
    }
    return color;
}

fn shade(ftcoord: vec2<f32>, fpos: vec2<f32>, stroke_alpha: f32) -> vec4<f32> {
    let scissor = scissor_mask(fpos);
    var color = vec4<f32>(1.0, 1.0, 1.0, 1.0);
    if (frag.shader_type == 0) {
        let pt = (frag.paint_mat * vec3<f32>(fpos, 1.0)).xy;
        let d = clamp((sdroundrect(pt, frag.extent, frag.radius) + frag.feather * 0.5) / frag.feather, 0.0, 1.0);
        color = mix(frag.inner_col, frag.outer_col, d);
        color = color * (stroke_alpha * scissor);
    } else if (frag.shader_type == 1) {
        let pt = (frag.paint_mat * vec3<f32>(fpos, 1.0)).xy / frag.extent;
        color = sample_texel(pt) * frag.inner_col;
        color = color * (stroke_alpha * scissor);
    } else if (frag.shader_type == 3) {
        color = sample_texel(ftcoord) * scissor * frag.inner_col;
    }
    return color;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return shade(in.ftcoord, in.fpos, 1.0);
}

@fragment
fn fs_edge_aa(in: VertexOutput) -> @location(0) vec4<f32> {
    let stroke_alpha = stroke_mask(in.ftcoord);
    if (stroke_alpha < frag.stroke_thr) {
        discard;
    }
    return shade(in.ftcoord, in.fpos, stroke_alpha);
}
"#;

/// Parse and validate [`PATH_SHADER`], returning the naga module and its info
pub fn parse_path_shader() -> Result<(naga::Module, naga::valid::ModuleInfo)> {
    let module = naga::front::wgsl::parse_str(PATH_SHADER)
        .map_err(|e| RenderError::Shader(e.emit_to_string(PATH_SHADER)))?;
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| RenderError::Shader(format!("{e:?}")))?;
    Ok((module, info))
}

/// Translate [`PATH_SHADER`] to SPIR-V words holding all three entry points
///
/// Positions are emitted without a Y flip: the vertex stage already maps
/// pixel rows top-down, which is Vulkan's clip-space convention.
pub fn compile_path_shader() -> Result<Vec<u32>> {
    let (module, info) = parse_path_shader()?;
    let options = naga::back::spv::Options {
        flags: naga::back::spv::WriterFlags::empty(),
        ..Default::default()
    };
    naga::back::spv::write_vec(&module, &info, &options, None)
        .map_err(|e| RenderError::Shader(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_shader_validates() {
        let (module, _) = parse_path_shader().unwrap();
        let names: Vec<&str> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
        for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY, FRAGMENT_EDGE_AA_ENTRY] {
            let entry = entry.to_str().unwrap();
            assert!(names.contains(&entry), "missing entry point {entry}");
        }
    }

    #[test]
    fn test_spirv_header() {
        let words = compile_path_shader().unwrap();
        assert_eq!(words[0], 0x0723_0203);
        assert!(words.len() > 5);
    }
}
