//! Pipeline permutations and their cache
//!
//! A permutation is identified by a [`PipelineKey`]. The cache compiles each
//! distinct key once, on first use, and keeps it until the renderer is
//! dropped. The working set is small (a few dozen keys at most), so lookup is
//! a linear scan.

use ash::vk;
use stipple_core::{BlendFactor, CompositeOperationState};
use tracing::debug;

use crate::device::{GpuDevice, PipelineDesc};
use crate::error::Result;
use crate::growth::{self, PIPELINE_FLOOR};
use crate::shaders::{FRAGMENT_EDGE_AA_ENTRY, FRAGMENT_ENTRY};

/// Primitive topology of a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Fan,
    Strip,
    List,
}

impl Topology {
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            Topology::Fan => vk::PrimitiveTopology::TRIANGLE_FAN,
            Topology::Strip => vk::PrimitiveTopology::TRIANGLE_STRIP,
            Topology::List => vk::PrimitiveTopology::TRIANGLE_LIST,
        }
    }
}

/// Structural identity of a pipeline permutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub topology: Topology,
    /// Pass writes winding counts into the stencil buffer
    pub stencil_fill: bool,
    /// Pass is masked by the stencil buffer
    pub stencil_test: bool,
    /// Selects the stencil == 0 test used by fringe passes
    pub edge_aa: bool,
    /// Fragment stage computes stroke-edge coverage
    pub edge_aa_shader: bool,
    pub composite: CompositeOperationState,
}

impl PipelineKey {
    pub fn new(topology: Topology, composite: CompositeOperationState) -> Self {
        Self {
            topology,
            stencil_fill: false,
            stencil_test: false,
            edge_aa: false,
            edge_aa_shader: false,
            composite,
        }
    }

    pub fn stencil_fill(mut self, enabled: bool) -> Self {
        self.stencil_fill = enabled;
        self
    }

    pub fn stencil_test(mut self, enabled: bool) -> Self {
        self.stencil_test = enabled;
        self
    }

    pub fn edge_aa(mut self, enabled: bool) -> Self {
        self.edge_aa = enabled;
        self
    }

    pub fn edge_aa_shader(mut self, enabled: bool) -> Self {
        self.edge_aa_shader = enabled;
        self
    }

    /// Whether this pass only touches the stencil buffer
    pub fn writes_stencil_only(&self) -> bool {
        self.stencil_fill
    }
}

/// Render pass, layout and shader module every pipeline is built against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineTargets {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub module: vk::ShaderModule,
}

const BLEND_FACTORS: [(BlendFactor, vk::BlendFactor); 11] = [
    (BlendFactor::ZERO, vk::BlendFactor::ZERO),
    (BlendFactor::ONE, vk::BlendFactor::ONE),
    (BlendFactor::SRC_COLOR, vk::BlendFactor::SRC_COLOR),
    (BlendFactor::ONE_MINUS_SRC_COLOR, vk::BlendFactor::ONE_MINUS_SRC_COLOR),
    (BlendFactor::DST_COLOR, vk::BlendFactor::DST_COLOR),
    (BlendFactor::ONE_MINUS_DST_COLOR, vk::BlendFactor::ONE_MINUS_DST_COLOR),
    (BlendFactor::SRC_ALPHA, vk::BlendFactor::SRC_ALPHA),
    (BlendFactor::ONE_MINUS_SRC_ALPHA, vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
    (BlendFactor::DST_ALPHA, vk::BlendFactor::DST_ALPHA),
    (BlendFactor::ONE_MINUS_DST_ALPHA, vk::BlendFactor::ONE_MINUS_DST_ALPHA),
    (BlendFactor::SRC_ALPHA_SATURATE, vk::BlendFactor::SRC_ALPHA_SATURATE),
];

/// Vulkan factor for a single-bit blend factor
fn map_blend_factor(factor: BlendFactor) -> Option<vk::BlendFactor> {
    BLEND_FACTORS
        .iter()
        .find(|(f, _)| *f == factor)
        .map(|(_, mapped)| *mapped)
}

/// Color blend state for a composite operation. Unmappable factors fall back
/// to premultiplied source-over.
pub fn blend_state(
    composite: &CompositeOperationState,
    color_write_mask: vk::ColorComponentFlags,
) -> vk::PipelineColorBlendAttachmentState {
    let factors = (
        map_blend_factor(composite.src_rgb),
        map_blend_factor(composite.dst_rgb),
        map_blend_factor(composite.src_alpha),
        map_blend_factor(composite.dst_alpha),
    );
    let (src_rgb, dst_rgb, src_alpha, dst_alpha) = match factors {
        (Some(sr), Some(dr), Some(sa), Some(da)) => (sr, dr, sa, da),
        _ => (
            vk::BlendFactor::ONE,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            vk::BlendFactor::ONE,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        ),
    };

    vk::PipelineColorBlendAttachmentState {
        blend_enable: vk::TRUE,
        src_color_blend_factor: src_rgb,
        dst_color_blend_factor: dst_rgb,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: src_alpha,
        dst_alpha_blend_factor: dst_alpha,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask,
    }
}

fn stencil_op(
    compare: vk::CompareOp,
    fail: vk::StencilOp,
    pass: vk::StencilOp,
) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: fail,
        pass_op: pass,
        depth_fail_op: fail,
        compare_op: compare,
        compare_mask: 0xff,
        write_mask: 0xff,
        reference: 0,
    }
}

/// Front and back stencil state for a key, `None` when stencil is unused
pub fn stencil_state(key: &PipelineKey) -> Option<(vk::StencilOpState, vk::StencilOpState)> {
    use ash::vk::{CompareOp, StencilOp};

    match (key.stencil_fill, key.stencil_test) {
        (false, false) => None,
        // winding accumulation
        (true, false) => Some((
            stencil_op(CompareOp::ALWAYS, StencilOp::KEEP, StencilOp::INCREMENT_AND_WRAP),
            stencil_op(CompareOp::ALWAYS, StencilOp::KEEP, StencilOp::DECREMENT_AND_WRAP),
        )),
        (false, true) if key.edge_aa => {
            let op = stencil_op(CompareOp::EQUAL, StencilOp::KEEP, StencilOp::KEEP);
            Some((op, op))
        }
        (false, true) => {
            let op = stencil_op(CompareOp::NOT_EQUAL, StencilOp::ZERO, StencilOp::ZERO);
            Some((op, op))
        }
        // stencil clear
        (true, true) => {
            let op = stencil_op(CompareOp::ALWAYS, StencilOp::ZERO, StencilOp::ZERO);
            Some((op, op))
        }
    }
}

/// Full build description for a key
pub fn describe(key: &PipelineKey, targets: &PipelineTargets) -> PipelineDesc {
    let stencil_only = key.writes_stencil_only();
    let color_write_mask = if stencil_only {
        vk::ColorComponentFlags::empty()
    } else {
        vk::ColorComponentFlags::RGBA
    };

    PipelineDesc {
        key: *key,
        layout: targets.layout,
        render_pass: targets.render_pass,
        module: targets.module,
        fragment_entry: if key.edge_aa_shader {
            FRAGMENT_EDGE_AA_ENTRY
        } else {
            FRAGMENT_ENTRY
        },
        topology: key.topology.to_vk(),
        cull_mode: if stencil_only {
            vk::CullModeFlags::NONE
        } else {
            vk::CullModeFlags::BACK
        },
        blend: blend_state(&key.composite, color_write_mask),
        stencil: stencil_state(key),
    }
}

/// Lazily compiled pipelines, one per distinct key
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: Vec<(PipelineKey, vk::Pipeline)>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, key: &PipelineKey) -> Option<vk::Pipeline> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, pipeline)| *pipeline)
    }

    /// Return the pipeline for `key`, compiling it on the first request
    pub fn get_or_create<D: GpuDevice>(
        &mut self,
        device: &D,
        key: &PipelineKey,
        targets: &PipelineTargets,
    ) -> Result<vk::Pipeline> {
        if let Some(pipeline) = self.find(key) {
            return Ok(pipeline);
        }

        growth::reserve(&mut self.entries, 1, PIPELINE_FLOOR)?;
        let pipeline = device.create_graphics_pipeline(&describe(key, targets))?;
        self.entries.push((*key, pipeline));
        debug!(count = self.entries.len(), ?key, "Compiled pipeline permutation");
        Ok(pipeline)
    }

    pub fn destroy_all<D: GpuDevice>(&mut self, device: &D) {
        for (_, pipeline) in self.entries.drain(..) {
            device.destroy_pipeline(pipeline);
        }
    }
}
