//! Command recording for a flushed frame
//!
//! Walks the frame's calls in order and turns each into pipeline binds,
//! descriptor sets and draws on the caller's command buffer. Every uniform
//! block that a pass reads gets its own descriptor set from the frame pool.

use std::mem::size_of;

use ash::vk;
use stipple_core::{ImageId, Vertex};
use tracing::{trace, warn};

use crate::device::{DescriptorWrite, GpuDevice};
use crate::error::Result;
use crate::frame::{Call, CallKind, FrameData};
use crate::pipeline::{PipelineCache, PipelineKey, PipelineTargets, Topology};
use crate::renderer::{CreateFlags, FrameStats};
use crate::texture::{Texture, TextureManager};
use crate::uniforms::{FragUniforms, ViewUniforms};

/// Handles a flush records against
#[derive(Clone, Copy, Debug)]
pub struct DispatchTargets {
    pub command_buffer: vk::CommandBuffer,
    pub pipeline: PipelineTargets,
    pub set_layout: vk::DescriptorSetLayout,
    pub pool: vk::DescriptorPool,
    pub vertex_buffer: vk::Buffer,
    pub view_buffer: vk::Buffer,
    pub frag_buffer: vk::Buffer,
    /// Distance in bytes between fragment uniform blocks
    pub frag_stride: u64,
    pub view_size: [f32; 2],
}

/// Records one frame's calls
pub struct Dispatcher<'a, D: GpuDevice> {
    device: &'a D,
    pipelines: &'a mut PipelineCache,
    textures: &'a TextureManager,
    placeholder: &'a Texture,
    targets: DispatchTargets,
    antialias: bool,
    stencil_strokes: bool,
    validate: bool,
    bound: Option<vk::Pipeline>,
    stats: FrameStats,
}

impl<'a, D: GpuDevice> Dispatcher<'a, D> {
    pub fn new(
        device: &'a D,
        pipelines: &'a mut PipelineCache,
        textures: &'a TextureManager,
        placeholder: &'a Texture,
        targets: DispatchTargets,
        flags: CreateFlags,
    ) -> Self {
        Self {
            device,
            pipelines,
            textures,
            placeholder,
            targets,
            antialias: flags.contains(CreateFlags::ANTIALIAS),
            stencil_strokes: flags.contains(CreateFlags::STENCIL_STROKES),
            validate: flags.contains(CreateFlags::DEBUG),
            bound: None,
            stats: FrameStats::default(),
        }
    }

    /// Record every call in `frame`
    pub fn run(mut self, frame: &FrameData) -> Result<FrameStats> {
        let cmd = self.targets.command_buffer;
        let [width, height] = self.targets.view_size;
        self.device.cmd_set_viewport(
            cmd,
            vk::Viewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                min_depth: 0.0,
                max_depth: 1.0,
            },
        );
        self.device.cmd_set_scissor(
            cmd,
            vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: width as u32,
                    height: height as u32,
                },
            },
        );

        for (index, call) in frame.calls.iter().enumerate() {
            if self.validate && !frame.call_in_bounds(call, self.stencil_strokes) {
                warn!(index, kind = ?call.kind, "Skipping call with out-of-range data");
                continue;
            }
            self.dispatch_call(frame, call)?;
            self.stats.calls += 1;
        }

        Ok(self.stats)
    }

    fn dispatch_call(&mut self, frame: &FrameData, call: &Call) -> Result<()> {
        match call.kind {
            CallKind::Fill => self.fill(frame, call),
            CallKind::ConvexFill => self.convex_fill(frame, call),
            CallKind::Stroke => self.stroke(frame, call),
            CallKind::Triangles => self.triangles(call),
        }
    }

    fn key(&self, topology: Topology, call: &Call) -> PipelineKey {
        PipelineKey::new(topology, call.composite).edge_aa_shader(self.antialias)
    }

    fn fill(&mut self, frame: &FrameData, call: &Call) -> Result<()> {
        let paths = &frame.paths[call.path_offset..call.path_offset + call.path_count];

        // winding counts into the stencil buffer
        self.bind_pipeline(&self.key(Topology::Fan, call).stencil_fill(true))?;
        self.bind_block(call.uniform_offset, call.image)?;
        for path in paths {
            self.draw(path.fill_offset, path.fill_count);
        }

        self.bind_block(call.uniform_offset + 1, call.image)?;
        if self.antialias {
            self.bind_pipeline(&self.key(Topology::Strip, call).stencil_test(true).edge_aa(true))?;
            for path in paths {
                self.draw(path.stroke_offset, path.stroke_count);
            }
        }

        // cover the bounds where the winding count is non-zero, clearing it
        self.bind_pipeline(&self.key(Topology::Strip, call).stencil_test(true))?;
        self.draw(call.triangle_offset, call.triangle_count);
        Ok(())
    }

    fn convex_fill(&mut self, frame: &FrameData, call: &Call) -> Result<()> {
        let paths = &frame.paths[call.path_offset..call.path_offset + call.path_count];

        self.bind_pipeline(&self.key(Topology::Fan, call))?;
        self.bind_block(call.uniform_offset, call.image)?;
        for path in paths {
            self.draw(path.fill_offset, path.fill_count);
        }

        if self.antialias {
            self.bind_pipeline(&self.key(Topology::Strip, call))?;
            for path in paths {
                self.draw(path.stroke_offset, path.stroke_count);
            }
        }
        Ok(())
    }

    fn stroke(&mut self, frame: &FrameData, call: &Call) -> Result<()> {
        let paths = &frame.paths[call.path_offset..call.path_offset + call.path_count];

        if !self.stencil_strokes {
            self.bind_pipeline(&self.key(Topology::Strip, call))?;
            self.bind_block(call.uniform_offset, call.image)?;
            for path in paths {
                self.draw(path.stroke_offset, path.stroke_count);
            }
            return Ok(());
        }

        // solid interior, discarding partial coverage
        self.bind_pipeline(&self.key(Topology::Strip, call))?;
        self.bind_block(call.uniform_offset + 1, call.image)?;
        for path in paths {
            self.draw(path.stroke_offset, path.stroke_count);
        }

        // anti-aliased edges where the interior did not draw
        self.bind_pipeline(&self.key(Topology::Strip, call).stencil_test(true).edge_aa(true))?;
        self.bind_block(call.uniform_offset, call.image)?;
        for path in paths {
            self.draw(path.stroke_offset, path.stroke_count);
        }

        // clear the stencil the stroke left behind
        let clear = PipelineKey::new(Topology::Strip, call.composite)
            .stencil_fill(true)
            .stencil_test(true);
        self.bind_pipeline(&clear)?;
        for path in paths {
            self.draw(path.stroke_offset, path.stroke_count);
        }
        Ok(())
    }

    fn triangles(&mut self, call: &Call) -> Result<()> {
        if call.triangle_count == 0 {
            return Ok(());
        }
        self.bind_pipeline(&self.key(Topology::List, call))?;
        self.bind_block(call.uniform_offset, call.image)?;
        self.draw(call.triangle_offset, call.triangle_count);
        Ok(())
    }

    /// Bind the pipeline for `key` unless it is already bound
    fn bind_pipeline(&mut self, key: &PipelineKey) -> Result<()> {
        let pipeline = self
            .pipelines
            .get_or_create(self.device, key, &self.targets.pipeline)?;
        if self.bound != Some(pipeline) {
            self.device
                .cmd_bind_pipeline(self.targets.command_buffer, pipeline);
            self.bound = Some(pipeline);
            self.stats.pipeline_binds += 1;
        }
        Ok(())
    }

    /// Allocate, fill and bind a descriptor set for uniform block `block`
    fn bind_block(&mut self, block: usize, image: Option<ImageId>) -> Result<()> {
        let set = self
            .device
            .allocate_descriptor_set(self.targets.pool, self.targets.set_layout)?;
        let texture = self.texture(image);
        self.device.write_descriptor_set(&DescriptorWrite {
            set,
            view_buffer: self.targets.view_buffer,
            view_range: size_of::<ViewUniforms>() as u64,
            frag_buffer: self.targets.frag_buffer,
            frag_offset: block as u64 * self.targets.frag_stride,
            frag_range: size_of::<FragUniforms>() as u64,
            image_view: texture.view,
            sampler: texture.sampler,
        });
        self.device.cmd_bind_descriptor_set(
            self.targets.command_buffer,
            self.targets.pipeline.layout,
            set,
        );
        Ok(())
    }

    /// Texture sampled for `image`, the placeholder when there is none
    fn texture(&self, image: Option<ImageId>) -> &'a Texture {
        let textures = self.textures;
        match image {
            Some(id) => textures.get(id).unwrap_or_else(|| {
                warn!(?id, "Texture deleted before flush, sampling placeholder");
                self.placeholder
            }),
            None => self.placeholder,
        }
    }

    fn draw(&mut self, offset: usize, count: usize) {
        if count == 0 {
            return;
        }
        let cmd = self.targets.command_buffer;
        let byte_offset = (offset * size_of::<Vertex>()) as u64;
        self.device
            .cmd_bind_vertex_buffer(cmd, self.targets.vertex_buffer, byte_offset);
        self.device.cmd_draw(cmd, count as u32);
        self.stats.draws += 1;
        trace!(offset, count, "Draw");
    }
}
