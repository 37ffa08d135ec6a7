//! Vulkan vector renderer
//!
//! `VkRenderer` accumulates fills, strokes and triangle lists between
//! [`begin_frame`] and [`end_frame`], then records them into the caller's
//! command buffer inside the caller's render pass. The renderer never submits
//! work or waits on the GPU; the caller owns submission and must keep a
//! command buffer's resources alive until it finishes executing.
//!
//! [`begin_frame`]: VkRenderer::begin_frame
//! [`end_frame`]: VkRenderer::end_frame

use ash::vk;
use bitflags::bitflags;
use stipple_core::{
    bounds_quad, Bounds, CompositeOperationState, ImageFlags, ImageId, Paint, Path, Scissor,
    TextureKind, Vertex,
};
use tracing::{debug, info, trace, warn};

use crate::device::GpuDevice;
use crate::dispatch::{DispatchTargets, Dispatcher};
use crate::error::Result;
use crate::frame::{Call, CallKind, FrameData, PathRange};
use crate::memory::{self, GpuBuffer};
use crate::pipeline::{PipelineCache, PipelineTargets};
use crate::shaders;
use crate::texture::{Texture, TextureInfo, TextureManager};
use crate::uniforms::{
    aligned_stride, convert_paint, FragUniforms, ShaderType, ViewUniforms, NO_STROKE_THRESHOLD,
    STENCIL_STROKE_THRESHOLD,
};

bitflags! {
    /// Renderer behavior chosen at creation
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CreateFlags: u32 {
        /// Draw anti-aliasing fringes and use the edge-coverage shader
        const ANTIALIAS = 1 << 0;
        /// Draw strokes in stencil passes so overlapping segments blend once
        const STENCIL_STROKES = 1 << 1;
        /// Bounds-check calls before recording and log frame statistics
        const DEBUG = 1 << 2;
    }
}

impl Default for CreateFlags {
    fn default() -> Self {
        CreateFlags::ANTIALIAS | CreateFlags::STENCIL_STROKES
    }
}

/// Everything the renderer needs from the host application
#[derive(Clone, Debug)]
pub struct CreateInfo<D> {
    pub device: D,
    /// Render pass the pipelines are compiled against. Its attachment must
    /// have a stencil aspect.
    pub render_pass: vk::RenderPass,
    /// Command buffer frames are recorded into
    pub command_buffer: vk::CommandBuffer,
    pub limits: vk::PhysicalDeviceLimits,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub flags: CreateFlags,
}

/// Counters for one flushed frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Calls recorded into the command buffer
    pub calls: usize,
    pub draws: usize,
    /// Pipeline binds after skipping redundant ones
    pub pipeline_binds: usize,
    pub vertices: usize,
    pub uniform_blocks: usize,
}

/// Where the renderer is in its frame cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    Idle,
    Recording,
}

/// Descriptor pool sized for a number of calls
#[derive(Clone, Copy, Debug)]
struct DescriptorPool {
    pool: vk::DescriptorPool,
    calls: usize,
}

/// Vector renderer recording into a caller-supplied command buffer
pub struct VkRenderer<D: GpuDevice> {
    device: D,
    render_pass: vk::RenderPass,
    command_buffer: vk::CommandBuffer,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    flags: CreateFlags,
    frag_stride: u64,

    shader: vk::ShaderModule,
    set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipelines: PipelineCache,
    descriptor_pool: Option<DescriptorPool>,

    vertex_buffer: Option<GpuBuffer>,
    view_buffer: Option<GpuBuffer>,
    frag_buffer: Option<GpuBuffer>,

    textures: TextureManager,
    /// 1x1 white texture bound when a call samples no image
    placeholder: Texture,

    frame: FrameData,
    view_size: [f32; 2],
    state: FrameState,
}

impl<D: GpuDevice> VkRenderer<D> {
    /// Create the renderer: placeholder texture, shader module and layouts.
    ///
    /// Pipelines, buffers and the descriptor pool are created on demand.
    /// Anything created before a failure is released.
    pub fn new(info: CreateInfo<D>) -> Result<Self> {
        let frag_stride = aligned_stride(
            std::mem::size_of::<FragUniforms>() as u64,
            info.limits.min_uniform_buffer_offset_alignment,
        );

        let white = TextureInfo {
            width: 1,
            height: 1,
            kind: TextureKind::Rgba,
            flags: ImageFlags::empty(),
        };
        let placeholder = Texture::create(
            &info.device,
            &info.memory_properties,
            white,
            Some(&[255u8; 4][..]),
        )?;

        let mut renderer = Self {
            device: info.device,
            render_pass: info.render_pass,
            command_buffer: info.command_buffer,
            memory_properties: info.memory_properties,
            flags: info.flags,
            frag_stride,
            shader: vk::ShaderModule::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipelines: PipelineCache::new(),
            descriptor_pool: None,
            vertex_buffer: None,
            view_buffer: None,
            frag_buffer: None,
            textures: TextureManager::new(),
            placeholder,
            frame: FrameData::new(),
            view_size: [0.0; 2],
            state: FrameState::Idle,
        };
        // on error, Drop releases whatever was created
        renderer.init()?;

        info!(
            flags = ?renderer.flags,
            frag_stride,
            "Vulkan renderer initialized"
        );
        Ok(renderer)
    }

    fn init(&mut self) -> Result<()> {
        let spirv = shaders::compile_path_shader()?;
        self.shader = self.device.create_shader_module(&spirv)?;

        let bindings = [
            layout_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
            layout_binding(1, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::FRAGMENT),
            layout_binding(2, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT),
            layout_binding(3, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT),
        ];
        self.set_layout = self.device.create_descriptor_set_layout(&bindings)?;
        self.pipeline_layout = self.device.create_pipeline_layout(self.set_layout)?;
        Ok(())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn flags(&self) -> CreateFlags {
        self.flags
    }

    /// Record subsequent frames into `command_buffer`
    pub fn set_command_buffer(&mut self, command_buffer: vk::CommandBuffer) {
        self.command_buffer = command_buffer;
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    /// Calls recorded so far in the current frame
    pub fn pending_calls(&self) -> usize {
        self.frame.calls.len()
    }

    /// Start a frame of `width` x `height` logical pixels.
    ///
    /// A frame that was still recording is discarded.
    pub fn begin_frame(&mut self, width: f32, height: f32, device_pixel_ratio: f32) {
        if self.state == FrameState::Recording {
            warn!(
                calls = self.frame.calls.len(),
                "begin_frame while recording, discarding previous frame"
            );
        }
        self.frame.clear();
        self.view_size = [width, height];
        self.state = FrameState::Recording;
        trace!(width, height, device_pixel_ratio, "Begin frame");
    }

    /// Drop everything recorded since `begin_frame`
    pub fn cancel_frame(&mut self) {
        self.frame.clear();
        self.state = FrameState::Idle;
    }

    /// Record the frame into the command buffer and reset for the next one.
    ///
    /// Recorded data is discarded even when recording fails.
    pub fn end_frame(&mut self) -> Result<FrameStats> {
        if self.state != FrameState::Recording {
            trace!("end_frame with nothing recorded");
        }
        let result = self.flush();
        self.frame.clear();
        self.state = FrameState::Idle;

        if let Ok(stats) = &result {
            if self.flags.contains(CreateFlags::DEBUG) {
                debug!(?stats, "Frame flushed");
            }
        }
        result
    }

    fn flush(&mut self) -> Result<FrameStats> {
        if self.frame.is_empty() {
            return Ok(FrameStats::default());
        }

        let device = &self.device;
        let props = &self.memory_properties;
        let vertex_buffer = memory::upload(
            device,
            props,
            &mut self.vertex_buffer,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(&self.frame.vertices),
        )?;
        let view = ViewUniforms::new(self.view_size[0], self.view_size[1]);
        let view_buffer = memory::upload(
            device,
            props,
            &mut self.view_buffer,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            bytemuck::bytes_of(&view),
        )?;
        let frag_buffer = memory::upload(
            device,
            props,
            &mut self.frag_buffer,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            &self.frame.uniform_bytes(self.frag_stride as usize),
        )?;
        let pool = self.prepare_descriptor_pool(self.frame.calls.len())?;

        let targets = DispatchTargets {
            command_buffer: self.command_buffer,
            pipeline: PipelineTargets {
                render_pass: self.render_pass,
                layout: self.pipeline_layout,
                module: self.shader,
            },
            set_layout: self.set_layout,
            pool,
            vertex_buffer: vertex_buffer.buffer,
            view_buffer: view_buffer.buffer,
            frag_buffer: frag_buffer.buffer,
            frag_stride: self.frag_stride,
            view_size: self.view_size,
        };
        let dispatcher = Dispatcher::new(
            &self.device,
            &mut self.pipelines,
            &self.textures,
            &self.placeholder,
            targets,
            self.flags,
        );
        let mut stats = dispatcher.run(&self.frame)?;
        stats.vertices = self.frame.vertices.len();
        stats.uniform_blocks = self.frame.uniforms.len();
        Ok(stats)
    }

    /// Reset the pool, or recreate it when it cannot hold `calls` calls
    fn prepare_descriptor_pool(&mut self, calls: usize) -> Result<vk::DescriptorPool> {
        if let Some(existing) = self.descriptor_pool {
            if existing.calls >= calls {
                self.device.reset_descriptor_pool(existing.pool)?;
                return Ok(existing.pool);
            }
            self.descriptor_pool = None;
            self.device.destroy_descriptor_pool(existing.pool);
        }

        // each call binds at most two sets
        let sets = (calls * 2) as u32;
        let sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: sets * 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: sets,
            },
        ];
        let pool = self.device.create_descriptor_pool(sets, &sizes)?;
        self.descriptor_pool = Some(DescriptorPool { pool, calls });
        debug!(calls, sets, "Created descriptor pool");
        Ok(pool)
    }

    /// Queue a filled path.
    ///
    /// A single convex path is drawn directly; anything else goes through
    /// stencil winding and is covered with the `bounds` quad.
    pub fn fill(
        &mut self,
        paint: &Paint,
        composite: CompositeOperationState,
        scissor: &Scissor,
        fringe: f32,
        bounds: Bounds,
        paths: &[Path<'_>],
    ) {
        self.record("fill", |this| {
            let texture = this.paint_texture(paint)?;
            let convex = matches!(paths, [path] if path.convex);
            let kind = if convex {
                CallKind::ConvexFill
            } else {
                CallKind::Fill
            };

            let quad_vertices = if convex { 0 } else { 4 };
            let total = paths.iter().map(Path::vertex_count).sum::<usize>() + quad_vertices;
            let (path_offset, path_count) = this.push_paths(paths, total, true)?;

            let mut call = this.new_call(kind, paint, composite);
            call.path_offset = path_offset;
            call.path_count = path_count;

            let paint_block = convert_paint(
                paint,
                scissor,
                fringe,
                fringe,
                NO_STROKE_THRESHOLD,
                texture,
            );
            if convex {
                call.uniform_offset = this.frame.alloc_uniforms(1)?;
                this.frame.uniforms[call.uniform_offset] = paint_block;
            } else {
                call.triangle_offset = this.frame.push_vertices(&bounds_quad(bounds));
                call.triangle_count = 4;
                call.uniform_offset = this.frame.alloc_uniforms(2)?;
                this.frame.uniforms[call.uniform_offset] = FragUniforms::simple();
                this.frame.uniforms[call.uniform_offset + 1] = paint_block;
            }

            this.frame.push_call(call);
            Ok(())
        });
    }

    /// Queue stroked paths. Only the paths' stroke strips are used.
    pub fn stroke(
        &mut self,
        paint: &Paint,
        composite: CompositeOperationState,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        paths: &[Path<'_>],
    ) {
        self.record("stroke", |this| {
            let texture = this.paint_texture(paint)?;
            let total = paths.iter().map(|p| p.stroke.len()).sum();
            let (path_offset, path_count) = this.push_paths(paths, total, false)?;

            let mut call = this.new_call(CallKind::Stroke, paint, composite);
            call.path_offset = path_offset;
            call.path_count = path_count;

            let block = |threshold| {
                convert_paint(paint, scissor, stroke_width, fringe, threshold, texture)
            };
            if this.flags.contains(CreateFlags::STENCIL_STROKES) {
                call.uniform_offset = this.frame.alloc_uniforms(2)?;
                this.frame.uniforms[call.uniform_offset] = block(NO_STROKE_THRESHOLD);
                this.frame.uniforms[call.uniform_offset + 1] = block(STENCIL_STROKE_THRESHOLD);
            } else {
                call.uniform_offset = this.frame.alloc_uniforms(1)?;
                this.frame.uniforms[call.uniform_offset] = block(NO_STROKE_THRESHOLD);
            }

            this.frame.push_call(call);
            Ok(())
        });
    }

    /// Queue a textured triangle list. An empty list records nothing.
    pub fn triangles(
        &mut self,
        paint: &Paint,
        composite: CompositeOperationState,
        scissor: &Scissor,
        vertices: &[Vertex],
    ) {
        if vertices.is_empty() {
            return;
        }
        self.record("triangles", |this| {
            let texture = this.paint_texture(paint)?;
            this.frame.reserve_vertices(vertices.len())?;

            let mut call = this.new_call(CallKind::Triangles, paint, composite);
            call.triangle_offset = this.frame.push_vertices(vertices);
            call.triangle_count = vertices.len();

            let mut block = convert_paint(paint, scissor, 1.0, 1.0, NO_STROKE_THRESHOLD, texture);
            block.set_shader_type(ShaderType::Image);
            call.uniform_offset = this.frame.alloc_uniforms(1)?;
            this.frame.uniforms[call.uniform_offset] = block;

            this.frame.push_call(call);
            Ok(())
        });
    }

    /// Run `build` against the frame, undoing its partial writes on failure
    fn record(&mut self, what: &str, build: impl FnOnce(&mut Self) -> Result<()>) {
        if self.state == FrameState::Idle {
            trace!(what, "Draw before begin_frame, recording with previous view size");
            self.state = FrameState::Recording;
        }
        let mark = self.frame.mark();
        let result = self.frame.reserve_call().and_then(|()| build(self));
        if let Err(err) = result {
            self.frame.rollback(mark);
            warn!(what, %err, "Dropped draw call");
        }
    }

    fn new_call(&self, kind: CallKind, paint: &Paint, composite: CompositeOperationState) -> Call {
        Call {
            kind,
            image: paint.image,
            path_offset: 0,
            path_count: 0,
            triangle_offset: 0,
            triangle_count: 0,
            uniform_offset: 0,
            composite,
        }
    }

    /// Texture description for an image paint
    fn paint_texture(&self, paint: &Paint) -> Result<Option<TextureInfo>> {
        paint.image.map(|id| self.textures.info(id)).transpose()
    }

    /// Copy path geometry into the frame after reserving `total` vertices.
    /// Fill vertices are skipped unless `with_fill` is set.
    fn push_paths(
        &mut self,
        paths: &[Path<'_>],
        total: usize,
        with_fill: bool,
    ) -> Result<(usize, usize)> {
        let path_offset = self.frame.alloc_paths(paths.len())?;
        self.frame.reserve_vertices(total)?;

        for (index, path) in paths.iter().enumerate() {
            let mut range = PathRange::default();
            if with_fill && !path.fill.is_empty() {
                range.fill_offset = self.frame.push_vertices(path.fill);
                range.fill_count = path.fill.len();
            }
            if !path.stroke.is_empty() {
                range.stroke_offset = self.frame.push_vertices(path.stroke);
                range.stroke_count = path.stroke.len();
            }
            self.frame.paths[path_offset + index] = range;
        }
        Ok((path_offset, paths.len()))
    }

    /// Create a texture, optionally filled with tightly packed `pixels`
    pub fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        flags: ImageFlags,
        pixels: Option<&[u8]>,
    ) -> Result<ImageId> {
        self.textures.create(
            &self.device,
            &self.memory_properties,
            kind,
            width,
            height,
            flags,
            pixels,
        )
    }

    /// Overwrite a `width` x `height` region at `(x, y)` with tightly packed
    /// `pixels`
    pub fn update_texture(
        &mut self,
        id: ImageId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        self.textures
            .update(&self.device, id, x, y, width, height, pixels)
    }

    /// Destroy a texture. Returns `false` for a stale handle.
    pub fn delete_texture(&mut self, id: ImageId) -> bool {
        self.textures.delete(&self.device, id)
    }

    pub fn texture_size(&self, id: ImageId) -> Result<(u32, u32)> {
        self.textures.size(id)
    }
}

fn layout_binding(
    binding: u32,
    ty: vk::DescriptorType,
    stages: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(ty)
        .descriptor_count(1)
        .stage_flags(stages)
}

impl<D: GpuDevice> Drop for VkRenderer<D> {
    fn drop(&mut self) {
        let device = &self.device;
        self.textures.destroy_all(device);
        self.placeholder.destroy(device);
        for buffer in [
            self.vertex_buffer.take(),
            self.view_buffer.take(),
            self.frag_buffer.take(),
        ]
        .into_iter()
        .flatten()
        {
            buffer.destroy(device);
        }
        self.pipelines.destroy_all(device);
        if let Some(pool) = self.descriptor_pool.take() {
            device.destroy_descriptor_pool(pool.pool);
        }
        if self.pipeline_layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(self.pipeline_layout);
        }
        if self.set_layout != vk::DescriptorSetLayout::null() {
            device.destroy_descriptor_set_layout(self.set_layout);
        }
        if self.shader != vk::ShaderModule::null() {
            device.destroy_shader_module(self.shader);
        }
        debug!("Vulkan renderer destroyed");
    }
}
