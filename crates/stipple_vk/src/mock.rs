//! Recording `GpuDevice` for tests
//!
//! Hands out fake handles, keeps device memory in host vectors and records
//! every command so tests can replay the stream. Clones share state.

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk::{self, Handle};
use rustc_hash::FxHashMap;

use crate::device::{DescriptorWrite, GpuDevice, PipelineDesc};
use crate::error::{RenderError, Result};
use crate::pipeline::PipelineKey;

/// Row pitch alignment reported for linear images
const ROW_PITCH_ALIGNMENT: u64 = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetViewport { width: f32, height: f32 },
    SetScissor { width: u32, height: u32 },
    BindPipeline(vk::Pipeline),
    BindDescriptorSet(vk::DescriptorSet),
    BindVertexBuffer { buffer: vk::Buffer, offset: u64 },
    Draw { vertex_count: u32 },
}

/// A draw with the state bound when it was recorded
#[derive(Clone, Copy, Debug)]
pub struct DrawRecord {
    pub key: PipelineKey,
    pub vertex_count: u32,
    pub vertex_offset: u64,
    pub descriptor: DescriptorWrite,
}

#[derive(Default)]
struct State {
    next_handle: u64,
    live: FxHashMap<u64, &'static str>,
    buffer_sizes: FxHashMap<u64, u64>,
    image_rows: FxHashMap<u64, (u64, u32)>,
    memory: FxHashMap<u64, Vec<u8>>,
    pipelines: FxHashMap<u64, PipelineDesc>,
    pipeline_creations: usize,
    descriptor_writes: FxHashMap<u64, DescriptorWrite>,
    pool_creations: Vec<u32>,
    pool_resets: usize,
    commands: Vec<(vk::CommandBuffer, Command)>,
    fail_allocations: bool,
}

impl State {
    fn create(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle, kind);
        self.next_handle
    }

    fn destroy(&mut self, raw: u64, kind: &'static str) {
        let removed = self.live.remove(&raw);
        assert_eq!(removed, Some(kind), "destroying unknown {kind} {raw:#x}");
    }
}

#[derive(Clone, Default)]
pub struct RecordingDevice {
    state: Rc<RefCell<State>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every memory allocation fail with `ERROR_OUT_OF_DEVICE_MEMORY`
    pub fn fail_allocations(&self, fail: bool) {
        self.state.borrow_mut().fail_allocations = fail;
    }

    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn live_of_kind(&self, kind: &str) -> usize {
        self.state
            .borrow()
            .live
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn pipeline_creations(&self) -> usize {
        self.state.borrow().pipeline_creations
    }

    pub fn pool_creations(&self) -> Vec<u32> {
        self.state.borrow().pool_creations.clone()
    }

    pub fn pool_resets(&self) -> usize {
        self.state.borrow().pool_resets
    }

    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state.borrow().memory[&memory.as_raw()].clone()
    }

    pub fn row_pitch(&self, image: vk::Image) -> usize {
        self.state.borrow().image_rows[&image.as_raw()].0 as usize
    }

    pub fn buffer_size(&self, buffer: vk::Buffer) -> u64 {
        self.state.borrow().buffer_sizes[&buffer.as_raw()]
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state
            .borrow()
            .commands
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn commands_for(&self, cmd: vk::CommandBuffer) -> Vec<Command> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|(c, _)| *c == cmd)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Replay the command stream into draws with their bound state
    pub fn draws(&self) -> Vec<DrawRecord> {
        let state = self.state.borrow();
        let mut pipeline = None;
        let mut set = None;
        let mut offset = 0;
        let mut draws = Vec::new();
        for (_, command) in &state.commands {
            match command {
                Command::BindPipeline(p) => pipeline = Some(*p),
                Command::BindDescriptorSet(s) => set = Some(*s),
                Command::BindVertexBuffer { offset: o, .. } => offset = *o,
                Command::Draw { vertex_count } => {
                    let p = pipeline.expect("draw without pipeline");
                    let s = set.expect("draw without descriptor set");
                    draws.push(DrawRecord {
                        key: state.pipelines[&p.as_raw()].key,
                        vertex_count: *vertex_count,
                        vertex_offset: offset,
                        descriptor: state.descriptor_writes[&s.as_raw()],
                    });
                }
                _ => {}
            }
        }
        draws
    }

    fn record(&self, cmd: vk::CommandBuffer, command: Command) {
        self.state.borrow_mut().commands.push((cmd, command));
    }
}

/// Two memory types: device-local first, then host-visible coherent
pub fn memory_properties() -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 2,
        memory_heap_count: 2,
        ..Default::default()
    };
    props.memory_types[0] = vk::MemoryType {
        property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        heap_index: 0,
    };
    props.memory_types[1] = vk::MemoryType {
        property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT,
        heap_index: 1,
    };
    props
}

pub fn limits() -> vk::PhysicalDeviceLimits {
    vk::PhysicalDeviceLimits {
        min_uniform_buffer_offset_alignment: 256,
        ..Default::default()
    }
}

impl GpuDevice for RecordingDevice {
    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> Result<vk::Buffer> {
        let mut state = self.state.borrow_mut();
        let raw = state.create("buffer");
        state.buffer_sizes.insert(raw, info.size);
        Ok(vk::Buffer::from_raw(raw))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut state = self.state.borrow_mut();
        state.buffer_sizes.remove(&buffer.as_raw());
        state.destroy(buffer.as_raw(), "buffer");
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: self.buffer_size(buffer),
            alignment: 16,
            memory_type_bits: 0b11,
        }
    }

    fn bind_buffer_memory(&self, _buffer: vk::Buffer, _memory: vk::DeviceMemory) -> Result<()> {
        Ok(())
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image> {
        let bpp = if info.format == vk::Format::R8_UNORM { 1 } else { 4 };
        let row = info.extent.width as u64 * bpp;
        let pitch = row.div_ceil(ROW_PITCH_ALIGNMENT) * ROW_PITCH_ALIGNMENT;
        let mut state = self.state.borrow_mut();
        let raw = state.create("image");
        state.image_rows.insert(raw, (pitch, info.extent.height));
        Ok(vk::Image::from_raw(raw))
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut state = self.state.borrow_mut();
        state.image_rows.remove(&image.as_raw());
        state.destroy(image.as_raw(), "image");
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let (pitch, height) = self.state.borrow().image_rows[&image.as_raw()];
        vk::MemoryRequirements {
            size: pitch * height as u64,
            alignment: 64,
            memory_type_bits: 0b11,
        }
    }

    fn bind_image_memory(&self, _image: vk::Image, _memory: vk::DeviceMemory) -> Result<()> {
        Ok(())
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        _subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        let (pitch, height) = self.state.borrow().image_rows[&image.as_raw()];
        vk::SubresourceLayout {
            offset: 0,
            size: pitch * height as u64,
            row_pitch: pitch,
            array_pitch: 0,
            depth_pitch: 0,
        }
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView> {
        Ok(vk::ImageView::from_raw(self.state.borrow_mut().create("view")))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state.borrow_mut().destroy(view.as_raw(), "view");
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler> {
        Ok(vk::Sampler::from_raw(self.state.borrow_mut().create("sampler")))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.state.borrow_mut().destroy(sampler.as_raw(), "sampler");
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<vk::DeviceMemory> {
        let mut state = self.state.borrow_mut();
        if state.fail_allocations {
            return Err(RenderError::Device(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        assert_eq!(memory_type_index, 1, "renderer memory must be host visible");
        let raw = state.create("memory");
        state.memory.insert(raw, vec![0; size as usize]);
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state.borrow_mut();
        state.memory.remove(&memory.as_raw());
        state.destroy(memory.as_raw(), "memory");
    }

    fn map_memory_with(
        &self,
        memory: vk::DeviceMemory,
        offset: u64,
        size: u64,
        write: &mut dyn FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let bytes = state
            .memory
            .get_mut(&memory.as_raw())
            .ok_or(RenderError::Device(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        let range = offset as usize..(offset + size) as usize;
        write(&mut bytes[range])
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        assert_eq!(code.first(), Some(&0x0723_0203));
        Ok(vk::ShaderModule::from_raw(self.state.borrow_mut().create("shader")))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.state.borrow_mut().destroy(module.as_raw(), "shader");
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout> {
        assert_eq!(bindings.len(), 4);
        Ok(vk::DescriptorSetLayout::from_raw(
            self.state.borrow_mut().create("set_layout"),
        ))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state.borrow_mut().destroy(layout.as_raw(), "set_layout");
    }

    fn create_pipeline_layout(
        &self,
        _set_layout: vk::DescriptorSetLayout,
    ) -> Result<vk::PipelineLayout> {
        Ok(vk::PipelineLayout::from_raw(
            self.state.borrow_mut().create("pipeline_layout"),
        ))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state
            .borrow_mut()
            .destroy(layout.as_raw(), "pipeline_layout");
    }

    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> Result<vk::Pipeline> {
        let mut state = self.state.borrow_mut();
        let raw = state.create("pipeline");
        state.pipelines.insert(raw, *desc);
        state.pipeline_creations += 1;
        Ok(vk::Pipeline::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state.borrow_mut().destroy(pipeline.as_raw(), "pipeline");
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool> {
        let mut state = self.state.borrow_mut();
        state.pool_creations.push(max_sets);
        Ok(vk::DescriptorPool::from_raw(state.create("pool")))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state.borrow_mut().destroy(pool.as_raw(), "pool");
    }

    fn reset_descriptor_pool(&self, _pool: vk::DescriptorPool) -> Result<()> {
        self.state.borrow_mut().pool_resets += 1;
        Ok(())
    }

    fn allocate_descriptor_set(
        &self,
        _pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet> {
        // sets are owned by their pool, not tracked as live objects
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        Ok(vk::DescriptorSet::from_raw(state.next_handle))
    }

    fn write_descriptor_set(&self, write: &DescriptorWrite) {
        self.state
            .borrow_mut()
            .descriptor_writes
            .insert(write.set.as_raw(), *write);
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        self.record(
            cmd,
            Command::SetViewport {
                width: viewport.width,
                height: viewport.height,
            },
        );
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.record(
            cmd,
            Command::SetScissor {
                width: scissor.extent.width,
                height: scissor.extent.height,
            },
        );
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(cmd, Command::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.record(cmd, Command::BindDescriptorSet(set));
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        self.record(cmd, Command::BindVertexBuffer { buffer, offset });
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32) {
        self.record(cmd, Command::Draw { vertex_count });
    }
}
