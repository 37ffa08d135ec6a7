//! Device abstraction
//!
//! Defines the `GpuDevice` trait: every Vulkan entry point the renderer
//! touches, expressed with plain Rust arguments. [`AshDevice`] implements it
//! on a real `ash::Device`; tests implement it with a recording mock.
//!
//! [`AshDevice`]: crate::ash_device::AshDevice

use std::ffi::CStr;

use ash::vk;

use crate::error::Result;
use crate::pipeline::PipelineKey;

/// Everything needed to build one graphics pipeline permutation.
///
/// Vertex layout, viewport/scissor dynamic state and the vertex entry point
/// are fixed; everything that varies between permutations lives here.
#[derive(Clone, Copy, Debug)]
pub struct PipelineDesc {
    /// Key this pipeline was compiled for
    pub key: PipelineKey,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub module: vk::ShaderModule,
    pub fragment_entry: &'static CStr,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub blend: vk::PipelineColorBlendAttachmentState,
    /// Front and back stencil state, `None` disables the stencil test
    pub stencil: Option<(vk::StencilOpState, vk::StencilOpState)>,
}

/// Contents of one descriptor set: view UBO, fragment UBO block, texture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub set: vk::DescriptorSet,
    pub view_buffer: vk::Buffer,
    pub view_range: u64,
    pub frag_buffer: vk::Buffer,
    pub frag_offset: u64,
    pub frag_range: u64,
    pub image_view: vk::ImageView,
    pub sampler: vk::Sampler,
}

/// Vulkan device operations used by the renderer.
///
/// Creation methods return [`RenderError::Device`] on a failing
/// `vk::Result`; destroy methods accept handles created by the same device.
///
/// [`RenderError::Device`]: crate::error::RenderError::Device
pub trait GpuDevice {
    // Buffers

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> Result<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> Result<()>;

    // Images

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image>;
    fn destroy_image(&self, image: vk::Image);
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()>;
    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout;
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);
    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    // Memory

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<vk::DeviceMemory>;
    fn free_memory(&self, memory: vk::DeviceMemory);

    /// Map `size` bytes of `memory` at `offset`, run `write` on them, unmap.
    fn map_memory_with(
        &self,
        memory: vk::DeviceMemory,
        offset: u64,
        size: u64,
        write: &mut dyn FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<()>;

    // Shaders and layouts

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_pipeline_layout(
        &self,
        set_layout: vk::DescriptorSetLayout,
    ) -> Result<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> Result<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // Descriptors

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()>;
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet>;
    fn write_descriptor_set(&self, write: &DescriptorWrite);

    // Command recording

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport);
    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D);
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );
    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64);
    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32);
}
