//! Stipple Vulkan Backend
//!
//! Stencil-based vector path rendering on Vulkan through `ash`.
//!
//! # Features
//!
//! - **Fills**: stencil winding for arbitrary paths, a direct path for convex ones
//! - **Strokes**: optional stencil strokes so overlapping segments blend once
//! - **Anti-aliasing**: fringe strips with edge coverage in the fragment stage
//! - **Paints**: gradients and image patterns through one shader module
//! - **Textures**: RGBA and alpha images with per-axis repeat and sub-region updates
//! - **Compositing**: Porter-Duff presets and separate blend factors, one pipeline each
//!
//! The renderer records into a command buffer and render pass owned by the
//! host application. It never submits, waits or presents.

pub mod ash_device;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod growth;
pub mod memory;
pub mod pipeline;
pub mod renderer;
pub mod shaders;
pub mod texture;
pub mod uniforms;

#[cfg(test)]
mod mock;

pub use ash_device::AshDevice;
pub use device::{DescriptorWrite, GpuDevice, PipelineDesc};
pub use error::{RenderError, Result};
pub use frame::{CallKind, FrameData};
pub use pipeline::{PipelineKey, Topology};
pub use renderer::{CreateFlags, CreateInfo, FrameState, FrameStats, VkRenderer};
pub use shaders::PATH_SHADER;
pub use texture::TextureInfo;
pub use uniforms::{FragUniforms, ViewUniforms};

pub use stipple_core;
