//! Renderer error types

use ash::vk;
use thiserror::Error;

/// Vulkan backend errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No compatible memory type, or a host allocation failed
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A Vulkan entry point returned a failure status
    #[error("Vulkan call failed: {0}")]
    Device(#[from] vk::Result),

    /// Unknown or deleted texture handle
    #[error("Invalid texture handle")]
    InvalidHandle,

    /// Texture requested with a zero-sized dimension
    #[error("Invalid texture dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Texel region outside the texture, or pixel data too short
    #[error("Invalid texture region: {0}")]
    InvalidRegion(String),

    /// WGSL parse, validation or SPIR-V emission failure
    #[error("Shader compilation error: {0}")]
    Shader(String),
}

impl From<std::collections::TryReserveError> for RenderError {
    fn from(err: std::collections::TryReserveError) -> Self {
        RenderError::ResourceExhausted(err.to_string())
    }
}

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, RenderError>;
