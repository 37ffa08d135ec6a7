//! Host-visible buffers and memory-type selection
//!
//! All renderer buffers live in `HOST_VISIBLE | HOST_COHERENT` memory and are
//! written by mapping. A buffer that is too small for the next upload is
//! destroyed and recreated; buffers never shrink.

use ash::vk;
use tracing::debug;

use crate::device::GpuDevice;
use crate::error::{RenderError, Result};

/// Smallest buffer the pool creates, so empty uploads never ask for size 0
pub const MIN_BUFFER_SIZE: u64 = 16;

/// Memory properties every renderer allocation requests
pub const HOST_MEMORY: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// First memory type allowed by `type_bits` whose flags contain `required`
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(index, ty)| {
            type_bits & (1 << index) != 0 && ty.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
        .ok_or_else(|| {
            RenderError::ResourceExhausted(format!(
                "no memory type in mask {type_bits:#b} with {required:?}"
            ))
        })
}

/// Allocate host-visible memory for `requirements`
pub fn allocate_host_memory<D: GpuDevice>(
    device: &D,
    properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
) -> Result<vk::DeviceMemory> {
    let type_index = find_memory_type(properties, requirements.memory_type_bits, HOST_MEMORY)?;
    device.allocate_memory(requirements.size, type_index)
}

/// A buffer and the memory bound to it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    /// Usable size in bytes
    pub size: u64,
}

impl GpuBuffer {
    /// Create a buffer of at least `data.len()` bytes holding `data`
    pub fn create<D: GpuDevice>(
        device: &D,
        properties: &vk::PhysicalDeviceMemoryProperties,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<Self> {
        let size = (data.len() as u64).max(MIN_BUFFER_SIZE);
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = device.create_buffer(&info)?;

        let requirements = device.buffer_memory_requirements(buffer);
        let memory = match allocate_host_memory(device, properties, requirements) {
            Ok(memory) => memory,
            Err(err) => {
                device.destroy_buffer(buffer);
                return Err(err);
            }
        };

        let created = Self {
            buffer,
            memory,
            size,
        };
        if let Err(err) = device
            .bind_buffer_memory(buffer, memory)
            .and_then(|()| created.write(device, data))
        {
            created.destroy(device);
            return Err(err);
        }

        debug!(size, ?usage, "Created host buffer");
        Ok(created)
    }

    /// Copy `data` to the start of the buffer
    pub fn write<D: GpuDevice>(&self, device: &D, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() as u64 > self.size {
            return Err(RenderError::ResourceExhausted(format!(
                "{} bytes do not fit a {} byte buffer",
                data.len(),
                self.size
            )));
        }
        device.map_memory_with(self.memory, 0, data.len() as u64, &mut |mapped| {
            mapped[..data.len()].copy_from_slice(data);
            Ok(())
        })
    }

    pub fn destroy<D: GpuDevice>(self, device: &D) {
        device.destroy_buffer(self.buffer);
        device.free_memory(self.memory);
    }
}

/// Write `data` into `slot`, recreating the buffer when it is missing or too
/// small.
pub fn upload<D: GpuDevice>(
    device: &D,
    properties: &vk::PhysicalDeviceMemoryProperties,
    slot: &mut Option<GpuBuffer>,
    usage: vk::BufferUsageFlags,
    data: &[u8],
) -> Result<GpuBuffer> {
    match *slot {
        Some(buffer) if buffer.size >= data.len() as u64 => {
            buffer.write(device, data)?;
            Ok(buffer)
        }
        existing => {
            if let Some(old) = existing {
                debug!(old = old.size, new = data.len(), "Growing host buffer");
                *slot = None;
                old.destroy(device);
            }
            let buffer = GpuBuffer::create(device, properties, usage, data)?;
            *slot = Some(buffer);
            Ok(buffer)
        }
    }
}
