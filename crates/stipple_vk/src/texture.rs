//! Texture management
//!
//! Textures are linear-tiled images in host-visible memory, written directly
//! through a mapping. Uploads copy row by row at the pitch the driver reports
//! for the image, which may be wider than the texel row itself.
//!
//! Handles are slotmap keys: a freed slot is reused by the next texture, and
//! the old handle stops resolving as soon as the texture is deleted.

use ash::vk;
use slotmap::SlotMap;
use stipple_core::{ImageFlags, ImageId, TextureKind};
use tracing::debug;

use crate::device::GpuDevice;
use crate::error::{RenderError, Result};
use crate::growth::{grown_capacity, TEXTURE_FLOOR};
use crate::memory::allocate_host_memory;

/// What paint conversion needs to know about a texture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub kind: TextureKind,
    pub flags: ImageFlags,
}

/// A sampled image and everything it owns
#[derive(Clone, Copy, Debug)]
pub struct Texture {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub info: TextureInfo,
}

impl Texture {
    fn empty(info: TextureInfo) -> Self {
        Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            info,
        }
    }

    /// Create a standalone texture, optionally filled with tightly packed
    /// `pixels`. Nothing is left behind on failure.
    pub fn create<D: GpuDevice>(
        device: &D,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        info: TextureInfo,
        pixels: Option<&[u8]>,
    ) -> Result<Self> {
        let TextureInfo {
            width,
            height,
            kind,
            ..
        } = info;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if let Some(pixels) = pixels {
            check_pixel_len(kind, width, height, pixels)?;
        }

        let mut texture = Texture::empty(info);
        let filled = build_texture(device, memory_properties, &mut texture).and_then(|()| {
            match pixels {
                Some(pixels) => write_region(device, &texture, 0, 0, width, height, pixels),
                None => Ok(()),
            }
        });
        if let Err(err) = filled {
            texture.destroy(device);
            return Err(err);
        }
        Ok(texture)
    }

    /// Release whichever handles were created
    pub fn destroy<D: GpuDevice>(&self, device: &D) {
        if self.view != vk::ImageView::null() {
            device.destroy_image_view(self.view);
        }
        if self.sampler != vk::Sampler::null() {
            device.destroy_sampler(self.sampler);
        }
        if self.image != vk::Image::null() {
            device.destroy_image(self.image);
        }
        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory);
        }
    }
}

fn texture_format(kind: TextureKind) -> vk::Format {
    match kind {
        TextureKind::Rgba => vk::Format::R8G8B8A8_UNORM,
        TextureKind::Alpha => vk::Format::R8_UNORM,
    }
}

fn color_subresource() -> vk::ImageSubresource {
    vk::ImageSubresource {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        array_layer: 0,
    }
}

/// Sampler settings for an image's flags
pub fn sampler_info(flags: ImageFlags) -> vk::SamplerCreateInfo<'static> {
    let filter = if flags.contains(ImageFlags::NEAREST) {
        vk::Filter::NEAREST
    } else {
        vk::Filter::LINEAR
    };
    let address = |repeat: bool| {
        if repeat {
            vk::SamplerAddressMode::MIRRORED_REPEAT
        } else {
            vk::SamplerAddressMode::CLAMP_TO_EDGE
        }
    };

    vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(address(flags.contains(ImageFlags::REPEAT_X)))
        .address_mode_v(address(flags.contains(ImageFlags::REPEAT_Y)))
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .max_anisotropy(1.0)
        .compare_op(vk::CompareOp::NEVER)
        .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
}

/// Owner of every texture created through the renderer
#[derive(Debug, Default)]
pub struct TextureManager {
    textures: SlotMap<ImageId, Texture>,
}

impl TextureManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn get(&self, id: ImageId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub fn info(&self, id: ImageId) -> Result<TextureInfo> {
        self.textures
            .get(id)
            .map(|t| t.info)
            .ok_or(RenderError::InvalidHandle)
    }

    /// Width and height of a live texture
    pub fn size(&self, id: ImageId) -> Result<(u32, u32)> {
        self.info(id).map(|info| (info.width, info.height))
    }

    /// Create a texture, optionally filled with tightly packed `pixels`
    #[allow(clippy::too_many_arguments)]
    pub fn create<D: GpuDevice>(
        &mut self,
        device: &D,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        kind: TextureKind,
        width: u32,
        height: u32,
        flags: ImageFlags,
        pixels: Option<&[u8]>,
    ) -> Result<ImageId> {
        let info = TextureInfo {
            width,
            height,
            kind,
            flags,
        };
        let texture = Texture::create(device, memory_properties, info, pixels)?;

        self.reserve_slot();
        let id = self.textures.insert(texture);
        debug!(?id, width, height, ?kind, ?flags, "Created texture");
        Ok(id)
    }

    /// Overwrite the `w` x `h` region at `(x, y)` with tightly packed `pixels`
    #[allow(clippy::too_many_arguments)]
    pub fn update<D: GpuDevice>(
        &self,
        device: &D,
        id: ImageId,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        pixels: &[u8],
    ) -> Result<()> {
        let texture = self.textures.get(id).ok_or(RenderError::InvalidHandle)?;
        let info = texture.info;
        let fits = x.checked_add(w).is_some_and(|right| right <= info.width)
            && y.checked_add(h).is_some_and(|bottom| bottom <= info.height);
        if !fits {
            return Err(RenderError::InvalidRegion(format!(
                "{w}x{h} at ({x}, {y}) outside {}x{} texture",
                info.width, info.height
            )));
        }
        check_pixel_len(info.kind, w, h, pixels)?;
        if w == 0 || h == 0 {
            return Ok(());
        }
        write_region(device, texture, x, y, w, h, pixels)
    }

    /// Destroy a texture. Returns `false` if the handle was not live.
    pub fn delete<D: GpuDevice>(&mut self, device: &D, id: ImageId) -> bool {
        match self.textures.remove(id) {
            Some(texture) => {
                texture.destroy(device);
                debug!(?id, "Deleted texture");
                true
            }
            None => false,
        }
    }

    pub fn destroy_all<D: GpuDevice>(&mut self, device: &D) {
        for (_, texture) in self.textures.drain() {
            texture.destroy(device);
        }
    }

    fn reserve_slot(&mut self) {
        let len = self.textures.len();
        if len < self.textures.capacity() {
            return;
        }
        let target = grown_capacity(self.textures.capacity(), len + 1, TEXTURE_FLOOR);
        self.textures.reserve(target - len);
    }
}

fn check_pixel_len(kind: TextureKind, w: u32, h: u32, pixels: &[u8]) -> Result<()> {
    let needed = w as usize * h as usize * kind.bytes_per_pixel();
    if pixels.len() < needed {
        return Err(RenderError::InvalidRegion(format!(
            "{} bytes given, {needed} needed for {w}x{h}",
            pixels.len()
        )));
    }
    Ok(())
}

/// Create image, memory, sampler and view into `texture`, stopping at the
/// first failure. Handles created so far stay in `texture` for cleanup.
fn build_texture<D: GpuDevice>(
    device: &D,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    texture: &mut Texture,
) -> Result<()> {
    let info = texture.info;
    let format = texture_format(info.kind);

    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: info.width,
            height: info.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::LINEAR)
        .usage(vk::ImageUsageFlags::SAMPLED)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::PREINITIALIZED);
    texture.image = device.create_image(&image_info)?;

    let requirements = device.image_memory_requirements(texture.image);
    texture.memory = allocate_host_memory(device, memory_properties, requirements)?;
    device.bind_image_memory(texture.image, texture.memory)?;

    texture.sampler = device.create_sampler(&sampler_info(info.flags))?;

    let view_info = vk::ImageViewCreateInfo::default()
        .image(texture.image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    texture.view = device.create_image_view(&view_info)?;
    Ok(())
}

fn write_region<D: GpuDevice>(
    device: &D,
    texture: &Texture,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    pixels: &[u8],
) -> Result<()> {
    let layout = device.image_subresource_layout(texture.image, color_subresource());
    let bpp = texture.info.kind.bytes_per_pixel();
    let row_bytes = w as usize * bpp;
    let pitch = layout.row_pitch as usize;

    device.map_memory_with(texture.memory, layout.offset, layout.size, &mut |mapped| {
        for (row, src) in pixels.chunks_exact(row_bytes).take(h as usize).enumerate() {
            let start = (y as usize + row) * pitch + x as usize * bpp;
            let dst = mapped.get_mut(start..start + row_bytes).ok_or_else(|| {
                RenderError::InvalidRegion(format!("row {row} past the mapped image"))
            })?;
            dst.copy_from_slice(src);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{memory_properties, RecordingDevice};

    fn manager() -> (RecordingDevice, TextureManager) {
        (RecordingDevice::new(), TextureManager::new())
    }

    #[test]
    fn test_update_respects_row_pitch() {
        let (device, mut textures) = manager();
        let white = [255u8; 4 * 4 * 4];
        let id = textures
            .create(
                &device,
                &memory_properties(),
                TextureKind::Rgba,
                4,
                4,
                ImageFlags::empty(),
                Some(&white),
            )
            .unwrap();

        textures.update(&device, id, 1, 1, 2, 2, &[0u8; 2 * 2 * 4]).unwrap();
        assert_eq!(textures.size(id).unwrap(), (4, 4));

        let texture = *textures.get(id).unwrap();
        let pitch = device.row_pitch(texture.image);
        assert!(pitch > 16);
        let memory = device.memory_contents(texture.memory);
        for y in 0..4 {
            for x in 0..4 {
                let start = y * pitch + x * 4;
                let texel = &memory[start..start + 4];
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if inside { [0u8; 4] } else { [255u8; 4] };
                assert_eq!(texel, expected, "texel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_deleted_handle_is_invalid() {
        let (device, mut textures) = manager();
        let props = memory_properties();
        let id = textures
            .create(&device, &props, TextureKind::Alpha, 2, 2, ImageFlags::empty(), None)
            .unwrap();

        assert!(textures.delete(&device, id));
        assert!(!textures.delete(&device, id));
        assert_eq!(textures.size(id), Err(RenderError::InvalidHandle));
        assert_eq!(
            textures.update(&device, id, 0, 0, 1, 1, &[0]),
            Err(RenderError::InvalidHandle)
        );
        assert_eq!(device.live_objects(), 0);

        // the slot is reused with fresh contents, the old handle stays dead
        let reused = textures
            .create(&device, &props, TextureKind::Rgba, 8, 4, ImageFlags::NEAREST, None)
            .unwrap();
        assert_ne!(reused, id);
        assert_eq!(textures.size(reused).unwrap(), (8, 4));
        let info = textures.info(reused).unwrap();
        assert_eq!(info.kind, TextureKind::Rgba);
        assert_eq!(info.flags, ImageFlags::NEAREST);
        assert_eq!(textures.size(id), Err(RenderError::InvalidHandle));
    }

    #[test]
    fn test_rejects_bad_requests() {
        let (device, mut textures) = manager();
        let props = memory_properties();
        assert_eq!(
            textures.create(&device, &props, TextureKind::Rgba, 0, 4, ImageFlags::empty(), None),
            Err(RenderError::InvalidDimensions { width: 0, height: 4 })
        );
        assert!(matches!(
            textures.create(
                &device,
                &props,
                TextureKind::Rgba,
                2,
                2,
                ImageFlags::empty(),
                Some(&[0u8; 15])
            ),
            Err(RenderError::InvalidRegion(_))
        ));

        let id = textures
            .create(&device, &props, TextureKind::Alpha, 4, 4, ImageFlags::empty(), None)
            .unwrap();
        assert!(matches!(
            textures.update(&device, id, 3, 0, 2, 1, &[0u8; 2]),
            Err(RenderError::InvalidRegion(_))
        ));
        assert!(matches!(
            textures.update(&device, id, 0, 0, 2, 2, &[0u8; 3]),
            Err(RenderError::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_failed_create_releases_partial_objects() {
        let (device, mut textures) = manager();
        device.fail_allocations(true);
        let result = textures.create(
            &device,
            &memory_properties(),
            TextureKind::Rgba,
            4,
            4,
            ImageFlags::empty(),
            None,
        );
        assert!(matches!(result, Err(RenderError::Device(_))));
        assert_eq!(device.live_objects(), 0);
        assert!(textures.is_empty());
    }

    #[test]
    fn test_sampler_addressing_per_axis() {
        let info = sampler_info(ImageFlags::REPEAT_X | ImageFlags::NEAREST);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::MIRRORED_REPEAT);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);

        let info = sampler_info(ImageFlags::REPEAT_Y);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::MIRRORED_REPEAT);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
    }
}
