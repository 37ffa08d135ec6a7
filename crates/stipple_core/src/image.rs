//! Image handles and flags

use bitflags::bitflags;
use slotmap::new_key_type;

new_key_type! {
    /// Generation-checked handle to a backend texture
    ///
    /// A deleted handle never aliases a texture created later in the same slot.
    pub struct ImageId;
}

/// Texel format class of a texture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Four 8-bit channels
    #[default]
    Rgba,
    /// One 8-bit coverage channel
    Alpha,
}

impl TextureKind {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureKind::Rgba => 4,
            TextureKind::Alpha => 1,
        }
    }
}

bitflags! {
    /// Sampling and interpretation flags for an image
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ImageFlags: u32 {
        /// Accepted for compatibility; mip chains are not generated
        const GENERATE_MIPMAPS = 1 << 0;
        const REPEAT_X = 1 << 1;
        const REPEAT_Y = 1 << 2;
        /// Image rows are stored bottom-up
        const FLIP_Y = 1 << 3;
        /// Color channels are already multiplied by alpha
        const PREMULTIPLIED = 1 << 4;
        const NEAREST = 1 << 5;
    }
}
