//! Blend factors and composite operations
//!
//! Blend factors are single-bit flags so that a factor set can be checked for
//! validity by the backend. A value with zero or several bits set is not a
//! valid factor and backends substitute premultiplied source-over for it.

use bitflags::bitflags;

bitflags! {
    /// Source or destination blend factor
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BlendFactor: u32 {
        const ZERO = 1 << 0;
        const ONE = 1 << 1;
        const SRC_COLOR = 1 << 2;
        const ONE_MINUS_SRC_COLOR = 1 << 3;
        const DST_COLOR = 1 << 4;
        const ONE_MINUS_DST_COLOR = 1 << 5;
        const SRC_ALPHA = 1 << 6;
        const ONE_MINUS_SRC_ALPHA = 1 << 7;
        const DST_ALPHA = 1 << 8;
        const ONE_MINUS_DST_ALPHA = 1 << 9;
        const SRC_ALPHA_SATURATE = 1 << 10;
    }
}

/// Porter-Duff composite operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositeOperation {
    #[default]
    SourceOver,
    SourceIn,
    SourceOut,
    Atop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
}

impl CompositeOperation {
    /// Source and destination factors for premultiplied colors
    pub fn factors(self) -> (BlendFactor, BlendFactor) {
        use BlendFactor as F;
        match self {
            CompositeOperation::SourceOver => (F::ONE, F::ONE_MINUS_SRC_ALPHA),
            CompositeOperation::SourceIn => (F::DST_ALPHA, F::ZERO),
            CompositeOperation::SourceOut => (F::ONE_MINUS_DST_ALPHA, F::ZERO),
            CompositeOperation::Atop => (F::DST_ALPHA, F::ONE_MINUS_SRC_ALPHA),
            CompositeOperation::DestinationOver => (F::ONE_MINUS_DST_ALPHA, F::ONE),
            CompositeOperation::DestinationIn => (F::ZERO, F::SRC_ALPHA),
            CompositeOperation::DestinationOut => (F::ZERO, F::ONE_MINUS_SRC_ALPHA),
            CompositeOperation::DestinationAtop => (F::ONE_MINUS_DST_ALPHA, F::SRC_ALPHA),
            CompositeOperation::Lighter => (F::ONE, F::ONE),
            CompositeOperation::Copy => (F::ONE, F::ZERO),
            CompositeOperation::Xor => (F::ONE_MINUS_DST_ALPHA, F::ONE_MINUS_SRC_ALPHA),
        }
    }
}

/// Blend state of a draw call: separate color and alpha factors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompositeOperationState {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl CompositeOperationState {
    /// Same factors for color and alpha
    pub fn blend(src: BlendFactor, dst: BlendFactor) -> Self {
        Self::blend_separate(src, dst, src, dst)
    }

    pub fn blend_separate(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }
}

impl From<CompositeOperation> for CompositeOperationState {
    fn from(op: CompositeOperation) -> Self {
        let (src, dst) = op.factors();
        Self::blend(src, dst)
    }
}

impl Default for CompositeOperationState {
    fn default() -> Self {
        CompositeOperation::SourceOver.into()
    }
}
