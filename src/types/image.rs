//! Image descriptors and attachment configuration.

use bitflags::bitflags;

use super::{ClearValue, Extent3d};

/// Image format enumeration.
///
/// Only the formats the frame graph itself needs to reason about (color
/// targets, depth targets, common sampled formats). Backend layers are free
/// to map these onto their native format enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Format {
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl Format {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }
}

bitflags! {
    /// Usage flags for images.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsage: u32 {
        /// Image can be sampled in a shader.
        const SAMPLED = 1 << 0;
        /// Image can be read/written as a storage image.
        const STORAGE = 1 << 1;
        /// Image can be used as a color attachment.
        const COLOR_ATTACHMENT = 1 << 2;
        /// Image can be used as a depth/stencil attachment.
        const DEPTH_STENCIL = 1 << 3;
        /// Image can be the source of a transfer operation.
        const TRANSFER_SRC = 1 << 4;
        /// Image can be the destination of a transfer operation.
        const TRANSFER_DST = 1 << 5;
    }
}

/// Load operation for an attachment at the start of a rendering scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOp {
    /// Clear the attachment to its clear value.
    #[default]
    Clear,
    /// Preserve the existing contents.
    Load,
    /// Contents are undefined; cheapest when fully overwritten.
    DontCare,
}

/// Store operation for an attachment at the end of a rendering scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOp {
    /// Write results back to memory.
    #[default]
    Store,
    /// Discard results (useful for transient depth buffers).
    Discard,
}

/// Creation parameters for a graph-allocated image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageCreateInfo {
    /// Image dimensions.
    pub extent: Extent3d,
    /// Pixel format.
    pub format: Format,
    /// Accumulated usage flags.
    pub usage: ImageUsage,
    /// Mip level count.
    pub mip_levels: u32,
}

impl ImageCreateInfo {
    /// Create info for a 2D image with a single mip level.
    pub fn new_2d(width: u32, height: u32, format: Format) -> Self {
        Self {
            extent: Extent3d::new_2d(width, height),
            format,
            usage: ImageUsage::empty(),
            mip_levels: 1,
        }
    }

    /// Set the usage flags.
    pub fn with_usage(mut self, usage: ImageUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Configuration of a color or depth attachment declared on a pass.
///
/// Carries both the creation parameters the graph uses to allocate the
/// backing image and the load/store/clear behavior applied when the pass's
/// rendering scope begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentInfo {
    /// Image creation parameters (extent and format; usage is accumulated
    /// from declarations).
    pub create_info: ImageCreateInfo,
    /// Load operation at rendering begin.
    pub load_op: LoadOp,
    /// Store operation at rendering end.
    pub store_op: StoreOp,
    /// Clear value used when `load_op` is [`LoadOp::Clear`].
    pub clear_value: ClearValue,
}

impl AttachmentInfo {
    /// Cleared color attachment of the given size and format.
    pub fn color(width: u32, height: u32, format: Format) -> Self {
        Self {
            create_info: ImageCreateInfo::new_2d(width, height, format),
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_value: ClearValue::default(),
        }
    }

    /// Cleared depth attachment of the given size and format.
    pub fn depth(width: u32, height: u32, format: Format) -> Self {
        Self {
            create_info: ImageCreateInfo::new_2d(width, height, format),
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_value: ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            },
        }
    }

    /// Set the load operation.
    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Set the clear value.
    pub fn with_clear_value(mut self, clear_value: ClearValue) -> Self {
        self.clear_value = clear_value;
        self
    }
}
