//! Shared geometric and queue types.

/// 2D extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2d {
    /// Create a new 2D extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 3D extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth (or array layer count for 2D textures).
    pub depth: u32,
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
        }
    }
}

impl Extent3d {
    /// Create a new 3D extent.
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Create a 2D extent with depth 1.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }
}

impl From<Extent2d> for Extent3d {
    fn from(extent: Extent2d) -> Self {
        Self::new_2d(extent.width, extent.height)
    }
}

/// Clear value for an attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color as RGBA floats.
    Color([f32; 4]),
    /// Clear depth and stencil values.
    DepthStencil {
        /// Depth clear value, typically 0.0 or 1.0.
        depth: f32,
        /// Stencil clear value.
        stencil: u32,
    },
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::Color([0.0, 0.0, 0.0, 1.0])
    }
}

/// The GPU queue family a pass is recorded against.
///
/// Every pass declares its queue type at creation. The declaration model and
/// command-buffer acquisition are queue-aware, but submission currently goes
/// to the graphics queue only; see the module docs of
/// [`graph`](crate::graph) for the multi-queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    /// Graphics queue (rasterization, also accepts compute and transfer).
    #[default]
    Graphics,
    /// Async compute queue.
    Compute,
    /// Dedicated transfer queue.
    Transfer,
}

impl QueueType {
    /// Lowercase label, used in logs and graph exports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        }
    }
}
