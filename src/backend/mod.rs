//! Graphics device abstraction.
//!
//! The frame graph consumes the graphics API exclusively through the traits
//! in this module: [`Device`] for resource creation, [`Queue`] for
//! submission and presentation, [`Swapchain`] for the presentable surface
//! and [`CommandBufferAllocator`] for per-queue command buffers. Resources
//! are referenced through opaque handles; the graph never touches native API
//! objects.
//!
//! [`DummyDevice`] provides a complete no-GPU implementation used by tests
//! and by development on machines without graphics hardware.

mod command;
pub mod dummy;
mod sync;

pub use command::{
    BufferBarrier, Command, CommandBuffer, CommandBufferId, ImageBarrier, RenderingAttachment,
    RenderingInfo,
};
pub use dummy::{DummyDevice, DummySwapchain};
pub use sync::{Fence, FenceStatus, Semaphore};

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::GraphicsError;
use crate::types::{BufferCreateInfo, Extent2d, ImageCreateInfo, QueueType};

/// Handle to a device image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(crate) u64);

/// Handle to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

macro_rules! impl_raw_handle {
    ($name:ident) => {
        impl $name {
            /// Wrap a raw handle value issued by a device implementation.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw handle value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

impl_raw_handle!(ImageHandle);
impl_raw_handle!(BufferHandle);
impl_raw_handle!(ShaderHandle);

/// One queue submission produced by a built graph.
#[derive(Debug, Clone, Default)]
pub struct SubmitInfo {
    /// Command buffers to execute, in order.
    pub command_buffers: SmallVec<[CommandBufferId; 4]>,
    /// Semaphores to wait on before execution.
    pub wait_semaphores: Vec<Semaphore>,
    /// Semaphores to signal after execution.
    pub signal_semaphores: Vec<Semaphore>,
}

/// Graphics device contract.
///
/// Implementations create and destroy resources addressed by opaque handles
/// and hand out queues, fences and command buffers. All methods take
/// `&self`; implementations are internally synchronized.
pub trait Device: Send + Sync {
    /// Create an image resource.
    fn create_image(
        &self,
        info: &ImageCreateInfo,
        debug_name: &str,
    ) -> Result<ImageHandle, GraphicsError>;

    /// Create a buffer resource.
    fn create_buffer(
        &self,
        info: &BufferCreateInfo,
        debug_name: &str,
    ) -> Result<BufferHandle, GraphicsError>;

    /// Destroy an image created by this device.
    fn destroy_image(&self, image: ImageHandle);

    /// Destroy a buffer created by this device.
    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Acquire a fence, optionally pre-signaled.
    fn acquire_fence(&self, signaled: bool) -> Fence;

    /// Return a fence to the device.
    fn release_fence(&self, fence: Fence);

    /// Get the queue of the given type.
    fn queue(&self, queue_type: QueueType) -> Arc<dyn Queue>;

    /// Get the device's command buffer allocator.
    fn command_allocator(&self) -> &dyn CommandBufferAllocator;
}

/// Submission queue contract.
pub trait Queue: Send + Sync {
    /// Submit recorded work. The fence is signaled when the work retires.
    fn submit(&self, submits: &[SubmitInfo], fence: &Fence) -> Result<(), GraphicsError>;

    /// Present an image to the surface this queue presents to.
    fn present(&self, wait_semaphores: &[Semaphore], image: ImageHandle)
        -> Result<(), GraphicsError>;
}

/// Presentable surface contract.
pub trait Swapchain: Send + Sync {
    /// Current surface extent.
    fn extent(&self) -> Extent2d;

    /// Present the given image.
    fn present_image(
        &self,
        wait_semaphores: &[Semaphore],
        image: ImageHandle,
    ) -> Result<(), GraphicsError>;
}

/// Per-queue command buffer pool contract.
pub trait CommandBufferAllocator: Send + Sync {
    /// Acquire a command buffer recording against the given queue type.
    fn acquire(&self, queue_type: QueueType) -> CommandBuffer;

    /// Return a command buffer to the pool.
    fn release(&self, cmd: CommandBuffer);
}
