//! Dummy GPU device for testing and development.
//!
//! [`DummyDevice`] implements the full device contract without touching any
//! graphics API. Every operation is counted, so tests can assert on
//! allocation, destruction, submission and presentation behavior. Submitted
//! fences are signaled immediately since there is no real GPU to wait for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::{BufferCreateInfo, Extent2d, ImageCreateInfo, QueueType};

use super::{
    BufferHandle, CommandBuffer, CommandBufferAllocator, Device, Fence, ImageHandle, Queue,
    Semaphore, SubmitInfo, Swapchain,
};

#[derive(Debug, Default)]
struct DeviceCounters {
    images_created: usize,
    buffers_created: usize,
    created_images: Vec<(String, ImageCreateInfo)>,
    destroyed_images: Vec<ImageHandle>,
    destroyed_buffers: Vec<BufferHandle>,
    fences_acquired: usize,
    fences_released: usize,
}

/// No-op queue that signals fences immediately.
#[derive(Debug, Default)]
pub struct DummyQueue {
    submit_count: Mutex<usize>,
    submitted_batches: Mutex<Vec<usize>>,
    presented: Mutex<Vec<ImageHandle>>,
}

impl Queue for DummyQueue {
    fn submit(&self, submits: &[SubmitInfo], fence: &Fence) -> Result<(), GraphicsError> {
        log::trace!("DummyQueue: submitting {} batches", submits.len());
        *self.submit_count.lock() += 1;
        self.submitted_batches.lock().push(submits.len());
        // No GPU behind this queue; work "retires" at submission.
        fence.signal();
        Ok(())
    }

    fn present(
        &self,
        _wait_semaphores: &[Semaphore],
        image: ImageHandle,
    ) -> Result<(), GraphicsError> {
        log::trace!("DummyQueue: presenting image {:?}", image);
        self.presented.lock().push(image);
        Ok(())
    }
}

impl DummyQueue {
    /// Number of `submit` calls made against this queue.
    pub fn submit_count(&self) -> usize {
        *self.submit_count.lock()
    }

    /// Batch sizes of each submit call, in order.
    pub fn submitted_batches(&self) -> Vec<usize> {
        self.submitted_batches.lock().clone()
    }

    /// Images presented through this queue, in order.
    pub fn presented(&self) -> Vec<ImageHandle> {
        self.presented.lock().clone()
    }
}

/// Command buffer pool backed by a plain counter.
#[derive(Debug, Default)]
pub struct DummyCommandAllocator {
    next_id: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl CommandBufferAllocator for DummyCommandAllocator {
    fn acquire(&self, queue_type: QueueType) -> CommandBuffer {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::trace!("DummyCommandAllocator: acquire cmd {} ({})", id, queue_type.label());
        CommandBuffer::new(id, queue_type)
    }

    fn release(&self, cmd: CommandBuffer) {
        log::trace!("DummyCommandAllocator: release cmd {}", cmd.id().raw());
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl DummyCommandAllocator {
    /// Number of command buffers handed out.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Number of command buffers returned.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

/// Dummy graphics device.
///
/// Hands out monotonically increasing handles, tracks every create/destroy
/// pair and exposes the counters for assertions.
#[derive(Debug)]
pub struct DummyDevice {
    next_handle: AtomicU64,
    counters: Mutex<DeviceCounters>,
    queue: Arc<DummyQueue>,
    allocator: DummyCommandAllocator,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            counters: Mutex::new(DeviceCounters::default()),
            queue: Arc::new(DummyQueue::default()),
            allocator: DummyCommandAllocator::default(),
        }
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of images created so far.
    pub fn images_created(&self) -> usize {
        self.counters.lock().images_created
    }

    /// Number of buffers created so far.
    pub fn buffers_created(&self) -> usize {
        self.counters.lock().buffers_created
    }

    /// Debug names and creation parameters of every created image, in
    /// creation order.
    pub fn created_image_infos(&self) -> Vec<(String, ImageCreateInfo)> {
        self.counters.lock().created_images.clone()
    }

    /// Handles of all destroyed images, in destruction order.
    pub fn destroyed_images(&self) -> Vec<ImageHandle> {
        self.counters.lock().destroyed_images.clone()
    }

    /// Handles of all destroyed buffers, in destruction order.
    pub fn destroyed_buffers(&self) -> Vec<BufferHandle> {
        self.counters.lock().destroyed_buffers.clone()
    }

    /// Number of fences handed out.
    pub fn fences_acquired(&self) -> usize {
        self.counters.lock().fences_acquired
    }

    /// Number of fences returned.
    pub fn fences_released(&self) -> usize {
        self.counters.lock().fences_released
    }

    /// The dummy queue, for submission/present assertions.
    pub fn dummy_queue(&self) -> &DummyQueue {
        &self.queue
    }

    /// The dummy allocator, for acquire/release assertions.
    pub fn dummy_allocator(&self) -> &DummyCommandAllocator {
        &self.allocator
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for DummyDevice {
    fn create_image(
        &self,
        info: &ImageCreateInfo,
        debug_name: &str,
    ) -> Result<ImageHandle, GraphicsError> {
        log::trace!(
            "DummyDevice: creating image '{}' ({}x{}, {:?})",
            debug_name,
            info.extent.width,
            info.extent.height,
            info.format
        );
        let mut counters = self.counters.lock();
        counters.images_created += 1;
        counters.created_images.push((debug_name.to_string(), *info));
        Ok(ImageHandle(self.next_handle()))
    }

    fn create_buffer(
        &self,
        info: &BufferCreateInfo,
        debug_name: &str,
    ) -> Result<BufferHandle, GraphicsError> {
        log::trace!(
            "DummyDevice: creating buffer '{}' (size {})",
            debug_name,
            info.size
        );
        self.counters.lock().buffers_created += 1;
        Ok(BufferHandle(self.next_handle()))
    }

    fn destroy_image(&self, image: ImageHandle) {
        log::trace!("DummyDevice: destroying image {:?}", image);
        self.counters.lock().destroyed_images.push(image);
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        log::trace!("DummyDevice: destroying buffer {:?}", buffer);
        self.counters.lock().destroyed_buffers.push(buffer);
    }

    fn acquire_fence(&self, signaled: bool) -> Fence {
        self.counters.lock().fences_acquired += 1;
        Fence::new(signaled)
    }

    fn release_fence(&self, _fence: Fence) {
        self.counters.lock().fences_released += 1;
    }

    fn queue(&self, _queue_type: QueueType) -> Arc<dyn Queue> {
        // One queue serves every type; submission ordering is preserved.
        self.queue.clone()
    }

    fn command_allocator(&self) -> &dyn CommandBufferAllocator {
        &self.allocator
    }
}

/// Presentable surface without a window behind it.
#[derive(Debug)]
pub struct DummySwapchain {
    extent: Extent2d,
    presented: Mutex<Vec<ImageHandle>>,
}

impl DummySwapchain {
    /// Create a swapchain of the given extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: Extent2d::new(width, height),
            presented: Mutex::new(Vec::new()),
        }
    }

    /// Images presented to this swapchain, in order.
    pub fn presented(&self) -> Vec<ImageHandle> {
        self.presented.lock().clone()
    }
}

impl Swapchain for DummySwapchain {
    fn extent(&self) -> Extent2d {
        self.extent
    }

    fn present_image(
        &self,
        _wait_semaphores: &[Semaphore],
        image: ImageHandle,
    ) -> Result<(), GraphicsError> {
        log::trace!("DummySwapchain: presenting image {:?}", image);
        self.presented.lock().push(image);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Format;

    #[test]
    fn test_create_counts() {
        let device = DummyDevice::new();
        let info = ImageCreateInfo::new_2d(64, 64, Format::Rgba8Unorm);
        let image = device.create_image(&info, "test").unwrap();
        assert_eq!(device.images_created(), 1);

        device.destroy_image(image);
        assert_eq!(device.destroyed_images(), vec![image]);
    }

    #[test]
    fn test_handles_are_unique() {
        let device = DummyDevice::new();
        let info = BufferCreateInfo::new(256, crate::types::BufferUsage::STORAGE);
        let a = device.create_buffer(&info, "a").unwrap();
        let b = device.create_buffer(&info, "b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_submit_signals_fence() {
        let device = DummyDevice::new();
        let fence = device.acquire_fence(false);
        let queue = device.queue(QueueType::Graphics);
        queue.submit(&[SubmitInfo::default()], &fence).unwrap();
        assert!(fence.is_signaled());
        assert_eq!(device.dummy_queue().submit_count(), 1);
    }

    #[test]
    fn test_swapchain_records_presents() {
        let swapchain = DummySwapchain::new(800, 600);
        assert_eq!(swapchain.extent(), Extent2d::new(800, 600));
        swapchain.present_image(&[], ImageHandle(9)).unwrap();
        assert_eq!(swapchain.presented(), vec![ImageHandle(9)]);
    }
}
