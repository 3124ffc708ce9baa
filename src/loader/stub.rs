//! In-memory loader for tests and development.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::backend::{BufferHandle, ImageHandle, ShaderHandle};
use crate::error::GraphicsError;

use super::{BufferLoadInfo, ImageLoadInfo, ResourceLoader, ShaderLoadInfo};

/// Loader that fabricates handles instead of reading assets.
///
/// Every load succeeds and returns a fresh handle. Load calls are counted
/// per name, which is what the shared-resource tests assert on.
#[derive(Debug, Default)]
pub struct StubLoader {
    next_handle: AtomicU64,
    load_log: Mutex<Vec<String>>,
}

impl StubLoader {
    /// Create a new stub loader.
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(0x1000),
            load_log: Mutex::new(Vec::new()),
        }
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, name: &str) {
        self.load_log.lock().push(name.to_string());
    }

    /// Number of load calls made for the given name.
    pub fn load_count(&self, name: &str) -> usize {
        self.load_log.lock().iter().filter(|n| *n == name).count()
    }

    /// Total number of load calls.
    pub fn total_loads(&self) -> usize {
        self.load_log.lock().len()
    }
}

impl ResourceLoader for StubLoader {
    fn load_image(&self, name: &str, info: &ImageLoadInfo) -> Result<ImageHandle, GraphicsError> {
        log::trace!("StubLoader: image '{}' from '{}'", name, info.path);
        self.record(name);
        Ok(ImageHandle::from_raw(self.next_handle()))
    }

    fn load_buffer(
        &self,
        name: &str,
        info: &BufferLoadInfo,
    ) -> Result<BufferHandle, GraphicsError> {
        log::trace!("StubLoader: buffer '{}' from '{}'", name, info.path);
        self.record(name);
        Ok(BufferHandle::from_raw(self.next_handle()))
    }

    fn load_shader(
        &self,
        name: &str,
        info: &ShaderLoadInfo,
    ) -> Result<ShaderHandle, GraphicsError> {
        log::trace!("StubLoader: shader '{}' from '{}'", name, info.path);
        self.record(name);
        Ok(ShaderHandle::from_raw(self.next_handle()))
    }
}
