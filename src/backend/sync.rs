//! CPU-GPU synchronization primitives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Status of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The fence has not yet been signaled.
    Unsignaled,
    /// The fence has been signaled (GPU work complete).
    Signaled,
}

/// CPU-GPU synchronization primitive.
///
/// Fences let the CPU wait for previously submitted GPU work to retire.
/// Each render graph owns one fence; [`execute`](crate::graph::RenderGraph::execute)
/// waits on the previous submission before reusing the graph's command
/// buffers.
///
/// Cloning a fence shares its signal state, so a device implementation can
/// keep a clone to signal when the submission completes.
#[derive(Debug)]
pub struct Fence {
    signaled: Arc<AtomicBool>,
}

impl Fence {
    /// Create a new fence.
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(signaled)),
        }
    }

    /// Check the current status of the fence.
    pub fn status(&self) -> FenceStatus {
        if self.signaled.load(Ordering::Acquire) {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    /// Check if the fence is signaled (non-blocking).
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Wait for the fence to be signaled (blocking).
    ///
    /// Returns immediately if already signaled.
    pub fn wait(&self) {
        while !self.signaled.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
    }

    /// Wait for the fence with a timeout.
    ///
    /// Returns `true` if the fence was signaled, `false` if the timeout
    /// elapsed first.
    pub fn wait_timeout(&self, timeout: std::time::Duration) -> bool {
        let start = std::time::Instant::now();
        while !self.signaled.load(Ordering::Acquire) {
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }

    /// Reset the fence to the unsignaled state.
    ///
    /// Must only be called when no GPU work is pending on this fence.
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    /// Signal the fence.
    ///
    /// Device implementations call this when the associated submission
    /// retires.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

impl Clone for Fence {
    fn clone(&self) -> Self {
        Self {
            signaled: Arc::clone(&self.signaled),
        }
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new(false)
    }
}

/// GPU-GPU synchronization primitive.
///
/// Semaphores order submissions against each other on the GPU timeline and
/// cannot be waited on from the CPU. Submissions produced by the graph carry
/// no semaphores today: within one queue, in-order submission plus barriers
/// already encode every hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semaphore {
    id: u64,
}

impl Semaphore {
    /// Create a semaphore with the given ID.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// The semaphore's unique ID (for debugging).
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_initial_state() {
        assert!(!Fence::new(false).is_signaled());
        assert!(Fence::new(true).is_signaled());
    }

    #[test]
    fn test_fence_signal_and_reset() {
        let fence = Fence::new(false);
        fence.signal();
        assert_eq!(fence.status(), FenceStatus::Signaled);

        fence.reset();
        assert_eq!(fence.status(), FenceStatus::Unsignaled);
    }

    #[test]
    fn test_fence_clone_shares_state() {
        let fence = Fence::new(false);
        let other = fence.clone();
        other.signal();
        assert!(fence.is_signaled());
    }

    #[test]
    fn test_fence_wait_timeout() {
        let fence = Fence::new(false);
        assert!(!fence.wait_timeout(std::time::Duration::from_millis(5)));
        fence.signal();
        assert!(fence.wait_timeout(std::time::Duration::from_millis(5)));
    }

    #[test]
    fn test_fence_wait_cross_thread() {
        let fence = Fence::new(false);
        let clone = fence.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            clone.signal();
        });
        fence.wait();
        assert!(fence.is_signaled());
    }
}
