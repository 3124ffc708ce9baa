//! # framegraph-engine
//!
//! Frame orchestration layer for a real-time renderer, built around a
//! declarative render graph. The crate does not draw pixels itself; it
//! manages the *order, synchronization and lifetime* of the GPU passes
//! submitted each frame, and de-duplicates resources shared across multiple
//! in-flight frames.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderGraph`] - Declarative description of passes, their resource
//!   reads/writes, and the derived schedule, allocations and barriers
//! - [`FrameComposer`] - One graph per in-flight frame plus exactly-once
//!   resolution of cross-frame shared assets
//! - [`backend`] - The device contract the graph records against, with a
//!   no-GPU [`DummyDevice`](backend::DummyDevice) for tests and dry runs
//! - [`loader`] - The asynchronous asset-loading contract
//!
//! ## Frame control flow
//!
//! ```ignore
//! use framegraph_engine::{FrameComposer, QueueType, AttachmentInfo, Format, ImageSource, ImageUsage};
//!
//! let mut composer = FrameComposer::new(device, loader, 2);
//!
//! // Declare passes on each frame's graph.
//! let graph = composer.current_graph_mut();
//! let shadow = graph.create_pass("shadow", QueueType::Graphics);
//! graph
//!     .configure_pass(shadow)
//!     .color_output("shadowmap", AttachmentInfo::color(2048, 2048, Format::R32Float))
//!     .execute(|cmd| cmd.draw(3, 1));
//!
//! // Shared assets load once, every graph builds, the current frame runs.
//! composer.build_all(Some(&swapchain))?;
//! composer.current_graph_mut().execute()?;
//! composer.next_frame();
//! ```

pub mod backend;
pub mod error;
pub mod graph;
pub mod loader;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BufferHandle, CommandBuffer, Device, Fence, ImageHandle, Queue, ShaderHandle, SubmitInfo,
    Swapchain,
};
pub use error::GraphicsError;
pub use graph::{
    BufferSource, FrameComposer, ImageSource, PassBuilder, PassHandle, RenderGraph, RenderPass,
    ResourceHandle,
};
pub use loader::{BufferLoadInfo, ImageLoadInfo, ResourceLoader, ShaderLoadInfo};
pub use types::{
    AttachmentInfo, BufferCreateInfo, BufferUsage, ClearValue, Extent2d, Extent3d, Format,
    ImageCreateInfo, ImageUsage, LoadOp, QueueType, ResourceState, StoreOp,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the frame-graph subsystem.
///
/// This only announces itself; call it once before using the crate if you
/// want the version in your logs.
pub fn init() {
    log::info!("framegraph-engine v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dry_run_graph_creation() {
        let graph = RenderGraph::new_dry_run();
        assert!(graph.is_dry_run());
        assert_eq!(graph.pass_count(), 0);
    }
}
