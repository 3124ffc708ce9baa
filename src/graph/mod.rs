//! Render graph infrastructure.
//!
//! The render graph provides a declarative way to describe a frame's GPU
//! passes and the resources they read and write. From those declarations the
//! graph derives everything else:
//!
//! - Pass ordering via topological sort of the resource dependency graph
//! - Allocation of graph-owned attachment images
//! - Barrier placement, emitting a transition only when a resource's tracked
//!   state differs from the state a pass requires
//! - Command recording and queue submission
//!
//! # Architecture
//!
//! The frame orchestration layer is organized top-down:
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Composer | [`FrameComposer`] | One graph per in-flight frame, shared resources |
//! | Graph | [`RenderGraph`] | Dependency analysis, build and execute |
//! | Pass | [`PassBuilder`] declarations | Single unit of GPU work |
//! | Resource | [`PassResource`] | Named image or buffer tracked by the graph |
//!
//! # Dirty tracking
//!
//! Every declaration marks its category dirty on the owning graph;
//! [`RenderGraph::build`] rebuilds only the derived state the dirty bits
//! call for and is a no-op when nothing changed.
//!
//! # Multi-queue status
//!
//! Passes declare a queue type and command buffers are acquired per queue,
//! but submission currently targets the graphics queue only. Cross-queue
//! hand-off needs semaphore routing that the submission path does not model
//! yet, so mixed-queue graphs execute correctly but without async overlap.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = RenderGraph::new(device);
//! let shadow = graph.create_pass("shadow", QueueType::Graphics);
//! graph
//!     .configure_pass(shadow)
//!     .color_output("shadowmap", AttachmentInfo::color(2048, 2048, Format::R32Float))
//!     .execute(|cmd| cmd.draw(3, 1));
//! graph.set_back_buffer("shadowmap");
//! graph.build(Some(&swapchain))?;
//! graph.execute()?;
//! ```

mod composer;
#[allow(clippy::module_inception)]
mod graph;
mod pass;
mod resource;

pub use composer::{FrameComposer, Frames};
pub use graph::RenderGraph;
pub use pass::{BufferSource, ImageSource, PassBuilder, RenderPass};
pub use resource::{PassResource, ResourceFlags, ResourceInfo, ResourceKind};

/// Handle to a pass in a render graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the [`RenderGraph`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a resource in a render graph.
///
/// Like [`PassHandle`], valid only within the graph that created it. The
/// resource's *name* is the stable key; handles are a cheap index into the
/// graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub(crate) u32);

impl ResourceHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
