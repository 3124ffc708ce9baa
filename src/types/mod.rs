//! Common type vocabulary for the frame-graph system.

mod buffer;
mod common;
mod image;
mod state;

pub use buffer::{BufferCreateInfo, BufferUsage};
pub use common::{ClearValue, Extent2d, Extent3d, QueueType};
pub use image::{AttachmentInfo, Format, ImageCreateInfo, ImageUsage, LoadOp, StoreOp};
pub use state::{buffer_resource_state, image_resource_state, AccessFlags, ResourceState};
