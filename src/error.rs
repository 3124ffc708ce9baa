//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the frame-graph system.
///
/// These cover device and driver failures that propagate through
/// [`build`](crate::graph::RenderGraph::build) and
/// [`execute`](crate::graph::RenderGraph::execute). Declaration bugs
/// (duplicate pass names, resource type conflicts, dependency cycles) are
/// *not* represented here: they are static programming errors and panic
/// instead of returning a recoverable value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to create a GPU resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Failed to submit recorded work to a queue.
    #[error("queue submission failed: {0}")]
    SubmissionFailed(String),
    /// Failed to present the back buffer.
    #[error("present failed: {0}")]
    PresentFailed(String),
    /// Failed to load an asset through the resource loader.
    #[error("asset load failed for '{name}': {reason}")]
    LoadFailed {
        /// Name of the resource whose load failed.
        name: String,
        /// Loader-provided failure description.
        reason: String,
    },
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::ResourceCreationFailed("no heap".to_string());
        assert_eq!(err.to_string(), "resource creation failed: no heap");

        let err = GraphicsError::LoadFailed {
            name: "noise".to_string(),
            reason: "file missing".to_string(),
        };
        assert_eq!(err.to_string(), "asset load failed for 'noise': file missing");
    }
}
