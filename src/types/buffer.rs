//! Buffer descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 0;
        /// Buffer can be bound as a storage buffer.
        const STORAGE = 1 << 1;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 2;
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 3;
        /// Buffer can supply indirect draw/dispatch arguments.
        const INDIRECT = 1 << 4;
        /// Buffer can be the source of a transfer operation.
        const TRANSFER_SRC = 1 << 5;
        /// Buffer can be the destination of a transfer operation.
        const TRANSFER_DST = 1 << 6;
    }
}

/// Creation parameters for a graph-allocated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCreateInfo {
    /// Buffer size in bytes.
    pub size: u64,
    /// Accumulated usage flags.
    pub usage: BufferUsage,
}

impl BufferCreateInfo {
    /// Create info for a buffer of the given size.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_flags() {
        let usage = BufferUsage::STORAGE | BufferUsage::TRANSFER_DST;
        assert!(usage.contains(BufferUsage::STORAGE));
        assert!(!usage.contains(BufferUsage::UNIFORM));
    }
}
