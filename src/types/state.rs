//! Resource states and the usage-to-state derivation tables.
//!
//! Every resource tracked by the graph is, at any point in the recorded
//! frame, in exactly one [`ResourceState`]. Passes declare the state they
//! need a resource in; the graph diffs that against the tracked state and
//! emits a barrier only when they differ.

use bitflags::bitflags;

use super::{BufferUsage, ImageUsage};

/// The synchronization state of a resource.
///
/// A state bundles the (access, layout) pair a barrier transitions between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Initial state of a freshly allocated resource; contents undefined.
    #[default]
    Undefined,
    /// General-purpose access; used for imported resources.
    General,
    /// Read as a uniform buffer.
    UniformBuffer,
    /// Read as a vertex buffer.
    VertexBuffer,
    /// Read as an index buffer.
    IndexBuffer,
    /// Read as indirect command arguments.
    IndirectArgument,
    /// Sampled in a shader.
    ShaderResource,
    /// Read/written as a storage resource.
    UnorderedAccess,
    /// Written as a color render target.
    RenderTarget,
    /// Written as a depth/stencil target.
    DepthStencil,
    /// Source of a copy operation.
    CopySource,
    /// Destination of a copy operation.
    CopyDest,
    /// Handed to the presentation engine.
    Present,
}

bitflags! {
    /// Fine-grained access flags accumulated per resource.
    ///
    /// These describe every way the resource is touched across all declaring
    /// passes; backends can derive pipeline stage masks from them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// Generic shader read.
        const SHADER_READ = 1 << 0;
        /// Generic shader write.
        const SHADER_WRITE = 1 << 1;
        /// Sampled-image read.
        const SHADER_SAMPLED_READ = 1 << 2;
        /// Storage read.
        const SHADER_STORAGE_READ = 1 << 3;
        /// Storage write.
        const SHADER_STORAGE_WRITE = 1 << 4;
        /// Uniform buffer read.
        const UNIFORM_READ = 1 << 5;
        /// Index buffer read.
        const INDEX_READ = 1 << 6;
        /// Vertex attribute read.
        const VERTEX_ATTRIBUTE_READ = 1 << 7;
        /// Indirect command read.
        const INDIRECT_COMMAND_READ = 1 << 8;
        /// Transfer read.
        const TRANSFER_READ = 1 << 9;
        /// Transfer write.
        const TRANSFER_WRITE = 1 << 10;
        /// Color attachment write.
        const COLOR_ATTACHMENT_WRITE = 1 << 11;
        /// Depth/stencil attachment write.
        const DEPTH_STENCIL_WRITE = 1 << 12;
    }
}

/// Derive the target state and access flags for a buffer declaration.
///
/// The mapping is deterministic: the highest-priority usage bit set in
/// `usage` decides the state. Unknown usages fall back to
/// [`ResourceState::General`] with a warning.
pub fn buffer_resource_state(usage: BufferUsage, is_write: bool) -> (ResourceState, AccessFlags) {
    if usage.contains(BufferUsage::UNIFORM) {
        (ResourceState::UniformBuffer, AccessFlags::UNIFORM_READ)
    } else if usage.contains(BufferUsage::STORAGE) {
        let access = if is_write {
            AccessFlags::SHADER_STORAGE_WRITE
        } else {
            AccessFlags::SHADER_STORAGE_READ
        };
        (ResourceState::UnorderedAccess, access)
    } else if usage.contains(BufferUsage::INDEX) {
        (ResourceState::IndexBuffer, AccessFlags::INDEX_READ)
    } else if usage.contains(BufferUsage::VERTEX) {
        (ResourceState::VertexBuffer, AccessFlags::VERTEX_ATTRIBUTE_READ)
    } else if usage.contains(BufferUsage::TRANSFER_DST) {
        (ResourceState::CopyDest, AccessFlags::TRANSFER_WRITE)
    } else if usage.contains(BufferUsage::TRANSFER_SRC) {
        (ResourceState::CopySource, AccessFlags::TRANSFER_READ)
    } else if usage.contains(BufferUsage::INDIRECT) {
        (
            ResourceState::IndirectArgument,
            AccessFlags::INDIRECT_COMMAND_READ,
        )
    } else {
        log::warn!("unspecified buffer usage, defaulting to general access");
        let access = if is_write {
            AccessFlags::SHADER_WRITE
        } else {
            AccessFlags::SHADER_READ
        };
        (ResourceState::General, access)
    }
}

/// Derive the target state and access flags for an image declaration.
///
/// Same contract as [`buffer_resource_state`]: a fixed priority chain over
/// the usage bits, falling back to [`ResourceState::General`].
pub fn image_resource_state(usage: ImageUsage, is_write: bool) -> (ResourceState, AccessFlags) {
    if usage.contains(ImageUsage::SAMPLED) {
        (ResourceState::ShaderResource, AccessFlags::SHADER_SAMPLED_READ)
    } else if usage.contains(ImageUsage::STORAGE) {
        let access = if is_write {
            AccessFlags::SHADER_STORAGE_WRITE
        } else {
            AccessFlags::SHADER_STORAGE_READ
        };
        (ResourceState::UnorderedAccess, access)
    } else if usage.contains(ImageUsage::TRANSFER_SRC) {
        (ResourceState::CopySource, AccessFlags::TRANSFER_READ)
    } else if usage.contains(ImageUsage::TRANSFER_DST) {
        (ResourceState::CopyDest, AccessFlags::TRANSFER_WRITE)
    } else if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        (ResourceState::RenderTarget, AccessFlags::COLOR_ATTACHMENT_WRITE)
    } else if usage.contains(ImageUsage::DEPTH_STENCIL) {
        (ResourceState::DepthStencil, AccessFlags::DEPTH_STENCIL_WRITE)
    } else {
        log::warn!("unspecified image usage, defaulting to general access");
        let access = if is_write {
            AccessFlags::SHADER_WRITE
        } else {
            AccessFlags::SHADER_READ
        };
        (ResourceState::General, access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ImageUsage::SAMPLED, false, ResourceState::ShaderResource)]
    #[case(ImageUsage::STORAGE, false, ResourceState::UnorderedAccess)]
    #[case(ImageUsage::STORAGE, true, ResourceState::UnorderedAccess)]
    #[case(ImageUsage::COLOR_ATTACHMENT, true, ResourceState::RenderTarget)]
    #[case(ImageUsage::DEPTH_STENCIL, true, ResourceState::DepthStencil)]
    #[case(ImageUsage::TRANSFER_SRC, false, ResourceState::CopySource)]
    #[case(ImageUsage::TRANSFER_DST, true, ResourceState::CopyDest)]
    fn test_image_usage_to_state(
        #[case] usage: ImageUsage,
        #[case] is_write: bool,
        #[case] expected: ResourceState,
    ) {
        let (state, _) = image_resource_state(usage, is_write);
        assert_eq!(state, expected);
    }

    #[rstest]
    #[case(BufferUsage::UNIFORM, false, ResourceState::UniformBuffer)]
    #[case(BufferUsage::STORAGE, false, ResourceState::UnorderedAccess)]
    #[case(BufferUsage::STORAGE, true, ResourceState::UnorderedAccess)]
    #[case(BufferUsage::INDEX, false, ResourceState::IndexBuffer)]
    #[case(BufferUsage::VERTEX, false, ResourceState::VertexBuffer)]
    #[case(BufferUsage::INDIRECT, false, ResourceState::IndirectArgument)]
    fn test_buffer_usage_to_state(
        #[case] usage: BufferUsage,
        #[case] is_write: bool,
        #[case] expected: ResourceState,
    ) {
        let (state, _) = buffer_resource_state(usage, is_write);
        assert_eq!(state, expected);
    }

    #[test]
    fn test_sampled_wins_over_transfer() {
        // Priority chain: a sampled texture that is also a transfer
        // destination resolves to ShaderResource.
        let (state, access) =
            image_resource_state(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST, false);
        assert_eq!(state, ResourceState::ShaderResource);
        assert_eq!(access, AccessFlags::SHADER_SAMPLED_READ);
    }

    #[test]
    fn test_storage_write_access() {
        let (_, access) = buffer_resource_state(BufferUsage::STORAGE, true);
        assert_eq!(access, AccessFlags::SHADER_STORAGE_WRITE);
        let (_, access) = buffer_resource_state(BufferUsage::STORAGE, false);
        assert_eq!(access, AccessFlags::SHADER_STORAGE_READ);
    }

    #[test]
    fn test_unspecified_usage_defaults_to_general() {
        let (state, _) = image_resource_state(ImageUsage::empty(), false);
        assert_eq!(state, ResourceState::General);
        let (state, _) = buffer_resource_state(BufferUsage::empty(), true);
        assert_eq!(state, ResourceState::General);
    }
}
