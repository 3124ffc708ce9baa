//! Command buffer recording.
//!
//! Command buffers record a declarative command stream rather than calling
//! into a driver directly. The graph records barriers, rendering scopes and
//! pass callbacks into [`CommandBuffer`]s; a device implementation translates
//! the recorded stream at submission time. This keeps recording observable,
//! which the no-GPU device relies on.

use smallvec::SmallVec;

use crate::types::{ClearValue, LoadOp, QueueType, ResourceState, StoreOp};

use super::{BufferHandle, ImageHandle, ShaderHandle};

/// A state transition for an image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    /// The image being transitioned.
    pub image: ImageHandle,
    /// State the image is currently in.
    pub current_state: ResourceState,
    /// State the image transitions to.
    pub new_state: ResourceState,
}

/// A state transition for a buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    /// The buffer being transitioned.
    pub buffer: BufferHandle,
    /// State the buffer is currently in.
    pub current_state: ResourceState,
    /// State the buffer transitions to.
    pub new_state: ResourceState,
}

/// A single attachment bound for a rendering scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingAttachment {
    /// The backing image.
    pub image: ImageHandle,
    /// Load operation at scope begin.
    pub load_op: LoadOp,
    /// Store operation at scope end.
    pub store_op: StoreOp,
    /// Clear value used when `load_op` is [`LoadOp::Clear`].
    pub clear_value: ClearValue,
}

/// Attachment set for one rendering scope.
#[derive(Debug, Clone, Default)]
pub struct RenderingInfo {
    /// Color attachments, in declaration order.
    pub colors: SmallVec<[RenderingAttachment; 4]>,
    /// Optional depth/stencil attachment.
    pub depth: Option<RenderingAttachment>,
}

/// One recorded command.
#[derive(Debug, Clone)]
pub enum Command {
    /// Barrier batch; at least one of the lists is non-empty.
    Barriers {
        /// Buffer state transitions.
        buffers: Vec<BufferBarrier>,
        /// Image state transitions.
        images: Vec<ImageBarrier>,
    },
    /// Begin a rendering scope with the given attachments.
    BeginRendering(RenderingInfo),
    /// End the current rendering scope.
    EndRendering,
    /// Debug label for tooling.
    DebugLabel(String),
    /// Bind a shader program.
    SetProgram(ShaderHandle),
    /// Draw call recorded by a pass callback.
    Draw {
        /// Number of vertices.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
    },
    /// Compute dispatch recorded by a pass callback.
    Dispatch {
        /// Workgroup counts.
        groups: [u32; 3],
    },
}

/// Recording state of a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    Initial,
    Recording,
    Executable,
}

/// A command buffer acquired from a device's allocator.
///
/// Recording follows the usual lifecycle: `reset` -> `begin` -> commands ->
/// `end`. Violating the lifecycle is a programming error and panics.
#[derive(Debug)]
pub struct CommandBuffer {
    id: u64,
    queue_type: QueueType,
    state: RecordState,
    rendering_depth: u32,
    commands: Vec<Command>,
}

/// Identifier of a command buffer, referenced from [`SubmitInfo`](super::SubmitInfo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub(crate) u64);

impl CommandBufferId {
    /// The raw identifier value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl CommandBuffer {
    /// Create a command buffer for the given queue type.
    ///
    /// Called by command-buffer allocators; graph code acquires buffers
    /// through [`CommandBufferAllocator`](super::CommandBufferAllocator).
    pub fn new(id: u64, queue_type: QueueType) -> Self {
        Self {
            id,
            queue_type,
            state: RecordState::Initial,
            rendering_depth: 0,
            commands: Vec::new(),
        }
    }

    /// This buffer's identifier.
    pub fn id(&self) -> CommandBufferId {
        CommandBufferId(self.id)
    }

    /// The queue type this buffer was allocated for.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Reset the buffer, discarding all recorded commands.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.rendering_depth = 0;
        self.state = RecordState::Initial;
    }

    /// Begin recording.
    pub fn begin(&mut self) {
        assert!(
            self.state == RecordState::Initial,
            "command buffer must be reset before begin"
        );
        self.state = RecordState::Recording;
    }

    /// End recording.
    pub fn end(&mut self) {
        assert!(
            self.state == RecordState::Recording,
            "command buffer is not recording"
        );
        assert!(
            self.rendering_depth == 0,
            "command buffer ended inside a rendering scope"
        );
        self.state = RecordState::Executable;
    }

    /// Insert a barrier batch.
    ///
    /// An empty batch records nothing.
    pub fn insert_barriers(&mut self, buffers: &[BufferBarrier], images: &[ImageBarrier]) {
        self.assert_recording();
        if buffers.is_empty() && images.is_empty() {
            return;
        }
        self.commands.push(Command::Barriers {
            buffers: buffers.to_vec(),
            images: images.to_vec(),
        });
    }

    /// Begin a rendering scope.
    pub fn begin_rendering(&mut self, info: RenderingInfo) {
        self.assert_recording();
        self.rendering_depth += 1;
        self.commands.push(Command::BeginRendering(info));
    }

    /// End the current rendering scope.
    pub fn end_rendering(&mut self) {
        self.assert_recording();
        assert!(self.rendering_depth > 0, "no rendering scope to end");
        self.rendering_depth -= 1;
        self.commands.push(Command::EndRendering);
    }

    /// Insert a debug label.
    pub fn insert_debug_label(&mut self, name: &str) {
        self.assert_recording();
        self.commands.push(Command::DebugLabel(name.to_string()));
    }

    /// Bind a shader program.
    pub fn set_program(&mut self, program: ShaderHandle) {
        self.assert_recording();
        self.commands.push(Command::SetProgram(program));
    }

    /// Record a draw call.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.assert_recording();
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    /// Record a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.assert_recording();
        self.commands.push(Command::Dispatch { groups: [x, y, z] });
    }

    /// The recorded command stream.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Total number of barriers (buffer + image) in all recorded batches.
    pub fn barrier_count(&self) -> usize {
        self.commands
            .iter()
            .map(|cmd| match cmd {
                Command::Barriers { buffers, images } => buffers.len() + images.len(),
                _ => 0,
            })
            .sum()
    }

    fn assert_recording(&self) {
        assert!(
            self.state == RecordState::Recording,
            "command buffer is not recording"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_buffer() -> CommandBuffer {
        let mut cmd = CommandBuffer::new(1, QueueType::Graphics);
        cmd.begin();
        cmd
    }

    #[test]
    fn test_record_lifecycle() {
        let mut cmd = CommandBuffer::new(1, QueueType::Graphics);
        cmd.begin();
        cmd.insert_debug_label("pass");
        cmd.end();
        assert_eq!(cmd.commands().len(), 1);

        cmd.reset();
        assert!(cmd.commands().is_empty());
    }

    #[test]
    #[should_panic(expected = "not recording")]
    fn test_record_without_begin_panics() {
        let mut cmd = CommandBuffer::new(1, QueueType::Graphics);
        cmd.insert_debug_label("nope");
    }

    #[test]
    #[should_panic(expected = "inside a rendering scope")]
    fn test_end_inside_rendering_panics() {
        let mut cmd = recording_buffer();
        cmd.begin_rendering(RenderingInfo::default());
        cmd.end();
    }

    #[test]
    fn test_empty_barrier_batch_records_nothing() {
        let mut cmd = recording_buffer();
        cmd.insert_barriers(&[], &[]);
        assert!(cmd.commands().is_empty());
        assert_eq!(cmd.barrier_count(), 0);
    }

    #[test]
    fn test_barrier_count() {
        let mut cmd = recording_buffer();
        cmd.insert_barriers(
            &[],
            &[ImageBarrier {
                image: ImageHandle(7),
                current_state: ResourceState::Undefined,
                new_state: ResourceState::RenderTarget,
            }],
        );
        cmd.insert_barriers(
            &[BufferBarrier {
                buffer: BufferHandle(3),
                current_state: ResourceState::Undefined,
                new_state: ResourceState::UnorderedAccess,
            }],
            &[],
        );
        assert_eq!(cmd.barrier_count(), 2);
    }
}
