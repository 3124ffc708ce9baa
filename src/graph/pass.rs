//! Pass declarations and the fluent configuration builder.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::backend::{BufferHandle, CommandBuffer, ImageHandle};
use crate::loader::{BufferLoadInfo, ImageLoadInfo, ShaderLoadInfo};
use crate::types::{AttachmentInfo, BufferUsage, ImageUsage, QueueType, ResourceState};

use super::graph::RenderGraph;
use super::{PassHandle, ResourceHandle};

/// Callback that records a pass's GPU commands.
pub type ExecuteCallback = Box<dyn FnMut(&mut CommandBuffer)>;

/// Predicate deciding whether a conditional pass executes this frame.
pub type ExecutionPredicate = Box<dyn Fn() -> bool>;

/// How a pass participates in execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ExecutionMode {
    /// Pass always executes.
    #[default]
    Always,
    /// Pass executes when its predicate returns true.
    Conditional,
    /// Pass is excluded from execution.
    Culled,
}

/// One entry of the shader record list: a program bound before its callback
/// records commands.
pub(crate) struct RecordEntry {
    pub(crate) shader: String,
    pub(crate) callback: ExecuteCallback,
}

/// The image source of a texture input declaration.
pub enum ImageSource {
    /// No concrete image yet; another pass produces it.
    None,
    /// A concrete handle, imported into the graph immediately.
    Handle(ImageHandle),
    /// A deferred load resolved later by the frame composer.
    Load(ImageLoadInfo),
}

/// The buffer source of a buffer input declaration.
pub enum BufferSource {
    /// No concrete buffer yet; another pass produces it.
    None,
    /// A concrete handle, imported into the graph immediately.
    Handle(BufferHandle),
    /// A deferred load resolved later by the frame composer.
    Load(BufferLoadInfo),
}

/// A logical unit of GPU work with declared resource reads/writes and a
/// recording callback.
///
/// Passes are created through [`RenderGraph::create_pass`] and configured
/// through [`RenderGraph::configure_pass`]; they are owned exclusively by
/// their graph.
pub struct RenderPass {
    pub(crate) name: String,
    pub(crate) queue_type: QueueType,

    // Role-partitioned resource collections.
    pub(crate) texture_in: SmallVec<[ResourceHandle; 8]>,
    pub(crate) texture_out: SmallVec<[ResourceHandle; 4]>,
    pub(crate) storage_buffer_in: SmallVec<[ResourceHandle; 4]>,
    pub(crate) storage_buffer_out: SmallVec<[ResourceHandle; 4]>,
    pub(crate) uniform_buffer_in: SmallVec<[ResourceHandle; 4]>,
    pub(crate) color_out: SmallVec<[ResourceHandle; 4]>,
    pub(crate) depth_out: Option<ResourceHandle>,

    /// Target state each declared resource must be in for this pass.
    pub(crate) target_states: IndexMap<ResourceHandle, ResourceState>,

    pub(crate) execute: Option<ExecuteCallback>,
    pub(crate) record_list: Vec<RecordEntry>,

    pub(crate) execution_mode: ExecutionMode,
    pub(crate) condition: Option<ExecutionPredicate>,
}

impl RenderPass {
    pub(crate) fn new(name: String, queue_type: QueueType) -> Self {
        Self {
            name,
            queue_type,
            texture_in: SmallVec::new(),
            texture_out: SmallVec::new(),
            storage_buffer_in: SmallVec::new(),
            storage_buffer_out: SmallVec::new(),
            uniform_buffer_in: SmallVec::new(),
            color_out: SmallVec::new(),
            depth_out: None,
            target_states: IndexMap::new(),
            execute: None,
            record_list: Vec::new(),
            execution_mode: ExecutionMode::Always,
            condition: None,
        }
    }

    /// The pass's name, unique within its graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The queue family this pass records against.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Whether the pass executes this frame.
    ///
    /// Conditional passes evaluate their predicate here, at record time; the
    /// result is never cached.
    pub fn should_execute(&self) -> bool {
        match self.execution_mode {
            ExecutionMode::Always => true,
            ExecutionMode::Culled => false,
            ExecutionMode::Conditional => self.condition.as_ref().map_or(true, |cond| cond()),
        }
    }

    pub(crate) fn set_execute(&mut self, callback: ExecuteCallback) {
        assert!(
            self.record_list.is_empty(),
            "pass '{}' already uses a shader record list; the single execute \
             callback and the record list are mutually exclusive",
            self.name
        );
        self.execute = Some(callback);
    }

    pub(crate) fn add_record(&mut self, shader: String, callback: ExecuteCallback) {
        assert!(
            self.execute.is_none(),
            "pass '{}' already has an execute callback; the single execute \
             callback and the record list are mutually exclusive",
            self.name
        );
        self.record_list.push(RecordEntry { shader, callback });
    }

    pub(crate) fn reset_commands(&mut self) {
        self.execute = None;
        self.record_list.clear();
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("name", &self.name)
            .field("queue_type", &self.queue_type)
            .field("texture_in", &self.texture_in)
            .field("texture_out", &self.texture_out)
            .field("color_out", &self.color_out)
            .field("depth_out", &self.depth_out)
            .field("execution_mode", &self.execution_mode)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for declaring a pass's resources and callbacks.
///
/// Obtained from [`RenderGraph::configure_pass`]. Declarations can be made
/// in any order; every call marks the owning graph dirty in the relevant
/// category, which is how the graph learns that a rebuild is pending.
///
/// # Example
///
/// ```ignore
/// graph
///     .configure_pass(lighting)
///     .texture_input("shadowmap", ImageSource::None, ImageUsage::SAMPLED)
///     .buffer_input("frame-constants", BufferSource::Handle(constants), BufferUsage::UNIFORM)
///     .color_output("sceneColor", AttachmentInfo::color(1920, 1080, Format::Rgba16Float))
///     .execute(|cmd| cmd.draw(3, 1));
/// ```
pub struct PassBuilder<'a> {
    pub(crate) graph: &'a mut RenderGraph,
    pub(crate) pass: PassHandle,
}

impl<'a> PassBuilder<'a> {
    /// Declare a texture read.
    pub fn texture_input(self, name: &str, source: ImageSource, usage: ImageUsage) -> Self {
        self.graph.add_texture_input(self.pass, name, source, usage);
        self
    }

    /// Declare a texture write (defaults to storage usage).
    pub fn texture_output(self, name: &str, usage: ImageUsage) -> Self {
        self.graph.add_texture_output(self.pass, name, usage);
        self
    }

    /// Declare a buffer read.
    pub fn buffer_input(self, name: &str, source: BufferSource, usage: BufferUsage) -> Self {
        self.graph.add_buffer_input(self.pass, name, source, usage);
        self
    }

    /// Declare a buffer write (defaults to storage usage).
    pub fn buffer_output(self, name: &str, usage: BufferUsage) -> Self {
        self.graph.add_buffer_output(self.pass, name, usage);
        self
    }

    /// Declare a color attachment output.
    pub fn color_output(self, name: &str, info: AttachmentInfo) -> Self {
        self.graph.set_color_output(self.pass, name, info);
        self
    }

    /// Declare the depth/stencil attachment output.
    pub fn depth_stencil_output(self, name: &str, info: AttachmentInfo) -> Self {
        self.graph.set_depth_stencil_output(self.pass, name, info);
        self
    }

    /// Set the pass's single execution callback.
    ///
    /// Mutually exclusive with [`shader`](Self::shader) entries; declaring
    /// both is a fatal assertion.
    pub fn execute(self, callback: impl FnMut(&mut CommandBuffer) + 'static) -> Self {
        self.graph.set_pass_execute(self.pass, Box::new(callback));
        self
    }

    /// Append a shader record entry: the named program is bound before the
    /// callback records.
    ///
    /// The program is resolved through the frame composer's shader loading;
    /// mutually exclusive with [`execute`](Self::execute).
    pub fn shader(
        self,
        shader_name: &str,
        load_info: ShaderLoadInfo,
        callback: impl FnMut(&mut CommandBuffer) + 'static,
    ) -> Self {
        self.graph
            .add_pass_record(self.pass, shader_name, load_info, Box::new(callback));
        self
    }

    /// Clear the execute callback and the record list.
    pub fn reset_execute(self) -> Self {
        self.graph.reset_pass_commands(self.pass);
        self
    }

    /// Make the pass conditional on the given predicate.
    ///
    /// The predicate is evaluated lazily at record time, never cached.
    pub fn execution_condition(self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.graph
            .set_pass_condition(self.pass, Box::new(predicate));
        self
    }

    /// Cull (or un-cull) the pass.
    pub fn set_culled(self, culled: bool) -> Self {
        self.graph.set_pass_culled(self.pass, culled);
        self
    }

    /// Tag a declared resource for cross-frame de-duplication.
    pub fn mark_resource_as_shared(self, name: &str) -> Self {
        self.graph.mark_resource_as_shared(name);
        self
    }

    /// Finish configuration, returning the pass handle.
    pub fn build(self) -> PassHandle {
        self.pass
    }
}
