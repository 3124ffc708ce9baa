//! Render graph definition, build and execution.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

use bitflags::bitflags;
use indexmap::{IndexMap, IndexSet};
use smallvec::{smallvec, SmallVec};

use crate::backend::{
    BufferBarrier, BufferHandle, CommandBuffer, Device, Fence, ImageBarrier, ImageHandle,
    RenderingAttachment, RenderingInfo, ShaderHandle, SubmitInfo, Swapchain,
};
use crate::error::GraphicsError;
use crate::loader::{BufferLoadInfo, ImageLoadInfo, ShaderLoadInfo};
use crate::types::{
    buffer_resource_state, image_resource_state, AttachmentInfo, BufferUsage, ImageUsage,
    QueueType, ResourceState,
};

use super::pass::{
    BufferSource, ExecuteCallback, ExecutionMode, ExecutionPredicate, ImageSource, PassBuilder,
    RenderPass,
};
use super::resource::{PassResource, ResourceFlags, ResourceKind};
use super::{PassHandle, ResourceHandle};

bitflags! {
    /// Categories of declared state changed since the last successful build.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct DirtyFlags: u32 {
        /// Render passes changed.
        const PASS = 1 << 0;
        /// Image resources changed.
        const IMAGE_RESOURCE = 1 << 1;
        /// Buffer resources changed.
        const BUFFER_RESOURCE = 1 << 2;
        /// Graph topology changed.
        const TOPOLOGY = 1 << 3;
        /// Back buffer changed.
        const BACK_BUFFER = 1 << 4;
        /// Swapchain changed.
        const SWAP_CHAIN = 1 << 5;
    }
}

/// Authoritative declaration-time data. Everything in [`BuildData`] can be
/// rebuilt from this.
#[derive(Default)]
struct DeclareData {
    passes: Vec<RenderPass>,
    resources: Vec<PassResource>,
    pass_lookup: IndexMap<String, PassHandle>,
    resource_lookup: IndexMap<String, ResourceHandle>,
    back_buffer: Option<String>,
    pending_image_loads: IndexMap<String, ImageLoadInfo>,
    pending_buffer_loads: IndexMap<String, BufferLoadInfo>,
    pending_shader_loads: IndexMap<String, ShaderLoadInfo>,
}

/// Derived state produced by [`RenderGraph::build`]. Never authoritative.
#[derive(Default)]
struct BuildData {
    /// Per-pass dependency sets: `adjacency[pass]` holds the passes that
    /// must run before `pass`.
    adjacency: IndexMap<PassHandle, IndexSet<PassHandle>>,
    sorted_passes: Vec<PassHandle>,

    /// Last-known state of each resource across the recorded frame.
    tracked_states: IndexMap<ResourceHandle, ResourceState>,

    images: IndexMap<ResourceHandle, ImageHandle>,
    buffers: IndexMap<ResourceHandle, BufferHandle>,
    programs: IndexMap<String, ShaderHandle>,

    cmds: IndexMap<PassHandle, CommandBuffer>,
    submits: Vec<SubmitInfo>,

    swapchain: Option<Arc<dyn Swapchain>>,
    frame_fence: Option<Fence>,
}

/// Owns all passes and resources of one frame slot and turns their
/// declarations into ordered, synchronized GPU submissions.
///
/// See the [module documentation](super) for the overall flow. The graph is
/// driven once per frame from a single thread:
///
/// 1. Declare or mutate passes ([`create_pass`](Self::create_pass),
///    [`configure_pass`](Self::configure_pass))
/// 2. [`build`](Self::build) rebuilds only what the dirty flags call for
/// 3. [`execute`](Self::execute) submits, and presents if a back buffer
///    and swapchain are bound
pub struct RenderGraph {
    device: Option<Arc<dyn Device>>,
    declare: DeclareData,
    build: BuildData,
    dirty: DirtyFlags,
}

impl RenderGraph {
    /// Create a graph recording against the given device.
    pub fn new(device: Arc<dyn Device>) -> Self {
        let frame_fence = device.acquire_fence(true);
        let mut graph = Self {
            device: Some(device),
            declare: DeclareData::default(),
            build: BuildData::default(),
            dirty: DirtyFlags::all(),
        };
        graph.build.frame_fence = Some(frame_fence);
        graph
    }

    /// Create a graph in dry-run mode.
    ///
    /// A dry-run graph performs dependency analysis, topological sorting and
    /// state-tracking bookkeeping without any device: useful for validating
    /// or exporting a graph on machines without a GPU.
    pub fn new_dry_run() -> Self {
        log::info!("created render graph in dry-run mode (no GPU operations)");
        Self {
            device: None,
            declare: DeclareData::default(),
            build: BuildData::default(),
            dirty: DirtyFlags::all(),
        }
    }

    /// True if this graph never touches a device.
    pub fn is_dry_run(&self) -> bool {
        self.device.is_none()
    }

    // ========================================================================
    // Declaration API
    // ========================================================================

    /// Create a new pass.
    ///
    /// # Panics
    ///
    /// Panics if a pass with this name already exists; duplicate pass names
    /// are a declaration bug.
    pub fn create_pass(&mut self, name: &str, queue_type: QueueType) -> PassHandle {
        assert!(
            !self.declare.pass_lookup.contains_key(name),
            "the pass '{name}' has already been created"
        );
        let handle = PassHandle(self.declare.passes.len() as u32);
        self.declare
            .passes
            .push(RenderPass::new(name.to_string(), queue_type));
        self.declare.pass_lookup.insert(name.to_string(), handle);
        self.mark_pass_modified();
        log::trace!(
            "created pass '{}' on {} queue",
            name,
            queue_type.label()
        );
        handle
    }

    /// Start configuring a pass's resources and callbacks.
    pub fn configure_pass(&mut self, pass: PassHandle) -> PassBuilder<'_> {
        PassBuilder { graph: self, pass }
    }

    /// Designate the resource presented at end of frame.
    pub fn set_back_buffer(&mut self, name: &str) {
        self.declare.back_buffer = Some(name.to_string());
        self.dirty |= DirtyFlags::BACK_BUFFER;
        log::trace!("back buffer set to '{}'", name);
    }

    /// Import an externally owned image under the given resource name.
    ///
    /// The resource is flagged [`ResourceFlags::EXTERNAL`]: the graph will
    /// never allocate or destroy it. Its tracked state starts as
    /// [`ResourceState::General`].
    pub fn import_image(&mut self, name: &str, image: ImageHandle) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Image);
        assert!(
            !self.build.images.contains_key(&res),
            "resource '{name}' already has a bound image"
        );
        self.build.images.insert(res, image);
        self.declare.resources[res.index()].add_flags(ResourceFlags::EXTERNAL);
        self.build.tracked_states.insert(res, ResourceState::General);
        self.dirty |= DirtyFlags::IMAGE_RESOURCE | DirtyFlags::TOPOLOGY;
        log::trace!("imported image resource '{}'", name);
        res
    }

    /// Import an externally owned buffer under the given resource name.
    ///
    /// Same ownership rules as [`import_image`](Self::import_image).
    pub fn import_buffer(&mut self, name: &str, buffer: BufferHandle) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Buffer);
        assert!(
            !self.build.buffers.contains_key(&res),
            "resource '{name}' already has a bound buffer"
        );
        self.build.buffers.insert(res, buffer);
        self.declare.resources[res.index()].add_flags(ResourceFlags::EXTERNAL);
        self.build.tracked_states.insert(res, ResourceState::General);
        self.dirty |= DirtyFlags::BUFFER_RESOURCE | DirtyFlags::TOPOLOGY;
        log::trace!("imported buffer resource '{}'", name);
        res
    }

    /// Import a resolved shader program under the given name.
    ///
    /// Record-list entries referring to `name` bind this program.
    pub fn import_shader(&mut self, name: &str, program: ShaderHandle) {
        self.build.programs.insert(name.to_string(), program);
        self.mark_pass_modified();
    }

    /// Tag a declared resource for cross-frame de-duplication.
    ///
    /// # Panics
    ///
    /// Panics if no resource with this name has been declared.
    pub fn mark_resource_as_shared(&mut self, name: &str) {
        let res = self
            .declare
            .resource_lookup
            .get(name)
            .copied()
            .unwrap_or_else(|| panic!("cannot share unknown resource '{name}'"));
        self.declare.resources[res.index()].add_flags(ResourceFlags::SHARED);
    }

    fn ensure_resource(&mut self, name: &str, kind: ResourceKind) -> ResourceHandle {
        if let Some(&existing) = self.declare.resource_lookup.get(name) {
            let existing_kind = self.declare.resources[existing.index()].kind();
            assert!(
                existing_kind == kind,
                "resource '{name}' is already declared as {existing_kind:?}, \
                 cannot redeclare it as {kind:?}"
            );
            return existing;
        }

        let handle = ResourceHandle(self.declare.resources.len() as u32);
        let resource = match kind {
            ResourceKind::Image => {
                self.dirty |= DirtyFlags::IMAGE_RESOURCE;
                PassResource::new_image(name.to_string())
            }
            ResourceKind::Buffer => {
                self.dirty |= DirtyFlags::BUFFER_RESOURCE;
                PassResource::new_buffer(name.to_string())
            }
        };
        self.declare.resources.push(resource);
        self.declare
            .resource_lookup
            .insert(name.to_string(), handle);
        self.dirty |= DirtyFlags::TOPOLOGY;
        log::trace!("created {:?} resource '{}'", kind, name);
        handle
    }

    pub(crate) fn add_texture_input(
        &mut self,
        pass: PassHandle,
        name: &str,
        source: ImageSource,
        usage: ImageUsage,
    ) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Image);
        let (state, access) = image_resource_state(usage, false);
        {
            let resource = &mut self.declare.resources[res.index()];
            resource.add_read_pass(pass);
            resource.add_image_usage(usage);
            resource.add_access(access);
        }
        let pass_data = &mut self.declare.passes[pass.index()];
        pass_data.texture_in.push(res);
        pass_data.target_states.insert(res, state);
        log::trace!("pass '{}' reads texture '{}'", pass_data.name, name);

        match source {
            ImageSource::None => {}
            ImageSource::Handle(image) => {
                self.import_image(name, image);
            }
            ImageSource::Load(info) => {
                assert!(
                    !self.declare.pending_image_loads.contains_key(name),
                    "a deferred load for '{name}' is already pending"
                );
                self.declare
                    .pending_image_loads
                    .insert(name.to_string(), info);
            }
        }

        self.mark_resources_changed(ResourceKind::Image);
        res
    }

    pub(crate) fn add_texture_output(
        &mut self,
        pass: PassHandle,
        name: &str,
        usage: ImageUsage,
    ) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Image);
        let (state, access) = image_resource_state(usage, true);
        {
            let resource = &mut self.declare.resources[res.index()];
            resource.add_write_pass(pass);
            resource.add_image_usage(usage);
            resource.add_access(access);
        }
        let pass_data = &mut self.declare.passes[pass.index()];
        pass_data.texture_out.push(res);
        pass_data.target_states.insert(res, state);
        log::trace!("pass '{}' writes texture '{}'", pass_data.name, name);

        self.mark_resources_changed(ResourceKind::Image);
        res
    }

    pub(crate) fn add_buffer_input(
        &mut self,
        pass: PassHandle,
        name: &str,
        source: BufferSource,
        usage: BufferUsage,
    ) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Buffer);
        let (state, access) = buffer_resource_state(usage, false);
        {
            let resource = &mut self.declare.resources[res.index()];
            resource.add_read_pass(pass);
            resource.add_buffer_usage(usage);
            resource.add_access(access);
        }
        let pass_data = &mut self.declare.passes[pass.index()];
        if usage.contains(BufferUsage::UNIFORM) {
            pass_data.uniform_buffer_in.push(res);
        } else if usage.contains(BufferUsage::STORAGE) {
            pass_data.storage_buffer_in.push(res);
        }
        pass_data.target_states.insert(res, state);
        log::trace!("pass '{}' reads buffer '{}'", pass_data.name, name);

        match source {
            BufferSource::None => {}
            BufferSource::Handle(buffer) => {
                self.import_buffer(name, buffer);
            }
            BufferSource::Load(info) => {
                assert!(
                    !self.declare.pending_buffer_loads.contains_key(name),
                    "a deferred load for '{name}' is already pending"
                );
                self.declare
                    .pending_buffer_loads
                    .insert(name.to_string(), info);
            }
        }

        self.mark_resources_changed(ResourceKind::Buffer);
        res
    }

    pub(crate) fn add_buffer_output(
        &mut self,
        pass: PassHandle,
        name: &str,
        usage: BufferUsage,
    ) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Buffer);
        let (state, access) = buffer_resource_state(usage, true);
        {
            let resource = &mut self.declare.resources[res.index()];
            resource.add_write_pass(pass);
            resource.add_buffer_usage(usage);
            resource.add_access(access);
        }
        let pass_data = &mut self.declare.passes[pass.index()];
        if usage.contains(BufferUsage::STORAGE) {
            pass_data.storage_buffer_out.push(res);
        }
        pass_data.target_states.insert(res, state);
        log::trace!("pass '{}' writes buffer '{}'", pass_data.name, name);

        self.mark_resources_changed(ResourceKind::Buffer);
        res
    }

    pub(crate) fn set_color_output(
        &mut self,
        pass: PassHandle,
        name: &str,
        info: AttachmentInfo,
    ) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Image);
        {
            let resource = &mut self.declare.resources[res.index()];
            resource.set_attachment(info);
            resource.add_write_pass(pass);
            resource.add_image_usage(ImageUsage::COLOR_ATTACHMENT);
        }
        let pass_data = &mut self.declare.passes[pass.index()];
        pass_data.color_out.push(res);
        pass_data
            .target_states
            .insert(res, ResourceState::RenderTarget);
        log::trace!("pass '{}' writes color output '{}'", pass_data.name, name);

        self.mark_resources_changed(ResourceKind::Image);
        res
    }

    pub(crate) fn set_depth_stencil_output(
        &mut self,
        pass: PassHandle,
        name: &str,
        info: AttachmentInfo,
    ) -> ResourceHandle {
        let res = self.ensure_resource(name, ResourceKind::Image);
        {
            let resource = &mut self.declare.resources[res.index()];
            resource.set_attachment(info);
            resource.add_write_pass(pass);
            resource.add_image_usage(ImageUsage::DEPTH_STENCIL);
        }
        let pass_data = &mut self.declare.passes[pass.index()];
        pass_data.depth_out = Some(res);
        pass_data
            .target_states
            .insert(res, ResourceState::DepthStencil);
        log::trace!("pass '{}' writes depth output '{}'", pass_data.name, name);

        self.mark_resources_changed(ResourceKind::Image);
        res
    }

    pub(crate) fn set_pass_execute(&mut self, pass: PassHandle, callback: ExecuteCallback) {
        self.declare.passes[pass.index()].set_execute(callback);
        self.mark_pass_modified();
    }

    pub(crate) fn add_pass_record(
        &mut self,
        pass: PassHandle,
        shader_name: &str,
        load_info: ShaderLoadInfo,
        callback: ExecuteCallback,
    ) {
        if !self.build.programs.contains_key(shader_name) {
            self.declare
                .pending_shader_loads
                .entry(shader_name.to_string())
                .or_insert(load_info);
        }
        self.declare.passes[pass.index()].add_record(shader_name.to_string(), callback);
        self.mark_pass_modified();
    }

    pub(crate) fn reset_pass_commands(&mut self, pass: PassHandle) {
        self.declare.passes[pass.index()].reset_commands();
        self.mark_pass_modified();
    }

    pub(crate) fn set_pass_condition(&mut self, pass: PassHandle, predicate: ExecutionPredicate) {
        let pass_data = &mut self.declare.passes[pass.index()];
        pass_data.execution_mode = ExecutionMode::Conditional;
        pass_data.condition = Some(predicate);
        self.mark_pass_modified();
    }

    pub(crate) fn set_pass_culled(&mut self, pass: PassHandle, culled: bool) {
        self.declare.passes[pass.index()].execution_mode = if culled {
            ExecutionMode::Culled
        } else {
            ExecutionMode::Always
        };
        self.mark_pass_modified();
    }

    fn mark_pass_modified(&mut self) {
        self.dirty |= DirtyFlags::PASS | DirtyFlags::TOPOLOGY;
    }

    fn mark_resources_changed(&mut self, kind: ResourceKind) {
        self.dirty |= match kind {
            ResourceKind::Image => DirtyFlags::IMAGE_RESOURCE,
            ResourceKind::Buffer => DirtyFlags::BUFFER_RESOURCE,
        };
        self.dirty |= DirtyFlags::TOPOLOGY;
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Look up a pass by name. Misses are logged and return `None`.
    pub fn pass_handle(&self, name: &str) -> Option<PassHandle> {
        let handle = self.declare.pass_lookup.get(name).copied();
        if handle.is_none() {
            log::error!("could not find the pass '{}'", name);
        }
        handle
    }

    /// Look up a resource by name. Misses are logged and return `None`.
    pub fn resource_handle(&self, name: &str) -> Option<ResourceHandle> {
        let handle = self.declare.resource_lookup.get(name).copied();
        if handle.is_none() {
            log::error!("could not find the pass resource '{}'", name);
        }
        handle
    }

    /// Access a pass by handle.
    pub fn pass(&self, handle: PassHandle) -> &RenderPass {
        &self.declare.passes[handle.index()]
    }

    /// Access a resource by handle.
    pub fn resource(&self, handle: ResourceHandle) -> &PassResource {
        &self.declare.resources[handle.index()]
    }

    /// The concrete image bound to a named resource, if any.
    pub fn image(&self, name: &str) -> Option<ImageHandle> {
        let res = self.resource_handle(name)?;
        let image = self.build.images.get(&res).copied();
        if image.is_none() {
            log::error!("resource '{}' has no bound image", name);
        }
        image
    }

    /// The concrete buffer bound to a named resource, if any.
    pub fn buffer(&self, name: &str) -> Option<BufferHandle> {
        let res = self.resource_handle(name)?;
        let buffer = self.build.buffers.get(&res).copied();
        if buffer.is_none() {
            log::error!("resource '{}' has no bound buffer", name);
        }
        buffer
    }

    /// A named resource's last-known state, if it is tracked.
    pub fn tracked_state(&self, name: &str) -> Option<ResourceState> {
        let res = self.declare.resource_lookup.get(name)?;
        self.build.tracked_states.get(res).copied()
    }

    /// Passes in execution order, valid after [`build`](Self::build).
    pub fn sorted_passes(&self) -> &[PassHandle] {
        &self.build.sorted_passes
    }

    /// Names of the passes in execution order.
    pub fn sorted_pass_names(&self) -> Vec<&str> {
        self.build
            .sorted_passes
            .iter()
            .map(|&handle| self.declare.passes[handle.index()].name.as_str())
            .collect()
    }

    /// The command buffer recorded for a pass, valid after a device-mode
    /// build.
    pub fn command_buffer(&self, pass: PassHandle) -> Option<&CommandBuffer> {
        self.build.cmds.get(&pass)
    }

    /// Number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.declare.passes.len()
    }

    /// Number of declared resources.
    pub fn resource_count(&self) -> usize {
        self.declare.resources.len()
    }

    /// The fence signaled when this graph's last submission retires.
    pub fn frame_fence(&self) -> Option<Fence> {
        self.build.frame_fence.clone()
    }

    // Pending-load access for the frame composer.

    pub(crate) fn pending_image_loads(&self) -> &IndexMap<String, ImageLoadInfo> {
        &self.declare.pending_image_loads
    }

    pub(crate) fn pending_buffer_loads(&self) -> &IndexMap<String, BufferLoadInfo> {
        &self.declare.pending_buffer_loads
    }

    pub(crate) fn pending_shader_loads(&self) -> &IndexMap<String, ShaderLoadInfo> {
        &self.declare.pending_shader_loads
    }

    pub(crate) fn has_pending_loads(&self) -> bool {
        !self.declare.pending_image_loads.is_empty()
            || !self.declare.pending_buffer_loads.is_empty()
            || !self.declare.pending_shader_loads.is_empty()
    }

    pub(crate) fn clear_pending_loads(&mut self) {
        self.declare.pending_image_loads.clear();
        self.declare.pending_buffer_loads.clear();
        self.declare.pending_shader_loads.clear();
    }

    pub(crate) fn has_image_binding(&self, name: &str) -> bool {
        self.declare
            .resource_lookup
            .get(name)
            .is_some_and(|res| self.build.images.contains_key(res))
    }

    pub(crate) fn has_buffer_binding(&self, name: &str) -> bool {
        self.declare
            .resource_lookup
            .get(name)
            .is_some_and(|res| self.build.buffers.contains_key(res))
    }

    pub(crate) fn has_shader_binding(&self, name: &str) -> bool {
        self.build.programs.contains_key(name)
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Rebuild derived state: dependency graph, pass order, attachment
    /// allocations, barriers and recorded commands.
    ///
    /// Only the categories marked dirty since the last build are redone; a
    /// build with nothing dirty is a no-op. Passing a different swapchain
    /// than last time marks the swapchain category dirty.
    ///
    /// # Panics
    ///
    /// Panics if the declared dependencies contain a cycle: the graph is
    /// purely declaration-derived, so a cycle is a declaration bug, not a
    /// runtime condition.
    pub fn build(
        &mut self,
        swapchain: Option<&Arc<dyn Swapchain>>,
    ) -> Result<(), GraphicsError> {
        if !self.is_dry_run() {
            let changed = match (&self.build.swapchain, swapchain) {
                (None, None) => false,
                (Some(current), Some(new)) => !Arc::ptr_eq(current, new),
                _ => true,
            };
            if changed {
                self.build.swapchain = swapchain.cloned();
                self.dirty |= DirtyFlags::SWAP_CHAIN;
            }
        }

        if self.dirty.is_empty() {
            return Ok(());
        }

        if self
            .dirty
            .intersects(DirtyFlags::TOPOLOGY | DirtyFlags::PASS)
        {
            self.rebuild_topology();
        }

        if self.is_dry_run() {
            // Initialize state tracking so dry-run graphs observe the same
            // bookkeeping as device graphs.
            for index in 0..self.declare.resources.len() {
                self.build
                    .tracked_states
                    .entry(ResourceHandle(index as u32))
                    .or_insert(ResourceState::Undefined);
            }
            log::info!("dry run: generated execution order:");
            for (i, &handle) in self.build.sorted_passes.iter().enumerate() {
                log::info!(
                    "dry run: {}. {}",
                    i + 1,
                    self.declare.passes[handle.index()].name
                );
            }
        } else {
            if self.dirty.intersects(
                DirtyFlags::IMAGE_RESOURCE
                    | DirtyFlags::BUFFER_RESOURCE
                    | DirtyFlags::PASS
                    | DirtyFlags::BACK_BUFFER
                    | DirtyFlags::SWAP_CHAIN,
            ) {
                self.materialize_resources()?;
            }

            if self.dirty.intersects(
                DirtyFlags::PASS
                    | DirtyFlags::IMAGE_RESOURCE
                    | DirtyFlags::BUFFER_RESOURCE
                    | DirtyFlags::TOPOLOGY
                    | DirtyFlags::SWAP_CHAIN,
            ) {
                self.record_commands();
            }
        }

        self.dirty = DirtyFlags::empty();
        Ok(())
    }

    /// Derive the dependency graph from resource readers/writers and sort it.
    fn rebuild_topology(&mut self) {
        self.build.submits.clear();
        self.build.sorted_passes.clear();
        self.build.tracked_states.clear();
        self.build.adjacency.clear();

        for index in 0..self.declare.passes.len() {
            self.build
                .adjacency
                .insert(PassHandle(index as u32), IndexSet::new());
        }

        // A reader must run after every writer of the same resource.
        for resource in &self.declare.resources {
            for &reader in resource.read_passes() {
                for &writer in resource.write_passes() {
                    if reader != writer {
                        self.build.adjacency[&reader].insert(writer);
                        log::debug!(
                            "'{}' depends on '{}' (resource: '{}')",
                            self.declare.passes[reader.index()].name,
                            self.declare.passes[writer.index()].name,
                            resource.name()
                        );
                    }
                }
            }
        }

        if self.build.adjacency.is_empty() {
            log::warn!("render graph is empty");
        }

        // Kahn's algorithm. A pass's in-degree is its unresolved dependency
        // count; passes become ready once every dependency is sorted.
        let mut in_degree: IndexMap<PassHandle, usize> = self
            .build
            .adjacency
            .iter()
            .map(|(&handle, deps)| (handle, deps.len()))
            .collect();

        let mut queue: VecDeque<PassHandle> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&handle, _)| handle)
            .collect();

        while let Some(ready) = queue.pop_front() {
            self.build.sorted_passes.push(ready);

            for (&dependent, deps) in &self.build.adjacency {
                if deps.contains(&ready) {
                    let degree = in_degree.get_mut(&dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        assert!(
            self.build.sorted_passes.len() == self.build.adjacency.len(),
            "cycle detected in the render graph"
        );
    }

    /// Allocate or reuse concrete images for attachments and seed state
    /// tracking for buffer resources.
    fn materialize_resources(&mut self) -> Result<(), GraphicsError> {
        let order = self.build.sorted_passes.clone();
        for &pass_handle in &order {
            if !self.build.cmds.contains_key(&pass_handle) {
                let device = self.device.as_ref().unwrap();
                let queue_type = self.declare.passes[pass_handle.index()].queue_type;
                self.build
                    .cmds
                    .insert(pass_handle, device.command_allocator().acquire(queue_type));
            }

            let pass = &self.declare.passes[pass_handle.index()];
            let color_out: SmallVec<[ResourceHandle; 4]> = pass.color_out.clone();
            let depth_out = pass.depth_out;
            let buffer_res: SmallVec<[ResourceHandle; 8]> = pass
                .storage_buffer_in
                .iter()
                .chain(pass.uniform_buffer_in.iter())
                .chain(pass.storage_buffer_out.iter())
                .copied()
                .collect();

            for res in color_out {
                self.setup_image_resource(res, true)?;
            }
            if let Some(res) = depth_out {
                self.setup_image_resource(res, false)?;
            }

            for res in buffer_res {
                self.build
                    .tracked_states
                    .entry(res)
                    .or_insert(ResourceState::Undefined);
            }
        }
        Ok(())
    }

    /// Create (or recreate) the device image backing an attachment.
    ///
    /// External resources are never allocated here; their handle was bound
    /// at import time.
    fn setup_image_resource(
        &mut self,
        res: ResourceHandle,
        is_color_attachment: bool,
    ) -> Result<(), GraphicsError> {
        let resource = &self.declare.resources[res.index()];
        let external = resource.has_flag(ResourceFlags::EXTERNAL);

        let mut needs_rebuild = !self.build.images.contains_key(&res);
        if self.dirty.intersects(DirtyFlags::IMAGE_RESOURCE) && !external {
            needs_rebuild = true;
        }
        if !needs_rebuild || external {
            return Ok(());
        }

        if let Some(&old) = self.build.images.get(&res) {
            self.device.as_ref().unwrap().destroy_image(old);
        }

        let attachment = resource
            .attachment()
            .unwrap_or_else(|| panic!("attachment '{}' has no create info", resource.name()));
        let mut info = attachment.create_info;
        info.usage = resource.image_usage();

        // A color target that may be presented also needs to be a copy
        // source for the swapchain hand-off.
        if is_color_attachment {
            if let Some(back_buffer) = &self.declare.back_buffer {
                if self.declare.resource_lookup.contains_key(back_buffer) {
                    info.usage |= ImageUsage::TRANSFER_SRC;
                }
            }
        }

        let name = resource.name().to_string();
        let image = self
            .device
            .as_ref()
            .unwrap()
            .create_image(&info, &name)?;
        self.build.images.insert(res, image);
        self.build
            .tracked_states
            .insert(res, ResourceState::Undefined);
        Ok(())
    }

    /// Record every pass's command buffer and collect the frame's submits.
    fn record_commands(&mut self) {
        if let Some(fence) = &self.build.frame_fence {
            fence.wait();
        }

        self.build.submits.clear();

        let Self {
            declare, build, ..
        } = self;

        let order = build.sorted_passes.clone();
        for &pass_handle in &order {
            let pass = &mut declare.passes[pass_handle.index()];
            let resources = &declare.resources;

            let mut init_barriers: SmallVec<[ImageBarrier; 4]> = SmallVec::new();
            let mut rendering = RenderingInfo::default();

            for &res in &pass.color_out {
                let attachment = resources[res.index()]
                    .attachment()
                    .expect("color output without attachment info");
                if let Some(&image) = build.images.get(&res) {
                    rendering.colors.push(RenderingAttachment {
                        image,
                        load_op: attachment.load_op,
                        store_op: attachment.store_op,
                        clear_value: attachment.clear_value,
                    });
                    let current = build
                        .tracked_states
                        .get(&res)
                        .copied()
                        .unwrap_or(ResourceState::Undefined);
                    init_barriers.push(ImageBarrier {
                        image,
                        current_state: current,
                        new_state: ResourceState::RenderTarget,
                    });
                    build
                        .tracked_states
                        .insert(res, ResourceState::RenderTarget);
                }
            }

            if let Some(res) = pass.depth_out {
                let attachment = resources[res.index()]
                    .attachment()
                    .expect("depth output without attachment info");
                if let Some(&image) = build.images.get(&res) {
                    rendering.depth = Some(RenderingAttachment {
                        image,
                        load_op: attachment.load_op,
                        store_op: attachment.store_op,
                        clear_value: attachment.clear_value,
                    });
                    let current = build
                        .tracked_states
                        .get(&res)
                        .copied()
                        .unwrap_or(ResourceState::Undefined);
                    init_barriers.push(ImageBarrier {
                        image,
                        current_state: current,
                        new_state: ResourceState::DepthStencil,
                    });
                    build
                        .tracked_states
                        .insert(res, ResourceState::DepthStencil);
                }
            }

            // Hazard barriers: transition a resource only when its tracked
            // state differs from what this pass requires.
            let mut image_barriers: SmallVec<[ImageBarrier; 8]> = SmallVec::new();
            let mut buffer_barriers: SmallVec<[BufferBarrier; 8]> = SmallVec::new();

            for &res in &pass.texture_in {
                let target = pass.target_states[&res];
                let current = build
                    .tracked_states
                    .get(&res)
                    .copied()
                    .unwrap_or(ResourceState::Undefined);
                if current == target {
                    continue;
                }
                if let Some(&image) = build.images.get(&res) {
                    image_barriers.push(ImageBarrier {
                        image,
                        current_state: current,
                        new_state: target,
                    });
                    build.tracked_states.insert(res, target);
                } else {
                    log::warn!(
                        "texture '{}' has no bound image; barrier skipped",
                        resources[res.index()].name()
                    );
                }
            }

            for &res in pass
                .storage_buffer_in
                .iter()
                .chain(pass.uniform_buffer_in.iter())
            {
                let target = pass.target_states[&res];
                let current = build
                    .tracked_states
                    .get(&res)
                    .copied()
                    .unwrap_or(ResourceState::Undefined);
                if current == target {
                    continue;
                }
                if let Some(&buffer) = build.buffers.get(&res) {
                    buffer_barriers.push(BufferBarrier {
                        buffer,
                        current_state: current,
                        new_state: target,
                    });
                    build.tracked_states.insert(res, target);
                } else {
                    log::warn!(
                        "buffer '{}' has no bound handle; barrier skipped",
                        resources[res.index()].name()
                    );
                }
            }

            let cmd = build.cmds.get_mut(&pass_handle).unwrap();
            cmd.reset();
            cmd.begin();
            cmd.insert_barriers(&[], &init_barriers);
            cmd.insert_debug_label(&pass.name);
            cmd.insert_barriers(&buffer_barriers, &image_barriers);
            cmd.begin_rendering(rendering);

            if pass.should_execute() {
                if let Some(callback) = pass.execute.as_mut() {
                    callback(cmd);
                } else if !pass.record_list.is_empty() {
                    for entry in &mut pass.record_list {
                        let program =
                            build.programs.get(&entry.shader).copied().unwrap_or_else(|| {
                                panic!(
                                    "shader program '{}' for pass '{}' has not been resolved",
                                    entry.shader, pass.name
                                )
                            });
                        cmd.set_program(program);
                        (entry.callback)(cmd);
                    }
                } else {
                    panic!("pass '{}' has no execute callback", pass.name);
                }
            }

            cmd.end_rendering();
            cmd.end();

            build.submits.push(SubmitInfo {
                command_buffers: smallvec![cmd.id()],
                wait_semaphores: Vec::new(),
                signal_semaphores: Vec::new(),
            });
        }
    }

    // ========================================================================
    // Execute
    // ========================================================================

    /// Submit the recorded frame and present the back buffer.
    ///
    /// Waits for this graph's previous submission to retire before reusing
    /// its fence, submits every collected batch to the graphics queue, then
    /// presents the declared back buffer if a swapchain is bound.
    pub fn execute(&mut self) -> Result<(), GraphicsError> {
        if self.is_dry_run() {
            log::info!("dry run: executing render graph simulation");
            for &handle in &self.build.sorted_passes {
                log::info!(
                    "dry run: executing pass '{}'",
                    self.declare.passes[handle.index()].name
                );
            }
            if let Some(back_buffer) = &self.declare.back_buffer {
                log::info!("dry run: presenting back buffer '{}'", back_buffer);
            }
            return Ok(());
        }

        let device = self.device.as_ref().unwrap();
        if self.build.frame_fence.is_none() {
            self.build.frame_fence = Some(device.acquire_fence(true));
        }
        let fence = self.build.frame_fence.as_ref().unwrap();
        fence.wait();
        fence.reset();

        let queue = device.queue(QueueType::Graphics);
        queue
            .submit(&self.build.submits, fence)
            .map_err(|err| {
                log::error!("frame submission failed: {err}");
                err
            })?;

        if let Some(swapchain) = self.build.swapchain.clone() {
            if let Some(back_buffer) = self.declare.back_buffer.clone() {
                match self.declare.resource_lookup.get(&back_buffer) {
                    Some(&res) => {
                        self.build.tracked_states.insert(res, ResourceState::Present);
                        if let Some(&image) = self.build.images.get(&res) {
                            swapchain.present_image(&[], image)?;
                        } else {
                            log::warn!(
                                "back buffer '{}' has no bound image; present skipped",
                                back_buffer
                            );
                        }
                    }
                    None => {
                        log::error!(
                            "back buffer '{}' is not a declared resource",
                            back_buffer
                        );
                    }
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Destroy graph-owned GPU resources and clear all declarations.
    ///
    /// External (imported) resources are never destroyed here. Called
    /// automatically on drop.
    pub fn cleanup(&mut self) {
        if let Some(device) = &self.device {
            for (index, resource) in self.declare.resources.iter().enumerate() {
                if resource.has_flag(ResourceFlags::EXTERNAL) {
                    continue;
                }
                let handle = ResourceHandle(index as u32);
                match resource.kind() {
                    ResourceKind::Image => {
                        if let Some(&image) = self.build.images.get(&handle) {
                            device.destroy_image(image);
                        }
                    }
                    ResourceKind::Buffer => {
                        if let Some(&buffer) = self.build.buffers.get(&handle) {
                            device.destroy_buffer(buffer);
                        }
                    }
                }
            }

            for (_, cmd) in self.build.cmds.drain(..) {
                device.command_allocator().release(cmd);
            }

            if let Some(fence) = self.build.frame_fence.take() {
                device.release_fence(fence);
            }
        }

        self.declare = DeclareData::default();
        self.build.adjacency.clear();
        self.build.sorted_passes.clear();
        self.build.tracked_states.clear();
        self.build.images.clear();
        self.build.buffers.clear();
        self.build.programs.clear();
        self.build.submits.clear();
        self.dirty = DirtyFlags::all();

        log::trace!("cleaned up render graph");
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Export the declared graph as Graphviz DOT.
    ///
    /// Nodes are passes colored by queue type; edges are writer-to-reader
    /// resource dependencies colored by resource kind.
    pub fn export_graphviz(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph \"RenderGraph\" {\n");
        dot.push_str("    rankdir=LR;\n");
        dot.push_str("    fontname=\"Arial\";\n");
        dot.push_str("    node [shape=box, style=filled, fontname=\"Arial\"];\n");

        for (name, &handle) in &self.declare.pass_lookup {
            let pass = &self.declare.passes[handle.index()];
            let (fill, border) = match pass.queue_type {
                QueueType::Graphics => ("#A3D977", "#2D6016"),
                QueueType::Compute => ("#7891D0", "#1A337E"),
                QueueType::Transfer => ("#E8C477", "#8E6516"),
            };
            let _ = writeln!(
                dot,
                "    \"{}\" [fillcolor=\"{}\", color=\"{}\", label=\"{}\\n({})\"];",
                name,
                fill,
                border,
                name,
                pass.queue_type.label()
            );
        }

        for (res_name, &res) in &self.declare.resource_lookup {
            let resource = &self.declare.resources[res.index()];
            let color = match resource.kind() {
                ResourceKind::Image => "#4285F4",
                ResourceKind::Buffer => "#EA4335",
            };
            for &writer in resource.write_passes() {
                for &reader in resource.read_passes() {
                    if writer == reader {
                        continue;
                    }
                    let _ = writeln!(
                        dot,
                        "    \"{}\" -> \"{}\" [label=\"{}\", color=\"{}\"];",
                        self.declare.passes[writer.index()].name,
                        self.declare.passes[reader.index()].name,
                        res_name,
                        color
                    );
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("dry_run", &self.is_dry_run())
            .field("passes", &self.declare.passes.len())
            .field("resources", &self.declare.resources.len())
            .field("sorted_passes", &self.build.sorted_passes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, DummyDevice, DummySwapchain};
    use crate::types::Format;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn device() -> Arc<DummyDevice> {
        Arc::new(DummyDevice::new())
    }

    /// Shadow -> lighting -> present chain with "sceneColor" as back buffer.
    fn declare_scene(graph: &mut RenderGraph) {
        let shadow = graph.create_pass("shadow", QueueType::Graphics);
        graph
            .configure_pass(shadow)
            .color_output("shadowmap", AttachmentInfo::color(1024, 1024, Format::R32Float))
            .execute(|cmd| cmd.draw(3, 1));

        let lighting = graph.create_pass("lighting", QueueType::Graphics);
        graph
            .configure_pass(lighting)
            .texture_input("shadowmap", ImageSource::None, ImageUsage::SAMPLED)
            .color_output(
                "sceneColor",
                AttachmentInfo::color(800, 600, Format::Rgba16Float),
            )
            .execute(|cmd| cmd.draw(3, 1));

        let present = graph.create_pass("present", QueueType::Graphics);
        graph
            .configure_pass(present)
            .texture_input("sceneColor", ImageSource::None, ImageUsage::SAMPLED)
            .execute(|cmd| cmd.draw(3, 1));

        graph.set_back_buffer("sceneColor");
    }

    fn position(names: &[&str], name: &str) -> usize {
        names
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("pass '{name}' missing from sorted order"))
    }

    fn image_barriers_for(cmd: &CommandBuffer, image: ImageHandle) -> usize {
        cmd.commands()
            .iter()
            .map(|command| match command {
                Command::Barriers { images, .. } => {
                    images.iter().filter(|b| b.image == image).count()
                }
                _ => 0,
            })
            .sum()
    }

    fn records_draw(cmd: &CommandBuffer) -> bool {
        cmd.commands()
            .iter()
            .any(|command| matches!(command, Command::Draw { .. }))
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let mut graph = RenderGraph::new(device());
        declare_scene(&mut graph);
        graph.build(None).unwrap();

        let names = graph.sorted_pass_names();
        assert_eq!(names.len(), 3);
        assert!(position(&names, "shadow") < position(&names, "lighting"));
        assert!(position(&names, "lighting") < position(&names, "present"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let device = device();
        let swapchain: Arc<dyn Swapchain> = Arc::new(DummySwapchain::new(800, 600));
        let mut graph = RenderGraph::new(device.clone());
        declare_scene(&mut graph);

        graph.build(Some(&swapchain)).unwrap();
        let first_order: Vec<String> = graph
            .sorted_pass_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let allocated = device.images_created();

        // No declarations in between: the second build must be a no-op.
        graph.build(Some(&swapchain)).unwrap();
        let second_order: Vec<String> = graph
            .sorted_pass_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(first_order, second_order);
        assert_eq!(device.images_created(), allocated);
    }

    #[test]
    fn test_execute_presents_back_buffer() {
        let device = device();
        let swapchain = Arc::new(DummySwapchain::new(800, 600));
        let sc: Arc<dyn Swapchain> = swapchain.clone();
        let mut graph = RenderGraph::new(device.clone());
        declare_scene(&mut graph);

        graph.build(Some(&sc)).unwrap();
        graph.execute().unwrap();

        assert_eq!(
            graph.tracked_state("sceneColor"),
            Some(ResourceState::Present)
        );
        let scene_color = graph.image("sceneColor").unwrap();
        assert_eq!(swapchain.presented(), vec![scene_color]);
        assert_eq!(device.dummy_queue().submit_count(), 1);
        assert_eq!(device.dummy_queue().submitted_batches(), vec![3]);
    }

    #[test]
    fn test_execute_without_swapchain_does_not_present() {
        let device = device();
        let mut graph = RenderGraph::new(device.clone());
        declare_scene(&mut graph);

        graph.build(None).unwrap();
        graph.execute().unwrap();

        assert_ne!(
            graph.tracked_state("sceneColor"),
            Some(ResourceState::Present)
        );
        assert_eq!(device.dummy_queue().presented(), vec![]);
    }

    #[test]
    fn test_back_buffer_color_targets_gain_transfer_src() {
        let device = device();
        let mut graph = RenderGraph::new(device.clone());
        declare_scene(&mut graph);
        graph.build(None).unwrap();

        let infos = device.created_image_infos();
        let (_, scene_color) = infos
            .iter()
            .find(|(name, _)| name == "sceneColor")
            .expect("sceneColor allocated");
        assert!(scene_color.usage.contains(ImageUsage::TRANSFER_SRC));
    }

    #[test]
    #[should_panic(expected = "cycle detected")]
    fn test_cycle_detection_fails_fast() {
        let mut graph = RenderGraph::new_dry_run();

        let a = graph.create_pass("a", QueueType::Graphics);
        graph
            .configure_pass(a)
            .texture_output("x", ImageUsage::STORAGE)
            .texture_input("y", ImageSource::None, ImageUsage::STORAGE);

        let b = graph.create_pass("b", QueueType::Graphics);
        graph
            .configure_pass(b)
            .texture_output("y", ImageUsage::STORAGE)
            .texture_input("x", ImageSource::None, ImageUsage::STORAGE);

        let _ = graph.build(None);
    }

    #[test]
    #[should_panic(expected = "already declared as")]
    fn test_resource_type_conflict_fails_fast() {
        let mut graph = RenderGraph::new_dry_run();

        let p1 = graph.create_pass("p1", QueueType::Graphics);
        graph
            .configure_pass(p1)
            .texture_output("noise", ImageUsage::STORAGE);

        // Same name, conflicting kind: must never return a wrongly typed
        // resource.
        let p2 = graph.create_pass("p2", QueueType::Compute);
        graph
            .configure_pass(p2)
            .buffer_output("noise", BufferUsage::STORAGE);
    }

    #[test]
    #[should_panic(expected = "already been created")]
    fn test_duplicate_pass_name_fails_fast() {
        let mut graph = RenderGraph::new_dry_run();
        graph.create_pass("gbuffer", QueueType::Graphics);
        graph.create_pass("gbuffer", QueueType::Graphics);
    }

    #[test]
    #[should_panic(expected = "mutually exclusive")]
    fn test_execute_and_record_list_are_mutually_exclusive() {
        let mut graph = RenderGraph::new_dry_run();
        let pass = graph.create_pass("post", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .execute(|_cmd| {})
            .shader(
                "tonemap",
                crate::loader::ShaderLoadInfo::new("shaders/tonemap.slang"),
                |_cmd| {},
            );
    }

    #[test]
    fn test_barriers_emitted_only_on_state_change() {
        let device = device();
        let mut graph = RenderGraph::new(device.clone());

        let env = ImageHandle::from_raw(999);
        graph.import_image("env", env);

        let a = graph.create_pass("a", QueueType::Graphics);
        graph
            .configure_pass(a)
            .texture_input("env", ImageSource::None, ImageUsage::SAMPLED)
            .color_output("colorA", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1));

        let b = graph.create_pass("b", QueueType::Graphics);
        graph
            .configure_pass(b)
            .texture_input("env", ImageSource::None, ImageUsage::SAMPLED)
            .texture_input("colorA", ImageSource::None, ImageUsage::SAMPLED)
            .color_output("colorB", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1));

        graph.build(None).unwrap();

        let pass_a = graph.pass_handle("a").unwrap();
        let pass_b = graph.pass_handle("b").unwrap();

        // Pass a transitions env General -> ShaderResource.
        let cmd_a = graph.command_buffer(pass_a).unwrap();
        assert_eq!(image_barriers_for(cmd_a, env), 1);

        // Pass b needs env in the state it is already in: no barrier.
        let cmd_b = graph.command_buffer(pass_b).unwrap();
        assert_eq!(image_barriers_for(cmd_b, env), 0);

        // colorA moves RenderTarget -> ShaderResource for pass b.
        let color_a = graph.image("colorA").unwrap();
        assert_eq!(image_barriers_for(cmd_b, color_a), 1);
    }

    #[test]
    fn test_external_resource_never_destroyed() {
        let device = device();
        let mut graph = RenderGraph::new(device.clone());

        let env = ImageHandle::from_raw(77);
        graph.import_image("env", env);

        let pass = graph.create_pass("draw", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .texture_input("env", ImageSource::None, ImageUsage::SAMPLED)
            .color_output("color", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1));

        graph.build(None).unwrap();
        let owned = graph.image("color").unwrap();

        graph.cleanup();

        let destroyed = device.destroyed_images();
        assert!(destroyed.contains(&owned));
        assert!(!destroyed.contains(&env));
        assert_eq!(device.fences_released(), device.fences_acquired());
    }

    #[test]
    fn test_empty_graph_is_a_noop() {
        let device = device();
        let mut graph = RenderGraph::new(device.clone());

        graph.build(None).unwrap();
        graph.execute().unwrap();

        assert!(graph.sorted_passes().is_empty());
        assert_eq!(device.dummy_queue().submitted_batches(), vec![0]);
        assert_eq!(device.images_created(), 0);
    }

    #[test]
    fn test_culled_pass_records_no_commands() {
        let device = device();
        let mut graph = RenderGraph::new(device);

        let pass = graph.create_pass("debug-overlay", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .color_output("overlay", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1))
            .set_culled(true);

        graph.build(None).unwrap();

        let handle = graph.pass_handle("debug-overlay").unwrap();
        assert!(!graph.pass(handle).should_execute());
        assert!(!records_draw(graph.command_buffer(handle).unwrap()));
    }

    #[test]
    fn test_conditional_pass_evaluates_predicate_at_record_time() {
        let device = device();
        let mut graph = RenderGraph::new(device);

        let enabled = Arc::new(AtomicBool::new(false));
        let pass = graph.create_pass("optional", QueueType::Graphics);
        let flag = enabled.clone();
        graph
            .configure_pass(pass)
            .color_output("out", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1))
            .execution_condition(move || flag.load(Ordering::Relaxed));

        graph.build(None).unwrap();
        let handle = graph.pass_handle("optional").unwrap();
        assert!(!records_draw(graph.command_buffer(handle).unwrap()));

        // Flip the flag and re-declare the condition: the predicate is
        // consulted again during the rebuild, never cached.
        enabled.store(true, Ordering::Relaxed);
        let flag = enabled.clone();
        graph
            .configure_pass(handle)
            .execution_condition(move || flag.load(Ordering::Relaxed));
        graph.build(None).unwrap();
        assert!(records_draw(graph.command_buffer(handle).unwrap()));
    }

    #[test]
    fn test_shader_record_list_binds_program() {
        let device = device();
        let mut graph = RenderGraph::new(device);

        let program = ShaderHandle::from_raw(5);
        graph.import_shader("tonemap", program);

        let pass = graph.create_pass("post", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .color_output("ldr", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .shader(
                "tonemap",
                crate::loader::ShaderLoadInfo::new("shaders/tonemap.slang"),
                |cmd| cmd.draw(3, 1),
            );

        graph.build(None).unwrap();

        let handle = graph.pass_handle("post").unwrap();
        let cmd = graph.command_buffer(handle).unwrap();
        assert!(cmd
            .commands()
            .iter()
            .any(|command| matches!(command, Command::SetProgram(p) if p.raw() == 5)));
        assert!(records_draw(cmd));
    }

    #[test]
    fn test_declaration_after_build_triggers_reallocation() {
        let device = device();
        let mut graph = RenderGraph::new(device.clone());
        declare_scene(&mut graph);
        graph.build(None).unwrap();
        let allocated = device.images_created();

        // A new image declaration marks the image category dirty; owned
        // attachments are recreated on the next build.
        let blur = graph.create_pass("blur", QueueType::Compute);
        graph
            .configure_pass(blur)
            .texture_input("sceneColor", ImageSource::None, ImageUsage::SAMPLED)
            .texture_output("blurred", ImageUsage::STORAGE)
            .execute(|cmd| cmd.dispatch(8, 8, 1));

        graph.build(None).unwrap();
        assert!(device.images_created() > allocated);
        assert!(!device.destroyed_images().is_empty());
    }

    #[test]
    fn test_dry_run_builds_topology_without_device() {
        let mut graph = RenderGraph::new_dry_run();
        declare_scene(&mut graph);
        graph.build(None).unwrap();
        graph.execute().unwrap();

        let names = graph.sorted_pass_names();
        assert!(position(&names, "shadow") < position(&names, "lighting"));
        assert!(position(&names, "lighting") < position(&names, "present"));
        assert_eq!(
            graph.tracked_state("shadowmap"),
            Some(ResourceState::Undefined)
        );
    }

    #[test]
    fn test_graphviz_export() {
        let mut graph = RenderGraph::new_dry_run();
        declare_scene(&mut graph);
        let upload = graph.create_pass("upload", QueueType::Transfer);
        graph
            .configure_pass(upload)
            .buffer_output("lights", BufferUsage::STORAGE);

        let dot = graph.export_graphviz();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"shadow\" -> \"lighting\" [label=\"shadowmap\""));
        assert!(dot.contains("\"lighting\" -> \"present\" [label=\"sceneColor\""));
        // Queue-type node colors and resource-kind edge colors.
        assert!(dot.contains("#A3D977"));
        assert!(dot.contains("#E8C477"));
        assert!(dot.contains("#4285F4"));
    }

    #[test]
    fn test_lookup_misses_return_none() {
        let graph = RenderGraph::new_dry_run();
        assert!(graph.pass_handle("missing").is_none());
        assert!(graph.resource_handle("missing").is_none());
        assert!(graph.image("missing").is_none());
        assert!(graph.buffer("missing").is_none());
        assert!(graph.tracked_state("missing").is_none());
    }

    #[test]
    fn test_uniform_and_storage_buffer_partition() {
        let mut graph = RenderGraph::new_dry_run();
        let pass = graph.create_pass("lighting", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .buffer_input(
                "frame-constants",
                BufferSource::None,
                BufferUsage::UNIFORM,
            )
            .buffer_input("lights", BufferSource::None, BufferUsage::STORAGE);

        let handle = graph.pass_handle("lighting").unwrap();
        let pass = graph.pass(handle);
        assert_eq!(pass.uniform_buffer_in.len(), 1);
        assert_eq!(pass.storage_buffer_in.len(), 1);

        let constants = graph.resource_handle("frame-constants").unwrap();
        assert_eq!(
            graph.pass(handle).target_states[&constants],
            ResourceState::UniformBuffer
        );
    }
}
