//! Multi-frame graph ownership and cross-frame resource de-duplication.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::backend::{BufferHandle, Device, ImageHandle, ShaderHandle, Swapchain};
use crate::error::GraphicsError;
use crate::loader::{LoadRequest, LoadedAsset, ResourceLoader};

use super::graph::RenderGraph;

/// Owns one [`RenderGraph`] per in-flight frame and resolves resources
/// flagged as shared exactly once across all of them.
///
/// Per-frame resources (attachments, per-frame buffers) must exist once per
/// frame slot so the CPU can record frame N+1 while the GPU consumes frame
/// N. Assets loaded from disk must *not* be duplicated per slot: the
/// composer batches every graph's pending loads, loads each name once, and
/// imports the result into every owned graph before any graph builds.
///
/// # Phase ordering
///
/// The composer assumes the caller drives phases strictly in order:
/// declare, [`sync_shared_resources`](Self::sync_shared_resources) (implied
/// by [`build_all`](Self::build_all)), build, execute. The shared-asset maps
/// are written only during sync and read afterwards; no locking is modeled.
pub struct FrameComposer {
    device: Arc<dyn Device>,
    loader: Arc<dyn ResourceLoader>,
    graphs: Vec<RenderGraph>,

    shared_images: IndexMap<String, ImageHandle>,
    shared_buffers: IndexMap<String, BufferHandle>,
    shared_shaders: IndexMap<String, ShaderHandle>,

    current_frame: usize,
}

impl FrameComposer {
    /// Create a composer owning `frame_count` render graphs.
    ///
    /// A frame count of zero is coerced to one with an error log, matching
    /// the graph-per-frame invariant.
    pub fn new(
        device: Arc<dyn Device>,
        loader: Arc<dyn ResourceLoader>,
        frame_count: usize,
    ) -> Self {
        let frame_count = if frame_count == 0 {
            log::error!("invalid frame count (0), defaulting to 1");
            1
        } else {
            frame_count
        };

        let graphs = (0..frame_count)
            .map(|_| RenderGraph::new(device.clone()))
            .collect();

        Self {
            device,
            loader,
            graphs,
            shared_images: IndexMap::new(),
            shared_buffers: IndexMap::new(),
            shared_shaders: IndexMap::new(),
            current_frame: 0,
        }
    }

    /// Number of in-flight frames (= owned graphs).
    pub fn frame_count(&self) -> usize {
        self.graphs.len()
    }

    /// Index of the current frame slot.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// The current frame's graph.
    pub fn current_graph(&self) -> &RenderGraph {
        &self.graphs[self.current_frame]
    }

    /// The current frame's graph, mutably.
    pub fn current_graph_mut(&mut self) -> &mut RenderGraph {
        &mut self.graphs[self.current_frame]
    }

    /// The graph of a specific frame slot. Out-of-range indices are logged
    /// and return `None`.
    pub fn graph(&self, frame_index: usize) -> Option<&RenderGraph> {
        if frame_index >= self.graphs.len() {
            log::error!(
                "invalid frame index {} (max: {})",
                frame_index,
                self.graphs.len().saturating_sub(1)
            );
            return None;
        }
        Some(&self.graphs[frame_index])
    }

    /// The graph of a specific frame slot, mutably. Out-of-range indices
    /// are logged and return `None`.
    pub fn graph_mut(&mut self, frame_index: usize) -> Option<&mut RenderGraph> {
        if frame_index >= self.graphs.len() {
            log::error!(
                "invalid frame index {} (max: {})",
                frame_index,
                self.graphs.len().saturating_sub(1)
            );
            return None;
        }
        Some(&mut self.graphs[frame_index])
    }

    /// Advance to the next frame slot and return it.
    pub fn next_frame(&mut self) -> (usize, &mut RenderGraph) {
        self.current_frame = (self.current_frame + 1) % self.graphs.len();
        (self.current_frame, &mut self.graphs[self.current_frame])
    }

    /// Select a specific frame slot as current.
    ///
    /// Out-of-range indices are logged and coerced to 0.
    pub fn set_current_frame(&mut self, frame_index: usize) {
        if frame_index >= self.graphs.len() {
            log::error!(
                "invalid frame index {} (max: {}), defaulting to 0",
                frame_index,
                self.graphs.len().saturating_sub(1)
            );
            self.current_frame = 0;
            return;
        }
        self.current_frame = frame_index;
    }

    /// Change the number of in-flight frames at runtime.
    ///
    /// Shrinking destroys the excess graphs along with their GPU resources;
    /// growing allocates fresh graphs. The current frame index is clamped
    /// to the new count.
    pub fn set_frame_count(&mut self, frame_count: usize) {
        let frame_count = if frame_count == 0 {
            log::error!("invalid frame count (0), defaulting to 1");
            1
        } else {
            frame_count
        };

        if frame_count == self.graphs.len() {
            return;
        }

        // Dropping a graph cleans up its GPU resources.
        self.graphs.truncate(frame_count);
        while self.graphs.len() < frame_count {
            self.graphs.push(RenderGraph::new(self.device.clone()));
        }

        self.current_frame = self.current_frame.min(frame_count - 1);
    }

    /// Resolve every pending deferred load across all owned graphs.
    ///
    /// Each unresolved name is loaded exactly once, no matter how many
    /// passes or frames declared it and how many times this is called.
    /// After loading, every graph receives the resolved asset as an imported
    /// resource, whether or not that graph declared it.
    pub fn sync_shared_resources(&mut self) -> Result<(), GraphicsError> {
        if !self.graphs.iter().any(|graph| graph.has_pending_loads()) {
            return Ok(());
        }

        let mut request = LoadRequest::new(self.loader.as_ref());

        for graph in &self.graphs {
            for (name, info) in graph.pending_image_loads() {
                if self.shared_images.contains_key(name) || request.contains(name) {
                    log::debug!("pending load of '{}' already resolved or queued, skipping", name);
                    continue;
                }
                request.add_image(name.clone(), info.clone());
            }
            for (name, info) in graph.pending_buffer_loads() {
                if self.shared_buffers.contains_key(name) || request.contains(name) {
                    log::debug!("pending load of '{}' already resolved or queued, skipping", name);
                    continue;
                }
                request.add_buffer(name.clone(), info.clone());
            }
            for (name, info) in graph.pending_shader_loads() {
                if self.shared_shaders.contains_key(name) || request.contains(name) {
                    log::debug!("pending load of '{}' already resolved or queued, skipping", name);
                    continue;
                }
                request.add_shader(name.clone(), info.clone());
            }
        }

        for asset in request.load()? {
            match asset {
                LoadedAsset::Image { name, image } => {
                    self.shared_images.insert(name, image);
                }
                LoadedAsset::Buffer { name, buffer } => {
                    self.shared_buffers.insert(name, buffer);
                }
                LoadedAsset::Shader { name, program } => {
                    self.shared_shaders.insert(name, program);
                }
            }
        }

        for graph in &mut self.graphs {
            for (name, &image) in &self.shared_images {
                if !graph.has_image_binding(name) {
                    graph.import_image(name, image);
                }
            }
            for (name, &buffer) in &self.shared_buffers {
                if !graph.has_buffer_binding(name) {
                    graph.import_buffer(name, buffer);
                }
            }
            for (name, &program) in &self.shared_shaders {
                if !graph.has_shader_binding(name) {
                    graph.import_shader(name, program);
                }
            }
            graph.clear_pending_loads();
        }

        Ok(())
    }

    /// Sync shared resources once, then build every owned graph.
    ///
    /// The ordering matters: shared resources must exist before any graph
    /// allocates or records against them.
    pub fn build_all(
        &mut self,
        swapchain: Option<&Arc<dyn Swapchain>>,
    ) -> Result<(), GraphicsError> {
        self.sync_shared_resources()?;
        for graph in &mut self.graphs {
            graph.build(swapchain)?;
        }
        Ok(())
    }

    /// Iterate the frame slots once, advancing the current frame index.
    ///
    /// The returned sequence yields each frame's `(index, graph)` pair
    /// starting at the current slot; consuming it fully triggers one
    /// trailing [`sync_shared_resources`](Self::sync_shared_resources) call
    /// to pick up sharing declared during the completed cycle.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut frames = composer.frames();
    /// while let Some((index, graph)) = frames.next() {
    ///     graph.build(Some(&swapchain))?;
    ///     graph.execute()?;
    /// }
    /// ```
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            composer: self,
            yielded: 0,
            synced: false,
        }
    }

    /// A shared image resolved by a previous sync.
    pub fn shared_image(&self, name: &str) -> Option<ImageHandle> {
        self.shared_images.get(name).copied()
    }

    /// A shared buffer resolved by a previous sync.
    pub fn shared_buffer(&self, name: &str) -> Option<BufferHandle> {
        self.shared_buffers.get(name).copied()
    }

    /// A shared shader program resolved by a previous sync.
    pub fn shared_shader(&self, name: &str) -> Option<ShaderHandle> {
        self.shared_shaders.get(name).copied()
    }

    /// Destroy every owned graph and its GPU resources.
    pub fn cleanup(&mut self) {
        for graph in &mut self.graphs {
            graph.cleanup();
        }
        self.graphs.clear();
        self.current_frame = 0;
    }
}

impl std::fmt::Debug for FrameComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameComposer")
            .field("frame_count", &self.graphs.len())
            .field("current_frame", &self.current_frame)
            .field("shared_images", &self.shared_images.len())
            .field("shared_buffers", &self.shared_buffers.len())
            .field("shared_shaders", &self.shared_shaders.len())
            .finish()
    }
}

/// Finite frame sequence returned by [`FrameComposer::frames`].
///
/// Not a `std::iter::Iterator`: each yielded graph borrows the sequence, so
/// items are consumed one at a time with [`next`](Self::next).
pub struct Frames<'a> {
    composer: &'a mut FrameComposer,
    yielded: usize,
    synced: bool,
}

impl Frames<'_> {
    /// Yield the next frame slot, or `None` when the cycle is complete.
    ///
    /// The first `None` performs the trailing shared-resource sync.
    pub fn next(&mut self) -> Option<(usize, &mut RenderGraph)> {
        let count = self.composer.graphs.len();
        if self.yielded >= count {
            if !self.synced {
                self.synced = true;
                if let Err(err) = self.composer.sync_shared_resources() {
                    log::error!("trailing shared-resource sync failed: {err}");
                }
            }
            return None;
        }

        self.yielded += 1;
        let index = self.composer.current_frame;
        self.composer.current_frame = (index + 1) % count;
        Some((index, &mut self.composer.graphs[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::graph::pass::{BufferSource, ImageSource};
    use crate::loader::{BufferLoadInfo, ImageLoadInfo, ShaderLoadInfo, StubLoader};
    use crate::types::{AttachmentInfo, BufferUsage, Format, ImageUsage, QueueType};

    fn setup(frame_count: usize) -> (Arc<DummyDevice>, Arc<StubLoader>, FrameComposer) {
        let device = Arc::new(DummyDevice::new());
        let loader = Arc::new(StubLoader::new());
        let composer = FrameComposer::new(device.clone(), loader.clone(), frame_count);
        (device, loader, composer)
    }

    /// A pass sampling the shared "noise" texture via a deferred load.
    fn declare_noise_consumer(graph: &mut RenderGraph) {
        let pass = graph.create_pass("composite", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .texture_input(
                "noise",
                ImageSource::Load(ImageLoadInfo::new("textures/noise.png")),
                ImageUsage::SAMPLED,
            )
            .mark_resource_as_shared("noise")
            .buffer_input(
                "exposure-lut",
                BufferSource::Load(BufferLoadInfo::new("luts/exposure.bin")),
                BufferUsage::UNIFORM,
            )
            .color_output("out", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1));
    }

    #[test]
    fn test_zero_frame_count_coerced_to_one() {
        let (_, _, composer) = setup(0);
        assert_eq!(composer.frame_count(), 1);
    }

    #[test]
    fn test_shared_resource_loads_exactly_once() {
        let (_, loader, mut composer) = setup(3);

        // Every frame's graph declares the same deferred load, and one graph
        // declares a second reader of the same resource.
        for index in 0..3 {
            declare_noise_consumer(composer.graph_mut(index).unwrap());
        }
        let graph = composer.graph_mut(0).unwrap();
        let extra = graph.create_pass("extra", QueueType::Graphics);
        graph
            .configure_pass(extra)
            .texture_input("noise", ImageSource::None, ImageUsage::SAMPLED)
            .color_output("extraOut", AttachmentInfo::color(32, 32, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1));

        composer.build_all(None).unwrap();
        assert_eq!(loader.load_count("noise"), 1);

        // Further builds must not reload.
        composer.build_all(None).unwrap();
        assert_eq!(loader.load_count("noise"), 1);

        // Every graph received the import and can resolve the image.
        let shared = composer.shared_image("noise").unwrap();
        for index in 0..3 {
            assert_eq!(composer.graph(index).unwrap().image("noise"), Some(shared));
        }
    }

    #[test]
    fn test_shared_resource_imported_into_non_declaring_graphs() {
        let (_, loader, mut composer) = setup(2);

        // Only frame 0 declares the load.
        declare_noise_consumer(composer.graph_mut(0).unwrap());
        composer.build_all(None).unwrap();

        assert_eq!(loader.load_count("noise"), 1);
        assert_eq!(loader.load_count("exposure-lut"), 1);
        // Frame 1 never declared these but still holds the imports.
        assert!(composer.graph(1).unwrap().image("noise").is_some());
        assert!(composer.graph(1).unwrap().buffer("exposure-lut").is_some());
    }

    #[test]
    fn test_shader_loads_resolve_through_composer() {
        let (_, loader, mut composer) = setup(2);

        let graph = composer.graph_mut(0).unwrap();
        let pass = graph.create_pass("post", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .color_output("ldr", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .shader(
                "tonemap",
                ShaderLoadInfo::new("shaders/tonemap.slang"),
                |cmd| cmd.draw(3, 1),
            );

        composer.build_all(None).unwrap();

        assert_eq!(loader.load_count("tonemap"), 1);
        assert!(composer.shared_shader("tonemap").is_some());
    }

    #[test]
    fn test_frames_cycles_all_slots_and_syncs_after() {
        let (_, loader, mut composer) = setup(2);
        declare_noise_consumer(composer.graph_mut(0).unwrap());

        let mut visited = Vec::new();
        let mut frames = composer.frames();
        while let Some((index, graph)) = frames.next() {
            visited.push(index);
            // Graphs are fully usable inside the loop.
            let _ = graph.pass_count();
        }
        // Exhaustion runs the trailing sync exactly once.
        assert!(frames.next().is_none());

        assert_eq!(visited, vec![0, 1]);
        assert_eq!(loader.load_count("noise"), 1);
        assert_eq!(composer.current_frame(), 0);
    }

    #[test]
    fn test_next_frame_wraps_around() {
        let (_, _, mut composer) = setup(2);
        assert_eq!(composer.current_frame(), 0);

        let (index, _) = composer.next_frame();
        assert_eq!(index, 1);
        let (index, _) = composer.next_frame();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_set_frame_count_grows_and_shrinks() {
        let (_, _, mut composer) = setup(3);
        composer.set_current_frame(2);

        composer.set_frame_count(1);
        assert_eq!(composer.frame_count(), 1);
        // Current index is clamped into the new range.
        assert_eq!(composer.current_frame(), 0);

        composer.set_frame_count(4);
        assert_eq!(composer.frame_count(), 4);
        assert!(composer.graph(3).is_some());

        composer.set_frame_count(0);
        assert_eq!(composer.frame_count(), 1);
    }

    #[test]
    fn test_shrink_destroys_excess_graph_resources() {
        let (device, _, mut composer) = setup(2);

        // Give frame 1 an owned attachment.
        let graph = composer.graph_mut(1).unwrap();
        let pass = graph.create_pass("draw", QueueType::Graphics);
        graph
            .configure_pass(pass)
            .color_output("color", AttachmentInfo::color(64, 64, Format::Rgba8Unorm))
            .execute(|cmd| cmd.draw(3, 1));
        composer.build_all(None).unwrap();
        let owned = composer.graph(1).unwrap().image("color").unwrap();

        composer.set_frame_count(1);
        assert!(device.destroyed_images().contains(&owned));
    }

    #[test]
    fn test_out_of_range_frame_lookup_returns_none() {
        let (_, _, mut composer) = setup(2);
        assert!(composer.graph(5).is_none());
        assert!(composer.graph_mut(5).is_none());

        composer.set_current_frame(9);
        assert_eq!(composer.current_frame(), 0);
    }

    #[test]
    fn test_cleanup_drops_all_graphs() {
        let (_, _, mut composer) = setup(2);
        composer.cleanup();
        assert_eq!(composer.frame_count(), 0);
    }
}
