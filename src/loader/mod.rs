//! Asynchronous asset loading contract.
//!
//! The graph never loads assets itself. Deferred declarations park a load
//! info in their graph's pending table; the frame composer batches all
//! pending loads of all frames into one [`LoadRequest`] and resolves it
//! through a [`ResourceLoader`] collaborator. `LoadRequest::load` returns
//! only when every queued asset is resolved, so graphs can build against the
//! results immediately.

mod stub;

pub use stub::StubLoader;

use crate::backend::{BufferHandle, ImageHandle, ShaderHandle};
use crate::error::GraphicsError;

/// Parameters for loading an image asset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageLoadInfo {
    /// Source path or URI understood by the loader.
    pub path: String,
    /// Debug name; defaults to the declaring resource name when empty.
    pub debug_name: String,
}

impl ImageLoadInfo {
    /// Load info for the given source path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            debug_name: String::new(),
        }
    }
}

/// Parameters for loading a buffer asset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferLoadInfo {
    /// Source path or URI understood by the loader.
    pub path: String,
    /// Debug name; defaults to the declaring resource name when empty.
    pub debug_name: String,
}

impl BufferLoadInfo {
    /// Load info for the given source path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            debug_name: String::new(),
        }
    }
}

/// Parameters for loading a shader program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderLoadInfo {
    /// Source path or URI understood by the loader.
    pub path: String,
    /// Debug name; defaults to the declaring shader name when empty.
    pub debug_name: String,
}

impl ShaderLoadInfo {
    /// Load info for the given source path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            debug_name: String::new(),
        }
    }
}

/// One resolved asset, tagged with the name it was requested under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedAsset {
    /// A resolved image.
    Image {
        /// Requested resource name.
        name: String,
        /// Device handle of the loaded image.
        image: ImageHandle,
    },
    /// A resolved buffer.
    Buffer {
        /// Requested resource name.
        name: String,
        /// Device handle of the loaded buffer.
        buffer: BufferHandle,
    },
    /// A resolved shader program.
    Shader {
        /// Requested shader name.
        name: String,
        /// Handle of the loaded program.
        program: ShaderHandle,
    },
}

/// Asset loader contract.
///
/// Loading may happen on the loader's own worker mechanism, but each call
/// returns only once the asset is fully resolved.
pub trait ResourceLoader: Send + Sync {
    /// Load an image asset.
    fn load_image(&self, name: &str, info: &ImageLoadInfo) -> Result<ImageHandle, GraphicsError>;

    /// Load a buffer asset.
    fn load_buffer(&self, name: &str, info: &BufferLoadInfo)
        -> Result<BufferHandle, GraphicsError>;

    /// Load a shader program.
    fn load_shader(&self, name: &str, info: &ShaderLoadInfo)
        -> Result<ShaderHandle, GraphicsError>;

    /// Start a batched load request against this loader.
    fn create_request(&self) -> LoadRequest<'_>
    where
        Self: Sized,
    {
        LoadRequest::new(self)
    }
}

/// A batch of queued loads resolved in one call.
pub struct LoadRequest<'a> {
    loader: &'a dyn ResourceLoader,
    images: Vec<(String, ImageLoadInfo)>,
    buffers: Vec<(String, BufferLoadInfo)>,
    shaders: Vec<(String, ShaderLoadInfo)>,
}

impl<'a> LoadRequest<'a> {
    /// Create an empty request against the given loader.
    pub fn new(loader: &'a dyn ResourceLoader) -> Self {
        Self {
            loader,
            images: Vec::new(),
            buffers: Vec::new(),
            shaders: Vec::new(),
        }
    }

    /// Queue an image load under the given resource name.
    pub fn add_image(&mut self, name: impl Into<String>, mut info: ImageLoadInfo) {
        let name = name.into();
        if info.debug_name.is_empty() {
            info.debug_name = name.clone();
        }
        self.images.push((name, info));
    }

    /// Queue a buffer load under the given resource name.
    pub fn add_buffer(&mut self, name: impl Into<String>, mut info: BufferLoadInfo) {
        let name = name.into();
        if info.debug_name.is_empty() {
            info.debug_name = name.clone();
        }
        self.buffers.push((name, info));
    }

    /// Queue a shader load under the given shader name.
    pub fn add_shader(&mut self, name: impl Into<String>, mut info: ShaderLoadInfo) {
        let name = name.into();
        if info.debug_name.is_empty() {
            info.debug_name = name.clone();
        }
        self.shaders.push((name, info));
    }

    /// True if nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.buffers.is_empty() && self.shaders.is_empty()
    }

    /// True if the given name is already queued in this request.
    pub fn contains(&self, name: &str) -> bool {
        self.images.iter().any(|(n, _)| n == name)
            || self.buffers.iter().any(|(n, _)| n == name)
            || self.shaders.iter().any(|(n, _)| n == name)
    }

    /// Resolve every queued load.
    ///
    /// Returns the resolved assets in queue order, or the first load error.
    pub fn load(self) -> Result<Vec<LoadedAsset>, GraphicsError> {
        let mut assets =
            Vec::with_capacity(self.images.len() + self.buffers.len() + self.shaders.len());

        for (name, info) in &self.images {
            log::info!("loading image resource: {}", name);
            let image = self.loader.load_image(name, info)?;
            assets.push(LoadedAsset::Image {
                name: name.clone(),
                image,
            });
        }
        for (name, info) in &self.buffers {
            log::info!("loading buffer resource: {}", name);
            let buffer = self.loader.load_buffer(name, info)?;
            assets.push(LoadedAsset::Buffer {
                name: name.clone(),
                buffer,
            });
        }
        for (name, info) in &self.shaders {
            log::info!("loading shader program: {}", name);
            let program = self.loader.load_shader(name, info)?;
            assets.push(LoadedAsset::Shader {
                name: name.clone(),
                program,
            });
        }

        Ok(assets)
    }
}
