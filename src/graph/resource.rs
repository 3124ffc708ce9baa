//! Logical resources tracked by the render graph.

use bitflags::bitflags;
use indexmap::IndexSet;

use crate::types::{
    AccessFlags, AttachmentInfo, BufferCreateInfo, BufferUsage, ImageUsage,
};

use super::PassHandle;

/// Whether a resource is an image or a buffer.
///
/// Fixed at first declaration; re-declaring a name with the other kind is a
/// programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Image resource.
    Image,
    /// Buffer resource.
    Buffer,
}

bitflags! {
    /// Lifetime and sharing flags of a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        /// The concrete resource is owned outside the graph; the graph never
        /// allocates or destroys it.
        const EXTERNAL = 1 << 0;
        /// The resource is de-duplicated across in-flight frames by the
        /// frame composer.
        const SHARED = 1 << 1;
    }
}

/// Kind-specific payload of a resource.
///
/// A tagged variant rather than a trait object: the barrier loop dispatches
/// on the kind with a plain `match`.
#[derive(Debug, Clone)]
pub enum ResourceInfo {
    /// Image payload.
    Image {
        /// Accumulated usage flags from all declaring passes.
        usage: ImageUsage,
        /// Attachment configuration when used as a color/depth target.
        attachment: Option<AttachmentInfo>,
    },
    /// Buffer payload.
    Buffer {
        /// Accumulated usage flags from all declaring passes.
        usage: BufferUsage,
        /// Creation parameters.
        create_info: BufferCreateInfo,
    },
}

/// A named logical resource: a graph node connecting the passes that write
/// it to the passes that read it.
///
/// A `PassResource` is independent of any concrete GPU allocation; the graph
/// materializes (or imports) the backing image/buffer at build time.
#[derive(Debug, Clone)]
pub struct PassResource {
    name: String,
    flags: ResourceFlags,
    access: AccessFlags,
    read_passes: IndexSet<PassHandle>,
    write_passes: IndexSet<PassHandle>,
    info: ResourceInfo,
}

impl PassResource {
    pub(crate) fn new_image(name: String) -> Self {
        Self {
            name,
            flags: ResourceFlags::empty(),
            access: AccessFlags::empty(),
            read_passes: IndexSet::new(),
            write_passes: IndexSet::new(),
            info: ResourceInfo::Image {
                usage: ImageUsage::empty(),
                attachment: None,
            },
        }
    }

    pub(crate) fn new_buffer(name: String) -> Self {
        Self {
            name,
            flags: ResourceFlags::empty(),
            access: AccessFlags::empty(),
            read_passes: IndexSet::new(),
            write_passes: IndexSet::new(),
            info: ResourceInfo::Buffer {
                usage: BufferUsage::empty(),
                create_info: BufferCreateInfo::default(),
            },
        }
    }

    /// The resource's name, its stable lookup key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image or buffer.
    pub fn kind(&self) -> ResourceKind {
        match self.info {
            ResourceInfo::Image { .. } => ResourceKind::Image,
            ResourceInfo::Buffer { .. } => ResourceKind::Buffer,
        }
    }

    /// The resource's flags.
    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// True if the resource carries the given flag.
    pub fn has_flag(&self, flag: ResourceFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Accumulated access flags across all declaring passes.
    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// Passes reading this resource, in declaration order.
    pub fn read_passes(&self) -> &IndexSet<PassHandle> {
        &self.read_passes
    }

    /// Passes writing this resource, in declaration order.
    pub fn write_passes(&self) -> &IndexSet<PassHandle> {
        &self.write_passes
    }

    /// The kind-specific payload.
    pub fn info(&self) -> &ResourceInfo {
        &self.info
    }

    pub(crate) fn add_read_pass(&mut self, pass: PassHandle) {
        self.read_passes.insert(pass);
    }

    pub(crate) fn add_write_pass(&mut self, pass: PassHandle) {
        self.write_passes.insert(pass);
    }

    pub(crate) fn add_flags(&mut self, flags: ResourceFlags) {
        self.flags |= flags;
    }

    pub(crate) fn add_access(&mut self, access: AccessFlags) {
        self.access |= access;
    }

    pub(crate) fn add_image_usage(&mut self, new_usage: ImageUsage) {
        match &mut self.info {
            ResourceInfo::Image { usage, .. } => *usage |= new_usage,
            ResourceInfo::Buffer { .. } => unreachable!("image usage on buffer resource"),
        }
    }

    pub(crate) fn add_buffer_usage(&mut self, new_usage: BufferUsage) {
        match &mut self.info {
            ResourceInfo::Buffer { usage, .. } => *usage |= new_usage,
            ResourceInfo::Image { .. } => unreachable!("buffer usage on image resource"),
        }
    }

    pub(crate) fn set_attachment(&mut self, info: AttachmentInfo) {
        match &mut self.info {
            ResourceInfo::Image { attachment, .. } => *attachment = Some(info),
            ResourceInfo::Buffer { .. } => unreachable!("attachment info on buffer resource"),
        }
    }

    /// Attachment configuration, if this image is declared as a target.
    pub fn attachment(&self) -> Option<&AttachmentInfo> {
        match &self.info {
            ResourceInfo::Image { attachment, .. } => attachment.as_ref(),
            ResourceInfo::Buffer { .. } => None,
        }
    }

    /// Image usage flags; empty for buffers.
    pub fn image_usage(&self) -> ImageUsage {
        match &self.info {
            ResourceInfo::Image { usage, .. } => *usage,
            ResourceInfo::Buffer { .. } => ImageUsage::empty(),
        }
    }

    /// Buffer usage flags; empty for images.
    pub fn buffer_usage(&self) -> BufferUsage {
        match &self.info {
            ResourceInfo::Buffer { usage, .. } => *usage,
            ResourceInfo::Image { .. } => BufferUsage::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_dispatch() {
        let image = PassResource::new_image("color".to_string());
        assert_eq!(image.kind(), ResourceKind::Image);

        let buffer = PassResource::new_buffer("lights".to_string());
        assert_eq!(buffer.kind(), ResourceKind::Buffer);
    }

    #[test]
    fn test_reader_writer_sets_deduplicate() {
        let mut res = PassResource::new_image("color".to_string());
        res.add_read_pass(PassHandle(0));
        res.add_read_pass(PassHandle(0));
        res.add_write_pass(PassHandle(1));
        assert_eq!(res.read_passes().len(), 1);
        assert_eq!(res.write_passes().len(), 1);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut res = PassResource::new_image("color".to_string());
        res.add_image_usage(ImageUsage::SAMPLED);
        res.add_image_usage(ImageUsage::COLOR_ATTACHMENT);
        assert!(res
            .image_usage()
            .contains(ImageUsage::SAMPLED | ImageUsage::COLOR_ATTACHMENT));
    }

    #[test]
    fn test_flags() {
        let mut res = PassResource::new_buffer("lut".to_string());
        assert!(!res.has_flag(ResourceFlags::SHARED));
        res.add_flags(ResourceFlags::SHARED);
        res.add_flags(ResourceFlags::EXTERNAL);
        assert!(res.has_flag(ResourceFlags::SHARED));
        assert!(res.has_flag(ResourceFlags::EXTERNAL));
    }
}
