//! Seams to the graphics backend.
//!
//! The render graph never talks to a device directly, it creates GPU objects through a
//! [`ResourceFactory`] and records work through a [`CommandContext`].

use std::fmt::Debug;
use std::sync::Arc;
use zenith_core::collections::SmallVec;
use crate::descriptor::{BufferDesc, ClearMode, ImageDesc, ImageFormat};
use crate::resource::PhysicalResource;
use crate::state::ResourceState;

pub trait RhiResource: Send + Sync + Debug {
    fn byte_size(&self) -> u64;

    fn set_name(&self, name: &str);

    /// Write through the CPU mapping of a host visible resource.
    fn write_mapped(&self, offset: u64, data: &[u8]) -> anyhow::Result<()>;

    fn image_format(&self) -> Option<ImageFormat> {
        None
    }
}

pub trait ResourceFactory: Send + Sync {
    fn create_image(&self, desc: &ImageDesc) -> anyhow::Result<Arc<dyn RhiResource>>;

    fn create_buffer(&self, desc: &BufferDesc) -> anyhow::Result<Arc<dyn RhiResource>>;

    fn create_uniform_buffer(&self, desc: &BufferDesc) -> anyhow::Result<Arc<dyn RhiResource>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBarrierInfo {
    pub resource: PhysicalResource,
    pub src: ResourceState,
    pub dst: ResourceState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentInfo {
    pub image: PhysicalResource,
    pub clear_mode: ClearMode,
    pub clear_color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderingInfo {
    pub width: u32,
    pub height: u32,
    pub color_attachments: SmallVec<[AttachmentInfo; 8]>,
    pub depth_attachment: Option<AttachmentInfo>,
}

/// Command recording interface handed to pass execution.
pub trait CommandContext: Send {
    fn begin(&mut self);

    fn end(&mut self);

    /// Submit recorded work, blocking until the GPU finished when `wait_for_completion` is set.
    fn submit(&mut self, wait_for_completion: bool);

    fn resource_barrier(&mut self, barriers: &[ResourceBarrierInfo]);

    fn begin_rendering(&mut self, info: &RenderingInfo);

    fn end_rendering(&mut self);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    fn clear_image(&mut self, image: &PhysicalResource, color: [f32; 4]);

    fn clear_buffer(&mut self, buffer: &PhysicalResource, value: u32);

    fn copy_buffer(&mut self, src: &PhysicalResource, dst: &PhysicalResource, size: u64);

    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    fn set_constant(&mut self, name: &str, data: &[u8]);

    fn begin_marker(&mut self, name: &str);

    fn end_marker(&mut self);
}
