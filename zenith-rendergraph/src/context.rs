use std::sync::Arc;
use bytemuck::Pod;
use log::trace;
use zenith_core::collections::SmallVec;
use crate::descriptor::ClearMode;
use crate::error::{contract_violation, RenderGraphError};
use crate::interface::{BufferResource, ResourceDescriptor};
use crate::node::RenderGraphPassNode;
use crate::resource::{utility, GraphResource, PhysicalResource, RenderGraphBuffer, RenderGraphImage, RenderGraphResource, RenderGraphUniformBuffer, ResourceOrigin, ResourceStorage};
use crate::rhi::{AttachmentInfo, CommandContext, PipelineHandle, RenderingInfo, RhiResource};
use crate::transient::TransientResourceSystem;

/// Handed to a pass when it executes.
///
/// Resolves logical handles into physical resources, but only those the pass declared during setup.
pub struct RenderContext<'a> {
    pass: &'a RenderGraphPassNode,
    resources: &'a [ResourceStorage],
    transient: &'a TransientResourceSystem,
    command_context: &'a mut dyn CommandContext,
    fatal_contract_violations: bool,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        pass: &'a RenderGraphPassNode,
        resources: &'a [ResourceStorage],
        transient: &'a TransientResourceSystem,
        command_context: &'a mut dyn CommandContext,
        fatal_contract_violations: bool,
    ) -> Self {
        Self {
            pass,
            resources,
            transient,
            command_context,
            fatal_contract_violations,
        }
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass.name()
    }

    #[inline]
    pub fn is_compute_pass(&self) -> bool {
        self.pass.is_compute_pass()
    }

    pub fn get_image(&self, image: RenderGraphImage) -> Result<PhysicalResource, RenderGraphError> {
        self.resolve(image)
    }

    pub fn get_buffer(&self, buffer: RenderGraphBuffer) -> Result<PhysicalResource, RenderGraphError> {
        self.resolve(buffer)
    }

    pub fn get_uniform_buffer(&self, buffer: RenderGraphUniformBuffer) -> Result<PhysicalResource, RenderGraphError> {
        self.resolve(buffer)
    }

    pub fn get_image_ref(&self, image: RenderGraphImage) -> Result<Arc<dyn RhiResource>, RenderGraphError> {
        Ok(self.resolve(image)?.raw().clone())
    }

    pub fn get_buffer_ref(&self, buffer: RenderGraphBuffer) -> Result<Arc<dyn RhiResource>, RenderGraphError> {
        Ok(self.resolve(buffer)?.raw().clone())
    }

    pub fn get_uniform_buffer_ref(&self, buffer: RenderGraphUniformBuffer) -> Result<Arc<dyn RhiResource>, RenderGraphError> {
        Ok(self.resolve(buffer)?.raw().clone())
    }

    /// Begin dynamic rendering into the given attachments.
    ///
    /// Load operations and the render area come from the attachment descriptions, an area of zero
    /// lets the backend use the full extent of external attachments.
    pub fn begin_rendering(
        &mut self,
        color_attachments: &[RenderGraphImage],
        depth_attachment: Option<RenderGraphImage>,
    ) -> Result<(), RenderGraphError> {
        let mut extent = None;
        let mut attachment_info = |image: RenderGraphImage| -> Result<AttachmentInfo, RenderGraphError> {
            let physical = self.resolve(image)?;
            let (clear_mode, clear_color) = match utility::resource_storage_ref(self.resources, image.id)
                .and_then(|storage| storage.descriptor())
            {
                Some(ResourceDescriptor::Image(desc)) => {
                    extent.get_or_insert((desc.width, desc.height));
                    (desc.clear_mode, desc.clear_color)
                }
                _ => (ClearMode::Load, [0.0; 4]),
            };

            Ok(AttachmentInfo {
                image: physical,
                clear_mode,
                clear_color,
            })
        };

        let color_attachments = color_attachments
            .iter()
            .map(|image| attachment_info(*image))
            .collect::<Result<SmallVec<[AttachmentInfo; 8]>, _>>()?;
        let depth_attachment = depth_attachment.map(&mut attachment_info).transpose()?;

        let (width, height) = extent.unwrap_or((0, 0));
        self.command_context.begin_rendering(&RenderingInfo {
            width,
            height,
            color_attachments,
            depth_attachment,
        });
        Ok(())
    }

    pub fn end_rendering(&mut self) {
        self.command_context.end_rendering();
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.command_context.dispatch(x, y, z);
    }

    pub fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.command_context.bind_pipeline(pipeline);
    }

    pub fn set_constant<T: Pod>(&mut self, name: &str, value: &T) {
        self.command_context.set_constant(name, bytemuck::bytes_of(value));
    }

    pub fn clear_image(&mut self, image: RenderGraphImage, color: [f32; 4]) -> Result<(), RenderGraphError> {
        let physical = self.resolve(image)?;
        self.command_context.clear_image(&physical, color);
        Ok(())
    }

    pub fn clear_buffer<R: BufferResource>(&mut self, buffer: RenderGraphResource<R>, value: u32) -> Result<(), RenderGraphError> {
        let physical = self.resolve(buffer)?;
        self.command_context.clear_buffer(&physical, value);
        Ok(())
    }

    pub fn copy_buffer<S: BufferResource, D: BufferResource>(
        &mut self,
        src: RenderGraphResource<S>,
        dst: RenderGraphResource<D>,
        size: u64,
    ) -> Result<(), RenderGraphError> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        self.command_context.copy_buffer(&src, &dst, size);
        Ok(())
    }

    /// Write `data` through the CPU mapping of a host visible buffer.
    pub fn write_buffer<R: BufferResource>(&self, buffer: RenderGraphResource<R>, offset: u64, data: &[u8]) -> Result<(), RenderGraphError> {
        let physical = self.resolve(buffer)?;
        physical
            .raw()
            .write_mapped(offset, data)
            .map_err(|err| RenderGraphError::MappedWrite {
                name: self.resource_name(buffer.id),
                reason: format!("{err:#}"),
            })
    }

    pub fn begin_marker(&mut self, name: &str) {
        self.command_context.begin_marker(name);
    }

    pub fn end_marker(&mut self) {
        self.command_context.end_marker();
    }

    /// Raw access to the command context for commands the graph knows nothing about.
    pub fn command_context(&mut self) -> &mut dyn CommandContext {
        &mut *self.command_context
    }

    fn resolve<R: GraphResource>(&self, handle: RenderGraphResource<R>) -> Result<PhysicalResource, RenderGraphError> {
        let Some(storage) = utility::resource_storage_ref(self.resources, handle.id) else {
            return Err(contract_violation(self.fatal_contract_violations, RenderGraphError::UnknownResource { id: handle.id }));
        };

        if !self.pass.declares(handle.id) {
            return Err(contract_violation(self.fatal_contract_violations, RenderGraphError::UndeclaredResourceAccess {
                pass: self.pass.name().to_owned(),
                resource: storage.name.clone(),
                resource_type: R::TYPE,
            }));
        }

        if storage.resource_type != R::TYPE {
            return Err(contract_violation(self.fatal_contract_violations, RenderGraphError::ResourceTypeMismatch {
                resource: storage.name.clone(),
                expected: R::TYPE,
                actual: storage.resource_type,
            }));
        }

        if let Some(resource) = self.transient.get_raw(handle.id) {
            return Ok(resource);
        }

        // normally materialized before the pass starts
        trace!("Late materialization of [{}] in pass [{}]", storage.name, self.pass.name());
        match &storage.origin {
            ResourceOrigin::Transient { descriptor, .. } => self.transient.acquire(handle.id, descriptor),
            ResourceOrigin::External { resource, .. } => {
                self.transient.add_external(handle.id, resource.clone());
                Ok(resource.clone())
            }
        }
    }

    fn resource_name(&self, id: u32) -> String {
        utility::resource_storage_ref(self.resources, id)
            .map(|storage| storage.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }
}
