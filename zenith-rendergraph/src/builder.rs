use std::sync::Arc;
use log::{debug, warn};
use parking_lot::Mutex;
use zenith_core::collections::hashmap::HashMap;
use crate::barrier::plan_barriers;
use crate::blackboard::Blackboard;
use crate::config::RenderGraphConfig;
use crate::context::RenderContext;
use crate::culling::cull_passes;
use crate::descriptor::{BufferDesc, BufferUsage, ImageDesc, MemoryUsage};
use crate::error::{contract_violation, RenderGraphError};
use crate::graph::CompiledRenderGraph;
use crate::interface::{Buffer, BufferResource, Image, UniformBuffer};
use crate::node::{RenderGraphPassNode, ResourceAccess, TypedPass};
use crate::resource::{GraphResource, GraphResourceId, PhysicalResource, PhysicalResourceId, RenderGraphBuffer, RenderGraphImage, RenderGraphResource, RenderGraphUniformBuffer, ResourceStorage};
use crate::rhi::CommandContext;
use crate::state::{ForcedState, ResourceState};
use crate::transient::{TransientResourcePool, TransientResourceSystem};

/// A barrier requested outside of any pass, issued after `after_pass` (or before the first pass).
#[derive(Debug, Clone, Copy)]
pub(crate) struct StandaloneBarrier {
    pub(crate) after_pass: Option<u32>,
    pub(crate) id: GraphResourceId,
    pub(crate) state: ResourceState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MarkerCommand {
    Begin(String),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GraphMarker {
    pub(crate) after_pass: Option<u32>,
    pub(crate) command: MarkerCommand,
}

/// A physical resource handed out of the graph once it finished executing.
#[derive(Debug, Clone, Default)]
pub struct ExtractedResource {
    slot: Arc<Mutex<Option<PhysicalResource>>>,
}

impl ExtractedResource {
    /// `None` until the graph has executed.
    pub fn get(&self) -> Option<PhysicalResource> {
        self.slot.lock().clone()
    }

    pub fn take(&self) -> Option<PhysicalResource> {
        self.slot.lock().take()
    }

    pub(crate) fn fill(&self, resource: PhysicalResource) {
        *self.slot.lock() = Some(resource);
    }
}

pub(crate) struct PendingExtraction {
    pub(crate) id: GraphResourceId,
    pub(crate) target: ExtractedResource,
}

pub(crate) type AllocatedSizeCallback = Box<dyn FnOnce(u64) + Send>;

/// One render graph instance under construction.
///
/// Passes are registered in execution order, their setup closures run immediately.
pub struct RenderGraphBuilder {
    config: RenderGraphConfig,
    command_context: Box<dyn CommandContext>,
    pool: Arc<TransientResourcePool>,

    pass_nodes: Vec<RenderGraphPassNode>,
    resources: Vec<ResourceStorage>,
    external_handles: HashMap<PhysicalResourceId, GraphResourceId>,

    standalone_barriers: Vec<StandaloneBarrier>,
    markers: Vec<GraphMarker>,
    extractions: Vec<PendingExtraction>,
    allocated_size_callback: Option<AllocatedSizeCallback>,

    blackboard: Blackboard,
}

impl RenderGraphBuilder {
    pub fn new(command_context: Box<dyn CommandContext>, pool: Arc<TransientResourcePool>) -> Self {
        Self::with_config(command_context, pool, RenderGraphConfig::default())
    }

    pub fn with_config(command_context: Box<dyn CommandContext>, pool: Arc<TransientResourcePool>, config: RenderGraphConfig) -> Self {
        Self {
            blackboard: Blackboard::new(config.fatal_contract_violations),
            config,
            command_context,
            pool,
            pass_nodes: Vec::new(),
            resources: Vec::new(),
            external_handles: HashMap::new(),
            standalone_barriers: Vec::new(),
            markers: Vec::new(),
            extractions: Vec::new(),
            allocated_size_callback: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &RenderGraphConfig {
        &self.config
    }

    pub fn pass_count(&self) -> usize {
        self.pass_nodes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn add_pass<S, E>(&mut self, name: &str, setup: S, execute: E)
    where
        S: FnOnce(&mut PassBuilder),
        E: FnOnce(&mut RenderContext) + Send + 'static,
    {
        self.add_pass_with_data(
            name,
            |builder| setup(builder),
            move |_: &(), context| execute(context),
        );
    }

    /// Register a pass whose setup produces plain data consumed again by its execution.
    ///
    /// Returns a copy of the data, so the handles it holds can feed later passes.
    pub fn add_pass_with_data<T, S, E>(&mut self, name: &str, setup: S, execute: E) -> T
    where
        T: Clone + Send + 'static,
        S: FnOnce(&mut PassBuilder) -> T,
        E: FnOnce(&T, &mut RenderContext) + Send + 'static,
    {
        let index = self.pass_nodes.len();
        self.pass_nodes.push(RenderGraphPassNode::new(name, index as u32));

        let data = setup(&mut PassBuilder {
            graph: self,
            index,
        });

        self.pass_nodes[index].pass = Some(Box::new(TypedPass {
            data: data.clone(),
            execute_func: execute,
        }));
        data
    }

    /// Graph level image, not owned by any pass. Its writers are never culled.
    #[must_use]
    pub fn create_image(&mut self, desc: ImageDesc) -> RenderGraphImage {
        self.create_resource::<Image>(desc, None)
    }

    #[must_use]
    pub fn create_buffer(&mut self, desc: BufferDesc) -> RenderGraphBuffer {
        self.create_resource::<Buffer>(desc, None)
    }

    #[must_use]
    pub fn create_uniform_buffer(&mut self, desc: BufferDesc) -> RenderGraphUniformBuffer {
        self.create_resource::<UniformBuffer>(desc, None)
    }

    /// Import an image owned outside of the graph, in `initial_state`.
    ///
    /// Importing the same physical resource twice yields the same handle.
    pub fn add_external_image(&mut self, name: &str, image: PhysicalResource, initial_state: ResourceState) -> RenderGraphImage {
        self.add_external::<Image>(name, image, initial_state)
    }

    pub fn add_external_buffer(&mut self, name: &str, buffer: PhysicalResource, initial_state: ResourceState) -> RenderGraphBuffer {
        self.add_external::<Buffer>(name, buffer, initial_state)
    }

    pub fn add_external_uniform_buffer(&mut self, name: &str, buffer: PhysicalResource, initial_state: ResourceState) -> RenderGraphUniformBuffer {
        self.add_external::<UniformBuffer>(name, buffer, initial_state)
    }

    /// Upload `data` through the CPU mapping of `buffer`, which must be host visible.
    pub fn add_mapped_buffer_upload<R: BufferResource>(&mut self, buffer: RenderGraphResource<R>, data: impl Into<Vec<u8>>, name: &str) {
        let data = data.into();

        self.add_pass_with_data(
            name,
            |builder| builder.write_with_state(buffer, ForcedState::CopyDest),
            move |buffer, context| {
                if let Err(err) = context.write_buffer(*buffer, 0, &data) {
                    log::error!("{err}");
                }
            },
        );
    }

    /// Upload `data` into a host visible staging buffer, then copy it into `buffer` on the GPU.
    pub fn add_staged_buffer_upload<R: BufferResource>(&mut self, buffer: RenderGraphResource<R>, data: impl Into<Vec<u8>>, name: &str) {
        let data = data.into();
        let size = data.len() as u64;

        self.add_pass_with_data(
            name,
            |builder| {
                let staging = builder.create_with_state::<Buffer>(
                    BufferDesc {
                        name: format!("{name} staging"),
                        element_size: 1,
                        count: size,
                        usage: BufferUsage::TRANSFER_SRC,
                        memory_usage: MemoryUsage::CpuToGpu,
                        ..Default::default()
                    },
                    Some(ForcedState::CopySource),
                );
                (staging, builder.write_with_state(buffer, ForcedState::CopyDest))
            },
            move |(staging, buffer), context| {
                let uploaded = context
                    .write_buffer(*staging, 0, &data)
                    .and_then(|_| context.copy_buffer(*staging, *buffer, size));
                if let Err(err) = uploaded {
                    log::error!("{err}");
                }
            },
        );
    }

    /// Move `resource` into `state` after the most recently registered pass.
    pub fn add_resource_barrier<R: GraphResource>(&mut self, resource: RenderGraphResource<R>, state: ResourceState) {
        if !self.check_handle(resource.id) {
            return;
        }

        self.standalone_barriers.push(StandaloneBarrier {
            after_pass: self.last_pass_index(),
            id: resource.id,
            state,
        });
    }

    /// Hand the physical image out of the graph once it executed. It is not returned to the pool.
    pub fn enqueue_image_extraction(&mut self, image: RenderGraphImage) -> ExtractedResource {
        self.enqueue_extraction(image.id)
    }

    pub fn enqueue_buffer_extraction(&mut self, buffer: RenderGraphBuffer) -> ExtractedResource {
        self.enqueue_extraction(buffer.id)
    }

    /// Copy `source` into `destination`, a buffer owned outside of the graph, once `source` holds
    /// its final content. The copy covers the smaller of both buffers.
    pub fn enqueue_buffer_readback(&mut self, source: RenderGraphBuffer, destination: PhysicalResource) {
        if !self.check_handle(source.id) {
            return;
        }

        let destination_size = destination.byte_size();
        let name = format!("{} readback", self.resources[source.id as usize].name);
        let destination = self.add_external_buffer(&name, destination, ResourceState::UNDEFINED);

        self.add_pass_with_data(
            &name,
            |builder| {
                builder.set_has_side_effect();
                (
                    builder.read_with_state(source, ForcedState::CopySource),
                    builder.write_with_state(destination, ForcedState::CopyDest),
                )
            },
            move |(source, destination), context| {
                let copied = context
                    .get_buffer(*source)
                    .map(|source| source.byte_size().min(destination_size))
                    .and_then(|size| context.copy_buffer(*source, *destination, size));
                if let Err(err) = copied {
                    log::error!("{err}");
                }
            },
        );
    }

    pub fn begin_marker(&mut self, name: &str) {
        self.markers.push(GraphMarker {
            after_pass: self.last_pass_index(),
            command: MarkerCommand::Begin(name.to_owned()),
        });
    }

    pub fn end_marker(&mut self) {
        self.markers.push(GraphMarker {
            after_pass: self.last_pass_index(),
            command: MarkerCommand::End,
        });
    }

    /// Receives the bytes freshly allocated for this graph, once it executed.
    pub fn set_total_allocated_size_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.allocated_size_callback = Some(Box::new(callback));
    }

    /// Cull dead passes and plan barriers and resource lifetimes.
    pub fn compile(self) -> Result<CompiledRenderGraph, RenderGraphError> {
        let open = self.markers.iter().try_fold(0u32, |open, marker| match marker.command {
            MarkerCommand::Begin(_) => Some(open + 1),
            MarkerCommand::End => open.checked_sub(1),
        });
        match open {
            Some(0) => {}
            Some(open) => return Err(RenderGraphError::UnbalancedMarkers { open }),
            None => return Err(RenderGraphError::UnmatchedEndMarker),
        }

        let RenderGraphBuilder {
            config,
            command_context,
            pool,
            mut pass_nodes,
            mut resources,
            standalone_barriers,
            markers,
            extractions,
            allocated_size_callback,
            ..
        } = self;

        for extraction in &extractions {
            if let Some(storage) = resources.get_mut(extraction.id as usize) {
                storage.is_extracted = true;
            }
        }

        cull_passes(&mut pass_nodes, &resources);
        let plan = plan_barriers(&pass_nodes, &resources, &standalone_barriers);

        let culled = pass_nodes.iter().filter(|node| node.is_culled()).count();
        debug!("Compiled render graph: {} pass(es), {} culled, {} resource(s)", pass_nodes.len(), culled, resources.len());

        Ok(CompiledRenderGraph::new(
            command_context,
            TransientResourceSystem::new(pool, config.fatal_contract_violations),
            config,
            pass_nodes,
            resources,
            plan,
            markers,
            extractions,
            allocated_size_callback,
        ))
    }

    fn create_resource<R: GraphResource>(&mut self, desc: R::Descriptor, producer: Option<u32>) -> RenderGraphResource<R> {
        let id = self.resources.len() as GraphResourceId;
        self.resources.push(ResourceStorage::transient(id, R::wrap_descriptor(desc), producer));
        RenderGraphResource::from_raw(id)
    }

    fn add_external<R: GraphResource>(&mut self, name: &str, resource: PhysicalResource, initial_state: ResourceState) -> RenderGraphResource<R> {
        if resource.resource_type() != R::TYPE {
            contract_violation(self.config.fatal_contract_violations, RenderGraphError::ResourceTypeMismatch {
                resource: name.to_owned(),
                expected: R::TYPE,
                actual: resource.resource_type(),
            });
        }

        if let Some(id) = self.external_handles.get(&resource.id()) {
            return RenderGraphResource::from_raw(*id);
        }

        let id = self.resources.len() as GraphResourceId;
        self.external_handles.insert(resource.id(), id);
        self.resources.push(ResourceStorage::external(id, name.to_owned(), resource, initial_state));
        RenderGraphResource::from_raw(id)
    }

    fn enqueue_extraction(&mut self, id: GraphResourceId) -> ExtractedResource {
        let target = ExtractedResource::default();
        if self.check_handle(id) {
            self.extractions.push(PendingExtraction {
                id,
                target: target.clone(),
            });
        }
        target
    }

    fn check_handle(&self, id: GraphResourceId) -> bool {
        if (id as usize) < self.resources.len() {
            true
        } else {
            contract_violation(self.config.fatal_contract_violations, RenderGraphError::UnknownResource { id });
            false
        }
    }

    fn last_pass_index(&self) -> Option<u32> {
        self.pass_nodes.len().checked_sub(1).map(|index| index as u32)
    }
}

/// Declares the resources of the pass it is bound to.
pub struct PassBuilder<'a> {
    graph: &'a mut RenderGraphBuilder,
    index: usize,
}

impl PassBuilder<'_> {
    #[must_use]
    pub fn create_image(&mut self, desc: ImageDesc) -> RenderGraphImage {
        self.create_with_state::<Image>(desc, None)
    }

    #[must_use]
    pub fn create_buffer(&mut self, desc: BufferDesc) -> RenderGraphBuffer {
        self.create_with_state::<Buffer>(desc, None)
    }

    #[must_use]
    pub fn create_uniform_buffer(&mut self, desc: BufferDesc) -> RenderGraphUniformBuffer {
        self.create_with_state::<UniformBuffer>(desc, None)
    }

    #[must_use]
    pub fn create_with_state<R: GraphResource>(&mut self, desc: R::Descriptor, forced_state: Option<ForcedState>) -> RenderGraphResource<R> {
        let resource = self.graph.create_resource::<R>(desc, Some(self.index as u32));
        self.node().resource_creates.push(ResourceAccess {
            id: resource.id,
            forced_state,
        });
        resource
    }

    pub fn read<R: GraphResource>(&mut self, resource: RenderGraphResource<R>) -> RenderGraphResource<R> {
        self.register_read(resource, None)
    }

    pub fn read_with_state<R: GraphResource>(&mut self, resource: RenderGraphResource<R>, state: ForcedState) -> RenderGraphResource<R> {
        self.register_read(resource, Some(state))
    }

    /// Declare an in place write. The returned handle is `resource` itself.
    pub fn write<R: GraphResource>(&mut self, resource: RenderGraphResource<R>) -> RenderGraphResource<R> {
        self.register_write(resource, None)
    }

    pub fn write_with_state<R: GraphResource>(&mut self, resource: RenderGraphResource<R>, state: ForcedState) -> RenderGraphResource<R> {
        self.register_write(resource, Some(state))
    }

    pub fn set_is_compute_pass(&mut self) {
        self.node().is_compute_pass = true;
    }

    /// Keep the pass alive even when nothing consumes its outputs.
    pub fn set_has_side_effect(&mut self) {
        self.node().has_side_effect = true;
    }

    pub fn add_external_image(&mut self, name: &str, image: PhysicalResource, initial_state: ResourceState) -> RenderGraphImage {
        self.graph.add_external_image(name, image, initial_state)
    }

    pub fn add_external_buffer(&mut self, name: &str, buffer: PhysicalResource, initial_state: ResourceState) -> RenderGraphBuffer {
        self.graph.add_external_buffer(name, buffer, initial_state)
    }

    pub fn add_external_uniform_buffer(&mut self, name: &str, buffer: PhysicalResource, initial_state: ResourceState) -> RenderGraphUniformBuffer {
        self.graph.add_external_uniform_buffer(name, buffer, initial_state)
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.graph.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.graph.blackboard
    }

    fn register_read<R: GraphResource>(&mut self, resource: RenderGraphResource<R>, forced_state: Option<ForcedState>) -> RenderGraphResource<R> {
        if !self.graph.check_handle(resource.id) {
            return resource;
        }

        let node = &self.graph.pass_nodes[self.index];
        if node.declares(resource.id) {
            warn!("Pass [{}] declared resource [{}] multiple time!", node.name, self.resource_name(resource.id));
            return resource;
        }

        self.node().resource_reads.push(ResourceAccess {
            id: resource.id,
            forced_state,
        });
        resource
    }

    fn register_write<R: GraphResource>(&mut self, resource: RenderGraphResource<R>, forced_state: Option<ForcedState>) -> RenderGraphResource<R> {
        if !self.graph.check_handle(resource.id) {
            return resource;
        }

        let node = &self.graph.pass_nodes[self.index];
        if node.creates(resource.id) {
            return resource;
        }
        if node.writes(resource.id) {
            warn!("Pass [{}] wrote resource [{}] multiple time!", node.name, self.resource_name(resource.id));
            return resource;
        }

        let node = self.node();
        // a write covers a previous read of the same pass
        node.resource_reads.retain(|access| access.id != resource.id);
        node.resource_writes.push(ResourceAccess {
            id: resource.id,
            forced_state,
        });
        resource
    }

    fn node(&mut self) -> &mut RenderGraphPassNode {
        &mut self.graph.pass_nodes[self.index]
    }

    fn resource_name(&self, id: GraphResourceId) -> &str {
        self.graph
            .resources
            .get(id as usize)
            .map_or("<unknown>", |storage| storage.name.as_str())
    }
}
