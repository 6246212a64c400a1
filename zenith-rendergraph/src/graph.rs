use log::{debug, error, trace, warn};
use zenith_core::collections::SmallVec;
use crate::barrier::{BarrierPlan, CompiledPass, PassBarrier};
use crate::builder::{AllocatedSizeCallback, GraphMarker, MarkerCommand, PendingExtraction};
use crate::config::RenderGraphConfig;
use crate::context::RenderContext;
use crate::error::RenderGraphError;
use crate::interface::ResourceDescriptor;
use crate::node::RenderGraphPassNode;
use crate::resource::{ResourceOrigin, ResourceStorage};
use crate::rhi::{CommandContext, ResourceBarrierInfo};
use crate::transient::TransientResourceSystem;

/// What one execution of a render graph did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionReport {
    pub executed_passes: u32,
    pub culled_passes: u32,
    pub barriers: u32,
    /// Bytes freshly allocated for this graph, reused pool entries are not counted.
    pub allocated_bytes: u64,
}

/// A culled, barrier annotated render graph ready to run.
pub struct CompiledRenderGraph {
    config: RenderGraphConfig,
    command_context: Box<dyn CommandContext>,
    transient: TransientResourceSystem,

    pass_nodes: Vec<RenderGraphPassNode>,
    resources: Vec<ResourceStorage>,
    plan: BarrierPlan,

    markers: Vec<GraphMarker>,
    extractions: Vec<PendingExtraction>,
    allocated_size_callback: Option<AllocatedSizeCallback>,
}

impl CompiledRenderGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        command_context: Box<dyn CommandContext>,
        transient: TransientResourceSystem,
        config: RenderGraphConfig,
        pass_nodes: Vec<RenderGraphPassNode>,
        resources: Vec<ResourceStorage>,
        plan: BarrierPlan,
        markers: Vec<GraphMarker>,
        extractions: Vec<PendingExtraction>,
        allocated_size_callback: Option<AllocatedSizeCallback>,
    ) -> Self {
        Self {
            config,
            command_context,
            transient,
            pass_nodes,
            resources,
            plan,
            markers,
            extractions,
            allocated_size_callback,
        }
    }

    pub fn pass_nodes(&self) -> &[RenderGraphPassNode] {
        &self.pass_nodes
    }

    pub fn pass(&self, name: &str) -> Option<&RenderGraphPassNode> {
        self.pass_nodes.iter().find(|node| node.name == name)
    }

    /// Barriers issued right before the named pass.
    pub fn barriers(&self, pass_name: &str) -> Option<&[PassBarrier]> {
        let node = self.pass(pass_name)?;
        self.plan
            .passes
            .get(node.index as usize)
            .map(|compiled| compiled.barriers.as_slice())
    }

    /// Standalone barriers issued right after the named pass.
    pub fn post_barriers(&self, pass_name: &str) -> Option<&[PassBarrier]> {
        let node = self.pass(pass_name)?;
        self.plan
            .passes
            .get(node.index as usize)
            .map(|compiled| compiled.post_barriers.as_slice())
    }

    pub(crate) fn plan(&self) -> &BarrierPlan {
        &self.plan
    }

    pub fn transient(&self) -> &TransientResourceSystem {
        &self.transient
    }

    pub fn execute_immediate(self) -> Result<ExecutionReport, RenderGraphError> {
        self.execute(false)
    }

    /// Execute, then block until the GPU finished the submitted work.
    pub fn execute_immediate_and_wait(self) -> Result<ExecutionReport, RenderGraphError> {
        self.execute(true)
    }

    fn execute(self, wait_for_completion: bool) -> Result<ExecutionReport, RenderGraphError> {
        let CompiledRenderGraph {
            config,
            mut command_context,
            transient,
            mut pass_nodes,
            resources,
            plan,
            markers,
            extractions,
            allocated_size_callback,
        } = self;

        for storage in &resources {
            if let ResourceOrigin::External { resource, .. } = &storage.origin {
                transient.add_external(storage.id, resource.clone());
            }
        }

        let mut executor = PassExecutor {
            fatal_contract_violations: config.fatal_contract_violations,
            command_context: command_context.as_mut(),
            transient: &transient,
            resources: &resources,
            report: ExecutionReport::default(),
        };

        executor.command_context.begin();
        let recorded = executor.record(&mut pass_nodes, &plan, &markers);
        executor.command_context.end();
        let mut report = executor.report;
        recorded?;

        command_context.submit(wait_for_completion);

        report.allocated_bytes = transient.total_allocated_size();
        if let Some(callback) = allocated_size_callback {
            callback(report.allocated_bytes);
        }

        for extraction in extractions {
            match extract(&transient, &resources, &extraction) {
                Ok(()) => {}
                Err(err) => error!("Failed to extract resource #{}: {err}", extraction.id),
            }
        }

        transient.release_all();
        debug!(
            "Executed render graph: {} pass(es), {} culled, {} barrier(s), {} byte(s) allocated",
            report.executed_passes, report.culled_passes, report.barriers, report.allocated_bytes
        );
        Ok(report)
    }
}

impl std::fmt::Debug for CompiledRenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRenderGraph")
            .field("pass_nodes", &self.pass_nodes)
            .field("resources", &self.resources.len())
            .field("markers", &self.markers.len())
            .field("extractions", &self.extractions.len())
            .finish()
    }
}

struct PassExecutor<'a> {
    fatal_contract_violations: bool,
    command_context: &'a mut dyn CommandContext,
    transient: &'a TransientResourceSystem,
    resources: &'a [ResourceStorage],
    report: ExecutionReport,
}

impl PassExecutor<'_> {
    fn record(
        &mut self,
        pass_nodes: &mut [RenderGraphPassNode],
        plan: &BarrierPlan,
        markers: &[GraphMarker],
    ) -> Result<(), RenderGraphError> {
        self.emit_markers(markers, None);
        self.issue_barriers(&plan.leading_barriers);

        for (index, compiled) in plan.passes.iter().enumerate() {
            let node = &mut pass_nodes[index];

            if node.is_culled() {
                trace!("Skip culled pass [{}]", node.name);
                self.report.culled_passes += 1;
            } else {
                let pass = node.pass.take();
                let node = &pass_nodes[index];

                self.command_context.begin_marker(&node.name);
                self.prepare(compiled)?;

                if let Some(pass) = pass {
                    let mut context = RenderContext::new(
                        node,
                        self.resources,
                        self.transient,
                        &mut *self.command_context,
                        self.fatal_contract_violations,
                    );
                    pass.execute(&mut context);
                }

                self.command_context.end_marker();
                self.report.executed_passes += 1;
            }

            self.issue_barriers(&compiled.post_barriers);
            self.emit_markers(markers, Some(index as u32));
            self.surrender(compiled)?;
        }

        Ok(())
    }

    /// Materialize, transition and clear everything the pass is about to touch.
    fn prepare(&mut self, compiled: &CompiledPass) -> Result<(), RenderGraphError> {
        for id in &compiled.materialize {
            if let Some(descriptor) = self.resources[*id as usize].descriptor() {
                self.transient.acquire(*id, descriptor)?;
            }
        }

        self.issue_barriers(&compiled.barriers);

        for barrier in compiled.barriers.iter().filter(|barrier| barrier.clear) {
            let Some(resource) = self.transient.get_raw(barrier.resource) else { continue };
            match self.resources[barrier.resource as usize].descriptor() {
                Some(ResourceDescriptor::Image(desc)) => self.command_context.clear_image(&resource, desc.clear_color),
                Some(_) => self.command_context.clear_buffer(&resource, 0),
                None => {}
            }
        }

        Ok(())
    }

    fn issue_barriers(&mut self, barriers: &[PassBarrier]) {
        if barriers.is_empty() {
            return;
        }

        let barrier_infos = barriers
            .iter()
            .filter_map(|barrier| match self.transient.get_raw(barrier.resource) {
                Some(resource) => Some(ResourceBarrierInfo {
                    resource,
                    src: barrier.src,
                    dst: barrier.dst,
                }),
                None => {
                    error!("Resource #{} has no physical resource to transition", barrier.resource);
                    None
                }
            })
            .collect::<SmallVec<[ResourceBarrierInfo; 8]>>();

        if !barrier_infos.is_empty() {
            self.report.barriers += barrier_infos.len() as u32;
            self.command_context.resource_barrier(&barrier_infos);
        }
    }

    fn emit_markers(&mut self, markers: &[GraphMarker], after_pass: Option<u32>) {
        for marker in markers.iter().filter(|marker| marker.after_pass == after_pass) {
            match &marker.command {
                MarkerCommand::Begin(name) => self.command_context.begin_marker(name),
                MarkerCommand::End => self.command_context.end_marker(),
            }
        }
    }

    fn surrender(&mut self, compiled: &CompiledPass) -> Result<(), RenderGraphError> {
        for (id, hash) in &compiled.surrender {
            self.transient.surrender(*id, *hash)?;
        }
        Ok(())
    }
}

fn extract(transient: &TransientResourceSystem, resources: &[ResourceStorage], extraction: &PendingExtraction) -> Result<(), RenderGraphError> {
    let storage = resources
        .get(extraction.id as usize)
        .ok_or(RenderGraphError::UnknownResource { id: extraction.id })?;

    let resource = match &storage.origin {
        ResourceOrigin::External { resource, .. } => resource.clone(),
        ResourceOrigin::Transient { descriptor, .. } => match transient.take(extraction.id) {
            Some(resource) => resource,
            None => {
                warn!("Extracted resource [{}] was never written by the graph", storage.name);
                transient.acquire(extraction.id, descriptor)?;
                transient
                    .take(extraction.id)
                    .ok_or(RenderGraphError::NotAllocated { id: extraction.id })?
            }
        },
    };

    extraction.target.fill(resource);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use parking_lot::Mutex;
    use crate::descriptor::{BufferDesc, BufferUsage, ImageDesc, ImageFormat, MemoryUsage};
    use crate::resource::{RenderGraphBuffer, RenderGraphImage, RenderGraphUniformBuffer};
    use crate::rhi::PipelineHandle;
    use crate::state::{BarrierAccess, BarrierStage, ImageLayout, ResourceState};
    use crate::testing::{barrier_batches, Command, TestBackend};
    use super::*;

    #[test]
    fn passes_run_in_registration_order() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["shadow", "gbuffer", "lighting"] {
            let order = order.clone();
            graph.add_pass(
                name,
                |builder| builder.set_has_side_effect(),
                move |context| order.lock().push(context.pass_name().to_owned()),
            );
        }

        let report = graph.compile().unwrap().execute_immediate().unwrap();
        assert_eq!(*order.lock(), ["shadow", "gbuffer", "lighting"]);
        assert_eq!(report.executed_passes, 3);

        let log = log.lock();
        assert_eq!(log.first(), Some(&Command::Begin));
        assert_eq!(log[log.len() - 2], Command::End);
        assert_eq!(log.last(), Some(&Command::Submit { wait: false }));
    }

    #[test]
    fn culled_passes_are_not_executed() {
        let backend = TestBackend::new();
        let (mut graph, _) = backend.graph();
        let executed = Arc::new(Mutex::new(false));

        let flag = executed.clone();
        graph.add_pass(
            "dead",
            |builder| { let _ = builder.create_buffer(BufferDesc::new("unused", 4, 4, BufferUsage::STORAGE)); },
            move |_| *flag.lock() = true,
        );

        let report = graph.compile().unwrap().execute_immediate().unwrap();
        assert!(!*executed.lock());
        assert_eq!(report.culled_passes, 1);
        assert_eq!(report.allocated_bytes, 0);
        assert_eq!(backend.factory.created_count(), 0);
    }

    #[derive(Clone, Copy)]
    struct Undeclared {
        image: RenderGraphImage,
        buffer: RenderGraphBuffer,
        uniform: RenderGraphUniformBuffer,
    }

    fn access_undeclared(fatal: bool, access: fn(&mut RenderContext, Undeclared)) {
        let backend = TestBackend::with_fatal_violations(fatal);
        let (mut graph, _) = backend.graph();

        let handles = Undeclared {
            image: graph.create_image(ImageDesc::new_2d("image", 16, 16, ImageFormat::Rgba8Unorm)),
            buffer: graph.create_buffer(BufferDesc::new("buffer", 4, 4, BufferUsage::STORAGE)),
            uniform: graph.create_uniform_buffer(BufferDesc::new("uniform", 64, 1, BufferUsage::UNIFORM)),
        };

        graph.add_pass(
            "sneaky",
            |builder| builder.set_has_side_effect(),
            move |context| access(context, handles),
        );

        graph.compile().unwrap().execute_immediate().unwrap();
    }

    #[test]
    fn undeclared_access_is_an_error_when_not_fatal() {
        zenith_core::log::initialize_for_test();

        access_undeclared(false, |context, handles| {
            assert!(matches!(context.get_image(handles.image), Err(RenderGraphError::UndeclaredResourceAccess { .. })));
            assert!(matches!(context.get_buffer(handles.buffer), Err(RenderGraphError::UndeclaredResourceAccess { .. })));
            assert!(matches!(context.get_uniform_buffer(handles.uniform), Err(RenderGraphError::UndeclaredResourceAccess { .. })));
        });
    }

    #[test]
    #[should_panic(expected = "without declaring it")]
    fn undeclared_image_access_is_fatal() {
        access_undeclared(true, |context, handles| {
            let _ = context.get_image(handles.image);
        });
    }

    #[test]
    #[should_panic(expected = "without declaring it")]
    fn undeclared_buffer_access_is_fatal() {
        access_undeclared(true, |context, handles| {
            let _ = context.get_buffer(handles.buffer);
        });
    }

    #[test]
    #[should_panic(expected = "without declaring it")]
    fn undeclared_uniform_buffer_access_is_fatal() {
        access_undeclared(true, |context, handles| {
            let _ = context.get_uniform_buffer(handles.uniform);
        });
    }

    #[test]
    fn sequential_buffers_alias_within_one_graph() {
        let backend = TestBackend::new();
        let (mut graph, _) = backend.graph();
        let physical = Arc::new(Mutex::new(Vec::new()));

        for name in ["A", "B"] {
            let physical = physical.clone();
            graph.add_pass_with_data(
                name,
                |builder| {
                    builder.set_has_side_effect();
                    builder.create_buffer(BufferDesc::new(name, 1024, 1, BufferUsage::STORAGE))
                },
                move |buffer, context| physical.lock().push(context.get_buffer(*buffer).unwrap().id()),
            );
        }

        graph.compile().unwrap().execute_immediate().unwrap();

        let physical = physical.lock();
        assert_eq!(physical[0], physical[1]);
        assert_eq!(backend.factory.created_count(), 1);
        assert_eq!(backend.pool.surrendered_count(), 1);
    }

    #[test]
    fn pooled_resources_survive_across_graphs() {
        let backend = TestBackend::new();
        let allocated = Arc::new(AtomicU64::new(u64::MAX));

        for _ in 0..3 {
            let (mut graph, _) = backend.graph();
            graph.add_pass(
                "transient",
                |builder| {
                    builder.set_has_side_effect();
                    let _ = builder.create_image(ImageDesc::new_2d("hdr", 128, 128, ImageFormat::Rgba16Float));
                },
                |_| {},
            );

            let allocated = allocated.clone();
            graph.set_total_allocated_size_callback(move |bytes| allocated.store(bytes, Ordering::Release));
            graph.compile().unwrap().execute_immediate().unwrap();
        }

        assert_eq!(backend.factory.created_count(), 1);
        assert_eq!(backend.pool.total_allocated_bytes(), 128 * 128 * 8);
        // only the first graph allocated
        assert_eq!(allocated.load(Ordering::Acquire), 0);
        assert_eq!(backend.factory.destroyed_count(), 0);
    }

    #[test]
    fn render_target_to_shader_read_emits_one_barrier() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();

        let color = graph.add_pass_with_data(
            "draw",
            |builder| builder.create_image(ImageDesc::new_2d("color", 64, 64, ImageFormat::Rgba8Unorm)),
            |color, context| {
                context.begin_rendering(&[*color], None).unwrap();
                context.end_rendering();
            },
        );
        for name in ["blur", "tonemap"] {
            graph.add_pass(
                name,
                |builder| {
                    builder.read(color);
                    builder.set_has_side_effect();
                },
                |_| {},
            );
        }

        let graph = graph.compile().unwrap();
        let blur = graph.barriers("blur").unwrap();
        assert_eq!(blur.len(), 1);
        assert_eq!(blur[0].src.access, BarrierAccess::RENDER_TARGET);
        assert_eq!(blur[0].dst.access, BarrierAccess::SHADER_READ);
        assert!(graph.barriers("tonemap").unwrap().is_empty());

        let report = graph.execute_immediate().unwrap();
        assert_eq!(report.barriers, 2);
        assert_eq!(barrier_batches(&log).len(), 2);
        assert!(log.lock().iter().any(|command| matches!(command, Command::BeginRendering { colors, depth: None } if colors.len() == 1)));
    }

    #[test]
    fn clear_on_create_is_recorded_after_barrier() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();

        graph.add_pass(
            "clear",
            |builder| {
                builder.set_has_side_effect();
                let _ = builder.create_image(ImageDesc::new_2d("cleared", 8, 8, ImageFormat::Rgba8Unorm).with_clear([0.0, 0.0, 0.0, 1.0]));
            },
            |_| {},
        );

        graph.compile().unwrap().execute_immediate().unwrap();

        let log = log.lock();
        let barrier = log.iter().position(|command| matches!(command, Command::Barrier(_))).unwrap();
        let clear = log.iter().position(|command| matches!(command, Command::ClearImage(_))).unwrap();
        assert!(barrier < clear);
    }

    #[test]
    fn external_resources_keep_their_initial_state_and_survive() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();
        let (raw, swapchain) = backend.external_image("swapchain", ImageFormat::Bgra8Unorm);
        let present = ResourceState::new(BarrierAccess::NONE, BarrierStage::NONE, ImageLayout::Present);

        let backbuffer = graph.add_external_image("swapchain", swapchain.clone(), present);
        graph.add_pass("blit", |builder| { builder.write(backbuffer); }, |_| {});
        graph.add_resource_barrier(backbuffer, present);

        let graph = graph.compile().unwrap();
        assert_eq!(graph.barriers("blit").unwrap()[0].src, present);
        assert_eq!(graph.post_barriers("blit").unwrap()[0].dst, present);
        graph.execute_immediate().unwrap();

        let batches = barrier_batches(&log);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec![(swapchain.id(), batches[0][0].2, present)]);

        backend.pool.clear();
        drop(swapchain);
        assert_eq!(backend.pool.surrendered_count(), 0);
        assert!(!raw.is_destroyed());
        assert_eq!(Arc::strong_count(&raw), 1);
    }

    #[test]
    fn uploads_write_through_mapping() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();
        let (raw, constants) = backend.external_buffer("constants", 8);
        let (_, vertices) = backend.external_buffer("vertices", 4);

        let constants = graph.add_external_buffer("constants", constants, ResourceState::UNDEFINED);
        let vertices_handle = graph.add_external_buffer("vertices", vertices.clone(), ResourceState::UNDEFINED);

        graph.add_mapped_buffer_upload(constants, vec![1, 2, 3, 4], "upload constants");
        graph.add_staged_buffer_upload(vertices_handle, vec![9, 9, 9, 9], "upload vertices");

        graph.compile().unwrap().execute_immediate().unwrap();

        assert_eq!(&raw.contents()[..4], &[1, 2, 3, 4]);

        let log = log.lock();
        let copy = log
            .iter()
            .find_map(|command| match command {
                Command::CopyBuffer { src, dst, size } => Some((*src, *dst, *size)),
                _ => None,
            })
            .unwrap();
        assert_eq!(copy.1, vertices.id());
        assert_eq!(copy.2, 4);
        assert_ne!(copy.0, vertices.id());

        // the staging buffer is transient and went back to the pool
        let staging = BufferDesc {
            element_size: 1,
            count: 4,
            usage: BufferUsage::TRANSFER_SRC,
            memory_usage: MemoryUsage::CpuToGpu,
            ..Default::default()
        };
        assert_eq!(backend.pool.surrendered_count_for(staging.content_hash()), 1);
    }

    #[test]
    fn extracted_resources_leave_the_graph() {
        let backend = TestBackend::new();
        let (mut graph, _) = backend.graph();

        let luminance = graph.add_pass_with_data(
            "histogram",
            |builder| builder.create_buffer(BufferDesc::new("luminance", 4, 256, BufferUsage::STORAGE)),
            |buffer, context| context.clear_buffer(*buffer, 0).unwrap(),
        );
        let extracted = graph.enqueue_buffer_extraction(luminance);
        assert!(extracted.get().is_none());

        graph.compile().unwrap().execute_immediate().unwrap();

        let resource = extracted.take().unwrap();
        assert_eq!(resource.byte_size(), 1024);
        assert!(!backend.pool.is_surrendered(&resource));
        assert_eq!(backend.pool.surrendered_count(), 0);
    }

    #[test]
    fn readback_copies_into_user_buffer() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();
        let (raw, destination) = backend.external_buffer("cpu luminance", 512);

        let desc = BufferDesc::new("luminance", 4, 256, BufferUsage::STORAGE | BufferUsage::TRANSFER_SRC);
        let luminance = graph.add_pass_with_data(
            "histogram",
            |builder| builder.create_buffer(desc.clone()),
            |buffer, context| context.clear_buffer(*buffer, 0).unwrap(),
        );
        graph.enqueue_buffer_readback(luminance, destination.clone());

        let graph = graph.compile().unwrap();
        assert!(!graph.pass("histogram").unwrap().is_culled());
        let report = graph.execute_immediate().unwrap();
        assert_eq!(report.executed_passes, 2);

        let log = log.lock();
        let copies = log
            .iter()
            .filter_map(|command| match command {
                Command::CopyBuffer { src, dst, size } => Some((*src, *dst, *size)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(copies.len(), 1);
        assert_ne!(copies[0].0, destination.id());
        assert_eq!(copies[0].1, destination.id());
        assert_eq!(copies[0].2, 512);

        // the source went back to the pool, the destination stays with its owner
        assert_eq!(backend.pool.surrendered_count_for(desc.content_hash()), 1);
        assert!(!backend.pool.is_surrendered(&destination));
        assert!(!raw.is_destroyed());
    }

    #[test]
    fn graph_level_image_is_cleared_on_first_write() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();

        let history = graph.create_image(ImageDesc::new_2d("history", 16, 16, ImageFormat::Rgba16Float).with_clear([0.0; 4]));
        graph.add_pass("accumulate", |builder| { builder.write(history); }, |_| {});
        graph.compile().unwrap().execute_immediate().unwrap();

        let log = log.lock();
        let clears = log.iter().filter(|command| matches!(command, Command::ClearImage(_))).count();
        assert_eq!(clears, 1);
    }

    #[test]
    fn markers_wrap_passes() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();

        graph.begin_marker("frame");
        graph.add_pass("present", |builder| builder.set_has_side_effect(), |context| {
            context.bind_pipeline(PipelineHandle(7));
            context.set_constant("exposure", &1.0f32);
            context.dispatch(8, 8, 1);
        });
        graph.end_marker();

        graph.compile().unwrap().execute_immediate_and_wait().unwrap();

        let log = log.lock();
        assert_eq!(
            log.as_slice(),
            &[
                Command::Begin,
                Command::BeginMarker("frame".to_owned()),
                Command::BeginMarker("present".to_owned()),
                Command::BindPipeline(7),
                Command::SetConstant("exposure".to_owned(), 1.0f32.to_ne_bytes().to_vec()),
                Command::Dispatch(8, 8, 1),
                Command::EndMarker,
                Command::EndMarker,
                Command::End,
                Command::Submit { wait: true },
            ]
        );
    }

    #[test]
    fn creation_failure_aborts_execution() {
        let backend = TestBackend::new();
        let (mut graph, log) = backend.graph();

        graph.add_pass(
            "allocate",
            |builder| {
                builder.set_has_side_effect();
                let _ = builder.create_buffer(BufferDesc::new("huge", 1 << 20, 1 << 20, BufferUsage::STORAGE));
            },
            |_| panic!("pass must not run"),
        );

        backend.factory.fail_next_creation();
        let err = graph.compile().unwrap().execute_immediate().unwrap_err();
        assert!(matches!(err, RenderGraphError::ResourceCreation { .. }));
        assert!(!log.lock().iter().any(|command| matches!(command, Command::Submit { .. })));
    }
}
