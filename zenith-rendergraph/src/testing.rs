//! Recording backend for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use anyhow::anyhow;
use parking_lot::Mutex;
use crate::builder::RenderGraphBuilder;
use crate::config::{RenderGraphConfig, RenderGraphConfigBuilder};
use crate::descriptor::{BufferDesc, ImageDesc, ImageFormat};
use crate::resource::{PhysicalResource, PhysicalResourceId};
use crate::rhi::{CommandContext, PipelineHandle, RenderingInfo, ResourceBarrierInfo, ResourceFactory, RhiResource};
use crate::state::ResourceState;
use crate::transient::TransientResourcePool;

#[derive(Debug)]
pub(crate) struct MockResource {
    name: Mutex<String>,
    size: u64,
    format: Option<ImageFormat>,
    contents: Mutex<Vec<u8>>,
    destroyed: Arc<AtomicU32>,
    dropped: AtomicBool,
}

impl MockResource {
    pub(crate) fn buffer(name: &str, size: u64, destroyed: Arc<AtomicU32>) -> Self {
        Self {
            name: Mutex::new(name.to_owned()),
            size,
            format: None,
            contents: Mutex::new(vec![0; size as usize]),
            destroyed,
            dropped: AtomicBool::new(false),
        }
    }

    pub(crate) fn image(name: &str, format: ImageFormat, size: u64, destroyed: Arc<AtomicU32>) -> Self {
        Self {
            name: Mutex::new(name.to_owned()),
            size,
            format: Some(format),
            contents: Mutex::new(Vec::new()),
            destroyed,
            dropped: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.contents.lock().clone()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }
}

impl RhiResource for MockResource {
    fn byte_size(&self) -> u64 {
        self.size
    }

    fn set_name(&self, name: &str) {
        *self.name.lock() = name.to_owned();
    }

    fn write_mapped(&self, offset: u64, data: &[u8]) -> anyhow::Result<()> {
        let mut contents = self.contents.lock();
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(anyhow!("write of {} bytes at {} overflows {} bytes", data.len(), offset, contents.len()));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn image_format(&self) -> Option<ImageFormat> {
        self.format
    }
}

impl Drop for MockResource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::Release);
        self.destroyed.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Default)]
pub(crate) struct MockFactory {
    created: AtomicU32,
    destroyed: Arc<AtomicU32>,
    fail_next: AtomicBool,
}

impl MockFactory {
    pub(crate) fn created_count(&self) -> u32 {
        self.created.load(Ordering::Acquire)
    }

    pub(crate) fn destroyed_count(&self) -> u32 {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn destroyed_counter(&self) -> Arc<AtomicU32> {
        self.destroyed.clone()
    }

    pub(crate) fn fail_next_creation(&self) {
        self.fail_next.store(true, Ordering::Release);
    }

    fn check_failure(&self, name: &str) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(anyhow!("out of device memory while creating [{name}]"));
        }
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl ResourceFactory for MockFactory {
    fn create_image(&self, desc: &ImageDesc) -> anyhow::Result<Arc<dyn RhiResource>> {
        self.check_failure(&desc.name)?;
        Ok(Arc::new(MockResource::image(&desc.name, desc.format, desc.estimated_size(), self.destroyed.clone())))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> anyhow::Result<Arc<dyn RhiResource>> {
        self.check_failure(&desc.name)?;
        Ok(Arc::new(MockResource::buffer(&desc.name, desc.size(), self.destroyed.clone())))
    }

    fn create_uniform_buffer(&self, desc: &BufferDesc) -> anyhow::Result<Arc<dyn RhiResource>> {
        self.create_buffer(desc)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Begin,
    End,
    Submit { wait: bool },
    Barrier(Vec<(PhysicalResourceId, ResourceState, ResourceState)>),
    BeginRendering { colors: Vec<PhysicalResourceId>, depth: Option<PhysicalResourceId> },
    EndRendering,
    Dispatch(u32, u32, u32),
    ClearImage(PhysicalResourceId),
    ClearBuffer(PhysicalResourceId, u32),
    CopyBuffer { src: PhysicalResourceId, dst: PhysicalResourceId, size: u64 },
    BindPipeline(u64),
    SetConstant(String, Vec<u8>),
    BeginMarker(String),
    EndMarker,
}

pub(crate) type CommandLog = Arc<Mutex<Vec<Command>>>;

#[derive(Default)]
pub(crate) struct MockCommandContext {
    log: CommandLog,
}

impl MockCommandContext {
    pub(crate) fn log(&self) -> CommandLog {
        self.log.clone()
    }

    fn record(&self, command: Command) {
        self.log.lock().push(command);
    }
}

impl CommandContext for MockCommandContext {
    fn begin(&mut self) {
        self.record(Command::Begin);
    }

    fn end(&mut self) {
        self.record(Command::End);
    }

    fn submit(&mut self, wait_for_completion: bool) {
        self.record(Command::Submit { wait: wait_for_completion });
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrierInfo]) {
        self.record(Command::Barrier(
            barriers
                .iter()
                .map(|barrier| (barrier.resource.id(), barrier.src, barrier.dst))
                .collect()
        ));
    }

    fn begin_rendering(&mut self, info: &RenderingInfo) {
        self.record(Command::BeginRendering {
            colors: info.color_attachments.iter().map(|attachment| attachment.image.id()).collect(),
            depth: info.depth_attachment.as_ref().map(|attachment| attachment.image.id()),
        });
    }

    fn end_rendering(&mut self) {
        self.record(Command::EndRendering);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch(x, y, z));
    }

    fn clear_image(&mut self, image: &PhysicalResource, _color: [f32; 4]) {
        self.record(Command::ClearImage(image.id()));
    }

    fn clear_buffer(&mut self, buffer: &PhysicalResource, value: u32) {
        self.record(Command::ClearBuffer(buffer.id(), value));
    }

    fn copy_buffer(&mut self, src: &PhysicalResource, dst: &PhysicalResource, size: u64) {
        self.record(Command::CopyBuffer { src: src.id(), dst: dst.id(), size });
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.record(Command::BindPipeline(pipeline.0));
    }

    fn set_constant(&mut self, name: &str, data: &[u8]) {
        self.record(Command::SetConstant(name.to_owned(), data.to_vec()));
    }

    fn begin_marker(&mut self, name: &str) {
        self.record(Command::BeginMarker(name.to_owned()));
    }

    fn end_marker(&mut self) {
        self.record(Command::EndMarker);
    }
}

pub(crate) struct TestBackend {
    pub(crate) factory: Arc<MockFactory>,
    pub(crate) pool: Arc<TransientResourcePool>,
    pub(crate) config: RenderGraphConfig,
}

impl TestBackend {
    pub(crate) fn new() -> Self {
        Self::with_fatal_violations(true)
    }

    pub(crate) fn with_fatal_violations(fatal: bool) -> Self {
        zenith_core::log::initialize_for_test();

        let config = RenderGraphConfigBuilder::default()
            .fatal_contract_violations(fatal)
            .build()
            .unwrap();
        let factory = Arc::new(MockFactory::default());
        let pool = Arc::new(TransientResourcePool::new(factory.clone(), &config));

        Self {
            factory,
            pool,
            config,
        }
    }

    /// A fresh graph together with the log of the commands it records.
    pub(crate) fn graph(&self) -> (RenderGraphBuilder, CommandLog) {
        let context = MockCommandContext::default();
        let log = context.log();
        (RenderGraphBuilder::with_config(Box::new(context), self.pool.clone(), self.config.clone()), log)
    }

    pub(crate) fn external_buffer(&self, name: &str, size: u64) -> (Arc<MockResource>, PhysicalResource) {
        let raw = Arc::new(MockResource::buffer(name, size, self.factory.destroyed_counter()));
        let resource = PhysicalResource::new(crate::interface::ResourceType::Buffer, raw.clone());
        (raw, resource)
    }

    pub(crate) fn external_image(&self, name: &str, format: ImageFormat) -> (Arc<MockResource>, PhysicalResource) {
        let raw = Arc::new(MockResource::image(name, format, 1024, self.factory.destroyed_counter()));
        let resource = PhysicalResource::new(crate::interface::ResourceType::Image, raw.clone());
        (raw, resource)
    }
}

/// Barrier batches recorded in `log`, in order.
pub(crate) fn barrier_batches(log: &CommandLog) -> Vec<Vec<(PhysicalResourceId, ResourceState, ResourceState)>> {
    log.lock()
        .iter()
        .filter_map(|command| match command {
            Command::Barrier(barriers) => Some(barriers.clone()),
            _ => None,
        })
        .collect()
}
