use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::descriptor::ImageFormat;
use crate::interface::{Buffer, Image, ResourceDescriptor, ResourceType, UniformBuffer};
use crate::rhi::RhiResource;
use crate::state::ResourceState;

pub trait GraphResource: Debug + Copy + Send + Sync + 'static {
    type Descriptor: Clone + Debug;

    const TYPE: ResourceType;

    fn wrap_descriptor(desc: Self::Descriptor) -> ResourceDescriptor;
}

/// Identifier unique represent an inner resource owned by render graph.
///
/// ## Safety
/// Used in the same render graph context. Should NOT be used across multiple render graph.
pub type GraphResourceId = u32;

/// Typed logical handle of a render graph resource.
///
/// Writing to a resource keeps its handle, there is no versioning.
#[repr(transparent)]
pub struct RenderGraphResource<R: GraphResource> {
    pub(crate) id: GraphResourceId,
    pub(crate) _marker: PhantomData<R>,
}

pub type RenderGraphImage = RenderGraphResource<Image>;
pub type RenderGraphBuffer = RenderGraphResource<Buffer>;
pub type RenderGraphUniformBuffer = RenderGraphResource<UniformBuffer>;

impl<R: GraphResource> RenderGraphResource<R> {
    #[inline]
    pub(crate) fn from_raw(id: GraphResourceId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> GraphResourceId {
        self.id
    }

    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        R::TYPE
    }
}

impl<R: GraphResource> Clone for RenderGraphResource<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: GraphResource> Copy for RenderGraphResource<R> {}

impl<R: GraphResource> PartialEq for RenderGraphResource<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R: GraphResource> Eq for RenderGraphResource<R> {}

impl<R: GraphResource> Hash for RenderGraphResource<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<R: GraphResource> Debug for RenderGraphResource<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", R::TYPE, self.id)
    }
}

// SAFETY: transparent over a `u32`, the marker is zero sized.
unsafe impl<R: GraphResource> bytemuck::Zeroable for RenderGraphResource<R> {}
// SAFETY: every bit pattern is a valid (possibly unknown) id and there is no padding.
unsafe impl<R: GraphResource> bytemuck::Pod for RenderGraphResource<R> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalResourceId(u64);

impl PhysicalResourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        PhysicalResourceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for PhysicalResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Physical#{}", self.0)
    }
}

/// A GPU object paired with a process unique id.
///
/// Cloning shares the same object, equality compares the id.
#[derive(Clone)]
pub struct PhysicalResource {
    id: PhysicalResourceId,
    resource_type: ResourceType,
    raw: Arc<dyn RhiResource>,
}

impl PhysicalResource {
    pub fn new(resource_type: ResourceType, raw: Arc<dyn RhiResource>) -> Self {
        Self {
            id: PhysicalResourceId::new(),
            resource_type,
            raw,
        }
    }

    #[inline]
    pub fn id(&self) -> PhysicalResourceId {
        self.id
    }

    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[inline]
    pub fn raw(&self) -> &Arc<dyn RhiResource> {
        &self.raw
    }

    #[inline]
    pub fn byte_size(&self) -> u64 {
        self.raw.byte_size()
    }
}

impl PartialEq for PhysicalResource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PhysicalResource {}

impl Debug for PhysicalResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {:?})", self.id, self.resource_type, self.raw)
    }
}

pub(crate) enum ResourceOrigin {
    /// Materialized by the transient resource system. `producer` is `None` for graph level resources.
    Transient {
        descriptor: ResourceDescriptor,
        producer: Option<u32>,
    },
    External {
        resource: PhysicalResource,
        initial_state: ResourceState,
    },
}

pub(crate) struct ResourceStorage {
    pub(crate) name: String,
    pub(crate) id: GraphResourceId,
    pub(crate) resource_type: ResourceType,
    pub(crate) hash: u64,
    pub(crate) origin: ResourceOrigin,
    pub(crate) is_extracted: bool,
}

impl ResourceStorage {
    pub(crate) fn transient(id: GraphResourceId, descriptor: ResourceDescriptor, producer: Option<u32>) -> Self {
        Self {
            name: descriptor.name().to_owned(),
            id,
            resource_type: descriptor.resource_type(),
            hash: descriptor.content_hash(),
            origin: ResourceOrigin::Transient {
                descriptor,
                producer,
            },
            is_extracted: false,
        }
    }

    pub(crate) fn external(id: GraphResourceId, name: String, resource: PhysicalResource, initial_state: ResourceState) -> Self {
        Self {
            name,
            id,
            resource_type: resource.resource_type(),
            hash: 0,
            origin: ResourceOrigin::External {
                resource,
                initial_state,
            },
            is_extracted: false,
        }
    }

    #[inline]
    pub(crate) fn is_external(&self) -> bool {
        matches!(self.origin, ResourceOrigin::External { .. })
    }

    pub(crate) fn descriptor(&self) -> Option<&ResourceDescriptor> {
        match &self.origin {
            ResourceOrigin::Transient { descriptor, .. } => Some(descriptor),
            ResourceOrigin::External { .. } => None,
        }
    }

    pub(crate) fn initial_state(&self) -> Option<ResourceState> {
        match &self.origin {
            ResourceOrigin::External { initial_state, .. } => Some(*initial_state),
            ResourceOrigin::Transient { .. } => None,
        }
    }

    /// Resources observed outside of the graph keep their writers alive.
    pub(crate) fn is_persistent_output(&self) -> bool {
        self.is_extracted || match &self.origin {
            ResourceOrigin::External { .. } => true,
            ResourceOrigin::Transient { producer, .. } => producer.is_none(),
        }
    }

    /// Transient resources go back to the pool after their last use.
    pub(crate) fn is_surrenderable(&self) -> bool {
        !self.is_external() && !self.is_extracted
    }

    pub(crate) fn image_format(&self) -> Option<ImageFormat> {
        match &self.origin {
            ResourceOrigin::Transient { descriptor: ResourceDescriptor::Image(desc), .. } => Some(desc.format),
            ResourceOrigin::Transient { .. } => None,
            ResourceOrigin::External { resource, .. } => resource.raw().image_format(),
        }
    }

    #[inline]
    pub(crate) fn is_depth(&self) -> bool {
        self.image_format().is_some_and(ImageFormat::is_depth)
    }
}

pub(crate) mod utility {
    use crate::resource::{GraphResourceId, ResourceStorage};

    #[inline]
    pub(crate) fn resource_storage_ref(storage: &[ResourceStorage], id: GraphResourceId) -> Option<&ResourceStorage> {
        storage.get(id as usize)
    }
}
