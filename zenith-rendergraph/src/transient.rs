use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use log::{debug, trace, warn};
use parking_lot::Mutex;
use zenith_core::collections::hashmap::HashMap;
use crate::config::RenderGraphConfig;
use crate::descriptor::{BufferDesc, ImageDesc};
use crate::error::{contract_violation, RenderGraphError};
use crate::interface::{ResourceDescriptor, ResourceType};
use crate::resource::{GraphResource, GraphResourceId, PhysicalResource, RenderGraphBuffer, RenderGraphImage, RenderGraphResource, RenderGraphUniformBuffer};
use crate::rhi::{ResourceFactory, RhiResource};
#[cfg(any(debug_assertions, feature = "resource-tracking"))]
use crate::diagnostics::ResourceTracker;

/// Physical resources shared by all graphs created from the same device.
///
/// Surrendered resources wait here keyed by the content hash of their description, until a
/// later acquisition with an equal description picks them up. Pooled resources are destroyed
/// with the pool.
pub struct TransientResourcePool {
    factory: Arc<dyn ResourceFactory>,
    enable_memory_aliasing: bool,

    surrendered_resources: Mutex<HashMap<u64, Vec<PhysicalResource>>>,

    total_allocated_bytes: AtomicU64,
    total_allocation_count: AtomicU64,
}

impl TransientResourcePool {
    pub fn new(factory: Arc<dyn ResourceFactory>, config: &RenderGraphConfig) -> Self {
        Self {
            factory,
            enable_memory_aliasing: config.enable_memory_aliasing,
            surrendered_resources: Mutex::new(HashMap::new()),
            total_allocated_bytes: AtomicU64::new(0),
            total_allocation_count: AtomicU64::new(0),
        }
    }

    /// Bytes of every resource this pool ever created.
    pub fn total_allocated_bytes(&self) -> u64 {
        self.total_allocated_bytes.load(Ordering::Relaxed)
    }

    pub fn total_allocation_count(&self) -> u64 {
        self.total_allocation_count.load(Ordering::Relaxed)
    }

    pub fn surrendered_count(&self) -> usize {
        self.surrendered_resources
            .lock()
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn surrendered_count_for(&self, hash: u64) -> usize {
        self.surrendered_resources
            .lock()
            .get(&hash)
            .map_or(0, Vec::len)
    }

    pub fn is_surrendered(&self, resource: &PhysicalResource) -> bool {
        self.surrendered_resources
            .lock()
            .values()
            .any(|resources| resources.contains(resource))
    }

    /// Destroy every pooled resource.
    pub fn clear(&self) {
        let resources = std::mem::take(&mut *self.surrendered_resources.lock());
        debug!("Destroy {} pooled transient resource(s)", resources.values().map(Vec::len).sum::<usize>());
    }

    pub(crate) fn take_surrendered(&self, hash: u64, resource_type: ResourceType) -> Option<PhysicalResource> {
        if !self.enable_memory_aliasing {
            return None;
        }

        let mut surrendered_resources = self.surrendered_resources.lock();
        let resources = surrendered_resources.get_mut(&hash)?;
        let index = resources
            .iter()
            .rposition(|resource| resource.resource_type() == resource_type)?;
        let resource = resources.swap_remove(index);

        if resources.is_empty() {
            surrendered_resources.remove(&hash);
        }
        Some(resource)
    }

    pub(crate) fn return_resource(&self, hash: u64, resource: PhysicalResource) {
        if !self.enable_memory_aliasing {
            trace!("Memory aliasing disabled, destroy {}", resource.id());
            return;
        }

        self.surrendered_resources
            .lock()
            .entry(hash)
            .or_default()
            .push(resource);
    }

    pub(crate) fn create(&self, descriptor: &ResourceDescriptor) -> Result<PhysicalResource, RenderGraphError> {
        let validation = match descriptor {
            ResourceDescriptor::Image(desc) => desc.validate(),
            ResourceDescriptor::Buffer(desc) | ResourceDescriptor::UniformBuffer(desc) => desc.validate(),
        };
        if let Err(reason) = validation {
            return Err(RenderGraphError::InvalidDescription {
                name: descriptor.name().to_owned(),
                reason,
            });
        }

        let raw = match descriptor {
            ResourceDescriptor::Image(desc) => self.factory.create_image(desc),
            ResourceDescriptor::Buffer(desc) => self.factory.create_buffer(desc),
            ResourceDescriptor::UniformBuffer(desc) => self.factory.create_uniform_buffer(desc),
        }
        .map_err(|err| RenderGraphError::ResourceCreation {
            name: descriptor.name().to_owned(),
            reason: format!("{err:#}"),
        })?;

        raw.set_name(descriptor.name());
        let resource = PhysicalResource::new(descriptor.resource_type(), raw);

        self.total_allocated_bytes.fetch_add(resource.byte_size(), Ordering::Relaxed);
        self.total_allocation_count.fetch_add(1, Ordering::Relaxed);
        debug!("Created {} [{}] of {} bytes", resource.id(), descriptor.name(), resource.byte_size());

        Ok(resource)
    }
}

impl std::fmt::Debug for TransientResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientResourcePool")
            .field("enable_memory_aliasing", &self.enable_memory_aliasing)
            .field("surrendered", &self.surrendered_count())
            .field("total_allocated_bytes", &self.total_allocated_bytes())
            .finish()
    }
}

struct AllocatedResource {
    resource: PhysicalResource,
    hash: u64,
    is_external: bool,
}

/// Binding of one graph's logical resources to physical ones.
///
/// Lookup by logical handle goes through `allocated_resources`, pooling goes through the shared
/// [`TransientResourcePool`], each behind its own lock.
pub struct TransientResourceSystem {
    pool: Arc<TransientResourcePool>,
    allocated_resources: Mutex<HashMap<GraphResourceId, AllocatedResource>>,
    allocated_bytes: AtomicU64,
    fatal_contract_violations: bool,

    #[cfg(any(debug_assertions, feature = "resource-tracking"))]
    tracker: ResourceTracker,
}

impl TransientResourceSystem {
    pub fn new(pool: Arc<TransientResourcePool>, fatal_contract_violations: bool) -> Self {
        Self {
            pool,
            allocated_resources: Mutex::new(HashMap::new()),
            allocated_bytes: AtomicU64::new(0),
            fatal_contract_violations,

            #[cfg(any(debug_assertions, feature = "resource-tracking"))]
            tracker: ResourceTracker::default(),
        }
    }

    pub fn pool(&self) -> &Arc<TransientResourcePool> {
        &self.pool
    }

    pub fn acquire_image(&self, handle: RenderGraphImage, desc: &ImageDesc) -> Result<PhysicalResource, RenderGraphError> {
        self.acquire(handle.id, &ResourceDescriptor::Image(desc.clone()))
    }

    pub fn acquire_buffer(&self, handle: RenderGraphBuffer, desc: &BufferDesc) -> Result<PhysicalResource, RenderGraphError> {
        self.acquire(handle.id, &ResourceDescriptor::Buffer(desc.clone()))
    }

    pub fn acquire_uniform_buffer(&self, handle: RenderGraphUniformBuffer, desc: &BufferDesc) -> Result<PhysicalResource, RenderGraphError> {
        self.acquire(handle.id, &ResourceDescriptor::UniformBuffer(desc.clone()))
    }

    pub fn acquire_image_ref(&self, handle: RenderGraphImage, desc: &ImageDesc) -> Result<Arc<dyn RhiResource>, RenderGraphError> {
        Ok(self.acquire_image(handle, desc)?.raw().clone())
    }

    pub fn acquire_buffer_ref(&self, handle: RenderGraphBuffer, desc: &BufferDesc) -> Result<Arc<dyn RhiResource>, RenderGraphError> {
        Ok(self.acquire_buffer(handle, desc)?.raw().clone())
    }

    pub fn acquire_uniform_buffer_ref(&self, handle: RenderGraphUniformBuffer, desc: &BufferDesc) -> Result<Arc<dyn RhiResource>, RenderGraphError> {
        Ok(self.acquire_uniform_buffer(handle, desc)?.raw().clone())
    }

    /// Return the resource bound to `handle` to the pool, keyed by `hash`.
    pub fn surrender_resource<R: GraphResource>(&self, handle: RenderGraphResource<R>, hash: u64) -> Result<(), RenderGraphError> {
        self.surrender(handle.id, hash)
    }

    /// Bind a resource owned outside of the graph. It is never pooled nor destroyed here.
    pub fn add_external_resource<R: GraphResource>(&self, handle: RenderGraphResource<R>, resource: PhysicalResource) -> Result<(), RenderGraphError> {
        if resource.resource_type() != R::TYPE {
            return Err(contract_violation(self.fatal_contract_violations, RenderGraphError::ResourceTypeMismatch {
                resource: format!("{}", resource.id()),
                expected: R::TYPE,
                actual: resource.resource_type(),
            }));
        }

        self.add_external(handle.id, resource);
        Ok(())
    }

    pub fn get<R: GraphResource>(&self, handle: RenderGraphResource<R>) -> Option<PhysicalResource> {
        self.get_raw(handle.id)
    }

    /// Bytes freshly allocated for this graph, resources reused from the pool are not counted.
    pub fn total_allocated_size(&self) -> u64 {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated_resources.lock().len()
    }

    #[cfg(any(debug_assertions, feature = "resource-tracking"))]
    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub(crate) fn acquire(&self, id: GraphResourceId, descriptor: &ResourceDescriptor) -> Result<PhysicalResource, RenderGraphError> {
        let resource_type = descriptor.resource_type();

        if let Some(existing) = self.get_raw(id) {
            return self.check_type(existing, descriptor.name(), resource_type);
        }

        let hash = descriptor.content_hash();
        let resource = match self.pool.take_surrendered(hash, resource_type) {
            Some(resource) => {
                trace!("Alias [{}] onto {}", descriptor.name(), resource.id());
                resource.raw().set_name(descriptor.name());
                resource
            }
            None => {
                let resource = self.pool.create(descriptor)?;
                self.allocated_bytes.fetch_add(resource.byte_size(), Ordering::Relaxed);
                resource
            }
        };

        #[cfg(any(debug_assertions, feature = "resource-tracking"))]
        self.tracker.record(resource.id(), id);

        let mut allocated_resources = self.allocated_resources.lock();
        let raced = allocated_resources.get(&id).map(|entry| entry.resource.clone());
        if let Some(existing) = raced {
            // lost a race against another acquisition of the same handle
            drop(allocated_resources);
            self.pool.return_resource(hash, resource);
            return self.check_type(existing, descriptor.name(), resource_type);
        }

        allocated_resources.insert(id, AllocatedResource {
            resource: resource.clone(),
            hash,
            is_external: false,
        });
        Ok(resource)
    }

    pub(crate) fn surrender(&self, id: GraphResourceId, hash: u64) -> Result<(), RenderGraphError> {
        let mut allocated_resources = self.allocated_resources.lock();
        let is_external = allocated_resources.get(&id).map(|entry| entry.is_external);

        match is_external {
            None => {
                drop(allocated_resources);
                Err(contract_violation(self.fatal_contract_violations, RenderGraphError::NotAllocated { id }))
            }
            Some(true) => {
                warn!("Resource #{id} is external and will not be pooled");
                Ok(())
            }
            Some(false) => {
                let entry = allocated_resources.remove(&id);
                drop(allocated_resources);

                if let Some(entry) = entry {
                    trace!("Surrender {} of #{id}", entry.resource.id());
                    self.pool.return_resource(hash, entry.resource);
                }
                Ok(())
            }
        }
    }

    pub(crate) fn add_external(&self, id: GraphResourceId, resource: PhysicalResource) {
        #[cfg(any(debug_assertions, feature = "resource-tracking"))]
        self.tracker.record(resource.id(), id);

        self.allocated_resources.lock().insert(id, AllocatedResource {
            resource,
            hash: 0,
            is_external: true,
        });
    }

    pub(crate) fn get_raw(&self, id: GraphResourceId) -> Option<PhysicalResource> {
        self.allocated_resources
            .lock()
            .get(&id)
            .map(|entry| entry.resource.clone())
    }

    /// Unbind a resource without pooling it, ownership moves to the caller.
    pub(crate) fn take(&self, id: GraphResourceId) -> Option<PhysicalResource> {
        self.allocated_resources
            .lock()
            .remove(&id)
            .map(|entry| entry.resource)
    }

    /// Return every transient resource still bound to the pool and forget external ones.
    pub fn release_all(&self) {
        let allocated_resources = std::mem::take(&mut *self.allocated_resources.lock());

        for (_, entry) in allocated_resources {
            if !entry.is_external {
                self.pool.return_resource(entry.hash, entry.resource);
            }
        }
    }

    fn check_type(&self, resource: PhysicalResource, name: &str, expected: ResourceType) -> Result<PhysicalResource, RenderGraphError> {
        if resource.resource_type() == expected {
            Ok(resource)
        } else {
            Err(contract_violation(self.fatal_contract_violations, RenderGraphError::ResourceTypeMismatch {
                resource: name.to_owned(),
                expected,
                actual: resource.resource_type(),
            }))
        }
    }
}

impl Drop for TransientResourceSystem {
    fn drop(&mut self) {
        self.release_all();
    }
}
