use zenith_core::collections::SmallVec;
use crate::context::RenderContext;
use crate::resource::GraphResourceId;
use crate::state::ForcedState;

/// Type erased pass body, executed once when the graph runs.
pub trait RenderGraphPass: Send {
    fn execute(self: Box<Self>, context: &mut RenderContext);
}

/// Pass carrying plain data filled during setup.
pub(crate) struct TypedPass<T, F> {
    pub(crate) data: T,
    pub(crate) execute_func: F,
}

impl<T, F> RenderGraphPass for TypedPass<T, F>
where
    T: Send + 'static,
    F: FnOnce(&T, &mut RenderContext) + Send + 'static,
{
    fn execute(self: Box<Self>, context: &mut RenderContext) {
        let TypedPass { data, execute_func } = *self;
        execute_func(&data, context);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourceAccess {
    pub(crate) id: GraphResourceId,
    pub(crate) forced_state: Option<ForcedState>,
}

pub struct RenderGraphPassNode {
    pub(crate) name: String,
    pub(crate) index: u32,
    pub(crate) is_compute_pass: bool,
    pub(crate) has_side_effect: bool,
    pub(crate) culled: bool,
    pub(crate) ref_count: u32,

    pub(crate) resource_creates: SmallVec<[ResourceAccess; 4]>,
    pub(crate) resource_reads: SmallVec<[ResourceAccess; 8]>,
    pub(crate) resource_writes: SmallVec<[ResourceAccess; 8]>,

    pub(crate) pass: Option<Box<dyn RenderGraphPass>>,
}

impl RenderGraphPassNode {
    pub(crate) fn new(name: &str, index: u32) -> Self {
        Self {
            name: name.to_owned(),
            index,
            is_compute_pass: false,
            has_side_effect: false,
            culled: false,
            ref_count: 0,
            resource_creates: SmallVec::new(),
            resource_reads: SmallVec::new(),
            resource_writes: SmallVec::new(),
            pass: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_compute_pass(&self) -> bool {
        self.is_compute_pass
    }

    pub fn has_side_effect(&self) -> bool {
        self.has_side_effect
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Side effect passes always run, even without any consumer.
    pub fn is_culled(&self) -> bool {
        self.culled && !self.has_side_effect
    }

    pub(crate) fn creates(&self, id: GraphResourceId) -> bool {
        self.resource_creates.iter().any(|access| access.id == id)
    }

    pub(crate) fn reads(&self, id: GraphResourceId) -> bool {
        self.resource_reads.iter().any(|access| access.id == id)
    }

    pub(crate) fn writes(&self, id: GraphResourceId) -> bool {
        self.resource_writes.iter().any(|access| access.id == id)
    }

    pub(crate) fn declares(&self, id: GraphResourceId) -> bool {
        self.creates(id) || self.reads(id) || self.writes(id)
    }

    /// Resources whose content this pass produces.
    pub(crate) fn outputs(&self) -> impl Iterator<Item = GraphResourceId> + '_ {
        self.resource_creates
            .iter()
            .chain(self.resource_writes.iter())
            .map(|access| access.id)
    }

    /// Resources this pass depends on the previous content of.
    pub(crate) fn inputs(&self) -> impl Iterator<Item = GraphResourceId> + '_ {
        self.resource_reads
            .iter()
            .chain(self.resource_writes.iter())
            .map(|access| access.id)
    }
}

impl std::fmt::Debug for RenderGraphPassNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraphPassNode")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("is_compute_pass", &self.is_compute_pass)
            .field("has_side_effect", &self.has_side_effect)
            .field("culled", &self.culled)
            .field("ref_count", &self.ref_count)
            .field("creates", &self.resource_creates)
            .field("reads", &self.resource_reads)
            .field("writes", &self.resource_writes)
            .finish()
    }
}
