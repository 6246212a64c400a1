use log::trace;
use zenith_core::collections::SmallVec;
use crate::builder::StandaloneBarrier;
use crate::node::{RenderGraphPassNode, ResourceAccess};
use crate::resource::{GraphResourceId, ResourceStorage};
use crate::state::{required_state, ResourceState};

/// One planned state transition of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassBarrier {
    pub resource: GraphResourceId,
    pub src: ResourceState,
    pub dst: ResourceState,
    /// Clear the resource right after the transition, set on its first use when its description asks for it.
    pub clear: bool,
}

/// Everything the executor does around one pass node. Culled passes keep empty lists.
#[derive(Debug, Default)]
pub(crate) struct CompiledPass {
    /// Transient resources first used by this pass.
    pub(crate) materialize: SmallVec<[GraphResourceId; 4]>,
    pub(crate) barriers: SmallVec<[PassBarrier; 8]>,
    pub(crate) post_barriers: SmallVec<[PassBarrier; 2]>,
    /// Transient resources last used by this pass, with their pool key.
    pub(crate) surrender: SmallVec<[(GraphResourceId, u64); 4]>,
}

#[derive(Debug, Default)]
pub(crate) struct BarrierPlan {
    /// Standalone barriers requested before the first pass.
    pub(crate) leading_barriers: SmallVec<[PassBarrier; 2]>,
    pub(crate) passes: Vec<CompiledPass>,
}

struct StateTracker<'a> {
    resources: &'a [ResourceStorage],
    current: Vec<Option<ResourceState>>,
}

impl<'a> StateTracker<'a> {
    fn new(resources: &'a [ResourceStorage]) -> Self {
        Self {
            resources,
            current: resources.iter().map(ResourceStorage::initial_state).collect(),
        }
    }

    fn is_tracked(&self, id: GraphResourceId) -> bool {
        self.current.get(id as usize).is_some_and(Option::is_some)
    }

    fn previous(&self, id: GraphResourceId) -> ResourceState {
        self.current
            .get(id as usize)
            .copied()
            .flatten()
            .unwrap_or(ResourceState::UNDEFINED)
    }

    fn transition(&mut self, id: GraphResourceId, dst: ResourceState) {
        if let Some(state) = self.current.get_mut(id as usize) {
            *state = Some(dst);
        }
    }

    /// Externals start tracked, so only transient and graph-level resources are ever cleared.
    fn clears_on_first_use(&self, id: GraphResourceId) -> bool {
        !self.is_tracked(id)
            && self
                .resources
                .get(id as usize)
                .and_then(ResourceStorage::descriptor)
                .is_some_and(|desc| desc.is_clear_on_create())
    }

    fn required(&self, node: &RenderGraphPassNode, access: &ResourceAccess, is_write: bool) -> Option<ResourceState> {
        let storage = self.resources.get(access.id as usize)?;
        Some(required_state(
            storage.resource_type,
            is_write,
            node.is_compute_pass,
            storage.is_depth(),
            access.forced_state,
        ))
    }
}

/// Walk the live passes in order and derive their barriers and resource lifetimes.
pub(crate) fn plan_barriers(
    pass_nodes: &[RenderGraphPassNode],
    resources: &[ResourceStorage],
    standalone_barriers: &[StandaloneBarrier],
) -> BarrierPlan {
    let mut tracker = StateTracker::new(resources);
    let mut plan = BarrierPlan {
        leading_barriers: SmallVec::new(),
        passes: pass_nodes.iter().map(|_| CompiledPass::default()).collect(),
    };
    let mut first_use: Vec<Option<usize>> = vec![None; resources.len()];
    let mut last_use: Vec<Option<usize>> = vec![None; resources.len()];

    for barrier in standalone_barriers.iter().filter(|barrier| barrier.after_pass.is_none()) {
        if let Some(barrier) = standalone_barrier(&mut tracker, barrier) {
            plan.leading_barriers.push(barrier);
        }
    }

    for (index, node) in pass_nodes.iter().enumerate() {
        if !node.is_culled() {
            plan_pass(&mut tracker, node, &mut plan.passes[index]);

            for access in node.resource_creates.iter().chain(&node.resource_writes).chain(&node.resource_reads) {
                first_use[access.id as usize].get_or_insert(index);
                last_use[access.id as usize] = Some(index);
            }
        }

        // issued even when the pass itself is culled
        for barrier in standalone_barriers.iter().filter(|barrier| barrier.after_pass == Some(index as u32)) {
            if let Some(planned) = standalone_barrier(&mut tracker, barrier) {
                plan.passes[index].post_barriers.push(planned);
                last_use[barrier.id as usize] = Some(index);
            }
        }
    }

    for (id, storage) in resources.iter().enumerate() {
        if storage.is_external() {
            continue;
        }
        if let Some(first) = first_use[id] {
            plan.passes[first].materialize.push(id as GraphResourceId);
        }
        if let Some(last) = last_use[id] {
            if storage.is_surrenderable() {
                plan.passes[last].surrender.push((id as GraphResourceId, storage.hash));
            }
        }
    }

    plan
}

/// Creates, then writes, then reads.
fn plan_pass(tracker: &mut StateTracker, node: &RenderGraphPassNode, compiled: &mut CompiledPass) {
    for access in &node.resource_creates {
        let Some(dst) = tracker.required(node, access, true) else { continue };
        let clear = tracker.clears_on_first_use(access.id);

        compiled.barriers.push(PassBarrier {
            resource: access.id,
            src: ResourceState::UNDEFINED,
            dst,
            clear,
        });
        tracker.transition(access.id, dst);
    }

    // write hazards need a barrier even without a state change
    for access in &node.resource_writes {
        let Some(dst) = tracker.required(node, access, true) else { continue };

        compiled.barriers.push(PassBarrier {
            resource: access.id,
            src: tracker.previous(access.id),
            dst,
            clear: tracker.clears_on_first_use(access.id),
        });
        tracker.transition(access.id, dst);
    }

    for access in &node.resource_reads {
        let Some(dst) = tracker.required(node, access, false) else { continue };
        let src = tracker.previous(access.id);

        if dst.covers_read_after_read(&src) {
            trace!("Skip read after read barrier of #{} in pass [{}]", access.id, node.name);
        } else {
            compiled.barriers.push(PassBarrier {
                resource: access.id,
                src,
                dst,
                clear: tracker.clears_on_first_use(access.id),
            });
        }
        tracker.transition(access.id, dst);
    }
}

/// A standalone barrier only makes sense once the resource holds content.
fn standalone_barrier(tracker: &mut StateTracker, barrier: &StandaloneBarrier) -> Option<PassBarrier> {
    if !tracker.is_tracked(barrier.id) {
        trace!("Drop barrier of untouched resource #{}", barrier.id);
        return None;
    }

    let src = tracker.previous(barrier.id);
    tracker.transition(barrier.id, barrier.state);
    Some(PassBarrier {
        resource: barrier.id,
        src,
        dst: barrier.state,
        clear: false,
    })
}
