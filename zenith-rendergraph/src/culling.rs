use log::trace;
use zenith_core::collections::SmallVec;
use crate::node::RenderGraphPassNode;
use crate::resource::ResourceStorage;

/// Count the live consumers of every pass and flag the dead ones.
///
/// Registration order is a topological order, so one reverse sweep settles every pass before
/// its producers are visited. Culled passes never register as consumers, which lets dead chains
/// cascade all the way up.
pub(crate) fn cull_passes(pass_nodes: &mut [RenderGraphPassNode], resources: &[ResourceStorage]) {
    let mut live_consumers: Vec<SmallVec<[u32; 4]>> = vec![SmallVec::new(); resources.len()];

    for node in pass_nodes.iter_mut().rev() {
        let mut consumers: SmallVec<[u32; 8]> = SmallVec::new();
        let mut persistent_outputs = 0;

        for id in node.outputs() {
            let Some(storage) = resources.get(id as usize) else {
                continue;
            };

            if storage.is_persistent_output() {
                persistent_outputs += 1;
            }
            consumers.extend(
                live_consumers[id as usize]
                    .iter()
                    .copied()
                    .filter(|consumer| *consumer != node.index)
            );
        }

        consumers.sort_unstable();
        consumers.dedup();

        node.ref_count = consumers.len() as u32 + persistent_outputs;
        node.culled = node.ref_count == 0;

        if node.is_culled() {
            trace!("Cull pass [{}]", node.name);
            continue;
        }

        let inputs = node.inputs().collect::<SmallVec<[u32; 8]>>();
        for id in inputs {
            if let Some(consumers) = live_consumers.get_mut(id as usize) {
                consumers.push(node.index);
            }
        }
    }
}
