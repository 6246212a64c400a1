//! Validation-only bookkeeping, compiled into debug builds or with the `resource-tracking` feature.

use parking_lot::Mutex;
use zenith_core::collections::SmallVec;
use zenith_core::collections::hashmap::HashMap;
use crate::resource::{GraphResourceId, PhysicalResourceId};

/// Side table from physical resources back to every logical handle which was bound to them.
#[derive(Default)]
pub struct ResourceTracker {
    logical_handles: Mutex<HashMap<PhysicalResourceId, SmallVec<[GraphResourceId; 4]>>>,
}

impl ResourceTracker {
    pub(crate) fn record(&self, physical: PhysicalResourceId, logical: GraphResourceId) {
        let mut logical_handles = self.logical_handles.lock();
        let handles = logical_handles.entry(physical).or_default();
        if !handles.contains(&logical) {
            handles.push(logical);
        }
    }

    pub fn logical_handles_of(&self, physical: PhysicalResourceId) -> SmallVec<[GraphResourceId; 4]> {
        self.logical_handles
            .lock()
            .get(&physical)
            .cloned()
            .unwrap_or_default()
    }
}
