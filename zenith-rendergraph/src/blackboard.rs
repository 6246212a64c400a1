use std::any::TypeId;
use bytemuck::Pod;
use log::warn;
use zenith_core::collections::SmallVec;
use zenith_core::collections::hashmap::HashMap;
use crate::error::{contract_violation, RenderGraphError};

/// Largest payload a single blackboard entry can hold.
pub const MAX_BLACKBOARD_ENTRY_SIZE: usize = 1024;

struct BlackboardEntry {
    type_name: &'static str,
    bytes: SmallVec<[u8; 64]>,
}

/// Per graph side channel of small plain data, one entry per type.
///
/// Passes written independently use it to hand resource handles to each other.
pub struct Blackboard {
    entries: HashMap<TypeId, BlackboardEntry>,
    fatal_contract_violations: bool,
}

impl Blackboard {
    pub(crate) fn new(fatal_contract_violations: bool) -> Self {
        Self {
            entries: HashMap::new(),
            fatal_contract_violations,
        }
    }

    /// Store `value`, replacing the previous entry of the same type.
    pub fn add<T: Pod>(&mut self, value: T) {
        const { assert!(std::mem::size_of::<T>() <= MAX_BLACKBOARD_ENTRY_SIZE, "Blackboard entry exceeds 1024 bytes") };

        let type_name = std::any::type_name::<T>();
        let entry = BlackboardEntry {
            type_name,
            bytes: SmallVec::from_slice(bytemuck::bytes_of(&value)),
        };

        if self.entries.insert(TypeId::of::<T>(), entry).is_some() {
            warn!("Blackboard entry [{type_name}] had been replaced");
        }
    }

    /// Fetch the entry of type `T`.
    ///
    /// A missing entry is a contract violation, when it is not fatal a zeroed value is returned.
    pub fn get<T: Pod>(&self) -> T {
        match self.try_get::<T>() {
            Some(value) => value,
            None => {
                contract_violation(
                    self.fatal_contract_violations,
                    RenderGraphError::MissingBlackboardEntry { type_name: std::any::type_name::<T>() },
                );
                T::zeroed()
            }
        }
    }

    pub fn try_get<T: Pod>(&self) -> Option<T> {
        let entry = self.entries.get(&TypeId::of::<T>())?;
        // keyed by type, so the size always matches
        debug_assert_eq!(entry.bytes.len(), std::mem::size_of::<T>(), "[{}]", entry.type_name);
        Some(bytemuck::pod_read_unaligned(&entry.bytes))
    }

    pub fn contains<T: Pod>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Pod>(&mut self) -> Option<T> {
        let entry = self.entries.remove(&TypeId::of::<T>())?;
        Some(bytemuck::pod_read_unaligned(&entry.bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.values().map(|entry| entry.type_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};
    use crate::resource::{RenderGraphBuffer, RenderGraphImage, RenderGraphResource};
    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct GBufferData {
        albedo: RenderGraphImage,
        normal: RenderGraphImage,
        depth: RenderGraphImage,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct LightingData {
        lights: RenderGraphBuffer,
        exposure: f32,
    }

    #[test]
    fn entries_round_trip_by_type() {
        let mut blackboard = Blackboard::new(true);

        let gbuffer = GBufferData {
            albedo: RenderGraphResource::from_raw(0),
            normal: RenderGraphResource::from_raw(1),
            depth: RenderGraphResource::from_raw(2),
        };
        blackboard.add(gbuffer);
        blackboard.add(LightingData { lights: RenderGraphResource::from_raw(3), exposure: 1.5 });

        assert_eq!(blackboard.len(), 2);
        assert_eq!(blackboard.get::<GBufferData>(), gbuffer);
        assert_eq!(blackboard.get::<LightingData>().exposure, 1.5);
        assert!(blackboard.contains::<LightingData>());
    }

    #[test]
    fn adding_same_type_replaces_entry() {
        let mut blackboard = Blackboard::new(true);
        blackboard.add(LightingData { lights: RenderGraphResource::from_raw(0), exposure: 1.0 });
        blackboard.add(LightingData { lights: RenderGraphResource::from_raw(4), exposure: 2.0 });

        assert_eq!(blackboard.len(), 1);
        assert_eq!(blackboard.get::<LightingData>().lights.id(), 4);
        assert_eq!(blackboard.remove::<LightingData>().map(|data| data.exposure), Some(2.0));
        assert!(blackboard.is_empty());
    }

    #[test]
    fn missing_entry_is_zeroed_when_not_fatal() {
        zenith_core::log::initialize_for_test();

        let blackboard = Blackboard::new(false);
        assert!(blackboard.try_get::<GBufferData>().is_none());
        assert_eq!(blackboard.get::<GBufferData>(), GBufferData::zeroed());
    }

    #[test]
    #[should_panic(expected = "Blackboard has no entry")]
    fn missing_entry_is_fatal() {
        let blackboard = Blackboard::new(true);
        let _ = blackboard.get::<LightingData>();
    }
}
