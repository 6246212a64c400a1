use derive_more::{Display, Error};
use log::error;
use crate::interface::ResourceType;

#[derive(Debug, Display, Error)]
pub enum RenderGraphError {
    #[display("Pass [{pass}] accessed {resource_type} [{resource}] without declaring it")]
    UndeclaredResourceAccess {
        pass: String,
        resource: String,
        resource_type: ResourceType,
    },
    #[display("Blackboard has no entry of type [{type_name}]")]
    MissingBlackboardEntry {
        type_name: &'static str,
    },
    #[display("Resource [{resource}] is a {actual}, but is used as a {expected}")]
    ResourceTypeMismatch {
        resource: String,
        expected: ResourceType,
        actual: ResourceType,
    },
    #[display("Resource handle #{id} does not belong to this render graph")]
    UnknownResource {
        id: u32,
    },
    #[display("Resource #{id} is not owned by the transient resource system")]
    NotAllocated {
        id: u32,
    },
    #[display("Failed to create resource [{name}]: {reason}")]
    ResourceCreation {
        name: String,
        reason: String,
    },
    #[display("Failed to write mapped resource [{name}]: {reason}")]
    MappedWrite {
        name: String,
        reason: String,
    },
    #[display("Invalid description of resource [{name}]: {reason}")]
    InvalidDescription {
        name: String,
        reason: String,
    },
    #[display("{open} debug marker(s) were left open")]
    UnbalancedMarkers {
        open: u32,
    },
    #[display("Debug marker ended without a matching begin")]
    UnmatchedEndMarker,
}

/// Report a broken usage contract.
///
/// Always logged; panics when `fatal` is set, otherwise the error is handed back so the caller can
/// continue on a best effort basis.
#[track_caller]
pub(crate) fn contract_violation(fatal: bool, err: RenderGraphError) -> RenderGraphError {
    error!("{err}");
    if fatal {
        panic!("Render graph contract violation: {err}");
    }
    err
}
