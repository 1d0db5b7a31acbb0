//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod catalog;
mod principal;
mod role;
mod snapshot;

pub use catalog::{
    CapabilityKey, ModuleCapabilityEntry, ModuleCatalogEntry, ModuleKey, SystemCapabilityEntry,
};
pub use principal::Principal;
pub use role::{Role, RoleBinding, RoleDescriptor, RoleGrant};
pub use snapshot::{PermissionSnapshot, ResolutionDiagnostics, RoleFacets, VisibilityPolicy};
