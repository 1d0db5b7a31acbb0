//! Ports consumed by the permission resolution engine.

mod admin;
mod cache;
mod catalog;
mod grants;
mod membership;

pub use admin::RoleAdminRepository;
pub use cache::SnapshotCache;
pub use catalog::{GrantCatalog, GrantCatalogRepository};
pub use grants::GrantRepository;
pub use membership::MembershipRepository;
