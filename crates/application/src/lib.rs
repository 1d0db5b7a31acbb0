//! Application services and ports for the permission resolution engine.

#![forbid(unsafe_code)]

mod admin_service;
mod catalog_service;
mod fallback;
mod resolver_ports;
mod resolver_service;

pub use admin_service::RoleAdminService;
pub use catalog_service::GrantCatalogService;
pub use fallback::FallbackFacetResolver;
pub use resolver_ports::{
    GrantCatalog, GrantCatalogRepository, GrantRepository, MembershipRepository,
    RoleAdminRepository, SnapshotCache,
};
pub use resolver_service::{PermissionResolverService, ResolverConfig, ResolverMetrics};
