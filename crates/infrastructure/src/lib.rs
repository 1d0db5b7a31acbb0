//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod engine_config;
mod in_memory_access_store;
mod in_memory_snapshot_cache;
mod postgres_catalog_repository;
mod postgres_grant_repository;
mod postgres_membership_repository;
mod postgres_role_admin_repository;
mod redis_snapshot_cache;
mod telemetry;

pub use engine_config::EngineConfig;
pub use in_memory_access_store::InMemoryAccessStore;
pub use in_memory_snapshot_cache::InMemorySnapshotCache;
pub use postgres_catalog_repository::PostgresCatalogRepository;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use postgres_membership_repository::PostgresMembershipRepository;
pub use postgres_role_admin_repository::PostgresRoleAdminRepository;
pub use redis_snapshot_cache::RedisSnapshotCache;
pub use telemetry::init_tracing;
