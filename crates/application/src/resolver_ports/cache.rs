use async_trait::async_trait;
use grantline_core::{AppResult, PrincipalId};
use grantline_domain::PermissionSnapshot;

/// Port for the TTL-bound snapshot cache.
///
/// Concurrent `get`/`put` for different principals must not contend;
/// same-key `put`/`invalidate` races resolve last-write-wins, which is
/// sound because every invalidation is followed by a fresh resolve.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Returns the cached snapshot for a principal, if still live.
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<PermissionSnapshot>>;

    /// Stores a freshly resolved snapshot for the given time-to-live.
    async fn put(
        &self,
        principal_id: PrincipalId,
        snapshot: &PermissionSnapshot,
        ttl_seconds: u32,
    ) -> AppResult<()>;

    /// Discards the cached snapshot for a principal.
    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()>;
}
