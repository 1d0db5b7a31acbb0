use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use grantline_application::SnapshotCache;
use grantline_core::{AppResult, PrincipalId};
use grantline_domain::PermissionSnapshot;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct SnapshotCacheEntry {
    snapshot: PermissionSnapshot,
    expires_at: Instant,
}

/// In-memory snapshot cache adapter. Time-bound, never count-bound:
/// snapshots are small and keyed one per principal.
#[derive(Default)]
pub struct InMemorySnapshotCache {
    entries: RwLock<HashMap<PrincipalId, SnapshotCacheEntry>>,
}

impl InMemorySnapshotCache {
    /// Creates an empty in-memory snapshot cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for InMemorySnapshotCache {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<PermissionSnapshot>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&principal_id) {
                if entry.expires_at > Instant::now() {
                    return Ok(Some(entry.snapshot.clone()));
                }
            } else {
                return Ok(None);
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(&principal_id)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(&principal_id);
        }

        Ok(None)
    }

    async fn put(
        &self,
        principal_id: PrincipalId,
        snapshot: &PermissionSnapshot,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries.write().await.insert(
            principal_id,
            SnapshotCacheEntry {
                snapshot: snapshot.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        self.entries.write().await.remove(&principal_id);
        Ok(())
    }
}
