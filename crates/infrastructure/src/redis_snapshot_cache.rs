//! Redis-backed snapshot cache for multi-host deployments.

use async_trait::async_trait;
use grantline_application::SnapshotCache;
use grantline_core::{AppError, AppResult, PrincipalId};
use grantline_domain::PermissionSnapshot;
use redis::AsyncCommands;
use tracing::warn;

/// Redis implementation of the snapshot cache port. Entries expire via
/// `SETEX`; invalidation deletes the key so every engine host observes it.
#[derive(Clone)]
pub struct RedisSnapshotCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSnapshotCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, principal_id: PrincipalId) -> String {
        format!("{}:snapshot:{principal_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::DependencyUnavailable(format!("failed to connect to redis: {error}"))
            })
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<PermissionSnapshot>> {
        let key = self.key_for(principal_id);
        let mut connection = self.connection().await?;

        let encoded: Option<String> = connection.get(key).await.map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to read snapshot cache entry: {error}"
            ))
        })?;

        let Some(encoded) = encoded else {
            return Ok(None);
        };

        match serde_json::from_str(encoded.as_str()) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                // A corrupt entry reads as a miss; the resolver recomputes
                // and overwrites it.
                warn!(%principal_id, %error, "discarding undecodable snapshot cache entry");
                Ok(None)
            }
        }
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

        let key = self.key_for(principal_id);
        let value = serde_json::to_string(snapshot).map_err(|error| {
            AppError::Internal(format!("failed to encode snapshot cache entry: {error}"))
        })?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::DependencyUnavailable(format!(
                    "failed to write snapshot cache entry: {error}"
                ))
            })
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        let key = self.key_for(principal_id);
        let mut connection = self.connection().await?;

        connection.del(key).await.map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to invalidate snapshot cache entry: {error}"
            ))
        })
    }
}
