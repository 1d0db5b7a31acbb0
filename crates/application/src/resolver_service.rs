//! The permission resolver: bypass short-circuit, cached resolution,
//! batched-or-fallback facet retrieval, union assembly.

mod resolve;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use grantline_core::{AppError, AppResult, PrincipalId};
use grantline_domain::{CapabilityKey, ModuleKey, VisibilityPolicy};

use crate::resolver_ports::{GrantRepository, MembershipRepository, SnapshotCache};

/// Tuning knobs for one resolver instance.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Snapshot cache time-to-live in seconds.
    pub snapshot_ttl_seconds: u32,
    /// Timeout applied to each storage call inside facet resolution.
    pub facet_timeout: Duration,
    /// Upper bound on concurrently resolving roles. Keep at or below the
    /// storage client's connection pool size.
    pub max_concurrent_role_fetches: usize,
    /// How `is_module_visible` treats enabled-but-empty modules.
    pub visibility_policy: VisibilityPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_seconds: 60,
            facet_timeout: Duration::from_secs(3),
            max_concurrent_role_fetches: 8,
            visibility_policy: VisibilityPolicy::default(),
        }
    }
}

/// Operator-facing counters. The fallback counter is the primary signal
/// that the batched aggregation path needs repair.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    fallback_activations: AtomicU64,
    degraded_role_fetches: AtomicU64,
}

impl ResolverMetrics {
    /// Number of resolves served (wholly or partly) by the fallback engine.
    #[must_use]
    pub fn fallback_activations(&self) -> u64 {
        self.fallback_activations.load(Ordering::Relaxed)
    }

    /// Number of per-role facet fetches that failed closed.
    #[must_use]
    pub fn degraded_role_fetches(&self) -> u64 {
        self.degraded_role_fetches.load(Ordering::Relaxed)
    }

    pub(crate) fn record_fallback_activation(&self) {
        self.fallback_activations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_degraded_role_fetch(&self) {
        self.degraded_role_fetches.fetch_add(1, Ordering::Relaxed);
    }
}

/// Application service resolving a principal's complete grant set.
#[derive(Clone)]
pub struct PermissionResolverService {
    memberships: Arc<dyn MembershipRepository>,
    grants: Arc<dyn GrantRepository>,
    cache: Arc<dyn SnapshotCache>,
    config: ResolverConfig,
    metrics: Arc<ResolverMetrics>,
}

impl PermissionResolverService {
    /// Creates a resolver from its storage ports and configuration.
    #[must_use]
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        grants: Arc<dyn GrantRepository>,
        cache: Arc<dyn SnapshotCache>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            memberships,
            grants,
            cache,
            config,
            metrics: Arc::new(ResolverMetrics::default()),
        }
    }

    /// Returns the shared diagnostics counters.
    #[must_use]
    pub fn metrics(&self) -> Arc<ResolverMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Discards the principal's cached snapshot. Mutation paths call this
    /// synchronously; the next resolve recomputes from storage.
    pub async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        self.cache.invalidate(principal_id).await
    }

    /// Returns whether the principal holds an org-independent capability.
    pub async fn has_system_capability(
        &self,
        principal_id: PrincipalId,
        capability: &CapabilityKey,
    ) -> AppResult<bool> {
        let snapshot = self.resolve(principal_id).await?;
        Ok(snapshot.has_system_capability(capability))
    }

    /// Returns whether the principal holds a capability within a module.
    pub async fn has_module_capability(
        &self,
        principal_id: PrincipalId,
        module: &ModuleKey,
        capability: &CapabilityKey,
    ) -> AppResult<bool> {
        let snapshot = self.resolve(principal_id).await?;
        Ok(snapshot.has_module_capability(module, capability))
    }

    /// Returns whether a module is visible to the principal under the
    /// configured empty-module policy.
    pub async fn is_module_visible(
        &self,
        principal_id: PrincipalId,
        module: &ModuleKey,
    ) -> AppResult<bool> {
        let snapshot = self.resolve(principal_id).await?;
        Ok(snapshot.is_module_visible(module, self.config.visibility_policy))
    }

    /// Ensures the principal holds an org-independent capability.
    pub async fn require_system_capability(
        &self,
        principal_id: PrincipalId,
        capability: &CapabilityKey,
    ) -> AppResult<()> {
        if self.has_system_capability(principal_id, capability).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "principal '{principal_id}' is missing system capability '{capability}'"
        )))
    }

    /// Ensures the principal holds a capability within a module.
    pub async fn require_module_capability(
        &self,
        principal_id: PrincipalId,
        module: &ModuleKey,
        capability: &CapabilityKey,
    ) -> AppResult<()> {
        if self
            .has_module_capability(principal_id, module, capability)
            .await?
        {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "principal '{principal_id}' is missing capability '{capability}' in module '{module}'"
        )))
    }
}
