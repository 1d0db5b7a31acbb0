use std::collections::BTreeMap;
use std::sync::Arc;

use grantline_core::{AppError, AppResult, PrincipalId, RoleId};
use grantline_domain::{PermissionSnapshot, RoleBinding, RoleFacets};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::fallback::FallbackFacetResolver;

use super::PermissionResolverService;

impl PermissionResolverService {
    /// Resolves the complete, consistent grant set for one principal.
    ///
    /// Failures local to a single role degrade that role to no grants and
    /// keep the rest of the resolution alive. Only a failure that prevents
    /// determining which roles apply at all surfaces as an error, and that
    /// error carries zero capabilities with it.
    pub async fn resolve(&self, principal_id: PrincipalId) -> AppResult<PermissionSnapshot> {
        let principal_id = principal_id.validated()?;

        match self.cache.get(principal_id).await {
            Ok(Some(snapshot)) => return Ok(snapshot),
            Ok(None) => {}
            Err(error) => {
                debug!(%principal_id, %error, "snapshot cache read failed; resolving from storage");
            }
        }

        let principal = self
            .memberships
            .find_principal(principal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("principal '{principal_id}' does not exist"))
            })?;

        // Bypass accounts never touch role storage, and their snapshot is
        // not cached: flag demotion has no invalidation hook, so it must
        // take effect on the very next resolve.
        if principal.has_unrestricted_access() {
            return Ok(PermissionSnapshot::unrestricted(principal_id));
        }

        let bindings = self.memberships.list_active_bindings(principal_id).await?;
        let snapshot = self.assemble_snapshot(principal_id, bindings).await;

        if let Err(error) = self
            .cache
            .put(principal_id, &snapshot, self.config.snapshot_ttl_seconds)
            .await
        {
            warn!(%principal_id, %error, "failed to cache resolved snapshot");
        }

        Ok(snapshot)
    }

    async fn assemble_snapshot(
        &self,
        principal_id: PrincipalId,
        bindings: Vec<RoleBinding>,
    ) -> PermissionSnapshot {
        let mut snapshot = PermissionSnapshot::empty(principal_id);
        if bindings.is_empty() {
            // A principal with no active memberships is a valid state, not
            // an error: everything resolves to denied.
            return snapshot;
        }

        let role_ids: Vec<RoleId> = bindings.iter().map(|binding| binding.role_id).collect();
        match self.fetch_facets_batch(&role_ids).await {
            Ok(per_role) => {
                for binding in &bindings {
                    if let Some(facets) = per_role.get(&binding.role_id) {
                        snapshot.absorb(facets);
                    }
                    // A role absent from the batch result simply holds no
                    // grants; it still resolved and keeps its descriptor.
                    snapshot.roles.push(binding.descriptor());
                }
            }
            Err(error) if error.is_aggregation_unsupported() => {
                self.resolve_with_fallback(&mut snapshot, &bindings).await;
            }
            Err(error) => {
                // A transient batch failure degrades every role closed
                // rather than failing the resolve. The fallback engine is
                // reserved for structural absence so it cannot quietly
                // become the default path.
                for binding in &bindings {
                    self.record_role_degradation(&mut snapshot, binding, &error);
                }
            }
        }

        snapshot.finalize_roles();
        snapshot
    }

    async fn fetch_facets_batch(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<BTreeMap<RoleId, RoleFacets>> {
        match tokio::time::timeout(
            self.config.facet_timeout,
            self.grants.resolve_facets_batch(role_ids),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::DependencyUnavailable(format!(
                "batched facet retrieval timed out after {:?}",
                self.config.facet_timeout
            ))),
        }
    }

    async fn resolve_with_fallback(
        &self,
        snapshot: &mut PermissionSnapshot,
        bindings: &[RoleBinding],
    ) {
        self.metrics.record_fallback_activation();
        snapshot.diagnostics.used_fallback = true;
        warn!(
            principal_id = %snapshot.principal_id,
            roles = bindings.len(),
            "batched facet retrieval unavailable; using fallback query engine"
        );

        let fallback =
            FallbackFacetResolver::new(Arc::clone(&self.grants), self.config.facet_timeout);
        let limiter = Arc::new(Semaphore::new(self.config.max_concurrent_role_fetches.max(1)));

        // Dropping the JoinSet (caller cancellation) aborts the in-flight
        // per-role fetches instead of letting them finish into the void.
        let mut fetches: JoinSet<(RoleBinding, AppResult<RoleFacets>)> = JoinSet::new();
        for binding in bindings.iter().cloned() {
            let fallback = fallback.clone();
            let limiter = Arc::clone(&limiter);
            fetches.spawn(async move {
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return (
                        binding,
                        Err(AppError::Internal(
                            "role fetch limiter closed mid-resolution".to_owned(),
                        )),
                    );
                };
                let facets = fallback.resolve_facets(binding.role_id).await;
                (binding, facets)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((binding, Ok(facets))) => {
                    snapshot.absorb(&facets);
                    snapshot.roles.push(binding.descriptor());
                }
                Ok((binding, Err(error))) => {
                    self.record_role_degradation(snapshot, &binding, &error);
                }
                Err(join_error) => {
                    self.metrics.record_degraded_role_fetch();
                    warn!(
                        principal_id = %snapshot.principal_id,
                        error = %join_error,
                        "role facet fetch task failed; role contributes nothing"
                    );
                }
            }
        }
    }

    fn record_role_degradation(
        &self,
        snapshot: &mut PermissionSnapshot,
        binding: &RoleBinding,
        error: &AppError,
    ) {
        self.metrics.record_degraded_role_fetch();
        snapshot.diagnostics.degraded_roles.push(binding.role_id);
        // The binding itself resolved, so its descriptor stays attached;
        // only the role's facets are withheld.
        snapshot.roles.push(binding.descriptor());
        warn!(
            principal_id = %snapshot.principal_id,
            role_id = %binding.role_id,
            error = %error,
            "role facet resolution failed; role contributes nothing"
        );
    }
}
