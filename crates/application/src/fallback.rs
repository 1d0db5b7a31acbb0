//! Multi-step facet retrieval used when the batched path is absent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use grantline_core::{AppError, AppResult, RoleId};
use grantline_domain::RoleFacets;

use crate::resolver_ports::GrantRepository;

/// Re-implementation of the batched facet retrieval as three per-facet
/// queries. Intentionally the slow path (3 round trips per role); it keeps
/// resolution working while the aggregation endpoint is undeployed or
/// broken, and must stay behaviorally identical to the batched path.
#[derive(Clone)]
pub struct FallbackFacetResolver {
    grants: Arc<dyn GrantRepository>,
    facet_timeout: Duration,
}

impl FallbackFacetResolver {
    /// Creates a fallback resolver over the per-facet grant queries.
    #[must_use]
    pub fn new(grants: Arc<dyn GrantRepository>, facet_timeout: Duration) -> Self {
        Self {
            grants,
            facet_timeout,
        }
    }

    /// Resolves all three facets for one role.
    ///
    /// Enabled modules and system capabilities are independent and fetched
    /// concurrently; module capabilities need the enabled set first, both
    /// to restrict the query and because leaking capabilities for disabled
    /// modules is the known defect class of this path.
    pub async fn resolve_facets(&self, role_id: RoleId) -> AppResult<RoleFacets> {
        let (enabled_modules, system_capabilities) = tokio::join!(
            self.with_facet_timeout("enabled_modules", self.grants.list_enabled_modules(role_id)),
            self.with_facet_timeout(
                "system_capabilities",
                self.grants.list_system_capabilities(role_id),
            ),
        );
        let enabled_modules = enabled_modules?;
        let system_capabilities = system_capabilities?;

        let module_capabilities = self
            .with_facet_timeout(
                "module_capabilities",
                self.grants.list_module_capabilities(role_id, &enabled_modules),
            )
            .await?;

        Ok(RoleFacets {
            enabled_modules,
            system_capabilities,
            module_capabilities,
        })
    }

    async fn with_facet_timeout<T>(
        &self,
        facet: &str,
        fetch: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.facet_timeout, fetch).await {
            Ok(result) => result.map_err(|error| annotate_facet(error, facet)),
            Err(_) => Err(AppError::DependencyUnavailable(format!(
                "facet '{facet}' query timed out after {:?}",
                self.facet_timeout
            ))),
        }
    }
}

// Degradation logs must name the failing facet (operator signal), so the
// facet is folded into the error text here rather than at every call site.
fn annotate_facet(error: AppError, facet: &str) -> AppError {
    match error {
        AppError::DependencyUnavailable(message) => {
            AppError::DependencyUnavailable(format!("facet '{facet}': {message}"))
        }
        AppError::Internal(message) => AppError::Internal(format!("facet '{facet}': {message}")),
        other => other,
    }
}
