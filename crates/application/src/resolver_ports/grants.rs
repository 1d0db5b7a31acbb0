use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use grantline_core::{AppResult, RoleId};
use grantline_domain::{CapabilityKey, ModuleKey, RoleFacets};

/// Port for grant facet retrieval.
///
/// The batched call is the preferred path; the three per-facet calls back
/// the fallback query engine and must agree with it row for row.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Retrieves all three facets for every given role in one round trip.
    ///
    /// Roles absent from the result simply hold no grants. Returns
    /// `AppError::AggregationUnsupported` when the aggregation endpoint is
    /// structurally absent (not deployed or dropped), which switches the
    /// resolver to the fallback engine.
    async fn resolve_facets_batch(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<BTreeMap<RoleId, RoleFacets>>;

    /// Lists the modules a role may see at all.
    async fn list_enabled_modules(&self, role_id: RoleId) -> AppResult<BTreeSet<ModuleKey>>;

    /// Lists the org-independent capabilities bound to a role.
    async fn list_system_capabilities(&self, role_id: RoleId)
    -> AppResult<BTreeSet<CapabilityKey>>;

    /// Lists a role's module capabilities, restricted to the given enabled
    /// modules. Implementations must apply the restriction in the query
    /// itself; returning capabilities for disabled modules is a defect.
    async fn list_module_capabilities(
        &self,
        role_id: RoleId,
        enabled_modules: &BTreeSet<ModuleKey>,
    ) -> AppResult<BTreeMap<ModuleKey, BTreeSet<CapabilityKey>>>;
}
