//! Role and grant mutations with synchronous snapshot invalidation.


use std::sync::Arc;

use grantline_core::{AppResult, PrincipalId, RoleId};
use grantline_domain::{ModuleKey, RoleGrant};
use tracing::info;

use crate::catalog_service::GrantCatalogService;
use crate::resolver_ports::{RoleAdminRepository, SnapshotCache};

/// Application service for administering roles, toggles and grants.
///
/// Every mutation invalidates the cached snapshot of each affected
/// principal before returning: a stale window longer than the cache TTL
/// can over-grant as easily as under-grant, so staleness beyond the TTL is
/// treated as a correctness bug, not a tradeoff.
#[derive(Clone)]
pub struct RoleAdminService {
    repository: Arc<dyn RoleAdminRepository>,
    catalog: GrantCatalogService,
    cache: Arc<dyn SnapshotCache>,
}

impl RoleAdminService {
    /// Creates an admin service from its repository, catalog and cache.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleAdminRepository>,
        catalog: GrantCatalogService,
        cache: Arc<dyn SnapshotCache>,
    ) -> Self {
        Self {
            repository,
            catalog,
            cache,
        }
    }

    /// Grants a capability to a role after catalog validation.
    pub async fn grant(&self, role_id: RoleId, grant: RoleGrant) -> AppResult<()> {
        self.catalog.validate_grant(&grant).await?;
        self.repository.apply_grant(role_id, &grant).await?;
        self.invalidate_role(role_id).await
    }

    /// Revokes a capability from a role.
    pub async fn revoke(&self, role_id: RoleId, grant: RoleGrant) -> AppResult<()> {
        self.repository.revoke_grant(role_id, &grant).await?;
        self.invalidate_role(role_id).await
    }

    /// Sets a role's module visibility toggle.
    pub async fn set_module_access(
        &self,
        role_id: RoleId,
        module: &ModuleKey,
        is_enabled: bool,
    ) -> AppResult<()> {
        self.catalog.validate_module(module).await?;
        self.repository
            .set_module_access(role_id, module, is_enabled)
            .await?;
        self.invalidate_role(role_id).await
    }

    /// Soft-deactivates a role; its grants stop contributing immediately.
    pub async fn deactivate_role(&self, role_id: RoleId) -> AppResult<()> {
        // Capture the bound principals before the deactivation hides them
        // from the active-membership listing.
        let bound = self.repository.list_bound_principals(role_id).await?;
        self.repository.deactivate_role(role_id).await?;
        self.invalidate_principals(&bound).await
    }

    /// Soft-deactivates one principal's membership under a role.
    pub async fn deactivate_membership(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.repository
            .deactivate_membership(principal_id, role_id)
            .await?;
        self.cache.invalidate(principal_id).await
    }

    /// Normalizes a role's legacy grant blobs into canonical grants,
    /// validates each against the catalog and persists them. Returns how
    /// many canonical grants were imported.
    ///
    /// This is the one-time migration path for the old group-based grant
    /// store; nothing ever reads the legacy shapes at resolution time.
    /// Every blob is normalized and validated before the first write, and
    /// the legacy rows are cleared only once the whole import has landed.
    /// An error leaves the legacy rows in place so the import can be
    /// retried; `apply_grant` is idempotent, so a retry is safe.
    pub async fn import_legacy_grants(&self, role_id: RoleId) -> AppResult<usize> {
        let blobs = self.repository.list_legacy_grant_blobs(role_id).await?;

        let mut grants = Vec::new();
        for blob in &blobs {
            for grant in RoleGrant::from_legacy_blob(blob)? {
                self.catalog.validate_grant(&grant).await?;
                grants.push(grant);
            }
        }

        let imported = grants.len();
        for grant in &grants {
            self.repository.apply_grant(role_id, grant).await?;
        }

        if imported > 0 {
            info!(%role_id, imported, "imported legacy grants into canonical model");
            self.invalidate_role(role_id).await?;
        }
        if !blobs.is_empty() {
            self.repository.clear_legacy_grant_blobs(role_id).await?;
        }

        Ok(imported)
    }

    async fn invalidate_role(&self, role_id: RoleId) -> AppResult<()> {
        let bound = self.repository.list_bound_principals(role_id).await?;
        self.invalidate_principals(&bound).await
    }

    async fn invalidate_principals(&self, principals: &[PrincipalId]) -> AppResult<()> {
        for principal_id in principals {
            self.cache.invalidate(*principal_id).await?;
        }
        Ok(())
    }
}
