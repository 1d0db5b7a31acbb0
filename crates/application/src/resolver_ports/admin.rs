use async_trait::async_trait;
use grantline_core::{AppResult, PrincipalId, RoleId};
use grantline_domain::{ModuleKey, RoleGrant};
use serde_json::Value;

/// Port for role and grant mutations.
///
/// Every write here changes what some principals are allowed to do, so the
/// admin service invalidates their cached snapshots before a mutation call
/// returns to its caller.
#[async_trait]
pub trait RoleAdminRepository: Send + Sync {
    /// Persists one canonical grant for a role. Idempotent.
    async fn apply_grant(&self, role_id: RoleId, grant: &RoleGrant) -> AppResult<()>;

    /// Removes one canonical grant from a role. Idempotent.
    async fn revoke_grant(&self, role_id: RoleId, grant: &RoleGrant) -> AppResult<()>;

    /// Sets a role's visibility toggle for a module.
    async fn set_module_access(
        &self,
        role_id: RoleId,
        module: &ModuleKey,
        is_enabled: bool,
    ) -> AppResult<()>;

    /// Soft-deactivates a role. The role row is kept for audit.
    async fn deactivate_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Soft-deactivates one principal's membership under a role.
    async fn deactivate_membership(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Lists every principal with an active membership bound to the role.
    async fn list_bound_principals(&self, role_id: RoleId) -> AppResult<Vec<PrincipalId>>;

    /// Returns the role's remaining legacy grant blobs without removing
    /// them.
    async fn list_legacy_grant_blobs(&self, role_id: RoleId) -> AppResult<Vec<Value>>;

    /// Deletes the role's legacy grant blobs. Called only after the blobs
    /// have been imported into the canonical model.
    async fn clear_legacy_grant_blobs(&self, role_id: RoleId) -> AppResult<()>;
}
