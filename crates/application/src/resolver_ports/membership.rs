use async_trait::async_trait;
use grantline_core::{AppResult, PrincipalId};
use grantline_domain::{Principal, RoleBinding};

/// Port for principal and membership lookups (the role aggregator's
/// storage side).
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Loads a principal's bypass flags.
    async fn find_principal(&self, principal_id: PrincipalId) -> AppResult<Option<Principal>>;

    /// Lists the principal's active role bindings across every
    /// organization: memberships joined with roles, both filtered to
    /// `is_active = true`, deduplicated by `(organization, role)`.
    /// Result order is unspecified.
    async fn list_active_bindings(&self, principal_id: PrincipalId)
    -> AppResult<Vec<RoleBinding>>;
}
