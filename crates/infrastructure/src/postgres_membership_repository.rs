use async_trait::async_trait;

use grantline_application::MembershipRepository;
use grantline_core::{AppError, AppResult, OrganizationId, PrincipalId, RoleId};
use grantline_domain::{Principal, RoleBinding};

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed repository for principal and membership lookups.
#[derive(Clone)]
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: Uuid,
    is_super_admin: bool,
    is_supermanager: bool,
}

#[derive(Debug, FromRow)]
struct BindingRow {
    role_id: Uuid,
    organization_id: Uuid,
    display_name: String,
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn find_principal(&self, principal_id: PrincipalId) -> AppResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, is_super_admin, is_supermanager
            FROM principals
            WHERE id = $1
            "#,
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to load principal: {error}"))
        })?;

        Ok(row.map(|row| Principal {
            id: PrincipalId::from_uuid(row.id),
            is_super_admin: row.is_super_admin,
            is_supermanager: row.is_supermanager,
        }))
    }

    async fn list_active_bindings(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleBinding>> {
        let rows = sqlx::query_as::<_, BindingRow>(
            r#"
            SELECT DISTINCT roles.id AS role_id, roles.organization_id, roles.display_name
            FROM memberships
            INNER JOIN roles
                ON roles.id = memberships.role_id
            WHERE memberships.principal_id = $1
                AND memberships.is_active
                AND roles.is_active
            "#,
        )
        .bind(principal_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to load role bindings: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| RoleBinding {
                role_id: RoleId::from_uuid(row.role_id),
                organization_id: OrganizationId::from_uuid(row.organization_id),
                display_name: row.display_name,
            })
            .collect())
    }
}
