use async_trait::async_trait;

use grantline_application::RoleAdminRepository;
use grantline_core::{AppError, AppResult, PrincipalId, RoleId};
use grantline_domain::{ModuleKey, RoleGrant};

use serde_json::Value;
use sqlx::PgPool;

/// PostgreSQL-backed repository for role and grant mutations.
#[derive(Clone)]
pub struct PostgresRoleAdminRepository {
    pool: PgPool,
}

impl PostgresRoleAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleAdminRepository for PostgresRoleAdminRepository {
    async fn apply_grant(&self, role_id: RoleId, grant: &RoleGrant) -> AppResult<()> {
        let result = match grant {
            RoleGrant::System { capability } => {
                sqlx::query(
                    r#"
                    INSERT INTO role_system_grants (role_id, capability_key)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(role_id.as_uuid())
                .bind(capability.as_str())
                .execute(&self.pool)
                .await
            }
            RoleGrant::Module { module, capability } => {
                sqlx::query(
                    r#"
                    INSERT INTO role_module_grants (role_id, module_key, capability_key)
                    VALUES ($1, $2, $3)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(role_id.as_uuid())
                .bind(module.as_str())
                .bind(capability.as_str())
                .execute(&self.pool)
                .await
            }
        };

        result
            .map(|_| ())
            .map_err(|error| {
                AppError::DependencyUnavailable(format!("failed to apply grant: {error}"))
            })
    }

    async fn revoke_grant(&self, role_id: RoleId, grant: &RoleGrant) -> AppResult<()> {
        let result = match grant {
            RoleGrant::System { capability } => {
                sqlx::query(
                    r#"
                    DELETE FROM role_system_grants
                    WHERE role_id = $1
                        AND capability_key = $2
                    "#,
                )
                .bind(role_id.as_uuid())
                .bind(capability.as_str())
                .execute(&self.pool)
                .await
            }
            RoleGrant::Module { module, capability } => {
                sqlx::query(
                    r#"
                    DELETE FROM role_module_grants
                    WHERE role_id = $1
                        AND module_key = $2
                        AND capability_key = $3
                    "#,
                )
                .bind(role_id.as_uuid())
                .bind(module.as_str())
                .bind(capability.as_str())
                .execute(&self.pool)
                .await
            }
        };

        result
            .map(|_| ())
            .map_err(|error| {
                AppError::DependencyUnavailable(format!("failed to revoke grant: {error}"))
            })
    }

    async fn set_module_access(
        &self,
        role_id: RoleId,
        module: &ModuleKey,
        is_enabled: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO module_access_toggles (role_id, module_key, is_enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_id, module_key)
                DO UPDATE SET is_enabled = EXCLUDED.is_enabled
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(module.as_str())
        .bind(is_enabled)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to set module access: {error}"))
        })
    }

    async fn deactivate_role(&self, role_id: RoleId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET is_active = FALSE
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to deactivate role: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        Ok(())
    }

    async fn deactivate_membership(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE memberships
            SET is_active = FALSE
            WHERE principal_id = $1
                AND role_id = $2
            "#,
        )
        .bind(principal_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to deactivate membership: {error}"))
        })
    }

    async fn list_bound_principals(&self, role_id: RoleId) -> AppResult<Vec<PrincipalId>> {
        let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            SELECT principal_id
            FROM memberships
            WHERE role_id = $1
                AND is_active
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to list bound principals: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|(principal_id,)| PrincipalId::from_uuid(principal_id))
            .collect())
    }

    async fn list_legacy_grant_blobs(&self, role_id: RoleId) -> AppResult<Vec<Value>> {
        let rows: Vec<(Value,)> = sqlx::query_as(
            r#"
            SELECT payload
            FROM legacy_role_grants
            WHERE role_id = $1
            ORDER BY id
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to list legacy grant payloads: {error}"
            ))
        })?;

        Ok(rows.into_iter().map(|(payload,)| payload).collect())
    }

    async fn clear_legacy_grant_blobs(&self, role_id: RoleId) -> AppResult<()> {
        sqlx::query("DELETE FROM legacy_role_grants WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::DependencyUnavailable(format!(
                    "failed to clear legacy grant payloads: {error}"
                ))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
