use async_trait::async_trait;

use grantline_application::GrantCatalogRepository;
use grantline_core::{AppError, AppResult};
use grantline_domain::{
    ModuleCapabilityEntry, ModuleCatalogEntry, ModuleKey, SystemCapabilityEntry,
};

use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for the administrator-managed grant
/// catalog.
#[derive(Clone)]
pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CatalogRow {
    key: String,
    display_name: String,
}

#[derive(Debug, FromRow)]
struct ModuleCapabilityRow {
    module_key: String,
    key: String,
    display_name: String,
}

#[async_trait]
impl GrantCatalogRepository for PostgresCatalogRepository {
    async fn list_modules(&self) -> AppResult<Vec<ModuleCatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            r#"
            SELECT key, display_name
            FROM catalog_modules
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to load module catalog: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(ModuleCatalogEntry {
                    key: row.key.parse()?,
                    display_name: row.display_name,
                })
            })
            .collect()
    }

    async fn list_module_capabilities(
        &self,
        module: &ModuleKey,
    ) -> AppResult<Vec<ModuleCapabilityEntry>> {
        let rows = sqlx::query_as::<_, ModuleCapabilityRow>(
            r#"
            SELECT module_key, key, display_name
            FROM catalog_module_capabilities
            WHERE module_key = $1
            ORDER BY key
            "#,
        )
        .bind(module.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to load module capability catalog: {error}"
            ))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(ModuleCapabilityEntry {
                    module: row.module_key.parse()?,
                    key: row.key.parse()?,
                    display_name: row.display_name,
                })
            })
            .collect()
    }

    async fn list_system_capabilities(&self) -> AppResult<Vec<SystemCapabilityEntry>> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            r#"
            SELECT key, display_name
            FROM catalog_system_capabilities
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to load system capability catalog: {error}"
            ))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(SystemCapabilityEntry {
                    key: row.key.parse()?,
                    display_name: row.display_name,
                })
            })
            .collect()
    }
}
