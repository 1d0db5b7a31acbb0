use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use grantline_application::GrantRepository;
use grantline_core::{AppError, AppResult, RoleId};
use grantline_domain::{CapabilityKey, ModuleKey, RoleFacets};

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// SQLSTATE for a call to an undefined function, which is how the absence
/// of the batched aggregation surfaces.
const UNDEFINED_FUNCTION: &str = "42883";

/// PostgreSQL-backed repository for role grant facets.
///
/// The batched path calls the `role_facets_aggregate` SQL function; the
/// three per-facet queries read the same tables directly and therefore
/// return the same rows the function would.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
    aggregate_function: String,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            aggregate_function: "role_facets_aggregate".to_owned(),
        }
    }

    /// Points the batched path at a differently named aggregate function,
    /// to exercise deployments where it is absent.
    #[cfg(test)]
    fn with_aggregate_function(pool: PgPool, aggregate_function: &str) -> Self {
        Self {
            pool,
            aggregate_function: aggregate_function.to_owned(),
        }
    }
}

#[derive(Debug, FromRow)]
struct FacetRow {
    role_id: Uuid,
    facet: String,
    module_key: Option<String>,
    capability_key: Option<String>,
}

impl FacetRow {
    fn module(&self) -> AppResult<ModuleKey> {
        self.module_key
            .as_deref()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "aggregated facet '{}' row is missing its module key",
                    self.facet
                ))
            })?
            .parse()
    }

    fn capability(&self) -> AppResult<CapabilityKey> {
        self.capability_key
            .as_deref()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "aggregated facet '{}' row is missing its capability key",
                    self.facet
                ))
            })?
            .parse()
    }
}

fn map_batch_error(error: sqlx::Error) -> AppError {
    let is_undefined_function = error
        .as_database_error()
        .and_then(|database_error| database_error.code())
        .is_some_and(|code| code == UNDEFINED_FUNCTION);

    if is_undefined_function {
        AppError::AggregationUnsupported(
            "role_facets_aggregate is not deployed on this database".to_owned(),
        )
    } else {
        AppError::DependencyUnavailable(format!("failed to aggregate role facets: {error}"))
    }
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn resolve_facets_batch(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<BTreeMap<RoleId, RoleFacets>> {
        let ids: Vec<Uuid> = role_ids.iter().map(RoleId::as_uuid).collect();

        let query = format!(
            "SELECT role_id, facet, module_key, capability_key FROM {}($1)",
            self.aggregate_function
        );
        let rows = sqlx::query_as::<_, FacetRow>(query.as_str())
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_batch_error)?;

        let mut facets: BTreeMap<RoleId, RoleFacets> = BTreeMap::new();
        for row in rows {
            let role_id = RoleId::from_uuid(row.role_id);
            let entry = facets.entry(role_id).or_default();
            match row.facet.as_str() {
                "enabled_module" => {
                    entry.enabled_modules.insert(row.module()?);
                }
                "system_capability" => {
                    entry.system_capabilities.insert(row.capability()?);
                }
                "module_capability" => {
                    entry
                        .module_capabilities
                        .entry(row.module()?)
                        .or_default()
                        .insert(row.capability()?);
                }
                other => {
                    return Err(AppError::Internal(format!(
                        "unknown aggregated facet kind '{other}'"
                    )));
                }
            }
        }

        Ok(facets)
    }

    async fn list_enabled_modules(&self, role_id: RoleId) -> AppResult<BTreeSet<ModuleKey>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT module_key
            FROM module_access_toggles
            WHERE role_id = $1
                AND is_enabled
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!("failed to load enabled modules: {error}"))
        })?;

        rows.into_iter().map(|(module,)| module.parse()).collect()
    }

    async fn list_system_capabilities(
        &self,
        role_id: RoleId,
    ) -> AppResult<BTreeSet<CapabilityKey>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT capability_key
            FROM role_system_grants
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to load system capabilities: {error}"
            ))
        })?;

        rows.into_iter()
            .map(|(capability,)| capability.parse())
            .collect()
    }

    async fn list_module_capabilities(
        &self,
        role_id: RoleId,
        enabled_modules: &BTreeSet<ModuleKey>,
    ) -> AppResult<BTreeMap<ModuleKey, BTreeSet<CapabilityKey>>> {
        if enabled_modules.is_empty() {
            return Ok(BTreeMap::new());
        }

        let modules: Vec<String> = enabled_modules
            .iter()
            .map(|module| module.as_str().to_owned())
            .collect();
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT module_key, capability_key
            FROM role_module_grants
            WHERE role_id = $1
                AND module_key = ANY ($2)
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(&modules)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::DependencyUnavailable(format!(
                "failed to load module capabilities: {error}"
            ))
        })?;

        let mut capabilities: BTreeMap<ModuleKey, BTreeSet<CapabilityKey>> = BTreeMap::new();
        for (module, capability) in rows {
            capabilities
                .entry(module.parse()?)
                .or_default()
                .insert(capability.parse()?);
        }

        Ok(capabilities)
    }
}
