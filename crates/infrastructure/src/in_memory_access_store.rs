//! In-memory access store implementation.
//!
//! Backs every storage port of the engine from one shared state, which
//! makes it the reference implementation for full-stack tests: the
//! resolver, the admin service and the catalog service can all run
//! against it without Postgres.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use grantline_application::{
    GrantCatalogRepository, GrantRepository, MembershipRepository, RoleAdminRepository,
};
use grantline_core::{AppError, AppResult, PrincipalId, RoleId};
use grantline_domain::{
    CapabilityKey, ModuleCapabilityEntry, ModuleCatalogEntry, ModuleKey, Principal, Role,
    RoleBinding, RoleFacets, RoleGrant, SystemCapabilityEntry,
};
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct AccessState {
    principals: HashMap<PrincipalId, Principal>,
    roles: HashMap<RoleId, Role>,
    memberships: Vec<MembershipRow>,
    module_toggles: HashMap<RoleId, BTreeMap<ModuleKey, bool>>,
    grants: HashMap<RoleId, BTreeSet<RoleGrant>>,
    legacy_blobs: HashMap<RoleId, Vec<Value>>,
    catalog_modules: Vec<ModuleCatalogEntry>,
    catalog_module_capabilities: Vec<ModuleCapabilityEntry>,
    catalog_system_capabilities: Vec<SystemCapabilityEntry>,
}

#[derive(Debug, Clone)]
struct MembershipRow {
    principal_id: PrincipalId,
    role_id: RoleId,
    is_active: bool,
}

/// In-memory implementation of all engine storage ports.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    state: RwLock<AccessState>,
    batch_enabled: AtomicBool,
}

impl InMemoryAccessStore {
    /// Creates an empty store with the batched retrieval path deployed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(AccessState::default()),
            batch_enabled: AtomicBool::new(true),
        }
    }

    /// Removes the batched retrieval path, as if the aggregation endpoint
    /// were never deployed. Subsequent batch calls report
    /// `AggregationUnsupported` and the resolver falls back to per-facet
    /// queries.
    pub fn disable_batch_aggregation(&self) {
        self.batch_enabled.store(false, Ordering::SeqCst);
    }

    /// Registers a principal.
    pub async fn insert_principal(&self, principal: Principal) {
        self.state
            .write()
            .await
            .principals
            .insert(principal.id, principal);
    }

    /// Registers a role.
    pub async fn insert_role(&self, role: Role) {
        self.state.write().await.roles.insert(role.id, role);
    }

    /// Binds a principal to a role with an active membership.
    pub async fn insert_membership(&self, principal_id: PrincipalId, role_id: RoleId) {
        self.state.write().await.memberships.push(MembershipRow {
            principal_id,
            role_id,
            is_active: true,
        });
    }

    /// Registers a module and its capabilities in the catalog.
    pub async fn register_module(
        &self,
        module: ModuleCatalogEntry,
        capabilities: Vec<ModuleCapabilityEntry>,
    ) {
        let mut state = self.state.write().await;
        state.catalog_modules.push(module);
        state.catalog_module_capabilities.extend(capabilities);
    }

    /// Registers an org-independent capability in the catalog.
    pub async fn register_system_capability(&self, capability: SystemCapabilityEntry) {
        let mut state = self.state.write().await;
        state.catalog_system_capabilities.push(capability);
    }

    /// Stages a legacy grant blob for later import.
    pub async fn stage_legacy_blob(&self, role_id: RoleId, blob: Value) {
        self.state
            .write()
            .await
            .legacy_blobs
            .entry(role_id)
            .or_default()
            .push(blob);
    }

    fn facets_for(state: &AccessState, role_id: RoleId) -> RoleFacets {
        let enabled_modules: BTreeSet<ModuleKey> = state
            .module_toggles
            .get(&role_id)
            .map(|toggles| {
                toggles
                    .iter()
                    .filter_map(|(module, is_enabled)| is_enabled.then(|| module.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut facets = RoleFacets {
            enabled_modules,
            ..RoleFacets::default()
        };

        for grant in state.grants.get(&role_id).into_iter().flatten() {
            match grant {
                RoleGrant::System { capability } => {
                    facets.system_capabilities.insert(capability.clone());
                }
                RoleGrant::Module { module, capability } => {
                    if facets.enabled_modules.contains(module) {
                        facets
                            .module_capabilities
                            .entry(module.clone())
                            .or_default()
                            .insert(capability.clone());
                    }
                }
            }
        }

        facets
    }
}

#[async_trait]
impl MembershipRepository for InMemoryAccessStore {
    async fn find_principal(&self, principal_id: PrincipalId) -> AppResult<Option<Principal>> {
        Ok(self.state.read().await.principals.get(&principal_id).copied())
    }

    async fn list_active_bindings(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleBinding>> {
        let state = self.state.read().await;

        let mut seen: BTreeSet<RoleId> = BTreeSet::new();
        let mut bindings = Vec::new();
        for membership in &state.memberships {
            if membership.principal_id != principal_id || !membership.is_active {
                continue;
            }
            let Some(role) = state.roles.get(&membership.role_id) else {
                continue;
            };
            if !role.is_active || !seen.insert(role.id) {
                continue;
            }
            bindings.push(RoleBinding {
                role_id: role.id,
                organization_id: role.organization_id,
                display_name: role.display_name.as_str().to_owned(),
            });
        }

        Ok(bindings)
    }
}

#[async_trait]
impl GrantRepository for InMemoryAccessStore {
    async fn resolve_facets_batch(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<BTreeMap<RoleId, RoleFacets>> {
        if !self.batch_enabled.load(Ordering::SeqCst) {
            return Err(AppError::AggregationUnsupported(
                "batched facet aggregation is not deployed".to_owned(),
            ));
        }

        let state = self.state.read().await;
        Ok(role_ids
            .iter()
            .map(|role_id| (*role_id, Self::facets_for(&state, *role_id)))
            .collect())
    }

    async fn list_enabled_modules(&self, role_id: RoleId) -> AppResult<BTreeSet<ModuleKey>> {
        let state = self.state.read().await;
        Ok(Self::facets_for(&state, role_id).enabled_modules)
    }

    async fn list_system_capabilities(
        &self,
        role_id: RoleId,
    ) -> AppResult<BTreeSet<CapabilityKey>> {
        let state = self.state.read().await;
        Ok(Self::facets_for(&state, role_id).system_capabilities)
    }

    async fn list_module_capabilities(
        &self,
        role_id: RoleId,
        enabled_modules: &BTreeSet<ModuleKey>,
    ) -> AppResult<BTreeMap<ModuleKey, BTreeSet<CapabilityKey>>> {
        let state = self.state.read().await;
        let mut capabilities = Self::facets_for(&state, role_id).module_capabilities;
        capabilities.retain(|module, _| enabled_modules.contains(module));
        Ok(capabilities)
    }
}

#[async_trait]
impl RoleAdminRepository for InMemoryAccessStore {
    async fn apply_grant(&self, role_id: RoleId, grant: &RoleGrant) -> AppResult<()> {
        self.state
            .write()
            .await
            .grants
            .entry(role_id)
            .or_default()
            .insert(grant.clone());
        Ok(())
    }

    async fn revoke_grant(&self, role_id: RoleId, grant: &RoleGrant) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(grants) = state.grants.get_mut(&role_id) {
            grants.remove(grant);
        }
        Ok(())
    }

    async fn set_module_access(
        &self,
        role_id: RoleId,
        module: &ModuleKey,
        is_enabled: bool,
    ) -> AppResult<()> {
        self.state
            .write()
            .await
            .module_toggles
            .entry(role_id)
            .or_default()
            .insert(module.clone(), is_enabled);
        Ok(())
    }

    async fn deactivate_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut state = self.state.write().await;
        match state.roles.get_mut(&role_id) {
            Some(role) => {
                role.is_active = false;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("role '{role_id}' not found"))),
        }
    }

    async fn deactivate_membership(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        for membership in &mut state.memberships {
            if membership.principal_id == principal_id && membership.role_id == role_id {
                membership.is_active = false;
            }
        }
        Ok(())
    }

    async fn list_bound_principals(&self, role_id: RoleId) -> AppResult<Vec<PrincipalId>> {
        let state = self.state.read().await;
        let mut principals: BTreeSet<PrincipalId> = BTreeSet::new();
        for membership in &state.memberships {
            if membership.role_id == role_id && membership.is_active {
                principals.insert(membership.principal_id);
            }
        }
        Ok(principals.into_iter().collect())
    }

    async fn list_legacy_grant_blobs(&self, role_id: RoleId) -> AppResult<Vec<Value>> {
        Ok(self
            .state
            .read()
            .await
            .legacy_blobs
            .get(&role_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_legacy_grant_blobs(&self, role_id: RoleId) -> AppResult<()> {
        self.state.write().await.legacy_blobs.remove(&role_id);
        Ok(())
    }
}

#[async_trait]
impl GrantCatalogRepository for InMemoryAccessStore {
    async fn list_modules(&self) -> AppResult<Vec<ModuleCatalogEntry>> {
        Ok(self.state.read().await.catalog_modules.clone())
    }

    async fn list_module_capabilities(
        &self,
        module: &ModuleKey,
    ) -> AppResult<Vec<ModuleCapabilityEntry>> {
        Ok(self
            .state
            .read()
            .await
            .catalog_module_capabilities
            .iter()
            .filter(|entry| &entry.module == module)
            .cloned()
            .collect())
    }

    async fn list_system_capabilities(&self) -> AppResult<Vec<SystemCapabilityEntry>> {
        Ok(self.state.read().await.catalog_system_capabilities.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use grantline_application::{
        GrantCatalogRepository, GrantCatalogService, GrantRepository, MembershipRepository,
        PermissionResolverService, ResolverConfig, RoleAdminRepository, RoleAdminService,
        SnapshotCache,
    };
    use grantline_core::{NonEmptyString, OrganizationId, PrincipalId, RoleId};
    use grantline_domain::{
        ModuleCapabilityEntry, ModuleCatalogEntry, Principal, Role, RoleGrant,
        SystemCapabilityEntry,
    };
    use serde_json::json;

    use super::InMemoryAccessStore;
    use crate::InMemorySnapshotCache;

    fn module_key(value: &str) -> grantline_domain::ModuleKey {
        match value.parse() {
            Ok(key) => key,
            Err(error) => panic!("module key '{value}' should parse: {error}"),
        }
    }

    fn capability_key(value: &str) -> grantline_domain::CapabilityKey {
        match value.parse() {
            Ok(key) => key,
            Err(error) => panic!("capability key '{value}' should parse: {error}"),
        }
    }

    fn display_name(value: &str) -> NonEmptyString {
        match NonEmptyString::new(value) {
            Ok(name) => name,
            Err(error) => panic!("display name '{value}' should validate: {error}"),
        }
    }

    struct Harness {
        store: Arc<InMemoryAccessStore>,
        resolver: PermissionResolverService,
        admin: RoleAdminService,
        principal_id: PrincipalId,
        sales_role: RoleId,
        service_role: RoleId,
    }

    async fn seeded_harness() -> Harness {
        let store = Arc::new(InMemoryAccessStore::new());
        let cache = Arc::new(InMemorySnapshotCache::new());

        let organization_id = OrganizationId::new();
        let principal = Principal::regular(PrincipalId::new());
        store.insert_principal(principal).await;

        let sales_role = RoleId::new();
        let service_role = RoleId::new();
        store
            .insert_role(Role {
                id: sales_role,
                organization_id,
                display_name: display_name("Sales"),
                is_active: true,
            })
            .await;
        store
            .insert_role(Role {
                id: service_role,
                organization_id,
                display_name: display_name("Service"),
                is_active: true,
            })
            .await;
        store.insert_membership(principal.id, sales_role).await;
        store.insert_membership(principal.id, service_role).await;

        store
            .register_module(
                ModuleCatalogEntry {
                    key: module_key("sales"),
                    display_name: "Sales".to_owned(),
                },
                vec![
                    ModuleCapabilityEntry {
                        module: module_key("sales"),
                        key: capability_key("view"),
                        display_name: "View".to_owned(),
                    },
                    ModuleCapabilityEntry {
                        module: module_key("sales"),
                        key: capability_key("edit"),
                        display_name: "Edit".to_owned(),
                    },
                ],
            )
            .await;
        store
            .register_system_capability(SystemCapabilityEntry {
                key: capability_key("users.manage"),
                display_name: "Manage users".to_owned(),
            })
            .await;

        let resolver = PermissionResolverService::new(
            Arc::clone(&store) as Arc<dyn MembershipRepository>,
            Arc::clone(&store) as Arc<dyn GrantRepository>,
            Arc::clone(&cache) as Arc<dyn SnapshotCache>,
            ResolverConfig::default(),
        );
        let catalog =
            GrantCatalogService::new(Arc::clone(&store) as Arc<dyn GrantCatalogRepository>);
        let admin = RoleAdminService::new(
            Arc::clone(&store) as Arc<dyn RoleAdminRepository>,
            catalog,
            Arc::clone(&cache) as Arc<dyn SnapshotCache>,
        );

        Harness {
            store,
            resolver,
            admin,
            principal_id: principal.id,
            sales_role,
            service_role,
        }
    }

    async fn grant_baseline(harness: &Harness) {
        for (role, module) in [
            (harness.sales_role, "sales"),
            (harness.service_role, "sales"),
        ] {
            if let Err(error) = harness
                .admin
                .set_module_access(role, &module_key(module), true)
                .await
            {
                panic!("module access should apply: {error}");
            }
        }
        let grants = [
            (
                harness.sales_role,
                RoleGrant::Module {
                    module: module_key("sales"),
                    capability: capability_key("view"),
                },
            ),
            (
                harness.sales_role,
                RoleGrant::Module {
                    module: module_key("sales"),
                    capability: capability_key("edit"),
                },
            ),
            (
                harness.service_role,
                RoleGrant::Module {
                    module: module_key("sales"),
                    capability: capability_key("view"),
                },
            ),
        ];
        for (role, grant) in grants {
            if let Err(error) = harness.admin.grant(role, grant).await {
                panic!("grant should apply: {error}");
            }
        }
    }

    #[tokio::test]
    async fn batched_and_fallback_stacks_resolve_identically() {
        let batched = seeded_harness().await;
        grant_baseline(&batched).await;
        let batched_snapshot = match batched.resolver.resolve(batched.principal_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => panic!("batched resolve should succeed: {error}"),
        };

        let fallback = seeded_harness().await;
        grant_baseline(&fallback).await;
        fallback.store.disable_batch_aggregation();
        let fallback_snapshot = match fallback.resolver.resolve(fallback.principal_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => panic!("fallback resolve should succeed: {error}"),
        };

        assert!(batched_snapshot.has_module_capability(&module_key("sales"), &capability_key("edit")));
        assert_eq!(
            batched_snapshot.system_capabilities,
            fallback_snapshot.system_capabilities
        );
        assert_eq!(
            batched_snapshot.module_capabilities,
            fallback_snapshot.module_capabilities
        );
        assert!(fallback_snapshot.diagnostics.used_fallback);
        assert!(!batched_snapshot.diagnostics.used_fallback);
    }

    #[tokio::test]
    async fn admin_grant_is_visible_on_the_next_resolve() {
        let harness = seeded_harness().await;
        grant_baseline(&harness).await;

        let before = match harness
            .resolver
            .has_system_capability(harness.principal_id, &capability_key("users.manage"))
            .await
        {
            Ok(held) => held,
            Err(error) => panic!("resolve should succeed: {error}"),
        };
        assert!(!before);

        if let Err(error) = harness
            .admin
            .grant(
                harness.sales_role,
                RoleGrant::System {
                    capability: capability_key("users.manage"),
                },
            )
            .await
        {
            panic!("system grant should apply: {error}");
        }

        let after = match harness
            .resolver
            .has_system_capability(harness.principal_id, &capability_key("users.manage"))
            .await
        {
            Ok(held) => held,
            Err(error) => panic!("resolve should succeed: {error}"),
        };
        assert!(after, "grant mutation must not be masked by the cache");
    }

    #[tokio::test]
    async fn deactivating_a_role_withdraws_its_grants() {
        let harness = seeded_harness().await;
        grant_baseline(&harness).await;

        let snapshot = match harness.resolver.resolve(harness.principal_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => panic!("resolve should succeed: {error}"),
        };
        assert!(snapshot.has_module_capability(&module_key("sales"), &capability_key("edit")));

        if let Err(error) = harness.admin.deactivate_role(harness.sales_role).await {
            panic!("role deactivation should succeed: {error}");
        }

        let snapshot = match harness.resolver.resolve(harness.principal_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => panic!("resolve should succeed: {error}"),
        };
        assert!(!snapshot.has_module_capability(&module_key("sales"), &capability_key("edit")));
        assert!(snapshot.has_module_capability(&module_key("sales"), &capability_key("view")));
    }

    #[tokio::test]
    async fn legacy_import_lands_in_the_next_snapshot() {
        let harness = seeded_harness().await;
        grant_baseline(&harness).await;
        harness
            .store
            .stage_legacy_blob(
                harness.service_role,
                json!({"system": ["users.manage"], "modules": {"sales": ["edit"]}}),
            )
            .await;

        let imported = match harness.admin.import_legacy_grants(harness.service_role).await {
            Ok(imported) => imported,
            Err(error) => panic!("legacy import should succeed: {error}"),
        };
        assert_eq!(imported, 2);

        let snapshot = match harness.resolver.resolve(harness.principal_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => panic!("resolve should succeed: {error}"),
        };
        assert!(snapshot.has_system_capability(&capability_key("users.manage")));
    }
}
