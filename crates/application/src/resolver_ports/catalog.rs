use async_trait::async_trait;
use grantline_core::AppResult;
use grantline_domain::{
    ModuleCapabilityEntry, ModuleCatalogEntry, ModuleKey, SystemCapabilityEntry,
};

/// The full grant catalog, assembled for administrator surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantCatalog {
    /// Registered modules.
    pub modules: Vec<ModuleCatalogEntry>,
    /// Registered per-module capabilities.
    pub module_capabilities: Vec<ModuleCapabilityEntry>,
    /// Registered org-independent capabilities.
    pub system_capabilities: Vec<SystemCapabilityEntry>,
}

/// Port for the administrator-managed capability registry. Consulted for
/// validation and display only; never on the authorization hot path.
#[async_trait]
pub trait GrantCatalogRepository: Send + Sync {
    /// Lists registered modules.
    async fn list_modules(&self) -> AppResult<Vec<ModuleCatalogEntry>>;

    /// Lists registered capabilities for one module.
    async fn list_module_capabilities(
        &self,
        module: &ModuleKey,
    ) -> AppResult<Vec<ModuleCapabilityEntry>>;

    /// Lists registered org-independent capabilities.
    async fn list_system_capabilities(&self) -> AppResult<Vec<SystemCapabilityEntry>>;
}
