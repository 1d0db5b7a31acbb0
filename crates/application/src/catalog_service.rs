use std::sync::Arc;

use grantline_core::{AppError, AppResult};
use grantline_domain::{ModuleKey, RoleGrant};

use crate::resolver_ports::{GrantCatalog, GrantCatalogRepository};

/// Application service over the grant catalog. Validation and display
/// only; the resolver never consults it.
#[derive(Clone)]
pub struct GrantCatalogService {
    repository: Arc<dyn GrantCatalogRepository>,
}

impl GrantCatalogService {
    /// Creates a catalog service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn GrantCatalogRepository>) -> Self {
        Self { repository }
    }

    /// Assembles the full catalog for administrator surfaces.
    pub async fn catalog(&self) -> AppResult<GrantCatalog> {
        let modules = self.repository.list_modules().await?;

        let mut module_capabilities = Vec::new();
        for module in &modules {
            module_capabilities
                .extend(self.repository.list_module_capabilities(&module.key).await?);
        }

        Ok(GrantCatalog {
            modules,
            module_capabilities,
            system_capabilities: self.repository.list_system_capabilities().await?,
        })
    }

    /// Ensures a module key is registered.
    pub async fn validate_module(&self, module: &ModuleKey) -> AppResult<()> {
        let known = self
            .repository
            .list_modules()
            .await?
            .into_iter()
            .any(|entry| entry.key == *module);

        if known {
            return Ok(());
        }

        Err(AppError::Validation(format!(
            "module '{module}' is not registered in the grant catalog"
        )))
    }

    /// Ensures a grant references registered catalog keys.
    pub async fn validate_grant(&self, grant: &RoleGrant) -> AppResult<()> {
        match grant {
            RoleGrant::System { capability } => {
                let known = self
                    .repository
                    .list_system_capabilities()
                    .await?
                    .into_iter()
                    .any(|entry| entry.key == *capability);

                if known {
                    return Ok(());
                }

                Err(AppError::Validation(format!(
                    "system capability '{capability}' is not registered in the grant catalog"
                )))
            }
            RoleGrant::Module { module, capability } => {
                self.validate_module(module).await?;

                let known = self
                    .repository
                    .list_module_capabilities(module)
                    .await?
                    .into_iter()
                    .any(|entry| entry.key == *capability);

                if known {
                    return Ok(());
                }

                Err(AppError::Validation(format!(
                    "capability '{capability}' is not registered for module '{module}'"
                )))
            }
        }
    }
}
