//! Roles, membership bindings and the canonical grant model.

use grantline_core::{AppError, AppResult, NonEmptyString, OrganizationId, RoleId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{CapabilityKey, ModuleKey};

/// A named, organization-scoped bundle of capability grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Owning organization; grants never cross this boundary.
    pub organization_id: OrganizationId,
    /// Administrator-facing role name.
    pub display_name: NonEmptyString,
    /// Soft-deactivation flag; inactive roles contribute nothing.
    pub is_active: bool,
}

/// One active membership joined with its role, as produced by the role
/// aggregator. The organization id is the role's own organization; a
/// membership may never bind a role from another organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    /// Bound role identifier.
    pub role_id: RoleId,
    /// Organization owning both the membership and the role.
    pub organization_id: OrganizationId,
    /// Role display name carried for snapshot descriptors.
    pub display_name: String,
}

impl RoleBinding {
    /// Projects this binding into a snapshot role descriptor.
    #[must_use]
    pub fn descriptor(&self) -> RoleDescriptor {
        RoleDescriptor {
            role_id: self.role_id,
            organization_id: self.organization_id,
            display_name: self.display_name.clone(),
        }
    }
}

/// Role identity attached to a snapshot for display and audit purposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Bound role identifier.
    pub role_id: RoleId,
    /// Organization owning the role.
    pub organization_id: OrganizationId,
    /// Role display name at resolution time.
    pub display_name: String,
}

/// Canonical grant model. Every persisted grant, including rows imported
/// from the legacy group-based tables, normalizes into this union.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleGrant {
    /// Org-independent capability.
    System {
        /// Granted system capability key.
        capability: CapabilityKey,
    },
    /// Capability scoped to one functional module.
    Module {
        /// Module the capability belongs to.
        module: ModuleKey,
        /// Granted capability key within the module.
        capability: CapabilityKey,
    },
}

impl RoleGrant {
    /// Normalizes one legacy grant blob into canonical grants.
    ///
    /// The legacy store held two inconsistent shapes. The keyed shape:
    ///
    /// ```json
    /// {"system": ["users.manage"], "modules": {"sales": ["view", "edit"]}}
    /// ```
    ///
    /// and the older list shape, where entries are `module/capability`
    /// strings and entries without a `/` are system capabilities:
    ///
    /// ```json
    /// ["sales/view", "users.manage"]
    /// ```
    ///
    /// Anything else is rejected; shape ambiguity stops at this boundary.
    pub fn from_legacy_blob(blob: &Value) -> AppResult<Vec<Self>> {
        match blob {
            Value::Array(entries) => entries.iter().map(Self::from_legacy_list_entry).collect(),
            Value::Object(fields) => {
                let mut grants = Vec::new();

                if let Some(system) = fields.get("system") {
                    let entries = system.as_array().ok_or_else(|| {
                        AppError::Validation(
                            "legacy 'system' field must be an array of capability keys".to_owned(),
                        )
                    })?;
                    for entry in entries {
                        grants.push(Self::System {
                            capability: legacy_key(entry, "system capability")?.parse()?,
                        });
                    }
                }

                if let Some(modules) = fields.get("modules") {
                    let entries = modules.as_object().ok_or_else(|| {
                        AppError::Validation(
                            "legacy 'modules' field must map module keys to capability arrays"
                                .to_owned(),
                        )
                    })?;
                    for (module, capabilities) in entries {
                        let module: ModuleKey = module.parse()?;
                        let capabilities = capabilities.as_array().ok_or_else(|| {
                            AppError::Validation(format!(
                                "legacy module '{module}' capabilities must be an array"
                            ))
                        })?;
                        for capability in capabilities {
                            grants.push(Self::Module {
                                module: module.clone(),
                                capability: legacy_key(capability, "module capability")?.parse()?,
                            });
                        }
                    }
                }

                if grants.is_empty() && !fields.contains_key("system") && !fields.contains_key("modules") {
                    return Err(AppError::Validation(
                        "legacy grant object carries neither 'system' nor 'modules'".to_owned(),
                    ));
                }

                Ok(grants)
            }
            _ => Err(AppError::Validation(
                "legacy grant blob must be an array or an object".to_owned(),
            )),
        }
    }

    fn from_legacy_list_entry(entry: &Value) -> AppResult<Self> {
        let text = legacy_key(entry, "grant entry")?;
        match text.split_once('/') {
            Some((module, capability)) => Ok(Self::Module {
                module: module.parse()?,
                capability: capability.parse()?,
            }),
            None => Ok(Self::System {
                capability: text.parse()?,
            }),
        }
    }
}

fn legacy_key<'a>(value: &'a Value, kind: &str) -> AppResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| AppError::Validation(format!("legacy {kind} must be a string")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RoleGrant;

    #[test]
    fn keyed_legacy_blob_normalizes_both_sections() {
        let blob = json!({
            "system": ["users.manage"],
            "modules": {"sales": ["view", "edit"], "service": ["view"]}
        });

        let grants = RoleGrant::from_legacy_blob(&blob);
        assert!(grants.as_ref().is_ok_and(|grants| grants.len() == 4));
    }

    #[test]
    fn list_legacy_blob_distinguishes_system_entries() {
        let blob = json!(["sales/view", "users.manage"]);

        let grants = RoleGrant::from_legacy_blob(&blob);
        let Ok(grants) = grants else {
            panic!("list blob should normalize");
        };
        assert!(matches!(grants[0], RoleGrant::Module { .. }));
        assert!(matches!(grants[1], RoleGrant::System { .. }));
    }

    #[test]
    fn scalar_legacy_blob_is_rejected() {
        assert!(RoleGrant::from_legacy_blob(&json!("sales/view")).is_err());
        assert!(RoleGrant::from_legacy_blob(&json!(42)).is_err());
    }

    #[test]
    fn malformed_keys_inside_legacy_blob_are_rejected() {
        let blob = json!({"modules": {"Sales": ["view"]}});
        assert!(RoleGrant::from_legacy_blob(&blob).is_err());
    }
}
