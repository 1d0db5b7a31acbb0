use std::fmt::{Display, Formatter};
use std::str::FromStr;

use grantline_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

fn validate_key(value: &str, kind: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{kind} must not be empty")));
    }

    let well_formed = value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-'))
        && !value.starts_with('.')
        && !value.ends_with('.');

    if !well_formed {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' must be lowercase ascii, digits, '.', '_' or '-'"
        )));
    }

    Ok(())
}

/// Key of a functional module (e.g. `sales`, `service`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ModuleKey(String);

impl ModuleKey {
    /// Creates a validated module key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_key(value.as_str(), "module key")?;
        Ok(Self(value))
    }

    /// Returns the stable storage value for this key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for ModuleKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for ModuleKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Key of one capability, either org-independent (system) or scoped to a
/// module (e.g. `view`, `record.export`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CapabilityKey(String);

impl CapabilityKey {
    /// Creates a validated capability key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_key(value.as_str(), "capability key")?;
        Ok(Self(value))
    }

    /// Returns the stable storage value for this key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for CapabilityKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for CapabilityKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Catalog entry describing one module for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCatalogEntry {
    /// Module key.
    pub key: ModuleKey,
    /// Human-readable module name.
    pub display_name: String,
}

/// Catalog entry describing one capability inside a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCapabilityEntry {
    /// Owning module key.
    pub module: ModuleKey,
    /// Capability key within the module.
    pub key: CapabilityKey,
    /// Human-readable capability name.
    pub display_name: String,
}

/// Catalog entry describing one org-independent capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemCapabilityEntry {
    /// System capability key.
    pub key: CapabilityKey,
    /// Human-readable capability name.
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::{CapabilityKey, ModuleKey};

    #[test]
    fn module_key_accepts_dotted_lowercase() {
        assert!(ModuleKey::new("sales").is_ok());
        assert!(ModuleKey::new("field_service-2.core").is_ok());
    }

    #[test]
    fn module_key_rejects_uppercase_and_blank() {
        assert!(ModuleKey::new("Sales").is_err());
        assert!(ModuleKey::new("").is_err());
        assert!(ModuleKey::new(".sales").is_err());
    }

    #[test]
    fn capability_key_roundtrips_storage_value() {
        let key = CapabilityKey::new("record.export");
        assert!(key.as_ref().is_ok_and(|k| k.as_str() == "record.export"));
    }
}
