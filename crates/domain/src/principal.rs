use grantline_core::PrincipalId;
use serde::{Deserialize, Serialize};

/// An authenticated actor being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque principal identifier, immutable after provisioning.
    pub id: PrincipalId,
    /// Platform-wide administrator flag.
    pub is_super_admin: bool,
    /// Supervising manager flag, equivalent in bypass power.
    pub is_supermanager: bool,
}

impl Principal {
    /// Creates a regular principal with no bypass flags.
    #[must_use]
    pub fn regular(id: PrincipalId) -> Self {
        Self {
            id,
            is_super_admin: false,
            is_supermanager: false,
        }
    }

    /// Returns whether this principal bypasses per-role resolution.
    ///
    /// Bypass is computed from these explicit flags only, never from role
    /// names or any other free-text signal.
    #[must_use]
    pub fn has_unrestricted_access(&self) -> bool {
        self.is_super_admin || self.is_supermanager
    }
}

#[cfg(test)]
mod tests {
    use grantline_core::PrincipalId;

    use super::Principal;

    #[test]
    fn regular_principal_is_restricted() {
        let principal = Principal::regular(PrincipalId::new());
        assert!(!principal.has_unrestricted_access());
    }

    #[test]
    fn either_flag_grants_bypass() {
        let mut principal = Principal::regular(PrincipalId::new());
        principal.is_supermanager = true;
        assert!(principal.has_unrestricted_access());

        principal.is_supermanager = false;
        principal.is_super_admin = true;
        assert!(principal.has_unrestricted_access());
    }
}
