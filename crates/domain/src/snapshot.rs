//! Resolved permission snapshots and their union algebra.

use std::collections::{BTreeMap, BTreeSet};

use grantline_core::{PrincipalId, RoleId};
use serde::{Deserialize, Serialize};

use crate::catalog::{CapabilityKey, ModuleKey};
use crate::role::RoleDescriptor;

/// How consumers should treat a module that is enabled for at least one
/// role but carries zero granted capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityPolicy {
    /// The module shows up (read-only surface); the default.
    #[default]
    TreatEmptyAsVisible,
    /// The module is hidden until a capability is granted inside it.
    TreatEmptyAsHidden,
}

/// All three grant facets of a single role, as returned by either the
/// batched retrieval path or the fallback query engine. Both paths must
/// produce the same shape for the same role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFacets {
    /// Modules this role may see at all.
    pub enabled_modules: BTreeSet<ModuleKey>,
    /// Org-independent capabilities granted to the role.
    pub system_capabilities: BTreeSet<CapabilityKey>,
    /// Per-module capabilities granted to the role.
    pub module_capabilities: BTreeMap<ModuleKey, BTreeSet<CapabilityKey>>,
}

/// Internal resolution diagnostics. Not part of snapshot identity: two
/// snapshots resolved over different paths compare equal when their grants
/// are equal.
#[derive(Debug, Clone, Default)]
pub struct ResolutionDiagnostics {
    /// Whether the fallback query engine served any role.
    pub used_fallback: bool,
    /// Roles whose facets failed to load and contributed no grants.
    pub degraded_roles: Vec<RoleId>,
}

/// The immutable, resolved view of one principal's total capabilities.
///
/// Containers are ordered so repeated resolutions of unchanged state
/// serialize byte-for-byte identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    /// Principal this snapshot was resolved for.
    pub principal_id: PrincipalId,
    /// Bypass accounts hold every capability without role resolution.
    pub is_unrestricted: bool,
    /// Union of system capabilities across all active roles.
    pub system_capabilities: BTreeSet<CapabilityKey>,
    /// Union of module capabilities across all active roles, keyed by
    /// module. A key is present iff some role enabled the module; an
    /// enabled module with no granted capabilities keeps an empty set.
    pub module_capabilities: BTreeMap<ModuleKey, BTreeSet<CapabilityKey>>,
    /// Descriptors of every active role binding, sorted. Roles listed in
    /// `diagnostics.degraded_roles` appear here too; degradation withholds
    /// a role's grants, not its membership.
    pub roles: Vec<RoleDescriptor>,
    /// Diagnostics for operators; excluded from equality and the wire form.
    #[serde(skip)]
    pub diagnostics: ResolutionDiagnostics,
}

impl PermissionSnapshot {
    /// Creates an empty snapshot: a valid state for a principal with no
    /// active memberships, granting nothing.
    #[must_use]
    pub fn empty(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            is_unrestricted: false,
            system_capabilities: BTreeSet::new(),
            module_capabilities: BTreeMap::new(),
            roles: Vec::new(),
            diagnostics: ResolutionDiagnostics::default(),
        }
    }

    /// Creates the bypass snapshot for super-admin or supermanager
    /// principals.
    #[must_use]
    pub fn unrestricted(principal_id: PrincipalId) -> Self {
        Self {
            is_unrestricted: true,
            ..Self::empty(principal_id)
        }
    }

    /// Unions one role's facets into this snapshot.
    ///
    /// Module capabilities are admitted only for modules enabled in the
    /// same facet set. The fallback path already restricts its queries to
    /// enabled modules; re-checking here keeps a divergent facet source
    /// from leaking capabilities for disabled modules.
    pub fn absorb(&mut self, facets: &RoleFacets) {
        self.system_capabilities
            .extend(facets.system_capabilities.iter().cloned());

        for module in &facets.enabled_modules {
            self.module_capabilities.entry(module.clone()).or_default();
        }

        for (module, capabilities) in &facets.module_capabilities {
            if !facets.enabled_modules.contains(module) {
                continue;
            }
            self.module_capabilities
                .entry(module.clone())
                .or_default()
                .extend(capabilities.iter().cloned());
        }
    }

    /// Unions another snapshot into this one. Grants never subtract: the
    /// result holds every capability either side holds.
    pub fn union_with(&mut self, other: &Self) {
        self.is_unrestricted |= other.is_unrestricted;
        self.system_capabilities
            .extend(other.system_capabilities.iter().cloned());
        for (module, capabilities) in &other.module_capabilities {
            self.module_capabilities
                .entry(module.clone())
                .or_default()
                .extend(capabilities.iter().cloned());
        }
        for role in &other.roles {
            if !self.roles.contains(role) {
                self.roles.push(role.clone());
            }
        }
        self.roles.sort();
    }

    /// Sorts and deduplicates the attached role descriptors.
    pub fn finalize_roles(&mut self) {
        self.roles.sort();
        self.roles.dedup();
    }

    /// Returns whether the principal holds an org-independent capability.
    #[must_use]
    pub fn has_system_capability(&self, capability: &CapabilityKey) -> bool {
        self.is_unrestricted || self.system_capabilities.contains(capability)
    }

    /// Returns whether the principal holds a capability within a module.
    #[must_use]
    pub fn has_module_capability(&self, module: &ModuleKey, capability: &CapabilityKey) -> bool {
        if self.is_unrestricted {
            return true;
        }

        self.module_capabilities
            .get(module)
            .is_some_and(|capabilities| capabilities.contains(capability))
    }

    /// Returns whether a module is visible to the principal under the
    /// given empty-module policy.
    #[must_use]
    pub fn is_module_visible(&self, module: &ModuleKey, policy: VisibilityPolicy) -> bool {
        if self.is_unrestricted {
            return true;
        }

        match self.module_capabilities.get(module) {
            None => false,
            Some(capabilities) => match policy {
                VisibilityPolicy::TreatEmptyAsVisible => true,
                VisibilityPolicy::TreatEmptyAsHidden => !capabilities.is_empty(),
            },
        }
    }

    /// Returns whether the snapshot grants nothing at all.
    #[must_use]
    pub fn grants_nothing(&self) -> bool {
        !self.is_unrestricted
            && self.system_capabilities.is_empty()
            && self.module_capabilities.is_empty()
    }
}

impl PartialEq for PermissionSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.principal_id == other.principal_id
            && self.is_unrestricted == other.is_unrestricted
            && self.system_capabilities == other.system_capabilities
            && self.module_capabilities == other.module_capabilities
            && self.roles == other.roles
    }
}

impl Eq for PermissionSnapshot {}
