//! Permission registry: the immutable, configured permission model.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use maarif_core::{DomainError, DomainResult};

use crate::permission::{PermissionDef, PermissionName, ScopeTier};

// ─────────────────────────────────────────────────────────────────────────────
// Registry Config
// ─────────────────────────────────────────────────────────────────────────────

/// Externally supplied registry configuration.
///
/// Loaded once at process start; [`PermissionRegistry::from_config`] rejects
/// malformed graphs so nothing downstream has to re-check them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub permissions: Vec<PermissionDef>,
    /// Permissions whose grant to lower-privilege roles is flagged as an
    /// escalation risk (role/permission/user-assignment management).
    #[serde(default)]
    pub escalation: BTreeSet<PermissionName>,
}

impl RegistryConfig {
    /// The stock catalog shipped with the engine: five resource families
    /// with their CRUD-style actions, plus the administrative permissions
    /// that make up the default escalation set.
    pub fn builtin() -> Self {
        fn def(name: &'static str, scope: ScopeTier) -> PermissionDef {
            PermissionDef {
                name: PermissionName::from(name),
                scope,
                department: None,
                active: true,
                depends_on: Vec::new(),
            }
        }
        fn dep(name: &'static str, scope: ScopeTier, on: &[&'static str]) -> PermissionDef {
            PermissionDef {
                depends_on: on.iter().copied().map(PermissionName::from).collect(),
                ..def(name, scope)
            }
        }

        let permissions = vec![
            // Surveys
            def("surveys.read", ScopeTier::Institution),
            dep("surveys.create", ScopeTier::Institution, &["surveys.read"]),
            dep("surveys.update", ScopeTier::Institution, &["surveys.read"]),
            dep("surveys.delete", ScopeTier::Institution, &["surveys.read"]),
            dep("surveys.publish", ScopeTier::Sector, &["surveys.read", "surveys.update"]),
            // Tasks
            def("tasks.read", ScopeTier::Institution),
            dep("tasks.create", ScopeTier::Institution, &["tasks.read"]),
            dep("tasks.update", ScopeTier::Institution, &["tasks.read"]),
            dep("tasks.delete", ScopeTier::Institution, &["tasks.read"]),
            dep("tasks.assign", ScopeTier::Sector, &["tasks.read", "tasks.create"]),
            // Documents
            def("documents.read", ScopeTier::Institution),
            dep("documents.create", ScopeTier::Institution, &["documents.read"]),
            dep("documents.update", ScopeTier::Institution, &["documents.read"]),
            dep("documents.delete", ScopeTier::Institution, &["documents.read"]),
            dep("documents.share", ScopeTier::Institution, &["documents.read"]),
            // Folders
            dep("folders.create", ScopeTier::Institution, &["documents.read"]),
            dep("folders.update", ScopeTier::Institution, &["documents.read"]),
            dep("folders.delete", ScopeTier::Institution, &["documents.read"]),
            dep("folders.manage", ScopeTier::Sector, &["documents.read", "folders.create"]),
            // Links
            def("links.read", ScopeTier::Institution),
            dep("links.create", ScopeTier::Institution, &["links.read"]),
            dep("links.update", ScopeTier::Institution, &["links.read"]),
            dep("links.delete", ScopeTier::Institution, &["links.read"]),
            dep("links.share", ScopeTier::Institution, &["links.read"]),
            // Administration
            def("roles.manage", ScopeTier::System),
            def("permissions.manage", ScopeTier::System),
            def("users.assign_roles", ScopeTier::Regional),
            def("institutions.manage", ScopeTier::System),
            def("system.configure", ScopeTier::Global),
        ];

        let escalation = ["roles.manage", "permissions.manage", "users.assign_roles"]
            .into_iter()
            .map(PermissionName::from)
            .collect();

        Self { permissions, escalation }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable lookup over the configured permission model.
///
/// Performs no I/O after construction; every query is an in-memory lookup.
/// The scope→max-level table lives on [`ScopeTier`] and is reached through
/// [`PermissionRegistry::max_role_level_for`] so the validator and the
/// decision engine always consult the same table.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    defs: HashMap<PermissionName, PermissionDef>,
    escalation: BTreeSet<PermissionName>,
}

impl PermissionRegistry {
    /// Build the registry, rejecting duplicate names, dependencies on
    /// undefined permissions, and cycles in the dependency graph.
    pub fn from_config(config: RegistryConfig) -> DomainResult<Self> {
        let mut defs = HashMap::with_capacity(config.permissions.len());
        for def in config.permissions {
            if defs.insert(def.name.clone(), def.clone()).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate permission definition: {}",
                    def.name
                )));
            }
        }

        for def in defs.values() {
            for dependency in &def.depends_on {
                if !defs.contains_key(dependency) {
                    return Err(DomainError::validation(format!(
                        "permission {} depends on undefined permission {}",
                        def.name, dependency
                    )));
                }
            }
        }

        let registry = Self {
            defs,
            escalation: config.escalation,
        };
        registry.reject_dependency_cycles()?;
        Ok(registry)
    }

    pub fn builtin() -> Self {
        // The builtin catalog is cycle-free by construction.
        Self::from_config(RegistryConfig::builtin())
            .unwrap_or_else(|e| unreachable!("builtin catalog is valid: {e}"))
    }

    pub fn get(&self, name: &PermissionName) -> Option<&PermissionDef> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &PermissionName) -> bool {
        self.defs.contains_key(name)
    }

    pub fn scope_of(&self, name: &PermissionName) -> Option<ScopeTier> {
        self.defs.get(name).map(|d| d.scope)
    }

    /// Direct dependencies; empty for unknown permissions.
    pub fn dependencies_of(&self, name: &PermissionName) -> &[PermissionName] {
        self.defs
            .get(name)
            .map(|d| d.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Unknown permissions report as inactive.
    pub fn is_active(&self, name: &PermissionName) -> bool {
        self.defs.get(name).is_some_and(|d| d.active)
    }

    pub fn department_of(&self, name: &PermissionName) -> Option<&str> {
        self.defs.get(name).and_then(|d| d.department.as_deref())
    }

    pub fn is_escalation(&self, name: &PermissionName) -> bool {
        self.escalation.contains(name)
    }

    pub fn max_role_level_for(&self, tier: ScopeTier) -> u8 {
        tier.max_role_level()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionDef> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Depth-first check over the dependency graph. Runs once at load so
    /// runtime closure computation can assume acyclicity.
    fn reject_dependency_cycles(&self) -> DomainResult<()> {
        let mut done: HashSet<&PermissionName> = HashSet::new();

        for start in self.defs.keys() {
            if done.contains(start) {
                continue;
            }
            let mut in_progress: HashSet<&PermissionName> = HashSet::new();
            // (node, next child index) pairs form an explicit DFS stack.
            let mut stack: Vec<(&PermissionName, usize)> = vec![(start, 0)];
            in_progress.insert(start);

            while let Some((node, child_idx)) = stack.pop() {
                let deps = self.dependencies_of(node);
                if child_idx < deps.len() {
                    stack.push((node, child_idx + 1));
                    let child = &deps[child_idx];
                    if done.contains(child) {
                        continue;
                    }
                    if !in_progress.insert(child) {
                        return Err(DomainError::integrity(format!(
                            "permission dependency cycle through {child}"
                        )));
                    }
                    stack.push((child, 0));
                } else {
                    in_progress.remove(node);
                    done.insert(node);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &'static str) -> PermissionName {
        PermissionName::from(s)
    }

    #[test]
    fn builtin_catalog_loads_and_answers_lookups() {
        let registry = PermissionRegistry::builtin();
        assert_eq!(registry.scope_of(&name("surveys.read")), Some(ScopeTier::Institution));
        assert_eq!(registry.scope_of(&name("system.configure")), Some(ScopeTier::Global));
        assert_eq!(registry.scope_of(&name("nope")), None);
        assert_eq!(
            registry.dependencies_of(&name("surveys.publish")),
            &[name("surveys.read"), name("surveys.update")]
        );
        assert!(registry.dependencies_of(&name("nope")).is_empty());
        assert!(registry.is_escalation(&name("roles.manage")));
        assert!(!registry.is_escalation(&name("surveys.read")));
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        let mut config = RegistryConfig::builtin();
        config.permissions.push(config.permissions[0].clone());
        let err = PermissionRegistry::from_config(config).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let config = RegistryConfig {
            permissions: vec![PermissionDef {
                name: name("a"),
                scope: ScopeTier::Institution,
                department: None,
                active: true,
                depends_on: vec![name("ghost")],
            }],
            escalation: BTreeSet::new(),
        };
        let err = PermissionRegistry::from_config(config).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn dependency_cycle_is_rejected_at_load() {
        let def = |n: &'static str, on: &'static str| PermissionDef {
            name: name(n),
            scope: ScopeTier::Institution,
            department: None,
            active: true,
            depends_on: vec![name(on)],
        };
        let config = RegistryConfig {
            permissions: vec![def("a", "b"), def("b", "c"), def("c", "a")],
            escalation: BTreeSet::new(),
        };
        let err = PermissionRegistry::from_config(config).unwrap_err();
        assert!(matches!(err, DomainError::IntegrityFault(_)));
    }

    #[test]
    fn inactive_and_unknown_permissions_report_inactive() {
        let config = RegistryConfig {
            permissions: vec![PermissionDef {
                name: name("dormant"),
                scope: ScopeTier::Institution,
                department: None,
                active: false,
                depends_on: Vec::new(),
            }],
            escalation: BTreeSet::new(),
        };
        let registry = PermissionRegistry::from_config(config).unwrap();
        assert!(!registry.is_active(&name("dormant")));
        assert!(!registry.is_active(&name("missing")));
    }
}
