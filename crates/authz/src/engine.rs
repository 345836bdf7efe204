//! The authorization engine facade: the five operations surrounding
//! application code calls.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use maarif_core::{DomainResult, RoleId, UserId};

use crate::cache::{AccessDataSource, PermissionCache, PermissionStore};
use crate::decision::{AccessDecisionEngine, Action, Decision, ResourceDescriptor};
use crate::hierarchy::{HierarchyResolver, InstitutionTree};
use crate::legacy::{self, LegacyPermissionSet};
use crate::permission::PermissionName;
use crate::registry::PermissionRegistry;
use crate::role::Role;
use crate::validator::{BatchValidationReport, PermissionValidator, RiskFinding, ValidationReport};

/// What to drop from the cache. Role and permission targets cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidationTarget {
    User { id: UserId },
    Role { id: RoleId },
    Permission { name: PermissionName },
}

/// A validation verdict with its advisory escalation findings attached.
/// Findings never affect `report.valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReview {
    pub report: ValidationReport,
    pub risks: Vec<RiskFinding>,
}

/// Entry point tying the registry, cache, hierarchy, and decision rules
/// together behind a small synchronous surface.
///
/// Construction validates the legacy mapping table against the registry, so
/// translation never encounters an unknown target at request time.
pub struct AuthorizationEngine<S, D> {
    cache: PermissionCache<S, D>,
    registry: Arc<PermissionRegistry>,
    tree: InstitutionTree,
}

impl<S: PermissionStore, D: AccessDataSource> AuthorizationEngine<S, D> {
    pub fn new(
        store: S,
        source: D,
        registry: PermissionRegistry,
        tree: InstitutionTree,
    ) -> DomainResult<Self> {
        legacy::validate_mappings(&registry)?;
        let registry = Arc::new(registry);
        info!(
            permissions = registry.len(),
            institutions = tree.len(),
            "authorization engine initialized"
        );
        Ok(Self {
            cache: PermissionCache::new(store, source, registry.clone()),
            registry,
            tree,
        })
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &PermissionCache<S, D> {
        &self.cache
    }

    pub fn tree(&self) -> &InstitutionTree {
        &self.tree
    }

    /// Decide whether the principal may perform `action` on `resource`.
    ///
    /// Denial is a value; a failing reference-data read also reports as
    /// deny (fail closed), never as an error.
    pub fn decide(&self, principal: UserId, resource: &ResourceDescriptor, action: Action) -> Decision {
        let source = self.cache.source();
        let subject = match source.principal(principal) {
            Ok(subject) => subject,
            Err(error) => {
                warn!(%principal, %error, "principal lookup failed; denying");
                return Decision::deny("principal could not be resolved");
            }
        };

        let mut roles: Vec<Role> = Vec::with_capacity(subject.roles.len());
        for role_id in &subject.roles {
            match source.role(*role_id) {
                Ok(role) => roles.push(role),
                Err(error) => {
                    warn!(%principal, %role_id, %error, "role lookup failed; denying");
                    return Decision::deny("role could not be resolved");
                }
            }
        }

        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&self.tree));
        engine.decide(&subject, &roles, resource, action)
    }

    /// The principal's effective permission set (direct grants plus active
    /// role grants, closed under dependencies), served from the cache.
    pub fn effective_permissions(&self, principal: UserId) -> DomainResult<BTreeSet<PermissionName>> {
        self.cache.get_user_permissions(principal)
    }

    /// Validate a role↔permission assignment and attach escalation findings.
    pub fn validate_assignment(
        &self,
        role: RoleId,
        permission: &PermissionName,
    ) -> DomainResult<AssignmentReview> {
        let role = self.cache.source().role(role)?;
        let validator = PermissionValidator::new(&self.registry);
        Ok(AssignmentReview {
            report: validator.validate_assignment(&role, permission),
            risks: validator.check_security_risk(&role, permission),
        })
    }

    /// Validate many assignments in one pass, tolerating per-entry failures.
    pub fn validate_assignments(
        &self,
        role: RoleId,
        permissions: &[PermissionName],
    ) -> DomainResult<BatchValidationReport> {
        let role = self.cache.source().role(role)?;
        let validator = PermissionValidator::new(&self.registry);
        Ok(validator.validate_assignments(&role, permissions))
    }

    /// Translate and apply a legacy boolean permission set for a principal.
    ///
    /// The raw payload is normalized (coercion, coarse-flag expansion),
    /// required to carry at least one enabled field, translated to canonical
    /// names, and closed under dependencies. The principal's cache entry is
    /// invalidated before the result is returned, so no later read observes
    /// the pre-mutation set.
    pub fn apply_legacy_permission_set<'a>(
        &self,
        principal: UserId,
        raw: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> DomainResult<BTreeSet<PermissionName>> {
        let canonical = self.translate_legacy(raw)?;
        self.cache.invalidate_user(principal);
        info!(%principal, count = canonical.len(), "legacy permission set applied");
        Ok(canonical)
    }

    /// The translation [`apply_legacy_permission_set`] would produce,
    /// without touching the cache.
    ///
    /// [`apply_legacy_permission_set`]: AuthorizationEngine::apply_legacy_permission_set
    pub fn preview_legacy_permission_set<'a>(
        &self,
        raw: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> DomainResult<BTreeSet<PermissionName>> {
        self.translate_legacy(raw)
    }

    /// Drop cached permission sets. Completes only after every affected
    /// entry is gone, so callers may acknowledge their mutation as soon as
    /// this returns.
    pub fn invalidate(&self, target: InvalidationTarget) -> DomainResult<()> {
        match target {
            InvalidationTarget::User { id } => {
                self.cache.invalidate_user(id);
                Ok(())
            }
            InvalidationTarget::Role { id } => self.cache.invalidate_role(id),
            InvalidationTarget::Permission { name } => self.cache.invalidate_permission(&name),
        }
    }

    fn translate_legacy<'a>(
        &self,
        raw: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> DomainResult<BTreeSet<PermissionName>> {
        let set = LegacyPermissionSet::from_raw(raw);
        set.require_any_enabled()?;
        let canonical = legacy::to_canonical(&set);
        let validator = PermissionValidator::new(&self.registry);
        Ok(validator.validate_and_enrich(canonical))
    }
}
