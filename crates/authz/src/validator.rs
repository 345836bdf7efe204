//! Assignment validation: scope/level rules, dependency closure, risk flags.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::permission::{PermissionName, ScopeTier};
use crate::registry::PermissionRegistry;
use crate::role::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of validating a single role↔permission assignment.
///
/// `valid` is the AND of all hard checks; warnings never flip it. Findings
/// are aggregated, not fail-fast, so callers see every problem at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn passing() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Roll-up of a batch validation pass over many permission names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchValidationReport {
    pub valid: bool,
    pub checked: usize,
    pub failed: usize,
    pub reports: BTreeMap<PermissionName, ValidationReport>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Severity of a privilege-escalation finding. Advisory only; findings
/// never block an assignment by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub severity: Severity,
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Validator
// ─────────────────────────────────────────────────────────────────────────────

/// Role levels above this may not hold system-scope or escalation
/// permissions without a risk finding. The boundary is inclusive: a role
/// exactly at the threshold is not flagged.
const RISK_LEVEL_THRESHOLD: u8 = 2;

/// Validates role↔permission assignments against the registry's scope/level
/// model and computes dependency closures. Pure over an immutable registry.
#[derive(Debug, Clone, Copy)]
pub struct PermissionValidator<'a> {
    registry: &'a PermissionRegistry,
}

impl<'a> PermissionValidator<'a> {
    pub fn new(registry: &'a PermissionRegistry) -> Self {
        Self { registry }
    }

    /// Validate a single assignment.
    ///
    /// Hard errors: unknown permission, role level below the scope's
    /// maximum, missing department access. Inactive permission is a
    /// non-blocking warning.
    pub fn validate_assignment(&self, role: &Role, permission: &PermissionName) -> ValidationReport {
        let mut report = ValidationReport::passing();

        let Some(def) = self.registry.get(permission) else {
            report.error(format!("permission {permission} not found"));
            return report;
        };

        let max_level = self.registry.max_role_level_for(def.scope);
        if role.level > max_level {
            report.error(format!(
                "role {} (level {}) cannot hold {}-scope permission {}: maximum allowed level is {}",
                role.name, role.level, def.scope, permission, max_level
            ));
        }

        if !def.active {
            report.warning(format!("permission {permission} is inactive"));
        }

        if let Some(department) = &def.department {
            if !role.department_access.contains(department) {
                report.error(format!(
                    "permission {} requires department access '{}' which role {} does not have",
                    permission, department, role.name
                ));
            }
        }

        report
    }

    /// Validate each permission independently and roll up the findings.
    ///
    /// A name that does not resolve fails its own entry only; the rest of
    /// the batch is still validated.
    pub fn validate_assignments(
        &self,
        role: &Role,
        permissions: &[PermissionName],
    ) -> BatchValidationReport {
        let mut batch = BatchValidationReport {
            valid: true,
            checked: permissions.len(),
            ..Default::default()
        };
        for permission in permissions {
            let report = self.validate_assignment(role, permission);
            if !report.valid {
                batch.valid = false;
                batch.failed += 1;
            }
            batch.errors.extend(report.errors.iter().cloned());
            batch.warnings.extend(report.warnings.iter().cloned());
            batch.reports.insert(permission.clone(), report);
        }
        batch
    }

    /// Close the input set under the dependency graph.
    ///
    /// Order-independent and deduplicated; a permission already visited is
    /// not re-expanded, so malformed graphs cannot loop. Every dependency
    /// of every output member is itself in the output.
    pub fn validate_and_enrich(
        &self,
        permissions: impl IntoIterator<Item = PermissionName>,
    ) -> BTreeSet<PermissionName> {
        let mut enriched = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<PermissionName> = permissions.into_iter().collect();

        while let Some(permission) = stack.pop() {
            if !visited.insert(permission.clone()) {
                continue;
            }
            for dependency in self.registry.dependencies_of(&permission) {
                stack.push(dependency.clone());
            }
            enriched.insert(permission);
        }

        enriched
    }

    /// What enrichment *would* add, per permission, without committing.
    ///
    /// Permissions whose transitive dependencies are all already present in
    /// the input do not appear in the result.
    pub fn missing_dependencies(
        &self,
        permissions: &[PermissionName],
    ) -> BTreeMap<PermissionName, BTreeSet<PermissionName>> {
        let present: BTreeSet<&PermissionName> = permissions.iter().collect();
        let mut missing = BTreeMap::new();

        for permission in permissions {
            let closure = self.validate_and_enrich([permission.clone()]);
            let absent: BTreeSet<PermissionName> = closure
                .into_iter()
                .filter(|p| p != permission && !present.contains(p))
                .collect();
            if !absent.is_empty() {
                missing.insert(permission.clone(), absent);
            }
        }

        missing
    }

    /// Advisory privilege-escalation findings for an assignment.
    pub fn check_security_risk(&self, role: &Role, permission: &PermissionName) -> Vec<RiskFinding> {
        let mut findings = Vec::new();
        let Some(def) = self.registry.get(permission) else {
            return findings;
        };

        if def.scope == ScopeTier::Global && role.level > 1 {
            findings.push(RiskFinding {
                severity: Severity::Critical,
                message: format!(
                    "global-scope permission {} granted to role {} at level {}",
                    permission, role.name, role.level
                ),
            });
        }

        if def.scope == ScopeTier::System && role.level > RISK_LEVEL_THRESHOLD {
            findings.push(RiskFinding {
                severity: Severity::High,
                message: format!(
                    "system-scope permission {} granted to role {} at level {}",
                    permission, role.name, role.level
                ),
            });
        }

        if self.registry.is_escalation(permission) && role.level > RISK_LEVEL_THRESHOLD {
            findings.push(RiskFinding {
                severity: Severity::High,
                message: format!(
                    "escalation-class permission {} granted to role {} at level {}",
                    permission, role.name, role.level
                ),
            });
        }

        findings
    }

    /// Whether `assigner` may grant the role `target` to another principal,
    /// per the category hierarchy.
    pub fn can_assign_role(&self, assigner: &Role, target: &Role) -> bool {
        assigner.category().can_assign(target.category())
    }
}
