//! Scope-aware authorization engine for a multi-tenant institutional
//! hierarchy.
//!
//! The engine answers two questions for surrounding application code: what
//! is a principal's effective permission set, and may a principal perform a
//! given action on a given resource. It combines a dependency graph over
//! permissions, a scope/level compatibility model tied to the institution
//! tree, a memoized permission cache with cascading invalidation, and a
//! translation layer for the legacy flat-boolean permission model.
//!
//! [`AuthorizationEngine`] is the facade; the modules underneath are usable
//! on their own for callers that need finer control.

pub mod cache;
pub mod decision;
pub mod engine;
pub mod hierarchy;
pub mod legacy;
pub mod permission;
pub mod principal;
pub mod registry;
pub mod role;
pub mod validator;

pub use cache::{
    AccessDataSource, CacheEntry, CacheKey, InMemoryPermissionStore, PermissionCache,
    PermissionStore,
};
pub use decision::{
    AccessDecisionEngine, AccessLevel, Action, Decision, InstitutionScope, ResourceDescriptor,
};
pub use engine::{AssignmentReview, AuthorizationEngine, InvalidationTarget};
pub use hierarchy::{HierarchyResolver, InstitutionNode, InstitutionTree};
pub use legacy::{LegacyPermissionSet, PermissionTemplate};
pub use permission::{PermissionDef, PermissionName, ScopeTier};
pub use principal::Principal;
pub use registry::{PermissionRegistry, RegistryConfig};
pub use role::{Role, RoleCategory, RoleName};
pub use validator::{
    BatchValidationReport, PermissionValidator, RiskFinding, Severity, ValidationReport,
};

#[cfg(test)]
mod integration_tests;
