//! Ordered access-rule evaluation: scope, ownership, allow-lists, hierarchy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use maarif_core::{InstitutionId, UserId};

use crate::hierarchy::HierarchyResolver;
use crate::principal::Principal;
use crate::role::{Role, RoleCategory, RoleName};

// ─────────────────────────────────────────────────────────────────────────────
// Actions and Decisions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Modify,
    Delete,
    Assign,
    Download,
    Share,
}

/// Outcome of an access decision. Denial is a first-class value, never an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource Descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// What the surrounding application tells the engine about a resource.
///
/// The engine never loads resources itself; callers project ownership and
/// visibility fields into this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub institution_id: Option<InstitutionId>,
    #[serde(default)]
    pub allowed_users: BTreeSet<UserId>,
    #[serde(default)]
    pub allowed_roles: BTreeSet<RoleName>,
    /// Older records carry this under `accessible_institutions`.
    #[serde(default, alias = "accessible_institutions")]
    pub allowed_institutions: BTreeSet<InstitutionId>,
    #[serde(default)]
    pub is_public: bool,
}

impl ResourceDescriptor {
    pub fn owned_by(owner: UserId) -> Self {
        Self {
            owner_id: Some(owner),
            ..Self::default()
        }
    }

    pub fn at_institution(institution: InstitutionId) -> Self {
        Self {
            institution_id: Some(institution),
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Capability Mask
// ─────────────────────────────────────────────────────────────────────────────

impl RoleCategory {
    /// Actions this category may perform on resources it can see.
    ///
    /// Layered on top of the base visibility decision for every rule except
    /// superadmin and ownership, which bypass the mask entirely.
    pub fn allows_action(self, action: Action) -> bool {
        use Action::*;
        match self {
            Self::SuperAdmin | Self::RegionAdmin | Self::SectorAdmin | Self::SchoolAdmin => true,
            Self::RegionOperator => matches!(action, View | Download | Share),
            Self::Deputy | Self::EventCoordinator | Self::FacilitiesManager => {
                matches!(action, View | Modify | Download | Share)
            }
            Self::Psychologist | Self::Teacher => matches!(action, View | Download),
            Self::Unclassified => matches!(action, View),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Access Decision Engine
// ─────────────────────────────────────────────────────────────────────────────

/// The principal's scope over the institution tree, as summarized from its
/// role categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum InstitutionScope {
    /// Every institution (superadmin tier).
    All,
    /// The rooted subtree under the principal's institution.
    Subtree { root: InstitutionId },
    /// The principal's own institution only.
    Own { institution: InstitutionId },
}

/// Coarse privilege tier, highest role wins. Reporting aid for callers that
/// group principals by reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    System,
    Region,
    Sector,
    School,
    Staff,
}

/// Pure, deny-by-default rule evaluator. First matching rule wins; the
/// capability mask is applied after any hierarchy or allow-list match.
#[derive(Debug, Clone, Copy)]
pub struct AccessDecisionEngine<'a> {
    resolver: HierarchyResolver<'a>,
}

impl<'a> AccessDecisionEngine<'a> {
    pub fn new(resolver: HierarchyResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Decide whether `principal`, holding `roles`, may perform `action` on
    /// `resource`.
    ///
    /// Rule order: superadmin, ownership, regional subtree, sector subtree,
    /// own institution, explicit allow-lists, public flag, deny.
    pub fn decide(
        &self,
        principal: &Principal,
        roles: &[Role],
        resource: &ResourceDescriptor,
        action: Action,
    ) -> Decision {
        if !principal.active {
            return Decision::deny("principal is inactive");
        }

        let categories: Vec<RoleCategory> =
            roles.iter().filter(|r| r.active).map(Role::category).collect();

        if categories.contains(&RoleCategory::SuperAdmin) {
            return Decision::Allow;
        }

        if resource.owner_id == Some(principal.id) {
            return Decision::Allow;
        }

        // Hierarchy rules need a resource institution to test against.
        if let Some(resource_inst) = resource.institution_id {
            let subtree_tier = categories
                .iter()
                .any(|c| matches!(c, RoleCategory::RegionAdmin | RoleCategory::RegionOperator))
                || categories.contains(&RoleCategory::SectorAdmin);
            if subtree_tier && self.resolver.is_within(resource_inst, principal.institution_id) {
                return self.masked(&categories, action);
            }

            let own_tier = categories.iter().any(|c| {
                matches!(
                    c,
                    RoleCategory::SchoolAdmin
                        | RoleCategory::Deputy
                        | RoleCategory::EventCoordinator
                        | RoleCategory::FacilitiesManager
                        | RoleCategory::Psychologist
                        | RoleCategory::Teacher
                )
            });
            if own_tier && resource_inst == principal.institution_id {
                return self.masked(&categories, action);
            }
        }

        if resource.allowed_users.contains(&principal.id)
            || roles.iter().any(|r| resource.allowed_roles.contains(&r.name))
            || resource.allowed_institutions.contains(&principal.institution_id)
        {
            return self.masked(&categories, action);
        }

        if resource.is_public {
            return self.masked(&categories, action);
        }

        Decision::deny("no access rule matched")
    }

    /// Which institutions the principal's strongest role lets it see.
    pub fn institution_scope(&self, principal: &Principal, roles: &[Role]) -> InstitutionScope {
        let categories: Vec<RoleCategory> =
            roles.iter().filter(|r| r.active).map(Role::category).collect();

        if categories.contains(&RoleCategory::SuperAdmin) {
            InstitutionScope::All
        } else if categories.iter().any(|c| {
            matches!(
                c,
                RoleCategory::RegionAdmin | RoleCategory::RegionOperator | RoleCategory::SectorAdmin
            )
        }) {
            InstitutionScope::Subtree {
                root: principal.institution_id,
            }
        } else {
            InstitutionScope::Own {
                institution: principal.institution_id,
            }
        }
    }

    /// Concrete institution ids reachable under the principal's scope.
    /// `None` means unrestricted.
    pub fn accessible_institutions(
        &self,
        principal: &Principal,
        roles: &[Role],
    ) -> Option<BTreeSet<InstitutionId>> {
        match self.institution_scope(principal, roles) {
            InstitutionScope::All => None,
            InstitutionScope::Subtree { root } => {
                let mut set = self.resolver.descendants(root);
                set.insert(root);
                Some(set)
            }
            InstitutionScope::Own { institution } => Some(BTreeSet::from([institution])),
        }
    }

    /// Highest privilege tier among the principal's active roles.
    pub fn access_level(&self, roles: &[Role]) -> AccessLevel {
        roles
            .iter()
            .filter(|r| r.active)
            .map(|r| match r.category() {
                RoleCategory::SuperAdmin => AccessLevel::System,
                RoleCategory::RegionAdmin | RoleCategory::RegionOperator => AccessLevel::Region,
                RoleCategory::SectorAdmin => AccessLevel::Sector,
                RoleCategory::SchoolAdmin => AccessLevel::School,
                _ => AccessLevel::Staff,
            })
            .min()
            .unwrap_or(AccessLevel::Staff)
    }

    /// Apply the capability mask: the union of what the held categories
    /// allow. A principal with no active roles is treated as unclassified.
    fn masked(&self, categories: &[RoleCategory], action: Action) -> Decision {
        let permitted = if categories.is_empty() {
            RoleCategory::Unclassified.allows_action(action)
        } else {
            categories.iter().any(|c| c.allows_action(action))
        };
        if permitted {
            Decision::Allow
        } else {
            Decision::deny(format!("role category does not permit {action:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet as Set;

    use maarif_core::RoleId;
    use crate::hierarchy::{InstitutionNode, InstitutionTree};

    fn id(n: i64) -> InstitutionId {
        InstitutionId::new(n)
    }

    fn tree() -> InstitutionTree {
        let node = |n: i64, parent: Option<i64>, level: u8| InstitutionNode {
            id: id(n),
            parent_id: parent.map(id),
            level,
            region_id: None,
            is_active: true,
        };
        // Region 1 → sector 2 → schools 5, 6.
        InstitutionTree::from_nodes([
            node(1, None, 2),
            node(2, Some(1), 3),
            node(5, Some(2), 4),
            node(6, Some(2), 4),
        ])
    }

    fn role(name: &'static str, level: u8) -> Role {
        Role {
            id: RoleId::new(),
            name: RoleName::new(name),
            level,
            department_access: Set::new(),
            active: true,
            permissions: Set::new(),
        }
    }

    fn principal_at(institution: i64) -> Principal {
        Principal::new(UserId::new(), id(institution))
    }

    #[test]
    fn owner_may_delete_regardless_of_institution() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let owner = principal_at(5);
        let resource = ResourceDescriptor {
            owner_id: Some(owner.id),
            institution_id: Some(id(999)),
            ..Default::default()
        };
        let roles = [role("müəllim", 5)];
        assert_eq!(engine.decide(&owner, &roles, &resource, Action::Delete), Decision::Allow);
    }

    #[test]
    fn school_role_is_denied_across_institutions() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(5);
        let roles = [role("schooladmin", 4)];
        let resource = ResourceDescriptor::at_institution(id(6));
        assert!(!engine.decide(&principal, &roles, &resource, Action::View).is_allowed());
    }

    #[test]
    fn regional_role_reaches_the_whole_subtree() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(1);
        let roles = [role("regionadmin", 2)];

        for inst in [1, 2, 5, 6] {
            let resource = ResourceDescriptor::at_institution(id(inst));
            assert!(engine.decide(&principal, &roles, &resource, Action::Modify).is_allowed());
        }
        let outside = ResourceDescriptor::at_institution(id(999));
        assert!(!engine.decide(&principal, &roles, &outside, Action::View).is_allowed());
    }

    #[test]
    fn sector_role_sees_its_schools_but_not_siblings() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(2);
        let roles = [role("sektoradmin", 3)];

        assert!(engine
            .decide(&principal, &roles, &ResourceDescriptor::at_institution(id(5)), Action::View)
            .is_allowed());
        assert!(!engine
            .decide(&principal, &roles, &ResourceDescriptor::at_institution(id(1)), Action::View)
            .is_allowed());
    }

    #[test]
    fn superadmin_bypasses_everything() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(5);
        let roles = [role("superadmin", 1)];
        let resource = ResourceDescriptor::at_institution(id(999));
        assert_eq!(engine.decide(&principal, &roles, &resource, Action::Delete), Decision::Allow);
    }

    #[test]
    fn teacher_passes_visibility_but_not_modify() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(5);
        let roles = [role("müəllim", 5)];
        let resource = ResourceDescriptor::at_institution(id(5));

        assert!(engine.decide(&principal, &roles, &resource, Action::View).is_allowed());
        assert!(engine.decide(&principal, &roles, &resource, Action::Download).is_allowed());
        assert!(!engine.decide(&principal, &roles, &resource, Action::Modify).is_allowed());
        assert!(!engine.decide(&principal, &roles, &resource, Action::Delete).is_allowed());
        assert!(!engine.decide(&principal, &roles, &resource, Action::Share).is_allowed());
    }

    #[test]
    fn allow_lists_admit_users_roles_and_institutions() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(5);
        let roles = [role("muavin", 5)];

        let by_user = ResourceDescriptor {
            institution_id: Some(id(6)),
            allowed_users: Set::from([principal.id]),
            ..Default::default()
        };
        assert!(engine.decide(&principal, &roles, &by_user, Action::View).is_allowed());

        let by_role = ResourceDescriptor {
            institution_id: Some(id(6)),
            allowed_roles: Set::from([RoleName::new("muavin")]),
            ..Default::default()
        };
        assert!(engine.decide(&principal, &roles, &by_role, Action::View).is_allowed());

        let by_institution = ResourceDescriptor {
            institution_id: Some(id(6)),
            allowed_institutions: Set::from([id(5)]),
            ..Default::default()
        };
        assert!(engine.decide(&principal, &roles, &by_institution, Action::View).is_allowed());

        let unrelated = ResourceDescriptor::at_institution(id(6));
        assert!(!engine.decide(&principal, &roles, &unrelated, Action::View).is_allowed());
    }

    #[test]
    fn public_resources_are_viewable_but_still_masked() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let principal = principal_at(5);
        let roles = [role("müəllim", 5)];
        let resource = ResourceDescriptor {
            is_public: true,
            ..Default::default()
        };
        assert!(engine.decide(&principal, &roles, &resource, Action::View).is_allowed());
        assert!(!engine.decide(&principal, &roles, &resource, Action::Delete).is_allowed());
    }

    #[test]
    fn inactive_principal_and_inactive_roles_are_denied() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let mut principal = principal_at(5);
        let resource = ResourceDescriptor::at_institution(id(5));

        let mut dormant = role("schooladmin", 4);
        dormant.active = false;
        assert!(!engine.decide(&principal, &[dormant], &resource, Action::View).is_allowed());

        principal.active = false;
        let roles = [role("superadmin", 1)];
        assert!(!engine.decide(&principal, &roles, &resource, Action::View).is_allowed());
    }

    #[test]
    fn legacy_alias_field_deserializes_into_allowed_institutions() {
        let resource: ResourceDescriptor =
            serde_json::from_str(r#"{"accessible_institutions": [5, 6]}"#).unwrap();
        assert_eq!(resource.allowed_institutions, Set::from([id(5), id(6)]));
    }

    #[test]
    fn scope_and_level_summaries_follow_the_strongest_role() {
        let tree = tree();
        let engine = AccessDecisionEngine::new(HierarchyResolver::new(&tree));
        let admin = principal_at(1);

        let roles = [role("regionadmin", 2)];
        assert_eq!(
            engine.institution_scope(&admin, &roles),
            InstitutionScope::Subtree { root: id(1) }
        );
        assert_eq!(
            engine.accessible_institutions(&admin, &roles),
            Some(Set::from([id(1), id(2), id(5), id(6)]))
        );
        assert_eq!(engine.access_level(&roles), AccessLevel::Region);

        let root = [role("superadmin", 1)];
        assert_eq!(engine.institution_scope(&admin, &root), InstitutionScope::All);
        assert_eq!(engine.accessible_institutions(&admin, &root), None);
        assert_eq!(engine.access_level(&root), AccessLevel::System);

        let staff = [role("müəllim", 5), role("ubr", 5)];
        let school = principal_at(5);
        assert_eq!(
            engine.institution_scope(&school, &staff),
            InstitutionScope::Own { institution: id(5) }
        );
        assert_eq!(engine.access_level(&staff), AccessLevel::Staff);
    }
}
