//! End-to-end tests for the engine facade.
//!
//! Exercises: reference data → cache → decision, administrative mutation →
//! invalidation → recomputation, and the legacy translation path.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use serde_json::{Value, json};

use maarif_core::{DomainError, DomainResult, InstitutionId, RoleId, UserId};

use crate::cache::{AccessDataSource, InMemoryPermissionStore};
use crate::decision::{Action, Decision, ResourceDescriptor};
use crate::engine::{AuthorizationEngine, InvalidationTarget};
use crate::hierarchy::{InstitutionNode, InstitutionTree};
use crate::legacy::{self, LegacyPermissionSet};
use crate::permission::PermissionName;
use crate::principal::Principal;
use crate::registry::PermissionRegistry;
use crate::role::{Role, RoleName};
use crate::validator::PermissionValidator;

fn name(s: &'static str) -> PermissionName {
    PermissionName::from(s)
}

fn inst(n: i64) -> InstitutionId {
    InstitutionId::new(n)
}

#[derive(Default)]
struct FixtureSource {
    principals: Mutex<BTreeMap<UserId, Principal>>,
    roles: Mutex<BTreeMap<RoleId, Role>>,
}

impl FixtureSource {
    fn add_principal(&self, principal: Principal) {
        self.principals.lock().unwrap().insert(principal.id, principal);
    }

    fn add_role(&self, role: Role) {
        self.roles.lock().unwrap().insert(role.id, role);
    }

    fn update_role(&self, id: RoleId, f: impl FnOnce(&mut Role)) {
        let mut roles = self.roles.lock().unwrap();
        f(roles.get_mut(&id).unwrap());
    }
}

impl AccessDataSource for FixtureSource {
    fn principal(&self, id: UserId) -> DomainResult<Principal> {
        self.principals
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("user", id.to_string()))
    }

    fn role(&self, id: RoleId) -> DomainResult<Role> {
        self.roles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("role", id.to_string()))
    }

    fn users_with_role(&self, id: RoleId) -> DomainResult<Vec<UserId>> {
        Ok(self
            .principals
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.roles.contains(&id))
            .map(|p| p.id)
            .collect())
    }

    fn roles_with_permission(&self, permission: &PermissionName) -> DomainResult<Vec<RoleId>> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.permissions.contains(permission))
            .map(|r| r.id)
            .collect())
    }
}

/// Region 1 → sector 2 → schools 5, 6.
fn tree() -> InstitutionTree {
    let node = |n: i64, parent: Option<i64>, level: u8| InstitutionNode {
        id: inst(n),
        parent_id: parent.map(inst),
        level,
        region_id: None,
        is_active: true,
    };
    InstitutionTree::from_nodes([
        node(1, None, 2),
        node(2, Some(1), 3),
        node(5, Some(2), 4),
        node(6, Some(2), 4),
    ])
}

fn role(n: &'static str, level: u8, permissions: &[&'static str]) -> Role {
    Role {
        id: RoleId::new(),
        name: RoleName::new(n),
        level,
        department_access: BTreeSet::new(),
        active: true,
        permissions: permissions.iter().copied().map(PermissionName::from).collect(),
    }
}

fn engine(source: Arc<FixtureSource>) -> AuthorizationEngine<Arc<InMemoryPermissionStore>, Arc<FixtureSource>> {
    maarif_observability::init_for_tests();
    AuthorizationEngine::new(
        Arc::new(InMemoryPermissionStore::new()),
        source,
        PermissionRegistry::builtin(),
        tree(),
    )
    .unwrap()
}

#[test]
fn regionadmin_decisions_follow_the_subtree() {
    let source = Arc::new(FixtureSource::default());
    let admin_role = role("regionadmin", 2, &["surveys.publish"]);
    let admin_role_id = admin_role.id;
    source.add_role(admin_role);

    let admin = Principal::new(UserId::new(), inst(1)).with_roles([admin_role_id]);
    let admin_id = admin.id;
    source.add_principal(admin);

    let engine = engine(source);
    assert!(engine
        .decide(admin_id, &ResourceDescriptor::at_institution(inst(5)), Action::Modify)
        .is_allowed());
    assert!(!engine
        .decide(admin_id, &ResourceDescriptor::at_institution(inst(999)), Action::View)
        .is_allowed());
}

#[test]
fn unknown_principal_is_denied_not_errored() {
    let engine = engine(Arc::new(FixtureSource::default()));
    let decision = engine.decide(UserId::new(), &ResourceDescriptor::default(), Action::View);
    assert!(matches!(decision, Decision::Deny { .. }));
}

#[test]
fn effective_permissions_are_closed_under_dependencies() {
    let source = Arc::new(FixtureSource::default());
    let staff_role = role("müəllim", 5, &["surveys.publish"]);
    let staff_role_id = staff_role.id;
    source.add_role(staff_role);

    let staff = Principal::new(UserId::new(), inst(5)).with_roles([staff_role_id]);
    let staff_id = staff.id;
    source.add_principal(staff);

    let engine = engine(source);
    let permissions = engine.effective_permissions(staff_id).unwrap();
    assert!(permissions.contains(&name("surveys.publish")));
    assert!(permissions.contains(&name("surveys.update")));
    assert!(permissions.contains(&name("surveys.read")));
}

#[test]
fn mutation_then_invalidation_is_visible_to_the_next_read() {
    let source = Arc::new(FixtureSource::default());
    let staff_role = role("müəllim", 5, &["documents.read"]);
    let staff_role_id = staff_role.id;
    source.add_role(staff_role);

    let staff = Principal::new(UserId::new(), inst(5)).with_roles([staff_role_id]);
    let staff_id = staff.id;
    source.add_principal(staff);

    let engine = engine(source.clone());
    assert!(engine.effective_permissions(staff_id).unwrap().contains(&name("documents.read")));

    source.update_role(staff_role_id, |r| {
        r.permissions = BTreeSet::from([name("links.read")]);
    });
    engine
        .invalidate(InvalidationTarget::Role { id: staff_role_id })
        .unwrap();

    let recomputed = engine.effective_permissions(staff_id).unwrap();
    assert!(!recomputed.contains(&name("documents.read")));
    assert!(recomputed.contains(&name("links.read")));
}

#[test]
fn overlapping_invalidations_commute() {
    let source = Arc::new(FixtureSource::default());
    let shared_role = role("müəllim", 5, &["tasks.read"]);
    let shared_role_id = shared_role.id;
    source.add_role(shared_role);

    let a = Principal::new(UserId::new(), inst(5)).with_roles([shared_role_id]);
    let b = Principal::new(UserId::new(), inst(6)).with_roles([shared_role_id]);
    let (a_id, b_id) = (a.id, b.id);
    source.add_principal(a);
    source.add_principal(b);

    let engine = engine(source.clone());
    engine.effective_permissions(a_id).unwrap();
    engine.effective_permissions(b_id).unwrap();

    source.update_role(shared_role_id, |r| r.permissions.clear());

    // Direct user invalidation overlapping the role cascade, in either
    // order, leaves the union fully invalidated.
    engine.invalidate(InvalidationTarget::User { id: a_id }).unwrap();
    engine
        .invalidate(InvalidationTarget::Role { id: shared_role_id })
        .unwrap();

    assert!(engine.effective_permissions(a_id).unwrap().is_empty());
    assert!(engine.effective_permissions(b_id).unwrap().is_empty());
}

#[test]
fn validate_assignment_reports_verdict_and_risks_together() {
    let source = Arc::new(FixtureSource::default());
    let regionadmin = role("regionadmin", 2, &[]);
    let regionadmin_id = regionadmin.id;
    source.add_role(regionadmin);
    let sektoradmin = role("sektoradmin", 3, &[]);
    let sektoradmin_id = sektoradmin.id;
    source.add_role(sektoradmin);

    let engine = engine(source);

    // Level 2 holding a system-scope permission: valid, and exactly at the
    // risk boundary, so no finding either.
    let review = engine
        .validate_assignment(regionadmin_id, &name("roles.manage"))
        .unwrap();
    assert!(review.report.valid);
    assert!(review.report.errors.is_empty());
    assert!(review.risks.is_empty());

    // Level 3 holding the same permission: invalid and flagged.
    let review = engine
        .validate_assignment(sektoradmin_id, &name("roles.manage"))
        .unwrap();
    assert!(!review.report.valid);
    assert!(!review.risks.is_empty());

    let missing = engine.validate_assignment(RoleId::new(), &name("roles.manage"));
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));
}

#[test]
fn batch_validation_surfaces_every_problem_in_one_pass() {
    let source = Arc::new(FixtureSource::default());
    let schooladmin = role("schooladmin", 4, &[]);
    let schooladmin_id = schooladmin.id;
    source.add_role(schooladmin);

    let engine = engine(source);
    let batch = engine
        .validate_assignments(
            schooladmin_id,
            &[name("surveys.read"), name("roles.manage"), name("ghost")],
        )
        .unwrap();
    assert!(!batch.valid);
    assert_eq!(batch.checked, 3);
    assert_eq!(batch.failed, 2);
}

#[test]
fn legacy_application_translates_enriches_and_invalidates() {
    let source = Arc::new(FixtureSource::default());
    let staff_role = role("müəllim", 5, &["documents.read"]);
    let staff_role_id = staff_role.id;
    source.add_role(staff_role);
    let staff = Principal::new(UserId::new(), inst(5)).with_roles([staff_role_id]);
    let staff_id = staff.id;
    source.add_principal(staff);

    let engine = engine(source.clone());
    engine.effective_permissions(staff_id).unwrap();

    let raw: Vec<(&str, Value)> = vec![
        ("can_view_documents", json!(true)),
        ("can_publish_surveys", json!("1")),
        ("can_view_folders", json!(0)),
    ];
    let canonical = engine
        .apply_legacy_permission_set(staff_id, raw.iter().map(|(k, v)| (*k, v)))
        .unwrap();
    assert!(canonical.contains(&name("documents.read")));
    assert!(canonical.contains(&name("surveys.publish")));
    // Enrichment pulled in the publish dependencies.
    assert!(canonical.contains(&name("surveys.update")));
    assert!(canonical.contains(&name("surveys.read")));

    // The cache entry was dropped before the call returned: a source
    // mutation made between warm-up and application is visible now.
    source.update_role(staff_role_id, |r| r.permissions.clear());
    assert!(engine.effective_permissions(staff_id).unwrap().is_empty());
}

#[test]
fn legacy_application_rejects_an_all_false_set() {
    let engine = engine(Arc::new(FixtureSource::default()));
    let raw: Vec<(&str, Value)> = vec![
        ("can_view_documents", json!(false)),
        ("can_view_surveys", json!("0")),
    ];
    let err = engine
        .apply_legacy_permission_set(UserId::new(), raw.iter().map(|(k, v)| (*k, v)))
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[test]
fn preview_translates_without_touching_the_cache() {
    let source = Arc::new(FixtureSource::default());
    let staff_role = role("müəllim", 5, &["documents.read"]);
    let staff_role_id = staff_role.id;
    source.add_role(staff_role);
    let staff = Principal::new(UserId::new(), inst(5)).with_roles([staff_role_id]);
    let staff_id = staff.id;
    source.add_principal(staff);

    let engine = engine(source.clone());
    engine.effective_permissions(staff_id).unwrap();

    let raw: Vec<(&str, Value)> = vec![("can_view_tasks", json!(true))];
    let canonical = engine
        .preview_legacy_permission_set(raw.iter().map(|(k, v)| (*k, v)))
        .unwrap();
    assert_eq!(canonical, BTreeSet::from([name("tasks.read")]));

    // Cache untouched: the stale entry still answers.
    source.update_role(staff_role_id, |r| r.permissions.clear());
    assert!(engine.effective_permissions(staff_id).unwrap().contains(&name("documents.read")));
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

fn catalog_names() -> Vec<PermissionName> {
    PermissionRegistry::builtin().iter().map(|d| d.name.clone()).collect()
}

const LEGACY_FIELDS: &[&str] = &[
    "can_view_surveys",
    "can_create_surveys",
    "can_edit_surveys",
    "can_delete_surveys",
    "can_publish_surveys",
    "can_view_tasks",
    "can_create_tasks",
    "can_edit_tasks",
    "can_delete_tasks",
    "can_assign_tasks",
    "can_view_documents",
    "can_upload_documents",
    "can_edit_documents",
    "can_delete_documents",
    "can_share_documents",
    "can_view_folders",
    "can_create_folders",
    "can_edit_folders",
    "can_delete_folders",
    "can_manage_folder_access",
    "can_view_links",
    "can_create_links",
    "can_edit_links",
    "can_delete_links",
    "can_share_links",
];

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: the enriched output of any input subset is a superset of
    /// the input, and every dependency of every member is present.
    #[test]
    fn enrichment_yields_a_dependency_closed_superset(
        indices in prop::collection::vec(0usize..29, 0..10)
    ) {
        let registry = PermissionRegistry::builtin();
        let validator = PermissionValidator::new(&registry);
        let catalog = catalog_names();
        let input: BTreeSet<PermissionName> =
            indices.iter().map(|&i| catalog[i % catalog.len()].clone()).collect();

        let enriched = validator.validate_and_enrich(input.iter().cloned());

        prop_assert!(enriched.is_superset(&input));
        for member in &enriched {
            for dep in registry.dependencies_of(member) {
                prop_assert!(enriched.contains(dep));
            }
        }
    }

    /// Property: translating a legacy set to canonical names, expanding
    /// back to legacy fields, and translating again is a fixed point.
    #[test]
    fn legacy_round_trip_is_stable(
        flags in prop::collection::vec(any::<bool>(), 25)
    ) {
        let set = LegacyPermissionSet::from_fields(
            LEGACY_FIELDS
                .iter()
                .zip(&flags)
                .map(|(field, &on)| ((*field).to_owned(), on)),
        );

        let canonical = legacy::to_canonical(&set);
        let rebuilt = legacy::to_legacy_set(&canonical);
        prop_assert_eq!(legacy::to_canonical(&rebuilt), canonical);
    }
}
