//! Legacy flat-boolean permission model and its canonical translation.
//!
//! Older clients send permission grants as a fixed list of `can_*` boolean
//! fields. This module normalizes that shape (boolean coercion, coarse-flag
//! expansion) and translates it to and from canonical permission names
//! through one static table in each direction. No implicit coercion happens
//! anywhere else.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use maarif_core::{DomainError, DomainResult};

use crate::permission::PermissionName;
use crate::registry::PermissionRegistry;

// ─────────────────────────────────────────────────────────────────────────────
// Mapping Tables
// ─────────────────────────────────────────────────────────────────────────────

/// Legacy field → canonical permission name. One-to-many-safe in reverse:
/// both view fields of documents and folders resolve to `documents.read`.
const FIELD_MAP: &[(&str, &str)] = &[
    ("can_view_surveys", "surveys.read"),
    ("can_create_surveys", "surveys.create"),
    ("can_edit_surveys", "surveys.update"),
    ("can_delete_surveys", "surveys.delete"),
    ("can_publish_surveys", "surveys.publish"),
    ("can_view_tasks", "tasks.read"),
    ("can_create_tasks", "tasks.create"),
    ("can_edit_tasks", "tasks.update"),
    ("can_delete_tasks", "tasks.delete"),
    ("can_assign_tasks", "tasks.assign"),
    ("can_view_documents", "documents.read"),
    ("can_upload_documents", "documents.create"),
    ("can_edit_documents", "documents.update"),
    ("can_delete_documents", "documents.delete"),
    ("can_share_documents", "documents.share"),
    ("can_view_folders", "documents.read"),
    ("can_create_folders", "folders.create"),
    ("can_edit_folders", "folders.update"),
    ("can_delete_folders", "folders.delete"),
    ("can_manage_folder_access", "folders.manage"),
    ("can_view_links", "links.read"),
    ("can_create_links", "links.create"),
    ("can_edit_links", "links.update"),
    ("can_delete_links", "links.delete"),
    ("can_share_links", "links.share"),
];

/// Coarse family flag → the fine-grained fields it switches on.
/// A disabled coarse flag has no effect.
const COARSE_MAP: &[(&str, &[&str])] = &[
    (
        "can_manage_surveys",
        &[
            "can_view_surveys",
            "can_create_surveys",
            "can_edit_surveys",
            "can_delete_surveys",
            "can_publish_surveys",
        ],
    ),
    (
        "can_manage_tasks",
        &[
            "can_view_tasks",
            "can_create_tasks",
            "can_edit_tasks",
            "can_delete_tasks",
            "can_assign_tasks",
        ],
    ),
    (
        "can_manage_documents",
        &[
            "can_view_documents",
            "can_upload_documents",
            "can_edit_documents",
            "can_delete_documents",
            "can_share_documents",
        ],
    ),
    (
        "can_manage_folders",
        &[
            "can_view_folders",
            "can_create_folders",
            "can_edit_folders",
            "can_delete_folders",
            "can_manage_folder_access",
        ],
    ),
    (
        "can_manage_links",
        &[
            "can_view_links",
            "can_create_links",
            "can_edit_links",
            "can_delete_links",
            "can_share_links",
        ],
    ),
];

/// Boolean coercion for loosely-typed legacy payloads.
///
/// Accepts native booleans, numeric 0/1, and the strings "true"/"false"/
/// "1"/"0"/"". Anything else: truthy if non-empty, falsy otherwise.
/// Deterministic for every accepted literal form.
pub fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => true,
            "false" | "0" | "" => false,
            other => !other.is_empty(),
        },
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy Permission Set
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized legacy permission set: fine-grained fields only, coarse flags
/// already expanded, values already coerced to real booleans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyPermissionSet {
    fields: BTreeMap<String, bool>,
}

impl LegacyPermissionSet {
    /// Normalize a raw legacy payload.
    ///
    /// Coerces each value, expands enabled coarse flags into their fine
    /// fields, and keeps unmapped field names as-is (they are ignored at
    /// translation time; completeness is checked by [`validate_mappings`]).
    pub fn from_raw<'a>(raw: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Self {
        let mut fields: BTreeMap<String, bool> = BTreeMap::new();
        let mut expanded: Vec<&str> = Vec::new();

        for (field, value) in raw {
            let enabled = coerce_flag(value);
            if let Some((_, fine)) = COARSE_MAP.iter().find(|(coarse, _)| *coarse == field) {
                if enabled {
                    expanded.extend_from_slice(fine);
                }
                continue;
            }
            // An explicit true wins over an earlier false for the same field.
            let entry = fields.entry(field.to_owned()).or_insert(false);
            *entry = *entry || enabled;
        }

        for field in expanded {
            fields.insert(field.to_owned(), true);
        }

        Self { fields }
    }

    pub fn from_fields(fields: impl IntoIterator<Item = (String, bool)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self, field: &str) -> bool {
        self.fields.get(field).copied().unwrap_or(false)
    }

    pub fn any_enabled(&self) -> bool {
        self.fields.values().any(|&v| v)
    }

    pub fn fields(&self) -> &BTreeMap<String, bool> {
        &self.fields
    }

    /// Fails when the set carries no enabled field. Used on paths where the
    /// legacy set is the required source of an assignment.
    pub fn require_any_enabled(&self) -> DomainResult<()> {
        if self.any_enabled() {
            Ok(())
        } else {
            Err(DomainError::validation(
                "legacy permission set has no enabled field",
            ))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────────────────────────────────────

/// Preset legacy permission bundles offered by administrative UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTemplate {
    /// View-only across every family.
    Viewer,
    /// View, create, and edit.
    Editor,
    /// Everything except publish/assign/share-class actions.
    Manager,
    /// Every field enabled.
    Full,
}

impl PermissionTemplate {
    pub fn to_legacy_set(self) -> LegacyPermissionSet {
        let enabled = |field: &str| match self {
            Self::Viewer => field.starts_with("can_view_"),
            Self::Editor => {
                field.starts_with("can_view_")
                    || field.starts_with("can_create_")
                    || field.starts_with("can_upload_")
                    || field.starts_with("can_edit_")
            }
            Self::Manager => {
                !matches!(
                    field,
                    "can_publish_surveys" | "can_assign_tasks" | "can_share_documents"
                        | "can_share_links" | "can_manage_folder_access"
                )
            }
            Self::Full => true,
        };
        LegacyPermissionSet::from_fields(
            FIELD_MAP
                .iter()
                .map(|(field, _)| ((*field).to_owned(), enabled(field))),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical names for every enabled field. Unmapped fields are ignored.
pub fn to_canonical(set: &LegacyPermissionSet) -> BTreeSet<PermissionName> {
    let mut canonical = BTreeSet::new();
    for (field, target) in FIELD_MAP {
        if set.is_enabled(field) {
            canonical.insert(PermissionName::from(*target));
        }
    }
    canonical
}

/// Legacy fields backing a canonical name, in table order.
///
/// A canonical name may expand to several fields: `documents.read` is backed
/// by both `can_view_documents` and `can_view_folders`.
pub fn to_legacy_fields(name: &PermissionName) -> Vec<&'static str> {
    FIELD_MAP
        .iter()
        .filter(|(_, target)| *target == name.as_str())
        .map(|(field, _)| *field)
        .collect()
}

/// Rebuild a legacy set from canonical names, enabling every backing field.
pub fn to_legacy_set(canonical: &BTreeSet<PermissionName>) -> LegacyPermissionSet {
    LegacyPermissionSet::from_fields(FIELD_MAP.iter().map(|(field, target)| {
        let enabled = canonical.contains(&PermissionName::from(*target));
        ((*field).to_owned(), enabled)
    }))
}

/// Startup completeness check: every canonical target in the mapping table
/// must exist in the registry. Run once at startup, never at request time.
pub fn validate_mappings(registry: &PermissionRegistry) -> DomainResult<()> {
    let mut unknown: Vec<&str> = Vec::new();
    for (_, target) in FIELD_MAP {
        let name = PermissionName::from(*target);
        if !registry.contains(&name) && !unknown.contains(target) {
            unknown.push(*target);
        }
    }
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "legacy mapping targets missing from registry: {}",
            unknown.join(", ")
        )))
    }
}
