//! Role model: names, levels, department access, category classification.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use maarif_core::RoleId;

use crate::permission::PermissionName;

// ─────────────────────────────────────────────────────────────────────────────
// Role Name
// ─────────────────────────────────────────────────────────────────────────────

/// Role identifier string.
///
/// Role names are opaque at this layer; the engine never branches on raw
/// name strings — it classifies roles into [`RoleCategory`] once and
/// switches on the tagged variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// A role as supplied by the administrative collaborator.
///
/// # Invariants
/// - `level` 1 is the most privileged; larger is lower.
/// - The engine reads roles, it never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub level: u8,
    /// Department tags this role may access (empty = none).
    #[serde(default)]
    pub department_access: BTreeSet<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Permissions granted through this role.
    #[serde(default)]
    pub permissions: BTreeSet<PermissionName>,
}

fn default_active() -> bool {
    true
}

impl Role {
    pub fn category(&self) -> RoleCategory {
        RoleCategory::classify(self.name.as_str(), self.level)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role Category
// ─────────────────────────────────────────────────────────────────────────────

/// Role classification used by the decision engine.
///
/// Resolved once per principal from the role name (with the original
/// Azerbaijani spellings as aliases) and the role level, then matched on
/// explicitly — never on raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    /// Unconditional allow; level 1.
    SuperAdmin,
    /// Regional administrator; sees the whole region subtree.
    RegionAdmin,
    /// Regional operator; regional visibility, limited write capability.
    RegionOperator,
    /// Sector administrator; sees the sector and its schools.
    SectorAdmin,
    /// School administrator; own institution only.
    SchoolAdmin,
    /// Deputy head (muavin).
    Deputy,
    /// Events coordinator (ubr).
    EventCoordinator,
    /// Facilities manager (tesarrufat).
    FacilitiesManager,
    /// School psychologist (psixoloq).
    Psychologist,
    /// Teacher (müəllim).
    Teacher,
    /// No recognized category; most restrictive treatment.
    Unclassified,
}

impl RoleCategory {
    /// Classify a role by name, falling back to level for unknown names.
    pub fn classify(name: &str, level: u8) -> Self {
        match name {
            "superadmin" => Self::SuperAdmin,
            "regionadmin" => Self::RegionAdmin,
            "regionoperator" => Self::RegionOperator,
            "sektoradmin" | "sectoradmin" => Self::SectorAdmin,
            "schooladmin" | "məktəbadmin" => Self::SchoolAdmin,
            "muavin" => Self::Deputy,
            "ubr" => Self::EventCoordinator,
            "tesarrufat" => Self::FacilitiesManager,
            "psixoloq" => Self::Psychologist,
            "müəllim" | "teacher" => Self::Teacher,
            _ => match level {
                1 => Self::SuperAdmin,
                _ => Self::Unclassified,
            },
        }
    }

    /// Categories a principal holding this category may grant to others.
    ///
    /// Explicit hierarchy map; reliable even when level data is missing on
    /// the role record.
    pub fn assignable_categories(self) -> &'static [RoleCategory] {
        const FRONT_LINE: &[RoleCategory] = &[
            RoleCategory::Deputy,
            RoleCategory::EventCoordinator,
            RoleCategory::FacilitiesManager,
            RoleCategory::Psychologist,
            RoleCategory::Teacher,
        ];
        match self {
            Self::SuperAdmin => &[
                Self::RegionAdmin,
                Self::RegionOperator,
                Self::SectorAdmin,
                Self::SchoolAdmin,
                Self::Deputy,
                Self::EventCoordinator,
                Self::FacilitiesManager,
                Self::Psychologist,
                Self::Teacher,
            ],
            Self::RegionAdmin => &[
                Self::RegionOperator,
                Self::SectorAdmin,
                Self::SchoolAdmin,
                Self::Deputy,
                Self::EventCoordinator,
                Self::FacilitiesManager,
                Self::Psychologist,
                Self::Teacher,
            ],
            Self::SectorAdmin => &[
                Self::SchoolAdmin,
                Self::Deputy,
                Self::EventCoordinator,
                Self::FacilitiesManager,
                Self::Psychologist,
                Self::Teacher,
            ],
            Self::SchoolAdmin => FRONT_LINE,
            _ => &[],
        }
    }

    /// Whether this category may assign the given category to another
    /// principal.
    pub fn can_assign(self, target: RoleCategory) -> bool {
        self.assignable_categories().contains(&target)
    }
}
