//! Permission model: names, scope tiers, definitions.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Permission Name
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical permission identifier.
///
/// Permissions are modeled as opaque dotted strings (e.g. "documents.read").
/// The registry gives them meaning; this type only guarantees cheap cloning
/// and value equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(Cow<'static, str>);

impl PermissionName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PermissionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionName {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for PermissionName {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope Tier
// ─────────────────────────────────────────────────────────────────────────────

/// How broad a permission's reach is, totally ordered from most to least
/// privileged.
///
/// The derived `Ord` follows declaration order, so `Global < System < …`
/// means "more privileged sorts first".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeTier {
    Global,
    System,
    Regional,
    Sector,
    Institution,
    Classroom,
}

impl ScopeTier {
    /// The highest (numerically largest) role level a permission of this
    /// scope may be granted to. Role level 1 is the most privileged.
    ///
    /// This table is the single source of truth for scope/level
    /// compatibility; both the validator and the decision engine consult it.
    pub const fn max_role_level(self) -> u8 {
        match self {
            ScopeTier::Global => 1,
            ScopeTier::System => 2,
            ScopeTier::Regional => 3,
            ScopeTier::Sector => 3,
            ScopeTier::Institution => 4,
            ScopeTier::Classroom => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ScopeTier::Global => "global",
            ScopeTier::System => "system",
            ScopeTier::Regional => "regional",
            ScopeTier::Sector => "sector",
            ScopeTier::Institution => "institution",
            ScopeTier::Classroom => "classroom",
        }
    }
}

impl core::fmt::Display for ScopeTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Definition
// ─────────────────────────────────────────────────────────────────────────────

/// A configured permission: scope, optional department tag, dependency edges.
///
/// Definitions are loaded once into the registry at process start and are
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDef {
    pub name: PermissionName,
    pub scope: ScopeTier,
    /// Department tag the holding role must have access to, if any.
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Permissions implied by holding this one.
    #[serde(default)]
    pub depends_on: Vec<PermissionName>,
}

fn default_active() -> bool {
    true
}
