//! Principal: the acting entity whose effective permissions are evaluated.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use maarif_core::{InstitutionId, RoleId, UserId};

use crate::permission::PermissionName;

/// A principal's membership and grants, as supplied by reference data.
///
/// This is an authorization boundary object: it states *where* the principal
/// sits in the institution tree and which roles/direct grants it holds. The
/// engine reads it, it never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub institution_id: InstitutionId,
    /// Assigned roles (ids into reference data).
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Permissions granted directly, outside any role.
    #[serde(default)]
    pub direct_grants: BTreeSet<PermissionName>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Principal {
    pub fn new(id: UserId, institution_id: InstitutionId) -> Self {
        Self {
            id,
            institution_id,
            roles: Vec::new(),
            direct_grants: BTreeSet::new(),
            active: true,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_direct_grants(
        mut self,
        grants: impl IntoIterator<Item = PermissionName>,
    ) -> Self {
        self.direct_grants = grants.into_iter().collect();
        self
    }
}
