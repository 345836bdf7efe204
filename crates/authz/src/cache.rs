//! Memoized per-user and per-role permission sets with cascading
//! invalidation.
//!
//! The store is the only shared mutable state in the engine. Entries are
//! replaced atomically as whole sets, never patched, so concurrent readers
//! see either the pre- or post-mutation set but never a mix. Explicit
//! invalidation is mandatory on every mutation path; the TTL is a bounded
//! fallback against missed invalidations, not a correctness mechanism.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use maarif_core::{DomainResult, RoleId, UserId};

use crate::permission::PermissionName;
use crate::principal::Principal;
use crate::registry::PermissionRegistry;
use crate::role::Role;
use crate::validator::PermissionValidator;

/// Safety-net entry lifetime. Correctness never depends on expiry.
const DEFAULT_TTL_SECS: i64 = 3600;

// ─────────────────────────────────────────────────────────────────────────────
// Keys and Entries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    User(UserId),
    Role(RoleId),
}

impl core::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Role(id) => write!(f, "role:{id}"),
        }
    }
}

/// A memoized permission set with its computation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub permissions: BTreeSet<PermissionName>,
    pub computed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(permissions: BTreeSet<PermissionName>) -> Self {
        Self {
            permissions,
            computed_at: Utc::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.computed_at) < ttl
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Store
// ─────────────────────────────────────────────────────────────────────────────

/// Key-value backend for memoized permission sets.
///
/// Injected into the cache so invalidation ordering is explicit and backends
/// (in-memory, distributed) are swappable without touching decision logic.
pub trait PermissionStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;
    /// Replaces the whole entry atomically.
    fn put(&self, key: CacheKey, entry: CacheEntry);
    fn remove(&self, key: &CacheKey);
    fn clear(&self);
}

/// Process-local store backed by a `RwLock`ed map.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(poisoned) => {
                warn!(%key, "permission store lock poisoned on read");
                poisoned.into_inner().get(key).cloned()
            }
        }
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key, entry);
            }
            Err(poisoned) => {
                warn!(%key, "permission store lock poisoned on write");
                poisoned.into_inner().insert(key, entry);
            }
        }
    }

    fn remove(&self, key: &CacheKey) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.remove(key);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(key);
            }
        }
    }

    fn clear(&self) {
        match self.entries.write() {
            Ok(mut entries) => entries.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl<S: PermissionStore> PermissionStore for Arc<S> {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        (**self).put(key, entry)
    }

    fn remove(&self, key: &CacheKey) {
        (**self).remove(key)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Access Data Source
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only reference data supplied by the surrounding application.
///
/// Lookups are expected to be fast and bounded; a failing or timed-out read
/// surfaces as an error and the caller treats it as deny.
pub trait AccessDataSource: Send + Sync {
    fn principal(&self, id: UserId) -> DomainResult<Principal>;
    fn role(&self, id: RoleId) -> DomainResult<Role>;
    /// Users currently holding the role; drives cascade invalidation.
    fn users_with_role(&self, id: RoleId) -> DomainResult<Vec<UserId>>;
    /// Roles carrying the permission; drives two-level cascade invalidation.
    fn roles_with_permission(&self, name: &PermissionName) -> DomainResult<Vec<RoleId>>;
}

impl<D: AccessDataSource> AccessDataSource for Arc<D> {
    fn principal(&self, id: UserId) -> DomainResult<Principal> {
        (**self).principal(id)
    }

    fn role(&self, id: RoleId) -> DomainResult<Role> {
        (**self).role(id)
    }

    fn users_with_role(&self, id: RoleId) -> DomainResult<Vec<UserId>> {
        (**self).users_with_role(id)
    }

    fn roles_with_permission(&self, name: &PermissionName) -> DomainResult<Vec<RoleId>> {
        (**self).roles_with_permission(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Memoizing layer between reference data and the decision engine.
///
/// All boolean permission queries go through [`get_user_permissions`], so
/// there is exactly one computation path to diverge from.
///
/// [`get_user_permissions`]: PermissionCache::get_user_permissions
pub struct PermissionCache<S, D> {
    store: S,
    source: D,
    registry: Arc<PermissionRegistry>,
    ttl: Duration,
}

impl<S: PermissionStore, D: AccessDataSource> PermissionCache<S, D> {
    pub fn new(store: S, source: D, registry: Arc<PermissionRegistry>) -> Self {
        Self {
            store,
            source,
            registry,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// Effective permission set for a user: union of direct grants and the
    /// permissions of all active assigned roles, closed under the
    /// dependency graph. Memoized per user.
    pub fn get_user_permissions(&self, user: UserId) -> DomainResult<BTreeSet<PermissionName>> {
        let key = CacheKey::User(user);
        let now = Utc::now();
        if let Some(entry) = self.store.get(&key) {
            if entry.is_fresh(self.ttl, now) {
                return Ok(entry.permissions);
            }
        }

        let permissions = self.compute_user_permissions(user)?;
        self.store.put(key, CacheEntry::new(permissions.clone()));
        debug!(%user, count = permissions.len(), "user permission set computed");
        Ok(permissions)
    }

    /// Enriched permission set granted through a role. Memoized per role.
    pub fn get_role_permissions(&self, role: RoleId) -> DomainResult<BTreeSet<PermissionName>> {
        let key = CacheKey::Role(role);
        let now = Utc::now();
        if let Some(entry) = self.store.get(&key) {
            if entry.is_fresh(self.ttl, now) {
                return Ok(entry.permissions);
            }
        }

        let permissions = self.compute_role_permissions(role)?;
        self.store.put(key, CacheEntry::new(permissions.clone()));
        Ok(permissions)
    }

    /// Whether the user holds the permission. Fails closed: a reference-data
    /// error reports as not-held.
    pub fn user_has_permission(&self, user: UserId, permission: &PermissionName) -> bool {
        match self.get_user_permissions(user) {
            Ok(permissions) => permissions.contains(permission),
            Err(error) => {
                warn!(%user, %permission, %error, "permission lookup failed; treating as not held");
                false
            }
        }
    }

    pub fn user_has_any_of(&self, user: UserId, permissions: &[PermissionName]) -> bool {
        match self.get_user_permissions(user) {
            Ok(held) => permissions.iter().any(|p| held.contains(p)),
            Err(error) => {
                warn!(%user, %error, "permission lookup failed; treating as not held");
                false
            }
        }
    }

    pub fn user_has_all_of(&self, user: UserId, permissions: &[PermissionName]) -> bool {
        match self.get_user_permissions(user) {
            Ok(held) => permissions.iter().all(|p| held.contains(p)),
            Err(error) => {
                warn!(%user, %error, "permission lookup failed; treating as not held");
                false
            }
        }
    }

    // ── invalidation ─────────────────────────────────────────────────────

    pub fn invalidate_user(&self, user: UserId) {
        self.store.remove(&CacheKey::User(user));
        debug!(%user, "user permission cache invalidated");
    }

    /// Invalidates the role entry and cascades to every user currently
    /// holding the role.
    pub fn invalidate_role(&self, role: RoleId) -> DomainResult<()> {
        self.store.remove(&CacheKey::Role(role));
        let users = self.source.users_with_role(role)?;
        for user in &users {
            self.store.remove(&CacheKey::User(*user));
        }
        debug!(%role, users = users.len(), "role permission cache invalidated");
        Ok(())
    }

    /// Two-level cascade: every role carrying the permission, then every
    /// user reachable through those roles.
    pub fn invalidate_permission(&self, permission: &PermissionName) -> DomainResult<()> {
        let roles = self.source.roles_with_permission(permission)?;
        for role in &roles {
            self.invalidate_role(*role)?;
        }
        debug!(%permission, roles = roles.len(), "permission cache invalidated");
        Ok(())
    }

    pub fn invalidate_all(&self) {
        self.store.clear();
    }

    // ── warmup ───────────────────────────────────────────────────────────

    /// Proactively compute entries for the given users. Idempotent and safe
    /// to run concurrently with reads; failures are logged per user and do
    /// not abort the pass.
    pub fn warmup_users(&self, users: impl IntoIterator<Item = UserId>) {
        for user in users {
            if let Err(error) = self.get_user_permissions(user) {
                warn!(%user, %error, "user cache warmup skipped entry");
            }
        }
    }

    pub fn warmup_roles(&self, roles: impl IntoIterator<Item = RoleId>) {
        for role in roles {
            if let Err(error) = self.get_role_permissions(role) {
                warn!(%role, %error, "role cache warmup skipped entry");
            }
        }
    }

    // ── computation ──────────────────────────────────────────────────────

    fn compute_user_permissions(&self, user: UserId) -> DomainResult<BTreeSet<PermissionName>> {
        let principal = self.source.principal(user)?;
        if !principal.active {
            return Ok(BTreeSet::new());
        }

        let mut union: BTreeSet<PermissionName> = principal.direct_grants.clone();
        for role_id in &principal.roles {
            let role = self.source.role(*role_id)?;
            if role.active {
                union.extend(role.permissions.iter().cloned());
            }
        }

        let validator = PermissionValidator::new(&self.registry);
        Ok(validator.validate_and_enrich(union))
    }

    fn compute_role_permissions(&self, role_id: RoleId) -> DomainResult<BTreeSet<PermissionName>> {
        let role = self.source.role(role_id)?;
        if !role.active {
            return Ok(BTreeSet::new());
        }
        let validator = PermissionValidator::new(&self.registry);
        Ok(validator.validate_and_enrich(role.permissions.iter().cloned()))
    }
}
