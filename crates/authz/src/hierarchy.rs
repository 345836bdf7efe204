//! Institution tree traversal: ancestors, descendants, containment.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use maarif_core::InstitutionId;

/// Traversal stops past this depth even if the visited-set guard has not
/// fired; the observed tree is 4 levels deep.
const MAX_DEPTH: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Institution Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// One institution from the reference-data snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionNode {
    pub id: InstitutionId,
    /// Root institutions have no parent.
    #[serde(default)]
    pub parent_id: Option<InstitutionId>,
    /// 1 = top of a region tree, increasing downward (leaf school = 4).
    pub level: u8,
    /// Region this institution belongs to, when the snapshot carries it.
    #[serde(default)]
    pub region_id: Option<InstitutionId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Immutable snapshot of the institution forest, indexed for traversal.
///
/// Built once from reference data; the resolver never mutates it.
#[derive(Debug, Clone, Default)]
pub struct InstitutionTree {
    nodes: HashMap<InstitutionId, InstitutionNode>,
    children: HashMap<InstitutionId, Vec<InstitutionId>>,
}

impl InstitutionTree {
    pub fn from_nodes(nodes: impl IntoIterator<Item = InstitutionNode>) -> Self {
        let mut tree = Self::default();
        for node in nodes {
            if let Some(parent) = node.parent_id {
                tree.children.entry(parent).or_default().push(node.id);
            }
            tree.nodes.insert(node.id, node);
        }
        tree
    }

    pub fn get(&self, id: InstitutionId) -> Option<&InstitutionNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: InstitutionId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn children_of(&self, id: InstitutionId) -> &[InstitutionId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hierarchy Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Pure tree-traversal utility over an institution snapshot.
///
/// Stateless and side-effect-free apart from warn-level logs on malformed
/// data. Descendant queries are the hot path for regional/sector scoping;
/// callers that need them repeatedly may cache the returned sets.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyResolver<'a> {
    tree: &'a InstitutionTree,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(tree: &'a InstitutionTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &'a InstitutionTree {
        self.tree
    }

    /// Ancestors of `id`, root-first. `id` itself is not included.
    ///
    /// A parent cycle is a data-integrity fault: the offending node is
    /// excluded, the walk stops, and the partial chain collected so far is
    /// returned.
    pub fn ancestors(&self, id: InstitutionId) -> Vec<InstitutionId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);

        let mut current = self.tree.get(id).and_then(|n| n.parent_id);
        while let Some(ancestor) = current {
            if !visited.insert(ancestor) {
                warn!(
                    institution = %ancestor,
                    "cycle detected in institution tree while resolving ancestors; node excluded"
                );
                break;
            }
            if chain.len() >= MAX_DEPTH {
                warn!(
                    institution = %ancestor,
                    depth = chain.len(),
                    "institution tree deeper than bound; truncating ancestor chain"
                );
                break;
            }
            chain.push(ancestor);
            current = self.tree.get(ancestor).and_then(|n| n.parent_id);
        }

        chain.reverse();
        chain
    }

    /// All descendants of `id` (not including `id`), unordered.
    ///
    /// Cycle-safe: a node reached twice is skipped and reported as an
    /// integrity fault.
    pub fn descendants(&self, id: InstitutionId) -> BTreeSet<InstitutionId> {
        let mut result = BTreeSet::new();
        let mut visited = HashSet::from([id]);
        let mut stack: Vec<(InstitutionId, usize)> = self
            .tree
            .children_of(id)
            .iter()
            .map(|&c| (c, 1))
            .collect();

        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(node) {
                warn!(
                    institution = %node,
                    "cycle detected in institution tree while collecting descendants; node excluded"
                );
                continue;
            }
            result.insert(node);
            if depth >= MAX_DEPTH {
                warn!(institution = %node, depth, "institution tree deeper than bound; truncating");
                continue;
            }
            for &child in self.tree.children_of(node) {
                stack.push((child, depth + 1));
            }
        }

        result
    }

    /// Whether `candidate` equals `root` or lies somewhere beneath it.
    pub fn is_within(&self, candidate: InstitutionId, root: InstitutionId) -> bool {
        if candidate == root {
            return true;
        }
        // Walk up from the candidate; cheaper than materializing descendants.
        let mut visited = HashSet::from([candidate]);
        let mut current = self.tree.get(candidate).and_then(|n| n.parent_id);
        let mut depth = 0;
        while let Some(parent) = current {
            if parent == root {
                return true;
            }
            if !visited.insert(parent) {
                warn!(
                    institution = %parent,
                    "cycle detected in institution tree during containment check; treating as outside"
                );
                return false;
            }
            if depth >= MAX_DEPTH {
                warn!(
                    institution = %parent,
                    depth,
                    "institution tree deeper than bound during containment check; treating as outside"
                );
                return false;
            }
            depth += 1;
            current = self.tree.get(parent).and_then(|n| n.parent_id);
        }
        false
    }
}
