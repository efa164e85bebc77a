//! Deferred deletion bookkeeping
//!
//! Overwriting a node speculatively marks its children for deletion. Any of
//! them that the package supplies later is rescinded, and what is left when
//! the run ends is pruned by the finisher.

use cpkg_store::{Node, TreeStore};
use cpkg_types::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, warn};

/// Identity of a node across databases
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub database: String,
    pub id: ItemId,
}

impl NodeKey {
    #[must_use]
    pub fn new(database: impl Into<String>, id: ItemId) -> Self {
        Self {
            database: database.into(),
            id,
        }
    }

    #[must_use]
    pub fn of(node: &Node) -> Self {
        Self::new(node.database.clone(), node.id)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.database, self.id)
    }
}

/// Outcome of draining a ledger against a store
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub deleted: Vec<NodeKey>,
    /// Keys whose database or node no longer existed
    pub missing: Vec<NodeKey>,
    pub failed: Vec<(NodeKey, String)>,
}

/// Ordered set of nodes marked for deletion, plus the keys rescinded from it
///
/// The two sets are disjoint: a rescinded key can never be enqueued again
/// within the same run.
#[derive(Debug, Default, Clone)]
pub struct DeletionLedger {
    pending: Vec<NodeKey>,
    rescinded: HashSet<NodeKey>,
}

impl DeletionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node for deletion; returns `false` if it was already pending or
    /// has been rescinded
    pub fn enqueue(&mut self, key: NodeKey) -> bool {
        if self.rescinded.contains(&key) || self.pending.contains(&key) {
            return false;
        }
        self.pending.push(key);
        true
    }

    /// Protect a node from deletion for the rest of the run
    pub fn rescind(&mut self, key: NodeKey) {
        self.pending.retain(|pending| *pending != key);
        self.rescinded.insert(key);
    }

    #[must_use]
    pub fn is_pending(&self, key: &NodeKey) -> bool {
        self.pending.contains(key)
    }

    #[must_use]
    pub fn is_rescinded(&self, key: &NodeKey) -> bool {
        self.rescinded.contains(key)
    }

    /// Keys still marked, in enqueue order
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.pending.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Delete every remaining key that still exists
    ///
    /// Failures are logged and reported, never propagated. The ledger is
    /// empty afterwards.
    pub fn drain<S: TreeStore + ?Sized>(&mut self, store: &S) -> DrainReport {
        let mut report = DrainReport::default();
        for key in std::mem::take(&mut self.pending) {
            if !store.has_database(&key.database) {
                error!(key = %key, "database not found, node not deleted");
                report.missing.push(key);
                continue;
            }
            match store.delete(&key.database, key.id) {
                Ok(true) => {
                    debug!(key = %key, "deleted node absent from package");
                    report.deleted.push(key);
                }
                Ok(false) => {
                    warn!(key = %key, "node scheduled for deletion no longer exists");
                    report.missing.push(key);
                }
                Err(e) => {
                    error!(key = %key, error = %e, "failed to delete node");
                    report.failed.push((key, e.to_string()));
                }
            }
        }
        report
    }
}
