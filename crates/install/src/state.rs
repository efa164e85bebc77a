//! Per-run tracking state

use crate::ledger::{DeletionLedger, NodeKey};
use crate::policy::DecisionCache;
use cpkg_types::{ItemDescriptor, ItemId, VersionInstallMode};
use std::collections::{HashMap, HashSet};

/// The item whose decision is reused by following entries of the same node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentItem {
    pub key: NodeKey,
    pub mode: VersionInstallMode,
}

/// Everything one installation run tracks
///
/// Owned by the engine, created fresh for every run and dropped on every
/// exit path.
#[derive(Debug, Default)]
pub struct RunState {
    pending: HashMap<String, HashSet<ItemId>>,
    installed: HashMap<String, HashSet<ItemId>>,
    placeholders: HashSet<NodeKey>,
    descriptors: HashMap<String, ItemDescriptor>,
    current: Option<CurrentItem>,
    pub ledger: DeletionLedger,
    pub decisions: DecisionCache,
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_pending(&mut self, database: &str, id: ItemId) {
        self.pending
            .entry(database.to_string())
            .or_default()
            .insert(id);
    }

    pub fn remove_pending(&mut self, database: &str, id: ItemId) {
        if let Some(ids) = self.pending.get_mut(database) {
            ids.remove(&id);
        }
    }

    #[must_use]
    pub fn is_pending(&self, database: &str, id: ItemId) -> bool {
        self.pending
            .get(database)
            .is_some_and(|ids| ids.contains(&id))
    }

    pub fn mark_installed(&mut self, database: &str, id: ItemId) {
        self.installed
            .entry(database.to_string())
            .or_default()
            .insert(id);
    }

    #[must_use]
    pub fn is_installed(&self, database: &str, id: ItemId) -> bool {
        self.installed
            .get(database)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Whether the node is queued or already installed by this run
    #[must_use]
    pub fn belongs_to_package(&self, database: &str, id: ItemId) -> bool {
        self.is_pending(database, id) || self.is_installed(database, id)
    }

    /// Whether the template or one of its bases is still queued
    #[must_use]
    pub fn waits_for_template(&self, database: &str, descriptor: &ItemDescriptor) -> bool {
        self.is_pending(database, descriptor.template_id)
            || descriptor
                .base_template_ids
                .iter()
                .any(|base| self.is_pending(database, *base))
    }

    pub fn mark_placeholder(&mut self, key: NodeKey) {
        self.placeholders.insert(key);
    }

    #[must_use]
    pub fn is_placeholder(&self, key: &NodeKey) -> bool {
        self.placeholders.contains(key)
    }

    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }

    pub fn cache_descriptor(&mut self, entry_key: &str, descriptor: ItemDescriptor) {
        self.descriptors.insert(entry_key.to_string(), descriptor);
    }

    pub fn take_descriptor(&mut self, entry_key: &str) -> Option<ItemDescriptor> {
        self.descriptors.remove(entry_key)
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&CurrentItem> {
        self.current.as_ref()
    }

    pub fn set_current_item(&mut self, key: NodeKey, mode: VersionInstallMode) {
        self.current = Some(CurrentItem { key, mode });
    }

    /// Drop everything tracked so far
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: ItemId = ItemId::from_u128(1);
    const BASE: ItemId = ItemId::from_u128(2);
    const ITEM: ItemId = ItemId::from_u128(3);

    #[test]
    fn pending_sets_are_per_database() {
        let mut state = RunState::new();
        state.mark_pending("master", ITEM);
        assert!(state.is_pending("master", ITEM));
        assert!(!state.is_pending("core", ITEM));
        state.remove_pending("master", ITEM);
        assert!(!state.belongs_to_package("master", ITEM));
        state.mark_installed("master", ITEM);
        assert!(state.belongs_to_package("master", ITEM));
    }

    #[test]
    fn waits_for_pending_base_template() {
        let mut state = RunState::new();
        let mut descriptor = ItemDescriptor::stub(ITEM, "Item", TEMPLATE);
        descriptor.base_template_ids.push(BASE);
        assert!(!state.waits_for_template("master", &descriptor));
        state.mark_pending("master", BASE);
        assert!(state.waits_for_template("master", &descriptor));
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = RunState::new();
        state.mark_pending("master", ITEM);
        state.mark_placeholder(NodeKey::new("master", ITEM));
        state.ledger.enqueue(NodeKey::new("master", TEMPLATE));
        state.set_current_item(NodeKey::new("master", ITEM), VersionInstallMode::Append);
        state.clear();
        assert!(!state.is_pending("master", ITEM));
        assert_eq!(state.placeholder_count(), 0);
        assert!(state.ledger.is_empty());
        assert!(state.current_item().is_none());
    }
}
