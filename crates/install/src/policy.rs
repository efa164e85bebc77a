//! Conflict resolution
//!
//! When an entry targets a node that already exists, the engine needs a
//! [`BehaviourOptions`] decision. It looks at the entry's own hints first,
//! then at decisions remembered for the collision class, and only then asks
//! the injected [`ConflictResolver`].

use cpkg_types::{BehaviourOptions, CollisionClass, ItemDescriptor};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A collision the engine cannot decide on its own
#[derive(Debug, Clone, Copy)]
pub struct Conflict<'a> {
    /// Key of the entry being installed
    pub key: &'a str,
    pub class: CollisionClass,
    pub existing: &'a ItemDescriptor,
    pub incoming: &'a ItemDescriptor,
}

/// Answer of a resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub options: BehaviourOptions,
    /// Reuse this decision for every later collision of the same class
    pub apply_to_all: bool,
}

impl Resolution {
    #[must_use]
    pub const fn once(options: BehaviourOptions) -> Self {
        Self {
            options,
            apply_to_all: false,
        }
    }

    #[must_use]
    pub const fn for_all(options: BehaviourOptions) -> Self {
        Self {
            options,
            apply_to_all: true,
        }
    }
}

/// Source of conflict decisions, interactive or scripted
pub trait ConflictResolver: Send + Sync {
    /// Decide how to install over an existing node
    ///
    /// `None` declines; the engine then aborts the run.
    fn ask(&self, conflict: &Conflict<'_>) -> Option<Resolution>;
}

/// Answers every conflict with the same decision
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver {
    options: BehaviourOptions,
}

impl FixedResolver {
    #[must_use]
    pub const fn new(options: BehaviourOptions) -> Self {
        Self { options }
    }
}

impl ConflictResolver for FixedResolver {
    fn ask(&self, _conflict: &Conflict<'_>) -> Option<Resolution> {
        Some(Resolution::for_all(self.options))
    }
}

/// Replays canned answers in order and records what was asked
///
/// Once the script runs out every further question is declined.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    script: Mutex<VecDeque<Option<Resolution>>>,
    asked: Mutex<Vec<(String, CollisionClass)>>,
}

impl ScriptedResolver {
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Option<Resolution>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Entry keys and collision classes asked about so far
    #[must_use]
    pub fn asked(&self) -> Vec<(String, CollisionClass)> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }
}

impl ConflictResolver for ScriptedResolver {
    fn ask(&self, conflict: &Conflict<'_>) -> Option<Resolution> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push((conflict.key.to_string(), conflict.class));
        }
        self.script.lock().ok()?.pop_front().flatten()
    }
}

/// Decisions remembered per collision class for the rest of a run
#[derive(Debug, Default, Clone)]
pub struct DecisionCache {
    decisions: HashMap<CollisionClass, BehaviourOptions>,
}

impl DecisionCache {
    #[must_use]
    pub fn get(&self, class: CollisionClass) -> Option<BehaviourOptions> {
        self.decisions.get(&class).copied()
    }

    pub fn remember(&mut self, class: CollisionClass, options: BehaviourOptions) {
        self.decisions.insert(class, options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpkg_types::{InstallMode, ItemId, MergeMode};

    fn conflict<'a>(existing: &'a ItemDescriptor, incoming: &'a ItemDescriptor) -> Conflict<'a> {
        Conflict {
            key: "master/sitecore/a/{00000000-0000-0000-0000-000000000001}/en/1",
            class: CollisionClass::classify(existing.id, incoming.id),
            existing,
            incoming,
        }
    }

    #[test]
    fn scripted_resolver_declines_when_exhausted() {
        let item = ItemDescriptor::stub(ItemId::from_u128(1), "a", ItemId::from_u128(9));
        let overwrite = BehaviourOptions::new(InstallMode::Overwrite, MergeMode::Undefined);
        let resolver = ScriptedResolver::new([Some(Resolution::once(overwrite))]);

        assert_eq!(
            resolver.ask(&conflict(&item, &item)),
            Some(Resolution::once(overwrite))
        );
        assert_eq!(resolver.ask(&conflict(&item, &item)), None);
        assert_eq!(resolver.asked().len(), 2);
        assert_eq!(resolver.asked()[0].1, CollisionClass::IdCollision);
    }

    #[test]
    fn fixed_resolver_applies_to_all() {
        let item = ItemDescriptor::stub(ItemId::from_u128(1), "a", ItemId::from_u128(9));
        let resolver = FixedResolver::new(BehaviourOptions::new(InstallMode::Skip, MergeMode::Undefined));
        let resolution = resolver.ask(&conflict(&item, &item)).unwrap();
        assert!(resolution.apply_to_all);
        assert_eq!(resolution.options.item_mode, InstallMode::Skip);
    }
}
