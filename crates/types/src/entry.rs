//! Package entries as read from a package source

use crate::{BehaviourOptions, CollisionClass, InstallMode, ItemReference, MergeMode};
use cpkg_errors::InstallError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Key prefix of entries that describe items
pub const ITEMS_PREFIX: &str = "items/";
/// Key prefix of entries that carry package metadata
pub const METADATA_PREFIX: &str = "metadata/";

/// One record of a content package
///
/// `key` is the key relative to the item area
/// (`master/sitecore/content/Home/{id}/en/1/xml`); `document` is the raw
/// version document, parsed lazily by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub key: String,
    pub document: String,
    #[serde(default)]
    pub hints: EntryHints,
}

impl PackageEntry {
    pub fn new(key: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            document: document.into(),
            hints: EntryHints::default(),
        }
    }

    #[must_use]
    pub fn with_hint(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.set(name, value);
        self
    }

    #[must_use]
    pub fn with_behaviour(mut self, class: CollisionClass, options: BehaviourOptions) -> Self {
        self.hints.set_behaviour(class, options);
        self
    }

    /// Target identity encoded in the key
    ///
    /// # Errors
    ///
    /// Returns `InstallError::InvalidEntryKey` if the key is malformed.
    pub fn reference(&self) -> Result<ItemReference, InstallError> {
        ItemReference::parse(&self.key)
    }
}

/// Behaviour hints attached to an entry
///
/// Property names are matched case-insensitively; the recognized ones are
/// `idcollision.itemmode`, `idcollision.mergemode`, `pathcollision.itemmode`
/// and `pathcollision.mergemode`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHints {
    properties: BTreeMap<String, String>,
}

impl EntryHints {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn set_behaviour(&mut self, class: CollisionClass, options: BehaviourOptions) {
        let prefix = class.hint_prefix();
        self.set(format!("{prefix}.itemmode"), options.item_mode.to_string());
        self.set(format!("{prefix}.mergemode"), options.merge_mode.to_string());
    }

    /// Decision carried by the entry for a collision class, if any
    ///
    /// Unparseable values are logged and treated as absent.
    #[must_use]
    pub fn behaviour_for(&self, class: CollisionClass) -> Option<BehaviourOptions> {
        let prefix = class.hint_prefix();
        let item_mode = self
            .get(&format!("{prefix}.itemmode"))
            .and_then(|raw| match raw.parse::<InstallMode>() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    warn!(hint = %prefix, error = %e, "ignoring item mode hint");
                    None
                }
            })?;
        let merge_mode = self
            .get(&format!("{prefix}.mergemode"))
            .and_then(|raw| raw.parse::<MergeMode>().ok())
            .unwrap_or_default();

        let options = BehaviourOptions::new(item_mode, merge_mode);
        options.is_defined().then_some(options)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
