//! Records exchanged with a tree store

use chrono::{DateTime, Utc};
use cpkg_types::{ItemId, Language};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Snapshot of one item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub database: String,
    pub id: ItemId,
    pub name: String,
    pub template_id: ItemId,
    pub branch_id: Option<ItemId>,
    pub parent_id: Option<ItemId>,
    /// Full path including the node's own name
    pub path: String,
}

impl Node {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Path of the parent, `None` for a root node
    #[must_use]
    pub fn parent_path(&self) -> Option<&str> {
        self.path
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .filter(|parent| !parent.is_empty())
    }
}

/// Editable part of an item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub template_id: ItemId,
    pub branch_id: Option<ItemId>,
}

/// Address of one version of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    pub language: Language,
    pub number: u32,
}

impl VersionKey {
    #[must_use]
    pub fn new(language: Language, number: u32) -> Self {
        Self { language, number }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.language, self.number)
    }
}

/// Field data of one language/version of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionData {
    pub language: Language,
    pub number: u32,
    pub fields: BTreeMap<ItemId, String>,
    /// Fields whose values reference binary payloads
    #[serde(default)]
    pub blob_fields: BTreeSet<ItemId>,
}

impl VersionData {
    #[must_use]
    pub fn new(language: Language, number: u32) -> Self {
        Self {
            language,
            number,
            fields: BTreeMap::new(),
            blob_fields: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> VersionKey {
        VersionKey::new(self.language.clone(), self.number)
    }

    #[must_use]
    pub fn field(&self, id: ItemId) -> Option<&str> {
        self.fields.get(&id).map(String::as_str)
    }

    pub fn set_field(&mut self, id: ItemId, value: impl Into<String>) {
        self.fields.insert(id, value.into());
    }
}

/// Arguments of `TreeStore::create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub database: String,
    pub parent_id: ItemId,
    pub name: String,
    pub template_id: ItemId,
    pub id: ItemId,
    pub created_at: Option<DateTime<Utc>>,
    /// The template is installed later in the same run; do not resolve it now
    pub template_pending: bool,
}

/// Mutation recorded by stores that keep an edit journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreEdit {
    Created { id: ItemId, path: String },
    Moved { id: ItemId, parent_id: ItemId },
    Deleted { id: ItemId },
    VersionCommitted { id: ItemId, key: VersionKey },
    DefinitionUpdated { id: ItemId },
    FieldsSet { id: ItemId, key: VersionKey },
    VersionRemoved { id: ItemId, key: VersionKey },
}
