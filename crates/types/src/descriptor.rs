//! Parsed version documents

use crate::{iso, known, ItemId, Language};
use chrono::{DateTime, Utc};
use cpkg_errors::InstallError;
use serde::{Deserialize, Serialize};

/// One field value carried by a version document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub id: ItemId,
    #[serde(default)]
    pub value: String,
    /// The value references a binary payload handled by the blob service
    #[serde(default)]
    pub blob: bool,
}

impl FieldValue {
    pub fn new(id: ItemId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
            blob: false,
        }
    }
}

/// Wire shape of a version document
#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    tid: ItemId,
    #[serde(default)]
    bases: Vec<ItemId>,
    #[serde(default)]
    parent: Option<ItemId>,
    #[serde(default)]
    mid: Option<ItemId>,
    #[serde(default)]
    bid: Option<ItemId>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    fields: Vec<FieldValue>,
}

/// Parsed entry: the item definition plus one version of field data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub id: ItemId,
    pub name: String,
    pub template_id: ItemId,
    pub base_template_ids: Vec<ItemId>,
    pub parent_id: Option<ItemId>,
    pub branch_id: Option<ItemId>,
    pub created_at: Option<DateTime<Utc>>,
    pub language: Option<Language>,
    pub version: Option<u32>,
    pub fields: Vec<FieldValue>,
}

impl ItemDescriptor {
    /// Parse the JSON version document of the entry `key` for item `id`
    ///
    /// The branch id is taken from `mid`, falling back to `bid`. Without an
    /// explicit `created` value the creation time comes from the `__Created`
    /// field.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::InvalidDocument` if the document is not valid
    /// JSON or lacks a name or template id.
    pub fn parse(key: &str, id: ItemId, document: &str) -> Result<Self, InstallError> {
        let raw: RawDocument =
            serde_json::from_str(document).map_err(|e| InstallError::InvalidDocument {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let created_at = raw
            .created
            .as_deref()
            .and_then(iso::parse)
            .or_else(|| {
                raw.fields
                    .iter()
                    .find(|field| field.id == known::CREATED_FIELD)
                    .and_then(|field| iso::parse(&field.value))
            });

        Ok(Self {
            id,
            name: raw.name,
            template_id: raw.tid,
            base_template_ids: raw.bases,
            parent_id: raw.parent.filter(|parent| !parent.is_null()),
            branch_id: raw
                .mid
                .filter(|branch| !branch.is_null())
                .or_else(|| raw.bid.filter(|branch| !branch.is_null())),
            created_at,
            language: raw.language.as_deref().map(Language::parse),
            version: raw.version,
            fields: raw.fields,
        })
    }

    /// Minimal descriptor with no field data
    pub fn stub(id: ItemId, name: impl Into<String>, template_id: ItemId) -> Self {
        Self {
            id,
            name: name.into(),
            template_id,
            base_template_ids: Vec::new(),
            parent_id: None,
            branch_id: None,
            created_at: None,
            language: None,
            version: None,
            fields: Vec::new(),
        }
    }

    /// Whether the item defines itself, i.e. is its own template
    #[must_use]
    pub fn is_self_templated(&self) -> bool {
        self.id == self.template_id
    }

    #[must_use]
    pub fn field(&self, id: ItemId) -> Option<&FieldValue> {
        self.fields.iter().find(|field| field.id == id)
    }
}
