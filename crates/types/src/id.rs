//! Item identifiers and well-known ids

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of one item in a tree store
///
/// Rendered in the braced upper-case form used by content packages
/// (`{25BED78C-4957-4165-998A-CA1B52F67497}`); parsing accepts braced or bare
/// GUIDs in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(Uuid);

impl ItemId {
    /// The null id, used by stores for "no template" and "no branch"
    pub const NULL: Self = Self(Uuid::nil());

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Generate a fresh random id
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.hyphenated().to_string().to_uppercase())
    }
}

/// Error returned when a string is not a GUID
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid item id: {input}")]
pub struct ParseItemIdError {
    pub input: String,
}

impl FromStr for ItemId {
    type Err = ParseItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);
        Uuid::parse_str(inner).map(Self).map_err(|_| ParseItemIdError {
            input: s.to_string(),
        })
    }
}

impl TryFrom<String> for ItemId {
    type Error = ParseItemIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.to_string()
    }
}

impl From<Uuid> for ItemId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Ids with a fixed meaning in every content database
pub mod known {
    use super::ItemId;

    /// `__Created` statistics field
    pub const CREATED_FIELD: ItemId = ItemId::from_u128(0x25BE_D78C_4957_4165_998A_CA1B_52F6_7497);
    /// `__Updated` statistics field
    pub const UPDATED_FIELD: ItemId = ItemId::from_u128(0xD9CF_14B1_FA16_4BA6_9288_E8A1_74D4_D522);
    /// `Shared` flag on a template field definition
    pub const SHARED_FIELD: ItemId = ItemId::from_u128(0xBE35_1A73_FCB0_4213_93FA_C302_D8AB_4F51);
    /// `Unversioned` flag on a template field definition
    pub const UNVERSIONED_FIELD: ItemId =
        ItemId::from_u128(0x3984_7666_389D_409B_95BD_F201_6F11_EED5);
    /// Template of template field definitions
    pub const TEMPLATE_FIELD_TEMPLATE: ItemId =
        ItemId::from_u128(0x455A_3E98_A627_4B40_8035_E683_A033_1AC7);
    /// Template of language definitions
    pub const LANGUAGE_TEMPLATE: ItemId =
        ItemId::from_u128(0xF68F_13A6_3395_426A_B9A1_FA2D_C60D_94EB);
}
