//! Installation history records
//!
//! Every installed package gets a record below the history path of the
//! registration database, one folder per package name and one record per
//! installation named by its timestamp.

use chrono::{DateTime, Utc};
use cpkg_config::RegistrationConfig;
use cpkg_errors::Error;
use cpkg_store::{CreateRequest, Node, TreeStore, VersionData};
use cpkg_types::{iso, known, ItemId, Language, PackageMetadata};
use tracing::{debug, error, info, warn};

/// Folder name used when a package has no usable name
pub const UNNAMED_PACKAGE: &str = "Unnamed Package";

/// Language of the record's field data
const RECORD_LANGUAGE: &str = "en";

/// Characters that may not appear in a node name
const INVALID_NAME_CHARS: &[char] = &['\\', '/', ':', '?', '"', '<', '>', '|', '[', ']', '*'];

/// Field ids of an installation record
pub mod fields {
    use cpkg_types::ItemId;

    pub const PACKAGE_NAME: ItemId = ItemId::from_u128(0x6AF3_DE94_14B4_4D1B_9F73_2AB2_64A3_E0E1);
    pub const PACKAGE_ID: ItemId = ItemId::from_u128(0x1B5A_6D7E_4C41_49B4_8C8A_3E6F_8D0D_45E2);
    pub const PACKAGE_VERSION: ItemId =
        ItemId::from_u128(0x0C8E_5B9D_4A3F_4E2C_B1D7_6A90_3F2E_11C3);
    pub const PACKAGE_AUTHOR: ItemId = ItemId::from_u128(0xE9B1_7C02_5D6A_4F38_A4E5_91C0_2B7D_83F4);
    pub const PACKAGE_PUBLISHER: ItemId =
        ItemId::from_u128(0x5F4D_A2C8_0B9E_47D1_8E36_C7A5_1D90_6B25);
    pub const PACKAGE_README: ItemId = ItemId::from_u128(0x8D27_F3B6_9E1C_4A05_B2F8_40D9_E6A3_7C16);
    pub const PACKAGE_REVISION: ItemId =
        ItemId::from_u128(0x3A6C_0E81_F2D4_4B97_9C5B_D8E2_7F14_A0B7);
}

/// Turn a package name into a valid node name
///
/// Invalid characters are dropped and surrounding whitespace and dots are
/// trimmed. An empty result becomes [`UNNAMED_PACKAGE`].
#[must_use]
pub fn valid_item_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_NAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        UNNAMED_PACKAGE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Record an installation in the history database
///
/// Returns `Ok(None)` when the registration database or one of the
/// registration templates is missing; both are logged and skipped.
///
/// # Errors
///
/// Propagates store failures while creating or writing the record.
pub fn register_installation<S: TreeStore + ?Sized>(
    store: &S,
    config: &RegistrationConfig,
    metadata: &PackageMetadata,
    now: DateTime<Utc>,
) -> Result<Option<Node>, Error> {
    let database = config.database.as_str();
    if !store.has_database(database) {
        error!(database, "registration database not found, installation not registered");
        return Ok(None);
    }

    let name = valid_item_name(&metadata.package_name);
    let Some(history) = store.ensure_path(database, &config.history_path)? else {
        error!(path = %config.history_path, "history path could not be resolved");
        return Ok(None);
    };

    let folder_path = format!("{}/{name}", history.path);
    let folder = match store.get_by_path(database, &folder_path)? {
        Some(folder) => folder,
        None => {
            let request = CreateRequest {
                database: database.to_string(),
                parent_id: history.id,
                name: name.clone(),
                template_id: config.node_template,
                id: ItemId::new_v4(),
                created_at: Some(now),
                template_pending: false,
            };
            let Some(folder) = store.create(&request)? else {
                warn!(
                    template = %config.node_template,
                    "history folder template not found, installation not registered"
                );
                return Ok(None);
            };
            folder
        }
    };

    let request = CreateRequest {
        database: database.to_string(),
        parent_id: folder.id,
        name: iso::format(now),
        template_id: config.registration_template,
        id: ItemId::new_v4(),
        created_at: Some(now),
        template_pending: false,
    };
    let Some(record) = store.create(&request)? else {
        warn!(
            template = %config.registration_template,
            "registration template not found, installation not registered"
        );
        return Ok(None);
    };

    let mut version = VersionData::new(Language::Named(RECORD_LANGUAGE.to_string()), 1);
    version.set_field(fields::PACKAGE_NAME, metadata.package_name.as_str());
    version.set_field(fields::PACKAGE_ID, metadata.package_id.as_str());
    version.set_field(fields::PACKAGE_VERSION, metadata.version.as_str());
    version.set_field(fields::PACKAGE_AUTHOR, metadata.author.as_str());
    version.set_field(fields::PACKAGE_PUBLISHER, metadata.publisher.as_str());
    version.set_field(fields::PACKAGE_README, metadata.readme.as_str());
    version.set_field(fields::PACKAGE_REVISION, metadata.revision.as_str());
    version.set_field(known::CREATED_FIELD, iso::format(now));
    store.commit_version(database, record.id, &version)?;

    info!(package = %name, path = %record.path, "installation registered");
    debug!(record = %record.id, "registration record written");
    Ok(Some(record))
}
