//! Fixed names and ids used by the installer defaults

use cpkg_types::ItemId;

/// Directory below the user config dir that holds `config.toml`
pub const CONFIG_DIR_NAME: &str = "cpkg";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Database that receives installation history records
pub const REGISTRATION_DATABASE: &str = "core";
/// Parent path of installation history records
pub const HISTORY_PATH: &str = "/sitecore/system/Packages/Installation history";

/// Template of intermediate folders created along the history path
pub const NODE_TEMPLATE: ItemId = ItemId::from_u128(0x239F_9CF4_E5A0_44E0_B342_0F32_CD4C_6D8B);
/// Template of the history record itself
pub const REGISTRATION_TEMPLATE: ItemId =
    ItemId::from_u128(0x22A1_1D25_9B5B_4C19_B38B_08B0_A3B4_AB43);

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

pub const ENV_POLL_INTERVAL_MS: &str = "CPKG_POLL_INTERVAL_MS";
pub const ENV_DEFAULT_ITEM_MODE: &str = "CPKG_DEFAULT_ITEM_MODE";
pub const ENV_DEFAULT_MERGE_MODE: &str = "CPKG_DEFAULT_MERGE_MODE";
pub const ENV_REGISTER_INSTALLATION: &str = "CPKG_REGISTER_INSTALLATION";
