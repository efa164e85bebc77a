#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for cpkg
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/cpkg/config.toml)
//! - Environment variables

pub mod constants;

use cpkg_errors::{ConfigError, Error};
use cpkg_types::{BehaviourOptions, InstallMode, ItemId, MergeMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub registration: RegistrationConfig,
}

/// Engine behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Item mode used when no interactive resolver is available
    #[serde(default = "default_item_mode")]
    pub default_item_mode: InstallMode,
    #[serde(default = "default_merge_mode")]
    pub default_merge_mode: MergeMode,
    /// Record the installation under the history path
    #[serde(default = "default_register_installation")]
    pub register_installation: bool,
}

/// Job status monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Installation history records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_registration_database")]
    pub database: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    #[serde(default = "default_node_template")]
    pub node_template: ItemId,
    #[serde(default = "default_registration_template")]
    pub registration_template: ItemId,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            default_item_mode: default_item_mode(),
            default_merge_mode: default_merge_mode(),
            register_installation: true,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            database: default_registration_database(),
            history_path: default_history_path(),
            node_template: default_node_template(),
            registration_template: default_registration_template(),
        }
    }
}

// Default value functions for serde
fn default_item_mode() -> InstallMode {
    InstallMode::Merge
}

fn default_merge_mode() -> MergeMode {
    MergeMode::Clear
}

fn default_register_installation() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    constants::DEFAULT_POLL_INTERVAL_MS
}

fn default_registration_database() -> String {
    constants::REGISTRATION_DATABASE.to_string()
}

fn default_history_path() -> String {
    constants::HISTORY_PATH.to_string()
}

fn default_node_template() -> ItemId {
    constants::NODE_TEMPLATE
}

fn default_registration_template() -> ItemId {
    constants::REGISTRATION_TEMPLATE
}

impl InstallConfig {
    /// Decision applied when nobody can be asked
    #[must_use]
    pub fn default_behaviour(&self) -> BehaviourOptions {
        BehaviourOptions::new(self.default_item_mode, self.default_merge_mode)
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::CONFIG_DIR_NAME)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.display().to_string(),
                }
                .into()
            } else {
                Error::io_with_path(&e, path)
            }
        })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Reject combinations the engine cannot execute
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the default decision is undefined
    /// or the registration target is empty.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.install.default_behaviour().is_defined() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "default decision {} is undefined",
                    self.install.default_behaviour()
                ),
            }
            .into());
        }
        if self.registration.database.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "registration database is empty".to_string(),
            }
            .into());
        }
        if !self.registration.history_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "history path must be absolute: {}",
                    self.registration.history_path
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(interval) = std::env::var(constants::ENV_POLL_INTERVAL_MS) {
            self.monitor.poll_interval_ms =
                interval.parse().map_err(|_| ConfigError::InvalidValue {
                    field: constants::ENV_POLL_INTERVAL_MS.to_string(),
                    value: interval,
                })?;
        }

        if let Ok(mode) = std::env::var(constants::ENV_DEFAULT_ITEM_MODE) {
            self.install.default_item_mode =
                mode.parse().map_err(|_| ConfigError::InvalidValue {
                    field: constants::ENV_DEFAULT_ITEM_MODE.to_string(),
                    value: mode,
                })?;
        }

        if let Ok(mode) = std::env::var(constants::ENV_DEFAULT_MERGE_MODE) {
            self.install.default_merge_mode =
                mode.parse().map_err(|_| ConfigError::InvalidValue {
                    field: constants::ENV_DEFAULT_MERGE_MODE.to_string(),
                    value: mode,
                })?;
        }

        if let Ok(register) = std::env::var(constants::ENV_REGISTER_INSTALLATION) {
            self.install.register_installation = match register.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: constants::ENV_REGISTER_INSTALLATION.to_string(),
                        value: register,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_installer_behaviour() {
        let config = Config::default();
        assert_eq!(
            config.install.default_behaviour(),
            BehaviourOptions::new(InstallMode::Merge, MergeMode::Clear)
        );
        assert!(config.install.register_installation);
        assert_eq!(config.monitor.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.registration.database, "core");
        assert!(!config.registration.node_template.is_null());
        assert!(!config.registration.registration_template.is_null());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn undefined_default_is_rejected() {
        let mut config = Config::default();
        config.install.default_merge_mode = MergeMode::Undefined;
        assert!(config.validate().is_err());
    }
}
