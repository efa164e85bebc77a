//! Conflict decision types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with an item that collides with existing content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    #[default]
    Undefined,
    Skip,
    Overwrite,
    SideBySide,
    Merge,
}

/// How incoming versions are reconciled under `InstallMode::Merge`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    #[default]
    Undefined,
    Append,
    Clear,
    Merge,
}

/// Error returned when a mode name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode: {input}")]
pub struct ParseModeError {
    pub input: String,
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for InstallMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "undefined" => Ok(Self::Undefined),
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            "sidebyside" => Ok(Self::SideBySide),
            "merge" => Ok(Self::Merge),
            _ => Err(ParseModeError {
                input: s.to_string(),
            }),
        }
    }
}

impl FromStr for MergeMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "undefined" => Ok(Self::Undefined),
            "append" => Ok(Self::Append),
            "clear" => Ok(Self::Clear),
            "merge" => Ok(Self::Merge),
            _ => Err(ParseModeError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::SideBySide => "side_by_side",
            Self::Merge => "merge",
        };
        f.write_str(name)
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Append => "append",
            Self::Clear => "clear",
            Self::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// A conflict decision: item mode plus merge sub-mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BehaviourOptions {
    pub item_mode: InstallMode,
    pub merge_mode: MergeMode,
}

impl BehaviourOptions {
    #[must_use]
    pub const fn new(item_mode: InstallMode, merge_mode: MergeMode) -> Self {
        Self {
            item_mode,
            merge_mode,
        }
    }

    /// Whether the decision can be executed without further input
    #[must_use]
    pub fn is_defined(&self) -> bool {
        match self.item_mode {
            InstallMode::Undefined => false,
            InstallMode::Merge => self.merge_mode != MergeMode::Undefined,
            _ => true,
        }
    }

    /// Version write mode implied by this decision
    #[must_use]
    pub fn version_install_mode(&self) -> VersionInstallMode {
        match (self.item_mode, self.merge_mode) {
            (InstallMode::Skip, _) => VersionInstallMode::Skip,
            (InstallMode::Overwrite | InstallMode::SideBySide, _)
            | (InstallMode::Merge, MergeMode::Append | MergeMode::Clear) => {
                VersionInstallMode::Append
            }
            (InstallMode::Merge, MergeMode::Merge) => VersionInstallMode::Merge,
            (InstallMode::Undefined, _) | (InstallMode::Merge, MergeMode::Undefined) => {
                VersionInstallMode::Undefined
            }
        }
    }
}

impl fmt::Display for BehaviourOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.item_mode, self.merge_mode)
    }
}

/// How an entry's field data is reconciled with an existing node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionInstallMode {
    Undefined,
    Append,
    Merge,
    Skip,
}

impl fmt::Display for VersionInstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Append => "append",
            Self::Merge => "merge",
            Self::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Scope of an "apply to all" conflict decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionClass {
    /// The existing node has the incoming id
    IdCollision,
    /// The existing node occupies the incoming path under another id
    PathCollision,
}

impl CollisionClass {
    /// Classify a collision between an existing and an incoming id
    #[must_use]
    pub fn classify(existing: crate::ItemId, incoming: crate::ItemId) -> Self {
        if existing == incoming {
            Self::IdCollision
        } else {
            Self::PathCollision
        }
    }

    /// Prefix of the hint properties that carry a decision for this class
    #[must_use]
    pub fn hint_prefix(self) -> &'static str {
        match self {
            Self::IdCollision => "idcollision",
            Self::PathCollision => "pathcollision",
        }
    }
}

impl fmt::Display for CollisionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hint_prefix())
    }
}
