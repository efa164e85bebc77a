#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the cpkg content package installer
//!
//! This crate holds the entry model shared by every other crate: item ids,
//! references parsed from entry keys, parsed version documents and the
//! conflict decision types.

pub mod descriptor;
pub mod entry;
pub mod id;
pub mod iso;
pub mod metadata;
pub mod options;
pub mod reference;

// Re-export commonly used types
pub use descriptor::{FieldValue, ItemDescriptor};
pub use entry::{EntryHints, PackageEntry, ITEMS_PREFIX, METADATA_PREFIX};
pub use id::{known, ItemId, ParseItemIdError};
pub use metadata::PackageMetadata;
pub use options::{
    BehaviourOptions, CollisionClass, InstallMode, MergeMode, ParseModeError, VersionInstallMode,
};
pub use reference::{ItemReference, Language};
pub use uuid::Uuid;
