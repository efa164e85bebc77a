#![warn(clippy::pedantic)]
#![deny(clippy::all)]

//! Content package installation engine for cpkg
//!
//! This crate turns an ordered stream of package entries into mutations of a
//! tree store: it orders entries so templates exist before the items built
//! from them, resolves collisions with existing content, writes field
//! versions and prunes children an overwrite left behind.

#[macro_use]
mod macros;
mod api;
mod cancel;
mod engine;
mod finisher;
mod ledger;
mod lookup;
mod placeholder;
mod policy;
mod state;
mod writer;

pub use cancel::CancellationToken;
pub use engine::Engine;
pub use finisher::{FinishReport, Finisher, LedgerFinisher};
pub use ledger::{DeletionLedger, DrainReport, NodeKey};
pub use lookup::{find_target, Lookup};
pub use policy::{
    Conflict, ConflictResolver, DecisionCache, FixedResolver, Resolution, ScriptedResolver,
};
pub use state::{CurrentItem, RunState};
pub use writer::{
    BlobService, FieldMergePolicy, NoBlobs, OverlayFields, VersionWriter, WriteRequest,
};

// Re-export the public API surface from api module
pub use api::config::EngineConfig;
pub use api::context::{InstallContext, ProgressHook};
pub use api::result::InstallReport;

// Re-export EventSender for use by macros and contexts
pub use cpkg_events::EventSender;
