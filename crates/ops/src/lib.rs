#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Installation job orchestration for cpkg
//!
//! This crate sits between a caller holding a stream of package entries and
//! the installation engine. It splits entries by area, runs the engine on a
//! blocking worker, publishes a polled job status, records the installation
//! in the history database and runs the package post step.

mod dispatch;
mod job;
mod poststep;
mod registration;
mod session;

pub use dispatch::{dispatch, DispatchedPackage};
pub use job::{InstallJob, JobState, JobStatus};
pub use poststep::{PostStep, PostStepRegistry};
pub use registration::{
    fields as registration_fields, register_installation, valid_item_name, UNNAMED_PACKAGE,
};
pub use session::{InstallSession, PackageReport};

pub use cpkg_install::CancellationToken;
