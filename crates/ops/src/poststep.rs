//! Post installation steps
//!
//! A package names its post step by a stable string id in the
//! `sc_poststep` metadata entry. Handlers are registered under those ids up
//! front; a package cannot load code of its own.

use cpkg_errors::{Error, OpsError};
use cpkg_events::{EventEmitter, InstallEvent};
use cpkg_types::PackageMetadata;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Work run once after all items of a package are installed
pub trait PostStep: Send + Sync {
    /// # Errors
    ///
    /// Any error fails the installation after its items were written.
    fn run(&self, metadata: &PackageMetadata) -> Result<(), Error>;
}

impl<F> PostStep for F
where
    F: Fn(&PackageMetadata) -> Result<(), Error> + Send + Sync,
{
    fn run(&self, metadata: &PackageMetadata) -> Result<(), Error> {
        self(metadata)
    }
}

/// Post step handlers by id
#[derive(Clone, Default)]
pub struct PostStepRegistry {
    steps: BTreeMap<String, Arc<dyn PostStep>>,
}

impl fmt::Debug for PostStepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.steps.keys()).finish()
    }
}

impl PostStepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; ids compare case-insensitively
    #[must_use]
    pub fn with_step(mut self, id: impl Into<String>, step: impl PostStep + 'static) -> Self {
        self.register(id, step);
        self
    }

    pub fn register(&mut self, id: impl Into<String>, step: impl PostStep + 'static) {
        self.steps
            .insert(id.into().trim().to_ascii_lowercase(), Arc::new(step));
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.steps.contains_key(&id.trim().to_ascii_lowercase())
    }

    /// Run the step registered under `action`
    ///
    /// Returns `Ok(false)` when no handler is registered for the id.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::PostStepFailed` when the handler fails.
    pub fn execute_post_step<E: EventEmitter + ?Sized>(
        &self,
        emitter: &E,
        action: &str,
        metadata: &PackageMetadata,
    ) -> Result<bool, Error> {
        let Some(step) = self.steps.get(&action.trim().to_ascii_lowercase()) else {
            warn!(action, "no post step registered under this id, skipped");
            emitter.emit_warning_with_context("post step not registered, skipped", action);
            return Ok(false);
        };

        emitter.emit_install(InstallEvent::PostStepStarting {
            action: action.to_string(),
        });
        let result = step.run(metadata);
        emitter.emit_install(InstallEvent::PostStepEnded {
            action: action.to_string(),
            success: result.is_ok(),
        });

        match result {
            Ok(()) => {
                info!(action, "post step finished");
                Ok(true)
            }
            Err(e) => {
                error!(action, error = %e, "post step failed");
                Err(OpsError::PostStepFailed {
                    action: action.to_string(),
                    message: e.to_string(),
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpkg_events::{AppEvent, GeneralEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn metadata() -> PackageMetadata {
        PackageMetadata {
            package_name: "Sample".into(),
            ..PackageMetadata::default()
        }
    }

    #[test]
    fn runs_registered_step_with_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = PostStepRegistry::new().with_step(
            "Cleanup",
            move |m: &PackageMetadata| -> Result<(), Error> {
                assert_eq!(m.package_name, "Sample");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let (tx, mut rx) = cpkg_events::channel();

        assert!(registry.execute_post_step(&tx, "cleanup", &metadata()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::Install(InstallEvent::PostStepStarting { .. })
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::Install(InstallEvent::PostStepEnded { success: true, .. })
        ));
    }

    #[test]
    fn unknown_step_is_not_fatal() {
        let registry = PostStepRegistry::new();
        let (tx, mut rx) = cpkg_events::channel();
        assert!(!registry.execute_post_step(&tx, "missing", &metadata()).unwrap());
        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::General(GeneralEvent::Warning { context: Some(ref action), .. })
                if action == "missing"
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failing_step_reports_failure() {
        let registry = PostStepRegistry::new()
            .with_step("broken", |_: &PackageMetadata| -> Result<(), Error> {
                Err(Error::internal("nope"))
            });
        let (tx, mut rx) = cpkg_events::channel();
        let err = registry
            .execute_post_step(&tx, "broken", &metadata())
            .unwrap_err();
        assert!(matches!(err, Error::Ops(OpsError::PostStepFailed { .. })));
        rx.try_recv().unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::Install(InstallEvent::PostStepEnded { success: false, .. })
        ));
    }
}
