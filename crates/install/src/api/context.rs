use crate::CancellationToken;
use cpkg_events::EventSender;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with the item cursor and the key of every attempted entry
#[derive(Clone)]
pub struct ProgressHook(Arc<dyn Fn(u64, &str) + Send + Sync>);

impl ProgressHook {
    #[must_use]
    pub fn new(hook: impl Fn(u64, &str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub fn call(&self, cursor: u64, key: &str) {
        (self.0)(cursor, key);
    }
}

impl fmt::Debug for ProgressHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressHook")
    }
}

/// Installation context
#[derive(Clone, Debug)]
pub struct InstallContext {
    /// Package name used in lifecycle events and logs
    pub package: String,
    /// Cooperative stop signal, checked between entries
    pub cancel: CancellationToken,
    /// Progress callback for job drivers
    pub progress: Option<ProgressHook>,

    /// Event sender for progress reporting
    pub event_sender: Option<EventSender>,
}

context_builder! {
    InstallContext {
        package: String,
        cancel: CancellationToken,
        progress: Option<ProgressHook>,
    }
}

impl InstallContext {
    /// Install a progress callback
    #[must_use]
    pub fn on_progress(mut self, hook: impl Fn(u64, &str) + Send + Sync + 'static) -> Self {
        self.progress = Some(ProgressHook::new(hook));
        self
    }

    pub(crate) fn report_progress(&self, cursor: u64, key: &str) {
        if let Some(hook) = &self.progress {
            hook.call(cursor, key);
        }
    }
}
