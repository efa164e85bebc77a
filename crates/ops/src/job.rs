//! Background installation jobs
//!
//! A job runs its work on the blocking thread pool and publishes a
//! [`JobStatus`] through a watch channel. Callers poll that status at a
//! fixed interval until it reaches a terminal state.

use cpkg_errors::{Error, OpsError};
use cpkg_events::FailureContext;
use cpkg_install::{CancellationToken, InstallContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Lifecycle state of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "failure", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Failed(FailureContext),
    Aborted,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_) | Self::Aborted)
    }
}

/// Snapshot published by a running job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Entries attempted so far
    pub cursor: u64,
    /// Key of the entry being processed
    pub current_key: Option<String>,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self {
            state: JobState::Queued,
            cursor: 0,
            current_key: None,
        }
    }
}

/// Handle to work running on the blocking pool
pub struct InstallJob<T> {
    status: watch::Receiver<JobStatus>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<T, Error>>,
}

impl<T: Send + 'static> InstallJob<T> {
    /// Run `work` on the blocking pool
    ///
    /// The context handed to `work` reports progress into the job status and
    /// keeps any progress hook already installed on `context`. Must be called
    /// from within a tokio runtime.
    #[must_use]
    pub fn spawn<F>(context: InstallContext, work: F) -> Self
    where
        F: FnOnce(InstallContext) -> Result<T, Error> + Send + 'static,
    {
        let (status_tx, status_rx) = watch::channel(JobStatus::default());
        let status_tx = Arc::new(status_tx);
        let cancel = context.cancel.clone();

        let previous = context.progress.clone();
        let progress_tx = Arc::clone(&status_tx);
        let context = context.on_progress(move |cursor, key| {
            if let Some(hook) = &previous {
                hook.call(cursor, key);
            }
            progress_tx.send_modify(|status| {
                status.cursor = cursor;
                status.current_key = Some(key.to_string());
            });
        });

        let handle = tokio::task::spawn_blocking(move || {
            status_tx.send_modify(|status| status.state = JobState::Running);
            debug!(package = %context.package, "installation job running");

            let result = work(context);
            let state = match &result {
                Ok(_) => JobState::Finished,
                Err(e) if e.is_abort() => JobState::Aborted,
                Err(e) => JobState::Failed(FailureContext::from_error(e)),
            };
            status_tx.send_modify(|status| status.state = state);
            result
        });

        Self {
            status: status_rx,
            cancel,
            handle,
        }
    }

    /// Current status snapshot
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.clone()
    }

    /// Ask the worker to stop before its next entry
    pub fn cancel(&self) {
        info!("cancelling installation job");
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll the status until the job ends and return its result
    ///
    /// # Errors
    ///
    /// `Error::Cancelled` for an aborted job, the worker's error for a failed
    /// one, and `OpsError::WorkerFailed` if the worker panicked.
    pub async fn monitor(self, poll_interval: Duration) -> Result<T, Error> {
        let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
        let mut last_cursor = 0;
        loop {
            ticker.tick().await;
            let status = self.status();
            if status.cursor != last_cursor {
                last_cursor = status.cursor;
                debug!(cursor = status.cursor, key = ?status.current_key, "installation progress");
            }
            if status.state.is_terminal() || self.handle.is_finished() {
                break;
            }
        }

        let state = self.status().state;
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "installation worker did not complete");
                return Err(OpsError::WorkerFailed {
                    message: e.to_string(),
                }
                .into());
            }
        };
        match state {
            JobState::Finished | JobState::Failed(_) => result,
            JobState::Aborted => Err(Error::Cancelled),
            JobState::Queued | JobState::Running => Err(OpsError::JobDisappeared.into()),
        }
    }
}
