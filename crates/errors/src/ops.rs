//! Job orchestration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum OpsError {
    #[error("background installation task failed: {message}")]
    WorkerFailed { message: String },

    #[error("installation job disappeared before reaching a terminal state")]
    JobDisappeared,

    #[error("package registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("post step failed: {action}: {message}")]
    PostStepFailed { action: String, message: String },
}

impl UserFacingError for OpsError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::JobDisappeared => Some("Check the installation log for the last item processed."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::WorkerFailed { .. } => "ops.worker_failed",
            Self::JobDisappeared => "ops.job_disappeared",
            Self::RegistrationFailed { .. } => "ops.registration_failed",
            Self::PostStepFailed { .. } => "ops.post_step_failed",
        };
        Some(code)
    }
}
