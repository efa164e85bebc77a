use serde::{Deserialize, Serialize};

use super::FailureContext;

/// How an installation run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed,
    Aborted,
}

impl RunOutcome {
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Lifecycle signals of a package installation
///
/// A run emits `Starting`, then `ItemsStarting`/`ItemsEnded` around every
/// pass over the queue, optional post step signals and finally `Ended`.
/// `Failed` and `Aborted` precede `Ended` on the unhappy paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    /// Package installation started
    Starting { package: String },

    /// A pass over the item queue started
    ItemsStarting { pass: usize, queued: usize },

    /// An entry is being installed; `cursor` increases with every attempt
    ItemInstalling {
        cursor: u64,
        key: String,
        mode: Option<String>,
    },

    /// An entry waits for its template and was moved to the next pass
    ItemPostponed { key: String, template_id: String },

    /// The item queue drained
    ItemsEnded { installed: usize },

    /// Post step execution started
    PostStepStarting { action: String },

    /// Post step execution finished, successfully or not
    PostStepEnded { action: String, success: bool },

    /// Package installation ended
    Ended { package: String, outcome: RunOutcome },

    /// Installation failed
    Failed { failure: FailureContext },

    /// Installation was stopped by the user
    Aborted { cursor: u64, key: Option<String> },
}

impl InstallEvent {
    pub fn starting(package: impl Into<String>) -> Self {
        Self::Starting {
            package: package.into(),
        }
    }

    pub fn ended(package: impl Into<String>, outcome: RunOutcome) -> Self {
        Self::Ended {
            package: package.into(),
            outcome,
        }
    }

    /// Whether this is one of the terminal signals
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }
}
