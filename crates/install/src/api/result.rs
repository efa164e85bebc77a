use crate::finisher::FinishReport;
use cpkg_types::VersionInstallMode;

/// Installation result
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Passes over the queue
    pub passes: usize,
    /// Entries accepted into the queue
    pub queued: usize,
    /// Entries whose keys could not be parsed
    pub rejected: usize,
    /// Entries that had field data written
    pub written: usize,
    /// Entries resolved to `Skip`
    pub skipped: usize,
    /// Times an entry was moved to the next pass
    pub postponed: usize,
    /// Placeholder nodes created for forward references
    pub placeholders: usize,
    /// Cursor value after the last attempted entry
    pub cursor: u64,
    /// What the finisher did with the deletion ledger
    pub finish: FinishReport,
}

impl InstallReport {
    pub(crate) fn record(&mut self, mode: VersionInstallMode) {
        match mode {
            VersionInstallMode::Skip => self.skipped += 1,
            _ => self.written += 1,
        }
    }

    /// Entries that reached a final decision
    #[must_use]
    pub fn installed(&self) -> usize {
        self.written + self.skipped
    }
}
