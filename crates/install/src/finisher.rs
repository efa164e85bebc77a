//! End-of-run handling of the deletion ledger

use crate::ledger::{DeletionLedger, DrainReport, NodeKey};
use cpkg_events::RunOutcome;
use cpkg_store::TreeStore;
use tracing::{info, warn};

/// What a finisher did with the ledger
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FinishReport {
    pub outcome: Option<RunOutcome>,
    pub drained: DrainReport,
    /// Keys left in place because the run did not complete
    pub discarded: Vec<NodeKey>,
}

/// Receives the deletion ledger when a run ends
pub trait Finisher: Send + Sync {
    /// Never fails; per-key problems are logged
    fn finish(
        &self,
        store: &dyn TreeStore,
        ledger: DeletionLedger,
        outcome: RunOutcome,
    ) -> FinishReport;
}

/// Deletes what is left in the ledger after a completed run
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerFinisher;

impl Finisher for LedgerFinisher {
    fn finish(
        &self,
        store: &dyn TreeStore,
        mut ledger: DeletionLedger,
        outcome: RunOutcome,
    ) -> FinishReport {
        if !outcome.is_completed() {
            if !ledger.is_empty() {
                warn!(
                    outcome = %outcome,
                    keys = ledger.len(),
                    "run did not complete, nodes scheduled for deletion are kept"
                );
            }
            return FinishReport {
                outcome: Some(outcome),
                drained: DrainReport::default(),
                discarded: ledger.keys().cloned().collect(),
            };
        }

        let drained = ledger.drain(store);
        info!(
            deleted = drained.deleted.len(),
            missing = drained.missing.len(),
            failed = drained.failed.len(),
            "pruned nodes absent from package"
        );
        FinishReport {
            outcome: Some(outcome),
            drained,
            discarded: Vec::new(),
        }
    }
}
