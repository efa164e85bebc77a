//! Forwarding of events to `tracing`
//!
//! Library crates only emit events; whoever owns the receiver decides whether
//! they end up in a log. [`forward`] is the default consumer.

use crate::{AppEvent, EventMessage, EventReceiver, GeneralEvent, InstallEvent};
use tracing::{debug, error, info, trace, warn};

/// Log one event with structured fields at its own level
pub fn log_event(message: &EventMessage) {
    let meta = &message.meta;
    match &message.event {
        AppEvent::Install(event) => match event {
            InstallEvent::Starting { package } => {
                info!(target: "cpkg::events::install", event_id = %meta.event_id, package = %package, "package installation starting");
            }
            InstallEvent::ItemsStarting { pass, queued } => {
                info!(target: "cpkg::events::install", event_id = %meta.event_id, pass, queued, "items starting");
            }
            InstallEvent::ItemInstalling { cursor, key, mode } => {
                trace!(target: "cpkg::events::install", cursor, key = %key, mode = ?mode, "installing item");
            }
            InstallEvent::ItemPostponed { key, template_id } => {
                debug!(target: "cpkg::events::install", key = %key, template_id = %template_id, "item postponed");
            }
            InstallEvent::ItemsEnded { installed } => {
                info!(target: "cpkg::events::install", event_id = %meta.event_id, installed, "items ended");
            }
            InstallEvent::PostStepStarting { action } => {
                info!(target: "cpkg::events::install", action = %action, "post step starting");
            }
            InstallEvent::PostStepEnded { action, success } => {
                if *success {
                    info!(target: "cpkg::events::install", action = %action, "post step ended");
                } else {
                    warn!(target: "cpkg::events::install", action = %action, "post step ended with errors");
                }
            }
            InstallEvent::Ended { package, outcome } => {
                info!(target: "cpkg::events::install", event_id = %meta.event_id, correlation = ?meta.correlation_id, package = %package, outcome = %outcome, "package installation ended");
            }
            InstallEvent::Failed { failure } => {
                error!(
                    target: "cpkg::events::install",
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "package installation failed"
                );
            }
            InstallEvent::Aborted { cursor, key } => {
                warn!(target: "cpkg::events::install", cursor, key = ?key, "package installation aborted");
            }
        },
        AppEvent::General(GeneralEvent::Warning { message, context }) => {
            warn!(target: "cpkg::events::general", context = ?context, "{message}");
        }
    }
}

/// Drain a receiver into `tracing` until every sender is dropped
pub async fn forward(mut receiver: EventReceiver) -> usize {
    let mut count = 0;
    while let Some(event) = receiver.recv().await {
        log_event(&event.into_message());
        count += 1;
    }
    count
}
