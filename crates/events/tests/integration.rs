//! Integration tests for events

#[cfg(test)]
mod tests {
    use cpkg_errors::{Error, InstallError};
    use cpkg_events::*;

    #[tokio::test]
    async fn test_event_sender_emit() {
        let (tx, mut rx) = channel();

        tx.emit_warning_with_context("entry ignored", "files/bin/Sample.dll");
        tx.emit_install(InstallEvent::starting("sample"));

        let event1 = rx.recv().await.unwrap();
        assert_eq!(event1.log_level(), tracing::Level::WARN);
        assert!(matches!(
            event1,
            AppEvent::General(GeneralEvent::Warning { context: Some(ref key), .. })
                if key == "files/bin/Sample.dll"
        ));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(
            event2,
            AppEvent::Install(InstallEvent::Starting { ref package }) if package == "sample"
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
        let missing: Option<EventSender> = None;
        missing.emit_warning("also ignored");
    }

    #[test]
    fn test_install_event_levels() {
        let failure = FailureContext::from_error(&Error::from(InstallError::StructuralCycle {
            pending: 2,
            passes: 2,
        }));
        assert_eq!(failure.code.as_deref(), Some("install.structural_cycle"));

        let failed = AppEvent::Install(InstallEvent::Failed { failure });
        assert_eq!(failed.log_level(), tracing::Level::ERROR);
        assert_eq!(failed.log_target(), "cpkg::events::install");

        let aborted = AppEvent::Install(InstallEvent::Aborted {
            cursor: 3,
            key: None,
        });
        assert_eq!(aborted.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Install(InstallEvent::ended("sample", RunOutcome::Aborted));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "install");
        assert_eq!(json["event"]["type"], "ended");
        assert_eq!(json["event"]["outcome"], "aborted");
    }

    #[tokio::test]
    async fn test_forward_drains_channel() {
        let (tx, rx) = channel();
        tx.emit_install(InstallEvent::ItemsStarting { pass: 1, queued: 4 });
        tx.emit_install(InstallEvent::ItemsEnded { installed: 4 });
        drop(tx);
        assert_eq!(logging::forward(rx).await, 2);
    }

    #[test]
    fn test_message_metadata() {
        let message = AppEvent::Install(InstallEvent::starting("sample"))
            .into_message()
            .with_correlation_id("job-1");
        assert_eq!(message.meta.source, EventSource::INSTALL);
        assert_eq!(message.meta.level, EventLevel::Info);
        assert_eq!(message.meta.correlation_id.as_deref(), Some("job-1"));
    }
}
