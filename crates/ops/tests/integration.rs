//! Integration tests for ops crate

#[cfg(test)]
mod tests {
    use cpkg_config::Config;
    use cpkg_errors::{Error, InstallError};
    use cpkg_events::{AppEvent, EventReceiver, GeneralEvent, InstallEvent, RunOutcome};
    use cpkg_ops::*;
    use cpkg_store::{MemoryStore, TreeStore};
    use cpkg_types::{ItemId, PackageEntry, PackageMetadata};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    const STANDARD: ItemId = ItemId::from_u128(0x5000);
    const TEMPLATE: ItemId = ItemId::from_u128(0x300);
    const ITEM: ItemId = ItemId::from_u128(0x301);

    fn store() -> Arc<MemoryStore> {
        let registration = Config::default().registration;
        Arc::new(
            MemoryStore::new()
                .with_database("master")
                .with_database("core")
                .with_builtin_template(STANDARD)
                .with_builtin_template(registration.node_template)
                .with_builtin_template(registration.registration_template),
        )
    }

    fn item(path: &str, id: ItemId, template: ItemId) -> PackageEntry {
        let name = path.rsplit('/').next().unwrap();
        PackageEntry::new(
            format!("items/master{path}/{id}/en/1/xml"),
            json!({
                "name": name,
                "tid": template.to_string(),
                "language": "en",
                "version": 1,
                "fields": [],
            })
            .to_string(),
        )
    }

    fn package() -> Vec<PackageEntry> {
        vec![
            PackageEntry::new("metadata/sc_name.txt", "Sample: Package"),
            PackageEntry::new("metadata/sc_version.txt", "1.2"),
            PackageEntry::new("metadata/sc_poststep.txt", "reindex"),
            item("/sitecore/content/Home", ITEM, TEMPLATE),
            item("/sitecore/templates/Page", TEMPLATE, STANDARD),
            PackageEntry::new("files/bin/Sample.dll", ""),
        ]
    }

    fn drain(rx: &mut EventReceiver) -> Vec<InstallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Install(event) = event {
                events.push(event);
            }
        }
        events
    }

    fn counting_steps(calls: &Arc<AtomicUsize>) -> PostStepRegistry {
        let calls = Arc::clone(calls);
        PostStepRegistry::new().with_step(
            "reindex",
            move |metadata: &PackageMetadata| -> Result<(), Error> {
                assert_eq!(metadata.version, "1.2");
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    }

    #[tokio::test]
    async fn test_package_pipeline_runs_in_order() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = cpkg_events::channel();
        let session = InstallSession::new(store.clone(), Config::default())
            .with_post_steps(counting_steps(&calls))
            .with_event_sender(tx);

        let report = session
            .install("sample.zip", package(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.package, "sample.zip");
        assert_eq!(report.metadata.package_name, "Sample: Package");
        assert_eq!(report.items.passes, 2);
        assert_eq!(report.items.written, 2);
        assert_eq!(report.ignored, vec!["files/bin/Sample.dll".to_string()]);
        assert_eq!(report.post_step.as_deref(), Some("reindex"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get_by_id("master", ITEM).unwrap().is_some());

        let record = report.registration.unwrap();
        assert!(record
            .path
            .starts_with("/sitecore/system/Packages/Installation history/Sample Package/"));
        let versions = store.versions("core", record.id).unwrap();
        assert_eq!(
            versions[0].field(registration_fields::PACKAGE_NAME),
            Some("Sample: Package")
        );

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(InstallEvent::Starting { .. })));
        assert!(matches!(
            events.last(),
            Some(InstallEvent::Ended {
                outcome: RunOutcome::Completed,
                ..
            })
        ));
        let items_ended = events
            .iter()
            .position(|e| matches!(e, InstallEvent::ItemsEnded { .. }))
            .unwrap();
        let post_step = events
            .iter()
            .position(|e| matches!(e, InstallEvent::PostStepStarting { .. }))
            .unwrap();
        assert!(items_ended < post_step);
    }

    #[tokio::test]
    async fn test_skipped_parts_are_reported_as_warnings() {
        let store = Arc::new(
            MemoryStore::new()
                .with_database("master")
                .with_builtin_template(STANDARD),
        );
        let (tx, mut rx) = cpkg_events::channel();
        let session = InstallSession::new(store, Config::default()).with_event_sender(tx);

        let report = session
            .install("sample.zip", package(), CancellationToken::new())
            .await
            .unwrap();
        assert!(report.registration.is_none());

        let mut warnings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::General(GeneralEvent::Warning { message, context }) = event {
                warnings.push((message, context));
            }
        }
        assert!(warnings
            .iter()
            .any(|(_, context)| context.as_deref() == Some("files/bin/Sample.dll")));
        assert!(warnings
            .iter()
            .any(|(_, context)| context.as_deref() == Some("reindex")));
        assert!(warnings
            .iter()
            .any(|(message, _)| message.contains("not be registered")));
    }

    #[tokio::test]
    async fn test_registration_can_be_disabled_from_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[install]\nregister_installation = false\n\n[monitor]\npoll_interval_ms = 5\n",
        )
        .unwrap();

        let store = store();
        let session = InstallSession::load(store.clone(), Some(&path)).await.unwrap();
        assert_eq!(session.config().monitor.poll_interval_ms, 5);

        let report = session
            .install("sample.zip", package(), CancellationToken::new())
            .await
            .unwrap();
        assert!(report.registration.is_none());
        assert_eq!(store.node_count("core"), 1);
        // no handler registered for the post step
        assert_eq!(report.post_step, None);
    }

    #[tokio::test]
    async fn test_failed_installation_emits_failure() {
        let store = store();
        let (tx, mut rx) = cpkg_events::channel();
        let session = InstallSession::new(store.clone(), Config::default()).with_event_sender(tx);
        let entries = vec![item(
            "/sitecore/content/Broken",
            ITEM,
            ItemId::from_u128(0xDEAD),
        )];

        let err = session
            .install("broken.zip", entries, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::MissingTemplate { .. })
        ));

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, InstallEvent::Failed { .. })));
        assert!(matches!(
            events.last(),
            Some(InstallEvent::Ended {
                outcome: RunOutcome::Failed,
                ..
            })
        ));
        assert_eq!(store.node_count("core"), 1);
    }

    #[tokio::test]
    async fn test_cancelled_installation_is_aborted() {
        let store = store();
        let (tx, mut rx) = cpkg_events::channel();
        let session = InstallSession::new(store.clone(), Config::default()).with_event_sender(tx);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let job = session.start("sample.zip", package(), cancel).await;
        let status = job.subscribe();
        let err = job
            .monitor(std::time::Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(status.borrow().state, JobState::Aborted);
        assert!(store.get_by_id("master", ITEM).unwrap().is_none());

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, InstallEvent::Failed { .. })));
        assert!(matches!(
            events.last(),
            Some(InstallEvent::Ended {
                outcome: RunOutcome::Aborted,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_serializes_installations() {
        let store = store();
        let (tx, mut rx) = cpkg_events::channel();
        let session = InstallSession::new(store, Config::default()).with_event_sender(tx);

        let first = session.clone();
        let second = session.clone();
        let (a, b) = tokio::join!(
            first.install("a.zip", package(), CancellationToken::new()),
            second.install("b.zip", package(), CancellationToken::new()),
        );
        a.unwrap();
        b.unwrap();

        let mut open: Option<String> = None;
        for event in drain(&mut rx) {
            match event {
                InstallEvent::Starting { package } => {
                    assert!(open.is_none(), "{package} started while another ran");
                    open = Some(package);
                }
                InstallEvent::Ended { package, .. } => {
                    assert_eq!(open.take(), Some(package));
                }
                _ => {}
            }
        }
        assert!(open.is_none());
    }

    #[tokio::test]
    async fn test_job_status_tracks_cursor() {
        let store = store();
        let session = InstallSession::new(store, Config::default());
        let job = session
            .start("sample.zip", package(), CancellationToken::new())
            .await;
        let status = job.subscribe();
        job.monitor(std::time::Duration::from_millis(1))
            .await
            .unwrap();

        let status = status.borrow().clone();
        assert_eq!(status.state, JobState::Finished);
        // two entries in the first pass, one retried in the second
        assert_eq!(status.cursor, 3);
        assert!(status.current_key.unwrap().contains("Home"));
    }
}
