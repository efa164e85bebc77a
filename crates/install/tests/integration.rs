//! Integration tests for install crate

#[cfg(test)]
mod tests {
    use cpkg_errors::{Error, InstallError};
    use cpkg_events::{AppEvent, InstallEvent};
    use cpkg_install::*;
    use cpkg_store::{MemoryStore, TreeStore, VersionData, VersionKey};
    use cpkg_types::{
        iso, known, BehaviourOptions, CollisionClass, InstallMode, ItemId, Language, MergeMode,
        PackageEntry,
    };
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    const STANDARD: ItemId = ItemId::from_u128(0x5000);
    const TITLE: ItemId = ItemId::from_u128(0x6000);
    const HOME: ItemId = ItemId::from_u128(0x100);
    const OTHER: ItemId = ItemId::from_u128(0x101);
    const CHILD_A: ItemId = ItemId::from_u128(0x200);
    const CHILD_B: ItemId = ItemId::from_u128(0x201);
    const TEMPLATE: ItemId = ItemId::from_u128(0x300);
    const ITEM: ItemId = ItemId::from_u128(0x301);

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_database("master")
                .with_builtin_template(STANDARD),
        )
    }

    fn document(name: &str, template: ItemId, language: &str, fields: &[(ItemId, &str)]) -> String {
        let fields: Vec<_> = fields
            .iter()
            .map(|(id, value)| json!({ "id": id.to_string(), "value": value }))
            .collect();
        json!({
            "name": name,
            "tid": template.to_string(),
            "language": language,
            "version": 1,
            "fields": fields,
        })
        .to_string()
    }

    fn localized(path: &str, id: ItemId, template: ItemId, language: &str) -> PackageEntry {
        let name = path.rsplit('/').next().unwrap();
        PackageEntry::new(
            format!("master{path}/{id}/{language}/1/xml"),
            document(name, template, language, &[(TITLE, name)]),
        )
    }

    fn entry(path: &str, id: ItemId, template: ItemId) -> PackageEntry {
        localized(path, id, template, "en")
    }

    fn engine(store: &Arc<MemoryStore>) -> Engine {
        Engine::new(
            store.clone(),
            InstallContext::new().with_package("test".to_string()),
        )
    }

    fn en(number: u32) -> VersionKey {
        VersionKey::new(Language::Named("en".into()), number)
    }

    fn options(item_mode: InstallMode, merge_mode: MergeMode) -> BehaviourOptions {
        BehaviourOptions::new(item_mode, merge_mode)
    }

    #[test]
    fn test_template_before_item_installs_in_one_pass() {
        let store = store();
        let report = engine(&store)
            .install([
                entry("/sitecore/templates/Page", TEMPLATE, STANDARD),
                entry("/sitecore/content/Home", ITEM, TEMPLATE),
            ])
            .unwrap();

        assert_eq!(report.passes, 1);
        assert_eq!(report.postponed, 0);
        assert_eq!(report.written, 2);
        let item = store.get_by_id("master", ITEM).unwrap().unwrap();
        assert_eq!(item.template_id, TEMPLATE);
        assert_eq!(item.path, "/sitecore/content/Home");
    }

    #[test]
    fn test_item_before_template_fills_placeholder_in_second_pass() {
        let store = store();
        let resolver = Arc::new(ScriptedResolver::new([]));
        let report = engine(&store)
            .with_resolver(resolver.clone())
            .install([
                entry("/sitecore/content/Home", ITEM, TEMPLATE),
                entry("/sitecore/templates/Page", TEMPLATE, STANDARD),
            ])
            .unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.postponed, 1);
        assert_eq!(report.placeholders, 1);
        assert!(resolver.asked().is_empty());

        let version = store.get_version("master", ITEM, &en(1)).unwrap().unwrap();
        assert_eq!(version.field(TITLE), Some("Home"));
    }

    #[test]
    fn test_mutual_templates_are_a_structural_cycle() {
        let store = store();
        let a = ItemId::from_u128(0xA);
        let b = ItemId::from_u128(0xB);
        let err = engine(&store)
            .install([
                entry("/sitecore/templates/A", a, b),
                entry("/sitecore/templates/B", b, a),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Install(InstallError::StructuralCycle {
                pending: 2,
                passes: 2
            })
        ));
        assert!(!err.is_abort());
        // placeholders stay, nothing is rolled back
        assert!(store.get_by_id("master", a).unwrap().is_some());
        assert!(store.versions("master", a).unwrap().is_empty());
    }

    #[test]
    fn test_missing_template_fails_while_base_is_pending() {
        let store = store();
        let missing = ItemId::from_u128(0xDEAD);
        let home = PackageEntry::new(
            format!("master/sitecore/content/Home/{ITEM}/en/1/xml"),
            json!({
                "name": "Home",
                "tid": missing.to_string(),
                "bases": [TEMPLATE.to_string()],
                "language": "en",
                "version": 1,
                "fields": [],
            })
            .to_string(),
        );
        let err = engine(&store)
            .install([home, entry("/sitecore/templates/Base", TEMPLATE, STANDARD)])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Install(InstallError::MissingTemplate { .. })
        ));
        assert!(store.get_by_id("master", ITEM).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_prunes_children_missing_from_package() {
        let store = store();
        let parent = store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();
        store
            .add_item("master", &parent.path, CHILD_A, "A", STANDARD)
            .unwrap();
        store
            .add_item("master", &parent.path, CHILD_B, "B", STANDARD)
            .unwrap();

        let report = engine(&store)
            .install([
                entry("/sitecore/content/Home", HOME, STANDARD)
                    .with_hint("idcollision.itemmode", "overwrite"),
                entry("/sitecore/content/Home/A", CHILD_A, STANDARD),
            ])
            .unwrap();

        assert_eq!(
            report.finish.drained.deleted,
            vec![NodeKey::new("master", CHILD_B)]
        );
        assert!(store.get_by_id("master", CHILD_A).unwrap().is_some());
        assert!(store.get_by_id("master", CHILD_B).unwrap().is_none());
    }

    #[test]
    fn test_child_installed_before_overwritten_parent_is_kept() {
        let store = store();
        let parent = store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();
        store
            .add_item("master", &parent.path, CHILD_A, "A", STANDARD)
            .unwrap();

        let report = engine(&store)
            .install([
                entry("/sitecore/content/Home/A", CHILD_A, STANDARD),
                entry("/sitecore/content/Home", HOME, STANDARD)
                    .with_hint("idcollision.itemmode", "overwrite"),
            ])
            .unwrap();

        assert!(report.finish.drained.deleted.is_empty());
        assert!(store.get_by_id("master", CHILD_A).unwrap().is_some());
    }

    #[test]
    fn test_failed_run_does_not_prune() {
        let store = store();
        let parent = store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();
        store
            .add_item("master", &parent.path, CHILD_B, "B", STANDARD)
            .unwrap();

        let missing = ItemId::from_u128(0xDEAD);
        let err = engine(&store)
            .install([
                entry("/sitecore/content/Home", HOME, STANDARD)
                    .with_hint("idcollision.itemmode", "overwrite"),
                entry("/sitecore/content/Broken", ITEM, missing),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Install(InstallError::MissingTemplate { .. })
        ));
        assert!(store.get_by_id("master", CHILD_B).unwrap().is_some());
    }

    #[test]
    fn test_collision_classes_reach_the_resolver() {
        let store = store();
        store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();
        store
            .add_item("master", "/sitecore/content", OTHER, "About", STANDARD)
            .unwrap();

        let merge = options(InstallMode::Merge, MergeMode::Append);
        let resolver = Arc::new(ScriptedResolver::new([
            Some(Resolution::once(merge)),
            Some(Resolution::once(merge)),
        ]));
        engine(&store)
            .with_resolver(resolver.clone())
            .install([
                entry("/sitecore/content/Home", HOME, STANDARD),
                entry("/sitecore/content/About", ItemId::from_u128(0x999), STANDARD),
            ])
            .unwrap();

        let classes: Vec<_> = resolver.asked().into_iter().map(|(_, class)| class).collect();
        assert_eq!(
            classes,
            vec![CollisionClass::IdCollision, CollisionClass::PathCollision]
        );
    }

    #[test]
    fn test_apply_to_all_is_remembered_per_class() {
        let store = store();
        for (id, name) in [(HOME, "Home"), (OTHER, "About")] {
            store
                .add_item("master", "/sitecore/content", id, name, STANDARD)
                .unwrap();
        }

        let resolver = Arc::new(ScriptedResolver::new([Some(Resolution::for_all(options(
            InstallMode::Skip,
            MergeMode::Undefined,
        )))]));
        let report = engine(&store)
            .with_resolver(resolver.clone())
            .install([
                entry("/sitecore/content/Home", HOME, STANDARD),
                entry("/sitecore/content/About", OTHER, STANDARD),
            ])
            .unwrap();

        assert_eq!(resolver.asked().len(), 1);
        assert_eq!(report.skipped, 2);
        assert!(store.versions("master", HOME).unwrap().is_empty());
    }

    #[test]
    fn test_languages_of_one_item_reuse_the_decision() {
        let store = store();
        store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();

        let resolver = Arc::new(ScriptedResolver::new([Some(Resolution::once(options(
            InstallMode::Merge,
            MergeMode::Merge,
        )))]));
        engine(&store)
            .with_resolver(resolver.clone())
            .install([
                localized("/sitecore/content/Home", HOME, STANDARD, "en"),
                localized("/sitecore/content/Home", HOME, STANDARD, "de"),
            ])
            .unwrap();

        assert_eq!(resolver.asked().len(), 1);
        assert_eq!(store.versions("master", HOME).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_clear_replaces_versions() {
        let store = store();
        store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();
        for number in [1, 2] {
            store
                .commit_version("master", HOME, &VersionData::new(Language::Named("en".into()), number))
                .unwrap();
        }
        store
            .commit_version("master", HOME, &VersionData::new(Language::Named("de".into()), 1))
            .unwrap();

        engine(&store)
            .install([entry("/sitecore/content/Home", HOME, STANDARD)])
            .unwrap();

        let versions = store.versions("master", HOME).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].key(), en(1));
    }

    #[test]
    fn test_overwrite_by_path_replaces_the_node() {
        let store = store();
        store
            .add_item("master", "/sitecore/content", OTHER, "Home", STANDARD)
            .unwrap();

        engine(&store)
            .install([entry("/sitecore/content/Home", HOME, STANDARD)
                .with_hint("pathcollision.itemmode", "overwrite")])
            .unwrap();

        assert!(store.get_by_id("master", OTHER).unwrap().is_none());
        let node = store.get_by_id("master", HOME).unwrap().unwrap();
        assert_eq!(node.path, "/sitecore/content/Home");
    }

    #[test]
    fn test_side_by_side_keeps_both_nodes() {
        let store = store();
        let content = store
            .ensure_path("master", "/sitecore/content")
            .unwrap()
            .unwrap();
        store
            .add_item("master", "/sitecore/content", OTHER, "Home", STANDARD)
            .unwrap();

        engine(&store)
            .install([entry("/sitecore/content/Home", HOME, STANDARD)
                .with_hint("pathcollision.itemmode", "sidebyside")])
            .unwrap();

        let homes = store
            .children("master", content.id)
            .unwrap()
            .into_iter()
            .filter(|node| node.name == "Home")
            .count();
        assert_eq!(homes, 2);
        assert!(store.get_version("master", HOME, &en(1)).unwrap().is_some());
        assert!(store.versions("master", OTHER).unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_moves_node_to_package_path() {
        let store = store();
        store
            .add_item("master", "/sitecore/content/Old", HOME, "Home", STANDARD)
            .unwrap();

        engine(&store)
            .install([entry("/sitecore/content/New/Home", HOME, STANDARD)
                .with_hint("idcollision.itemmode", "overwrite")])
            .unwrap();

        let node = store.get_by_id("master", HOME).unwrap().unwrap();
        assert_eq!(node.path, "/sitecore/content/New/Home");
    }

    #[test]
    fn test_declined_resolution_aborts() {
        let store = store();
        store
            .add_item("master", "/sitecore/content", HOME, "Home", STANDARD)
            .unwrap();
        let (tx, mut rx) = cpkg_events::channel();

        let err = Engine::new(
            store.clone(),
            InstallContext::new().with_event_sender(tx),
        )
        .with_resolver(Arc::new(ScriptedResolver::new([])))
        .install([entry("/sitecore/content/Home", HOME, STANDARD)])
        .unwrap_err();

        assert!(err.is_abort());
        let mut aborted = None;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Install(InstallEvent::Aborted { cursor, key }) = event {
                aborted = Some((cursor, key));
            }
        }
        let (cursor, key) = aborted.unwrap();
        assert_eq!(cursor, 1);
        assert!(key.unwrap().contains("Home"));
    }

    #[test]
    fn test_cancelled_token_stops_before_first_entry() {
        let store = store();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Engine::new(store.clone(), InstallContext::new().with_cancel(cancel))
            .install([entry("/sitecore/content/Home", HOME, STANDARD)])
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(store.get_by_id("master", HOME).unwrap().is_none());
    }

    #[test]
    fn test_invalid_keys_are_skipped() {
        let store = store();
        let report = engine(&store)
            .install([
                PackageEntry::new("master/not-a-key", "{}"),
                entry("/sitecore/content/Home", HOME, STANDARD),
            ])
            .unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(report.queued, 1);
    }

    #[test]
    fn test_future_statistics_are_clamped() {
        let store = store();
        let future = "29991231T235959Z";
        let entry = PackageEntry::new(
            format!("master/sitecore/content/Home/{HOME}/en/1/xml"),
            document(
                "Home",
                STANDARD,
                "en",
                &[(known::CREATED_FIELD, future), (known::UPDATED_FIELD, future)],
            ),
        );
        engine(&store).install([entry]).unwrap();

        let version = store.get_version("master", HOME, &en(1)).unwrap().unwrap();
        let now = chrono::Utc::now();
        for field in [known::CREATED_FIELD, known::UPDATED_FIELD] {
            assert!(iso::parse(version.field(field).unwrap()).unwrap() <= now);
        }
    }

    #[test]
    fn test_lifecycle_events_and_progress() {
        let store = store();
        let (tx, mut rx) = cpkg_events::channel();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let context = InstallContext::new()
            .with_event_sender(tx)
            .on_progress(move |cursor, _key| sink.lock().unwrap().push(cursor));

        Engine::new(store.clone(), context)
            .install([
                entry("/sitecore/content/Home", ITEM, TEMPLATE),
                entry("/sitecore/templates/Page", TEMPLATE, STANDARD),
            ])
            .unwrap();

        let mut names = Vec::new();
        while let Ok(AppEvent::Install(event)) = rx.try_recv() {
            names.push(match event {
                InstallEvent::ItemsStarting { .. } => "items_starting",
                InstallEvent::ItemPostponed { .. } => "postponed",
                InstallEvent::ItemInstalling { .. } => "installing",
                InstallEvent::ItemsEnded { .. } => "items_ended",
                _ => "other",
            });
        }
        assert_eq!(
            names,
            vec![
                "items_starting",
                "postponed",
                "installing",
                "items_starting",
                "installing",
                "items_ended"
            ]
        );
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_engine_runs_on_blocking_pool() {
        let store = store();
        let shared = store.clone();
        let report = tokio::task::spawn_blocking(move || {
            engine(&shared).install([entry("/sitecore/content/Home", HOME, STANDARD)])
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(report.written, 1);
        assert!(store.get_by_id("master", HOME).unwrap().is_some());
    }

    fn chain(depth: usize) -> Vec<PackageEntry> {
        let id = |level: usize| ItemId::from_u128(0x1000 + level as u128);
        (0..=depth)
            .map(|level| {
                let template = if level == 0 { STANDARD } else { id(level - 1) };
                entry(&format!("/sitecore/templates/N{level}"), id(level), template)
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_dependency_chain_terminates_within_depth_plus_one(
            entries in (1usize..6).prop_flat_map(|depth| Just(chain(depth)).prop_shuffle())
        ) {
            let depth = entries.len() - 1;
            let store = store();
            let report = engine(&store).install(entries).unwrap();
            prop_assert!(report.passes <= depth + 1);
            prop_assert_eq!(report.written, depth + 1);
        }
    }
}
