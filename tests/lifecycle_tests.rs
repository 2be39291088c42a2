//! Data Lifecycle Integration Tests
//!
//! End-to-end flows through `DataLifecycle`:
//! - Export, delete-and-archive and import round trips
//! - Archive exclusion and live-record preservation on import
//! - Failure atomicity of delete-and-archive
//! - Stats over a backup directory with corrupt files
//! - Concurrent deletes and imports on the same keys

use std::fs;
use std::sync::Arc;
use std::thread;

use serde_json::json;
use tempfile::TempDir;

use curator_archive::lifecycle::{DataLifecycle, ImportSource};
use curator_archive::types::{
    ArchivePolicy, Curator, EntityKind, LiveDataset, LiveEntity, NaturalKey, Server,
};
use curator_archive::{LifecycleConfig, LifecycleError, SnapshotCodec};

fn open_lifecycle(temp_dir: &TempDir) -> DataLifecycle {
    DataLifecycle::open(LifecycleConfig::new(temp_dir.path())).expect("Failed to open lifecycle")
}

fn curator_name(lifecycle: &DataLifecycle, discord_id: &str) -> Option<String> {
    match lifecycle.live().get(EntityKind::Curator, discord_id).unwrap() {
        Some(LiveEntity::Curator(c)) => Some(c.name),
        Some(other) => panic!("unexpected entity {:?}", other),
        None => None,
    }
}

/// Every live entity as its field map, internal ids removed
fn records_without_ids(dataset: &LiveDataset) -> Vec<serde_json::Value> {
    EntityKind::ALL
        .iter()
        .flat_map(|kind| dataset.entities(*kind))
        .map(|mut entity| {
            entity.set_internal_id(None);
            serde_json::Value::Object(entity.to_fields().unwrap())
        })
        .collect()
}

// ============================================================================
// End-to-end flows
// ============================================================================

#[test]
fn test_deleted_curator_is_not_restored_by_import() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    lifecycle
        .live()
        .insert(Curator::new("111", "A").into())
        .unwrap();

    let s1 = lifecycle.export_all_data().expect("Export failed");
    assert_eq!(s1.document.curators.len(), 1);
    assert_eq!(s1.document.curators[0]["discordId"], "111");

    lifecycle
        .delete_and_archive(EntityKind::Curator, "111")
        .expect("Delete failed");

    let report = lifecycle
        .import_from(ImportSource::File(s1.path))
        .expect("Import failed");

    assert_eq!(report.curators.excluded_archived, 1);
    assert_eq!(report.curators.imported, 0);
    assert!(curator_name(&lifecycle, "111").is_none());
}

#[test]
fn test_stale_snapshot_does_not_overwrite_edit() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    lifecycle
        .live()
        .insert(Curator::new("222", "B").into())
        .unwrap();

    let stale = lifecycle.export_all_data().unwrap();
    lifecycle
        .live()
        .update(Curator::new("222", "B2").into())
        .unwrap();

    let report = lifecycle
        .import_from(ImportSource::Document(stale.document))
        .unwrap();

    assert_eq!(report.curators.skipped_existing, 1);
    assert_eq!(curator_name(&lifecycle, "222").as_deref(), Some("B2"));
}

#[test]
fn test_new_curator_is_imported() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);

    let raw = json!({
        "version": 1,
        "capturedAt": 1704067200000u64,
        "curators": [{"discordId": "333", "name": "C"}],
        "servers": []
    });
    let report = lifecycle
        .import_from(ImportSource::Bytes(serde_json::to_vec(&raw).unwrap()))
        .unwrap();

    assert_eq!(report.curators.imported, 1);
    assert_eq!(curator_name(&lifecycle, "333").as_deref(), Some("C"));
}

#[test]
fn test_stats_skip_truncated_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    lifecycle
        .live()
        .insert(Curator::new("111", "A").into())
        .unwrap();

    let first = lifecycle.export_all_data().unwrap();
    lifecycle
        .live()
        .insert(Server::new("s1", "Guild").owned_by("111").into())
        .unwrap();
    lifecycle.export_all_data().unwrap();

    let bytes = fs::read(&first.path).unwrap();
    let truncated = lifecycle.backups().backup_dir().join("snapshot-zz-truncated.json");
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

    let stats = lifecycle.backup_stats().expect("Stats must not fail on corrupt files");

    assert_eq!(stats.snapshot_count, 2);
    assert_eq!(stats.corrupt, 1);
    assert_eq!(stats.counts_by_type[&EntityKind::Curator], 2);
    assert_eq!(stats.counts_by_type[&EntityKind::Server], 1);
    let latest = stats.latest.expect("latest snapshot");
    assert_eq!(latest.counts[&EntityKind::Server], 1);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_archived_keys_never_imported() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    for id in ["1", "2", "3", "4"] {
        lifecycle
            .live()
            .insert(Curator::new(id, format!("curator {}", id)).into())
            .unwrap();
    }
    lifecycle
        .live()
        .insert(Server::new("s1", "G").owned_by("1").into())
        .unwrap();
    let snapshot = lifecycle.export_all_data().unwrap();

    lifecycle.delete_and_archive(EntityKind::Curator, "2").unwrap();
    lifecycle.delete_and_archive(EntityKind::Server, "s1").unwrap();
    lifecycle.delete_and_archive(EntityKind::Curator, "4").unwrap();

    for _ in 0..2 {
        lifecycle
            .import_from(ImportSource::Document(snapshot.document.clone()))
            .unwrap();
        for record in lifecycle.archive().get_all() {
            assert!(!lifecycle.live().contains(record.kind, &record.key).unwrap());
        }
    }
}

#[test]
fn test_live_records_identical_after_import() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    lifecycle
        .live()
        .insert(Curator::new("111", "Live").with_rating(5).into())
        .unwrap();

    let before = lifecycle.live().get(EntityKind::Curator, "111").unwrap();

    let hostile = json!({
        "version": 1,
        "capturedAt": "2024-01-01T00:00:00Z",
        "curators": [{"id": 99, "discordId": "111", "name": "Other", "rating": 1, "status": "inactive"}],
        "servers": []
    });
    lifecycle
        .import_from(ImportSource::Bytes(serde_json::to_vec(&hostile).unwrap()))
        .unwrap();

    let after = lifecycle.live().get(EntityKind::Curator, "111").unwrap();
    assert_eq!(
        serde_json::to_vec(&before).unwrap(),
        serde_json::to_vec(&after).unwrap()
    );
}

#[test]
fn test_repeated_exports_have_equal_content() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    lifecycle
        .live()
        .insert(Curator::new("111", "A").into())
        .unwrap();
    lifecycle
        .live()
        .insert(Server::new("s1", "G").owned_by("111").into())
        .unwrap();

    let a = lifecycle.export_all_data().unwrap();
    let b = lifecycle.export_all_data().unwrap();

    assert_ne!(a.file_name, b.file_name);
    assert!(a.document.same_content(&b.document));
}

#[test]
fn test_codec_round_trip_through_files() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    let mut curator = Curator::new("111", "A").with_rating(3);
    curator.extra.insert("timezone".to_string(), json!("UTC+2"));
    lifecycle.live().insert(curator.into()).unwrap();
    lifecycle
        .live()
        .insert(Server::new("s1", "G").owned_by("111").into())
        .unwrap();

    let dataset: LiveDataset = lifecycle.live().read_all().unwrap();
    let exported = lifecycle.export_all_data().unwrap();
    let decoded = SnapshotCodec::deserialize(&fs::read(&exported.path).unwrap()).unwrap();

    let again = SnapshotCodec::serialize(&dataset, decoded.captured_at).unwrap();
    assert_eq!(decoded, again);
    assert_eq!(decoded.curators[0]["timezone"], "UTC+2");
}

#[test]
fn test_failed_archive_write_keeps_live_entity() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    lifecycle
        .live()
        .insert(Curator::new("111", "A").into())
        .unwrap();

    // A directory where the archive log should be makes every append fail
    fs::create_dir_all(lifecycle.archive().log_path()).unwrap();

    let result = lifecycle.delete_and_archive(EntityKind::Curator, "111");

    assert!(matches!(result, Err(LifecycleError::ArchiveWriteFailed { .. })));
    assert_eq!(curator_name(&lifecycle, "111").as_deref(), Some("A"));
    assert!(!lifecycle
        .archive()
        .contains_key(&NaturalKey::new(EntityKind::Curator, "111")));
}

// ============================================================================
// Persistence, policy and sources
// ============================================================================

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let lifecycle = open_lifecycle(&temp_dir);
        lifecycle
            .live()
            .insert(Curator::new("111", "A").into())
            .unwrap();
        lifecycle
            .live()
            .insert(Curator::new("222", "B").into())
            .unwrap();
        lifecycle.export_all_data().unwrap();
        lifecycle.delete_and_archive(EntityKind::Curator, "111").unwrap();
    }

    let lifecycle = open_lifecycle(&temp_dir);
    assert!(curator_name(&lifecycle, "111").is_none());
    assert_eq!(curator_name(&lifecycle, "222").as_deref(), Some("B"));
    assert_eq!(lifecycle.archive().len(), 1);

    let report = lifecycle.import_from(ImportSource::Latest).unwrap();
    assert_eq!(report.curators.excluded_archived, 1);
    assert_eq!(report.curators.skipped_existing, 1);
}

#[test]
fn test_first_wins_policy_keeps_original_record() {
    let temp_dir = TempDir::new().unwrap();
    let config = LifecycleConfig::new(temp_dir.path()).with_archive_policy(ArchivePolicy::FirstWins);
    let lifecycle = DataLifecycle::open(config).unwrap();

    lifecycle
        .live()
        .insert(Curator::new("111", "First").into())
        .unwrap();
    lifecycle.delete_and_archive(EntityKind::Curator, "111").unwrap();

    // Recreated through normal CRUD, then deleted again
    lifecycle
        .live()
        .insert(Curator::new("111", "Second").into())
        .unwrap();
    let record = lifecycle.delete_and_archive(EntityKind::Curator, "111").unwrap();

    assert_eq!(record.fields["name"], "First");
    assert_eq!(lifecycle.archive().len(), 1);
    assert!(curator_name(&lifecycle, "111").is_none());
}

#[test]
fn test_latest_wins_policy_replaces_record() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);

    lifecycle
        .live()
        .insert(Curator::new("111", "First").into())
        .unwrap();
    lifecycle.delete_and_archive(EntityKind::Curator, "111").unwrap();
    lifecycle
        .live()
        .insert(Curator::new("111", "Second").into())
        .unwrap();
    lifecycle.delete_and_archive(EntityKind::Curator, "111").unwrap();

    let record = lifecycle
        .archive()
        .get(&NaturalKey::new(EntityKind::Curator, "111"))
        .unwrap();
    assert_eq!(record.fields["name"], "Second");
    assert_eq!(lifecycle.archive().len(), 1);
}

#[test]
fn test_import_malformed_file_has_no_effect() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);
    let path = temp_dir.path().join("upload.json");
    fs::write(&path, r#"{"version": 1, "curators": [{"discordId": "1", "name": "A"}]}"#).unwrap();

    let result = lifecycle.import_from(ImportSource::File(path));

    assert!(matches!(result, Err(LifecycleError::MalformedSnapshot(_))));
    assert!(lifecycle.live().list(EntityKind::Curator).unwrap().is_empty());
}

#[test]
fn test_import_missing_file_is_backup_io() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);

    let result = lifecycle.import_from(ImportSource::File(temp_dir.path().join("nope.json")));
    assert!(matches!(result, Err(LifecycleError::BackupIo { .. })));
}

#[test]
fn test_import_reports_rejections_and_continues() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = open_lifecycle(&temp_dir);

    let raw = json!({
        "version": 1,
        "capturedAt": "2024-01-01T00:00:00.000Z",
        "curators": [
            {"discordId": "1", "name": "A"},
            {"name": "no key"},
            {"discordId": 5, "name": "numeric key"},
            {"discordId": "2", "name": "B", "rating": "high"}
        ],
        "servers": [
            {"serverId": "s1", "name": "G", "curatorId": "1"},
            {"serverId": "s2", "name": "H", "curatorId": "ghost"}
        ]
    });
    let report = lifecycle
        .import_from(ImportSource::Bytes(serde_json::to_vec(&raw).unwrap()))
        .unwrap();

    assert_eq!(report.curators.imported, 1);
    assert_eq!(report.curators.rejected, 3);
    // Server references are not validated
    assert_eq!(report.servers.imported, 2);
    assert_eq!(report.servers.rejected, 0);
    assert_eq!(report.rejections.len(), 3);
    assert_eq!(report.totals().total(), 6);
}

#[test]
fn test_restore_into_empty_store_matches_source() {
    let source_dir = TempDir::new().unwrap();
    let source = open_lifecycle(&source_dir);
    let mut curator = Curator::new("111", "A").with_rating(3);
    curator.extra.insert("timezone".to_string(), json!("UTC+2"));
    source.live().insert(curator.into()).unwrap();
    source.live().insert(Curator::new("222", "B").into()).unwrap();
    source.live().insert(Curator::new("333", "C").into()).unwrap();
    for (server_id, owner) in [("s1", "111"), ("s2", "222"), ("s3", "333")] {
        source
            .live()
            .insert(Server::new(server_id, "G").owned_by(owner).into())
            .unwrap();
    }
    // s2 stays live after its curator is archived
    source.delete_and_archive(EntityKind::Curator, "222").unwrap();
    let exported = source.export_all_data().unwrap();

    let target_dir = TempDir::new().unwrap();
    let target = open_lifecycle(&target_dir);
    let report = target
        .import_from(ImportSource::File(exported.path.clone()))
        .expect("Failed to restore snapshot");

    assert_eq!(report.curators.imported, 2);
    assert_eq!(report.servers.imported, 3);
    assert!(report.rejections.is_empty());

    let expected = source.live().read_all().unwrap();
    let restored = target.live().read_all().unwrap();
    assert_eq!(records_without_ids(&restored), records_without_ids(&expected));

    // Survives a restart of the restored store
    drop(target);
    let reopened = open_lifecycle(&target_dir);
    let reloaded = reopened.live().read_all().unwrap();
    assert_eq!(records_without_ids(&reloaded), records_without_ids(&expected));
    assert!(reopened
        .live()
        .contains(EntityKind::Server, "s2")
        .unwrap());
}

#[test]
fn test_unknown_fields_survive_import_reopen_and_export() {
    let temp_dir = TempDir::new().unwrap();
    let raw = json!({
        "version": 1,
        "capturedAt": "2024-01-01T00:00:00Z",
        "curators": [{"discordId": "333", "name": "C", "kind": "moderator", "timezone": "UTC"}],
        "servers": [{"serverId": "s1", "name": "G", "curatorId": "333", "kind": "community"}]
    });
    {
        let lifecycle = open_lifecycle(&temp_dir);
        let report = lifecycle
            .import_from(ImportSource::Bytes(serde_json::to_vec(&raw).unwrap()))
            .unwrap();
        assert_eq!(report.totals().imported, 2);
    }

    let lifecycle = open_lifecycle(&temp_dir);
    let curator = lifecycle
        .live()
        .get(EntityKind::Curator, "333")
        .unwrap()
        .expect("curator lost after reopen");
    let fields = curator.to_fields().unwrap();
    assert_eq!(fields["kind"], "moderator");
    assert_eq!(fields["timezone"], "UTC");
    assert!(lifecycle.live().contains(EntityKind::Server, "s1").unwrap());

    let exported = lifecycle.export_all_data().unwrap();
    assert_eq!(exported.document.curators[0]["kind"], "moderator");
    assert_eq!(exported.document.servers[0]["kind"], "community");
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_delete_and_import_never_resurrects() {
    let temp_dir = TempDir::new().unwrap();
    let lifecycle = Arc::new(open_lifecycle(&temp_dir));

    let ids: Vec<String> = (0..50).map(|i| format!("{}", 1000 + i)).collect();
    for id in &ids {
        lifecycle
            .live()
            .insert(Curator::new(id.as_str(), "C").into())
            .unwrap();
    }
    let snapshot = lifecycle.export_all_data().unwrap().document;

    let deleter = {
        let lifecycle = lifecycle.clone();
        let ids = ids.clone();
        thread::spawn(move || {
            for id in &ids {
                lifecycle
                    .delete_and_archive(EntityKind::Curator, id)
                    .expect("Delete failed");
            }
        })
    };

    let importers: Vec<_> = (0..3)
        .map(|_| {
            let lifecycle = lifecycle.clone();
            let snapshot = snapshot.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    lifecycle
                        .import_from(ImportSource::Document(snapshot.clone()))
                        .expect("Import failed");
                }
            })
        })
        .collect();

    deleter.join().unwrap();
    for importer in importers {
        importer.join().unwrap();
    }

    assert_eq!(lifecycle.archive().len(), ids.len());
    assert!(lifecycle.live().list(EntityKind::Curator).unwrap().is_empty());

    let report = lifecycle
        .import_from(ImportSource::Document(snapshot))
        .unwrap();
    assert_eq!(report.curators.excluded_archived, ids.len());
}
