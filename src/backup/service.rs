//! Backup Service
//!
//! Exports the full live dataset to a new timestamped snapshot file. Exports
//! never touch existing snapshot files; only [`BackupService::prune`] deletes
//! them, and only when asked.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::live_store::LiveStore;
use crate::types::{BackupStats, EntityKind, SnapshotDocument, SnapshotInfo};
use crate::utils::{atomic_write, cleanup_temp_files};

use super::codec::SnapshotCodec;
use super::stats::{list_snapshot_files, StatsCollector, SNAPSHOT_EXTENSION};

/// A snapshot written by [`BackupService::export_all_data`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSnapshot {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
    pub document: SnapshotDocument,
}

/// File name for a snapshot captured at `captured_at`.
///
/// Names sort lexicographically in capture order; `sequence` separates
/// exports that land in the same millisecond.
pub fn snapshot_file_name(captured_at: DateTime<Utc>, sequence: u32) -> String {
    format!(
        "snapshot-{}-{:03}.{}",
        captured_at.format("%Y%m%dT%H%M%S%3fZ"),
        sequence,
        SNAPSHOT_EXTENSION
    )
}

/// Orchestrates full-dataset export and backup directory queries
pub struct BackupService {
    backup_dir: PathBuf,
    live: Arc<dyn LiveStore>,
    /// Serialises file name selection and publication
    export_lock: Mutex<()>,
}

impl BackupService {
    /// Open the service, creating the backup directory and removing temp
    /// files left by interrupted exports
    pub fn open<P: AsRef<Path>>(backup_dir: P, live: Arc<dyn LiveStore>) -> LifecycleResult<Self> {
        let backup_dir = backup_dir.as_ref().to_path_buf();
        fs::create_dir_all(&backup_dir).map_err(|e| LifecycleError::backup_io(&backup_dir, e))?;

        let cleaned =
            cleanup_temp_files(&backup_dir).map_err(|e| LifecycleError::backup_io(&backup_dir, e))?;
        if cleaned > 0 {
            warn!(count = cleaned, dir = %backup_dir.display(), "removed interrupted export files");
        }

        Ok(Self {
            backup_dir,
            live,
            export_lock: Mutex::new(()),
        })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Read the whole live store and publish it as a new snapshot file.
    ///
    /// The file appears under its final name only once it is complete and
    /// synced; on failure nothing is left in the backup directory.
    pub fn export_all_data(&self) -> LifecycleResult<ExportedSnapshot> {
        let _guard = self.export_lock.lock();

        let dataset = self.live.read_all()?;
        let document = SnapshotCodec::serialize(&dataset, Utc::now())?;
        let bytes = SnapshotCodec::encode(&document)?;

        let path = self.next_snapshot_path(document.captured_at);
        atomic_write(&path, &bytes).map_err(|e| LifecycleError::backup_io(&path, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(
            file = %file_name,
            curators = dataset.count(EntityKind::Curator),
            servers = dataset.count(EntityKind::Server),
            size = %BackupStats::format_size(bytes.len() as u64),
            "exported snapshot"
        );

        Ok(ExportedSnapshot {
            file_name,
            path,
            size_bytes: bytes.len() as u64,
            document,
        })
    }

    fn next_snapshot_path(&self, captured_at: DateTime<Utc>) -> PathBuf {
        let mut sequence = 0;
        loop {
            let path = self
                .backup_dir
                .join(snapshot_file_name(captured_at, sequence));
            if !path.exists() {
                return path;
            }
            sequence += 1;
        }
    }

    /// Snapshot files, oldest first
    pub fn list_snapshots(&self) -> LifecycleResult<Vec<SnapshotInfo>> {
        list_snapshot_files(&self.backup_dir)
    }

    /// Path of the newest snapshot file, by name
    pub fn latest_snapshot_path(&self) -> LifecycleResult<Option<PathBuf>> {
        Ok(self.list_snapshots()?.pop().map(|info| info.path))
    }

    /// Resolve a bare snapshot file name inside the backup directory
    pub fn snapshot_path(&self, file_name: &str) -> LifecycleResult<PathBuf> {
        let valid = !file_name.is_empty()
            && Path::new(file_name).file_name().and_then(|n| n.to_str()) == Some(file_name)
            && file_name.ends_with(&format!(".{}", SNAPSHOT_EXTENSION));
        if !valid {
            return Err(LifecycleError::InvalidSnapshotName(file_name.to_string()));
        }
        Ok(self.backup_dir.join(file_name))
    }

    /// Read and parse a snapshot file
    pub fn load_snapshot(&self, path: &Path) -> LifecycleResult<SnapshotDocument> {
        let raw = fs::read(path).map_err(|e| LifecycleError::backup_io(path, e))?;
        SnapshotCodec::deserialize(&raw)
    }

    /// Statistics for the backup directory
    pub fn get_backup_stats(&self) -> LifecycleResult<BackupStats> {
        StatsCollector::new(&self.backup_dir).collect()
    }

    /// Delete all but the newest `keep` snapshot files.
    ///
    /// Returns the names of the removed files.
    pub fn prune(&self, keep: usize) -> LifecycleResult<Vec<String>> {
        let _guard = self.export_lock.lock();

        let snapshots = self.list_snapshots()?;
        let excess = snapshots.len().saturating_sub(keep);
        let mut removed = Vec::with_capacity(excess);

        for info in snapshots.into_iter().take(excess) {
            fs::remove_file(&info.path).map_err(|e| LifecycleError::backup_io(&info.path, e))?;
            removed.push(info.file_name);
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), kept = keep, "pruned snapshots");
        }
        Ok(removed)
    }
}
