//! Backup Statistics
//!
//! Stats are never stored; every call rescans the backup directory. Only
//! snapshot headers are parsed. Files that cannot be read or parsed (for
//! instance an export still being written elsewhere, or a truncated copy)
//! are counted as corrupt and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{BackupStats, SnapshotInfo, SnapshotSummary};

use super::codec::SnapshotCodec;

/// Extension of published snapshot files
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Collector for backup directory statistics
pub struct StatsCollector {
    backup_dir: PathBuf,
}

impl StatsCollector {
    pub fn new<P: AsRef<Path>>(backup_dir: P) -> Self {
        Self {
            backup_dir: backup_dir.as_ref().to_path_buf(),
        }
    }

    /// Collect all statistics
    pub fn collect(&self) -> LifecycleResult<BackupStats> {
        let mut stats = BackupStats::default();

        for info in list_snapshot_files(&self.backup_dir)? {
            stats.total_bytes += info.size_bytes;

            let header = fs::read(&info.path)
                .map_err(LifecycleError::from)
                .and_then(|raw| SnapshotCodec::read_header(&raw));

            let header = match header {
                Ok(header) => header,
                Err(e) => {
                    warn!(file = %info.file_name, error = %e, "skipping unreadable snapshot");
                    stats.corrupt += 1;
                    continue;
                }
            };

            stats.snapshot_count += 1;
            for (kind, count) in &header.counts {
                *stats.counts_by_type.entry(*kind).or_insert(0) += count;
            }

            let newer = stats
                .latest
                .as_ref()
                .map(|latest| header.captured_at >= latest.captured_at)
                .unwrap_or(true);
            if newer {
                stats.latest = Some(SnapshotSummary {
                    file_name: info.file_name.clone(),
                    version: header.version,
                    captured_at: header.captured_at,
                    counts: header.counts.clone(),
                });
            }
        }

        stats.last_export_at = stats.latest.as_ref().map(|latest| latest.captured_at);
        stats.total_size = BackupStats::format_size(stats.total_bytes);

        debug!(
            snapshots = stats.snapshot_count,
            corrupt = stats.corrupt,
            bytes = stats.total_bytes,
            "collected backup stats"
        );
        Ok(stats)
    }
}

/// Snapshot files in `dir`, sorted by name (oldest first for generated names).
///
/// Entries that vanish or cannot be stat'ed mid-scan are skipped.
pub fn list_snapshot_files(dir: &Path) -> LifecycleResult<Vec<SnapshotInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| LifecycleError::backup_io(dir, e))?;
    let mut snapshots = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(SNAPSHOT_EXTENSION) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };

        snapshots.push(SnapshotInfo {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size_bytes: metadata.len(),
        });
    }

    snapshots.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;
    use tempfile::TempDir;

    const VALID_A: &str = r#"{"version":1,"capturedAt":"2024-01-01T00:00:00Z","curators":[{"discordId":"1","name":"A"}],"servers":[]}"#;
    const VALID_B: &str = r#"{"version":1,"capturedAt":"2024-02-01T00:00:00Z","curators":[{"discordId":"1","name":"A"},{"discordId":"2","name":"B"}],"servers":[{"serverId":"s1","name":"G"}]}"#;

    #[test]
    fn test_empty_or_missing_dir() {
        let temp_dir = TempDir::new().unwrap();

        let stats = StatsCollector::new(temp_dir.path().join("missing")).collect().unwrap();
        assert_eq!(stats.snapshot_count, 0);
        assert_eq!(stats.total_size, "0 B");
        assert!(stats.latest.is_none());
    }

    #[test]
    fn test_collect_counts_and_latest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("snapshot-a.json"), VALID_A).unwrap();
        fs::write(temp_dir.path().join("snapshot-b.json"), VALID_B).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let stats = StatsCollector::new(temp_dir.path()).collect().unwrap();

        assert_eq!(stats.snapshot_count, 2);
        assert_eq!(stats.corrupt, 0);
        assert_eq!(stats.counts_by_type[&EntityKind::Curator], 3);
        assert_eq!(stats.counts_by_type[&EntityKind::Server], 1);
        assert_eq!(
            stats.total_bytes,
            (VALID_A.len() + VALID_B.len()) as u64
        );

        let latest = stats.latest.unwrap();
        assert_eq!(latest.file_name, "snapshot-b.json");
        assert_eq!(stats.last_export_at, Some(latest.captured_at));
    }

    #[test]
    fn test_corrupt_files_are_counted_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("snapshot-a.json"), VALID_A).unwrap();
        fs::write(temp_dir.path().join("snapshot-b.json"), &VALID_B[..40]).unwrap();
        fs::write(temp_dir.path().join("snapshot-c.json"), r#"{"version":1}"#).unwrap();

        let stats = StatsCollector::new(temp_dir.path()).collect().unwrap();

        assert_eq!(stats.snapshot_count, 1);
        assert_eq!(stats.corrupt, 2);
        assert_eq!(stats.latest.unwrap().file_name, "snapshot-a.json");
    }

    #[test]
    fn test_list_snapshot_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("snapshot-2.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("snapshot-1.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("snapshot-3.tmp"), "{}").unwrap();

        let names: Vec<String> = list_snapshot_files(temp_dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.file_name)
            .collect();
        assert_eq!(names, vec!["snapshot-1.json", "snapshot-2.json"]);
    }
}
