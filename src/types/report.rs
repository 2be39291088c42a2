//! Import reports and backup statistics

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::EntityKind;
use crate::error::RejectReason;

/// Reconciliation outcome counts for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeReport {
    pub imported: usize,
    pub skipped_existing: usize,
    pub excluded_archived: usize,
    pub rejected: usize,
}

impl TypeReport {
    pub fn total(&self) -> usize {
        self.imported + self.skipped_existing + self.excluded_archived + self.rejected
    }
}

/// A single candidate that failed validation during import
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub kind: EntityKind,
    /// Position in the snapshot sequence
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Result of merging a snapshot into the live store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub curators: TypeReport,
    pub servers: TypeReport,
    pub rejections: Vec<Rejection>,
}

impl ImportReport {
    pub fn for_kind(&self, kind: EntityKind) -> &TypeReport {
        match kind {
            EntityKind::Curator => &self.curators,
            EntityKind::Server => &self.servers,
        }
    }

    pub fn for_kind_mut(&mut self, kind: EntityKind) -> &mut TypeReport {
        match kind {
            EntityKind::Curator => &mut self.curators,
            EntityKind::Server => &mut self.servers,
        }
    }

    /// Counts summed over every kind
    pub fn totals(&self) -> TypeReport {
        EntityKind::ALL
            .iter()
            .map(|kind| self.for_kind(*kind))
            .fold(TypeReport::default(), |acc, r| TypeReport {
                imported: acc.imported + r.imported,
                skipped_existing: acc.skipped_existing + r.skipped_existing,
                excluded_archived: acc.excluded_archived + r.excluded_archived,
                rejected: acc.rejected + r.rejected,
            })
    }
}

/// A snapshot file in the backup directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Header facts about the newest valid snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub file_name: String,
    pub version: u32,
    pub captured_at: DateTime<Utc>,
    pub counts: BTreeMap<EntityKind, usize>,
}

/// Statistics derived from the backup directory contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
    /// Number of readable snapshot files
    pub snapshot_count: usize,
    /// Snapshot files that could not be parsed
    pub corrupt: usize,
    /// Entities per kind, summed over readable snapshots
    pub counts_by_type: BTreeMap<EntityKind, usize>,
    pub latest: Option<SnapshotSummary>,
    pub last_export_at: Option<DateTime<Utc>>,
    /// Size of all snapshot files, corrupt ones included
    pub total_bytes: u64,
    pub total_size: String,
}

impl BackupStats {
    /// Format size in human-readable format
    pub fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}
