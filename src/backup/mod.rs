//! Backup Module for the curator data lifecycle
//!
//! This module provides the snapshot and archive machinery:
//! - `SnapshotCodec`: Converts the live dataset to and from snapshot documents
//! - `ArchiveStore`: Append-only record of deleted entities, keyed by natural key
//! - `BackupService`: Exports timestamped snapshot files
//! - `StatsCollector`: Derives statistics from the backup directory
//! - `ImportReconciler`: Merges a snapshot back into the live store
//!
//! # Architecture
//!
//! ```text
//! Export:
//! ┌────────────┐    ┌───────────────┐    ┌──────────────────────────────┐
//! │ live store │───►│ SnapshotCodec │───►│ backups/snapshot-<ts>-NNN.json│
//! │ read_all() │    │ serialize     │    │ temp + fsync + rename         │
//! └────────────┘    └───────────────┘    └──────────────────────────────┘
//!
//! Delete:
//! ┌──────────┐    ┌──────────────────────┐    ┌──────────────────┐
//! │ key lock │───►│ archive/archive.jsonl │───►│ live store delete │
//! └──────────┘    │ append + fsync        │    └──────────────────┘
//!                 └──────────────────────┘
//!
//! Import:
//! ┌──────────┐    ┌──────────┐    ┌───────────┐    ┌──────────────┐
//! │ validate │───►│ archived?│───►│ live?     │───►│ insert       │
//! │ reject   │    │ exclude  │    │ skip      │    │ fresh id     │
//! └──────────┘    └──────────┘    └───────────┘    └──────────────┘
//! ```

mod archive;
mod codec;
mod import;
mod service;
mod stats;

pub use archive::{ArchiveStore, ARCHIVE_LOG_FILE};
pub use codec::SnapshotCodec;
pub use import::ImportReconciler;
pub use service::{snapshot_file_name, BackupService, ExportedSnapshot};
pub use stats::{list_snapshot_files, StatsCollector, SNAPSHOT_EXTENSION};
