//! Data types for the curator tracker data lifecycle
//!
//! This module contains the live entity schema, the snapshot document,
//! archive records and the reports produced by backup and import.

mod archive;
mod entity;
mod report;
mod snapshot;

pub use archive::{ArchivePolicy, ArchiveReason, ArchiveRecord};
pub use entity::{
    ActivityStatus, Curator, EntityFields, EntityKind, LiveDataset, LiveEntity, NaturalKey, Server,
};
pub use report::{BackupStats, ImportReport, Rejection, SnapshotInfo, SnapshotSummary, TypeReport};
pub use snapshot::{SnapshotDocument, SnapshotHeader, SNAPSHOT_FORMAT_VERSION};

pub(crate) use snapshot::flexible_timestamp;
