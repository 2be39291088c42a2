//! Curator Archive
//!
//! Data-lifecycle engine for the Discord curator tracker: full-dataset
//! snapshots, an archive of deleted entities, and imports that never bring
//! an archived entity back.
//!
//! # Features
//!
//! - **Snapshots**: Versioned, timestamped exports written atomically
//! - **Archive**: Append-only record of deletions keyed by natural key
//! - **Reconciling import**: exclude archived, keep existing, insert new
//! - **Stats**: Derived from the backup directory on every call
//!
//! # Modules
//!
//! - `types`: Entities, snapshot documents, archive records and reports
//! - `backup`: Codec, archive store, backup service, stats and import
//! - `lifecycle`: `DataLifecycle` orchestration and per-key locking
//! - `live_store`: The `LiveStore` trait and its JSON-lines implementation
//! - `api`: HTTP endpoints
//! - `config`: Data directory and archive policy
//! - `error`: Error taxonomy
//! - `utils`: Atomic file publishing
//!
//! # Example
//!
//! ```no_run
//! use curator_archive::{DataLifecycle, ImportSource, LifecycleConfig};
//! use curator_archive::types::{Curator, EntityKind};
//!
//! fn main() -> curator_archive::LifecycleResult<()> {
//!     let lifecycle = DataLifecycle::open(LifecycleConfig::new("data"))?;
//!     lifecycle.live().insert(Curator::new("111", "A").into())?;
//!
//!     let snapshot = lifecycle.export_all_data()?;
//!     lifecycle.delete_and_archive(EntityKind::Curator, "111")?;
//!
//!     let report = lifecycle.import_from(ImportSource::File(snapshot.path))?;
//!     assert_eq!(report.curators.excluded_archived, 1);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backup;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod live_store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use backup::{ArchiveStore, BackupService, ExportedSnapshot, ImportReconciler, SnapshotCodec};
pub use config::LifecycleConfig;
pub use error::{LifecycleError, LifecycleResult, RejectReason};
pub use lifecycle::{DataLifecycle, ImportSource, KeyLocks, LiveView};
pub use live_store::{JsonLiveStore, LiveStore};
pub use types::{
    ArchivePolicy, ArchiveRecord, BackupStats, EntityKind, ImportReport, LiveEntity, NaturalKey,
    SnapshotDocument,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
