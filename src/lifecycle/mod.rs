//! Data lifecycle orchestration
//!
//! [`DataLifecycle`] owns the live store, archive, backup service and import
//! reconciler for one data directory. Deletion only exists here as
//! [`DataLifecycle::delete_and_archive`]; [`DataLifecycle::live`] hands out a
//! [`LiveView`] with no delete, so a live delete can never happen without its
//! archive record. Callers that open with their own store keep full access
//! to it.

mod locks;

pub use locks::KeyLocks;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::backup::{ArchiveStore, BackupService, ExportedSnapshot, ImportReconciler, SnapshotCodec};
use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::live_store::{JsonLiveStore, LiveStore};
use crate::types::{
    ArchiveReason, ArchiveRecord, BackupStats, EntityKind, ImportReport, LiveDataset, LiveEntity,
    NaturalKey, SnapshotDocument,
};

/// Where an import reads its snapshot from
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Newest snapshot file in the backup directory
    Latest,
    /// A snapshot file at an explicit path
    File(PathBuf),
    /// Raw snapshot bytes, e.g. an uploaded file
    Bytes(Vec<u8>),
    /// An already parsed document
    Document(SnapshotDocument),
}

/// Live store operations that cannot lose an entity without archiving it
#[derive(Clone, Copy)]
pub struct LiveView<'a> {
    store: &'a dyn LiveStore,
}

impl LiveView<'_> {
    pub fn get(&self, kind: EntityKind, key: &str) -> LifecycleResult<Option<LiveEntity>> {
        self.store.get(kind, key)
    }

    pub fn list(&self, kind: EntityKind) -> LifecycleResult<Vec<LiveEntity>> {
        self.store.list(kind)
    }

    pub fn contains(&self, kind: EntityKind, key: &str) -> LifecycleResult<bool> {
        self.store.contains(kind, key)
    }

    pub fn insert(&self, entity: LiveEntity) -> LifecycleResult<LiveEntity> {
        self.store.insert(entity)
    }

    pub fn update(&self, entity: LiveEntity) -> LifecycleResult<Option<LiveEntity>> {
        self.store.update(entity)
    }

    pub fn read_all(&self) -> LifecycleResult<LiveDataset> {
        self.store.read_all()
    }
}

/// Handle over every lifecycle operation for one data directory
pub struct DataLifecycle {
    config: LifecycleConfig,
    live: Arc<dyn LiveStore>,
    archive: Arc<ArchiveStore>,
    locks: Arc<KeyLocks>,
    backups: BackupService,
    reconciler: ImportReconciler,
}

impl DataLifecycle {
    /// Open with the file-backed live store under the configured data directory
    pub fn open(config: LifecycleConfig) -> LifecycleResult<Self> {
        let live = Arc::new(JsonLiveStore::open(config.live_store_path())?);
        Self::with_live_store(config, live)
    }

    /// Open with a caller-supplied live store
    pub fn with_live_store(config: LifecycleConfig, live: Arc<dyn LiveStore>) -> LifecycleResult<Self> {
        let archive = Arc::new(ArchiveStore::open(config.archive_dir(), config.archive_policy)?);
        let locks = Arc::new(KeyLocks::default());
        let backups = BackupService::open(config.backup_dir(), live.clone())?;
        let reconciler = ImportReconciler::new(live.clone(), archive.clone(), locks.clone());

        info!(
            data_dir = %config.data_dir().display(),
            policy = ?config.archive_policy,
            archived = archive.len(),
            "data lifecycle ready"
        );

        Ok(Self {
            config,
            live,
            archive,
            locks,
            backups,
            reconciler,
        })
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Read and write access to the live store without a bare delete.
    ///
    /// Removing an entity goes through [`DataLifecycle::delete_and_archive`].
    pub fn live(&self) -> LiveView<'_> {
        LiveView {
            store: self.live.as_ref(),
        }
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    pub fn backups(&self) -> &BackupService {
        &self.backups
    }

    /// Archive a live entity, then remove it from the live store.
    ///
    /// If the archive write fails the live store is not touched. If the live
    /// delete fails after archiving, the entity stays live and archived;
    /// imports already exclude it and a retry completes the delete.
    pub fn delete_and_archive(&self, kind: EntityKind, key: &str) -> LifecycleResult<ArchiveRecord> {
        let natural_key = NaturalKey::new(kind, key);
        let _guard = self.locks.lock(&natural_key);

        let entity = self
            .live
            .get(kind, key)?
            .ok_or_else(|| LifecycleError::NotFound(natural_key.clone()))?;

        let record = self.archive.put(&entity, ArchiveReason::deleted(kind))?;

        if let Err(e) = self.live.delete(kind, key) {
            error!(key = %natural_key, error = %e, "archived but live delete failed");
            return Err(e);
        }

        info!(key = %natural_key, "deleted and archived");
        Ok(record)
    }

    /// Export the full live dataset to a new snapshot file
    pub fn export_all_data(&self) -> LifecycleResult<ExportedSnapshot> {
        self.backups.export_all_data()
    }

    pub fn backup_stats(&self) -> LifecycleResult<BackupStats> {
        self.backups.get_backup_stats()
    }

    /// Merge a snapshot into the live store.
    ///
    /// Structural problems with the snapshot fail the whole call before any
    /// entity is looked at.
    pub fn import_from(&self, source: ImportSource) -> LifecycleResult<ImportReport> {
        let document = match source {
            ImportSource::Latest => {
                let path = self
                    .backups
                    .latest_snapshot_path()?
                    .ok_or(LifecycleError::NoSnapshotAvailable)?;
                info!(file = %path.display(), "importing latest snapshot");
                self.backups.load_snapshot(&path)?
            }
            ImportSource::File(path) => {
                info!(file = %path.display(), "importing snapshot file");
                self.backups.load_snapshot(&path)?
            }
            ImportSource::Bytes(raw) => SnapshotCodec::deserialize(&raw)?,
            ImportSource::Document(document) => {
                SnapshotCodec::check_version(document.version)?;
                document
            }
        };

        self.reconciler.import_backup(&document)
    }

    /// Resolve a snapshot file name from the backup directory as an import source
    pub fn snapshot_source(&self, file_name: &str) -> LifecycleResult<ImportSource> {
        Ok(ImportSource::File(self.backups.snapshot_path(file_name)?))
    }
}
