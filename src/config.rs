//! Configuration for the data lifecycle engine

use std::env;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::types::ArchivePolicy;

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "CURATOR_DATA_DIR";

/// Environment variable selecting the archive overwrite policy
pub const ARCHIVE_POLICY_ENV: &str = "CURATOR_ARCHIVE_POLICY";

/// Configuration for the live store, backup and archive directories
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// Behaviour when an already archived key is archived again
    pub archive_policy: ArchivePolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            archive_policy: ArchivePolicy::default(),
        }
    }
}

impl LifecycleConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Build config from `CURATOR_DATA_DIR` and `CURATOR_ARCHIVE_POLICY`.
    ///
    /// Relative data directories are resolved against the working directory.
    /// An unrecognised policy falls back to the default with a warning.
    pub fn from_env() -> Self {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let data_dir = match env::var(DATA_DIR_ENV) {
            Ok(path) if Path::new(&path).is_absolute() => PathBuf::from(path),
            Ok(path) => current_dir.join(path),
            Err(_) => current_dir.join("data"),
        };

        let archive_policy = match env::var(ARCHIVE_POLICY_ENV) {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!("{}; using {:?}", e, ArchivePolicy::default());
                ArchivePolicy::default()
            }),
            Err(_) => ArchivePolicy::default(),
        };

        Self {
            data_dir,
            archive_policy,
        }
    }

    pub fn with_archive_policy(mut self, policy: ArchivePolicy) -> Self {
        self.archive_policy = policy;
        self
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to the live store file
    pub fn live_store_path(&self) -> PathBuf {
        self.data_dir.join("live.jsonl")
    }

    /// Get path to the snapshot directory
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Get path to the archive directory (never scanned by backups)
    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("archive")
    }
}
