//! Archive Store
//!
//! Append-only, keyed store of deleted entities. Every put appends one JSON
//! line to `archive.jsonl` and fsyncs it before the in-memory index changes,
//! so a key is only reported as archived once it is durable.
//!
//! The archive lives in its own directory and is never part of a snapshot.
//! Its keys are the exclusion oracle consulted by the import reconciler.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{ArchivePolicy, ArchiveReason, ArchiveRecord, LiveEntity, NaturalKey};
use crate::utils::atomic_write_with;

/// File name of the archive log inside the archive directory
pub const ARCHIVE_LOG_FILE: &str = "archive.jsonl";

#[derive(Debug, Default)]
struct ArchiveIndex {
    /// Records in first-insertion order
    records: Vec<Arc<ArchiveRecord>>,
    /// natural key → position in `records`
    positions: HashMap<NaturalKey, usize>,
}

impl ArchiveIndex {
    /// Apply a record under the given policy. Returns false if it was ignored.
    fn apply(&mut self, record: ArchiveRecord, policy: ArchivePolicy) -> bool {
        let key = record.natural_key();
        match self.positions.get(&key).copied() {
            Some(_) if policy == ArchivePolicy::FirstWins => false,
            Some(position) => {
                self.records[position] = Arc::new(record);
                true
            }
            None => {
                self.positions.insert(key, self.records.len());
                self.records.push(Arc::new(record));
                true
            }
        }
    }
}

/// Archive of deleted entities keyed by natural key
pub struct ArchiveStore {
    dir: PathBuf,
    policy: ArchivePolicy,
    index: RwLock<ArchiveIndex>,
}

impl ArchiveStore {
    /// Open the archive in `dir`, replaying its log
    pub fn open<P: AsRef<Path>>(dir: P, policy: ArchivePolicy) -> LifecycleResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            policy,
            index: RwLock::new(ArchiveIndex::default()),
        };
        store.replay()?;

        info!(
            dir = %store.dir.display(),
            records = store.len(),
            policy = ?policy,
            "opened archive"
        );
        Ok(store)
    }

    /// Path to the archive log
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(ARCHIVE_LOG_FILE)
    }

    pub fn policy(&self) -> ArchivePolicy {
        self.policy
    }

    fn replay(&self) -> LifecycleResult<()> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(());
        }

        let raw = fs::read(&path)?;
        let complete = repair_torn_tail(&path, &raw)?;
        let content = String::from_utf8_lossy(&raw[..complete]);
        let mut index = self.index.write();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<ArchiveRecord>(line) {
                Ok(record) => {
                    index.apply(record, self.policy);
                }
                Err(e) => warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "skipping unreadable archive line"
                ),
            }
        }

        Ok(())
    }

    /// Archive an entity.
    ///
    /// Idempotent per natural key: with [`ArchivePolicy::LatestWins`] an
    /// existing record is replaced in place, with
    /// [`ArchivePolicy::FirstWins`] the existing record is returned and
    /// nothing is written. Fails with `ArchiveWriteFailed` if the log append
    /// does not reach disk; the index is unchanged in that case.
    pub fn put(&self, entity: &LiveEntity, reason: ArchiveReason) -> LifecycleResult<ArchiveRecord> {
        let key = entity.key();
        let write_failed = |source: io::Error| LifecycleError::ArchiveWriteFailed {
            key: key.clone(),
            source,
        };

        let fields = entity
            .to_fields()
            .map_err(|e| write_failed(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let record = ArchiveRecord {
            kind: key.kind,
            key: key.key.clone(),
            archived_at: Utc::now(),
            reason,
            fields,
        };

        let mut index = self.index.write();

        if self.policy == ArchivePolicy::FirstWins {
            if let Some(&position) = index.positions.get(&key) {
                debug!(key = %key, "already archived, keeping first record");
                return Ok(index.records[position].as_ref().clone());
            }
        }

        let line = serde_json::to_string(&record)
            .map_err(|e| write_failed(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        append_line(&self.log_path(), &line).map_err(write_failed)?;

        index.apply(record.clone(), self.policy);
        info!(key = %key, reason = ?reason, "archived entity");
        Ok(record)
    }

    /// True if the key has been archived. Expected O(1).
    pub fn contains_key(&self, key: &NaturalKey) -> bool {
        self.index.read().positions.contains_key(key)
    }

    pub fn get(&self, key: &NaturalKey) -> Option<ArchiveRecord> {
        let index = self.index.read();
        index
            .positions
            .get(key)
            .map(|&position| index.records[position].as_ref().clone())
    }

    /// All records in insertion order.
    ///
    /// The iterator walks a copy of the record list taken at call time;
    /// call again to observe later puts.
    pub fn get_all(&self) -> impl Iterator<Item = Arc<ArchiveRecord>> {
        let records = self.index.read().records.clone();
        records.into_iter()
    }

    pub fn len(&self) -> usize {
        self.index.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the log with exactly one line per archived key.
    ///
    /// Returns the number of records written.
    pub fn compact(&self) -> LifecycleResult<usize> {
        let index = self.index.write();
        let path = self.log_path();

        atomic_write_with(&path, |file| {
            for record in &index.records {
                writeln!(file, "{}", serde_json::to_string(record.as_ref())?)?;
            }
            Ok(())
        })?;

        info!(path = %path.display(), records = index.records.len(), "compacted archive log");
        Ok(index.records.len())
    }
}

/// Make the log end on a line boundary so the next append starts a fresh line.
///
/// A final line without its newline is left by a crash mid-append. If it
/// still parses as a record the newline is added; otherwise the fragment is
/// cut off. Returns the length of the log that holds complete lines.
fn repair_torn_tail(path: &Path, raw: &[u8]) -> io::Result<usize> {
    let boundary = raw
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let tail = &raw[boundary..];
    if tail.iter().all(u8::is_ascii_whitespace) {
        return Ok(raw.len());
    }

    if serde_json::from_slice::<ArchiveRecord>(tail).is_ok() {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        debug!(path = %path.display(), "terminated final archive line");
        return Ok(raw.len());
    }

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(boundary as u64)?;
    file.sync_all()?;
    warn!(
        path = %path.display(),
        dropped_bytes = tail.len(),
        "truncated torn archive line"
    );
    Ok(boundary)
}

/// Append one line and fsync; on failure truncate back to the old length
fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let previous_len = file.metadata()?.len();

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    let result = file.write_all(buf.as_bytes()).and_then(|_| file.sync_all());
    if result.is_err() {
        if let Err(e) = file.set_len(previous_len) {
            warn!(path = %path.display(), error = %e, "failed to truncate partial archive line");
        }
    }
    result
}
