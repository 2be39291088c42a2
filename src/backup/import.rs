//! Import Reconciler
//!
//! Merges a snapshot into the live store. Every candidate gets exactly one
//! outcome, decided in this order:
//!
//! 1. invalid shape or missing natural key: rejected
//! 2. key present in the archive: excluded
//! 3. key already live (or earlier in the same snapshot): skipped, the live
//!    record is left untouched
//! 4. otherwise: inserted with a fresh internal id
//!
//! Steps 2 to 4 run for one kind at a time while holding the locks of every
//! candidate key of that kind, so a concurrent delete-and-archive cannot slip
//! between the archive check and the insert. The inserts of a kind are
//! written to the live store as one batch, in snapshot order.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{LifecycleResult, RejectReason};
use crate::lifecycle::KeyLocks;
use crate::live_store::LiveStore;
use crate::types::{
    EntityKind, ImportReport, LiveEntity, NaturalKey, Rejection, SnapshotDocument, TypeReport,
};

use super::archive::ArchiveStore;

/// Snapshot-to-live merge with archive exclusion
pub struct ImportReconciler {
    live: Arc<dyn LiveStore>,
    archive: Arc<ArchiveStore>,
    locks: Arc<KeyLocks>,
}

impl ImportReconciler {
    pub fn new(live: Arc<dyn LiveStore>, archive: Arc<ArchiveStore>, locks: Arc<KeyLocks>) -> Self {
        Self {
            live,
            archive,
            locks,
        }
    }

    /// Reconcile every candidate in `document` against the live store.
    ///
    /// Kinds are processed curators first. Rejections never abort the batch;
    /// only live store failures do. A failed kind inserts nothing, but kinds
    /// already written stay written.
    pub fn import_backup(&self, document: &SnapshotDocument) -> LifecycleResult<ImportReport> {
        let mut report = ImportReport::default();

        for kind in EntityKind::ALL {
            let (counts, rejections) = self.import_kind(kind, document.sequence(kind))?;
            *report.for_kind_mut(kind) = counts;
            report.rejections.extend(rejections);
        }

        let totals = report.totals();
        info!(
            imported = totals.imported,
            skipped_existing = totals.skipped_existing,
            excluded_archived = totals.excluded_archived,
            rejected = totals.rejected,
            "import complete"
        );
        Ok(report)
    }

    fn import_kind(
        &self,
        kind: EntityKind,
        candidates: &[Value],
    ) -> LifecycleResult<(TypeReport, Vec<Rejection>)> {
        let mut counts = TypeReport::default();
        let mut rejections = Vec::new();

        let validated: Vec<Result<LiveEntity, RejectReason>> = candidates
            .par_iter()
            .map(|candidate| LiveEntity::from_fields(kind, candidate))
            .collect();

        let mut entities = Vec::with_capacity(validated.len());
        for (index, result) in validated.into_iter().enumerate() {
            match result {
                Ok(entity) => entities.push(entity),
                Err(reason) => {
                    debug!(kind = %kind, index, reason = %reason, "rejected import candidate");
                    counts.rejected += 1;
                    rejections.push(Rejection {
                        kind,
                        index,
                        key: candidates[index]
                            .get(kind.key_field())
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        reason,
                    });
                }
            }
        }

        let keys: Vec<NaturalKey> = entities.iter().map(LiveEntity::key).collect();
        let _guards = self.locks.lock_many(&keys);

        let mut batch = Vec::new();
        let mut batch_keys = HashSet::new();
        for (entity, key) in entities.into_iter().zip(keys.iter()) {
            if self.archive.contains_key(key) {
                debug!(key = %key, "excluded archived key");
                counts.excluded_archived += 1;
            } else if batch_keys.contains(key) || self.live.contains(kind, &key.key)? {
                counts.skipped_existing += 1;
            } else {
                batch_keys.insert(key);
                batch.push(entity);
            }
        }

        if !batch.is_empty() {
            counts.imported = self.live.insert_many(batch)?.len();
        }
        Ok((counts, rejections))
    }
}
