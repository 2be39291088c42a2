//! Live Store - the authoritative current dataset
//!
//! The lifecycle engine consumes the live store through the [`LiveStore`]
//! trait. [`JsonLiveStore`] is the file-backed implementation used by the
//! binary and the tests.

mod json_store;

pub use json_store::JsonLiveStore;

use crate::error::LifecycleResult;
use crate::types::{EntityKind, LiveDataset, LiveEntity};

/// Keyed access to live entities by natural key
pub trait LiveStore: Send + Sync {
    /// Look up one entity by natural key
    fn get(&self, kind: EntityKind, key: &str) -> LifecycleResult<Option<LiveEntity>>;

    /// All entities of one kind, in store order
    fn list(&self, kind: EntityKind) -> LifecycleResult<Vec<LiveEntity>>;

    /// Insert a new entity and return it with its assigned internal id.
    ///
    /// Fails if the natural key is already present.
    fn insert(&self, entity: LiveEntity) -> LifecycleResult<LiveEntity>;

    /// Insert several new entities in the given order, returning them with
    /// their assigned internal ids.
    ///
    /// All or nothing: fails without inserting anything if any key is already
    /// present or appears twice in `entities`.
    fn insert_many(&self, entities: Vec<LiveEntity>) -> LifecycleResult<Vec<LiveEntity>>;

    /// Replace the entity with the same natural key, keeping its internal id.
    ///
    /// Returns the previous record, or `None` if the key is not live.
    fn update(&self, entity: LiveEntity) -> LifecycleResult<Option<LiveEntity>>;

    /// Remove an entity, returning it if it was present
    fn delete(&self, kind: EntityKind, key: &str) -> LifecycleResult<Option<LiveEntity>>;

    fn contains(&self, kind: EntityKind, key: &str) -> LifecycleResult<bool> {
        Ok(self.get(kind, key)?.is_some())
    }

    /// Copy of every entity; each record is whole even if the copy spans writes
    fn read_all(&self) -> LifecycleResult<LiveDataset> {
        let mut dataset = LiveDataset::default();
        for kind in EntityKind::ALL {
            for entity in self.list(kind)? {
                dataset.push(entity);
            }
        }
        Ok(dataset)
    }
}
