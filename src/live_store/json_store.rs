//! JSON-lines backed live store

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{EntityKind, LiveDataset, LiveEntity, NaturalKey};
use crate::utils::atomic_write_with;

use super::LiveStore;

#[derive(Debug, Default)]
struct LiveState {
    data: LiveDataset,
    next_id: u64,
}

impl LiveState {
    fn position(&self, kind: EntityKind, key: &str) -> Option<usize> {
        match kind {
            EntityKind::Curator => self.data.curators.iter().position(|c| c.discord_id == key),
            EntityKind::Server => self.data.servers.iter().position(|s| s.server_id == key),
        }
    }

    fn get(&self, kind: EntityKind, index: usize) -> LiveEntity {
        match kind {
            EntityKind::Curator => LiveEntity::Curator(self.data.curators[index].clone()),
            EntityKind::Server => LiveEntity::Server(self.data.servers[index].clone()),
        }
    }

    fn remove(&mut self, kind: EntityKind, index: usize) -> LiveEntity {
        match kind {
            EntityKind::Curator => LiveEntity::Curator(self.data.curators.remove(index)),
            EntityKind::Server => LiveEntity::Server(self.data.servers.remove(index)),
        }
    }

    fn insert_at(&mut self, index: usize, entity: LiveEntity) {
        match entity {
            LiveEntity::Curator(c) => self.data.curators.insert(index, c),
            LiveEntity::Server(s) => self.data.servers.insert(index, s),
        }
    }

    fn replace(&mut self, index: usize, entity: LiveEntity) -> LiveEntity {
        match entity {
            LiveEntity::Curator(c) => {
                LiveEntity::Curator(std::mem::replace(&mut self.data.curators[index], c))
            }
            LiveEntity::Server(s) => {
                LiveEntity::Server(std::mem::replace(&mut self.data.servers[index], s))
            }
        }
    }

    fn pop(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Curator => {
                self.data.curators.pop();
            }
            EntityKind::Server => {
                self.data.servers.pop();
            }
        }
    }
}

/// Live store held in memory and persisted as one JSON line per entity.
///
/// Every mutation rewrites the file atomically while holding the write lock.
/// A mutation whose persist fails is undone in memory before the error is
/// returned.
pub struct JsonLiveStore {
    path: Option<PathBuf>,
    state: RwLock<LiveState>,
}

impl JsonLiveStore {
    /// Open (or create) a store persisted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> LifecycleResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = Self::load_from_file(&path)?;

        info!(
            path = %path.display(),
            curators = state.data.curators.len(),
            servers = state.data.servers.len(),
            "opened live store"
        );

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(LiveState {
                data: LiveDataset::default(),
                next_id: 1,
            }),
        }
    }

    fn load_from_file(path: &Path) -> LifecycleResult<LiveState> {
        let mut state = LiveState {
            data: LiveDataset::default(),
            next_id: 1,
        };

        if !path.exists() {
            return Ok(state);
        }

        let content = fs::read_to_string(path)?;
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<LiveEntity>(line) {
                Ok(entity) => {
                    if let Some(id) = entity.internal_id() {
                        state.next_id = state.next_id.max(id + 1);
                    }
                    state.data.push(entity);
                }
                Err(e) => warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "skipping unreadable live store line"
                ),
            }
        }

        Ok(state)
    }

    /// Persist state to file (expects caller to hold the write lock)
    fn persist(&self, state: &LiveState) -> LifecycleResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        atomic_write_with(path, |file| {
            for kind in EntityKind::ALL {
                for entity in state.data.entities(kind) {
                    let json = serde_json::to_string(&entity)?;
                    writeln!(file, "{}", json)?;
                }
            }
            Ok(())
        })
        .map_err(|e| {
            LifecycleError::LiveStore(format!("failed to persist {}: {}", path.display(), e))
        })
    }
}

impl LiveStore for JsonLiveStore {
    fn get(&self, kind: EntityKind, key: &str) -> LifecycleResult<Option<LiveEntity>> {
        let state = self.state.read();
        Ok(state.position(kind, key).map(|index| state.get(kind, index)))
    }

    fn list(&self, kind: EntityKind) -> LifecycleResult<Vec<LiveEntity>> {
        Ok(self.state.read().data.entities(kind))
    }

    fn insert(&self, mut entity: LiveEntity) -> LifecycleResult<LiveEntity> {
        let mut state = self.state.write();
        let kind = entity.kind();

        if state.position(kind, entity.natural_key()).is_some() {
            return Err(LifecycleError::LiveStore(format!(
                "{} already exists",
                entity.key()
            )));
        }

        let id = state.next_id;
        entity.set_internal_id(Some(id));
        state.data.push(entity.clone());

        if let Err(e) = self.persist(&state) {
            state.pop(kind);
            return Err(e);
        }

        state.next_id += 1;
        debug!(key = %entity.key(), id, "inserted live entity");
        Ok(entity)
    }

    fn insert_many(&self, entities: Vec<LiveEntity>) -> LifecycleResult<Vec<LiveEntity>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.write();
        let mut seen = HashSet::with_capacity(entities.len());
        for entity in &entities {
            let key = entity.key();
            if state.position(key.kind, &key.key).is_some() || seen.contains(&key) {
                return Err(LifecycleError::LiveStore(format!("{} already exists", key)));
            }
            seen.insert(key);
        }

        let lengths = (state.data.curators.len(), state.data.servers.len());
        let first_id = state.next_id;
        let mut inserted = Vec::with_capacity(entities.len());
        for (offset, mut entity) in entities.into_iter().enumerate() {
            entity.set_internal_id(Some(first_id + offset as u64));
            state.data.push(entity.clone());
            inserted.push(entity);
        }

        if let Err(e) = self.persist(&state) {
            state.data.curators.truncate(lengths.0);
            state.data.servers.truncate(lengths.1);
            return Err(e);
        }

        state.next_id = first_id + inserted.len() as u64;
        debug!(count = inserted.len(), "inserted live entities");
        Ok(inserted)
    }

    fn update(&self, mut entity: LiveEntity) -> LifecycleResult<Option<LiveEntity>> {
        let mut state = self.state.write();
        let kind = entity.kind();

        let Some(index) = state.position(kind, entity.natural_key()) else {
            return Ok(None);
        };

        let id = state.get(kind, index).internal_id();
        entity.set_internal_id(id);
        let previous = state.replace(index, entity);

        if let Err(e) = self.persist(&state) {
            state.replace(index, previous);
            return Err(e);
        }

        Ok(Some(previous))
    }

    fn delete(&self, kind: EntityKind, key: &str) -> LifecycleResult<Option<LiveEntity>> {
        let mut state = self.state.write();

        let Some(index) = state.position(kind, key) else {
            return Ok(None);
        };

        let removed = state.remove(kind, index);
        if let Err(e) = self.persist(&state) {
            state.insert_at(index, removed);
            return Err(e);
        }

        debug!(key = %NaturalKey::new(kind, key), "deleted live entity");
        Ok(Some(removed))
    }

    fn read_all(&self) -> LifecycleResult<LiveDataset> {
        Ok(self.state.read().data.clone())
    }
}
