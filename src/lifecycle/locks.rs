//! Per-key critical sections
//!
//! Delete-and-archive and import both decide what to do with a natural key
//! and then act on that decision. Holding the key's lock across the decision
//! and the action keeps the two from interleaving on the same key, while
//! different keys proceed in parallel. An import holds the locks of every
//! key it touches for the length of one batch.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use parking_lot::{Mutex, MutexGuard};

use crate::types::NaturalKey;

const DEFAULT_STRIPES: usize = 64;

/// Fixed set of mutexes, selected by natural key hash
pub struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
}

impl KeyLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Block until the critical section for `key` is free.
    ///
    /// Two distinct keys may share a stripe; callers must never hold a guard
    /// while acquiring another. Use [`KeyLocks::lock_many`] for several keys.
    pub fn lock(&self, key: &NaturalKey) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_for(key)].lock()
    }

    /// Lock the critical sections of all `keys` at once.
    ///
    /// Each stripe is taken once, in ascending order, so concurrent batches
    /// cannot deadlock against each other or against single-key holders.
    pub fn lock_many<'k, I>(&self, keys: I) -> Vec<MutexGuard<'_, ()>>
    where
        I: IntoIterator<Item = &'k NaturalKey>,
    {
        let stripes: BTreeSet<usize> = keys.into_iter().map(|key| self.stripe_for(key)).collect();
        stripes
            .into_iter()
            .map(|stripe| self.stripes[stripe].lock())
            .collect()
    }

    fn stripe_for(&self, key: &NaturalKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}
