//! Archive record types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityFields, EntityKind, NaturalKey};

/// Why an entity was archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveReason {
    DeletedCurator,
    DeletedServer,
}

impl ArchiveReason {
    /// Reason code for deleting an entity of the given kind
    pub fn deleted(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Curator => ArchiveReason::DeletedCurator,
            EntityKind::Server => ArchiveReason::DeletedServer,
        }
    }
}

/// Archived entity with its last-known full field set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub kind: EntityKind,
    pub key: String,
    pub archived_at: DateTime<Utc>,
    pub reason: ArchiveReason,
    pub fields: EntityFields,
}

impl ArchiveRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.kind, self.key.clone())
    }
}

/// What `ArchiveStore::put` does when the key is already archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchivePolicy {
    /// Replace the stored record with the newer deletion
    #[default]
    LatestWins,
    /// Keep the first record and ignore later deletions of the same key
    FirstWins,
}

impl FromStr for ArchivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest-wins" | "latest" => Ok(ArchivePolicy::LatestWins),
            "first-wins" | "first" => Ok(ArchivePolicy::FirstWins),
            other => Err(format!(
                "unknown archive policy '{}' (expected latest-wins or first-wins)",
                other
            )),
        }
    }
}
