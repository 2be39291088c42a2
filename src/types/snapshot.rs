//! Snapshot document types
//!
//! A snapshot is an immutable, versioned capture of the whole live dataset.
//! Entities travel as ordered field maps, not typed records, so fields this
//! version of the schema does not know about pass through unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EntityKind;

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Full snapshot document as written to the backup directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    /// Version of snapshot format
    pub version: u32,

    /// When the live store was read
    #[serde(with = "flexible_timestamp")]
    pub captured_at: DateTime<Utc>,

    pub curators: Vec<Value>,

    pub servers: Vec<Value>,
}

impl SnapshotDocument {
    /// Candidate entities of one kind
    pub fn sequence(&self, kind: EntityKind) -> &[Value] {
        match kind {
            EntityKind::Curator => &self.curators,
            EntityKind::Server => &self.servers,
        }
    }

    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        EntityKind::ALL
            .iter()
            .map(|kind| (*kind, self.sequence(*kind).len()))
            .collect()
    }

    /// True when both documents hold the same entity sequences
    pub fn same_content(&self, other: &SnapshotDocument) -> bool {
        self.curators == other.curators && self.servers == other.servers
    }
}

/// Header of a snapshot file: version, capture time and per-type counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub captured_at: DateTime<Utc>,
    pub counts: BTreeMap<EntityKind, usize>,
}

impl SnapshotHeader {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// `capturedAt` is written as RFC 3339 and read as RFC 3339 or epoch millis
pub(crate) mod flexible_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(DateTime<Utc>),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Text(ts) => Ok(ts),
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                serde::de::Error::custom(format!("capturedAt {} is out of range", ms))
            }),
        }
    }
}
