//! Snapshot Codec
//!
//! Converts between the live dataset and the versioned snapshot document,
//! and between the document and its on-disk JSON bytes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::{Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::Deserialize;

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{EntityKind, LiveDataset, SnapshotDocument, SnapshotHeader, SNAPSHOT_FORMAT_VERSION};

/// Snapshot encoder/decoder
pub struct SnapshotCodec;

impl SnapshotCodec {
    /// Build a snapshot document from a live dataset.
    ///
    /// Entity order follows the dataset; field order follows the schema with
    /// unknown fields last. The capture time is kept at millisecond precision,
    /// which is what the document format stores.
    pub fn serialize(
        dataset: &LiveDataset,
        captured_at: DateTime<Utc>,
    ) -> LifecycleResult<SnapshotDocument> {
        let encode_err =
            |e: serde_json::Error| LifecycleError::malformed(format!("cannot encode entity: {}", e));

        let curators = dataset
            .curators
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(encode_err)?;
        let servers = dataset
            .servers
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(encode_err)?;

        Ok(SnapshotDocument {
            version: SNAPSHOT_FORMAT_VERSION,
            captured_at: captured_at.trunc_subsecs(3),
            curators,
            servers,
        })
    }

    /// Encode a document as pretty-printed JSON
    pub fn encode(document: &SnapshotDocument) -> LifecycleResult<Vec<u8>> {
        serde_json::to_vec_pretty(document)
            .map_err(|e| LifecycleError::malformed(format!("cannot encode snapshot: {}", e)))
    }

    /// Parse raw bytes into a snapshot document.
    ///
    /// Requires `version`, `capturedAt` and every per-type sequence. Does not
    /// look inside individual entities.
    pub fn deserialize(raw: &[u8]) -> LifecycleResult<SnapshotDocument> {
        let document: SnapshotDocument =
            serde_json::from_slice(raw).map_err(|e| LifecycleError::malformed(e.to_string()))?;
        Self::check_version(document.version)?;
        Ok(document)
    }

    /// Parse only the header: version, capture time and per-type counts.
    ///
    /// Entity bodies are skipped without being materialized.
    pub fn read_header(raw: &[u8]) -> LifecycleResult<SnapshotHeader> {
        let header: RawHeader =
            serde_json::from_slice(raw).map_err(|e| LifecycleError::malformed(e.to_string()))?;
        Self::check_version(header.version)?;

        let counts = BTreeMap::from([
            (EntityKind::Curator, header.curators.0),
            (EntityKind::Server, header.servers.0),
        ]);

        Ok(SnapshotHeader {
            version: header.version,
            captured_at: header.captured_at,
            counts,
        })
    }

    /// Reject versions this build cannot read
    pub fn check_version(version: u32) -> LifecycleResult<()> {
        if version == 0 || version > SNAPSHOT_FORMAT_VERSION {
            return Err(LifecycleError::malformed(format!(
                "unsupported snapshot version {} (supported: 1..={})",
                version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeader {
    version: u32,
    #[serde(with = "crate::types::flexible_timestamp")]
    captured_at: DateTime<Utc>,
    curators: ElementCount,
    servers: ElementCount,
}

/// Number of elements in a JSON array, counted without building them
struct ElementCount(usize);

impl<'de> Deserialize<'de> for ElementCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountVisitor;

        impl<'de> Visitor<'de> for CountVisitor {
            type Value = ElementCount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence of entities")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut count = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    count += 1;
                }
                Ok(ElementCount(count))
            }
        }

        deserializer.deserialize_seq(CountVisitor)
    }
}
