//! Entity types for the live store
//!
//! Live records are strongly typed. Fields the schema does not know about are
//! kept in an ordered map so they survive export and import untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RejectReason;

/// Ordered field name to value mapping used by the snapshot layer
pub type EntityFields = serde_json::Map<String, Value>;

/// Entity types tracked by the live store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Curator,
    Server,
}

impl EntityKind {
    /// All kinds, in dependency order (servers reference curators)
    pub const ALL: [EntityKind; 2] = [EntityKind::Curator, EntityKind::Server];

    /// Name of the natural key field in the entity's JSON shape
    pub fn key_field(self) -> &'static str {
        match self {
            EntityKind::Curator => "discordId",
            EntityKind::Server => "serverId",
        }
    }

    /// Name of the per-type sequence in a snapshot document
    pub fn sequence_name(self) -> &'static str {
        match self {
            EntityKind::Curator => "curators",
            EntityKind::Server => "servers",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Curator => "curator",
            EntityKind::Server => "server",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable external identity of an entity: its kind plus natural key value.
///
/// Internal numeric ids are never part of identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub kind: EntityKind,
    pub key: String,
}

impl NaturalKey {
    pub fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Curator activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Active,
    Inactive,
}

/// A tracked Discord curator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub discord_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default)]
    pub status: ActivityStatus,
    #[serde(flatten)]
    pub extra: EntityFields,
}

impl Curator {
    /// Create a new active curator with no rating
    pub fn new(discord_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            discord_id: discord_id.into(),
            name: name.into(),
            rating: None,
            status: ActivityStatus::Active,
            extra: EntityFields::new(),
        }
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// A Discord server (guild) managed by curators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub server_id: String,
    pub name: String,
    /// Discord id of the owning curator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    #[serde(flatten)]
    pub extra: EntityFields,
}

impl Server {
    pub fn new(server_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            server_id: server_id.into(),
            name: name.into(),
            curator_id: None,
            member_count: None,
            extra: EntityFields::new(),
        }
    }

    pub fn owned_by(mut self, curator_id: impl Into<String>) -> Self {
        self.curator_id = Some(curator_id.into());
        self
    }
}

/// Any live entity, tagged by kind when persisted.
///
/// The entity's own fields sit under `entity`, apart from the `kind` tag, so
/// an unknown field that happens to be called `kind` cannot clash with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum LiveEntity {
    Curator(Curator),
    Server(Server),
}

impl LiveEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            LiveEntity::Curator(_) => EntityKind::Curator,
            LiveEntity::Server(_) => EntityKind::Server,
        }
    }

    /// Natural key value (discordId or serverId)
    pub fn natural_key(&self) -> &str {
        match self {
            LiveEntity::Curator(c) => &c.discord_id,
            LiveEntity::Server(s) => &s.server_id,
        }
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.kind(), self.natural_key())
    }

    pub fn internal_id(&self) -> Option<u64> {
        match self {
            LiveEntity::Curator(c) => c.id,
            LiveEntity::Server(s) => s.id,
        }
    }

    pub fn set_internal_id(&mut self, id: Option<u64>) {
        match self {
            LiveEntity::Curator(c) => c.id = id,
            LiveEntity::Server(s) => s.id = id,
        }
    }

    /// Full field set in schema order, unknown fields last
    pub fn to_fields(&self) -> serde_json::Result<EntityFields> {
        let value = match self {
            LiveEntity::Curator(c) => serde_json::to_value(c)?,
            LiveEntity::Server(s) => serde_json::to_value(s)?,
        };
        match value {
            Value::Object(fields) => Ok(fields),
            other => Err(serde::ser::Error::custom(format!(
                "entity serialized to non-object {}",
                other
            ))),
        }
    }

    /// Validate a snapshot candidate and build a typed entity from it.
    ///
    /// The candidate's internal id is dropped; the live store assigns its own.
    pub fn from_fields(kind: EntityKind, candidate: &Value) -> Result<Self, RejectReason> {
        let fields = candidate.as_object().ok_or(RejectReason::NotAnObject)?;

        let field = kind.key_field();
        match fields.get(field) {
            None | Some(Value::Null) => return Err(RejectReason::MissingNaturalKey { field }),
            Some(Value::String(key)) if key.trim().is_empty() => {
                return Err(RejectReason::MissingNaturalKey { field })
            }
            Some(Value::String(_)) => {}
            Some(other) => {
                return Err(RejectReason::InvalidField {
                    message: format!("'{}' must be a string, got {}", field, other),
                })
            }
        }

        let invalid = |e: serde_json::Error| RejectReason::InvalidField {
            message: e.to_string(),
        };
        let mut entity = match kind {
            EntityKind::Curator => {
                LiveEntity::Curator(serde_json::from_value(candidate.clone()).map_err(invalid)?)
            }
            EntityKind::Server => {
                LiveEntity::Server(serde_json::from_value(candidate.clone()).map_err(invalid)?)
            }
        };
        entity.set_internal_id(None);
        Ok(entity)
    }
}

impl From<Curator> for LiveEntity {
    fn from(curator: Curator) -> Self {
        LiveEntity::Curator(curator)
    }
}

impl From<Server> for LiveEntity {
    fn from(server: Server) -> Self {
        LiveEntity::Server(server)
    }
}

/// Point-in-time copy of every live entity, grouped by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveDataset {
    pub curators: Vec<Curator>,
    pub servers: Vec<Server>,
}

impl LiveDataset {
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Curator => self.curators.len(),
            EntityKind::Server => self.servers.len(),
        }
    }

    /// Entities of one kind, in store order
    pub fn entities(&self, kind: EntityKind) -> Vec<LiveEntity> {
        match kind {
            EntityKind::Curator => self.curators.iter().cloned().map(LiveEntity::from).collect(),
            EntityKind::Server => self.servers.iter().cloned().map(LiveEntity::from).collect(),
        }
    }

    pub fn push(&mut self, entity: LiveEntity) {
        match entity {
            LiveEntity::Curator(c) => self.curators.push(c),
            LiveEntity::Server(s) => self.servers.push(s),
        }
    }
}
