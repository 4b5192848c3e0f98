//! Nodes ("thoughts") in the knowledge graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the graph ("brain") a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u64);

impl std::fmt::Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a thought. Serialized as the backend's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ThoughtKind {
    Normal,
    Type,
    Event,
    Tag,
    System,
}

impl ThoughtKind {
    pub const fn code(self) -> u8 {
        match self {
            ThoughtKind::Normal => 1,
            ThoughtKind::Type => 2,
            ThoughtKind::Event => 3,
            ThoughtKind::Tag => 4,
            ThoughtKind::System => 5,
        }
    }
}

impl From<ThoughtKind> for u8 {
    fn from(kind: ThoughtKind) -> u8 {
        kind.code()
    }
}

impl TryFrom<u8> for ThoughtKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        match code {
            1 => Ok(ThoughtKind::Normal),
            2 => Ok(ThoughtKind::Type),
            3 => Ok(ThoughtKind::Event),
            4 => Ok(ThoughtKind::Tag),
            5 => Ok(ThoughtKind::System),
            other => Err(format!("unknown thought kind code {other}")),
        }
    }
}

/// A node record as returned by the graph service.
///
/// `name` and `id` are always present; everything else is optional on the
/// wire, and the wire names are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub id: NodeId,
    pub name: String,
    pub kind: ThoughtKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date_time: Option<DateTime<Utc>>,
}

impl Thought {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ThoughtKind::Normal,
            label: None,
            type_id: None,
            foreground_color: None,
            background_color: None,
            creation_date_time: None,
            modification_date_time: None,
        }
    }

    pub fn with_kind(mut self, kind: ThoughtKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_type(mut self, type_id: NodeId) -> Self {
        self.type_id = Some(type_id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
