//! Relation types and edges.

use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId};

/// The four primitive relation types, with the backend's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Relation {
    Child,
    Parent,
    Jump,
    Sibling,
}

impl Relation {
    /// Forward relation types, the wildcard expansion set. Parent is
    /// excluded: hub parents have enormous fan-out.
    pub const FORWARD: [Relation; 3] = [Relation::Child, Relation::Jump, Relation::Sibling];

    pub const fn code(self) -> u8 {
        match self {
            Relation::Child => 1,
            Relation::Parent => 2,
            Relation::Jump => 3,
            Relation::Sibling => 4,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Relation::Child => "CHILD",
            Relation::Parent => "PARENT",
            Relation::Jump => "JUMP",
            Relation::Sibling => "SIBLING",
        }
    }

    /// Parse a relation keyword, case-insensitively.
    pub fn from_keyword(word: &str) -> Option<Relation> {
        match word.to_uppercase().as_str() {
            "CHILD" => Some(Relation::Child),
            "PARENT" => Some(Relation::Parent),
            "JUMP" => Some(Relation::Jump),
            "SIBLING" => Some(Relation::Sibling),
            _ => None,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

impl From<Relation> for u8 {
    fn from(relation: Relation) -> u8 {
        relation.code()
    }
}

impl TryFrom<u8> for Relation {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        match code {
            1 => Ok(Relation::Child),
            2 => Ok(Relation::Parent),
            3 => Ok(Relation::Jump),
            4 => Ok(Relation::Sibling),
            other => Err(format!("unknown relation code {other}")),
        }
    }
}

/// The relation types a relationship pattern may follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationSet {
    /// A single concrete type: `-[:CHILD]->`
    Single(Relation),
    /// A union of types: `-[:CHILD|JUMP]->`
    Union(Vec<Relation>),
    /// All forward types: `-->` or `-[r]->`
    Any,
}

impl RelationSet {
    /// Expand to the concrete set of relation types to follow.
    pub fn expand(&self) -> Vec<Relation> {
        match self {
            RelationSet::Single(r) => vec![*r],
            RelationSet::Union(rs) => rs.clone(),
            RelationSet::Any => Relation::FORWARD.to_vec(),
        }
    }

    /// True when the set names exactly one concrete type.
    pub fn is_exact(&self) -> bool {
        matches!(self, RelationSet::Single(_))
    }
}

/// A directed, typed edge between two nodes.
///
/// Parent-vs-child is carried by the relation code, never by reversing the
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: NodeId,
    pub relation: Relation,
    pub target: NodeId,
    /// Known when the service reported it; DELETE needs it to remove the edge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<EdgeId>,
}
