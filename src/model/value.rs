//! Projected result values.

use serde::Serialize;

use super::{NodeId, Thought};

/// A cell in a projected result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Id(NodeId),
    Text(String),
    Thought(Box<Thought>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<NodeId> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_thought(&self) -> Option<&Thought> {
        match self {
            Value::Thought(t) => Some(t),
            _ => None,
        }
    }
}

/// An ordered result set: one column per RETURN item, rows in traversal
/// order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    /// Values of a single column, by header name.
    pub fn column(&self, name: &str) -> Vec<&Value> {
        match self.columns.iter().position(|c| c == name) {
            Some(idx) => self.rows.iter().map(|row| &row[idx]).collect(),
            None => Vec::new(),
        }
    }
}
