//! # Graph Model
//!
//! Clean DTOs for the associative knowledge graph. These types cross every
//! boundary: service ↔ planner ↔ execution ↔ caller.
//!
//! This module is pure data — no I/O, no state, no async.

pub mod relation;
pub mod thought;
pub mod value;

pub use relation::{Edge, Relation, RelationSet};
pub use thought::{EdgeId, GraphId, NodeId, Thought, ThoughtKind};
pub use value::{Rows, Value};
