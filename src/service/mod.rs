//! # Graph Service Trait
//!
//! This is THE contract between the BQL engine and the knowledge-graph
//! backend. The engine consumes exactly these operations and nothing else;
//! retries, backoff, and rate limiting live behind this seam, never in the
//! engine.
//!
//! ## Implementations
//!
//! | Service | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryGraph` | `memory` | In-memory reference graph for tests/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::model::{EdgeId, GraphId, NodeId, Relation, Thought, ThoughtKind};

pub use memory::MemoryGraph;

/// Search results consumed for post-filtering are capped at the service's
/// default page; the engine never paginates.
pub const DEFAULT_SEARCH_PAGE: usize = 30;

/// Failure reported by a graph-service operation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The service answered with a non-success status.
    #[error("graph service returned status {status}: {message}")]
    Status { status: u16, message: String },
    /// The request never completed (network, timeout, cancellation).
    #[error("graph service request failed: {0}")]
    Transport(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// One edge of a node's neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub relation: Relation,
    /// Present when the service reports stable edge identifiers.
    pub edge_id: Option<EdgeId>,
    pub thought: Thought,
}

/// Payload for `create_node`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewThought {
    pub name: String,
    pub kind: ThoughtKind,
    pub type_id: Option<NodeId>,
    pub label: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
}

impl NewThought {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ThoughtKind::Normal,
            type_id: None,
            label: None,
            foreground_color: None,
            background_color: None,
        }
    }

    pub fn with_type(mut self, type_id: Option<NodeId>) -> Self {
        self.type_id = type_id;
        self
    }
}

/// The closed set of node properties writable through `update_node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProperty {
    Name,
    Label,
    ForegroundColor,
    BackgroundColor,
}

impl WriteProperty {
    pub const fn as_str(self) -> &'static str {
        match self {
            WriteProperty::Name => "name",
            WriteProperty::Label => "label",
            WriteProperty::ForegroundColor => "foregroundColor",
            WriteProperty::BackgroundColor => "backgroundColor",
        }
    }

    /// Map a SET property name onto the wire property, if settable.
    pub fn from_property(property: &str) -> Option<WriteProperty> {
        match property {
            "name" => Some(WriteProperty::Name),
            "label" => Some(WriteProperty::Label),
            "foregroundColor" => Some(WriteProperty::ForegroundColor),
            "backgroundColor" => Some(WriteProperty::BackgroundColor),
            _ => None,
        }
    }
}

/// The abstract operation set the engine depends on.
///
/// Every method may suspend awaiting network I/O; these calls are the only
/// suspension points in query execution.
#[async_trait]
pub trait GraphService: Send + Sync {
    /// Exact-name lookup. At most one record; `None` is not an error.
    async fn get_by_name(&self, graph: GraphId, name: &str) -> ServiceResult<Option<Thought>>;

    /// Full-text search, ordered, capped at the service's default page.
    /// The index may lag behind recent writes.
    async fn search(&self, graph: GraphId, text: &str) -> ServiceResult<Vec<Thought>>;

    /// All type records of the graph.
    async fn list_types(&self, graph: GraphId) -> ServiceResult<Vec<Thought>>;

    /// Edges of a node's neighborhood, filtered to the given relation set.
    async fn neighborhood(
        &self,
        graph: GraphId,
        node: NodeId,
        relations: &[Relation],
    ) -> ServiceResult<Vec<Neighbor>>;

    /// Create a node; returns its id.
    async fn create_node(&self, graph: GraphId, spec: NewThought) -> ServiceResult<NodeId>;

    /// Create a typed edge; returns its id.
    async fn create_edge(
        &self,
        graph: GraphId,
        source: NodeId,
        relation: Relation,
        target: NodeId,
    ) -> ServiceResult<EdgeId>;

    /// Update a single writable property. `None` clears it.
    async fn update_node(
        &self,
        graph: GraphId,
        node: NodeId,
        property: WriteProperty,
        value: Option<&str>,
    ) -> ServiceResult<()>;

    /// Change (or clear) a node's type.
    async fn update_type(
        &self,
        graph: GraphId,
        node: NodeId,
        type_id: Option<NodeId>,
    ) -> ServiceResult<()>;

    /// Delete a node. Edge cleanup is the service's concern.
    async fn delete_node(&self, graph: GraphId, node: NodeId) -> ServiceResult<()>;

    /// Delete a single edge by id.
    async fn delete_edge(&self, graph: GraphId, edge: EdgeId) -> ServiceResult<()>;
}
