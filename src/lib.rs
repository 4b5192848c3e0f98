//! # brainquery — BQL for Associative Knowledge Graphs
//!
//! A Cypher-subset query language (BQL) and execution planner. A query
//! string is parsed, validated, planned, and executed against an abstract
//! graph service: node patterns resolve to concrete node records,
//! relationships traverse under strict safety bounds, and mutations run
//! through a narrow operation set with batch caps and a dry-run interlock
//! for destructive work.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphService` is the contract between the engine
//!    and any backend; the engine never sees a wire format.
//! 2. **Parser owns nothing**: BQL → AST is a pure function.
//! 3. **Sum-typed AST**: each query shape is a distinct variant, so new
//!    clauses are localized changes.
//! 4. **Refuse, don't truncate**: batch caps and hop bounds reject the
//!    query outright; nothing is partially applied by design.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brainquery::{Engine, ExecuteOptions, GraphId};
//!
//! # async fn example() -> brainquery::Result<()> {
//! let engine = Engine::in_memory();
//! let opts = ExecuteOptions::new(GraphId(1));
//!
//! let outcome = engine
//!     .execute("MATCH (n {name: \"Projects\"})-[:CHILD]->(m) RETURN m.name", opts)
//!     .await?;
//!
//! if let Some(rows) = outcome.rows() {
//!     for row in &rows.rows {
//!         println!("{row:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module | Responsibility |
//! |-------|--------|----------------|
//! | Lexer | `bql::lexer` | Query text → tokens |
//! | Parser | `bql::parser` | Tokens → sum-typed AST |
//! | Validator | `bql::validate` | Static safety rules |
//! | Planner | `plan` | Resolution strategy per variable |
//! | Resolver | `exec::resolve` | Node pattern → candidate set |
//! | Traversal | `exec::traverse` | Bounded BFS over relationships |
//! | Predicates | `exec::predicate` | Boolean trees over candidates |
//! | Mutations | `exec::mutate` | CREATE / SET / MERGE / DELETE |
//! | Projection | `exec::project` | Bindings → result rows |

// ============================================================================
// Modules
// ============================================================================

pub mod bql;
pub mod exec;
pub mod model;
pub mod plan;
pub mod service;

use tracing::debug;

// ============================================================================
// Re-exports
// ============================================================================

pub use exec::{Created, Deleted, DeletePreview, MutationReport, Outcome, Updated};
pub use model::{Edge, EdgeId, GraphId, NodeId, Relation, RelationSet, Rows, Thought, ThoughtKind, Value};
pub use service::{
    GraphService, MemoryGraph, Neighbor, NewThought, ServiceError, ServiceResult, WriteProperty,
};

// ============================================================================
// Engine
// ============================================================================

/// The primary entry point. An `Engine` wraps a graph service and executes
/// BQL queries against it. It keeps no state between queries.
pub struct Engine<S: GraphService> {
    service: S,
}

impl<S: GraphService> Engine<S> {
    /// Create an engine over the given graph service.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Access the underlying service (seeding, call inspection).
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Parse, validate, plan, and execute one query.
    ///
    /// Destructive queries run as a dry-run preview unless
    /// [`ExecuteOptions::confirm`] is set; the engine never infers
    /// confirmation.
    pub async fn execute(&self, query: &str, opts: ExecuteOptions) -> Result<Outcome> {
        debug!(%query, graph = %opts.graph, confirm = opts.confirm, "executing");
        let ast = bql::parse(query)?;
        bql::validate::validate(&ast)?;
        let plan = plan::plan(&ast)?;
        exec::run(&self.service, &opts, &ast, &plan).await
    }
}

impl Engine<MemoryGraph> {
    /// Engine over a fresh in-memory graph, for tests and embedding.
    pub fn in_memory() -> Self {
        Self::new(MemoryGraph::new())
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// The graph the query runs against.
    pub graph: GraphId,
    /// Caller-visible safety interlock for DELETE. Defaults to off: an
    /// unconfirmed DELETE returns a preview instead of mutating.
    pub confirm: bool,
}

impl ExecuteOptions {
    pub fn new(graph: GraphId) -> Self {
        Self { graph, confirm: false }
    }

    pub fn confirmed(graph: GraphId) -> Self {
        Self { graph, confirm: true }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Whether a failed query had already sent mutations. Applied mutations
/// are never rolled back; the graph service is the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    PreMutation,
    PartiallyApplied,
}

impl std::fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailurePhase::PreMutation => "before any mutation",
            FailurePhase::PartiallyApplied => "after partial application",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Grammar violation, with position and expected tokens.
    #[error("syntax error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Static rule violation.
    #[error("semantic error: {0}")]
    Semantic(String),

    /// Under-constrained variable or unknown type label.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// A batch cap or hop bound was exceeded; nothing was executed.
    #[error("limit exceeded: {what} allows at most {cap}, got {got}")]
    LimitExceeded { what: &'static str, cap: usize, got: usize },

    /// A graph-service operation failed; already-sent mutations stand.
    #[error("graph service failure {phase}: {source}")]
    Service {
        phase: FailurePhase,
        #[source]
        source: ServiceError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
