//! In-memory graph service.
//!
//! This is the reference implementation of `GraphService`, used by the
//! end-to-end tests and for embedding the engine without a remote backend.
//!
//! ## Limitations
//!
//! - **Single graph**: the `GraphId` argument is accepted and ignored.
//! - **Search is a name scan**: `search` matches case-insensitive
//!   substrings unless a stubbed result list is installed with
//!   [`MemoryGraph::stub_search`]. Stubs exist to model the real service's
//!   inexact, lagging index.
//! - **No concurrency control**: per-collection locks only; multi-step
//!   mutations are not atomic.
//!
//! Every operation counts its invocations so tests can assert the engine's
//! zero-side-effect guarantees (previews, refused batches).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::model::{EdgeId, GraphId, NodeId, Relation, Thought, ThoughtKind};

use super::{
    GraphService, Neighbor, NewThought, ServiceError, ServiceResult, WriteProperty,
    DEFAULT_SEARCH_PAGE,
};

/// In-memory knowledge graph.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    thoughts: RwLock<BTreeMap<NodeId, Thought>>,
    edges: RwLock<BTreeMap<EdgeId, StoredEdge>>,
    /// node id → outgoing edge ids, in insertion order
    adjacency: RwLock<HashMap<NodeId, Vec<EdgeId>>>,
    /// query text → pinned result ids (models the real index's inexactness)
    search_stubs: RwLock<HashMap<String, Vec<NodeId>>>,
    /// nodes whose update-node calls fail (models mid-batch service errors)
    failing_updates: RwLock<HashSet<NodeId>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    calls: Calls,
}

#[derive(Debug, Clone, Copy)]
struct StoredEdge {
    source: NodeId,
    relation: Relation,
    target: NodeId,
}

#[derive(Default)]
struct Calls {
    get_by_name: AtomicU64,
    search: AtomicU64,
    list_types: AtomicU64,
    neighborhood: AtomicU64,
    create_node: AtomicU64,
    create_edge: AtomicU64,
    update_node: AtomicU64,
    update_type: AtomicU64,
    delete_node: AtomicU64,
    delete_edge: AtomicU64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Add a normal thought with just a name.
    pub fn add_thought(&self, name: impl Into<String>) -> NodeId {
        self.insert(NewThought::new(name))
    }

    /// Add a thought with an explicit spec.
    pub fn add_thought_with(&self, spec: NewThought) -> NodeId {
        self.insert(spec)
    }

    /// Add a type thought (kind = Type). Its id doubles as the type id.
    pub fn add_type(&self, name: impl Into<String>) -> NodeId {
        let mut spec = NewThought::new(name);
        spec.kind = ThoughtKind::Type;
        self.insert(spec)
    }

    /// Wire a directed, typed edge.
    pub fn link(&self, source: NodeId, relation: Relation, target: NodeId) -> EdgeId {
        let id = EdgeId(self.inner.next_edge_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner
            .edges
            .write()
            .insert(id, StoredEdge { source, relation, target });
        self.inner.adjacency.write().entry(source).or_default().push(id);
        id
    }

    /// Pin the result list for a search query, modelling an index that
    /// returns near-misses or lags behind writes.
    pub fn stub_search(&self, text: impl Into<String>, ids: Vec<NodeId>) {
        self.inner.search_stubs.write().insert(text.into(), ids);
    }

    /// Make update-node calls against this node fail, modelling a service
    /// error in the middle of a batch.
    pub fn fail_updates_for(&self, node: NodeId) {
        self.inner.failing_updates.write().insert(node);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn thought(&self, id: NodeId) -> Option<Thought> {
        self.inner.thoughts.read().get(&id).cloned()
    }

    pub fn thought_count(&self) -> usize {
        self.inner.thoughts.read().len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edges.read().len()
    }

    pub fn has_edge(&self, source: NodeId, relation: Relation, target: NodeId) -> bool {
        self.inner
            .edges
            .read()
            .values()
            .any(|e| e.source == source && e.relation == relation && e.target == target)
    }

    pub fn get_by_name_calls(&self) -> u64 {
        self.inner.calls.get_by_name.load(Ordering::Relaxed)
    }

    pub fn search_calls(&self) -> u64 {
        self.inner.calls.search.load(Ordering::Relaxed)
    }

    pub fn neighborhood_calls(&self) -> u64 {
        self.inner.calls.neighborhood.load(Ordering::Relaxed)
    }

    pub fn create_node_calls(&self) -> u64 {
        self.inner.calls.create_node.load(Ordering::Relaxed)
    }

    pub fn create_edge_calls(&self) -> u64 {
        self.inner.calls.create_edge.load(Ordering::Relaxed)
    }

    pub fn update_node_calls(&self) -> u64 {
        self.inner.calls.update_node.load(Ordering::Relaxed)
    }

    pub fn update_type_calls(&self) -> u64 {
        self.inner.calls.update_type.load(Ordering::Relaxed)
    }

    pub fn delete_node_calls(&self) -> u64 {
        self.inner.calls.delete_node.load(Ordering::Relaxed)
    }

    pub fn delete_edge_calls(&self) -> u64 {
        self.inner.calls.delete_edge.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn insert(&self, spec: NewThought) -> NodeId {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed) + 1);
        let now = Utc::now();
        let thought = Thought {
            id,
            name: spec.name,
            kind: spec.kind,
            label: spec.label,
            type_id: spec.type_id,
            foreground_color: spec.foreground_color,
            background_color: spec.background_color,
            creation_date_time: Some(now),
            modification_date_time: Some(now),
        };
        self.inner.thoughts.write().insert(id, thought);
        self.inner.adjacency.write().entry(id).or_default();
        id
    }

    fn touch(thought: &mut Thought) {
        thought.modification_date_time = Some(Utc::now());
    }

    fn not_found(what: &str, id: impl std::fmt::Display) -> ServiceError {
        ServiceError::Status { status: 404, message: format!("{what} {id} not found") }
    }
}

#[async_trait]
impl GraphService for MemoryGraph {
    async fn get_by_name(&self, _graph: GraphId, name: &str) -> ServiceResult<Option<Thought>> {
        self.inner.calls.get_by_name.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .thoughts
            .read()
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn search(&self, _graph: GraphId, text: &str) -> ServiceResult<Vec<Thought>> {
        self.inner.calls.search.fetch_add(1, Ordering::Relaxed);

        if let Some(ids) = self.inner.search_stubs.read().get(text) {
            let thoughts = self.inner.thoughts.read();
            return Ok(ids
                .iter()
                .filter_map(|id| thoughts.get(id).cloned())
                .take(DEFAULT_SEARCH_PAGE)
                .collect());
        }

        let needle = text.to_lowercase();
        Ok(self
            .inner
            .thoughts
            .read()
            .values()
            .filter(|t| t.name.to_lowercase().contains(&needle))
            .take(DEFAULT_SEARCH_PAGE)
            .cloned()
            .collect())
    }

    async fn list_types(&self, _graph: GraphId) -> ServiceResult<Vec<Thought>> {
        self.inner.calls.list_types.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .thoughts
            .read()
            .values()
            .filter(|t| t.kind == ThoughtKind::Type)
            .cloned()
            .collect())
    }

    async fn neighborhood(
        &self,
        _graph: GraphId,
        node: NodeId,
        relations: &[Relation],
    ) -> ServiceResult<Vec<Neighbor>> {
        self.inner.calls.neighborhood.fetch_add(1, Ordering::Relaxed);

        let adjacency = self.inner.adjacency.read();
        let edges = self.inner.edges.read();
        let thoughts = self.inner.thoughts.read();

        let Some(edge_ids) = adjacency.get(&node) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for edge_id in edge_ids {
            let Some(edge) = edges.get(edge_id) else { continue };
            if !relations.contains(&edge.relation) {
                continue;
            }
            // A dangling target models a stale edge; the real service
            // filters those out of the graph payload too.
            let Some(thought) = thoughts.get(&edge.target) else { continue };
            out.push(Neighbor {
                relation: edge.relation,
                edge_id: Some(*edge_id),
                thought: thought.clone(),
            });
        }
        Ok(out)
    }

    async fn create_node(&self, _graph: GraphId, spec: NewThought) -> ServiceResult<NodeId> {
        self.inner.calls.create_node.fetch_add(1, Ordering::Relaxed);
        Ok(self.insert(spec))
    }

    async fn create_edge(
        &self,
        _graph: GraphId,
        source: NodeId,
        relation: Relation,
        target: NodeId,
    ) -> ServiceResult<EdgeId> {
        self.inner.calls.create_edge.fetch_add(1, Ordering::Relaxed);
        {
            let thoughts = self.inner.thoughts.read();
            if !thoughts.contains_key(&source) {
                return Err(Self::not_found("node", source));
            }
            if !thoughts.contains_key(&target) {
                return Err(Self::not_found("node", target));
            }
        }
        Ok(self.link(source, relation, target))
    }

    async fn update_node(
        &self,
        _graph: GraphId,
        node: NodeId,
        property: WriteProperty,
        value: Option<&str>,
    ) -> ServiceResult<()> {
        self.inner.calls.update_node.fetch_add(1, Ordering::Relaxed);
        if self.inner.failing_updates.read().contains(&node) {
            return Err(ServiceError::Status {
                status: 500,
                message: format!("update refused for node {node}"),
            });
        }
        let mut thoughts = self.inner.thoughts.write();
        let thought = thoughts.get_mut(&node).ok_or_else(|| Self::not_found("node", node))?;
        match property {
            WriteProperty::Name => match value {
                Some(name) => thought.name = name.to_string(),
                None => {
                    return Err(ServiceError::Status {
                        status: 400,
                        message: "name cannot be cleared".into(),
                    })
                }
            },
            WriteProperty::Label => thought.label = value.map(str::to_string),
            WriteProperty::ForegroundColor => {
                thought.foreground_color = value.map(str::to_string)
            }
            WriteProperty::BackgroundColor => {
                thought.background_color = value.map(str::to_string)
            }
        }
        Self::touch(thought);
        Ok(())
    }

    async fn update_type(
        &self,
        _graph: GraphId,
        node: NodeId,
        type_id: Option<NodeId>,
    ) -> ServiceResult<()> {
        self.inner.calls.update_type.fetch_add(1, Ordering::Relaxed);
        let mut thoughts = self.inner.thoughts.write();
        let thought = thoughts.get_mut(&node).ok_or_else(|| Self::not_found("node", node))?;
        thought.type_id = type_id;
        Self::touch(thought);
        Ok(())
    }

    async fn delete_node(&self, _graph: GraphId, node: NodeId) -> ServiceResult<()> {
        self.inner.calls.delete_node.fetch_add(1, Ordering::Relaxed);
        let removed = self.inner.thoughts.write().remove(&node);
        if removed.is_none() {
            return Err(Self::not_found("node", node));
        }

        // Edge cleanup is this service's job (the engine delegates it).
        let mut edges = self.inner.edges.write();
        let mut adjacency = self.inner.adjacency.write();
        let incident: Vec<EdgeId> = edges
            .iter()
            .filter(|(_, e)| e.source == node || e.target == node)
            .map(|(id, _)| *id)
            .collect();
        for id in incident {
            if let Some(edge) = edges.remove(&id) {
                if let Some(out) = adjacency.get_mut(&edge.source) {
                    out.retain(|eid| *eid != id);
                }
            }
        }
        adjacency.remove(&node);
        Ok(())
    }

    async fn delete_edge(&self, _graph: GraphId, edge: EdgeId) -> ServiceResult<()> {
        self.inner.calls.delete_edge.fetch_add(1, Ordering::Relaxed);
        let removed = self.inner.edges.write().remove(&edge);
        match removed {
            Some(stored) => {
                if let Some(out) = self.inner.adjacency.write().get_mut(&stored.source) {
                    out.retain(|eid| *eid != edge);
                }
                Ok(())
            }
            None => Err(Self::not_found("edge", edge)),
        }
    }
}
