//! Traversal executor — breadth-first expansion of relationship patterns.

use std::collections::HashSet;

use tracing::debug;

use crate::bql::ast::RelPattern;
use crate::model::{Edge, GraphId, Thought};
use crate::service::GraphService;
use crate::{Error, FailurePhase, Result};

/// Result of expanding one relationship pattern.
#[derive(Debug, Default)]
pub struct Traversal {
    /// Nodes reached at any depth within the hop range, BFS order,
    /// deduplicated by id across sources.
    pub reached: Vec<Thought>,
    /// `(source candidate id, reached id)` arrival pairs; distinct sources
    /// reaching the same node keep their own pair.
    pub pairs: Vec<(crate::model::NodeId, crate::model::NodeId)>,
    /// Every traversed edge, for relation-variable binding.
    pub edges: Vec<Edge>,
}

/// BFS from every source candidate, level by level, for between `hop_min`
/// and `hop_max` edges inclusive.
///
/// Each source gets its own expansion with its own visited set; a node id
/// is never enqueued twice within one expansion, which is what bounds
/// cyclic graphs.
pub async fn expand<S: GraphService>(
    service: &S,
    graph: GraphId,
    sources: &[Thought],
    rel: &RelPattern,
) -> Result<Traversal> {
    let relations = rel.relations.expand();
    let min = rel.hops.min;
    let Some(max) = rel.hops.max else {
        // The validator refuses unbounded hop specs before execution.
        return Err(Error::Semantic("hop specifier has no upper bound".into()));
    };

    let mut out = Traversal::default();
    let mut seen_reached = HashSet::new();

    for source in sources {
        let mut visited = HashSet::from([source.id]);
        let mut frontier = vec![source.clone()];

        if min == 0 {
            out.pairs.push((source.id, source.id));
            if seen_reached.insert(source.id) {
                out.reached.push(source.clone());
            }
        }

        for depth in 1..=max {
            let mut next = Vec::new();
            for node in &frontier {
                let neighbors = service
                    .neighborhood(graph, node.id, &relations)
                    .await
                    .map_err(|e| Error::Service {
                        phase: FailurePhase::PreMutation,
                        source: e,
                    })?;

                for neighbor in neighbors {
                    if !visited.insert(neighbor.thought.id) {
                        continue;
                    }
                    out.edges.push(Edge {
                        source: node.id,
                        relation: neighbor.relation,
                        target: neighbor.thought.id,
                        edge_id: neighbor.edge_id,
                    });
                    if depth >= min {
                        out.pairs.push((source.id, neighbor.thought.id));
                        if seen_reached.insert(neighbor.thought.id) {
                            out.reached.push(neighbor.thought.clone());
                        }
                    }
                    next.push(neighbor.thought);
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
    }

    debug!(
        sources = sources.len(),
        reached = out.reached.len(),
        edges = out.edges.len(),
        "expanded relationship pattern"
    );
    Ok(out)
}
