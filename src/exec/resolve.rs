//! Node resolver — turns one variable's resolution plan into an ordered,
//! deduplicated candidate list via graph-service lookups.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::bql::ast::NameOp;
use crate::model::{GraphId, NodeId, Thought};
use crate::plan::{Strategy, VarPlan};
use crate::service::GraphService;
use crate::{Error, FailurePhase, Result};

/// Ids admitted by a `=~` search fallback, keyed by (variable, literal).
/// The predicate evaluator consults this so re-evaluation does not drop
/// similarity-ranked candidates.
pub type SimilarHits = HashMap<(String, String), HashSet<NodeId>>;

/// Lazily fetched map of type name/label → type thought.
///
/// Types are resolved at most once per query; the engine never caches them
/// across invocations.
pub struct TypeCache {
    map: Option<HashMap<String, Thought>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self { map: None }
    }

    /// Resolve a type label to its type thought, fetching the type list on
    /// first use. Both a type's name and its label (when different) work.
    pub async fn resolve<S: GraphService>(
        &mut self,
        service: &S,
        graph: GraphId,
        label: &str,
    ) -> Result<Option<Thought>> {
        if self.map.is_none() {
            let types = service.list_types(graph).await.map_err(|e| Error::Service {
                phase: FailurePhase::PreMutation,
                source: e,
            })?;
            let mut map = HashMap::new();
            for t in types {
                if let Some(alias) = t.label.clone().filter(|l| l != &t.name) {
                    map.insert(alias, t.clone());
                }
                map.insert(t.name.clone(), t);
            }
            self.map = Some(map);
        }
        Ok(self.map.as_ref().and_then(|m| m.get(label)).cloned())
    }

    /// Like [`resolve`](Self::resolve), but an unknown label is an error.
    pub async fn require<S: GraphService>(
        &mut self,
        service: &S,
        graph: GraphId,
        label: &str,
    ) -> Result<Thought> {
        self.resolve(service, graph, label).await?.ok_or_else(|| {
            Error::Resolution(format!("type label '{label}' does not exist in this graph"))
        })
    }
}

/// Resolve a non-downstream variable to its candidate set.
pub async fn resolve_candidates<S: GraphService>(
    service: &S,
    graph: GraphId,
    var: &VarPlan,
    cache: &mut TypeCache,
    similar_hits: &mut SimilarHits,
) -> Result<Vec<Thought>> {
    let pre = |e| Error::Service { phase: FailurePhase::PreMutation, source: e };

    let mut candidates: Vec<Thought> = Vec::new();

    match &var.strategy {
        Strategy::TypeAnchor => {
            let label = var.type_label.as_deref().unwrap_or_default();
            let type_thought = cache.require(service, graph, label).await?;
            // The type node itself is the anchor. Expanding its children to
            // enumerate instances is forbidden: type nodes are hubs.
            return Ok(vec![type_thought]);
        }

        Strategy::Lookup(drivers) => {
            for driver in drivers {
                match driver.op {
                    NameOp::Eq => {
                        if let Some(t) =
                            service.get_by_name(graph, &driver.value).await.map_err(pre)?
                        {
                            candidates.push(t);
                        }
                    }
                    NameOp::Contains | NameOp::StartsWith | NameOp::EndsWith => {
                        let raw = service.search(graph, &driver.value).await.map_err(pre)?;
                        if raw.is_empty() {
                            debug!(
                                value = %driver.value,
                                "search returned nothing; the index may lag behind \
                                 recent writes, and exact names are more reliable"
                            );
                        }
                        let needle = driver.value.to_lowercase();
                        candidates.extend(raw.into_iter().filter(|t| {
                            let name = t.name.to_lowercase();
                            match driver.op {
                                NameOp::Contains => name.contains(&needle),
                                NameOp::StartsWith => name.starts_with(&needle),
                                NameOp::EndsWith => name.ends_with(&needle),
                                _ => unreachable!(),
                            }
                        }));
                    }
                    NameOp::Similar => {
                        let hits = resolve_similar(service, graph, &driver.value).await?;
                        similar_hits
                            .entry((var.variable.clone(), driver.value.clone()))
                            .or_default()
                            .extend(hits.iter().map(|t| t.id));
                        candidates.extend(hits);
                    }
                }
            }
        }

        Strategy::Downstream => {
            debug_assert!(false, "downstream variables resolve through traversal");
            return Ok(Vec::new());
        }
    }

    dedup_by_id(&mut candidates);

    // Lazy type filter: applied after the name-driven lookup, never the
    // other way round.
    if let Some(label) = &var.type_label {
        let type_thought = cache.require(service, graph, label).await?;
        candidates.retain(|t| t.type_id == Some(type_thought.id));
    }

    debug!(
        variable = %var.variable,
        count = candidates.len(),
        "resolved candidates"
    );
    Ok(candidates)
}

/// `=~` resolution: strict exact name first; on miss, full-text search
/// ranked by name similarity. The ranking is a stable sort, so service
/// order breaks ties.
async fn resolve_similar<S: GraphService>(
    service: &S,
    graph: GraphId,
    value: &str,
) -> Result<Vec<Thought>> {
    let pre = |e| Error::Service { phase: FailurePhase::PreMutation, source: e };

    if let Some(exact) = service.get_by_name(graph, value).await.map_err(pre)? {
        return Ok(vec![exact]);
    }

    let mut found = service.search(graph, value).await.map_err(pre)?;
    let needle = value.to_lowercase();
    found.sort_by_key(|t| edit_distance(&t.name.to_lowercase(), &needle));
    Ok(found)
}

/// Drop later duplicates, keeping first-seen order.
pub fn dedup_by_id(candidates: &mut Vec<Thought>) {
    let mut seen = HashSet::new();
    candidates.retain(|t| seen.insert(t.id));
}

/// Levenshtein edit distance.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
