//! Mutation executor — CREATE, SET, MERGE, DELETE through graph-service
//! operations, under batch caps and the two-phase destructive interlock.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::bql::ast::{CreatePart, DeletePart, MergePart, NodePattern, SetItem};
use crate::model::{Edge, GraphId, NodeId, RelationSet, Thought};
use crate::service::{GraphService, NewThought, ServiceError, WriteProperty};
use crate::{Error, Result};

use super::resolve::TypeCache;
use super::{Bindings, Created, DeletePreview, Deleted, MutationCtx, MutationReport, Updated};

/// SET touches at most this many nodes per query.
pub const SET_BATCH_LIMIT: usize = 10;

/// DELETE touches at most this many nodes per query.
pub const DELETE_BATCH_LIMIT: usize = 5;

// ============================================================================
// SET
// ============================================================================

/// Apply SET items, in source order, to every candidate of their variable.
/// Refuses (with no calls issued) when the distinct target count exceeds
/// the batch cap.
pub async fn execute_set<S: GraphService>(
    service: &S,
    graph: GraphId,
    items: &[SetItem],
    bindings: &Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<()> {
    let mut distinct: HashSet<NodeId> = HashSet::new();
    for item in items {
        for t in bindings.candidates_of(item.variable()) {
            distinct.insert(t.id);
        }
    }
    if distinct.len() > SET_BATCH_LIMIT {
        warn!(got = distinct.len(), cap = SET_BATCH_LIMIT, "refusing oversized SET batch");
        return Err(Error::LimitExceeded {
            what: "SET batch",
            cap: SET_BATCH_LIMIT,
            got: distinct.len(),
        });
    }

    let items: Vec<&SetItem> = items.iter().collect();
    apply_set_items(service, graph, &items, bindings, cache, ctx, report).await
}

/// Apply SET items in source order. A service failure aborts the remaining
/// items for the failing item's variable only; items for other variables
/// still run, and the first failure then surfaces as the query error.
async fn apply_set_items<S: GraphService>(
    service: &S,
    graph: GraphId,
    items: &[&SetItem],
    bindings: &Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<()> {
    // Type labels resolve before the first update goes out, so an unknown
    // label refuses the whole query pre-mutation.
    let mut type_ids: HashMap<&str, NodeId> = HashMap::new();
    for item in items {
        if let SetItem::TypeLabel { label, .. } = item {
            if !type_ids.contains_key(label.as_str()) {
                let type_thought = cache.require(service, graph, label).await?;
                type_ids.insert(label, type_thought.id);
            }
        }
    }

    let mut aborted: HashSet<&str> = HashSet::new();
    let mut failure: Option<ServiceError> = None;

    for item in items {
        let variable = item.variable();
        if aborted.contains(variable) {
            continue;
        }

        let failed = match item {
            SetItem::Property { property, value, .. } => {
                let write = WriteProperty::from_property(property).ok_or_else(|| {
                    Error::Semantic(format!("property '{property}' is not settable"))
                })?;
                let mut failed = None;
                for t in bindings.candidates_of(variable) {
                    match service.update_node(graph, t.id, write, value.as_deref()).await {
                        Ok(()) => {
                            ctx.mutated = true;
                            report.updated.push(Updated { id: t.id, property: property.clone() });
                        }
                        Err(e) => {
                            failed = Some(e);
                            break;
                        }
                    }
                }
                failed
            }
            SetItem::TypeLabel { label, .. } => {
                let type_id = type_ids[label.as_str()];
                let mut failed = None;
                for t in bindings.candidates_of(variable) {
                    match service.update_type(graph, t.id, Some(type_id)).await {
                        Ok(()) => {
                            ctx.mutated = true;
                            report.updated.push(Updated { id: t.id, property: "typeId".into() });
                        }
                        Err(e) => {
                            failed = Some(e);
                            break;
                        }
                    }
                }
                failed
            }
        };

        if let Some(e) = failed {
            warn!(variable = %variable, "update failed; aborting this variable's remaining items");
            aborted.insert(variable);
            failure.get_or_insert(e);
        }
    }

    match failure {
        Some(source) => Err(ctx.fail(source)),
        None => {
            debug!(updates = report.updated.len(), "applied SET items");
            Ok(())
        }
    }
}

// ============================================================================
// CREATE
// ============================================================================

/// Create nodes and edges, in pattern order. Endpoints that matched nothing
/// during the read phase produce a warning and skip their pattern; nothing
/// is partially wired.
pub async fn execute_create<S: GraphService>(
    service: &S,
    graph: GraphId,
    create: &CreatePart,
    bindings: &mut Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<()> {
    for pattern in &create.patterns {
        if !ensure_endpoint(service, graph, &pattern.head, bindings, cache, ctx, report).await? {
            continue;
        }

        let mut current = pattern.head.variable.clone();
        for (rel, node) in &pattern.tail {
            let sources = bindings.candidates_of(&current).to_vec();
            if sources.is_empty() {
                push_endpoint_warning(report, &current);
                break;
            }
            let relation = match &rel.relations {
                RelationSet::Single(r) => *r,
                _ => {
                    return Err(Error::Semantic(
                        "write patterns require a single concrete relation type".into(),
                    ))
                }
            };

            if !ensure_endpoint(service, graph, node, bindings, cache, ctx, report).await? {
                break;
            }
            let targets = bindings.candidates_of(&node.variable).to_vec();

            for src in &sources {
                for tgt in &targets {
                    let edge_id = service
                        .create_edge(graph, src.id, relation, tgt.id)
                        .await
                        .map_err(|e| ctx.fail(e))?;
                    ctx.mutated = true;
                    report.created.push(Created::Edge {
                        id: edge_id,
                        source: src.id,
                        relation,
                        target: tgt.id,
                    });
                }
            }
            current = node.variable.clone();
        }
    }

    Ok(())
}

/// Make sure a write-pattern endpoint has candidates: already-bound
/// variables are used as-is, new ones are created. Returns false (with a
/// warning recorded) when the endpoint matched nothing.
async fn ensure_endpoint<S: GraphService>(
    service: &S,
    graph: GraphId,
    node: &NodePattern,
    bindings: &mut Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<bool> {
    if let Some(existing) = bindings.candidates.get(&node.variable) {
        if existing.is_empty() {
            push_endpoint_warning(report, &node.variable);
            return Ok(false);
        }
        return Ok(true);
    }

    let Some(name) = &node.name else {
        return Err(Error::Semantic(format!(
            "cannot create '{}' without a {{name: \"...\"}} constraint",
            node.variable
        )));
    };

    let type_id = match &node.type_label {
        Some(label) => Some(cache.require(service, graph, label).await?.id),
        None => None,
    };

    let spec = NewThought::new(name.clone()).with_type(type_id);
    let id = service.create_node(graph, spec).await.map_err(|e| ctx.fail(e))?;
    ctx.mutated = true;
    report.created.push(Created::Node { id, name: name.clone(), type_id });

    let mut thought = Thought::new(id, name.clone());
    thought.type_id = type_id;
    bindings.bind(&node.variable, vec![thought]);
    Ok(true)
}

fn push_endpoint_warning(report: &mut MutationReport, variable: &str) {
    report
        .warnings
        .push(format!("under-constrained endpoint '{variable}': no nodes matched; nothing created"));
}

// ============================================================================
// MERGE
// ============================================================================

/// Match-or-create each merge node by strict exact name (plus type, when
/// labelled), wire edges where an endpoint is new, then apply the
/// conditional SET clauses.
pub async fn execute_merge<S: GraphService>(
    service: &S,
    graph: GraphId,
    merge: &MergePart,
    bindings: &mut Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<()> {
    // Resolve every type label up front: unknown labels refuse the query
    // before anything is created.
    for label in merge_type_labels(merge) {
        cache.require(service, graph, label).await?;
    }

    let mut created_vars: HashSet<String> = HashSet::new();
    let mut matched_vars: HashSet<String> = HashSet::new();

    for pattern in &merge.patterns {
        if !merge_node(
            service, graph, &pattern.head, bindings, cache, ctx, report,
            &mut created_vars, &mut matched_vars,
        )
        .await?
        {
            continue;
        }

        let mut current = pattern.head.variable.clone();
        for (rel, node) in &pattern.tail {
            let relation = match &rel.relations {
                RelationSet::Single(r) => *r,
                _ => {
                    return Err(Error::Semantic(
                        "write patterns require a single concrete relation type".into(),
                    ))
                }
            };

            if !merge_node(
                service, graph, node, bindings, cache, ctx, report,
                &mut created_vars, &mut matched_vars,
            )
            .await?
            {
                break;
            }

            let either_new =
                created_vars.contains(&current) || created_vars.contains(&node.variable);
            if either_new {
                let src = bindings.candidates_of(&current)[0].id;
                let tgt = bindings.candidates_of(&node.variable)[0].id;
                let edge_id = service
                    .create_edge(graph, src, relation, tgt)
                    .await
                    .map_err(|e| ctx.fail(e))?;
                ctx.mutated = true;
                report.created.push(Created::Edge {
                    id: edge_id,
                    source: src,
                    relation,
                    target: tgt,
                });
            }
            current = node.variable.clone();
        }
    }

    apply_on_set(
        service, graph, &merge.on_create, &created_vars, &merge.on_match, &matched_vars,
        bindings, cache, ctx, report,
    )
    .await
}

fn merge_type_labels(merge: &MergePart) -> impl Iterator<Item = &str> {
    let pattern_labels = merge
        .patterns
        .iter()
        .flat_map(|p| p.nodes())
        .filter_map(|n| n.type_label.as_deref());
    let set_labels = merge
        .on_create
        .iter()
        .chain(&merge.on_match)
        .filter_map(|item| match item {
            SetItem::TypeLabel { label, .. } => Some(label.as_str()),
            _ => None,
        });
    pattern_labels.chain(set_labels)
}

/// Match-or-create one merge node; binds the variable to a single thought.
#[allow(clippy::too_many_arguments)]
async fn merge_node<S: GraphService>(
    service: &S,
    graph: GraphId,
    node: &NodePattern,
    bindings: &mut Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
    created_vars: &mut HashSet<String>,
    matched_vars: &mut HashSet<String>,
) -> Result<bool> {
    if created_vars.contains(&node.variable) || matched_vars.contains(&node.variable) {
        return Ok(true);
    }

    // A variable the MATCH phase bound is a matched item for MERGE.
    if let Some(existing) = bindings.candidates.get(&node.variable) {
        if existing.is_empty() {
            push_endpoint_warning(report, &node.variable);
            return Ok(false);
        }
        if existing.len() > 1 {
            report.warnings.push(format!(
                "ambiguous MERGE match for '{}': {} candidates, using \"{}\"",
                node.variable,
                existing.len(),
                existing[0].name
            ));
            let first = existing[0].clone();
            bindings.bind(&node.variable, vec![first]);
        }
        let id = bindings.candidates_of(&node.variable)[0].id;
        report.matched.push(id);
        matched_vars.insert(node.variable.clone());
        return Ok(true);
    }

    let Some(name) = &node.name else {
        return Err(Error::Semantic(format!(
            "MERGE variable '{}' needs a {{name: \"...\"}} constraint",
            node.variable
        )));
    };

    let type_id = match &node.type_label {
        Some(label) => Some(cache.require(service, graph, label).await?.id),
        None => None,
    };

    let hit = service.get_by_name(graph, name).await.map_err(|e| ctx.fail(e))?;
    let type_matches =
        |t: &Thought| type_id.is_none() || t.type_id == type_id;

    match hit.filter(type_matches) {
        Some(found) => {
            debug!(variable = %node.variable, id = %found.id, "MERGE matched existing node");
            report.matched.push(found.id);
            matched_vars.insert(node.variable.clone());
            bindings.bind(&node.variable, vec![found]);
        }
        None => {
            let spec = NewThought::new(name.clone()).with_type(type_id);
            let id = service.create_node(graph, spec).await.map_err(|e| ctx.fail(e))?;
            ctx.mutated = true;
            debug!(variable = %node.variable, %id, "MERGE created node");
            report.created.push(Created::Node { id, name: name.clone(), type_id });
            let mut thought = Thought::new(id, name.clone());
            thought.type_id = type_id;
            bindings.bind(&node.variable, vec![thought]);
            created_vars.insert(node.variable.clone());
        }
    }
    Ok(true)
}

/// Apply ON CREATE SET to created items and ON MATCH SET to matched ones,
/// in clause order, under the SET batch cap.
#[allow(clippy::too_many_arguments)]
async fn apply_on_set<S: GraphService>(
    service: &S,
    graph: GraphId,
    on_create: &[SetItem],
    created_vars: &HashSet<String>,
    on_match: &[SetItem],
    matched_vars: &HashSet<String>,
    bindings: &Bindings,
    cache: &mut TypeCache,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<()> {
    let applicable: Vec<&SetItem> = on_create
        .iter()
        .filter(|item| created_vars.contains(item.variable()))
        .chain(on_match.iter().filter(|item| matched_vars.contains(item.variable())))
        .collect();

    let mut distinct: HashSet<NodeId> = HashSet::new();
    for item in &applicable {
        for t in bindings.candidates_of(item.variable()) {
            distinct.insert(t.id);
        }
    }
    if distinct.len() > SET_BATCH_LIMIT {
        return Err(Error::LimitExceeded {
            what: "SET batch",
            cap: SET_BATCH_LIMIT,
            got: distinct.len(),
        });
    }

    apply_set_items(service, graph, &applicable, bindings, cache, ctx, report).await
}

// ============================================================================
// DELETE
// ============================================================================

/// Compute the delete target set from bindings; preview it unless the
/// caller confirmed. The preview and the confirmed execution share the
/// exact same target computation.
pub async fn execute_delete<S: GraphService>(
    service: &S,
    graph: GraphId,
    delete: &DeletePart,
    bindings: &Bindings,
    confirm: bool,
    ctx: &mut MutationCtx,
    report: &mut MutationReport,
) -> Result<Option<DeletePreview>> {
    let mut nodes: Vec<Thought> = Vec::new();
    let mut node_seen: HashSet<NodeId> = HashSet::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_seen: HashSet<(NodeId, u8, NodeId)> = HashSet::new();

    for var in &delete.variables {
        if let Some(candidates) = bindings.candidates.get(var) {
            for t in candidates {
                if node_seen.insert(t.id) {
                    nodes.push(t.clone());
                }
            }
        } else if let Some(bound_edges) = bindings.edges.get(var) {
            for e in bound_edges {
                if edge_seen.insert((e.source, e.relation.code(), e.target)) {
                    edges.push(*e);
                }
            }
        }
    }

    if nodes.len() > DELETE_BATCH_LIMIT {
        warn!(got = nodes.len(), cap = DELETE_BATCH_LIMIT, "refusing oversized DELETE batch");
        return Err(Error::LimitExceeded {
            what: "DELETE batch",
            cap: DELETE_BATCH_LIMIT,
            got: nodes.len(),
        });
    }

    if !confirm {
        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "DELETE without confirm; returning preview"
        );
        return Ok(Some(DeletePreview {
            would_delete_nodes: nodes,
            would_delete_edges: edges,
        }));
    }

    for edge in &edges {
        match edge.edge_id {
            Some(id) => {
                service.delete_edge(graph, id).await.map_err(|e| ctx.fail(e))?;
                ctx.mutated = true;
                report.deleted.push(Deleted::Edge { id });
            }
            None => report.warnings.push(format!(
                "edge {} -{}-> {} carries no id; left for the service to clean up",
                edge.source, edge.relation, edge.target
            )),
        }
    }

    for node in &nodes {
        service.delete_node(graph, node.id).await.map_err(|e| ctx.fail(e))?;
        ctx.mutated = true;
        report.deleted.push(Deleted::Node { id: node.id, name: node.name.clone() });
    }

    Ok(None)
}
