//! Query execution engine.
//!
//! Orchestrates resolution, traversal, predicate filtering, mutation, and
//! projection for one validated, planned query. All state lives on the
//! stack of one execution; nothing is cached across queries.

pub mod mutate;
pub mod predicate;
pub mod project;
pub mod resolve;
pub mod traverse;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::bql::ast::{HopSpec, MatchPart, Pattern, Query};
use crate::model::{Edge, EdgeId, GraphId, NodeId, Relation, Rows, Thought};
use crate::plan::{QueryPlan, Strategy};
use crate::service::{GraphService, ServiceError};
use crate::{Error, ExecuteOptions, FailurePhase, Result};

use predicate::EvalContext;
use resolve::{SimilarHits, TypeCache};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of executing one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// Projected rows of a read query.
    Rows(Rows),
    /// What a mutation changed.
    Mutation(MutationReport),
    /// Dry-run of an unconfirmed DELETE. Not an error: the caller re-runs
    /// with `confirm` once satisfied.
    Preview(DeletePreview),
}

impl Outcome {
    pub fn rows(&self) -> Option<&Rows> {
        match self {
            Outcome::Rows(rows) => Some(rows),
            Outcome::Mutation(report) => report.rows.as_ref(),
            Outcome::Preview(_) => None,
        }
    }

    pub fn mutation(&self) -> Option<&MutationReport> {
        match self {
            Outcome::Mutation(report) => Some(report),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&DeletePreview> {
        match self {
            Outcome::Preview(preview) => Some(preview),
            _ => None,
        }
    }
}

/// What a CREATE / SET / MERGE / confirmed DELETE changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReport {
    pub created: Vec<Created>,
    pub updated: Vec<Updated>,
    pub deleted: Vec<Deleted>,
    /// Nodes a MERGE found instead of creating.
    pub matched: Vec<NodeId>,
    pub warnings: Vec<String>,
    /// Projection of the RETURN list, when the query carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Rows>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Created {
    Node {
        id: NodeId,
        name: String,
        #[serde(rename = "typeId", skip_serializing_if = "Option::is_none")]
        type_id: Option<NodeId>,
    },
    Edge {
        id: EdgeId,
        source: NodeId,
        relation: Relation,
        target: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Updated {
    pub id: NodeId,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Deleted {
    Node { id: NodeId, name: String },
    Edge { id: EdgeId },
}

/// A faithful dry-run: exactly the targets a confirmed execution would
/// remove.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePreview {
    pub would_delete_nodes: Vec<Thought>,
    pub would_delete_edges: Vec<Edge>,
}

// ============================================================================
// Bindings
// ============================================================================

/// Everything bound while executing one query: candidate sets per variable,
/// recorded edges per relation variable, and the arrival pairs projection
/// joins on.
#[derive(Debug, Default)]
pub struct Bindings {
    pub candidates: HashMap<String, Vec<Thought>>,
    pub edges: HashMap<String, Vec<Edge>>,
    pub joins: Vec<PatternJoin>,
    pub similar_hits: SimilarHits,
}

impl Bindings {
    pub fn candidates_of(&self, variable: &str) -> &[Thought] {
        self.candidates.get(variable).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn thought(&self, variable: &str, id: NodeId) -> Option<&Thought> {
        self.candidates_of(variable).iter().find(|t| t.id == id)
    }

    fn bind(&mut self, variable: &str, thoughts: Vec<Thought>) {
        self.candidates.insert(variable.to_string(), thoughts);
    }
}

/// Join structure of one pattern, left to right.
#[derive(Debug)]
pub struct PatternJoin {
    pub head: String,
    pub hops: Vec<HopJoin>,
}

/// Arrival pairs of one relationship pattern, pruned to surviving targets.
#[derive(Debug)]
pub struct HopJoin {
    pub source: String,
    pub target: String,
    pub pairs: Vec<(NodeId, NodeId)>,
}

/// Tracks whether any mutation has already been sent, to categorize a
/// later failure as partially applied rather than pre-mutation. Applied
/// mutations are never rolled back: the graph service is the source of
/// truth.
#[derive(Debug, Default)]
pub struct MutationCtx {
    pub mutated: bool,
}

impl MutationCtx {
    pub fn fail(&self, source: ServiceError) -> Error {
        let phase = if self.mutated {
            FailurePhase::PartiallyApplied
        } else {
            FailurePhase::PreMutation
        };
        Error::Service { phase, source }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Execute a validated, planned query against the graph service.
pub async fn run<S: GraphService>(
    service: &S,
    opts: &ExecuteOptions,
    query: &Query,
    plan: &QueryPlan,
) -> Result<Outcome> {
    let graph = opts.graph;
    let mut cache = TypeCache::new();

    match query {
        Query::Read { read, returns } => {
            let bindings = run_read(service, graph, read, plan, &mut cache).await?;
            if read.set_items.is_empty() {
                return Ok(Outcome::Rows(project::project(returns, &bindings)));
            }
            let mut report = MutationReport::default();
            let mut mctx = MutationCtx::default();
            mutate::execute_set(
                service, graph, &read.set_items, &bindings, &mut cache, &mut mctx, &mut report,
            )
            .await?;
            attach_rows(&mut report, returns, &bindings);
            Ok(Outcome::Mutation(report))
        }

        Query::WriteStandalone { create, returns } => {
            let mut bindings = Bindings::default();
            let mut report = MutationReport::default();
            let mut mctx = MutationCtx::default();
            mutate::execute_create(
                service, graph, create, &mut bindings, &mut cache, &mut mctx, &mut report,
            )
            .await?;
            attach_rows(&mut report, returns, &bindings);
            Ok(Outcome::Mutation(report))
        }

        Query::ReadWrite { read, create, returns } => {
            let mut bindings = run_read(service, graph, read, plan, &mut cache).await?;
            let mut report = MutationReport::default();
            let mut mctx = MutationCtx::default();
            if !read.set_items.is_empty() {
                mutate::execute_set(
                    service, graph, &read.set_items, &bindings, &mut cache, &mut mctx, &mut report,
                )
                .await?;
            }
            mutate::execute_create(
                service, graph, create, &mut bindings, &mut cache, &mut mctx, &mut report,
            )
            .await?;
            attach_rows(&mut report, returns, &bindings);
            Ok(Outcome::Mutation(report))
        }

        Query::Upsert { merge, returns } => {
            let mut bindings = Bindings::default();
            let mut report = MutationReport::default();
            let mut mctx = MutationCtx::default();
            mutate::execute_merge(
                service, graph, merge, &mut bindings, &mut cache, &mut mctx, &mut report,
            )
            .await?;
            attach_rows(&mut report, returns, &bindings);
            Ok(Outcome::Mutation(report))
        }

        Query::ReadUpsert { read, merge, returns } => {
            let mut bindings = run_read(service, graph, read, plan, &mut cache).await?;
            let mut report = MutationReport::default();
            let mut mctx = MutationCtx::default();
            if !read.set_items.is_empty() {
                mutate::execute_set(
                    service, graph, &read.set_items, &bindings, &mut cache, &mut mctx, &mut report,
                )
                .await?;
            }
            mutate::execute_merge(
                service, graph, merge, &mut bindings, &mut cache, &mut mctx, &mut report,
            )
            .await?;
            attach_rows(&mut report, returns, &bindings);
            Ok(Outcome::Mutation(report))
        }

        Query::ReadDelete { read, delete } => {
            let bindings = run_read(service, graph, read, plan, &mut cache).await?;
            let mut report = MutationReport::default();
            let mut mctx = MutationCtx::default();
            let preview = mutate::execute_delete(
                service, graph, delete, &bindings, opts.confirm, &mut mctx, &mut report,
            )
            .await?;
            match preview {
                Some(preview) => Ok(Outcome::Preview(preview)),
                None => Ok(Outcome::Mutation(report)),
            }
        }
    }
}

fn attach_rows(report: &mut MutationReport, returns: &[crate::bql::ast::ReturnItem], bindings: &Bindings) {
    if !returns.is_empty() {
        report.rows = Some(project::project(returns, bindings));
    }
}

// ============================================================================
// Read phase
// ============================================================================

/// Resolve every pattern variable and traverse every relationship,
/// left-to-right. Patterns whose head is fed by another pattern's traversal
/// wait until that binding exists.
async fn run_read<S: GraphService>(
    service: &S,
    graph: GraphId,
    read: &MatchPart,
    plan: &QueryPlan,
    cache: &mut TypeCache,
) -> Result<Bindings> {
    let mut bindings = Bindings::default();

    for pattern in &read.patterns {
        for rel in pattern.relationships() {
            if let Some(var) = &rel.variable {
                bindings.edges.entry(var.clone()).or_default();
            }
        }
    }

    let mut pending: Vec<&Pattern> = read.patterns.iter().collect();
    while !pending.is_empty() {
        let mut progressed = false;
        let mut rest: Vec<&Pattern> = Vec::new();

        for pattern in pending {
            let head = pattern.head.variable.as_str();
            let head_ready = bindings.candidates.contains_key(head)
                || plan
                    .var(head)
                    .map(|v| v.strategy != Strategy::Downstream)
                    .unwrap_or(false);
            if head_ready {
                execute_pattern(service, graph, pattern, plan, cache, &mut bindings).await?;
                progressed = true;
            } else {
                rest.push(pattern);
            }
        }

        if !progressed {
            return Err(Error::Resolution(
                "patterns depend on each other in a cycle; anchor at least one \
                 variable with a name"
                    .into(),
            ));
        }
        pending = rest;
    }

    Ok(bindings)
}

async fn execute_pattern<S: GraphService>(
    service: &S,
    graph: GraphId,
    pattern: &Pattern,
    plan: &QueryPlan,
    cache: &mut TypeCache,
    bindings: &mut Bindings,
) -> Result<()> {
    let head_var = pattern.head.variable.as_str();

    if !bindings.candidates.contains_key(head_var) {
        let var_plan = plan.var(head_var).ok_or_else(|| {
            Error::Resolution(format!("variable '{head_var}' has no resolution plan"))
        })?;
        let mut candidates =
            resolve::resolve_candidates(service, graph, var_plan, cache, &mut bindings.similar_hits)
                .await?;
        if let Some(pred) = &var_plan.predicate {
            let ctx = EvalContext { similar_hits: &bindings.similar_hits };
            candidates = predicate::filter(pred, &ctx, candidates);
        }
        bindings.bind(head_var, candidates);
    }

    let mut join = PatternJoin { head: head_var.to_string(), hops: Vec::new() };
    let mut current = head_var.to_string();

    for (rel, node) in &pattern.tail {
        let sources = bindings.candidates_of(&current).to_vec();
        let traversal = traverse::expand(service, graph, &sources, rel).await?;

        // The target's own constraints post-filter the reached set; they
        // never trigger lookups of their own.
        let mut targets = traversal.reached;
        if let Some(var_plan) = plan.var(&node.variable) {
            if let Some(name) = &var_plan.inline_name {
                targets.retain(|t| &t.name == name);
            }
            if let Some(label) = &var_plan.type_label {
                let type_thought = cache.require(service, graph, label).await?;
                targets.retain(|t| t.type_id == Some(type_thought.id));
            }
            if let Some(pred) = &var_plan.predicate {
                let ctx = EvalContext { similar_hits: &bindings.similar_hits };
                targets = predicate::filter(pred, &ctx, targets);
            }
        }

        // A re-occurring variable narrows to the intersection.
        if let Some(existing) = bindings.candidates.get(&node.variable) {
            let existing_ids: HashSet<NodeId> = existing.iter().map(|t| t.id).collect();
            targets.retain(|t| existing_ids.contains(&t.id));
        }

        let target_ids: HashSet<NodeId> = targets.iter().map(|t| t.id).collect();

        // Single-hop relation variables bind only the edges whose target
        // survived filtering; ranged hops keep the whole traversed path.
        if let Some(rel_var) = &rel.variable {
            let recorded = traversal.edges.iter().copied().filter(|e| {
                rel.hops != HopSpec::SINGLE || target_ids.contains(&e.target)
            });
            bindings.edges.entry(rel_var.clone()).or_default().extend(recorded);
        }

        let pairs = traversal
            .pairs
            .into_iter()
            .filter(|(_, target)| target_ids.contains(target))
            .collect();

        debug!(
            source = %current,
            target = %node.variable,
            count = targets.len(),
            "bound traversal target"
        );

        bindings.bind(&node.variable, targets);
        join.hops.push(HopJoin {
            source: current.clone(),
            target: node.variable.clone(),
            pairs,
        });
        current = node.variable.clone();
    }

    bindings.joins.push(join);
    Ok(())
}
