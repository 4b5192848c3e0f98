//! Query planner — assigns a resolution strategy to every pattern variable
//! and routes each WHERE predicate to the one variable it filters.
//!
//! The planner is service-agnostic: it looks only at the validated AST and
//! produces a plan the execution engine maps to graph-service calls.

use std::collections::HashSet;

use crate::bql::ast::{MatchPart, NameOp, Query, WhereAtom, WhereExpr};
use crate::{Error, Result};

/// How a variable's candidate set gets produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Name-driven lookups, unioned in order. A single `Eq` driver is the
    /// strict exact-name case; `Similar` is exact-first with a ranked
    /// search fallback.
    Lookup(Vec<Driver>),
    /// A bare `:T` pattern resolves to the type node itself, never to its
    /// instances, which would mean enumerating an uber-node.
    TypeAnchor,
    /// Right-hand endpoint of a relationship; the traversal executor
    /// produces the candidates and the variable's own constraints become
    /// post-filters.
    Downstream,
}

/// One name-driven lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub op: NameOp,
    pub value: String,
}

/// Per-variable resolution plan.
#[derive(Debug, Clone, PartialEq)]
pub struct VarPlan {
    pub variable: String,
    pub strategy: Strategy,
    pub type_label: Option<String>,
    pub inline_name: Option<String>,
    /// This variable's slice of the WHERE tree, applied as a post-filter.
    pub predicate: Option<WhereExpr>,
}

/// The full plan for a query's read phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    /// Variable plans in first-appearance (resolution) order.
    pub vars: Vec<VarPlan>,
}

impl QueryPlan {
    pub fn var(&self, name: &str) -> Option<&VarPlan> {
        self.vars.iter().find(|v| v.variable == name)
    }
}

/// Build the plan for a validated query.
pub fn plan(query: &Query) -> Result<QueryPlan> {
    let Some(read) = query.read_part() else {
        return Ok(QueryPlan::default());
    };
    plan_read(read)
}

fn plan_read(read: &MatchPart) -> Result<QueryPlan> {
    let downstream: HashSet<&str> = read
        .patterns
        .iter()
        .flat_map(|p| p.tail.iter().map(|(_, node)| node.variable.as_str()))
        .collect();

    let predicates = split_where(read.where_clause.as_ref())?;

    let mut vars: Vec<VarPlan> = Vec::new();
    for pattern in &read.patterns {
        for node in pattern.nodes() {
            if vars.iter().any(|v| v.variable == node.variable) {
                continue;
            }
            let predicate = predicates
                .iter()
                .find(|(var, _)| var == &node.variable)
                .map(|(_, expr)| expr.clone());

            let strategy = choose_strategy(
                &node.variable,
                node.name.as_deref(),
                node.type_label.as_deref(),
                predicate.as_ref(),
                downstream.contains(node.variable.as_str()),
            )?;

            vars.push(VarPlan {
                variable: node.variable.clone(),
                strategy,
                type_label: node.type_label.clone(),
                inline_name: node.name.clone(),
                predicate,
            });
        }
    }

    Ok(QueryPlan { vars })
}

fn choose_strategy(
    variable: &str,
    inline_name: Option<&str>,
    type_label: Option<&str>,
    predicate: Option<&WhereExpr>,
    downstream: bool,
) -> Result<Strategy> {
    if downstream {
        return Ok(Strategy::Downstream);
    }

    if let Some(name) = inline_name {
        return Ok(Strategy::Lookup(vec![Driver { op: NameOp::Eq, value: name.to_string() }]));
    }

    if let Some(expr) = predicate {
        let drivers = positive_drivers(expr);
        if !drivers.is_empty() {
            return Ok(Strategy::Lookup(drivers));
        }
    }

    if type_label.is_some() {
        return Ok(Strategy::TypeAnchor);
    }

    Err(Error::Resolution(format!(
        "variable '{variable}' is under-constrained: give it a {{name: \"...\"}} \
         constraint, a name predicate, or bind it through a relationship"
    )))
}

/// Positive (not-negated) name atoms, in document order. Each becomes a
/// lookup whose results are unioned before the predicate tree post-filters.
fn positive_drivers(expr: &WhereExpr) -> Vec<Driver> {
    fn walk(expr: &WhereExpr, negated: bool, out: &mut Vec<Driver>) {
        match expr {
            WhereExpr::Or(a, b) | WhereExpr::Xor(a, b) | WhereExpr::And(a, b) => {
                walk(a, negated, out);
                walk(b, negated, out);
            }
            WhereExpr::Not(inner) => walk(inner, !negated, out),
            WhereExpr::Atom(WhereAtom::NameCompare { op, value, .. }) if !negated => {
                out.push(Driver { op: *op, value: value.clone() });
            }
            WhereExpr::Atom(_) => {}
        }
    }
    let mut out = Vec::new();
    walk(expr, false, &mut out);
    out
}

/// Split the WHERE tree into per-variable subtrees along top-level ANDs.
/// Every conjunct must touch exactly one variable; conjuncts for the same
/// variable are re-joined with AND in source order.
fn split_where(where_clause: Option<&WhereExpr>) -> Result<Vec<(String, WhereExpr)>> {
    let Some(expr) = where_clause else {
        return Ok(Vec::new());
    };

    let mut out: Vec<(String, WhereExpr)> = Vec::new();
    for conjunct in conjuncts(expr) {
        let vars = conjunct.variables();
        let var = match vars.as_slice() {
            [single] => single.to_string(),
            _ => {
                return Err(Error::Semantic(
                    "each WHERE predicate must apply to a single variable; \
                     split multi-variable conditions with AND"
                        .into(),
                ))
            }
        };
        match out.iter_mut().find(|(v, _)| v == &var) {
            Some((_, existing)) => {
                let prev = existing.clone();
                *existing = WhereExpr::And(Box::new(prev), Box::new(conjunct.clone()));
            }
            None => out.push((var, conjunct.clone())),
        }
    }
    Ok(out)
}

fn conjuncts(expr: &WhereExpr) -> Vec<&WhereExpr> {
    match expr {
        WhereExpr::And(a, b) => {
            let mut out = conjuncts(a);
            out.extend(conjuncts(b));
            out
        }
        other => vec![other],
    }
}
