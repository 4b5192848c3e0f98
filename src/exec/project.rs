//! Result projector — assembles rows from bindings and a RETURN list.
//!
//! Variables bound to each other by relationships produce rows from the
//! traversal's recorded arrival pairs; unrelated variables combine as a
//! cartesian product. Candidate sets are deduplicated, but distinct
//! traversal paths may repeat a row.

use std::collections::HashSet;

use crate::bql::ast::{ReturnField, ReturnItem};
use crate::model::{NodeId, Rows, Value};

use super::{Bindings, PatternJoin};

/// Project the RETURN list over the bindings.
pub fn project(returns: &[ReturnItem], bindings: &Bindings) -> Rows {
    if returns.is_empty() {
        return Rows::default();
    }

    let mut projected_vars: Vec<&str> = Vec::new();
    for item in returns {
        if !projected_vars.contains(&item.variable.as_str()) {
            projected_vars.push(&item.variable);
        }
    }

    // One table per pattern that touches a projected variable, joined in
    // pattern order; projected variables no pattern covers (e.g. nodes a
    // write clause introduced) stand alone.
    let mut tables: Vec<Table> = Vec::new();
    let mut covered: HashSet<&str> = HashSet::new();

    for join in &bindings.joins {
        let table = pattern_table(join, bindings);
        let relevant: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| projected_vars.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();
        if relevant.is_empty() {
            continue;
        }
        for &i in &relevant {
            if let Some(var) = projected_vars.iter().find(|v| **v == table.columns[i]) {
                covered.insert(*var);
            }
        }
        tables.push(table.select(&relevant));
    }

    for var in &projected_vars {
        if !covered.contains(var) {
            tables.push(Table {
                columns: vec![var.to_string()],
                rows: bindings.candidates_of(var).iter().map(|t| vec![t.id]).collect(),
            });
        }
    }

    let joined = tables
        .into_iter()
        .reduce(natural_join)
        .unwrap_or(Table { columns: Vec::new(), rows: Vec::new() });

    // Materialize cells per RETURN item.
    let columns: Vec<String> = returns.iter().map(|item| item.to_string()).collect();
    let mut rows = Vec::new();
    for row in &joined.rows {
        let mut out = Vec::with_capacity(returns.len());
        for item in returns {
            let idx = joined.columns.iter().position(|c| c == &item.variable);
            let cell = match idx {
                Some(idx) => cell_for(item, row[idx], bindings),
                None => Value::Null,
            };
            out.push(cell);
        }
        rows.push(out);
    }

    Rows { columns, rows }
}

fn cell_for(item: &ReturnItem, id: NodeId, bindings: &Bindings) -> Value {
    let Some(thought) = bindings.thought(&item.variable, id) else {
        return Value::Null;
    };
    match item.field {
        None => Value::Thought(Box::new(thought.clone())),
        Some(ReturnField::Name) => Value::Text(thought.name.clone()),
        Some(ReturnField::Id) => Value::Id(thought.id),
    }
}

/// An intermediate row set keyed by variable columns.
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<NodeId>>,
}

impl Table {
    fn select(self, indices: &[usize]) -> Table {
        Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i]).collect())
                .collect(),
        }
    }
}

/// Rows of one pattern, built head-first by walking the recorded arrival
/// pairs. Membership checks against the final candidate sets apply the
/// narrowing later patterns may have introduced.
fn pattern_table(join: &PatternJoin, bindings: &Bindings) -> Table {
    let mut columns = vec![join.head.clone()];
    let mut rows: Vec<Vec<NodeId>> = bindings
        .candidates_of(&join.head)
        .iter()
        .map(|t| vec![t.id])
        .collect();

    for hop in &join.hops {
        let Some(src_idx) = columns.iter().position(|c| c == &hop.source) else {
            continue;
        };

        if let Some(tgt_idx) = columns.iter().position(|c| c == &hop.target) {
            // Re-occurring variable: the hop only constrains consistency.
            let pair_set: HashSet<(NodeId, NodeId)> = hop.pairs.iter().copied().collect();
            rows.retain(|row| pair_set.contains(&(row[src_idx], row[tgt_idx])));
        } else {
            columns.push(hop.target.clone());
            let final_ids: HashSet<NodeId> = bindings
                .candidates_of(&hop.target)
                .iter()
                .map(|t| t.id)
                .collect();
            let mut expanded = Vec::new();
            for row in &rows {
                for &(source, target) in &hop.pairs {
                    if source == row[src_idx] && final_ids.contains(&target) {
                        let mut next = row.clone();
                        next.push(target);
                        expanded.push(next);
                    }
                }
            }
            rows = expanded;
        }
    }

    Table { columns, rows }
}

/// Join two tables on their shared columns; with none shared this is the
/// cartesian product.
fn natural_join(a: Table, b: Table) -> Table {
    let shared: Vec<(usize, usize)> = a
        .columns
        .iter()
        .enumerate()
        .filter_map(|(i, col)| b.columns.iter().position(|c| c == col).map(|j| (i, j)))
        .collect();
    let b_extra: Vec<usize> = (0..b.columns.len())
        .filter(|j| !shared.iter().any(|(_, sj)| sj == j))
        .collect();

    let mut columns = a.columns.clone();
    columns.extend(b_extra.iter().map(|&j| b.columns[j].clone()));

    let mut rows = Vec::new();
    for ra in &a.rows {
        for rb in &b.rows {
            if shared.iter().all(|&(i, j)| ra[i] == rb[j]) {
                let mut row = ra.clone();
                row.extend(b_extra.iter().map(|&j| rb[j]));
                rows.push(row);
            }
        }
    }

    Table { columns, rows }
}
