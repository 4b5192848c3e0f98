//! Semantic validation — static rules checked after parse, before planning.
//!
//! Everything here refuses a query without touching the graph service.

use std::collections::HashSet;

use crate::model::RelationSet;
use crate::{Error, Result};

use super::ast::*;

/// Maximum hop upper bound a relationship pattern may carry.
pub const MAX_HOPS: u32 = 5;

/// Properties that may appear in `IS NULL` / `IS NOT NULL`.
const KNOWN_PROPERTIES: [&str; 7] = [
    "name", "id", "kind", "label", "typeId", "foregroundColor", "backgroundColor",
];

/// Properties assignable through `SET v.prop = ...`.
const SETTABLE_PROPERTIES: [&str; 4] = ["name", "label", "foregroundColor", "backgroundColor"];

/// Walk the AST and confirm every static rule.
pub fn validate(query: &Query) -> Result<()> {
    let scope = Scope::of(query);

    let read_patterns: &[Pattern] = query.read_part().map(|r| r.patterns.as_slice()).unwrap_or(&[]);
    let write_patterns = query.write_patterns();

    for pattern in read_patterns.iter().chain(write_patterns) {
        for rel in pattern.relationships() {
            check_hops(rel.hops)?;
        }
    }

    for pattern in write_patterns {
        check_write_pattern(pattern, &scope)?;
    }

    if let Query::Upsert { merge, .. } | Query::ReadUpsert { merge, .. } = query {
        check_merge(merge, &scope)?;
        check_set_items(&merge.on_create, &scope, SetContext::OnSet(merge))?;
        check_set_items(&merge.on_match, &scope, SetContext::OnSet(merge))?;
    }

    if let Some(read) = query.read_part() {
        if let Some(where_clause) = &read.where_clause {
            check_where(where_clause, &scope)?;
        }
        check_set_items(&read.set_items, &scope, SetContext::Plain)?;
    }

    for item in query.returns() {
        if !scope.node_vars.contains(item.variable.as_str()) {
            return Err(Error::Semantic(format!(
                "variable '{}' in RETURN is not bound by any pattern",
                item.variable
            )));
        }
    }

    if let Query::ReadDelete { delete, .. } = query {
        for var in &delete.variables {
            if !scope.node_vars.contains(var.as_str()) && !scope.rel_vars.contains(var.as_str()) {
                return Err(Error::Semantic(format!(
                    "variable '{var}' in DELETE is not bound by any pattern"
                )));
            }
        }
    }

    Ok(())
}

/// Variable scope derived from the query's patterns.
struct Scope<'q> {
    node_vars: HashSet<&'q str>,
    rel_vars: HashSet<&'q str>,
    /// Node variables bound by the MATCH part.
    match_vars: HashSet<&'q str>,
    /// Variables reached as the right-hand endpoint of a MATCH relationship.
    downstream: HashSet<&'q str>,
    /// Variables with an inline name constraint.
    named: HashSet<&'q str>,
}

impl<'q> Scope<'q> {
    fn of(query: &'q Query) -> Self {
        let mut scope = Scope {
            node_vars: HashSet::new(),
            rel_vars: HashSet::new(),
            match_vars: HashSet::new(),
            downstream: HashSet::new(),
            named: HashSet::new(),
        };

        if let Some(read) = query.read_part() {
            for pattern in &read.patterns {
                scope.add_pattern(pattern);
                for node in pattern.nodes() {
                    scope.match_vars.insert(&node.variable);
                }
                for (_, target) in &pattern.tail {
                    scope.downstream.insert(&target.variable);
                }
            }
        }
        for pattern in query.write_patterns() {
            scope.add_pattern(pattern);
        }
        scope
    }

    fn add_pattern(&mut self, pattern: &'q Pattern) {
        for node in pattern.nodes() {
            self.node_vars.insert(&node.variable);
            if node.name.is_some() {
                self.named.insert(&node.variable);
            }
        }
        for rel in pattern.relationships() {
            if let Some(var) = &rel.variable {
                self.rel_vars.insert(var);
            }
        }
    }
}

fn check_hops(hops: HopSpec) -> Result<()> {
    match hops.max {
        None => Err(Error::Semantic(format!(
            "hop specifier '{hops}' has no upper bound; use *N..M with M <= {MAX_HOPS}"
        ))),
        Some(max) if max > MAX_HOPS => Err(Error::LimitExceeded {
            what: "hop upper bound",
            cap: MAX_HOPS as usize,
            got: max as usize,
        }),
        Some(max) if hops.min > max => Err(Error::Semantic(format!(
            "hop specifier '{hops}' has a lower bound above its upper bound"
        ))),
        Some(_) => Ok(()),
    }
}

fn check_write_pattern(pattern: &Pattern, scope: &Scope) -> Result<()> {
    for rel in pattern.relationships() {
        if !matches!(rel.relations, RelationSet::Single(_)) {
            return Err(Error::Semantic(
                "write patterns require a single concrete relation type; \
                 wildcard and union relations are read-only"
                    .into(),
            ));
        }
        if rel.hops != HopSpec::SINGLE {
            return Err(Error::Semantic(
                "relationship patterns in write clauses take exactly one hop".into(),
            ));
        }
    }

    // Every node a write clause introduces needs a name to create it with.
    for node in pattern.nodes() {
        let introduced = !scope.match_vars.contains(node.variable.as_str());
        if introduced && node.name.is_none() {
            return Err(Error::Semantic(format!(
                "write clauses require a {{name: \"...\"}} constraint on new variable '{}'",
                node.variable
            )));
        }
    }

    Ok(())
}

fn check_merge(merge: &MergePart, scope: &Scope) -> Result<()> {
    for pattern in &merge.patterns {
        let introduces_named = pattern.nodes().any(|node| {
            !scope.match_vars.contains(node.variable.as_str()) && node.name.is_some()
        });
        if !introduces_named {
            return Err(Error::Semantic(
                "MERGE patterns must introduce at least one new variable \
                 with a {name: \"...\"} constraint"
                    .into(),
            ));
        }
    }
    Ok(())
}

fn check_where(expr: &WhereExpr, scope: &Scope) -> Result<()> {
    check_cross_variable(expr)?;

    for atom in atoms(expr) {
        let var = atom.variable();
        if scope.rel_vars.contains(var) {
            return Err(Error::Semantic(format!(
                "WHERE predicates apply to node variables, and '{var}' is a relationship"
            )));
        }
        if !scope.match_vars.contains(var) {
            return Err(Error::Semantic(format!(
                "variable '{var}' in WHERE is not bound by a MATCH pattern"
            )));
        }
        if let WhereAtom::IsNull { property, .. } | WhereAtom::IsNotNull { property, .. } = atom {
            if !KNOWN_PROPERTIES.contains(&property.as_str()) {
                return Err(Error::Semantic(format!(
                    "unknown property '{property}' in IS NULL check"
                )));
            }
        }
    }

    // A variable's predicates can only post-filter; something else has to
    // produce its candidates: an inline name, a positive name atom, or a
    // traversal chain feeding it.
    for var in expr.variables() {
        if scope.downstream.contains(var) || scope.named.contains(var) {
            continue;
        }
        if !has_positive_name_atom(expr, var, false) {
            return Err(Error::Semantic(format!(
                "predicates on '{var}' cannot drive its resolution; add a name \
                 predicate or bind '{var}' through a relationship"
            )));
        }
    }

    Ok(())
}

/// OR/XOR spanning more than one variable would need a joint candidate set
/// with no defining relationship; reject statically.
fn check_cross_variable(expr: &WhereExpr) -> Result<()> {
    match expr {
        WhereExpr::Or(a, b) | WhereExpr::Xor(a, b) => {
            let mut vars = a.variables();
            for v in b.variables() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
            if vars.len() > 1 {
                return Err(Error::Semantic(
                    "OR/XOR across different variables is not supported; \
                     run separate queries instead"
                        .into(),
                ));
            }
            check_cross_variable(a)?;
            check_cross_variable(b)
        }
        WhereExpr::And(a, b) => {
            check_cross_variable(a)?;
            check_cross_variable(b)
        }
        WhereExpr::Not(inner) => check_cross_variable(inner),
        WhereExpr::Atom(_) => Ok(()),
    }
}

fn atoms(expr: &WhereExpr) -> Vec<&WhereAtom> {
    match expr {
        WhereExpr::Or(a, b) | WhereExpr::Xor(a, b) | WhereExpr::And(a, b) => {
            let mut out = atoms(a);
            out.extend(atoms(b));
            out
        }
        WhereExpr::Not(inner) => atoms(inner),
        WhereExpr::Atom(atom) => vec![atom],
    }
}

/// True when the tree holds a name-comparison atom for `var` that is not
/// under a NOT.
fn has_positive_name_atom(expr: &WhereExpr, var: &str, negated: bool) -> bool {
    match expr {
        WhereExpr::Or(a, b) | WhereExpr::Xor(a, b) | WhereExpr::And(a, b) => {
            has_positive_name_atom(a, var, negated) || has_positive_name_atom(b, var, negated)
        }
        WhereExpr::Not(inner) => has_positive_name_atom(inner, var, !negated),
        WhereExpr::Atom(WhereAtom::NameCompare { variable, .. }) => !negated && variable == var,
        WhereExpr::Atom(_) => false,
    }
}

enum SetContext<'q> {
    /// `MATCH ... SET ...`
    Plain,
    /// `ON CREATE SET` / `ON MATCH SET`: items must target merge variables.
    OnSet(&'q MergePart),
}

fn check_set_items(items: &[SetItem], scope: &Scope, ctx: SetContext) -> Result<()> {
    for item in items {
        let var = item.variable();
        if !scope.node_vars.contains(var) {
            return Err(Error::Semantic(format!(
                "variable '{var}' in SET is not bound by any pattern"
            )));
        }
        if let SetContext::OnSet(merge) = &ctx {
            let in_merge = merge
                .patterns
                .iter()
                .flat_map(|p| p.nodes())
                .any(|n| n.variable == var);
            if !in_merge {
                return Err(Error::Semantic(format!(
                    "ON CREATE/ON MATCH SET applies to MERGE variables, and '{var}' is not one"
                )));
            }
        }

        if let SetItem::Property { property, value, .. } = item {
            if !SETTABLE_PROPERTIES.contains(&property.as_str()) {
                if matches!(property.as_str(), "id" | "typeId" | "kind") {
                    return Err(Error::Semantic(format!(
                        "'{property}' is never assignable; use 'SET {var}:TypeName' to change a type",
                        var = item.variable()
                    )));
                }
                return Err(Error::Semantic(format!(
                    "unknown settable property '{property}'; settable properties are \
                     name, label, foregroundColor, backgroundColor"
                )));
            }
            if property == "name" && value.is_none() {
                return Err(Error::Semantic("name cannot be cleared with NULL".into()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    fn check(query: &str) -> Result<()> {
        validate(&parse(query).unwrap())
    }

    #[test]
    fn bounded_hops_pass() {
        assert!(check("MATCH (a {name: \"A\"})-[:CHILD*1..5]->(b) RETURN b").is_ok());
    }

    #[test]
    fn unbounded_hops_fail() {
        let err = check("MATCH (a {name: \"A\"})-[:CHILD*2..]->(b) RETURN b").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");

        let err = check("MATCH (a {name: \"A\"})-[:CHILD*]->(b) RETURN b").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn hop_bound_above_cap_fails() {
        let err = check("MATCH (a {name: \"A\"})-[:CHILD*1..6]->(b) RETURN b").unwrap_err();
        assert!(
            matches!(err, Error::LimitExceeded { cap: 5, got: 6, .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn wildcard_relation_in_write_fails() {
        let err = check(
            "MATCH (n {name: \"A\"})-[:CHILD|JUMP]->(m) CREATE (m)-[:CHILD|JUMP]->(x {name: \"Y\"})",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");

        // The same union relation is fine on the read side.
        assert!(check(
            "MATCH (n {name: \"A\"})-[:CHILD|JUMP]->(m) CREATE (m)-[:CHILD]->(x {name: \"Y\"})"
        )
        .is_ok());
    }

    #[test]
    fn merge_requires_name() {
        let err = check("MERGE (p:Project) RETURN p").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
        assert!(check("MERGE (p {name: \"Weekly\"}) RETURN p").is_ok());
    }

    #[test]
    fn cross_variable_or_fails() {
        let err = check(
            "MATCH (a {name: \"A\"}), (b {name: \"B\"}) WHERE a.name = \"x\" OR b.name = \"y\" RETURN a",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn cross_variable_and_passes() {
        assert!(check(
            "MATCH (a {name: \"A\"}), (b {name: \"B\"}) WHERE a.name = \"x\" AND b.name = \"y\" RETURN a"
        )
        .is_ok());
    }

    #[test]
    fn is_null_alone_cannot_drive() {
        let err = check("MATCH (n) WHERE n.label IS NULL RETURN n").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn is_null_with_name_atom_passes() {
        assert!(
            check("MATCH (n) WHERE n.name CONTAINS \"x\" AND n.label IS NULL RETURN n").is_ok()
        );
    }

    #[test]
    fn is_null_on_downstream_passes() {
        assert!(check(
            "MATCH (a {name: \"A\"})-[:CHILD]->(b) WHERE b.label IS NULL RETURN b"
        )
        .is_ok());
    }

    #[test]
    fn not_alone_cannot_drive() {
        let err = check("MATCH (n) WHERE NOT n.name = \"x\" RETURN n").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn unassignable_properties() {
        let err = check("MATCH (n {name: \"A\"}) SET n.typeId = \"t\"").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");

        let err = check("MATCH (n {name: \"A\"}) SET n.kind = \"2\"").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn name_cannot_be_cleared() {
        let err = check("MATCH (n {name: \"A\"}) SET n.name = NULL").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn unbound_variables_rejected() {
        let err = check("MATCH (n {name: \"A\"}) RETURN m").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");

        let err = check("MATCH (n {name: \"A\"}) WHERE m.name = \"x\" RETURN n").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn delete_of_relationship_variable_passes() {
        assert!(check("MATCH (a {name: \"A\"})-[r:JUMP]->(b) DELETE r").is_ok());
    }

    #[test]
    fn create_requires_name_on_new_nodes() {
        let err = check("CREATE (n:Project)").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }
}
