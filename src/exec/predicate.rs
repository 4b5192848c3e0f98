//! Predicate evaluator — boolean trees over already-bound candidates.

use crate::bql::ast::{NameOp, WhereAtom, WhereExpr};
use crate::model::Thought;

use super::resolve::SimilarHits;

/// Evaluation context shared across one query.
pub struct EvalContext<'a> {
    pub similar_hits: &'a SimilarHits,
}

/// Keep the candidates satisfying the tree.
pub fn filter(expr: &WhereExpr, ctx: &EvalContext, candidates: Vec<Thought>) -> Vec<Thought> {
    candidates.into_iter().filter(|t| eval(expr, ctx, t)).collect()
}

fn eval(expr: &WhereExpr, ctx: &EvalContext, thought: &Thought) -> bool {
    match expr {
        WhereExpr::Or(a, b) => eval(a, ctx, thought) || eval(b, ctx, thought),
        WhereExpr::Xor(a, b) => eval(a, ctx, thought) ^ eval(b, ctx, thought),
        WhereExpr::And(a, b) => eval(a, ctx, thought) && eval(b, ctx, thought),
        WhereExpr::Not(inner) => !eval(inner, ctx, thought),
        WhereExpr::Atom(atom) => eval_atom(atom, ctx, thought),
    }
}

fn eval_atom(atom: &WhereAtom, ctx: &EvalContext, thought: &Thought) -> bool {
    match atom {
        WhereAtom::NameCompare { variable, op, value } => match op {
            NameOp::Eq => thought.name == *value,
            NameOp::Contains => {
                thought.name.to_lowercase().contains(&value.to_lowercase())
            }
            NameOp::StartsWith => {
                thought.name.to_lowercase().starts_with(&value.to_lowercase())
            }
            NameOp::EndsWith => {
                thought.name.to_lowercase().ends_with(&value.to_lowercase())
            }
            // Satisfied by exact equality, or by having fallen within the
            // similarity ranking when this atom drove resolution.
            NameOp::Similar => {
                thought.name == *value
                    || ctx
                        .similar_hits
                        .get(&(variable.clone(), value.clone()))
                        .is_some_and(|ids| ids.contains(&thought.id))
            }
        },
        WhereAtom::IsNull { property, .. } => is_null(thought, property),
        WhereAtom::IsNotNull { property, .. } => !is_null(thought, property),
    }
}

/// `label` counts as null when absent or empty; the other nullable
/// properties when absent. `name`, `id`, and `kind` are never null.
fn is_null(thought: &Thought, property: &str) -> bool {
    match property {
        "label" => thought.label.as_deref().map_or(true, str::is_empty),
        "typeId" => thought.type_id.is_none(),
        "foregroundColor" => thought.foreground_color.is_none(),
        "backgroundColor" => thought.background_color.is_none(),
        "name" | "id" | "kind" => false,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::model::NodeId;

    fn ctx(hits: &SimilarHits) -> EvalContext<'_> {
        EvalContext { similar_hits: hits }
    }

    fn atom(expr: WhereAtom) -> WhereExpr {
        WhereExpr::Atom(expr)
    }

    #[test]
    fn string_ops_are_case_insensitive() {
        let t = Thought::new(NodeId(1), "MCP Server");
        let hits = HashMap::new();
        let e = atom(WhereAtom::NameCompare {
            variable: "n".into(),
            op: NameOp::Contains,
            value: "mcp".into(),
        });
        assert!(eval(&e, &ctx(&hits), &t));

        let e = atom(WhereAtom::NameCompare {
            variable: "n".into(),
            op: NameOp::EndsWith,
            value: "SERVER".into(),
        });
        assert!(eval(&e, &ctx(&hits), &t));
    }

    #[test]
    fn eq_is_strict() {
        let t = Thought::new(NodeId(1), "Projects");
        let hits = HashMap::new();
        let e = atom(WhereAtom::NameCompare {
            variable: "n".into(),
            op: NameOp::Eq,
            value: "projects".into(),
        });
        assert!(!eval(&e, &ctx(&hits), &t));
    }

    #[test]
    fn similar_accepts_ranked_fallback_hits() {
        let t = Thought::new(NodeId(9), "Projects");
        let e = atom(WhereAtom::NameCompare {
            variable: "n".into(),
            op: NameOp::Similar,
            value: "Projcts".into(),
        });

        let empty = HashMap::new();
        assert!(!eval(&e, &ctx(&empty), &t));

        let mut hits: SimilarHits = HashMap::new();
        hits.insert(("n".into(), "Projcts".into()), HashSet::from([NodeId(9)]));
        assert!(eval(&e, &ctx(&hits), &t));
    }

    #[test]
    fn label_null_includes_empty_string() {
        let hits = HashMap::new();
        let e = atom(WhereAtom::IsNull { variable: "n".into(), property: "label".into() });

        let bare = Thought::new(NodeId(1), "A");
        assert!(eval(&e, &ctx(&hits), &bare));

        let empty = Thought::new(NodeId(2), "B").with_label("");
        assert!(eval(&e, &ctx(&hits), &empty));

        let labelled = Thought::new(NodeId(3), "C").with_label("x");
        assert!(!eval(&e, &ctx(&hits), &labelled));
    }

    #[test]
    fn name_is_never_null() {
        let hits = HashMap::new();
        let t = Thought::new(NodeId(1), "A");
        let e = atom(WhereAtom::IsNull { variable: "n".into(), property: "name".into() });
        assert!(!eval(&e, &ctx(&hits), &t));
        let e = atom(WhereAtom::IsNotNull { variable: "n".into(), property: "name".into() });
        assert!(eval(&e, &ctx(&hits), &t));
    }

    #[test]
    fn xor_and_not_combine() {
        let hits = HashMap::new();
        let t = Thought::new(NodeId(1), "Alpha");
        let a = atom(WhereAtom::NameCompare {
            variable: "n".into(),
            op: NameOp::StartsWith,
            value: "Al".into(),
        });
        let b = atom(WhereAtom::NameCompare {
            variable: "n".into(),
            op: NameOp::EndsWith,
            value: "pha".into(),
        });
        // true XOR true = false
        let e = WhereExpr::Xor(Box::new(a.clone()), Box::new(b));
        assert!(!eval(&e, &ctx(&hits), &t));
        let e = WhereExpr::Not(Box::new(e));
        assert!(eval(&e, &ctx(&hits), &t));
    }
}
