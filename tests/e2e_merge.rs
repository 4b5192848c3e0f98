//! End-to-end tests for MERGE: match-or-create, ON CREATE / ON MATCH
//! clauses, type constraints, and ambiguity warnings.

use brainquery::{Created, Engine, ExecuteOptions, GraphId, GraphService, Relation, Value};

fn opts() -> ExecuteOptions {
    ExecuteOptions::new(GraphId(1))
}

// ============================================================================
// 1. Merge twice: created, then matched (spec scenario 3)
// ============================================================================

#[tokio::test]
async fn merge_creates_then_matches() {
    let engine = Engine::in_memory();
    let query = "MERGE (p {name: \"Weekly\"}) \
                 ON CREATE SET p.label = \"new\" \
                 ON MATCH SET p.label = \"old\" \
                 RETURN p.id";

    // First execution: create-node and the ON CREATE update.
    let outcome = engine.execute(query, opts()).await.unwrap();
    let report = outcome.mutation().unwrap();
    assert_eq!(report.created.len(), 1);
    assert!(report.matched.is_empty());
    assert_eq!(engine.service().create_node_calls(), 1);
    assert_eq!(engine.service().update_node_calls(), 1);

    let Created::Node { id, .. } = report.created[0] else {
        panic!("expected a created node");
    };
    assert_eq!(engine.service().thought(id).unwrap().label.as_deref(), Some("new"));
    assert_eq!(report.rows.as_ref().unwrap().rows[0][0], Value::Id(id));

    // Second execution: no create-node; the ON MATCH update runs instead.
    let outcome = engine.execute(query, opts()).await.unwrap();
    let report = outcome.mutation().unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.matched, vec![id]);
    assert_eq!(engine.service().create_node_calls(), 1);
    assert_eq!(engine.service().update_node_calls(), 2);
    assert_eq!(engine.service().thought(id).unwrap().label.as_deref(), Some("old"));
}

// ============================================================================
// 2. Type-constrained merge
// ============================================================================

#[tokio::test]
async fn merge_with_type_constraint_ignores_differently_typed_nodes() {
    let engine = Engine::in_memory();
    let ty = engine.service().add_type("Project");
    engine.service().add_thought("Weekly"); // untyped

    let outcome = engine
        .execute("MERGE (p:Project {name: \"Weekly\"}) RETURN p.id", opts())
        .await
        .unwrap();

    // The untyped node does not satisfy the type constraint; a typed one
    // is created alongside it.
    let report = outcome.mutation().unwrap();
    assert_eq!(report.created.len(), 1);
    let Created::Node { id, type_id, .. } = report.created[0] else {
        panic!("expected a created node");
    };
    assert_eq!(type_id, Some(ty));
    assert_eq!(engine.service().thought(id).unwrap().type_id, Some(ty));
}

// ============================================================================
// 3. Merge chains
// ============================================================================

#[tokio::test]
async fn merge_chain_links_new_node_under_existing() {
    let engine = Engine::in_memory();
    let projects = engine.service().add_thought("Projects");

    let outcome = engine
        .execute("MERGE (p {name: \"Projects\"})-[:CHILD]->(t {name: \"Tasks\"})", opts())
        .await
        .unwrap();

    let report = outcome.mutation().unwrap();
    assert_eq!(report.matched, vec![projects]);
    assert_eq!(report.created.len(), 2); // node + edge
    let Created::Node { id, .. } = report.created[0] else {
        panic!("expected the node first");
    };
    assert!(engine.service().has_edge(projects, Relation::Child, id));
}

#[tokio::test]
async fn merge_chain_with_both_matched_creates_no_edge() {
    let engine = Engine::in_memory();
    let a = engine.service().add_thought("A");
    let b = engine.service().add_thought("B");
    engine.service().link(a, Relation::Child, b);

    let outcome = engine
        .execute("MERGE (x {name: \"A\"})-[:CHILD]->(y {name: \"B\"})", opts())
        .await
        .unwrap();

    let report = outcome.mutation().unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.matched, vec![a, b]);
    assert_eq!(engine.service().create_edge_calls(), 0);
}

// ============================================================================
// 4. MATCH ... MERGE with an ambiguous match set
// ============================================================================

#[tokio::test]
async fn ambiguous_match_takes_first_and_warns() {
    let engine = Engine::in_memory();
    let first = engine.service().add_thought("Task One");
    engine.service().add_thought("Task Two");

    let outcome = engine
        .execute(
            "MATCH (n) WHERE n.name CONTAINS \"Task\" \
             MERGE (n)-[:CHILD]->(d {name: \"Done\"})",
            opts(),
        )
        .await
        .unwrap();

    let report = outcome.mutation().unwrap();
    assert!(
        report.warnings.iter().any(|w| w.contains("ambiguous")),
        "warnings: {:?}",
        report.warnings
    );
    assert_eq!(report.matched, vec![first]);
    // Only the first candidate got the new child.
    assert_eq!(engine.service().create_edge_calls(), 1);
}

// ============================================================================
// 5. ON SET failure scope
// ============================================================================

#[tokio::test]
async fn on_set_failure_aborts_only_that_variables_items() {
    let engine = Engine::in_memory();
    let hub = engine.service().add_thought("Hub");
    engine.service().fail_updates_for(hub);

    let err = engine
        .execute(
            "MERGE (h {name: \"Hub\"})-[:CHILD]->(t {name: \"Tip\"}) \
             ON CREATE SET t.label = \"fresh\" \
             ON MATCH SET h.label = \"seen\"",
            opts(),
        )
        .await
        .unwrap_err();

    // h's update fails, but t's ON CREATE item already went through; the
    // merge creations make the failure a partial application.
    assert!(
        matches!(
            err,
            brainquery::Error::Service {
                phase: brainquery::FailurePhase::PartiallyApplied,
                ..
            }
        ),
        "got {err:?}"
    );
    let tip = engine
        .service()
        .get_by_name(GraphId(1), "Tip")
        .await
        .unwrap()
        .expect("Tip was created before the failing update");
    assert_eq!(tip.label.as_deref(), Some("fresh"));
    assert_eq!(engine.service().thought(hub).unwrap().label, None);
}

// ============================================================================
// 6. Static rules
// ============================================================================

#[tokio::test]
async fn merge_without_name_is_rejected() {
    let engine = Engine::in_memory();
    engine.service().add_type("Project");

    let err = engine.execute("MERGE (p:Project) RETURN p", opts()).await.unwrap_err();
    assert!(matches!(err, brainquery::Error::Semantic(_)), "got {err:?}");
    assert_eq!(engine.service().create_node_calls(), 0);
}
