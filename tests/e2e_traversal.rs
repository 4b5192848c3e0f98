//! End-to-end tests for relationship traversal: BFS over hop ranges,
//! cycle tolerance, relation-set expansion, and chained patterns.

use brainquery::{
    Engine, Error, ExecuteOptions, GraphId, GraphService, NodeId, Relation, Value,
};

fn opts() -> ExecuteOptions {
    ExecuteOptions::new(GraphId(1))
}

fn text(rows: &brainquery::Rows, col: usize) -> Vec<String> {
    rows.rows
        .iter()
        .map(|r| r[col].as_text().unwrap().to_string())
        .collect()
}

// ============================================================================
// 1. Single hop, BFS order (spec scenario 1)
// ============================================================================

#[tokio::test]
async fn children_come_back_in_edge_order() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let projects = g.add_thought("Projects");
    let a = g.add_thought("A");
    let b = g.add_thought("B");
    g.link(projects, Relation::Child, a);
    g.link(projects, Relation::Child, b);

    let outcome = engine
        .execute("MATCH (n {name: \"Projects\"})-[:CHILD]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["A", "B"]);
}

// ============================================================================
// 2. Ranged hops with an intermediate filter (spec scenario 5)
// ============================================================================

#[tokio::test]
async fn ranged_bfs_with_contains_filter() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let company = g.add_thought("Company");
    let eng = g.add_thought("Eng");
    let fin = g.add_thought("Fin");
    let budget = g.add_thought("Budget2025");
    let reports = g.add_thought("Reports");
    let q1 = g.add_thought("Q1Budget");
    g.link(company, Relation::Child, eng);
    g.link(company, Relation::Child, fin);
    g.link(fin, Relation::Child, budget);
    g.link(fin, Relation::Child, reports);
    g.link(budget, Relation::Child, q1);

    let outcome = engine
        .execute(
            "MATCH (root {name: \"Company\"})-[:CHILD*1..3]->(d) \
             WHERE d.name CONTAINS \"Budget\" RETURN d.name",
            opts(),
        )
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["Budget2025", "Q1Budget"]);
}

#[tokio::test]
async fn fixed_hop_count_excludes_other_depths() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let b = g.add_thought("B");
    let c = g.add_thought("C");
    g.link(a, Relation::Child, b);
    g.link(b, Relation::Child, c);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD*2]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["C"]);
}

#[tokio::test]
async fn zero_minimum_includes_the_source() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let b = g.add_thought("B");
    g.link(a, Relation::Child, b);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD*0..1]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["A", "B"]);
}

// ============================================================================
// 3. Cycle tolerance
// ============================================================================

#[tokio::test]
async fn cycles_do_not_loop_or_duplicate() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let b = g.add_thought("B");
    let c = g.add_thought("C");
    g.link(a, Relation::Child, b);
    g.link(b, Relation::Child, c);
    g.link(c, Relation::Child, a);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD*1..5]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    // A is visited as the source; it is never re-enqueued.
    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["B", "C"]);
}

// ============================================================================
// 4. Relation sets: unions and the wildcard (parent excluded)
// ============================================================================

#[tokio::test]
async fn union_follows_both_types_only() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let child = g.add_thought("ViaChild");
    let jump = g.add_thought("ViaJump");
    let sib = g.add_thought("ViaSibling");
    g.link(a, Relation::Child, child);
    g.link(a, Relation::Jump, jump);
    g.link(a, Relation::Sibling, sib);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD|JUMP]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["ViaChild", "ViaJump"]);
}

#[tokio::test]
async fn wildcard_never_follows_parent() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let child = g.add_thought("ViaChild");
    let parent = g.add_thought("ViaParent");
    g.link(a, Relation::Child, child);
    g.link(a, Relation::Parent, parent);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["ViaChild"]);
}

#[tokio::test]
async fn explicit_parent_relation_works() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let parent = g.add_thought("Up");
    g.link(a, Relation::Parent, parent);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:PARENT]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["Up"]);
}

// ============================================================================
// 5. Chains: intermediate bindings gate downstream traversal
// ============================================================================

#[tokio::test]
async fn chain_rows_pair_along_edges() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("Alice");
    let b = g.add_thought("Bob");
    let c = g.add_thought("Carol");
    g.link(a, Relation::Jump, b);
    g.link(b, Relation::Jump, c);

    let outcome = engine
        .execute(
            "MATCH (x {name: \"Alice\"})-[:JUMP]->(y)-[:JUMP]->(z) RETURN x.name, y.name, z.name",
            opts(),
        )
        .await
        .unwrap();

    let rows = outcome.rows().unwrap();
    assert_eq!(rows.rows.len(), 1);
    assert_eq!(rows.rows[0][1], Value::Text("Bob".into()));
    assert_eq!(rows.rows[0][2], Value::Text("Carol".into()));
}

#[tokio::test]
async fn filtered_intermediates_stop_downstream_traversal() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let root = g.add_thought("Root");
    let keep = g.add_thought("Keep");
    let drop = g.add_thought("Drop");
    let under_keep = g.add_thought("UnderKeep");
    let under_drop = g.add_thought("UnderDrop");
    g.link(root, Relation::Child, keep);
    g.link(root, Relation::Child, drop);
    g.link(keep, Relation::Child, under_keep);
    g.link(drop, Relation::Child, under_drop);

    let outcome = engine
        .execute(
            "MATCH (r {name: \"Root\"})-[:CHILD]->(m)-[:CHILD]->(leaf) \
             WHERE m.name = \"Keep\" RETURN leaf.name",
            opts(),
        )
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["UnderKeep"]);
}

#[tokio::test]
async fn inline_name_on_target_post_filters_the_reached_set() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let b1 = g.add_thought("B1");
    let b2 = g.add_thought("B2");
    g.link(a, Relation::Child, b1);
    g.link(a, Relation::Child, b2);

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD]->(m {name: \"B2\"}) RETURN m.id", opts())
        .await
        .unwrap();

    let rows = outcome.rows().unwrap();
    assert_eq!(rows.rows.len(), 1);
    assert_eq!(rows.rows[0][0], Value::Id(b2));
    // The constraint filtered the traversal; it never ran its own lookup.
    assert_eq!(engine.service().get_by_name_calls(), 1);
}

// ============================================================================
// 6. Multiple sources reaching one target keep their own rows
// ============================================================================

#[tokio::test]
async fn distinct_paths_keep_distinct_rows() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("Task A");
    let b = g.add_thought("Task B");
    let shared = g.add_thought("Shared");
    g.link(a, Relation::Jump, shared);
    g.link(b, Relation::Jump, shared);

    let outcome = engine
        .execute(
            "MATCH (n)-[:JUMP]->(m) WHERE n.name CONTAINS \"Task\" RETURN n.name, m.name",
            opts(),
        )
        .await
        .unwrap();

    // Candidate sets dedup by id, but each path projects its own row.
    let rows = outcome.rows().unwrap();
    assert_eq!(rows.rows.len(), 2);
}

// ============================================================================
// 7. Hop-bound refusals (static, before any service call)
// ============================================================================

#[tokio::test]
async fn hop_upper_bound_above_five_is_refused() {
    let engine = Engine::in_memory();
    engine.service().add_thought("A");

    let err = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD*1..6]->(m) RETURN m", opts())
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::LimitExceeded { cap: 5, got: 6, .. }),
        "got {err:?}"
    );
    assert_eq!(engine.service().get_by_name_calls(), 0);
    assert_eq!(engine.service().neighborhood_calls(), 0);
}

#[tokio::test]
async fn unbounded_hops_are_refused() {
    let engine = Engine::in_memory();

    for query in [
        "MATCH (n {name: \"A\"})-[:CHILD*]->(m) RETURN m",
        "MATCH (n {name: \"A\"})-[:CHILD*2..]->(m) RETURN m",
    ] {
        let err = engine.execute(query, opts()).await.unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "{query} got {err:?}");
    }
    assert_eq!(engine.service().neighborhood_calls(), 0);
}

// ============================================================================
// 8. Stale graph tolerance
// ============================================================================

#[tokio::test]
async fn dead_edges_are_silently_skipped() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let a = g.add_thought("A");
    let b = g.add_thought("B");
    let ghost = g.add_thought("Ghost");
    g.link(a, Relation::Child, b);
    g.link(a, Relation::Child, ghost);
    g.delete_node(GraphId(1), ghost).await.unwrap();

    let outcome = engine
        .execute("MATCH (n {name: \"A\"})-[:CHILD]->(m) RETURN m.name", opts())
        .await
        .unwrap();

    assert_eq!(text(outcome.rows().unwrap(), 0), vec!["B"]);
}

#[tokio::test]
async fn missing_neighborhood_is_empty_not_error() {
    let engine = Engine::in_memory();
    let g = engine.service();
    let lone = g.add_thought("Lone");
    assert_ne!(lone, NodeId(0));

    let outcome = engine
        .execute("MATCH (n {name: \"Lone\"})-[:CHILD]->(m) RETURN m", opts())
        .await
        .unwrap();

    assert_eq!(outcome.rows().unwrap().rows.len(), 0);
}
