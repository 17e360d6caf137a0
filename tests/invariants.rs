//! Crate-level invariant checks, independent of any one scenario
//! (spec.md §8 "Invariants").

use bb_scheduler::{
    Config, DagBuilder, Deadline, DepKind, LatencyPrecision, MachineModel, PriorityKey, RawEdge,
    RawNode, RegisterBank, Status, find_optimal_schedule,
};

fn diamond_dag(issue_rate: u32) -> (MachineModel, bb_scheduler::Dag) {
    let mut m = MachineModel::new(issue_rate);
    let it = m.add_issue_type("alu", issue_rate);
    let ty = m.add_instr_type("op", it, 1, true);
    let mut b = DagBuilder::new();
    let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
    let c1 = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
    let c2 = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
    let d = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
    b.add_edge(RawEdge { from: a, to: c1, kind: DepKind::Data, latency_hint: None });
    b.add_edge(RawEdge { from: a, to: c2, kind: DepKind::Data, latency_hint: None });
    b.add_edge(RawEdge { from: c1, to: d, kind: DepKind::Data, latency_hint: None });
    b.add_edge(RawEdge { from: c2, to: d, kind: DepKind::Data, latency_hint: None });
    let dag = b.build(&m, LatencyPrecision::Precise, 10_000, false).unwrap();
    (m, dag)
}

/// `best_cost <= heuristic_cost` and `best_length >= schedule_lower_bound`
/// on a handful of shapes, for every invocation (not just a favorable
/// one-off case).
#[test]
fn best_never_loses_to_heuristic() {
    for issue_rate in [1, 2, 3] {
        let (m, mut dag) = diamond_dag(issue_rate);
        let bank = RegisterBank::new(&m);
        let config = Config::default();
        let result = find_optimal_schedule(
            &mut dag,
            &m,
            &bank,
            &config,
            Deadline::from_millis(2_000),
            Deadline::from_millis(2_000),
        )
        .unwrap();
        assert!(result.best_cost <= result.heuristic_cost);
        assert!(result.best_length >= dag.lower_bound());
    }
}

/// Disabling every prune still finds the same optimal cost as the
/// default (all prunes enabled) configuration — the prunes only cut
/// search time, never correctness.
#[test]
fn unpruned_search_matches_pruned_cost() {
    let (m, mut dag) = diamond_dag(1);
    let bank = RegisterBank::new(&m);

    let mut pruned = Config::default();
    pruned.enum_priority = vec![PriorityKey::CriticalPath, PriorityKey::NodeId];

    let mut unpruned = pruned.clone();
    unpruned.pruning.relaxed = false;
    unpruned.pruning.node_superiority = false;
    unpruned.pruning.history_domination = false;
    unpruned.pruning.spill_cost = false;

    let r_pruned = find_optimal_schedule(
        &mut dag.clone(),
        &m,
        &bank,
        &pruned,
        Deadline::from_millis(2_000),
        Deadline::from_millis(2_000),
    )
    .unwrap();
    let r_unpruned = find_optimal_schedule(
        &mut dag,
        &m,
        &bank,
        &unpruned,
        Deadline::from_millis(2_000),
        Deadline::from_millis(2_000),
    )
    .unwrap();

    assert_eq!(r_pruned.status, Status::Success);
    assert_eq!(r_unpruned.status, Status::Success);
    assert_eq!(r_pruned.best_cost, r_unpruned.best_cost);
}

/// Enabling the node-superiority graph transform must not change the
/// optimal cost found versus leaving it off, on a DAG small enough that
/// both configurations finish comfortably inside the deadline.
#[test]
fn node_superiority_transform_preserves_optimal_cost() {
    let (m, mut dag) = diamond_dag(2);
    let bank = RegisterBank::new(&m);

    let mut with_transform = Config::default();
    with_transform.pruning.node_superiority = true;
    let mut without_transform = Config::default();
    without_transform.pruning.node_superiority = false;

    let r_with = find_optimal_schedule(
        &mut dag.clone(),
        &m,
        &bank,
        &with_transform,
        Deadline::from_millis(2_000),
        Deadline::from_millis(2_000),
    )
    .unwrap();
    let r_without = find_optimal_schedule(
        &mut dag,
        &m,
        &bank,
        &without_transform,
        Deadline::from_millis(2_000),
        Deadline::from_millis(2_000),
    )
    .unwrap();

    assert_eq!(r_with.best_cost, r_without.best_cost);
}

/// A schedule the enumerator returns always passes the post-hoc
/// verifier when `VERIFY_SCHEDULE` is on (the default).
#[test]
fn returned_schedule_passes_verification() {
    let (m, mut dag) = diamond_dag(2);
    let bank = RegisterBank::new(&m);
    let mut config = Config::default();
    config.verify_schedule = true;

    let result = find_optimal_schedule(
        &mut dag,
        &m,
        &bank,
        &config,
        Deadline::from_millis(2_000),
        Deadline::from_millis(2_000),
    )
    .unwrap();
    assert_eq!(result.status, Status::Success);
}
