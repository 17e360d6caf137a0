//! Semantics-preserving graph transformations, run once
//! before enumeration to shrink the search tree. Both transforms add
//! `Other`-kind edges between independent nodes; after any insertion the
//! DAG's recursive neighbor sets and bounds must be recomputed, since the
//! new edge can shorten both.

use crate::dag::{Dag, NodeIndex};
use crate::error::Result;
use crate::registers::RegisterBank;
use crate::superiority::is_superior;

/// Pairs of nodes to connect with an `Other` edge, oriented `from -> to`.
pub struct TransformPlan {
    pub edges: Vec<(NodeIndex, NodeIndex)>,
}

/// Finds equivalence and RP-only-superiority edges without mutating
/// `dag`; the caller applies them via
/// [`apply_and_refresh`], which is the only place bounds are recomputed.
pub fn plan_transforms(dag: &Dag, bank: &RegisterBank) -> TransformPlan {
    let mut edges = Vec::new();
    let instructions: Vec<NodeIndex> = dag.instructions().collect();

    for (i, &a) in instructions.iter().enumerate() {
        for &b in &instructions[i + 1..] {
            if dag.is_recursive_predecessor(a, b) || dag.is_recursive_predecessor(b, a) {
                continue; // not independent
            }

            if are_equivalent(dag, a, b) {
                let (from, to) = orient_by_node_id(a, b);
                edges.push((from, to));
                continue;
            }

            let a_superior = is_superior(dag, bank, a, b);
            let b_superior = is_superior(dag, bank, b, a);
            match (a_superior, b_superior) {
                (true, true) => edges.push(orient_by_node_id(a, b)),
                (true, false) => edges.push((a, b)),
                (false, true) => edges.push((b, a)),
                (false, false) => {}
            }
        }
    }

    TransformPlan { edges }
}

fn orient_by_node_id(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Two independent nodes are equivalent when they share issue type and
/// their recursive predecessor/successor sets are identical — scheduling either first cannot change
/// the other's feasible window.
fn are_equivalent(dag: &Dag, a: NodeIndex, b: NodeIndex) -> bool {
    let na = dag.node(a);
    let nb = dag.node(b);
    na.issue_type == nb.issue_type
        && na.rcrsv_pred.is_subset_of(&nb.rcrsv_pred)
        && nb.rcrsv_pred.is_subset_of(&na.rcrsv_pred)
        && na.rcrsv_succ.is_subset_of(&nb.rcrsv_succ)
        && nb.rcrsv_succ.is_subset_of(&na.rcrsv_succ)
}

/// Adds every planned edge to `dag` as an `Other`-kind edge with zero
/// latency, then recomputes the transitive closure and static bounds.
/// The plan is built from pairs a prior DAG state already proved
/// independent, so refreshing should never surface a cycle; the
/// `Result` exists because `recompute_after_transform` shares its
/// topological sort with `DagBuilder::build`, which can fail on
/// arbitrary input.
pub fn apply_and_refresh(dag: &mut Dag, plan: &TransformPlan) -> Result<()> {
    for &(from, to) in &plan.edges {
        dag.add_other_edge(from, to);
    }
    if !plan.edges.is_empty() {
        dag.recompute_after_transform()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatencyPrecision;
    use crate::dag::{DagBuilder, DepKind, RawEdge, RawNode};
    use crate::machine::MachineModel;

    #[test]
    fn symmetric_leaves_get_an_equivalence_edge() {
        let mut m = MachineModel::new(2);
        let it = m.add_issue_type("alu", 2);
        let ty = m.add_instr_type("op", it, 1, true);

        let mut b = DagBuilder::new();
        let root = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let leaf1 = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let leaf2 = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: root, to: leaf1, kind: DepKind::Data, latency_hint: None });
        b.add_edge(RawEdge { from: root, to: leaf2, kind: DepKind::Data, latency_hint: None });
        let mut dag = b.build(&m, LatencyPrecision::Precise, 10_000, false).unwrap();
        let bank = RegisterBank::new(&m);

        let plan = plan_transforms(&dag, &bank);
        assert_eq!(plan.edges.len(), 1);
        apply_and_refresh(&mut dag, &plan).unwrap();

        let (from, to) = plan.edges[0];
        assert!(dag.is_recursive_predecessor(from, to));
    }
}
