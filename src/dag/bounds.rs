//! Static critical-path bounds.

use super::Dag;

impl Dag {
    /// Computes per-node earliest/latest cycle bounds and the DAG's
    /// scheduling lower bound, `max(forward_cp(exit), backward_cp(entry)) + 1`.
    pub(crate) fn compute_bounds(&mut self) {
        // Forward critical path: earliest[v] = max over preds p of
        // (earliest[p] + latency(p -> v)), entry = 0.
        for &v in &self.topo_order {
            let mut earliest = 0u32;
            for edge in &self.in_edges[v] {
                earliest = earliest.max(self.nodes[edge.from].earliest + edge.latency);
            }
            self.nodes[v].earliest = earliest;
        }

        // Backward critical path: cp_to_exit[v] = max over succs s of
        // (latency(v -> s) + cp_to_exit[s]), exit = 0.
        let mut cp_to_exit = vec![0u32; self.nodes.len()];
        for &v in self.topo_order.iter().rev() {
            let mut bound = 0u32;
            for edge in &self.out_edges[v] {
                let to_idx = edge.to.index();
                bound = bound.max(edge.latency + cp_to_exit[to_idx]);
            }
            cp_to_exit[v.index()] = bound;
        }

        let forward_cp_exit = self.nodes[self.exit].earliest;
        let backward_cp_entry = cp_to_exit[self.entry.index()];
        self.lower_bound = forward_cp_exit.max(backward_cp_entry) + 1;

        for &v in &self.topo_order {
            let idx = v.index();
            // Latest legal start cycle so that finishing this node's
            // remaining critical path still fits within `lower_bound`.
            self.nodes[v].latest = (self.lower_bound - 1).saturating_sub(cp_to_exit[idx]);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LatencyPrecision;
    use crate::dag::{DagBuilder, DepKind, RawEdge, RawNode};
    use crate::machine::MachineModel;

    #[test]
    fn diamond_lower_bound_is_three() {
        let mut m = MachineModel::new(2);
        let it = m.add_issue_type("alu", 2);
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
        assert_eq!(dag.lower_bound(), 3);
    }
}
