//! Transitive closure: recursive predecessor/successor bit-sets.

use super::{Dag, NodeBitSet};

impl Dag {
    /// Computes `rcrsv_pred`/`rcrsv_succ` for every node via a worklist
    /// over (reverse) topological order, maintaining
    /// `u ∈ rcrsv_pred(v) ⟺ v ∈ rcrsv_succ(u)` by construction.
    pub(crate) fn close(&mut self) {
        let total = self.nodes.len();

        // rcrsv_pred(v) = union over direct preds p of ({p} ∪ rcrsv_pred(p)).
        // Processed in topological order so every predecessor's own
        // rcrsv_pred set is already final by the time `v` is visited.
        for &v in &self.topo_order {
            let mut acc = NodeBitSet::new(total);
            let preds: Vec<_> = self.in_edges[v].iter().map(|e| e.from).collect();
            for p in preds {
                acc.insert(p);
                let p_set = self.nodes[p].rcrsv_pred.clone();
                acc.union_with(&p_set);
            }
            self.nodes[v].rcrsv_pred = acc;
        }

        // rcrsv_succ(v) = union over direct succs s of ({s} ∪ rcrsv_succ(s)).
        // Processed in reverse topological order, same reasoning.
        for &v in self.topo_order.iter().rev() {
            let mut acc = NodeBitSet::new(total);
            let succs: Vec<_> = self.out_edges[v].iter().map(|e| e.to).collect();
            for s in succs {
                acc.insert(s);
                let s_set = self.nodes[s].rcrsv_succ.clone();
                acc.union_with(&s_set);
            }
            self.nodes[v].rcrsv_succ = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dag::{DagBuilder, DepKind, RawEdge, RawNode};
    use crate::config::LatencyPrecision;
    use crate::machine::MachineModel;

    #[test]
    fn closure_is_symmetric() {
        let mut m = MachineModel::new(1);
        let it = m.add_issue_type("alu", 1);
        let ty = m.add_instr_type("op", it, 1, true);

        let mut b = DagBuilder::new();
        let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let c = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let d = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: a, to: c, kind: DepKind::Data, latency_hint: None });
        b.add_edge(RawEdge { from: c, to: d, kind: DepKind::Data, latency_hint: None });
        let dag = b.build(&m, LatencyPrecision::Precise, 10_000, false).unwrap();

        for u in dag.nodes() {
            for v in dag.nodes() {
                assert_eq!(
                    dag.is_recursive_predecessor(u, v),
                    dag.is_recursive_successor(v, u),
                    "u={u:?} v={v:?}"
                );
            }
        }
    }
}
