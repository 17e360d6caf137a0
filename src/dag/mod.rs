//! The dependence graph: nodes, edges, and the preparation pipeline that
//! turns a raw graph into one the rest of the core can query in O(1)
//! per lookup (recursive predecessor/successor membership, critical-path
//! bounds) instead of walking edges.

mod bounds;
mod closure;

pub use crate::machine::DepKind;

/// Recursive predecessor/successor bit-set keyed by [`NodeIndex`].
pub type NodeBitSet = crate::bitset::IndexBitSet<NodeIndex>;

use cranelift_entity::{entity_impl, EntityRef, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::config::LatencyPrecision;
use crate::error::{Result, SchedulerError};
use crate::machine::{InstrTypeId, IssueTypeId, MachineModel};
use crate::registers::RegRef;

/// Stable index of a node, including the two artificial sentinels.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeIndex(u32);
entity_impl!(NodeIndex, "node");

/// One DAG node: a real instruction, or the artificial entry/exit
/// sentinel.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub instr_type: InstrTypeId,
    pub issue_type: IssueTypeId,
    pub defs: SmallVec<[RegRef; 4]>,
    pub uses: SmallVec<[RegRef; 4]>,
    /// Position in the order the host originally supplied (ISO priority
    /// key); `u32::MAX` for the synthetic sentinels.
    pub input_order: u32,
    pub is_sentinel: bool,

    // Filled in by `Dag::prepare`:
    pub rcrsv_pred: NodeBitSet,
    pub rcrsv_succ: NodeBitSet,
    /// Earliest legal cycle (forward critical path length from entry).
    pub earliest: u32,
    /// Latest legal cycle without delaying the schedule past the
    /// DAG-static lower bound.
    pub latest: u32,
}

/// An edge in the dependence graph.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub to: NodeIndex,
    pub latency: u32,
    pub kind: DepKind,
}

#[derive(Clone, Copy, Debug)]
pub struct InEdge {
    pub from: NodeIndex,
    pub latency: u32,
    pub kind: DepKind,
}

/// The prepared dependence graph for one scheduling region.
#[derive(Clone, Debug)]
pub struct Dag {
    nodes: PrimaryMap<NodeIndex, NodeData>,
    out_edges: SecondaryMap<NodeIndex, Vec<Edge>>,
    in_edges: SecondaryMap<NodeIndex, Vec<InEdge>>,
    entry: NodeIndex,
    exit: NodeIndex,
    topo_order: Vec<NodeIndex>,
    /// `max(forward_cp(exit), backward_cp(entry)) + 1`.
    lower_bound: u32,
    prepared: bool,
}

impl Dag {
    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    pub fn exit(&self) -> NodeIndex {
        self.exit
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of real instructions (excludes the two sentinels).
    pub fn num_instructions(&self) -> usize {
        self.nodes.len() - 2
    }

    pub fn node(&self, n: NodeIndex) -> &NodeData {
        &self.nodes[n]
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes.keys()
    }

    pub fn instructions(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        let entry = self.entry;
        let exit = self.exit;
        self.nodes.keys().filter(move |&n| n != entry && n != exit)
    }

    pub fn successors(&self, n: NodeIndex) -> &[Edge] {
        &self.out_edges[n]
    }

    pub fn predecessors(&self, n: NodeIndex) -> &[InEdge] {
        &self.in_edges[n]
    }

    pub fn topo_order(&self) -> &[NodeIndex] {
        &self.topo_order
    }

    /// `max(forward_cp(exit), backward_cp(entry)) + 1`.
    pub fn lower_bound(&self) -> u32 {
        self.lower_bound
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Static critical-path length from `n` to the exit sentinel
    /// (the CP priority key), recovered from the `latest`
    /// bound computed in `compute_bounds` rather than stored twice.
    pub fn critical_path_to_exit(&self, n: NodeIndex) -> u32 {
        (self.lower_bound - 1).saturating_sub(self.nodes[n].latest)
    }

    /// `u ∈ rcrsv_pred(v)`.
    pub fn is_recursive_predecessor(&self, u: NodeIndex, v: NodeIndex) -> bool {
        self.nodes[v].rcrsv_pred.contains(u)
    }

    /// `v ∈ rcrsv_succ(u)`.
    pub fn is_recursive_successor(&self, v: NodeIndex, u: NodeIndex) -> bool {
        self.nodes[u].rcrsv_succ.contains(v)
    }

    /// Adds a zero-latency `Other`-kind edge between two nodes a graph
    /// transform has decided to order. Does not refresh
    /// the transitive closure or bounds; call [`Dag::recompute_after_transform`]
    /// once all planned edges for a pass are in.
    pub(crate) fn add_other_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        self.out_edges[from].push(Edge { to, latency: 0, kind: DepKind::Other });
        self.in_edges[to].push(InEdge { from, latency: 0, kind: DepKind::Other });
    }

    /// Re-derives topological order, transitive closure, and static
    /// bounds after one or more `add_other_edge` calls.
    pub(crate) fn recompute_after_transform(&mut self) -> Result<()> {
        self.topo_order = topological_sort(self)?;
        self.close();
        self.compute_bounds();
        Ok(())
    }
}

/// A node as supplied by the host, before entry/exit and latencies are
/// inserted.
pub struct RawNode {
    pub instr_type: InstrTypeId,
    pub issue_type: IssueTypeId,
    pub defs: Vec<RegRef>,
    pub uses: Vec<RegRef>,
}

/// An edge as supplied by the host, referencing `RawNode` positions.
pub struct RawEdge {
    pub from: usize,
    pub to: usize,
    pub kind: DepKind,
    /// Compiler-provided latency hint, consulted under
    /// `LatencyPrecision::Rough`.
    pub latency_hint: Option<u32>,
}

/// Builds a [`Dag`] from raw nodes/edges.
#[derive(Default)]
pub struct DagBuilder {
    raw_nodes: Vec<RawNode>,
    raw_edges: Vec<RawEdge>,
}

impl DagBuilder {
    pub fn new() -> Self {
        DagBuilder::default()
    }

    /// Returns the position this node will occupy; use it to reference
    /// the node from `add_edge`.
    pub fn add_node(&mut self, node: RawNode) -> usize {
        self.raw_nodes.push(node);
        self.raw_nodes.len() - 1
    }

    pub fn add_edge(&mut self, edge: RawEdge) {
        self.raw_edges.push(edge);
    }

    /// Build, classify, and close the graph.
    pub fn build(
        self,
        machine: &MachineModel,
        precision: LatencyPrecision,
        size_threshold_for_precise: usize,
        order_edges_as_data: bool,
    ) -> Result<Dag> {
        let n = self.raw_nodes.len();
        if n == 0 {
            return Err(SchedulerError::InvalidDag("region has no instructions".into()));
        }

        let effective_precision = if n > size_threshold_for_precise && precision == LatencyPrecision::Precise {
            log::warn!(
                "region has {n} instructions (> {size_threshold_for_precise}); degrading LATENCY_PRECISION to ROUGH"
            );
            LatencyPrecision::Rough
        } else {
            precision
        };

        let mut nodes: PrimaryMap<NodeIndex, NodeData> = PrimaryMap::new();
        // Index 0 is reserved for entry.
        let entry = nodes.push(sentinel_node());
        let mut user_to_node = Vec::with_capacity(n);
        for (i, raw) in self.raw_nodes.iter().enumerate() {
            let idx = nodes.push(NodeData {
                instr_type: raw.instr_type,
                issue_type: raw.issue_type,
                defs: raw.defs.clone().into(),
                uses: raw.uses.clone().into(),
                input_order: i as u32,
                is_sentinel: false,
                rcrsv_pred: NodeBitSet::new(0),
                rcrsv_succ: NodeBitSet::new(0),
                earliest: 0,
                latest: 0,
            });
            user_to_node.push(idx);
        }
        let exit = nodes.push(sentinel_node());

        let total = nodes.len();
        for node in nodes.values_mut() {
            node.rcrsv_pred = NodeBitSet::new(total);
            node.rcrsv_succ = NodeBitSet::new(total);
        }

        let mut out_edges: SecondaryMap<NodeIndex, Vec<Edge>> = SecondaryMap::new();
        let mut in_edges: SecondaryMap<NodeIndex, Vec<InEdge>> = SecondaryMap::new();

        for raw_edge in &self.raw_edges {
            let from = user_to_node[raw_edge.from];
            let to = user_to_node[raw_edge.to];
            if from == to {
                return Err(SchedulerError::InvalidDag("self-loop edge".into()));
            }
            let kind = if order_edges_as_data && raw_edge.kind == DepKind::Other {
                DepKind::Data
            } else {
                raw_edge.kind
            };
            let latency = latency_for(
                &nodes[from],
                kind,
                raw_edge.latency_hint,
                machine,
                effective_precision,
            );
            out_edges[from].push(Edge { to, latency, kind });
            in_edges[to].push(InEdge { from, latency, kind });
        }

        // Connect the sentinels: entry -> every root, every leaf -> exit.
        for &node in &user_to_node {
            if in_edges[node].is_empty() {
                out_edges[entry].push(Edge {
                    to: node,
                    latency: 0,
                    kind: DepKind::Other,
                });
                in_edges[node].push(InEdge {
                    from: entry,
                    latency: 0,
                    kind: DepKind::Other,
                });
            }
            if out_edges[node].is_empty() {
                out_edges[node].push(Edge {
                    to: exit,
                    latency: 0,
                    kind: DepKind::Other,
                });
                in_edges[exit].push(InEdge {
                    from: node,
                    latency: 0,
                    kind: DepKind::Other,
                });
            }
        }

        let mut dag = Dag {
            nodes,
            out_edges,
            in_edges,
            entry,
            exit,
            topo_order: Vec::new(),
            lower_bound: 0,
            prepared: false,
        };

        dag.topo_order = topological_sort(&dag)?;
        dag.close();
        dag.compute_bounds();
        dag.prepared = true;
        Ok(dag)
    }
}

fn sentinel_node() -> NodeData {
    NodeData {
        instr_type: InstrTypeId::new(0),
        issue_type: IssueTypeId::new(0),
        defs: SmallVec::new(),
        uses: SmallVec::new(),
        input_order: u32::MAX,
        is_sentinel: true,
        rcrsv_pred: NodeBitSet::new(0),
        rcrsv_succ: NodeBitSet::new(0),
        earliest: 0,
        latest: 0,
    }
}

fn latency_for(
    producer: &NodeData,
    kind: DepKind,
    hint: Option<u32>,
    machine: &MachineModel,
    precision: LatencyPrecision,
) -> u32 {
    if producer.is_sentinel {
        return 0;
    }
    match precision {
        LatencyPrecision::Precise => machine.latency(producer.instr_type, kind),
        LatencyPrecision::Rough => hint.unwrap_or_else(|| machine.instr_type(producer.instr_type).default_latency),
        LatencyPrecision::Unity => 1,
    }
}

/// Kahn's algorithm; returns `InvalidDag` if the graph has a cycle.
fn topological_sort(dag: &Dag) -> Result<Vec<NodeIndex>> {
    let n = dag.nodes.len();
    let mut in_degree: SecondaryMap<NodeIndex, u32> = SecondaryMap::new();
    for node in dag.nodes.keys() {
        in_degree[node] = dag.in_edges[node].len() as u32;
    }
    let mut ready: Vec<NodeIndex> = dag
        .nodes
        .keys()
        .filter(|&n| in_degree[n] == 0)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(node) = ready.pop() {
        order.push(node);
        for edge in &dag.out_edges[node] {
            let deg = &mut in_degree[edge.to];
            *deg -= 1;
            if *deg == 0 {
                ready.push(edge.to);
            }
        }
    }
    if order.len() != n {
        return Err(SchedulerError::InvalidDag("dependence graph contains a cycle".into()));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineModel;

    fn tiny_machine() -> (MachineModel, InstrTypeId) {
        let mut m = MachineModel::new(1);
        let it = m.add_issue_type("alu", 1);
        let ty = m.add_instr_type("op", it, 1, true);
        (m, ty)
    }

    #[test]
    fn two_instruction_chain_bounds() {
        let (m, ty) = tiny_machine();
        let it = m.instr_type(ty).issue_type;
        let mut b = DagBuilder::new();
        let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let c = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: a, to: c, kind: DepKind::Data, latency_hint: None });
        let dag = b.build(&m, LatencyPrecision::Precise, 10_000, false).unwrap();
        assert_eq!(dag.num_instructions(), 2);
        assert_eq!(dag.lower_bound(), 2);
    }

    #[test]
    fn cycle_is_rejected() {
        let (m, ty) = tiny_machine();
        let it = m.instr_type(ty).issue_type;
        let mut b = DagBuilder::new();
        let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let c = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: a, to: c, kind: DepKind::Data, latency_hint: None });
        b.add_edge(RawEdge { from: c, to: a, kind: DepKind::Data, latency_hint: None });
        assert!(b.build(&m, LatencyPrecision::Precise, 10_000, false).is_err());
    }
}
