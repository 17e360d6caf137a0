//! Heuristic list scheduler.
//!
//! Produces the first complete, resource-legal schedule; its cost seeds
//! the enumerator's initial upper bound.

use fnv::FnvHashMap;
use std::cmp::Ordering;

use crate::config::Config;
use crate::dag::{Dag, NodeIndex};
use crate::machine::MachineModel;
use crate::priority::{compare_candidates, PriorityContext};
use crate::registers::RegisterBank;
use crate::schedule::{Schedule, Slot};
use crate::tracker::CostTracker;

/// Runs classical cycle-by-cycle list scheduling over `dag`. Returns the schedule together with the tracker
/// state it was built with, so the caller can read off its cost without
/// re-deriving liveness.
pub fn list_schedule(
    dag: &Dag,
    machine: &MachineModel,
    config: &Config,
    bank: &RegisterBank,
    mut tracker: CostTracker,
) -> (Schedule, CostTracker) {
    let issue_rate = machine.issue_rate();
    let mut schedule = Schedule::new(issue_rate);
    let mut state = ListState::new(dag);

    let total = dag.num_instructions();
    let mut cycle = 0u32;
    while state.scheduled_count < total {
        let mut slot_in_cycle = 0u32;
        while slot_in_cycle < issue_rate && state.scheduled_count < total {
            let ctx = ListContext { dag, state: &state };
            let candidate = pick_candidate(&state.ready, cycle, config, &ctx, &tracker, bank, dag);

            match candidate {
                Some(node) => {
                    let node_data = dag.node(node);
                    if !tracker.is_legal_to_schedule(bank, &node_data.uses, &node_data.defs) {
                        schedule.push(Slot::Stall);
                    } else {
                        schedule.push(Slot::Instr(node));
                        tracker.schedule(node, &node_data.uses, &node_data.defs);
                        state.mark_scheduled(dag, node, cycle);
                    }
                }
                None => schedule.push(Slot::Stall),
            }
            slot_in_cycle += 1;
        }
        cycle += 1;
    }

    for reg_type in bank.iter_files().map(|(t, _)| t) {
        schedule.record_peak_pressure(reg_type, tracker.peak_for(reg_type));
    }

    (schedule, tracker)
}

/// Ready-list bookkeeping: which nodes are dependence-ready, and the
/// dynamic counters the priority keys need.
struct ListState {
    unscheduled_preds: FnvHashMap<NodeIndex, u32>,
    /// Earliest cycle each node may issue, tightened as its predecessors
    /// are scheduled (`max(current, pred_cycle + edge.latency)`).
    earliest: FnvHashMap<NodeIndex, u32>,
    ready: Vec<NodeIndex>,
    scheduled_count: usize,
    scheduled_at: FnvHashMap<NodeIndex, u32>,
}

impl ListState {
    fn new(dag: &Dag) -> Self {
        let mut unscheduled_preds = FnvHashMap::default();
        let mut earliest = FnvHashMap::default();
        let mut ready = Vec::new();
        for n in dag.instructions() {
            let count = dag
                .predecessors(n)
                .iter()
                .filter(|e| e.from != dag.entry())
                .count() as u32;
            unscheduled_preds.insert(n, count);
            earliest.insert(n, 0);
            if count == 0 {
                ready.push(n);
            }
        }
        ListState {
            unscheduled_preds,
            earliest,
            ready,
            scheduled_count: 0,
            scheduled_at: FnvHashMap::default(),
        }
    }

    /// Cycle `node` becomes legal to issue at, given predecessors
    /// scheduled so far. `0` until every predecessor has reported in.
    fn ready_cycle(&self, node: NodeIndex) -> u32 {
        self.earliest.get(&node).copied().unwrap_or(0)
    }

    fn mark_scheduled(&mut self, dag: &Dag, node: NodeIndex, cycle: u32) {
        self.ready.retain(|&n| n != node);
        self.scheduled_count += 1;
        self.scheduled_at.insert(node, cycle);
        for edge in dag.successors(node) {
            if edge.to == dag.exit() {
                continue;
            }
            let succ_earliest = cycle + edge.latency;
            if let Some(e) = self.earliest.get_mut(&edge.to) {
                *e = (*e).max(succ_earliest);
            }
            if let Some(count) = self.unscheduled_preds.get_mut(&edge.to) {
                *count -= 1;
                if *count == 0 {
                    self.ready.push(edge.to);
                }
            }
        }
    }
}

struct ListContext<'a> {
    dag: &'a Dag,
    state: &'a ListState,
}

impl<'a> PriorityContext for ListContext<'a> {
    fn critical_path(&self, node: NodeIndex) -> u32 {
        self.dag.critical_path_to_exit(node)
    }

    /// LUC: how many of `node`'s producers have `node` as their last
    /// unscheduled consumer, i.e. scheduling `node` would retire them.
    fn last_use_count(&self, node: NodeIndex) -> u32 {
        self.dag
            .predecessors(node)
            .iter()
            .filter(|e| {
                self.dag
                    .successors(e.from)
                    .iter()
                    .filter(|s| !self.state.scheduled_at.contains_key(&s.to))
                    .count()
                    == 1
            })
            .count() as u32
    }

    fn use_count(&self, node: NodeIndex) -> u32 {
        self.dag.predecessors(node).len() as u32
    }

    fn critical_path_ratio(&self, node: NodeIndex) -> f64 {
        self.critical_path(node) as f64 / self.dag.num_nodes().max(1) as f64
    }

    fn input_order(&self, node: NodeIndex) -> u32 {
        self.dag.node(node).input_order
    }

    fn successor_count(&self, node: NodeIndex) -> u32 {
        self.dag.successors(node).len() as u32
    }

    /// Approximates post-scheduling live-set size as the number of
    /// `node`'s not-yet-scheduled successors, without consulting the
    /// tracker (kept cheap; the enumerator's own context can afford the
    /// exact tracker-backed version).
    fn live_set_size_if_scheduled(&self, node: NodeIndex) -> u32 {
        self.dag
            .successors(node)
            .iter()
            .filter(|e| !self.state.scheduled_at.contains_key(&e.to))
            .count() as u32
    }
}

fn pick_candidate(
    ready: &[NodeIndex],
    cycle: u32,
    config: &Config,
    ctx: &ListContext,
    tracker: &CostTracker,
    bank: &RegisterBank,
    dag: &Dag,
) -> Option<NodeIndex> {
    let entries_pending = dag
        .instructions()
        .any(|n| dag.predecessors(n).iter().any(|e| e.from == dag.entry()) && !ctx.state.scheduled_at.contains_key(&n));
    let exits_pending = dag
        .instructions()
        .any(|n| dag.successors(n).iter().any(|e| e.to == dag.exit()) && !ctx.state.scheduled_at.contains_key(&n));

    let mut legal: Vec<NodeIndex> = ready
        .iter()
        .copied()
        .filter(|&n| ctx.state.ready_cycle(n) <= cycle)
        .filter(|&n| {
            let data = dag.node(n);
            tracker.is_legal_to_schedule(bank, &data.uses, &data.defs)
        })
        .filter(|&n| {
            let is_entry = dag.predecessors(n).iter().any(|e| e.from == dag.entry());
            let is_exit = dag.successors(n).iter().any(|e| e.to == dag.exit());
            tracker.is_legal_fixing(entries_pending, exits_pending, is_entry, is_exit)
        })
        .collect();
    legal.sort_by(|&a, &b| -> Ordering { compare_candidates(&config.heuristic_priority, ctx, a, b) });
    legal.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SpillCostFunction};
    use crate::dag::{DagBuilder, DepKind, RawEdge, RawNode};
    use crate::machine::MachineModel;

    #[test]
    fn two_node_chain_schedules_in_order() {
        let mut m = MachineModel::new(1);
        let it = m.add_issue_type("alu", 1);
        let ty = m.add_instr_type("op", it, 1, true);
        let mut b = DagBuilder::new();
        let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let c = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: a, to: c, kind: DepKind::Data, latency_hint: None });
        let dag = b
            .build(&m, crate::config::LatencyPrecision::Precise, 10_000, false)
            .unwrap();

        let bank = RegisterBank::new(&m);
        let config = Config::default();
        let tracker = CostTracker::new(&m, &bank, SpillCostFunction::Sum);

        let (schedule, _tracker) = list_schedule(&dag, &m, &config, &bank, tracker);
        let scheduled: Vec<NodeIndex> = schedule.instructions().collect();
        assert_eq!(scheduled.len(), 2);
    }
}
