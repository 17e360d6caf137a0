//! Post-hoc schedule legality check, run when
//! `Config::verify_schedule` is set. Any violation is an [`SchedulerError::Internal`]
//! — a correctly constructed enumerator or heuristic should never produce
//! one, so surfacing it as a hard error rather than silently patching the
//! schedule is the deliberate choice here: never emit an illegal schedule.

use fnv::FnvHashMap;

use crate::dag::Dag;
use crate::error::{Result, SchedulerError};
use crate::machine::{IssueTypeId, MachineModel};
use crate::schedule::{Schedule, Slot};

/// Checks every edge's latency constraint and every cycle's issue-slot
/// capacity against `schedule`.
pub fn verify(dag: &Dag, machine: &MachineModel, schedule: &Schedule) -> Result<()> {
    let mut cycle_of = vec![None; dag.num_nodes()];
    for (index, slot) in schedule.slots().iter().enumerate() {
        if let Slot::Instr(node) = slot {
            let cycle = schedule.cycle_of(index);
            if cycle_of[node.index()].replace(cycle).is_some() {
                return Err(SchedulerError::Internal(format!("{node:?} scheduled twice")));
            }
        }
    }

    for node in dag.instructions() {
        if cycle_of[node.index()].is_none() {
            return Err(SchedulerError::Internal(format!("{node:?} never scheduled")));
        }
    }

    for node in dag.instructions() {
        let cycle = cycle_of[node.index()].unwrap();
        for edge in dag.successors(node) {
            if edge.to == dag.exit() {
                continue;
            }
            let succ_cycle = cycle_of[edge.to.index()].unwrap();
            if succ_cycle < cycle + edge.latency {
                return Err(SchedulerError::Internal(format!(
                    "{node:?} -> {:?} violates latency {}: {cycle} vs {succ_cycle}",
                    edge.to, edge.latency
                )));
            }
        }
    }

    let issue_rate = machine.issue_rate();
    for (cycle, cycle_slots) in schedule.slots().chunks(issue_rate as usize).enumerate() {
        let issued = cycle_slots.iter().filter(|s| matches!(s, Slot::Instr(_))).count();
        if issued as u32 > issue_rate {
            return Err(SchedulerError::Internal("cycle exceeds issue rate".into()));
        }

        let mut per_issue_type: FnvHashMap<IssueTypeId, u32> = FnvHashMap::default();
        for slot in cycle_slots {
            if let Slot::Instr(node) = slot {
                *per_issue_type.entry(dag.node(*node).issue_type).or_insert(0) += 1;
            }
        }
        for (issue_type, count) in per_issue_type {
            let capacity = machine.slots_for_issue_type(issue_type);
            if count > capacity {
                return Err(SchedulerError::Internal(format!(
                    "cycle {cycle} issues {count} instructions of issue type {issue_type:?}, exceeding capacity {capacity}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatencyPrecision;
    use crate::dag::{DagBuilder, DepKind, RawEdge, RawNode};
    use crate::schedule::Slot;

    #[test]
    fn schedule_respecting_latency_passes() {
        let mut m = MachineModel::new(1);
        let it = m.add_issue_type("alu", 1);
        let ty = m.add_instr_type("op", it, 1, true);
        let mut b = DagBuilder::new();
        let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let c = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: a, to: c, kind: DepKind::Data, latency_hint: None });
        let dag = b.build(&m, LatencyPrecision::Precise, 10_000, false).unwrap();

        let nodes: Vec<_> = dag.instructions().collect();
        let mut schedule = Schedule::new(1);
        schedule.push(Slot::Instr(nodes[0]));
        schedule.push(Slot::Instr(nodes[1]));

        assert!(verify(&dag, &m, &schedule).is_ok());
    }

    #[test]
    fn schedule_violating_latency_is_rejected() {
        let mut m = MachineModel::new(1);
        let it = m.add_issue_type("alu", 1);
        let ty = m.add_instr_type("op", it, 1, true);
        let mut b = DagBuilder::new();
        let a = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        let c = b.add_node(RawNode { instr_type: ty, issue_type: it, defs: vec![], uses: vec![] });
        b.add_edge(RawEdge { from: a, to: c, kind: DepKind::Data, latency_hint: None });
        let dag = b.build(&m, LatencyPrecision::Precise, 10_000, false).unwrap();

        let nodes: Vec<_> = dag.instructions().collect();
        let mut schedule = Schedule::new(1);
        // Both in cycle 0: violates the latency-1 edge.
        schedule.push(Slot::Instr(nodes[1]));
        schedule.push(Slot::Instr(nodes[0]));

        assert!(verify(&dag, &m, &schedule).is_err());
    }
}
