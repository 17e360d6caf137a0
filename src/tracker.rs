//! Cost / register-pressure tracker.
//!
//! The enumerator calls `schedule`/`unschedule` on this type billions of
//! times over a single region, so every method here stays allocation-free
//! on the hot path: live state is one [`crate::bitset::IndexBitSet`] per
//! register type plus a handful of `Vec<u32>` peak counters, and
//! `unschedule` restores peaks from a caller-supplied snapshot rather than
//! recomputing them.

use cranelift_entity::PrimaryMap;

use crate::bitset::IndexBitSet;
use crate::config::SpillCostFunction;
use crate::dag::NodeIndex;
use crate::machine::{MachineModel, RegTypeId};
use crate::registers::{RegId, RegisterBank, RegRef};

/// Live state for one register type.
#[derive(Clone, Debug)]
struct LiveSet {
    /// Registers of this type currently live.
    live: IndexBitSet<RegId>,
    peak: u32,
    phys_limit: u32,
}

impl LiveSet {
    fn new(reg_count: usize, phys_limit: u32) -> Self {
        LiveSet {
            live: IndexBitSet::new(reg_count),
            peak: 0,
            phys_limit,
        }
    }

    fn live_count(&self) -> u32 {
        self.live.count()
    }
}

/// A snapshot of everything `unschedule` needs to restore exactly, taken
/// by the enumerator before each `schedule` call.
#[derive(Clone, Debug)]
pub struct TrackerSnapshot {
    per_type_peak: Vec<u32>,
    global_peak: u32,
    global_sum: u32,
    step: usize,
}

/// Maintains live-register sets, per-cycle spill costs, and peak
/// pressures for one scheduling attempt.
#[derive(Clone, Debug)]
pub struct CostTracker {
    sets: PrimaryMap<RegTypeId, LiveSet>,
    use_counts: PrimaryMap<RegTypeId, Vec<u32>>,
    per_cycle_spill_cost: Vec<u32>,
    running_sum: u32,
    running_peak: u32,
    spill_cost_fn: SpillCostFunction,
    fix_livein: bool,
    fix_liveout: bool,
}

impl CostTracker {
    pub fn new(machine: &MachineModel, bank: &RegisterBank, spill_cost_fn: SpillCostFunction) -> Self {
        let mut sets = PrimaryMap::new();
        let mut use_counts = PrimaryMap::new();
        for (reg_type, _) in machine.register_types() {
            let file = bank.file(reg_type);
            let phys_limit = machine.register_type(reg_type).phys_count;
            let pushed = sets.push(LiveSet::new(file.len(), phys_limit));
            debug_assert_eq!(pushed, reg_type);

            let counts: Vec<u32> = file.iter().map(|(_, meta)| meta.use_count).collect();
            let pushed = use_counts.push(counts);
            debug_assert_eq!(pushed, reg_type);
        }
        CostTracker {
            sets,
            use_counts,
            per_cycle_spill_cost: Vec::new(),
            running_sum: 0,
            running_peak: 0,
            spill_cost_fn,
            fix_livein: false,
            fix_liveout: false,
        }
    }

    pub fn set_fixing_modes(&mut self, fix_livein: bool, fix_liveout: bool) {
        self.fix_livein = fix_livein;
        self.fix_liveout = fix_liveout;
    }

    pub fn running_sum(&self) -> u32 {
        self.running_sum
    }

    pub fn running_peak(&self) -> u32 {
        self.running_peak
    }

    pub fn per_cycle_spill_cost(&self) -> &[u32] {
        &self.per_cycle_spill_cost
    }

    pub fn peak_for(&self, reg_type: RegTypeId) -> u32 {
        self.sets[reg_type].peak
    }

    pub fn is_live(&self, r: RegRef) -> bool {
        self.sets[r.reg_type].live.contains(r.id)
    }

    /// Legality check: a def clashes with
    /// a currently-live distinct physical register unless this
    /// instruction is that register's last consumer (i.e. `uses`
    /// contains it and this step would drop its use count to zero).
    pub fn is_legal_to_schedule(&self, bank: &RegisterBank, uses: &[RegRef], defs: &[RegRef]) -> bool {
        for &def in defs {
            let Some(alias) = bank.get(def).phys_alias else { continue };
            let set = &self.sets[def.reg_type];
            for other in set.live.iter() {
                if other == def.id {
                    continue;
                }
                let other_ref = RegRef { reg_type: def.reg_type, id: other };
                if bank.get(other_ref).phys_alias != Some(alias) {
                    continue;
                }
                let is_last_use = uses.contains(&other_ref)
                    && self.use_counts[other_ref.reg_type][other_ref.id.index()] == 1;
                if !is_last_use {
                    return false;
                }
            }
        }
        true
    }

    /// Refuses scheduling a non-entry/non-exit instruction while fixing
    /// modes require entry/exit instructions to go first/last.
    pub fn is_legal_fixing(&self, is_entry_pending: bool, is_exit_pending: bool, is_entry: bool, is_exit: bool) -> bool {
        if self.fix_livein && is_entry_pending && !is_entry {
            return false;
        }
        if self.fix_liveout && is_exit_pending && !is_exit {
            return false;
        }
        true
    }

    /// Takes a restore point for a later `unschedule` of the instruction
    /// about to be scheduled.
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            per_type_peak: self.sets.values().map(|s| s.peak).collect(),
            global_peak: self.running_peak,
            global_sum: self.running_sum,
            step: self.per_cycle_spill_cost.len(),
        }
    }

    /// Applies `inst`'s uses and defs, updates peaks, and appends this
    /// step's spill cost.
    pub fn schedule(&mut self, inst: NodeIndex, uses: &[RegRef], defs: &[RegRef]) {
        for &u in uses {
            let counts = &mut self.use_counts[u.reg_type];
            let count = &mut counts[u.id.index()];
            debug_assert!(*count > 0, "use of a register with no remaining consumers");
            *count -= 1;
            if *count == 0 {
                self.sets[u.reg_type].live.remove(u.id);
            }
        }

        for &d in defs {
            if self.use_counts[d.reg_type][d.id.index()] == 0 {
                // No remaining consumers: a dead def never becomes live.
                continue;
            }
            self.sets[d.reg_type].live.insert(d.id);
        }
        let _ = inst;

        let mut step_cost = 0u32;
        for set in self.sets.values_mut() {
            let live_count = set.live_count();
            set.peak = set.peak.max(live_count);
            let excess = match self.spill_cost_fn {
                SpillCostFunction::PeakPerType => set.peak.saturating_sub(set.phys_limit),
                _ => live_count.saturating_sub(set.phys_limit),
            };
            step_cost += excess;
        }

        self.per_cycle_spill_cost.push(step_cost);
        self.running_sum += step_cost;
        self.running_peak = self.running_peak.max(step_cost);
    }

    /// Exact inverse of `schedule`; peaks come from `snapshot` rather than
    /// being recomputed.
    pub fn unschedule(&mut self, uses: &[RegRef], defs: &[RegRef], snapshot: &TrackerSnapshot) {
        for &d in defs {
            self.sets[d.reg_type].live.remove(d.id);
        }
        for &u in uses {
            let counts = &mut self.use_counts[u.reg_type];
            let count = &mut counts[u.id.index()];
            if *count == 0 {
                self.sets[u.reg_type].live.insert(u.id);
            }
            *count += 1;
        }

        for (set, &peak) in self.sets.values_mut().zip(snapshot.per_type_peak.iter()) {
            set.peak = peak;
        }
        self.per_cycle_spill_cost.truncate(snapshot.step);
        self.running_sum = snapshot.global_sum;
        self.running_peak = snapshot.global_peak;
    }

    /// Final spill cost under the configured [`SpillCostFunction`],
    /// scaled by `instr_count` for `PEAK_PLUS_AVG`.
    pub fn spill_cost(&self, instr_count: usize) -> u32 {
        match self.spill_cost_fn {
            SpillCostFunction::Peak => self.running_peak,
            SpillCostFunction::PeakPerType => self.sets.values().map(|s| s.peak).max().unwrap_or(0),
            SpillCostFunction::Sum => self.running_sum,
            SpillCostFunction::PeakPlusAvg => {
                let avg = if instr_count == 0 { 0 } else { self.running_sum / instr_count as u32 };
                self.running_peak + avg
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpillCostFunction;
    use crate::dag::NodeIndex;
    use crate::machine::MachineModel;
    use cranelift_entity::EntityRef;

    fn fixture() -> (MachineModel, RegisterBank, RegRef, RegRef) {
        let mut m = MachineModel::new(1);
        let rt = m.add_register_type("gpr", 1);
        let mut bank = RegisterBank::new(&m);
        let file = bank.file_mut(rt);
        let r0 = file.add_register(1, None);
        let r1 = file.add_register(1, None);
        (m, bank, RegRef { reg_type: rt, id: r0 }, RegRef { reg_type: rt, id: r1 })
    }

    #[test]
    fn schedule_unschedule_round_trips() {
        let (m, bank, r0, _r1) = fixture();
        let mut tracker = CostTracker::new(&m, &bank, SpillCostFunction::Sum);

        let before_sum = tracker.running_sum();
        let before_peak = tracker.running_peak();
        let before_len = tracker.per_cycle_spill_cost().len();

        let snap = tracker.snapshot();
        tracker.schedule(NodeIndex::new(0), &[], &[r0]);
        assert!(tracker.is_live(r0));
        tracker.unschedule(&[], &[r0], &snap);

        assert!(!tracker.is_live(r0));
        assert_eq!(tracker.running_sum(), before_sum);
        assert_eq!(tracker.running_peak(), before_peak);
        assert_eq!(tracker.per_cycle_spill_cost().len(), before_len);
    }

    #[test]
    fn def_over_capacity_counts_as_spill() {
        let (m, bank, r0, r1) = fixture();
        let mut tracker = CostTracker::new(&m, &bank, SpillCostFunction::Sum);
        tracker.schedule(NodeIndex::new(0), &[], &[r0]);
        tracker.schedule(NodeIndex::new(1), &[], &[r1]);
        // phys_limit is 1, two simultaneously-live registers exceed it.
        assert!(tracker.running_sum() > 0);
    }
}
