//! The schedule itself: a dense (cycle, slot) -> instruction array plus
//! the cost bookkeeping carried alongside it.

use crate::dag::NodeIndex;
use crate::machine::RegTypeId;
use fnv::FnvHashMap;

/// What occupies one (cycle, slot) position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Instr(NodeIndex),
    Stall,
}

/// A complete, resource-legal ordering of one region's instructions,
/// including explicit stall slots.
///
/// Exclusively owned by whichever component produced it; the core
/// hands the winning one back to the caller and drops the rest.
#[derive(Clone, Debug)]
pub struct Schedule {
    issue_rate: u32,
    slots: Vec<Slot>,
    spill_cost_sum: u32,
    peak_spill_cost: u32,
    per_cycle_spill_cost: Vec<u32>,
    peak_pressure: FnvHashMap<RegTypeId, u32>,
    cached_cost: Option<u64>,
}

impl Schedule {
    pub fn new(issue_rate: u32) -> Self {
        Schedule {
            issue_rate,
            slots: Vec::new(),
            spill_cost_sum: 0,
            peak_spill_cost: 0,
            per_cycle_spill_cost: Vec::new(),
            peak_pressure: FnvHashMap::default(),
            cached_cost: None,
        }
    }

    pub fn issue_rate(&self) -> u32 {
        self.issue_rate
    }

    /// Appends one (cycle, slot) entry; cycle/slot are implied by the
    /// dense layout (`index = cycle * issue_rate + slot`).
    pub fn push(&mut self, slot: Slot) {
        self.slots.push(slot);
        self.cached_cost = None;
    }

    pub fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
        self.cached_cost = None;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn cycle_of(&self, index: usize) -> u32 {
        (index / self.issue_rate as usize) as u32
    }

    pub fn slot_of(&self, index: usize) -> u32 {
        (index % self.issue_rate as usize) as u32
    }

    /// Number of cycles used: the cycle of the last occupied slot, plus
    /// one. Trailing unused slots in that final, possibly partial, cycle
    /// are not counted — a schedule that finishes mid-cycle on a 2-wide
    /// machine still reports the cycle count, not the padded slot count.
    pub fn length(&self) -> u32 {
        if self.slots.is_empty() {
            0
        } else {
            ((self.slots.len() - 1) as u32 / self.issue_rate) + 1
        }
    }

    pub fn record_cycle_spill_cost(&mut self, cost: u32) {
        self.per_cycle_spill_cost.push(cost);
        self.spill_cost_sum += cost;
        self.peak_spill_cost = self.peak_spill_cost.max(cost);
        self.cached_cost = None;
    }

    pub fn record_peak_pressure(&mut self, reg_type: RegTypeId, peak: u32) {
        let slot = self.peak_pressure.entry(reg_type).or_insert(0);
        *slot = (*slot).max(peak);
    }

    pub fn spill_cost_sum(&self) -> u32 {
        self.spill_cost_sum
    }

    pub fn peak_spill_cost(&self) -> u32 {
        self.peak_spill_cost
    }

    pub fn per_cycle_spill_cost(&self) -> &[u32] {
        &self.per_cycle_spill_cost
    }

    pub fn peak_pressure(&self, reg_type: RegTypeId) -> u32 {
        self.peak_pressure.get(&reg_type).copied().unwrap_or(0)
    }

    /// Combined cost under a `Config`'s weights, memoized until the next
    /// mutation.
    pub fn cost(&mut self, spill_cost: u32, length_weight: u32, spill_weight: u32) -> u64 {
        if let Some(c) = self.cached_cost {
            return c;
        }
        let cost = self.length() as u64 * length_weight as u64 + spill_cost as u64 * spill_weight as u64;
        self.cached_cost = Some(cost);
        cost
    }

    pub fn instructions(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.slots.iter().filter_map(|s| match s {
            Slot::Instr(n) => Some(*n),
            Slot::Stall => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn cycle_and_slot_math() {
        let mut s = Schedule::new(2);
        s.push(Slot::Instr(NodeIndex::new(0)));
        s.push(Slot::Instr(NodeIndex::new(1)));
        s.push(Slot::Stall);
        s.push(Slot::Instr(NodeIndex::new(2)));
        assert_eq!(s.cycle_of(3), 1);
        assert_eq!(s.slot_of(3), 1);
        assert_eq!(s.length(), 2);
    }
}
