//! Branch-and-bound enumerator: searches for a schedule of
//! minimal combined cost, one candidate target length at a time.

mod node;

pub use node::TreeNode;

use std::time::Instant;

use crate::config::{Config, Deadline};
use crate::dag::{Dag, NodeIndex};
use crate::history::HistoryTable;
use crate::machine::MachineModel;
use crate::priority::{compare_candidates, PriorityContext};
use crate::registers::{RegRef, RegisterBank};
use crate::relaxed::combined_lower_bound;
use crate::schedule::{Schedule, Slot};
use crate::superiority::is_superior;
use crate::tracker::CostTracker;

use node::extend_signature;

/// Outcome of a `find_best_schedule` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    Timeout,
    Fail,
    Error,
    /// Region size fell outside `MIN_DAG_SIZE`..=`MAX_DAG_SIZE`; the
    /// enumerator never ran.
    OutOfRange,
}

pub struct EnumeratorOutput {
    pub status: Status,
    pub schedule: Schedule,
    pub cost: u64,
    pub length: u32,
}

/// Runs the outer length loop, returning the
/// best schedule found. `heuristic` seeds the initial upper bound and is
/// the fallback if the search never improves on it. `length_deadline` is
/// re-armed fresh for every candidate length (a length that times out
/// does not count against the next one's budget).
pub fn find_best_schedule(
    dag: &Dag,
    machine: &MachineModel,
    bank: &RegisterBank,
    config: &Config,
    heuristic: &Schedule,
    heuristic_cost: u64,
    region_deadline: Deadline,
    length_deadline: Deadline,
) -> EnumeratorOutput {
    let start = Instant::now();
    let schedule_lb = combined_lower_bound(dag, machine, config.lb_alg).max(dag.lower_bound());
    let schedule_ub = heuristic.length();

    let mut best_cost = heuristic_cost;
    let mut best_schedule = heuristic.clone();
    let mut status = Status::Fail;

    let mut length = schedule_lb;
    while length <= schedule_ub {
        if region_deadline.elapsed_past(start.elapsed()) {
            status = Status::Timeout;
            break;
        }

        let mut search = Search {
            dag,
            machine,
            bank,
            config,
            history: HistoryTable::new(config.hist_table_hash_bits),
            tracker: CostTracker::new(machine, bank, config.spill_cost_fn),
            target_length: length,
            start,
            region_deadline,
            length_deadline,
            best_cost,
            best: None,
        };
        search.tracker.set_fixing_modes(config.fix_livein, config.fix_liveout);

        let state = SearchState::new(dag);
        let outcome = search.descend(state, Vec::new());

        match outcome {
            SearchOutcome::Improved => {
                let (schedule, cost) = search.best.take().expect("Improved implies a recorded schedule");
                best_cost = cost;
                best_schedule = schedule;
                status = Status::Success;
                if cost == 0 {
                    break;
                }
            }
            SearchOutcome::TimedOut => {
                status = Status::Timeout;
                break;
            }
            SearchOutcome::Exhausted => {}
        }

        length += 1;
    }

    EnumeratorOutput {
        status,
        length: best_schedule.length(),
        schedule: best_schedule,
        cost: best_cost,
    }
}

enum SearchOutcome {
    /// A strictly better schedule than `best_cost` was found and stashed
    /// in `Search::best`.
    Improved,
    TimedOut,
    /// The subtree was fully explored without improving `best_cost`.
    Exhausted,
}

/// Per-length search state: the tracker, history table, and best
/// schedule seen so far, borrowed across one outer-loop length.
struct Search<'a> {
    dag: &'a Dag,
    machine: &'a MachineModel,
    bank: &'a RegisterBank,
    config: &'a Config,
    history: HistoryTable,
    tracker: CostTracker,
    target_length: u32,
    start: Instant,
    region_deadline: Deadline,
    length_deadline: Deadline,
    best_cost: u64,
    best: Option<(Schedule, u64)>,
}

/// Ready-set bookkeeping shared with the heuristic's `ListState`, plus
/// the slot stack the enumerator backtracks over.
struct SearchState {
    unscheduled_preds: std::collections::HashMap<NodeIndex, u32, fnv::FnvBuildHasher>,
    /// Earliest cycle each node may issue, tightened as predecessors are
    /// scheduled; mirrors the heuristic's `ListState::earliest`.
    earliest: std::collections::HashMap<NodeIndex, u32, fnv::FnvBuildHasher>,
    ready: Vec<NodeIndex>,
    scheduled: Vec<Option<NodeIndex>>,
}

impl SearchState {
    fn new(dag: &Dag) -> Self {
        let mut unscheduled_preds = std::collections::HashMap::default();
        let mut earliest = std::collections::HashMap::default();
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
        SearchState { unscheduled_preds, earliest, ready, scheduled: Vec::new() }
    }

    fn ready_cycle(&self, node: NodeIndex) -> u32 {
        self.earliest.get(&node).copied().unwrap_or(0)
    }

    fn push(&mut self, dag: &Dag, cycle: u32, slot: Slot) {
        let node = match slot {
            Slot::Instr(n) => {
                self.ready.retain(|&r| r != n);
                for edge in dag.successors(n) {
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
                Some(n)
            }
            Slot::Stall => None,
        };
        self.scheduled.push(node);
    }

    fn pop(&mut self, dag: &Dag) {
        if let Some(node) = self.scheduled.pop().flatten() {
            for edge in dag.successors(node) {
                if edge.to == dag.exit() {
                    continue;
                }
                if let Some(count) = self.unscheduled_preds.get_mut(&edge.to) {
                    if *count == 0 {
                        self.ready.retain(|&r| r != edge.to);
                    }
                    *count += 1;
                }
            }
            self.ready.push(node);
        }
    }

    fn is_complete(&self, dag: &Dag) -> bool {
        self.scheduled.iter().filter(|s| s.is_some()).count() == dag.num_instructions()
    }
}

struct EnumContext<'a> {
    dag: &'a Dag,
    state: &'a SearchState,
}

impl<'a> PriorityContext for EnumContext<'a> {
    fn critical_path(&self, node: NodeIndex) -> u32 {
        self.dag.critical_path_to_exit(node)
    }

    fn last_use_count(&self, node: NodeIndex) -> u32 {
        self.dag
            .predecessors(node)
            .iter()
            .filter(|e| {
                self.dag
                    .successors(e.from)
                    .iter()
                    .filter(|s| !self.state.scheduled.contains(&Some(s.to)))
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

    fn live_set_size_if_scheduled(&self, node: NodeIndex) -> u32 {
        self.dag
            .successors(node)
            .iter()
            .filter(|e| !self.state.scheduled.contains(&Some(e.to)))
            .count() as u32
    }
}

impl<'a> Search<'a> {
    /// Depth-first descent over one (cycle, slot) position at a time.
    /// `path` carries the scheduled-or-stall slots taken to reach this
    /// point, used to rebuild the winning `Schedule` on success. `path`
    /// is indexed in issue *slots*; `target_length` (and every length the
    /// outer loop iterates over) is in *cycles* (`Schedule::length()`),
    /// so the two are only ever compared through `issue_rate`.
    fn descend(&mut self, mut state: SearchState, path: Vec<Slot>) -> SearchOutcome {
        if self.deadline_hit() {
            return SearchOutcome::TimedOut;
        }

        let issue_rate = self.machine.issue_rate().max(1);

        if state.is_complete(self.dag) {
            if cycles_used(path.len(), issue_rate) != self.target_length {
                return SearchOutcome::Exhausted;
            }
            let cost = self.finish_schedule_cost(&path);
            if cost < self.best_cost {
                self.best_cost = cost;
                let schedule = self.materialize(&path);
                self.best = Some((schedule, cost));
                return SearchOutcome::Improved;
            }
            return SearchOutcome::Exhausted;
        }

        if path.len() as u32 >= self.target_length * issue_rate {
            return SearchOutcome::Exhausted;
        }

        let cycle = path.len() as u32 / issue_rate;
        let entries_pending = self.dag.instructions().any(|n| {
            self.dag.predecessors(n).iter().any(|e| e.from == self.dag.entry())
                && !state.scheduled.contains(&Some(n))
        });
        let exits_pending = self.dag.instructions().any(|n| {
            self.dag.successors(n).iter().any(|e| e.to == self.dag.exit())
                && !state.scheduled.contains(&Some(n))
        });

        let ctx_state = &state;
        let ctx = EnumContext { dag: self.dag, state: ctx_state };
        let mut candidates: Vec<NodeIndex> = state
            .ready
            .iter()
            .copied()
            .filter(|&n| state.ready_cycle(n) <= cycle)
            .filter(|&n| {
                let data = self.dag.node(n);
                self.tracker.is_legal_to_schedule(self.bank, &data.uses, &data.defs)
            })
            .filter(|&n| {
                let is_entry = self.dag.predecessors(n).iter().any(|e| e.from == self.dag.entry());
                let is_exit = self.dag.successors(n).iter().any(|e| e.to == self.dag.exit());
                self.tracker.is_legal_fixing(entries_pending, exits_pending, is_entry, is_exit)
            })
            .collect();
        candidates.sort_by(|&a, &b| compare_candidates(&self.config.enum_priority, &ctx, a, b));

        // Node-superiority pruning: if a known-superior
        // ready node exists, only it (and anything tied with it) is worth
        // trying this slot.
        if self.config.pruning.node_superiority {
            if let Some(&best) = candidates.first() {
                candidates.retain(|&c| c == best || !is_superior(self.dag, self.bank, best, c));
            }
        }

        let mut improved = false;
        let tried_real_candidate = !candidates.is_empty();
        for candidate in candidates {
            let data = self.dag.node(candidate);
            let uses: Vec<RegRef> = data.uses.iter().copied().collect();
            let defs: Vec<RegRef> = data.defs.iter().copied().collect();

            let snapshot = self.tracker.snapshot();
            self.tracker.schedule(candidate, &uses, &defs);

            let mut next_path = path.clone();
            next_path.push(Slot::Instr(candidate));

            if self.prune(&next_path) {
                self.tracker.unschedule(&uses, &defs, &snapshot);
                continue;
            }

            state.push(self.dag, cycle, Slot::Instr(candidate));
            let child_state = SearchState {
                unscheduled_preds: state.unscheduled_preds.clone(),
                earliest: state.earliest.clone(),
                ready: state.ready.clone(),
                scheduled: state.scheduled.clone(),
            };
            match self.descend(child_state, next_path) {
                SearchOutcome::Improved => improved = true,
                SearchOutcome::TimedOut => {
                    state.pop(self.dag);
                    self.tracker.unschedule(&uses, &defs, &snapshot);
                    return SearchOutcome::TimedOut;
                }
                SearchOutcome::Exhausted => {}
            }
            state.pop(self.dag);
            self.tracker.unschedule(&uses, &defs, &snapshot);
        }

        // A stall is the search's last resort: only tried once no real
        // candidate could occupy this slot.
        if self.config.pruning.enumerate_stalls && !tried_real_candidate {
            let mut next_path = path.clone();
            next_path.push(Slot::Stall);
            match self.descend(SearchState {
                unscheduled_preds: state.unscheduled_preds.clone(),
                earliest: state.earliest.clone(),
                ready: state.ready.clone(),
                scheduled: state.scheduled.clone(),
            }, next_path) {
                SearchOutcome::Improved => improved = true,
                SearchOutcome::TimedOut => return SearchOutcome::TimedOut,
                SearchOutcome::Exhausted => {}
            }
        }

        if improved {
            SearchOutcome::Improved
        } else {
            SearchOutcome::Exhausted
        }
    }

    fn deadline_hit(&self) -> bool {
        let elapsed = self.start.elapsed();
        self.region_deadline.elapsed_past(elapsed) || self.length_deadline.elapsed_past(elapsed)
    }

    /// Cost feasibility pruning: the partial schedule's
    /// lower bound already meets or exceeds the best cost seen, or (when
    /// enabled) the spill-cost ceiling / history table says so.
    fn prune(&mut self, path: &[Slot]) -> bool {
        let issue_rate = self.machine.issue_rate().max(1);
        let length_so_far = cycles_used(path.len(), issue_rate);
        let spill_so_far = self.tracker.spill_cost(self.dag.num_instructions());
        let cost_lb = self.config.combined_cost(length_so_far, spill_so_far);
        if cost_lb >= self.best_cost {
            return true;
        }

        if self.config.pruning.spill_cost {
            if let Some(ceiling) = self.config.max_spill_cost {
                if self.tracker.running_peak() > ceiling {
                    return true;
                }
            }
        }

        if self.config.pruning.history_domination {
            let signature = signature_of(path);
            if self.history.is_dominated(signature, cost_lb) {
                return true;
            }
            self.history.record(signature, cost_lb);
        }

        if self.config.pruning.relaxed {
            let relaxed_lb = crate::relaxed::partial_forward_lower_bound(
                self.dag,
                self.machine.issue_rate(),
                path,
            );
            if relaxed_lb > self.target_length {
                return true;
            }
        }

        false
    }

    fn finish_schedule_cost(&self, path: &[Slot]) -> u64 {
        let issue_rate = self.machine.issue_rate().max(1);
        let length = cycles_used(path.len(), issue_rate);
        let spill = self.tracker.spill_cost(self.dag.num_instructions());
        self.config.combined_cost(length, spill)
    }

    fn materialize(&self, path: &[Slot]) -> Schedule {
        let mut schedule = Schedule::new(self.machine.issue_rate());
        for &slot in path {
            schedule.push(slot);
        }
        for (reg_type, _) in self.bank.iter_files() {
            schedule.record_peak_pressure(reg_type, self.tracker.peak_for(reg_type));
        }
        schedule
    }
}

/// Converts a count of occupied issue slots into the cycle count
/// `Schedule::length()` would report for them: the cycle of the last
/// occupied slot, plus one. Mirrors `Schedule::length()`'s formula so
/// `target_length` (always a cycle count) can be compared against
/// `path.len()` (always a slot count) consistently throughout `descend`.
fn cycles_used(slots: usize, issue_rate: u32) -> u32 {
    if slots == 0 {
        0
    } else {
        ((slots - 1) as u32 / issue_rate) + 1
    }
}

/// Recomputes the rolling signature for a path from scratch. Production
/// code keeps this incremental on `TreeNode`; recomputing here keeps the
/// recursive `descend` free of extra bookkeeping at the cost of O(depth)
/// work per prune check, acceptable for basic-block-sized regions.
fn signature_of(path: &[Slot]) -> u64 {
    let mut sig = TreeNode::root().signature;
    for (i, &slot) in path.iter().enumerate() {
        let node = match slot {
            Slot::Instr(n) => Some(n),
            Slot::Stall => None,
        };
        sig = extend_signature(sig, node, i as u32);
    }
    sig
}
