//! Branch-and-bound instruction scheduler for a compiler code generator
//! back end.
//!
//! [`find_optimal_schedule`] is the single entry point: given a prepared
//! dependence graph and a machine model, it runs the list-scheduling
//! heuristic first (cheap, always feasible), then spends whatever budget
//! [`Config`] and the caller's deadlines allow trying to beat it with a
//! branch-and-bound search. The heuristic schedule is always a safe
//! fallback — every exit path that does not return an error carries a
//! legal schedule.

mod bitset;
mod config;
mod dag;
mod enumerator;
mod error;
mod heuristic;
mod history;
mod machine;
mod priority;
mod registers;
mod relaxed;
mod schedule;
mod superiority;
mod tracker;
mod transforms;
mod verifier;

pub use config::{Config, Deadline, EngineMode, LatencyPrecision, RelaxedAlgorithm, SpillCostFunction};
pub use dag::{Dag, DagBuilder, DepKind, NodeIndex, RawEdge, RawNode};
pub use enumerator::Status;
pub use error::{Result, SchedulerError};
pub use machine::{InstrTypeId, IssueTypeId, MachineModel, RegTypeId};
pub use priority::PriorityKey;
pub use registers::{RegId, RegRef, RegisterBank, RegisterFile, RegisterMeta};
pub use schedule::{Schedule, Slot};

/// Not part of the crate's public contract. Exists only so the
/// `tracker_bench` criterion harness can drive the tracker's hot
/// `schedule`/`unschedule` path directly, the way `find_optimal_schedule`
/// does internally, without going through a full enumerator run.
#[doc(hidden)]
pub mod bench_support {
    pub use crate::tracker::CostTracker;
}

use tracker::CostTracker;

/// Everything a call to [`find_optimal_schedule`] produces: the
/// best schedule found, its cost and length, and the heuristic's for
/// comparison, named per field rather than bundled as a tuple.
#[derive(Clone, Debug)]
pub struct SchedulingResult {
    pub status: Status,
    pub schedule: Schedule,
    pub best_cost: u64,
    pub best_length: u32,
    pub heuristic_cost: u64,
    pub heuristic_length: u32,
}

/// Runs the full scheduling pipeline for one region: heuristic seed,
/// optional graph transforms, relaxed lower bounds, and branch-and-bound
/// search, honoring `config`'s engine mode and size limits.
///
/// `bank` must share the same [`RegId`] space the caller used when
/// supplying `dag`'s `RawNode::defs`/`uses` — the core never invents
/// register identities of its own, it only reads the ones the host
/// already assigned.
///
/// `region_deadline` bounds the whole call; `length_deadline` is re-armed
/// for every candidate schedule length the enumerator's outer loop tries.
/// Both are realized [`Deadline`]s rather than raw millisecond config
/// fields so tests can drive them directly (e.g. `Deadline::from_millis(0)`
/// to force an immediate timeout).
pub fn find_optimal_schedule(
    dag: &mut Dag,
    machine: &MachineModel,
    bank: &RegisterBank,
    config: &Config,
    region_deadline: Deadline,
    length_deadline: Deadline,
) -> Result<SchedulingResult> {
    let num_instructions = dag.num_instructions();
    log::info!(
        "find_optimal_schedule: region of {num_instructions} instructions, engine_mode={:?}",
        config.engine_mode
    );

    if num_instructions < config.min_dag_size || num_instructions > config.max_dag_size {
        log::info!(
            "region size {num_instructions} outside {}..={}, skipping the engine",
            config.min_dag_size, config.max_dag_size
        );
        let (heuristic, heuristic_cost) = run_heuristic(dag, machine, config, bank);
        let heuristic_length = heuristic.length();
        return Ok(SchedulingResult {
            status: Status::OutOfRange,
            schedule: heuristic,
            best_cost: heuristic_cost,
            best_length: heuristic_length,
            heuristic_cost,
            heuristic_length,
        });
    }

    let (heuristic, heuristic_cost) = run_heuristic(dag, machine, config, bank);
    let heuristic_length = heuristic.length();

    if config.engine_mode == EngineMode::No {
        return Ok(SchedulingResult {
            status: Status::Success,
            schedule: heuristic,
            best_cost: heuristic_cost,
            best_length: heuristic_length,
            heuristic_cost,
            heuristic_length,
        });
    }

    if let Some(cap) = config.max_spill_cost {
        if heuristic_cost > cap as u64 {
            log::info!("heuristic cost {heuristic_cost} exceeds MAX_SPILL_COST {cap}, enumeration disabled");
            return Ok(SchedulingResult {
                status: Status::Success,
                schedule: heuristic,
                best_cost: heuristic_cost,
                best_length: heuristic_length,
                heuristic_cost,
                heuristic_length,
            });
        }
    }

    if config.pruning.node_superiority {
        let plan = transforms::plan_transforms(dag, bank);
        if !plan.edges.is_empty() {
            log::debug!("applying {} graph transform edge(s) before enumeration", plan.edges.len());
            transforms::apply_and_refresh(dag, &plan)?;
        }
    }

    let outcome = enumerator::find_best_schedule(
        dag,
        machine,
        bank,
        config,
        &heuristic,
        heuristic_cost,
        region_deadline,
        length_deadline,
    );

    if config.verify_schedule && matches!(outcome.status, Status::Success) {
        if let Err(e) = verifier::verify(dag, machine, &outcome.schedule) {
            log::error!("verifier rejected enumerator output: {e}");
            return Err(e);
        }
    }

    let status = if outcome.status == Status::Fail {
        // The search never beat the heuristic; that is not a failure of
        // the call, the heuristic schedule is still returned.
        Status::Success
    } else {
        outcome.status
    };

    Ok(SchedulingResult {
        status,
        best_cost: outcome.cost,
        best_length: outcome.length,
        schedule: outcome.schedule,
        heuristic_cost,
        heuristic_length,
    })
}

fn run_heuristic(
    dag: &Dag,
    machine: &MachineModel,
    config: &Config,
    bank: &RegisterBank,
) -> (Schedule, u64) {
    let tracker = CostTracker::new(machine, bank, config.spill_cost_fn);
    let (schedule, tracker) = heuristic::list_schedule(dag, machine, config, bank, tracker);
    let spill = tracker.spill_cost(dag.num_instructions());
    let cost = config.combined_cost(schedule.length(), spill);
    (schedule, cost)
}
