//! Typed configuration consumed by the core.
//!
//! The core never parses a config *file*; that is the host's job.
//! `Config::from_raw` is a convenience that turns the specified
//! key->string shape into this typed struct, but it touches no file or
//! environment state itself.

use std::collections::HashMap;
use std::time::Duration;

use crate::priority::PriorityKey;

/// `USE_OPT_SCHED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineMode {
    /// Run the engine unconditionally.
    Yes,
    /// Never run the engine; caller falls back to its default scheduler.
    No,
    /// Only run on regions the host marks "hot".
    HotOnly,
}

/// `LB_ALG`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelaxedAlgorithm {
    /// Rim-Jain non-work-conserving relaxation.
    RimJain,
    /// Infinite-resource list scheduler.
    ListBased,
}

/// `SPILL_COST_FUNCTION`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpillCostFunction {
    Peak,
    PeakPerType,
    Sum,
    PeakPlusAvg,
}

/// `LATENCY_PRECISION`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatencyPrecision {
    Precise,
    Rough,
    Unity,
}

/// `TIMEOUT_PER`: either a flat deadline or one scaled by
/// instruction count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutScale {
    Flat,
    PerInstruction,
}

/// A deadline handed to the heuristic or enumerator. `None` means
/// "no deadline" (only legal for isolated unit tests; production configs
/// always carry a finite deadline).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(pub Option<Duration>);

impl Deadline {
    pub const NONE: Deadline = Deadline(None);

    pub fn from_millis(ms: u64) -> Self {
        Deadline(Some(Duration::from_millis(ms)))
    }

    pub fn elapsed_past(&self, elapsed: Duration) -> bool {
        match self.0 {
            Some(limit) => elapsed >= limit,
            None => false,
        }
    }

    /// Scale a millisecond deadline by instruction count when
    /// `TIMEOUT_PER = INSTR` is configured.
    pub fn scaled(base_ms: u64, scale: TimeoutScale, instr_count: usize) -> Self {
        let ms = match scale {
            TimeoutScale::Flat => base_ms,
            TimeoutScale::PerInstruction => base_ms.saturating_mul(instr_count as u64),
        };
        Deadline::from_millis(ms)
    }
}

/// Pruning toggles. Grouped so the enumerator can pass
/// a single value around instead of four booleans.
#[derive(Clone, Copy, Debug)]
pub struct PruningConfig {
    pub relaxed: bool,
    pub node_superiority: bool,
    pub history_domination: bool,
    pub spill_cost: bool,
    /// `ENUMERATE_STALLS`.
    pub enumerate_stalls: bool,
}

impl Default for PruningConfig {
    fn default() -> Self {
        PruningConfig {
            relaxed: true,
            node_superiority: true,
            history_domination: true,
            spill_cost: true,
            enumerate_stalls: true,
        }
    }
}

/// The core's full typed configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub engine_mode: EngineMode,
    pub heuristic_priority: Vec<PriorityKey>,
    pub enum_priority: Vec<PriorityKey>,
    pub lb_alg: RelaxedAlgorithm,
    pub spill_cost_fn: SpillCostFunction,
    pub latency_precision: LatencyPrecision,
    pub max_dag_size_for_precise_latency: usize,
    pub pruning: PruningConfig,
    pub hist_table_hash_bits: u32,
    pub spill_cost_factor: u32,
    pub length_weight: u32,
    pub region_timeout_ms: u64,
    pub length_timeout_ms: u64,
    pub timeout_scale: TimeoutScale,
    pub min_dag_size: usize,
    pub max_dag_size: usize,
    pub check_spill_cost_sum: bool,
    pub check_conflicts: bool,
    pub fix_livein: bool,
    pub fix_liveout: bool,
    pub max_spill_cost: Option<u32>,
    pub verify_schedule: bool,
    pub use_file_bounds: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine_mode: EngineMode::Yes,
            heuristic_priority: vec![
                PriorityKey::CriticalPath,
                PriorityKey::LastUseCount,
                PriorityKey::NodeId,
            ],
            enum_priority: vec![
                PriorityKey::CriticalPath,
                PriorityKey::LastUseCount,
                PriorityKey::NodeId,
            ],
            lb_alg: RelaxedAlgorithm::RimJain,
            spill_cost_fn: SpillCostFunction::PeakPlusAvg,
            latency_precision: LatencyPrecision::Precise,
            max_dag_size_for_precise_latency: 200,
            pruning: PruningConfig::default(),
            hist_table_hash_bits: 16,
            spill_cost_factor: 20,
            length_weight: 100,
            region_timeout_ms: 10_000,
            length_timeout_ms: 1_000,
            timeout_scale: TimeoutScale::Flat,
            min_dag_size: 0,
            max_dag_size: usize::MAX,
            check_spill_cost_sum: false,
            check_conflicts: false,
            fix_livein: false,
            fix_liveout: false,
            max_spill_cost: None,
            verify_schedule: true,
            use_file_bounds: false,
        }
    }
}

impl Config {
    /// Combined cost of a schedule under the configured weights:
    /// `length * length_weight + spill_cost * spill_cost_factor`.
    pub fn combined_cost(&self, length: u32, spill_cost: u32) -> u64 {
        length as u64 * self.length_weight as u64 + spill_cost as u64 * self.spill_cost_factor as u64
    }

    /// Parse the host's plain key->string store into a typed `Config`.
    /// Unrecognized priority tokens default to CP with a logged warning.
    /// Unrecognized keys are ignored; unrecognized values for a known key
    /// keep the default for that field and log a warning.
    pub fn from_raw(raw: &HashMap<String, String>) -> Config {
        let mut cfg = Config::default();

        if let Some(v) = raw.get("USE_OPT_SCHED") {
            cfg.engine_mode = match v.as_str() {
                "YES" => EngineMode::Yes,
                "NO" => EngineMode::No,
                "HOT_ONLY" => EngineMode::HotOnly,
                other => {
                    log::warn!("USE_OPT_SCHED: unrecognized value {other:?}, defaulting to YES");
                    EngineMode::Yes
                }
            };
        }
        if let Some(v) = raw.get("HEURISTIC") {
            cfg.heuristic_priority = parse_priority_list(v);
        }
        if let Some(v) = raw.get("ENUM_HEURISTIC") {
            cfg.enum_priority = parse_priority_list(v);
        }
        if let Some(v) = raw.get("LB_ALG") {
            cfg.lb_alg = match v.as_str() {
                "RJ" => RelaxedAlgorithm::RimJain,
                "LC" => RelaxedAlgorithm::ListBased,
                other => {
                    log::warn!("LB_ALG: unrecognized value {other:?}, defaulting to RJ");
                    RelaxedAlgorithm::RimJain
                }
            };
        }
        if let Some(v) = raw.get("SPILL_COST_FUNCTION") {
            cfg.spill_cost_fn = match v.as_str() {
                "PEAK" => SpillCostFunction::Peak,
                "PEAK_PER_TYPE" => SpillCostFunction::PeakPerType,
                "SUM" => SpillCostFunction::Sum,
                "PEAK_PLUS_AVG" => SpillCostFunction::PeakPlusAvg,
                other => {
                    log::warn!(
                        "SPILL_COST_FUNCTION: unrecognized value {other:?}, defaulting to PEAK_PLUS_AVG"
                    );
                    SpillCostFunction::PeakPlusAvg
                }
            };
        }
        if let Some(v) = raw.get("LATENCY_PRECISION") {
            cfg.latency_precision = match v.as_str() {
                "PRECISE" => LatencyPrecision::Precise,
                "ROUGH" => LatencyPrecision::Rough,
                "UNITY" => LatencyPrecision::Unity,
                other => {
                    log::warn!("LATENCY_PRECISION: unrecognized value {other:?}, defaulting to PRECISE");
                    LatencyPrecision::Precise
                }
            };
        }
        parse_usize(raw, "MAX_DAG_SIZE_FOR_PRECISE_LATENCY", &mut cfg.max_dag_size_for_precise_latency);
        parse_bool(raw, "APPLY_RELAXED_PRUNING", &mut cfg.pruning.relaxed);
        parse_bool(raw, "APPLY_NODE_SUPERIORITY", &mut cfg.pruning.node_superiority);
        parse_bool(raw, "APPLY_HISTORY_DOMINATION", &mut cfg.pruning.history_domination);
        parse_bool(raw, "APPLY_SPILL_COST_PRUNING", &mut cfg.pruning.spill_cost);
        parse_bool(raw, "ENUMERATE_STALLS", &mut cfg.pruning.enumerate_stalls);
        parse_u32(raw, "HIST_TABLE_HASH_BITS", &mut cfg.hist_table_hash_bits);
        parse_u32(raw, "SPILL_COST_FACTOR", &mut cfg.spill_cost_factor);
        parse_u64(raw, "REGION_TIMEOUT", &mut cfg.region_timeout_ms);
        parse_u64(raw, "LENGTH_TIMEOUT", &mut cfg.length_timeout_ms);
        if let Some(v) = raw.get("TIMEOUT_PER") {
            cfg.timeout_scale = match v.as_str() {
                "INSTR" => TimeoutScale::PerInstruction,
                other => {
                    log::warn!("TIMEOUT_PER: unrecognized value {other:?}, defaulting to flat timeouts");
                    TimeoutScale::Flat
                }
            };
        }
        parse_usize(raw, "MIN_DAG_SIZE", &mut cfg.min_dag_size);
        parse_usize(raw, "MAX_DAG_SIZE", &mut cfg.max_dag_size);
        parse_bool(raw, "CHECK_SPILL_COST_SUM", &mut cfg.check_spill_cost_sum);
        parse_bool(raw, "CHECK_CONFLICTS", &mut cfg.check_conflicts);
        parse_bool(raw, "FIX_LIVEIN", &mut cfg.fix_livein);
        parse_bool(raw, "FIX_LIVEOUT", &mut cfg.fix_liveout);
        if let Some(v) = raw.get("MAX_SPILL_COST") {
            match v.parse::<u32>() {
                Ok(n) => cfg.max_spill_cost = Some(n),
                Err(_) => log::warn!("MAX_SPILL_COST: unparseable value {v:?}, leaving uncapped"),
            }
        }
        parse_bool(raw, "VERIFY_SCHEDULE", &mut cfg.verify_schedule);
        parse_bool(raw, "USE_FILE_BOUNDS", &mut cfg.use_file_bounds);

        cfg
    }
}

fn parse_priority_list(raw: &str) -> Vec<PriorityKey> {
    let mut keys = Vec::with_capacity(8);
    for token in raw.split('_') {
        match PriorityKey::from_token(token) {
            Some(k) => keys.push(k),
            None => {
                log::warn!("priority key {token:?} unrecognized, defaulting to CP");
                keys.push(PriorityKey::CriticalPath);
            }
        }
    }
    if keys.is_empty() {
        keys.push(PriorityKey::CriticalPath);
    }
    keys.truncate(8);
    keys
}

fn parse_bool(raw: &HashMap<String, String>, key: &str, out: &mut bool) {
    if let Some(v) = raw.get(key) {
        match v.as_str() {
            "YES" | "TRUE" | "1" => *out = true,
            "NO" | "FALSE" | "0" => *out = false,
            other => log::warn!("{key}: unrecognized boolean value {other:?}, keeping default"),
        }
    }
}

fn parse_usize(raw: &HashMap<String, String>, key: &str, out: &mut usize) {
    if let Some(v) = raw.get(key) {
        match v.parse() {
            Ok(n) => *out = n,
            Err(_) => log::warn!("{key}: unparseable integer {v:?}, keeping default"),
        }
    }
}

fn parse_u32(raw: &HashMap<String, String>, key: &str, out: &mut u32) {
    if let Some(v) = raw.get(key) {
        match v.parse() {
            Ok(n) => *out = n,
            Err(_) => log::warn!("{key}: unparseable integer {v:?}, keeping default"),
        }
    }
}

fn parse_u64(raw: &HashMap<String, String>, key: &str, out: &mut u64) {
    if let Some(v) = raw.get(key) {
        match v.parse() {
            Ok(n) => *out = n,
            Err(_) => log::warn!("{key}: unparseable integer {v:?}, keeping default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.length_weight, 100);
        assert!(cfg.pruning.relaxed);
    }

    #[test]
    fn unknown_priority_token_defaults_to_cp_with_warning() {
        let keys = parse_priority_list("CP_BOGUS_NID");
        assert_eq!(
            keys,
            vec![PriorityKey::CriticalPath, PriorityKey::CriticalPath, PriorityKey::NodeId]
        );
    }

    #[test]
    fn from_raw_parses_known_keys() {
        let mut raw = HashMap::new();
        raw.insert("USE_OPT_SCHED".to_string(), "HOT_ONLY".to_string());
        raw.insert("SPILL_COST_FACTOR".to_string(), "35".to_string());
        raw.insert("APPLY_NODE_SUPERIORITY".to_string(), "NO".to_string());
        let cfg = Config::from_raw(&raw);
        assert_eq!(cfg.engine_mode, EngineMode::HotOnly);
        assert_eq!(cfg.spill_cost_factor, 35);
        assert!(!cfg.pruning.node_superiority);
    }
}
