//! Priority keys shared by the heuristic list scheduler
//! and the enumerator's candidate ordering.
//!
//! Implemented as a small enum + a single dispatch loop rather than per-key virtual calls.

use std::cmp::Ordering;

use crate::dag::NodeIndex;

/// One of the (up to eight) ordered keys a priority list can be built
/// from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PriorityKey {
    /// CP: static critical-path length to the exit sentinel.
    CriticalPath,
    /// LUC: number of producers whose last unscheduled consumer is this
    /// instruction. Recomputed dynamically as instructions schedule.
    LastUseCount,
    /// UC: static use count.
    UseCount,
    /// NID: the node's stable integer index, lower wins.
    NodeId,
    /// CPR: critical path length divided by total node count.
    CriticalPathRatio,
    /// ISO: position in the order the host originally supplied.
    InputScheduleOrder,
    /// SC: number of successors.
    SuccessorCount,
    /// LS: live-set size if this instruction were scheduled next.
    LiveSetSize,
}

impl PriorityKey {
    pub fn from_token(token: &str) -> Option<PriorityKey> {
        match token {
            "CP" => Some(PriorityKey::CriticalPath),
            "LUC" => Some(PriorityKey::LastUseCount),
            "UC" => Some(PriorityKey::UseCount),
            "NID" => Some(PriorityKey::NodeId),
            "CPR" => Some(PriorityKey::CriticalPathRatio),
            "ISO" => Some(PriorityKey::InputScheduleOrder),
            "SC" => Some(PriorityKey::SuccessorCount),
            "LS" => Some(PriorityKey::LiveSetSize),
            _ => None,
        }
    }
}

/// Per-node values the scheduler can plug into the priority dispatch
/// loop. Implemented once by the heuristic's ready-list bookkeeping and
/// once by the enumerator's ready-set bookkeeping; both recompute
/// `last_use_count` and `live_set_size` as scheduling progresses, the
/// rest are static lookups into the DAG.
pub trait PriorityContext {
    fn critical_path(&self, node: NodeIndex) -> u32;
    fn last_use_count(&self, node: NodeIndex) -> u32;
    fn use_count(&self, node: NodeIndex) -> u32;
    fn critical_path_ratio(&self, node: NodeIndex) -> f64;
    fn input_order(&self, node: NodeIndex) -> u32;
    fn successor_count(&self, node: NodeIndex) -> u32;
    fn live_set_size_if_scheduled(&self, node: NodeIndex) -> u32;
}

/// Compares two ready candidates under a priority-key list. Less-than
/// means `a` should be scheduled first. Falls back to node index (lower
/// wins) once every configured key ties.
pub fn compare_candidates(
    keys: &[PriorityKey],
    ctx: &dyn PriorityContext,
    a: NodeIndex,
    b: NodeIndex,
) -> Ordering {
    for key in keys {
        let ord = key_ordering(*key, ctx, a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.cmp(&b)
}

/// Ordering contributed by a single key. `Less` means `a` wins (is
/// scheduled first under this key alone).
fn key_ordering(key: PriorityKey, ctx: &dyn PriorityContext, a: NodeIndex, b: NodeIndex) -> Ordering {
    match key {
        PriorityKey::CriticalPath => ctx.critical_path(b).cmp(&ctx.critical_path(a)),
        PriorityKey::LastUseCount => ctx.last_use_count(b).cmp(&ctx.last_use_count(a)),
        PriorityKey::UseCount => ctx.use_count(b).cmp(&ctx.use_count(a)),
        PriorityKey::NodeId => a.cmp(&b),
        PriorityKey::CriticalPathRatio => ctx
            .critical_path_ratio(b)
            .partial_cmp(&ctx.critical_path_ratio(a))
            .unwrap_or(Ordering::Equal),
        PriorityKey::InputScheduleOrder => ctx.input_order(a).cmp(&ctx.input_order(b)),
        PriorityKey::SuccessorCount => ctx.successor_count(b).cmp(&ctx.successor_count(a)),
        PriorityKey::LiveSetSize => ctx
            .live_set_size_if_scheduled(a)
            .cmp(&ctx.live_set_size_if_scheduled(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::NodeIndex;
    use cranelift_entity::EntityRef;

    struct Fixture;
    impl PriorityContext for Fixture {
        fn critical_path(&self, node: NodeIndex) -> u32 {
            match node.index() {
                0 => 5,
                1 => 3,
                _ => 0,
            }
        }
        fn last_use_count(&self, _node: NodeIndex) -> u32 {
            0
        }
        fn use_count(&self, _node: NodeIndex) -> u32 {
            0
        }
        fn critical_path_ratio(&self, _node: NodeIndex) -> f64 {
            0.0
        }
        fn input_order(&self, node: NodeIndex) -> u32 {
            node.index() as u32
        }
        fn successor_count(&self, _node: NodeIndex) -> u32 {
            0
        }
        fn live_set_size_if_scheduled(&self, _node: NodeIndex) -> u32 {
            0
        }
    }

    #[test]
    fn higher_critical_path_wins() {
        let ctx = Fixture;
        let a = NodeIndex::new(0);
        let b = NodeIndex::new(1);
        assert_eq!(
            compare_candidates(&[PriorityKey::CriticalPath], &ctx, a, b),
            Ordering::Less
        );
    }

    #[test]
    fn ties_fall_back_to_node_id() {
        let ctx = Fixture;
        let a = NodeIndex::new(2);
        let b = NodeIndex::new(3);
        assert_eq!(
            compare_candidates(&[PriorityKey::CriticalPath], &ctx, a, b),
            Ordering::Less
        );
    }
}
