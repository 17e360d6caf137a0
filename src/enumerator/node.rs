//! One frame of the enumerator's depth-first search.

use crate::dag::NodeIndex;

/// A partial schedule at one tree depth. `signature` is a rolling hash of
/// the multiset of scheduled instructions and their (cycle, slot)
/// positions, used by the history table to recognize
/// partial schedules already explored under a different ordering.
#[derive(Clone, Copy, Debug)]
pub struct TreeNode {
    pub depth: u32,
    /// `None` means this frame emitted a stall rather than an
    /// instruction.
    pub last_scheduled: Option<NodeIndex>,
    pub slot_counter: u32,
    pub signature: u64,
    pub cached_peak_spill_cost: u32,
    pub cached_spill_cost_sum: u32,
    pub cost_lower_bound: u64,
}

impl TreeNode {
    pub fn root() -> Self {
        TreeNode {
            depth: 0,
            last_scheduled: None,
            slot_counter: 0,
            signature: ROOT_SIGNATURE,
            cached_peak_spill_cost: 0,
            cached_spill_cost_sum: 0,
            cost_lower_bound: 0,
        }
    }
}

const ROOT_SIGNATURE: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Extends a parent signature with one more (instruction, position)
/// entry. Stalls are folded in with a sentinel node value so that two
/// partial schedules differing only in stall placement still hash
/// differently.
pub fn extend_signature(parent: u64, node: Option<NodeIndex>, position: u32) -> u64 {
    let node_component = node.map(|n| n.index() as u64 + 1).unwrap_or(0);
    let mixed = splitmix64(node_component << 32 | position as u64);
    (parent ^ mixed).wrapping_mul(FNV_PRIME)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn order_of_extension_changes_the_signature() {
        let a = extend_signature(ROOT_SIGNATURE, Some(NodeIndex::new(1)), 0);
        let a = extend_signature(a, Some(NodeIndex::new(2)), 1);

        let b = extend_signature(ROOT_SIGNATURE, Some(NodeIndex::new(2)), 0);
        let b = extend_signature(b, Some(NodeIndex::new(1)), 1);

        assert_ne!(a, b);
    }

    #[test]
    fn stall_differs_from_any_instruction() {
        let with_stall = extend_signature(ROOT_SIGNATURE, None, 0);
        let with_instr = extend_signature(ROOT_SIGNATURE, Some(NodeIndex::new(0)), 0);
        assert_ne!(with_stall, with_instr);
    }
}
