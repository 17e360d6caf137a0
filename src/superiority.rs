//! Node-superiority relation: a structural ordering that
//! lets the enumerator's pruning and the optional graph
//! transform both skip branches that provably cannot beat
//! scheduling `a` before `b`.

use fnv::FnvHashMap;

use crate::dag::{Dag, NodeIndex};
use crate::machine::RegTypeId;
use crate::registers::RegisterBank;

/// Is `a` superior to `b`? Both must be independent —
/// callers are expected to have already checked neither is a recursive
/// predecessor/successor of the other.
pub fn is_superior(dag: &Dag, bank: &RegisterBank, a: NodeIndex, b: NodeIndex) -> bool {
    let na = dag.node(a);
    let nb = dag.node(b);

    // 1. Same issue type.
    if na.issue_type != nb.issue_type {
        return false;
    }

    // 2. rcrsv_pred(A) subset of rcrsv_pred(B).
    if !na.rcrsv_pred.is_subset_of(&nb.rcrsv_pred) {
        return false;
    }

    // 3. rcrsv_succ(B) subset of rcrsv_succ(A).
    if !nb.rcrsv_succ.is_subset_of(&na.rcrsv_succ) {
        return false;
    }

    // 4. Every register B uses but A doesn't must have a consumer C
    // (distinct from both) that is a recursive successor of both.
    for use_ref in &nb.uses {
        if na.uses.contains(use_ref) {
            continue;
        }
        let consumed_by_common_successor = bank.get(*use_ref).users.iter().any(|&c| {
            c != a && c != b && dag.is_recursive_successor(c, a) && dag.is_recursive_successor(c, b)
        });
        if !consumed_by_common_successor {
            return false;
        }
    }

    // 5. For each register type, |defs(A)| <= |defs(B)|.
    let mut def_counts_a: FnvHashMap<RegTypeId, u32> = FnvHashMap::default();
    let mut def_counts_b: FnvHashMap<RegTypeId, u32> = FnvHashMap::default();
    for d in &na.defs {
        *def_counts_a.entry(d.reg_type).or_insert(0) += 1;
    }
    for d in &nb.defs {
        *def_counts_b.entry(d.reg_type).or_insert(0) += 1;
    }
    for (reg_type, count_a) in &def_counts_a {
        if *count_a > def_counts_b.get(reg_type).copied().unwrap_or(0) {
            return false;
        }
    }

    true
}
