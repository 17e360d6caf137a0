//! Dominance history table: a fixed-size bucket array
//! keyed by the low bits of a tree node's signature.

/// One bucket entry: the signature that last claimed this slot, and the
/// best (lowest) dynamic cost lower bound seen for it.
#[derive(Clone, Copy, Debug)]
struct Entry {
    signature: u64,
    best_cost: u64,
}

/// Fixed-bucket hash table for history-based dominance pruning. `hash_bits` is configurable, typically 16-20; collisions across
/// distinct signatures are an accepted false-prune risk.
pub struct HistoryTable {
    buckets: Vec<Option<Entry>>,
    mask: u64,
}

impl HistoryTable {
    pub fn new(hash_bits: u32) -> Self {
        let size = 1usize << hash_bits.clamp(1, 24);
        HistoryTable {
            buckets: vec![None; size],
            mask: size as u64 - 1,
        }
    }

    fn index(&self, signature: u64) -> usize {
        (signature & self.mask) as usize
    }

    /// Looks up `signature`'s bucket. Returns `true` if an entry with the
    /// same signature shows a cost at or below `dynamic_cost_lb`, meaning
    /// this tree node is dominated and should be pruned.
    pub fn is_dominated(&self, signature: u64, dynamic_cost_lb: u64) -> bool {
        match &self.buckets[self.index(signature)] {
            Some(entry) if entry.signature == signature => entry.best_cost <= dynamic_cost_lb,
            _ => false,
        }
    }

    /// Records this tree node's visit, lowering the bucket's best cost if
    /// `dynamic_cost_lb` improves on it (or the bucket held a different
    /// signature, which is simply overwritten).
    pub fn record(&mut self, signature: u64, dynamic_cost_lb: u64) {
        let idx = self.index(signature);
        match &mut self.buckets[idx] {
            Some(entry) if entry.signature == signature => {
                entry.best_cost = entry.best_cost.min(dynamic_cost_lb);
            }
            slot => {
                *slot = Some(Entry { signature, best_cost: dynamic_cost_lb });
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.buckets {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominated_node_is_pruned() {
        let mut table = HistoryTable::new(4);
        table.record(7, 10);
        assert!(table.is_dominated(7, 12));
        assert!(!table.is_dominated(7, 9));
    }

    #[test]
    fn colliding_signature_overwrites_bucket() {
        let mut table = HistoryTable::new(1);
        table.record(0, 5);
        table.record(2, 3); // same bucket as 0 (mask = 1)
        assert!(!table.is_dominated(0, 100));
    }
}
