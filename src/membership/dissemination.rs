//! Piggyback dissemination buffer.
//!
//! Holds the latest change per address and hands a bounded slice of them to
//! every outgoing protocol message. Each change rides along
//! `max_piggyback = ceil(3 * log10(cluster_size + 1))` times and is then
//! evicted; selection prefers the least-travelled changes so everything
//! enqueued gets on the wire before it ages out.

use super::types::{supersedes, Change};
use std::collections::HashMap;

struct BufferedChange {
    change: Change,
    /// Insertion sequence, used to break piggyback-count ties.
    seq: u64,
}

#[derive(Default)]
pub struct DisseminationBuffer {
    changes: HashMap<String, BufferedChange>,
    next_seq: u64,
}

impl DisseminationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// How many times a change is disseminated before eviction.
    pub fn max_piggyback(cluster_size: usize) -> u32 {
        (3.0 * ((cluster_size + 1) as f64).log10()).ceil() as u32
    }

    /// Insert a change, replacing any buffered change for the same address
    /// that it supersedes. A replacement starts its piggyback count over.
    pub fn add_change(&mut self, change: Change) {
        match self.changes.get_mut(&change.address) {
            Some(existing) => {
                if supersedes(
                    change.incarnation_number,
                    change.status,
                    existing.change.incarnation_number,
                    existing.change.status,
                ) {
                    existing.change = change;
                    existing.change.piggyback_count = 0;
                    existing.seq = self.next_seq;
                    self.next_seq += 1;
                }
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.changes
                    .insert(change.address.clone(), BufferedChange { change, seq });
            }
        }
    }

    /// Select up to `max_piggyback` changes for one outgoing message,
    /// least-travelled first (ties by insertion order), bump their counts,
    /// and evict any change that has now made its final trip.
    ///
    /// Atomic with respect to `add_change` under the caller's lock: a change
    /// enqueued after this call is not returned, and returned changes have
    /// their counts incremented before the caller sees them.
    pub fn issue_changes(&mut self, cluster_size: usize) -> Vec<Change> {
        let limit = Self::max_piggyback(cluster_size);

        let mut order: Vec<(u32, u64, String)> = self
            .changes
            .values()
            .map(|b| (b.change.piggyback_count, b.seq, b.change.address.clone()))
            .collect();
        order.sort_unstable();

        let mut issued = Vec::new();
        for (_, _, address) in order.into_iter().take(limit as usize) {
            let Some(buffered) = self.changes.get_mut(&address) else {
                continue;
            };
            buffered.change.piggyback_count += 1;
            issued.push(buffered.change.clone());
            if buffered.change.piggyback_count >= limit {
                self.changes.remove(&address);
            }
        }
        issued
    }
}
