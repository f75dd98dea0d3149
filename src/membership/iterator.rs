//! Shuffled round-robin selection of ping targets.
//!
//! Walking a shuffled snapshot gives every peer uniform coverage within one
//! sweep, unlike independent random picks which can starve a peer for many
//! periods. The snapshot is reshuffled when exhausted or when the table
//! changed underneath it.

use super::table::MemberTable;
use super::types::{Member, MemberStatus};

pub struct MemberIterator {
    shuffled: Vec<Member>,
    index: usize,
    snapshot_checksum: u32,
}

impl MemberIterator {
    pub fn new() -> Self {
        Self {
            shuffled: Vec::new(),
            index: 0,
            snapshot_checksum: 0,
        }
    }

    /// The next non-local member whose current status is `alive` or
    /// `suspect`, or `None` when the table holds no such member.
    ///
    /// Entries are re-checked against the live table so a member that went
    /// `faulty` after the snapshot was taken is skipped rather than pinged.
    pub fn next(&mut self, table: &MemberTable) -> Option<Member> {
        let checksum = table.checksum();
        if self.index >= self.shuffled.len() || checksum != self.snapshot_checksum {
            self.shuffled = table.shuffled_members();
            self.index = 0;
            self.snapshot_checksum = checksum;
        }

        while self.index < self.shuffled.len() {
            let address = self.shuffled[self.index].address.clone();
            self.index += 1;
            if address == table.local_address() {
                continue;
            }
            if let Some(current) = table.get(&address) {
                if matches!(current.status, MemberStatus::Alive | MemberStatus::Suspect) {
                    return Some(current.clone());
                }
            }
        }
        None
    }
}

impl Default for MemberIterator {
    fn default() -> Self {
        Self::new()
    }
}
