//! The authoritative member table.
//!
//! Maps address -> [`Member`] for every peer this node has ever heard of,
//! including itself. All mutations funnel through methods that apply the
//! supersession rule and return the batch of [`MembershipEvent`]s they
//! caused; callers fan those out. The table itself is a plain synchronous
//! structure; the facade serializes access with a lock so that concurrent
//! inbound messages merge race-free.

use super::types::{supersedes, now_millis, Change, Member, MemberStatus, MembershipEvent};
use rand::seq::SliceRandom;
use std::collections::HashMap;

pub struct MemberTable {
    local_address: String,
    members: HashMap<String, Member>,
}

impl MemberTable {
    pub fn new(local_address: impl Into<String>) -> Self {
        Self {
            local_address: local_address.into(),
            members: HashMap::new(),
        }
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    pub fn local_member(&self) -> Option<&Member> {
        self.members.get(&self.local_address)
    }

    pub fn get(&self, address: &str) -> Option<&Member> {
        self.members.get(address)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Snapshot of every member, in no particular order.
    pub fn members(&self) -> Vec<Member> {
        self.members.values().cloned().collect()
    }

    /// The full state expressed as changes, for the full-sync fallback when
    /// checksums disagree and the dissemination buffer has nothing to say.
    pub fn as_changes(&self) -> Vec<Change> {
        self.members.values().map(Change::from).collect()
    }

    /// Insert the local member as `alive` with a wall-clock incarnation.
    pub fn add_local_member(&mut self) -> Vec<MembershipEvent> {
        if self.members.contains_key(&self.local_address) {
            return Vec::new();
        }
        let member = Member {
            address: self.local_address.clone(),
            status: MemberStatus::Alive,
            incarnation_number: now_millis(),
        };
        self.members.insert(member.address.clone(), member.clone());
        vec![MembershipEvent::New(member)]
    }

    /// Insert a member as `alive`, or treat as an alive update if the
    /// address is already known.
    pub fn add_member(&mut self, address: &str, incarnation_number: i64) -> Vec<MembershipEvent> {
        if self.members.contains_key(address) {
            return self.update(&[Change::new(address, MemberStatus::Alive, incarnation_number)]);
        }
        let member = Member {
            address: address.to_string(),
            status: MemberStatus::Alive,
            incarnation_number,
        };
        self.members.insert(member.address.clone(), member.clone());
        vec![MembershipEvent::New(member)]
    }

    /// Merge a batch of changes, returning the events that actually applied.
    ///
    /// A change about the local member that would mark it `suspect` or
    /// `faulty` is never adopted: the local incarnation jumps past the claim
    /// and an `alive` refutation is emitted instead.
    pub fn update(&mut self, changes: &[Change]) -> Vec<MembershipEvent> {
        let mut events = Vec::new();
        for change in changes {
            if let Some(event) = self.apply(change) {
                events.push(event);
            }
        }
        events
    }

    fn apply(&mut self, change: &Change) -> Option<MembershipEvent> {
        let Some(current) = self.members.get_mut(&change.address) else {
            // First sighting of this address: adopt the reported state.
            let member = Member {
                address: change.address.clone(),
                status: change.status,
                incarnation_number: change.incarnation_number,
            };
            self.members.insert(member.address.clone(), member.clone());
            let event = match change.status {
                MemberStatus::Alive => MembershipEvent::New(member),
                MemberStatus::Suspect => MembershipEvent::Suspect(member),
                MemberStatus::Faulty => MembershipEvent::Faulty(member),
                MemberStatus::Leave => MembershipEvent::Leave(member),
            };
            return Some(event);
        };

        if !supersedes(
            change.incarnation_number,
            change.status,
            current.incarnation_number,
            current.status,
        ) {
            return None;
        }

        let is_local = change.address == self.local_address;
        if is_local
            && matches!(change.status, MemberStatus::Suspect | MemberStatus::Faulty)
        {
            // Refutation: we are demonstrably alive. Jump past the claim so
            // the alive report supersedes it everywhere it has spread.
            current.incarnation_number = change.incarnation_number + 1;
            current.status = MemberStatus::Alive;
            return Some(MembershipEvent::Alive(current.clone()));
        }

        current.status = change.status;
        current.incarnation_number = change.incarnation_number;
        let member = current.clone();
        let event = match change.status {
            MemberStatus::Alive => MembershipEvent::Alive(member),
            MemberStatus::Suspect => MembershipEvent::Suspect(member),
            MemberStatus::Faulty => MembershipEvent::Faulty(member),
            MemberStatus::Leave => MembershipEvent::Leave(member),
        };
        Some(event)
    }

    /// Force the local member to `alive`, bumping its incarnation.
    pub fn make_alive(&mut self) -> Vec<MembershipEvent> {
        self.set_local_status(MemberStatus::Alive)
            .map(MembershipEvent::Alive)
            .into_iter()
            .collect()
    }

    /// Force the local member to `leave`, bumping its incarnation.
    pub fn make_leave(&mut self) -> Vec<MembershipEvent> {
        self.set_local_status(MemberStatus::Leave)
            .map(MembershipEvent::Leave)
            .into_iter()
            .collect()
    }

    fn set_local_status(&mut self, status: MemberStatus) -> Option<Member> {
        let local = self.members.get_mut(&self.local_address)?;
        // Refutations may have pushed the incarnation past the wall clock;
        // the counter must stay monotone either way.
        local.incarnation_number = now_millis().max(local.incarnation_number + 1);
        local.status = status;
        Some(local.clone())
    }

    /// Uniform random sample, without replacement, of up to `n` alive
    /// members excluding the local member and `exclude`.
    pub fn get_random_pingable_members(&self, n: usize, exclude: &[&str]) -> Vec<Member> {
        let candidates: Vec<&Member> = self
            .members
            .values()
            .filter(|m| {
                m.status == MemberStatus::Alive
                    && m.address != self.local_address
                    && !exclude.contains(&m.address.as_str())
            })
            .collect();
        candidates
            .choose_multiple(&mut rand::thread_rng(), n)
            .map(|m| (*m).clone())
            .collect()
    }

    /// Fisher-Yates-shuffled snapshot of the whole table, consumed by the
    /// member iterator.
    pub fn shuffled_members(&self) -> Vec<Member> {
        let mut snapshot: Vec<Member> = self.members.values().cloned().collect();
        snapshot.shuffle(&mut rand::thread_rng());
        snapshot
    }

    /// Deterministic 32-bit digest of the member state.
    ///
    /// Built over the canonical encoding `address,incarnation,status` sorted
    /// by address and joined by `;`, so two tables with the same state agree
    /// regardless of insertion order. Carried on protocol messages as a
    /// cheap disagreement detector.
    pub fn checksum(&self) -> u32 {
        let mut entries: Vec<String> = self
            .members
            .values()
            .map(|m| {
                format!(
                    "{},{},{}",
                    m.address,
                    m.incarnation_number,
                    m.status.as_str()
                )
            })
            .collect();
        entries.sort_unstable();
        let digest = blake3::hash(entries.join(";").as_bytes());
        u32::from_le_bytes(digest.as_bytes()[..4].try_into().unwrap())
    }
}
