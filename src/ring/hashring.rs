//! Ring structure and key lookup.

use std::collections::{BTreeMap, HashSet};

/// Stable 64-bit position hash: first eight bytes of BLAKE3.
///
/// The function is a deployment-wide constant; every node must hash keys and
/// server positions identically or routing diverges.
pub fn hash64(input: &str) -> u64 {
    let digest = blake3::hash(input.as_bytes());
    u64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap())
}

pub struct HashRing {
    positions: BTreeMap<u64, String>,
    servers: HashSet<String>,
    replica_points: usize,
}

impl HashRing {
    pub fn new(replica_points: usize) -> Self {
        Self {
            positions: BTreeMap::new(),
            servers: HashSet::new(),
            replica_points,
        }
    }

    /// Insert a server at its virtual positions. Re-adding a present server
    /// is a no-op. Returns whether the ring changed.
    pub fn add_server(&mut self, address: &str) -> bool {
        if self.servers.contains(address) {
            return false;
        }
        for i in 0..self.replica_points {
            let position = hash64(&format!("{address}#{i}"));
            match self.positions.get(&position) {
                // Position collision between servers: the lexicographically
                // smaller address keeps it.
                Some(existing) if existing.as_str() <= address => {}
                _ => {
                    self.positions.insert(position, address.to_string());
                }
            }
        }
        self.servers.insert(address.to_string());
        true
    }

    /// Remove a server and all of its positions. Removing an absent server
    /// is a no-op. Returns whether the ring changed.
    pub fn remove_server(&mut self, address: &str) -> bool {
        if !self.servers.remove(address) {
            return false;
        }
        self.positions.retain(|_, owner| owner != address);
        true
    }

    pub fn has_server(&self, address: &str) -> bool {
        self.servers.contains(address)
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Sorted list of the servers currently on the ring.
    pub fn servers(&self) -> Vec<String> {
        let mut servers: Vec<String> = self.servers.iter().cloned().collect();
        servers.sort_unstable();
        servers
    }

    /// The server owning `key`: first position at or after the key's hash,
    /// wrapping to the lowest position. `None` on an empty ring.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if self.positions.is_empty() {
            return None;
        }
        let hash = hash64(key);
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, address)| address.clone())
    }
}
