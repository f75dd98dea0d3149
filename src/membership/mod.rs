//! Membership & Failure Detection Module
//!
//! Implements the SWIM-style membership engine: the authoritative member
//! table, the infection-style dissemination buffer, the shuffled ping-target
//! iterator, and the suspicion timers.
//!
//! ## Core Mechanisms
//! - **Incarnation Numbers**: Every member carries a per-member version
//!   counter. Conflicting reports about a member are resolved by the
//!   supersession rule: higher incarnation wins, and at equal incarnation
//!   the report that downgrades liveness wins. Only the member itself bumps
//!   its own incarnation, which is how a falsely accused node refutes a
//!   `suspect` or `faulty` claim.
//! - **Piggyback Dissemination**: State changes are not broadcast. They ride
//!   on the protocol messages the node was sending anyway, each change a
//!   bounded number of times, so information spreads epidemically with
//!   O(log N) convergence.
//! - **Suspicion**: An unresponsive member first becomes `suspect` and only
//!   transitions to `faulty` when a deadline passes without a refutation,
//!   which absorbs transient network trouble without false evictions.

pub mod dissemination;
pub mod iterator;
pub mod suspicion;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;
