//! Gossip Protocol Module
//!
//! The protocol driver: wire message types, the adaptive protocol-period
//! scheduler, the direct/indirect ping senders, and the bootstrap joiner.
//!
//! ## Protocol Period
//! Each period the node pings one member drawn from the shuffled iterator.
//! A ping that fails within its deadline escalates to an indirect probe:
//! up to `ping_req_size` random peers each ping the target on our behalf,
//! and only if none reaches it does the target become `suspect`. Membership
//! changes piggyback on every message in both directions.
//!
//! ## Adaptive Pacing
//! The gap between periods tracks observed round-trip times: twice the
//! median RTT, floored at the minimum protocol period. A fleet started
//! simultaneously staggers itself with a random first delay.

pub mod joiner;
pub mod protocol;
pub mod swim;
pub mod timing;

#[cfg(test)]
mod tests;
