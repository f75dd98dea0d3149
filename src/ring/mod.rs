//! Consistent Hash Ring Module
//!
//! Maps keys to the node that owns them. Every alive member occupies a fixed
//! number of virtual positions on a 64-bit ring; a key routes to the first
//! position at or after its own hash, wrapping around. Because placement is
//! a pure function of the alive set, every node with the same membership
//! view computes identical routes, and a membership change only moves the
//! O(K/N) keys adjacent to the affected positions.

pub mod hashring;

pub use hashring::HashRing;
