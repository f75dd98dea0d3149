//! Decentralized Cluster Membership & Request Routing
//!
//! This library crate lets a node join a set of cooperating peers, discover
//! every other live peer through a SWIM-style gossip protocol, and route
//! application requests for a key to the node that currently owns it.
//!
//! ## Architecture Modules
//! The crate is composed of five loosely coupled subsystems:
//!
//! - **`membership`**: The cluster coordination layer. The authoritative
//!   member table with its incarnation-based merge rules, the piggyback
//!   dissemination buffer, the shuffled ping-target iterator, and the
//!   suspicion timers that turn unresponsive peers into `faulty` ones.
//! - **`ring`**: The routing layer. A consistent hash ring with virtual
//!   positions, kept in sync with the set of `alive` members so that
//!   `lookup(key)` is identical on every node.
//! - **`gossip`**: The protocol driver. The adaptive protocol-period loop,
//!   the direct and indirect ping senders, and the bounded parallel joiner
//!   used at bootstrap.
//! - **`node`**: The facade. [`node::RingNode`] wires the pieces together
//!   and exposes `bootstrap`, `lookup`, `admin_leave`, `rejoin` and the
//!   four protocol handlers.
//! - **`transport`**: The wire seam. Protocol messages travel through the
//!   [`transport::Transport`] trait; an HTTP implementation and an
//!   in-process implementation for tests ship with the crate.

pub mod config;
pub mod error;
pub mod gossip;
pub mod membership;
pub mod node;
pub mod ring;
pub mod transport;

pub use config::RingConfig;
pub use node::{ClusterEvent, RingNode};
