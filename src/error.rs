//! Error Taxonomy
//!
//! Three families, matching how failures surface:
//!
//! - [`ProtocolError`]: structured rejections returned to a remote peer
//!   (never a crash). These carry stable wire identifiers so heterogeneous
//!   deployments agree on what was rejected.
//! - [`BootstrapError`]: configuration and join failures, fatal to the
//!   `bootstrap` call that observed them.
//! - [`AdminError`]: idempotency guards on the admin operations.
//!
//! Transport errors and timeouts never reach callers; the gossip layer
//! converts them into `suspect` transitions.

use thiserror::Error;

/// Rejections produced while handling a remote protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A node attempted to join itself.
    #[error("join rejected: joiner address {address} is the local node")]
    InvalidJoinSource { address: String },
    /// A node from a different cluster application attempted to join.
    #[error("join rejected: app mismatch, expected {expected:?} got {actual:?}")]
    InvalidJoinApp { expected: String, actual: String },
}

impl ProtocolError {
    /// Stable identifier carried in the wire-level error reply.
    pub fn wire_type(&self) -> &'static str {
        match self {
            ProtocolError::InvalidJoinSource { .. } => "ringpop.invalid-join.source",
            ProtocolError::InvalidJoinApp { .. } => "ringpop.invalid-join.app",
        }
    }
}

/// Failures surfaced from `bootstrap`.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("node is already ready; bootstrap may only run once")]
    AlreadyReady,
    #[error("no bootstrap hosts: supply a host list or a hosts file")]
    NoBootstrapHosts,
    #[error("failed to load bootstrap hosts file {path}: {message}")]
    HostsFile { path: String, message: String },
    #[error("join did not complete within {elapsed_ms} ms; last error: {last_error}")]
    JoinDuration { elapsed_ms: u64, last_error: String },
    #[error("node was destroyed during bootstrap")]
    Destroyed,
}

/// Idempotency guards on admin operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// `admin_leave` called while the local member is already in `leave`.
    #[error("local member has already left")]
    RedundantLeave,
    /// `admin_leave` or `rejoin` called before the local member was added.
    #[error("local member was never added; bootstrap first")]
    InvalidLeave,
    #[error("node is destroyed")]
    Destroyed,
}
