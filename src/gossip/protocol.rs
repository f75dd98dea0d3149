//! Gossip Wire Protocol
//!
//! Defines the endpoints and Data Transfer Objects for the four protocol
//! messages (`join`, `ping`, `ping-req`, `leave`). The DTOs are
//! transport-agnostic serde structures; the bundled HTTP transport carries
//! them as camelCase JSON, and transports that prefer bytes can run them
//! through `bincode` unchanged.

use crate::error::ProtocolError;
use crate::membership::types::{Change, Member};
use serde::{Deserialize, Serialize};

// --- Endpoints ---

/// Endpoint for bootstrap join requests.
pub const ENDPOINT_JOIN: &str = "/protocol/join";
/// Endpoint for direct pings.
pub const ENDPOINT_PING: &str = "/protocol/ping";
/// Endpoint for indirect pings performed on another node's behalf.
pub const ENDPOINT_PING_REQ: &str = "/protocol/ping-req";
/// Endpoint for the (empty) leave acknowledgment.
pub const ENDPOINT_LEAVE: &str = "/protocol/leave";

// --- Data Transfer Objects ---

/// Request sent by a bootstrapping node to a seed host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Cluster application name; must match the receiver's.
    pub app: String,
    /// Address of the joining node.
    pub source: String,
    pub incarnation_number: i64,
}

/// Reply to a successful join: the coordinator's full membership snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub app: String,
    /// Address of the node that answered the join.
    pub coordinator: String,
    pub membership: Vec<Member>,
}

/// A direct ping, carrying piggybacked changes and the sender's membership
/// checksum so the receiver can detect divergence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRequest {
    pub source: String,
    pub checksum: u32,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub changes: Vec<Change>,
}

/// Ask a peer to ping `target` on our behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingReqRequest {
    pub source: String,
    pub target: String,
    pub checksum: u32,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingReqResponse {
    pub changes: Vec<Change>,
    /// Whether the peer's own ping to the target succeeded.
    pub ping_status: bool,
    pub target: String,
}

/// Leave is acknowledged with an empty body; the departure itself travels
/// as a piggybacked change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {}

/// Wire form of a structured rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl From<&ProtocolError> for ErrorBody {
    fn from(error: &ProtocolError) -> Self {
        ErrorBody {
            kind: error.wire_type().to_string(),
            message: error.to_string(),
        }
    }
}
