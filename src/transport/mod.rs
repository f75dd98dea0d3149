//! Transport Seam
//!
//! Protocol messages leave the node through the [`Transport`] trait. The
//! library does not own the wire: callers hand a transport to the node
//! constructor and are responsible for shutting it down when the node is
//! destroyed. Two implementations ship with the crate: [`http::HttpTransport`]
//! for real deployments and [`memory::MemoryNetwork`] for tests and
//! simulations.
//!
//! Transport failures are opaque `anyhow` errors on purpose: the gossip
//! layer treats any failure, timeout or transport-level, as "the peer did
//! not answer" and reacts with protocol transitions, not error propagation.

use crate::gossip::protocol::{
    JoinRequest, JoinResponse, LeaveResponse, PingReqRequest, PingReqResponse, PingRequest,
    PingResponse,
};
use async_trait::async_trait;

pub mod http;
pub mod memory;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn join(&self, target: &str, request: JoinRequest) -> anyhow::Result<JoinResponse>;
    async fn ping(&self, target: &str, request: PingRequest) -> anyhow::Result<PingResponse>;
    async fn ping_req(
        &self,
        target: &str,
        request: PingReqRequest,
    ) -> anyhow::Result<PingReqResponse>;
    async fn leave(&self, target: &str) -> anyhow::Result<LeaveResponse>;
}
