//! In-process transport for tests and simulations.
//!
//! A [`MemoryNetwork`] registers nodes by address and delivers protocol
//! messages by calling the target node's handlers directly. Individual
//! addresses can be partitioned off to simulate crashed or unreachable
//! peers; a partitioned node neither receives nor sends.

use super::Transport;
use crate::gossip::protocol::*;
use crate::node::RingNode;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct MemoryNetwork {
    nodes: DashMap<String, Arc<RingNode>>,
    partitioned: DashMap<String, ()>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a node so peers can reach it.
    pub fn register(&self, node: Arc<RingNode>) {
        self.nodes.insert(node.local_address().to_string(), node);
    }

    /// A transport handle for the node at `source`.
    pub fn transport(self: &Arc<Self>, source: &str) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            network: self.clone(),
            source: source.to_string(),
        })
    }

    /// Cut an address off from the network in both directions.
    pub fn partition(&self, address: &str) {
        self.partitioned.insert(address.to_string(), ());
    }

    pub fn heal(&self, address: &str) {
        self.partitioned.remove(address);
    }

    fn route(&self, source: &str, target: &str) -> anyhow::Result<Arc<RingNode>> {
        if self.partitioned.contains_key(source) || self.partitioned.contains_key(target) {
            anyhow::bail!("connection refused: {target} unreachable from {source}");
        }
        let node = self
            .nodes
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("connection refused: no node at {target}"))?;
        if node.is_destroyed() {
            anyhow::bail!("connection refused: node at {target} is gone");
        }
        Ok(node)
    }
}

pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    source: String,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn join(&self, target: &str, request: JoinRequest) -> anyhow::Result<JoinResponse> {
        let node = self.network.route(&self.source, target)?;
        node.handle_join(request).map_err(|e| {
            let body = ErrorBody::from(&e);
            anyhow::anyhow!("{}: {}", body.kind, body.message)
        })
    }

    async fn ping(&self, target: &str, request: PingRequest) -> anyhow::Result<PingResponse> {
        let node = self.network.route(&self.source, target)?;
        Ok(node.handle_ping(request))
    }

    async fn ping_req(
        &self,
        target: &str,
        request: PingReqRequest,
    ) -> anyhow::Result<PingReqResponse> {
        let node = self.network.route(&self.source, target)?;
        Ok(node.handle_ping_req(request).await)
    }

    async fn leave(&self, target: &str) -> anyhow::Result<LeaveResponse> {
        let node = self.network.route(&self.source, target)?;
        Ok(node.handle_leave())
    }
}
