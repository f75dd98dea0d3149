//! HTTP transport.
//!
//! Sends each protocol message as a JSON POST to the target's protocol
//! endpoint. The server side is [`crate::node::handlers::protocol_router`],
//! which mounts the matching routes over the same DTOs.

use super::Transport;
use crate::gossip::protocol::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn post_json<Req, Resp>(
        &self,
        target: &str,
        endpoint: &str,
        request: &Req,
    ) -> anyhow::Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("http://{target}{endpoint}");
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            // Structured rejections carry an ErrorBody; surface its wire
            // type so callers can tell a join rejection from a dead peer.
            if let Ok(body) = response.json::<ErrorBody>().await {
                anyhow::bail!("{}: {}", body.kind, body.message);
            }
            anyhow::bail!("request to {target}{endpoint} failed with {status}");
        }
        Ok(response.json().await?)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn join(&self, target: &str, request: JoinRequest) -> anyhow::Result<JoinResponse> {
        self.post_json(target, ENDPOINT_JOIN, &request).await
    }

    async fn ping(&self, target: &str, request: PingRequest) -> anyhow::Result<PingResponse> {
        self.post_json(target, ENDPOINT_PING, &request).await
    }

    async fn ping_req(
        &self,
        target: &str,
        request: PingReqRequest,
    ) -> anyhow::Result<PingReqResponse> {
        self.post_json(target, ENDPOINT_PING_REQ, &request).await
    }

    async fn leave(&self, target: &str) -> anyhow::Result<LeaveResponse> {
        self.post_json(target, ENDPOINT_LEAVE, &serde_json::json!({})).await
    }
}
