//! HTTP Protocol Handlers
//!
//! Axum route handlers that expose the four protocol endpoints over HTTP,
//! matching the client side in [`crate::transport::http`]. Mount the router
//! returned by [`protocol_router`] on the listener whose address is the
//! node's `host_port`.
//!
//! Structured rejections (invalid join source/app) come back as `400` with
//! an [`ErrorBody`]; everything else is a plain `200` with the reply DTO.

use crate::gossip::protocol::*;
use crate::node::RingNode;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

/// Router carrying the four protocol endpoints for one node.
pub fn protocol_router(node: Arc<RingNode>) -> Router {
    Router::new()
        .route(ENDPOINT_JOIN, post(handle_protocol_join))
        .route(ENDPOINT_PING, post(handle_protocol_ping))
        .route(ENDPOINT_PING_REQ, post(handle_protocol_ping_req))
        .route(ENDPOINT_LEAVE, post(handle_protocol_leave))
        .layer(Extension(node))
}

pub async fn handle_protocol_join(
    Extension(node): Extension<Arc<RingNode>>,
    Json(request): Json<JoinRequest>,
) -> Response {
    match node.handle_join(request) {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            tracing::warn!("rejected join: {}", e);
            (StatusCode::BAD_REQUEST, Json(ErrorBody::from(&e))).into_response()
        }
    }
}

pub async fn handle_protocol_ping(
    Extension(node): Extension<Arc<RingNode>>,
    Json(request): Json<PingRequest>,
) -> (StatusCode, Json<PingResponse>) {
    (StatusCode::OK, Json(node.handle_ping(request)))
}

pub async fn handle_protocol_ping_req(
    Extension(node): Extension<Arc<RingNode>>,
    Json(request): Json<PingReqRequest>,
) -> (StatusCode, Json<PingReqResponse>) {
    (StatusCode::OK, Json(node.handle_ping_req(request).await))
}

pub async fn handle_protocol_leave(
    Extension(node): Extension<Arc<RingNode>>,
) -> (StatusCode, Json<LeaveResponse>) {
    (StatusCode::OK, Json(node.handle_leave()))
}
