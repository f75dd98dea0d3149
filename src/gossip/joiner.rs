//! Bootstrap joiner.
//!
//! Fans join requests out to random bootstrap hosts, keeping up to
//! `join_size` in flight, and succeeds on the first well-formed reply. A
//! failed target leaves the pool and another takes its slot; when an entire
//! attempt drains the pool the joiner backs off and redraws, until the
//! `max_join_duration` wall clock runs out.

use crate::error::BootstrapError;
use crate::gossip::protocol::{JoinRequest, JoinResponse};
use crate::membership::types::{now_millis, Change};
use crate::node::RingNode;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum AttemptFailure {
    Destroyed,
    /// The pool drained without a success; carries the last error seen.
    Exhausted(String),
}

/// Join the cluster through `targets` (bootstrap hosts, local address
/// already excluded). Returns the coordinator that let us in, or `None`
/// when there was nobody to join (single-node cluster).
pub(crate) async fn join_cluster(
    node: Arc<RingNode>,
    targets: Vec<String>,
) -> Result<Option<String>, BootstrapError> {
    if targets.is_empty() {
        info!("no bootstrap peers besides the local node; starting alone");
        return Ok(None);
    }

    let started = Instant::now();
    let deadline = started + node.config.max_join_duration;
    let mut retry_delay = node.config.join_retry_delay;
    let mut last_error = String::from("no join target answered");

    loop {
        match join_attempt(&node, &targets, deadline).await {
            Ok(reply) => {
                let coordinator = reply.coordinator.clone();
                let changes: Vec<Change> = reply.membership.iter().map(Change::from).collect();
                node.update(changes);
                info!("joined cluster via {}", coordinator);
                return Ok(Some(coordinator));
            }
            Err(AttemptFailure::Destroyed) => return Err(BootstrapError::Destroyed),
            Err(AttemptFailure::Exhausted(error)) => {
                if !error.is_empty() {
                    last_error = error;
                }
            }
        }

        if node.is_destroyed() {
            return Err(BootstrapError::Destroyed);
        }
        if Instant::now() >= deadline {
            return Err(BootstrapError::JoinDuration {
                elapsed_ms: started.elapsed().as_millis() as u64,
                last_error,
            });
        }
        debug!("join attempt exhausted; retrying in {:?}", retry_delay);
        tokio::time::sleep(retry_delay).await;
        retry_delay = (retry_delay * 2).min(Duration::from_secs(5));
    }
}

/// One pass over a shuffled copy of the pool with `join_size` requests kept
/// in flight.
async fn join_attempt(
    node: &Arc<RingNode>,
    targets: &[String],
    deadline: Instant,
) -> Result<JoinResponse, AttemptFailure> {
    let mut pool: Vec<String> = targets.to_vec();
    pool.shuffle(&mut rand::thread_rng());

    let mut in_flight: JoinSet<(String, anyhow::Result<JoinResponse>)> = JoinSet::new();
    let mut last_error = String::new();

    loop {
        while in_flight.len() < node.config.join_size {
            let Some(target) = pool.pop() else { break };
            spawn_join(node, &mut in_flight, target);
        }

        let Some(joined) = in_flight.join_next().await else {
            return Err(AttemptFailure::Exhausted(last_error));
        };
        if node.is_destroyed() {
            return Err(AttemptFailure::Destroyed);
        }
        match joined {
            Ok((_, Ok(reply))) => return Ok(reply),
            Ok((target, Err(e))) => {
                warn!("join request to {} failed: {}", target, e);
                last_error = e.to_string();
            }
            Err(_) => {}
        }
        if Instant::now() >= deadline {
            return Err(AttemptFailure::Exhausted(last_error));
        }
    }
}

fn spawn_join(
    node: &Arc<RingNode>,
    in_flight: &mut JoinSet<(String, anyhow::Result<JoinResponse>)>,
    target: String,
) {
    let request = JoinRequest {
        app: node.config.app.clone(),
        source: node.local_address().to_string(),
        incarnation_number: node
            .table
            .read()
            .local_member()
            .map(|m| m.incarnation_number)
            .unwrap_or_else(now_millis),
    };
    let transport = node.transport.clone();
    let join_timeout = node.config.join_timeout;
    in_flight.spawn(async move {
        let outcome = match tokio::time::timeout(join_timeout, transport.join(&target, request))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(anyhow::anyhow!(
                "join request timed out after {join_timeout:?}"
            )),
        };
        (target, outcome)
    });
}
