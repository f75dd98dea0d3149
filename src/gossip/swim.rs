//! The protocol-period driver.
//!
//! One period: sleep the adaptive delay, draw a target from the shuffled
//! iterator, ping it directly, and on failure escalate to an indirect probe
//! through random peers before marking the target `suspect`. At most one
//! direct-ping sequence is in flight per node at any time.
//!
//! Transport failures never leave this module as errors; they are protocol
//! signals and become membership transitions.

use crate::gossip::protocol::{PingReqRequest, PingRequest};
use crate::membership::types::{Change, Member, MemberStatus};
use crate::node::RingNode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tracing::{debug, warn};

impl RingNode {
    /// Start the gossip loop and the 1 Hz rate refresh. No-op while already
    /// running; a restart after `stop_gossip` gets a fresh generation so a
    /// stopped loop that is still sleeping cannot wake up into the new run.
    pub(crate) fn start_protocol_loops(self: &Arc<Self>) {
        if self.gossip_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let generation = self.gossip_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let node = self.clone();
        let protocol = tokio::spawn(async move { node.protocol_loop(generation).await });
        self.track_task(protocol);

        let node = self.clone();
        let rate = tokio::spawn(async move { node.rate_refresh_loop(generation).await });
        self.track_task(rate);
    }

    pub(crate) fn stop_gossip(&self) {
        self.gossip_running.store(false, Ordering::SeqCst);
    }

    fn gossip_stale(&self, generation: u64) -> bool {
        self.is_destroyed()
            || !self.gossip_running.load(Ordering::SeqCst)
            || self.gossip_generation.load(Ordering::SeqCst) != generation
    }

    async fn protocol_loop(self: Arc<Self>, generation: u64) {
        debug!("gossip loop started");
        loop {
            let delay = self.timing.compute_protocol_delay();
            tokio::time::sleep(delay).await;
            if self.gossip_stale(generation) {
                break;
            }
            self.protocol_period().await;
        }
        debug!("gossip loop stopped");
    }

    async fn rate_refresh_loop(self: Arc<Self>, generation: u64) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if self.gossip_stale(generation) {
                break;
            }
            self.timing.refresh_rate();
        }
    }

    /// Run one protocol period. Skipped entirely when the previous period's
    /// ping is still in flight.
    pub(crate) async fn protocol_period(self: &Arc<Self>) {
        if self.is_pinging.swap(true, Ordering::SeqCst) {
            return;
        }
        self.run_protocol_period().await;
        self.is_pinging.store(false, Ordering::SeqCst);
    }

    async fn run_protocol_period(self: &Arc<Self>) {
        self.timing.mark_period_start();
        self.protocol_periods.fetch_add(1, Ordering::Relaxed);

        let target = {
            let table = self.table.read();
            self.iter.lock().next(&table)
        };
        let Some(target) = target else {
            return;
        };

        match self.ping_member(&target.address).await {
            Ok(()) => {}
            Err(e) => {
                if self.is_destroyed() {
                    return;
                }
                debug!("direct ping to {} failed: {}", target.address, e);
                self.indirect_probe(&target).await;
            }
        }
    }

    /// Send one direct ping, merge the reply's changes, and feed the
    /// round-trip time into the adaptive scheduler.
    pub(crate) async fn ping_member(self: &Arc<Self>, target: &str) -> anyhow::Result<()> {
        self.stats.pings_sent.fetch_add(1, Ordering::Relaxed);
        let checksum = self.table.read().checksum();
        let request = PingRequest {
            source: self.local_address().to_string(),
            checksum,
            changes: self.piggyback_changes(),
        };
        let started = Instant::now();
        let outcome = timeout(self.config.ping_timeout, self.transport.ping(target, request)).await;
        if self.is_destroyed() {
            anyhow::bail!("destroyed whilst pinging");
        }
        match outcome {
            Ok(Ok(reply)) => {
                self.timing.record_rtt(started.elapsed());
                self.update(reply.changes);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => anyhow::bail!(
                "ping to {target} timed out after {:?}",
                self.config.ping_timeout
            ),
        }
    }

    /// Ask up to `ping_req_size` random peers to ping the target for us.
    /// The first confirmation keeps the target alive; silence from everyone
    /// marks it suspect. Changes from every reply that arrives are merged.
    async fn indirect_probe(self: &Arc<Self>, target: &Member) {
        let peers = self
            .table
            .read()
            .get_random_pingable_members(self.config.ping_req_size, &[target.address.as_str()]);
        if peers.is_empty() {
            debug!(
                "no peers available to confirm {}; marking suspect",
                target.address
            );
            self.mark_member(target, MemberStatus::Suspect);
            return;
        }

        self.stats
            .ping_reqs_sent
            .fetch_add(peers.len() as u64, Ordering::Relaxed);
        let checksum = self.table.read().checksum();

        let mut in_flight = JoinSet::new();
        for peer in &peers {
            let request = PingReqRequest {
                source: self.local_address().to_string(),
                target: target.address.clone(),
                checksum,
                changes: self.piggyback_changes(),
            };
            let transport = self.transport.clone();
            let peer_address = peer.address.clone();
            in_flight.spawn(async move { transport.ping_req(&peer_address, request).await });
        }

        let confirmed = timeout(self.config.ping_req_timeout, async {
            while let Some(joined) = in_flight.join_next().await {
                if let Ok(Ok(reply)) = joined {
                    let ping_status = reply.ping_status;
                    self.update(reply.changes);
                    if ping_status {
                        return true;
                    }
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        if self.is_destroyed() {
            return;
        }
        if confirmed {
            debug!("{} confirmed alive through an intermediary", target.address);
            self.mark_member(target, MemberStatus::Alive);
        } else {
            warn!(
                "{} unreachable directly and through {} peers; marking suspect",
                target.address,
                peers.len()
            );
            self.mark_member(target, MemberStatus::Suspect);
        }
    }

    /// Record a local observation about a member at its last-known
    /// incarnation. Goes through the normal merge so the supersession rule
    /// still arbitrates.
    fn mark_member(&self, target: &Member, status: MemberStatus) {
        let incarnation = self
            .table
            .read()
            .get(&target.address)
            .map(|m| m.incarnation_number)
            .unwrap_or(target.incarnation_number);
        self.update(vec![Change::new(target.address.clone(), status, incarnation)]);
    }
}
