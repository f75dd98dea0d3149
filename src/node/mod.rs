//! Node Facade Module
//!
//! [`RingNode`] wires the membership engine, the hash ring, the suspicion
//! service and the gossip driver together behind one handle. It owns the
//! lifecycle state machine (`Unstarted -> Joining -> Ready`, with
//! `Destroyed` reachable from anywhere), reacts to every membership event in
//! a single match, and exposes the four protocol handlers that a transport
//! server mounts.

pub mod handlers;


use crate::config::{self, RingConfig, DEFAULT_BOOTSTRAP_FILE};
use crate::error::{AdminError, BootstrapError, ProtocolError};
use crate::gossip::joiner;
use crate::gossip::protocol::{
    JoinRequest, JoinResponse, LeaveResponse, PingReqRequest, PingReqResponse, PingRequest,
    PingResponse,
};
use crate::gossip::timing::ProtocolTiming;
use crate::membership::dissemination::DisseminationBuffer;
use crate::membership::iterator::MemberIterator;
use crate::membership::suspicion::SuspicionService;
use crate::membership::table::MemberTable;
use crate::membership::types::{Change, Member, MemberStatus, MembershipEvent};
use crate::ring::HashRing;
use crate::transport::Transport;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Unstarted,
    Joining,
    Ready,
    Destroyed,
}

/// Operational signals emitted to subscribers.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    /// Bootstrap completed; the node participates in gossip.
    Ready,
    /// One batch of membership changes was applied.
    MembershipChanged(Vec<Change>),
}

/// In-process protocol counters.
#[derive(Default)]
pub struct Stats {
    pub joins_received: AtomicU64,
    pub pings_received: AtomicU64,
    pub pings_sent: AtomicU64,
    pub ping_reqs_received: AtomicU64,
    pub ping_reqs_sent: AtomicU64,
    pub lookups: AtomicU64,
    pub updates_new: AtomicU64,
    pub updates_alive: AtomicU64,
    pub updates_suspect: AtomicU64,
    pub updates_faulty: AtomicU64,
    pub updates_leave: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub joins_received: u64,
    pub pings_received: u64,
    pub pings_sent: u64,
    pub ping_reqs_received: u64,
    pub ping_reqs_sent: u64,
    pub lookups: u64,
    pub updates_new: u64,
    pub updates_alive: u64,
    pub updates_suspect: u64,
    pub updates_faulty: u64,
    pub updates_leave: u64,
    pub protocol_periods: u64,
    pub member_count: usize,
}

pub struct RingNode {
    pub(crate) config: RingConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) table: RwLock<MemberTable>,
    pub(crate) dissemination: Mutex<DisseminationBuffer>,
    pub(crate) iter: Mutex<MemberIterator>,
    pub(crate) ring: RwLock<HashRing>,
    pub(crate) suspicion: SuspicionService,
    suspicion_rx: Mutex<Option<mpsc::UnboundedReceiver<Change>>>,
    pub(crate) timing: ProtocolTiming,
    state: Mutex<NodeStatus>,
    destroyed: AtomicBool,
    pub(crate) gossip_running: AtomicBool,
    pub(crate) gossip_generation: AtomicU64,
    pub(crate) is_pinging: AtomicBool,
    pub(crate) protocol_periods: AtomicU64,
    joiner_abort: Mutex<Option<AbortHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events_tx: broadcast::Sender<ClusterEvent>,
    pub(crate) stats: Stats,
}

impl RingNode {
    /// Build a node over the given transport. The transport is shared and
    /// caller-owned; closing it after `destroy` is the caller's job.
    pub fn new(config: RingConfig, transport: Arc<dyn Transport>) -> anyhow::Result<Arc<Self>> {
        config.validate()?;
        let (suspicion, suspicion_rx) = SuspicionService::new(config.suspicion_timeout);
        let (events_tx, _) = broadcast::channel(64);
        let node = Self {
            table: RwLock::new(MemberTable::new(config.host_port.clone())),
            dissemination: Mutex::new(DisseminationBuffer::new()),
            iter: Mutex::new(MemberIterator::new()),
            ring: RwLock::new(HashRing::new(config.replica_points)),
            suspicion,
            suspicion_rx: Mutex::new(Some(suspicion_rx)),
            timing: ProtocolTiming::new(config.min_protocol_period),
            state: Mutex::new(NodeStatus::Unstarted),
            destroyed: AtomicBool::new(false),
            gossip_running: AtomicBool::new(false),
            gossip_generation: AtomicU64::new(0),
            is_pinging: AtomicBool::new(false),
            protocol_periods: AtomicU64::new(0),
            joiner_abort: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            events_tx,
            stats: Stats::default(),
            config,
            transport,
        };
        Ok(Arc::new(node))
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn local_address(&self) -> &str {
        &self.config.host_port
    }

    pub fn app(&self) -> &str {
        &self.config.app
    }

    pub fn node_status(&self) -> NodeStatus {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.node_status() == NodeStatus::Ready
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Subscribe to `Ready` and `MembershipChanged` signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.events_tx.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            joins_received: self.stats.joins_received.load(Ordering::Relaxed),
            pings_received: self.stats.pings_received.load(Ordering::Relaxed),
            pings_sent: self.stats.pings_sent.load(Ordering::Relaxed),
            ping_reqs_received: self.stats.ping_reqs_received.load(Ordering::Relaxed),
            ping_reqs_sent: self.stats.ping_reqs_sent.load(Ordering::Relaxed),
            lookups: self.stats.lookups.load(Ordering::Relaxed),
            updates_new: self.stats.updates_new.load(Ordering::Relaxed),
            updates_alive: self.stats.updates_alive.load(Ordering::Relaxed),
            updates_suspect: self.stats.updates_suspect.load(Ordering::Relaxed),
            updates_faulty: self.stats.updates_faulty.load(Ordering::Relaxed),
            updates_leave: self.stats.updates_leave.load(Ordering::Relaxed),
            protocol_periods: self.protocol_periods.load(Ordering::Relaxed),
            member_count: self.table.read().member_count(),
        }
    }

    /// Snapshot of the member table.
    pub fn members(&self) -> Vec<Member> {
        self.table.read().members()
    }

    pub fn membership_checksum(&self) -> u32 {
        self.table.read().checksum()
    }

    /// Sorted addresses currently on the hash ring.
    pub fn ring_servers(&self) -> Vec<String> {
        self.ring.read().servers()
    }

    // --- Bootstrap ---

    /// Join the cluster. Idempotent: a second call fails with
    /// [`BootstrapError::AlreadyReady`].
    ///
    /// Seeds the bootstrap hosts (explicit array > explicit file > default
    /// file), adds the local member, and runs the joiner. On success the
    /// node is `Ready`, the gossip loop is running and a
    /// [`ClusterEvent::Ready`] is emitted.
    pub async fn bootstrap(self: &Arc<Self>) -> Result<(), BootstrapError> {
        {
            let mut state = self.state.lock();
            match *state {
                NodeStatus::Destroyed => return Err(BootstrapError::Destroyed),
                NodeStatus::Ready | NodeStatus::Joining => {
                    return Err(BootstrapError::AlreadyReady)
                }
                NodeStatus::Unstarted => *state = NodeStatus::Joining,
            }
        }

        let hosts = match self.resolve_bootstrap_hosts() {
            Ok(hosts) => hosts,
            Err(e) => {
                *self.state.lock() = NodeStatus::Unstarted;
                return Err(e);
            }
        };

        let events = self.table.write().add_local_member();
        self.apply_events(events);
        self.spawn_suspicion_drain();

        let targets: Vec<String> = hosts
            .iter()
            .filter(|h| h.as_str() != self.local_address())
            .cloned()
            .collect();

        // The joiner runs as its own task so destroy() can cancel it.
        let joiner_node = self.clone();
        let handle = tokio::spawn(async move { joiner::join_cluster(joiner_node, targets).await });
        *self.joiner_abort.lock() = Some(handle.abort_handle());
        let outcome = handle.await;
        *self.joiner_abort.lock() = None;

        match outcome {
            Ok(Ok(coordinator)) => {
                if self.is_destroyed() {
                    return Err(BootstrapError::Destroyed);
                }
                *self.state.lock() = NodeStatus::Ready;
                self.start_protocol_loops();
                let _ = self.events_tx.send(ClusterEvent::Ready);
                match coordinator {
                    Some(coordinator) => {
                        info!("bootstrap complete via {}", coordinator)
                    }
                    None => info!("bootstrap complete as a single-node cluster"),
                }
                Ok(())
            }
            Ok(Err(e)) => {
                if !self.is_destroyed() {
                    *self.state.lock() = NodeStatus::Unstarted;
                }
                Err(e)
            }
            // The joiner task only disappears when destroy() aborted it.
            Err(_) => Err(BootstrapError::Destroyed),
        }
    }

    fn resolve_bootstrap_hosts(&self) -> Result<Vec<String>, BootstrapError> {
        let hosts = if let Some(list) = &self.config.bootstrap_hosts {
            list.clone()
        } else {
            let path = self
                .config
                .bootstrap_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOTSTRAP_FILE));
            match config::load_hosts_file(&path) {
                Ok(hosts) => hosts,
                Err(e) => {
                    return Err(BootstrapError::HostsFile {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })
                }
            }
        };

        if hosts.is_empty() {
            return Err(BootstrapError::NoBootstrapHosts);
        }
        if !hosts.iter().any(|h| h == self.local_address()) {
            warn!(
                "local address {} is not in the bootstrap host list",
                self.local_address()
            );
        }
        let ip_hosts = hosts.iter().filter(|h| config::host_is_ip(h)).count();
        if ip_hosts != 0 && ip_hosts != hosts.len() {
            warn!("bootstrap host list mixes IP addresses with hostnames");
        }
        Ok(hosts)
    }

    fn spawn_suspicion_drain(self: &Arc<Self>) {
        let Some(mut rx) = self.suspicion_rx.lock().take() else {
            return;
        };
        let node = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(expiry) = rx.recv().await {
                if node.is_destroyed() {
                    break;
                }
                node.update(vec![expiry]);
            }
        });
        self.tasks.lock().push(handle);
    }

    // --- Membership plumbing ---

    /// Merge inbound changes into the table and fan out the results.
    pub(crate) fn update(&self, changes: Vec<Change>) {
        if self.is_destroyed() || changes.is_empty() {
            return;
        }
        let events = self.table.write().update(&changes);
        self.apply_events(events);
    }

    /// The single reaction site for membership events: ring, suspicion and
    /// dissemination all adjust here, then subscribers hear about the batch.
    pub(crate) fn apply_events(&self, events: Vec<MembershipEvent>) {
        if events.is_empty() {
            return;
        }
        let mut emitted = Vec::with_capacity(events.len());
        for event in &events {
            let member = event.member();
            debug!(
                "membership update: {} -> {} (inc={})",
                member.address,
                event.kind(),
                member.incarnation_number
            );
            self.stats_for(event).fetch_add(1, Ordering::Relaxed);
            match event {
                MembershipEvent::New(m) | MembershipEvent::Alive(m) => {
                    self.ring.write().add_server(&m.address);
                    self.suspicion.stop(&m.address);
                }
                MembershipEvent::Suspect(m) => {
                    self.suspicion.start(m);
                }
                MembershipEvent::Faulty(m) | MembershipEvent::Leave(m) => {
                    self.ring.write().remove_server(&m.address);
                    self.suspicion.stop(&m.address);
                }
            }
            let change = event.to_change();
            self.dissemination.lock().add_change(change.clone());
            emitted.push(change);
        }
        let _ = self
            .events_tx
            .send(ClusterEvent::MembershipChanged(emitted));
    }

    fn stats_for(&self, event: &MembershipEvent) -> &AtomicU64 {
        match event {
            MembershipEvent::New(_) => &self.stats.updates_new,
            MembershipEvent::Alive(_) => &self.stats.updates_alive,
            MembershipEvent::Suspect(_) => &self.stats.updates_suspect,
            MembershipEvent::Faulty(_) => &self.stats.updates_faulty,
            MembershipEvent::Leave(_) => &self.stats.updates_leave,
        }
    }

    /// Changes to piggyback on an outgoing message.
    pub(crate) fn piggyback_changes(&self) -> Vec<Change> {
        let member_count = self.table.read().member_count();
        self.dissemination.lock().issue_changes(member_count)
    }

    /// Changes for a reply to a peer whose checksum we know. When the buffer
    /// is empty but the checksums disagree, the full member state goes out
    /// instead; this is what guarantees convergence after a persistent
    /// disagreement.
    pub(crate) fn issue_changes(&self, remote_checksum: u32) -> Vec<Change> {
        let (member_count, local_checksum) = {
            let table = self.table.read();
            (table.member_count(), table.checksum())
        };
        let changes = self.dissemination.lock().issue_changes(member_count);
        if changes.is_empty() && remote_checksum != local_checksum {
            debug!("checksum mismatch with an empty buffer; sending full state");
            return self.table.read().as_changes();
        }
        changes
    }

    // --- Protocol handlers ---

    /// Handle a join request from a bootstrapping node.
    pub fn handle_join(&self, request: JoinRequest) -> Result<JoinResponse, ProtocolError> {
        self.stats.joins_received.fetch_add(1, Ordering::Relaxed);
        if request.source == self.local_address() {
            return Err(ProtocolError::InvalidJoinSource {
                address: request.source,
            });
        }
        if request.app != self.config.app {
            return Err(ProtocolError::InvalidJoinApp {
                expected: self.config.app.clone(),
                actual: request.app,
            });
        }

        let events = self
            .table
            .write()
            .add_member(&request.source, request.incarnation_number);
        self.apply_events(events);
        info!("{} joined via this node", request.source);

        Ok(JoinResponse {
            app: self.config.app.clone(),
            coordinator: self.local_address().to_string(),
            membership: self.table.read().members(),
        })
    }

    /// Handle a direct ping: merge the piggybacked changes, answer with ours.
    pub fn handle_ping(&self, request: PingRequest) -> PingResponse {
        self.stats.pings_received.fetch_add(1, Ordering::Relaxed);
        self.update(request.changes);
        PingResponse {
            changes: self.issue_changes(request.checksum),
        }
    }

    /// Handle an indirect-ping request: ping the target ourselves and report
    /// whether it answered.
    pub async fn handle_ping_req(self: &Arc<Self>, request: PingReqRequest) -> PingReqResponse {
        self.stats.ping_reqs_received.fetch_add(1, Ordering::Relaxed);
        self.update(request.changes);
        let ping_status = self.ping_member(&request.target).await.is_ok();
        PingReqResponse {
            changes: self.issue_changes(request.checksum),
            ping_status,
            target: request.target,
        }
    }

    /// Leave is acknowledged without side effects; the departure reaches us
    /// as a piggybacked change like any other update.
    pub fn handle_leave(&self) -> LeaveResponse {
        LeaveResponse {}
    }

    // --- Admin operations ---

    /// Route a key to the node owning it. Falls back to the local node when
    /// the ring is empty.
    pub fn lookup(&self, key: &str) -> String {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);
        self.ring
            .read()
            .lookup(key)
            .unwrap_or_else(|| self.local_address().to_string())
    }

    /// Gracefully leave the cluster: mark the local member `leave`, stop the
    /// gossip loop and every suspicion timer. Peers learn of the departure
    /// from the piggyback on any subsequent inbound message.
    pub fn admin_leave(&self) -> Result<(), AdminError> {
        if self.is_destroyed() {
            return Err(AdminError::Destroyed);
        }
        let events = {
            let mut table = self.table.write();
            match table.local_member() {
                None => return Err(AdminError::InvalidLeave),
                Some(local) if local.status == MemberStatus::Leave => {
                    return Err(AdminError::RedundantLeave)
                }
                Some(_) => {}
            }
            table.make_leave()
        };
        self.stop_gossip();
        self.suspicion.stop_all();
        self.apply_events(events);
        info!("local member left the cluster");
        Ok(())
    }

    /// Undo an `admin_leave`: mark the local member `alive` at a fresh
    /// incarnation, re-enable suspicion and restart gossip.
    pub fn rejoin(self: &Arc<Self>) -> Result<(), AdminError> {
        if self.is_destroyed() {
            return Err(AdminError::Destroyed);
        }
        let events = {
            let mut table = self.table.write();
            if table.local_member().is_none() {
                return Err(AdminError::InvalidLeave);
            }
            table.make_alive()
        };
        self.suspicion.reenable();
        self.apply_events(events);
        self.start_protocol_loops();
        info!("local member rejoined the cluster");
        Ok(())
    }

    /// Tear the node down: stop gossip, cancel the joiner and every timer
    /// and background task. Idempotent; all later callbacks observe the
    /// destroyed flag and short-circuit. The transport channel stays open,
    /// since it belongs to the caller.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_gossip();
        self.suspicion.stop_all();
        if let Some(abort) = self.joiner_abort.lock().take() {
            abort.abort();
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        *self.state.lock() = NodeStatus::Destroyed;
        info!("node destroyed");
    }

    pub(crate) fn track_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }
}
