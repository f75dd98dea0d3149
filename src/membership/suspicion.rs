//! Suspicion timers.
//!
//! One deadline task per currently-suspect member. If the deadline passes
//! without the member being refuted back to `alive`, a synthetic `faulty`
//! change is handed to the facade through a channel and merged like any
//! other inbound change; the supersession rule discards the expiry if the
//! member refuted in the meantime.

use super::types::{Change, Member, MemberStatus};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct SuspicionService {
    timers: DashMap<String, JoinHandle<()>>,
    enabled: AtomicBool,
    timeout: Duration,
    expired_tx: mpsc::UnboundedSender<Change>,
}

impl SuspicionService {
    /// Returns the service and the receiver carrying expiry changes; the
    /// facade drains the receiver into the member table.
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<Change>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: DashMap::new(),
                enabled: AtomicBool::new(true),
                timeout,
                expired_tx,
            },
            expired_rx,
        )
    }

    /// Arm (or re-arm) the timer for a suspect member.
    pub fn start(&self, member: &Member) {
        if !self.enabled.load(Ordering::SeqCst) {
            debug!("suspicion disabled; not starting timer for {}", member.address);
            return;
        }
        self.stop(&member.address);

        let address = member.address.clone();
        let expiry = Change::new(
            member.address.clone(),
            MemberStatus::Faulty,
            member.incarnation_number,
        );
        let tx = self.expired_tx.clone();
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            debug!("suspicion timer expired for {}", expiry.address);
            let _ = tx.send(expiry);
        });
        self.timers.insert(address, handle);
    }

    /// Cancel the timer for an address; no-op when none is armed.
    pub fn stop(&self, address: &str) {
        if let Some((_, handle)) = self.timers.remove(address) {
            handle.abort();
        }
    }

    /// Cancel every timer and refuse new starts until `reenable`.
    pub fn stop_all(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        let addresses: Vec<String> = self.timers.iter().map(|e| e.key().clone()).collect();
        for address in addresses {
            self.stop(&address);
        }
    }

    /// Permit timers again after a `stop_all` (used by rejoin).
    pub fn reenable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn has_timer(&self, address: &str) -> bool {
        self.timers.contains_key(address)
    }
}
