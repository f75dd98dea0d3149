//! Node Configuration
//!
//! Every tunable the protocol uses lives in a per-node [`RingConfig`] record
//! passed to the node constructor; there is no process-wide state. All timing
//! constants carry the protocol defaults and can be overridden per node.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the bootstrap hosts file, consulted when neither an
/// explicit host list nor an explicit file path is configured.
pub const DEFAULT_BOOTSTRAP_FILE: &str = "./hosts.json";

/// Per-node configuration.
///
/// `app` and `host_port` are required; everything else has a default.
/// Nodes only accept joins from peers carrying the same `app` name, which
/// keeps two clusters sharing a host file from poisoning each other.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Cluster application name; join requests with a different name are rejected.
    pub app: String,
    /// Address of the local node, `"host:port"`. Doubles as the member identity.
    pub host_port: String,
    /// Explicit bootstrap host list. Takes precedence over any hosts file.
    pub bootstrap_hosts: Option<Vec<String>>,
    /// Explicit bootstrap hosts file (JSON array of `"host:port"` strings).
    pub bootstrap_file: Option<PathBuf>,
    /// Lower bound for the adaptive protocol period.
    pub min_protocol_period: Duration,
    /// Deadline for a direct ping.
    pub ping_timeout: Duration,
    /// Overall deadline for one indirect-ping fan-out.
    pub ping_req_timeout: Duration,
    /// Number of peers asked to ping an unresponsive target on our behalf.
    pub ping_req_size: usize,
    /// How long a member stays `suspect` before it is declared `faulty`.
    pub suspicion_timeout: Duration,
    /// Number of bootstrap targets kept in flight by the joiner.
    pub join_size: usize,
    /// Deadline for a single join request.
    pub join_timeout: Duration,
    /// Base delay between join attempts when a whole attempt fails.
    pub join_retry_delay: Duration,
    /// Wall-clock budget for the entire bootstrap join.
    pub max_join_duration: Duration,
    /// Deadline for forwarded application requests (consumed by proxies
    /// built on top of `lookup`; the library itself only carries it).
    pub proxy_req_timeout: Duration,
    /// Virtual positions per server on the hash ring.
    pub replica_points: usize,
}

impl RingConfig {
    pub fn new(app: impl Into<String>, host_port: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            host_port: host_port.into(),
            bootstrap_hosts: None,
            bootstrap_file: None,
            min_protocol_period: Duration::from_millis(200),
            ping_timeout: Duration::from_millis(1500),
            ping_req_timeout: Duration::from_millis(5000),
            ping_req_size: 3,
            suspicion_timeout: Duration::from_millis(5000),
            join_size: 3,
            join_timeout: Duration::from_millis(1000),
            join_retry_delay: Duration::from_millis(200),
            max_join_duration: Duration::from_millis(300_000),
            proxy_req_timeout: Duration::from_millis(30_000),
            replica_points: 100,
        }
    }

    /// Validate the required fields.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.is_empty() {
            anyhow::bail!("app name cannot be empty");
        }
        if !is_host_port(&self.host_port) {
            anyhow::bail!("host_port must be \"host:port\", got {:?}", self.host_port);
        }
        if self.replica_points == 0 {
            anyhow::bail!("replica_points must be at least 1");
        }
        Ok(())
    }
}

/// Check the `"host:port"` shape without resolving anything.
pub fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Whether the host part of `"host:port"` is a literal IP address.
pub fn host_is_ip(address: &str) -> bool {
    address
        .rsplit_once(':')
        .map(|(host, _)| host.parse::<std::net::IpAddr>().is_ok())
        .unwrap_or(false)
}

/// Load a bootstrap hosts file: a JSON array of `"host:port"` strings.
pub fn load_hosts_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    let hosts: Vec<String> = serde_json::from_str(&raw)?;
    Ok(hosts)
}
