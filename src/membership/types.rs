use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle state of a member as seen by the cluster.
///
/// `Faulty` and `Leave` are terminal-ish: the entry stays in the table so
/// stale gossip cannot resurrect a departed member without a higher
/// incarnation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// The member is healthy and responsive.
    Alive,
    /// The member missed a ping round and is awaiting refutation or expiry.
    Suspect,
    /// The suspicion deadline passed; the member is considered failed.
    Faulty,
    /// The member departed voluntarily via `admin_leave`.
    Leave,
}

impl MemberStatus {
    /// Liveness precedence used by the supersession rule at equal
    /// incarnation: `faulty > suspect > alive > leave`. Any report that
    /// downgrades liveness wins a same-incarnation conflict.
    pub fn precedence(self) -> u8 {
        match self {
            MemberStatus::Leave => 0,
            MemberStatus::Alive => 1,
            MemberStatus::Suspect => 2,
            MemberStatus::Faulty => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Alive => "alive",
            MemberStatus::Suspect => "suspect",
            MemberStatus::Faulty => "faulty",
            MemberStatus::Leave => "leave",
        }
    }
}

/// A single member of the cluster.
///
/// The `address` (`"host:port"`, compared case-sensitively) is the member's
/// identity; `incarnation_number` is the member's own version counter,
/// bumped only by the member itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub address: String,
    pub status: MemberStatus,
    pub incarnation_number: i64,
}

/// Decide whether an incoming report `(new_inc, new_status)` supersedes the
/// stored `(cur_inc, cur_status)` for the same member.
pub fn supersedes(
    new_inc: i64,
    new_status: MemberStatus,
    cur_inc: i64,
    cur_status: MemberStatus,
) -> bool {
    new_inc > cur_inc
        || (new_inc == cur_inc && new_status.precedence() > cur_status.precedence())
}

/// A member-state change, as disseminated between nodes.
///
/// `piggyback_count` tracks how many outgoing messages have carried this
/// change locally; it never crosses the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub address: String,
    pub status: MemberStatus,
    pub incarnation_number: i64,
    #[serde(skip)]
    pub piggyback_count: u32,
}

impl Change {
    pub fn new(address: impl Into<String>, status: MemberStatus, incarnation_number: i64) -> Self {
        Self {
            address: address.into(),
            status,
            incarnation_number,
            piggyback_count: 0,
        }
    }
}

impl From<&Member> for Change {
    fn from(member: &Member) -> Self {
        Change::new(member.address.clone(), member.status, member.incarnation_number)
    }
}

/// A state transition applied by the member table.
///
/// `New` is emitted when a previously unknown member enters as `alive`; the
/// other variants mirror the status the member transitioned to. The facade
/// fans these out to the ring, the suspicion service, and the dissemination
/// buffer in a single match.
#[derive(Debug, Clone)]
pub enum MembershipEvent {
    New(Member),
    Alive(Member),
    Suspect(Member),
    Faulty(Member),
    Leave(Member),
}

impl MembershipEvent {
    pub fn member(&self) -> &Member {
        match self {
            MembershipEvent::New(m)
            | MembershipEvent::Alive(m)
            | MembershipEvent::Suspect(m)
            | MembershipEvent::Faulty(m)
            | MembershipEvent::Leave(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MembershipEvent::New(_) => "new",
            MembershipEvent::Alive(_) => "alive",
            MembershipEvent::Suspect(_) => "suspect",
            MembershipEvent::Faulty(_) => "faulty",
            MembershipEvent::Leave(_) => "leave",
        }
    }

    /// The change record to disseminate for this event.
    pub fn to_change(&self) -> Change {
        Change::from(self.member())
    }
}

/// Wall-clock milliseconds since the epoch; used to mint fresh incarnation
/// numbers for the local member.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
