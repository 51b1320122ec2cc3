//! Types shared by the node, the log and the coordinator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSpec {
    pub sec: u64,
    pub nsec: u32,
}

impl TimeSpec {
    /// Wall-clock time; a clock before the epoch reads as zero.
    pub fn now() -> Self {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| TimeSpec {
                sec: d.as_secs(),
                nsec: d.subsec_nanos(),
            })
            .unwrap_or_default()
    }
}

/// Replication state of a node as seen by the coordinator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    #[default]
    Active,
    /// Rejected the last replicated entry
    Failed,
    /// Replaying its pending log entries
    Recovering,
    /// Skipped by an aborted replication, has pending entries
    Lagging,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub applied: u64,
    pub failed: u64,
    pub replays: u64,
    pub last_checkpoint: TimeSpec,
    /// Sequence number of the newest entry this node consumed
    pub last_applied: Option<u64>,
    pub since_checkpoint: u64,
}

impl NodeStats {
    pub fn new() -> Self {
        Self {
            last_checkpoint: TimeSpec::now(),
            ..Self::default()
        }
    }
}
