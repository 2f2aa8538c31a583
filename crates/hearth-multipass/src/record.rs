//! Observed VM state as reported by the tool.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum VmState {
    /// No instance with this name exists
    Absent,
    /// Booting or restarting
    Starting,
    /// Up and reachable
    Running,
    /// Powered off
    Stopped,
    /// Suspended to disk
    Suspended,
    /// Soft-deleted, awaiting purge
    Deleted,
    /// State the tool reported but we do not recognize
    Unknown,
}

impl VmState {
    /// Parse a tool state string (case-insensitive).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "absent" => Self::Absent,
            "starting" | "restarting" => Self::Starting,
            "running" | "delayed shutdown" => Self::Running,
            "stopped" => Self::Stopped,
            "suspended" | "suspending" => Self::Suspended,
            "deleted" => Self::Deleted,
            _ => Self::Unknown,
        }
    }

    /// Running or on its way there.
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Running | Self::Starting)
    }
}

impl From<String> for VmState {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::Absent => write!(f, "Absent"),
            VmState::Starting => write!(f, "Starting"),
            VmState::Running => write!(f, "Running"),
            VmState::Stopped => write!(f, "Stopped"),
            VmState::Suspended => write!(f, "Suspended"),
            VmState::Deleted => write!(f, "Deleted"),
            VmState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// An instance as the tool currently sees it.
///
/// Always re-derived from a fresh `info` or `list` call; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub state: VmState,
    /// IPv4 addresses in the order the tool reported them
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    /// Everything else the tool reported (load, disks, memory, mounts)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl VmRecord {
    /// Check if the instance is running or starting.
    pub fn is_up(&self) -> bool {
        self.state.is_up()
    }
}
