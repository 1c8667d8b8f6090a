//! Events emitted around every gated dispatch

use serde::Serialize;
use sempool_types::{CallSite, Priority, Tier};
use std::fmt;

use crate::EventMeta;

/// Stage of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// About to wait for a permit
    Waiting,
    /// Permit obtained, callable about to run
    Acquired,
    /// Permit handed back
    Released,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "WAITING",
            Self::Acquired => "ACQUIRED",
            Self::Released => "RELEASED",
        })
    }
}

/// Immutable record of one phase of a dispatch
#[derive(Debug, Clone, Serialize)]
pub struct GateEvent {
    pub meta: EventMeta,
    pub phase: Phase,
    pub resource: String,
    pub priority: Priority,
    /// Tier waited on or used; `None` while a request waits on both tiers
    pub tier: Option<Tier>,
    /// Free permits in `tier` when the event was produced
    pub free_in_tier: usize,
    pub capacity_in_tier: usize,
    pub call_site: CallSite,
    /// Running process count reported by the probe for process-family resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_count: Option<u64>,
}

impl GateEvent {
    /// Serialize the event as a single JSON line
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for GateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {}", self.phase, self.resource, self.priority)?;
        if let Some(tier) = self.tier {
            write!(f, ", tier={tier}")?;
        }
        write!(f, ", free={}/{})", self.free_in_tier, self.capacity_in_tier)
    }
}
