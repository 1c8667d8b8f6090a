//! Gate availability snapshots
//!
//! This module provides point-in-time views of the permit counts of a gate,
//! used for reporting and for checking the capacity invariants in tests.

use serde::{Deserialize, Serialize};
use sempool_types::{Tier, TierPermits};

use crate::gate::PriorityGate;

/// Permit counts of one gate at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateAvailability {
    /// Resource name
    pub resource: String,
    /// Configured capacity the tiers were derived from
    pub capacity: usize,
    /// Permits of each tier
    pub permits: TierPermits,
    /// Free permits in the low tier
    pub low_free: usize,
    /// Free permits in the high tier
    pub high_free: usize,
}

impl GateAvailability {
    /// Snapshot a gate
    #[must_use]
    pub fn of(gate: &PriorityGate) -> Self {
        Self {
            resource: gate.name().to_string(),
            capacity: gate.capacity(),
            permits: gate.permits(),
            low_free: gate.available(Tier::Low),
            high_free: gate.available(Tier::High),
        }
    }

    /// Check if any permit is free
    #[must_use]
    pub fn has_any_available(&self) -> bool {
        self.low_free > 0 || self.high_free > 0
    }

    /// Check if the gate is completely idle
    #[must_use]
    pub fn all_available(&self) -> bool {
        self.low_free >= self.permits.low && self.high_free >= self.permits.high
    }

    /// Permits currently held across both tiers
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.permits.total() - self.low_free - self.high_free
    }
}
