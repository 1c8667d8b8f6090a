use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured metadata that accompanies every event emission.
///
/// The `dispatch_id` is shared by the WAITING, ACQUIRED and RELEASED events
/// of one dispatch so consumers can stitch them back together.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Unique identifier for this specific event.
    pub event_id: Uuid,
    /// Identifier of the dispatch that produced the event.
    pub dispatch_id: Uuid,
    /// Timestamp captured at emission time.
    pub timestamp: DateTime<Utc>,
    /// Severity used for routing to logging systems.
    pub level: EventLevel,
    /// Subsystem/component that originated the event.
    pub source: EventSource,
}

impl EventMeta {
    /// Create a new metadata instance for a given dispatch.
    #[must_use]
    pub fn new(dispatch_id: Uuid, level: EventLevel) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            dispatch_id,
            timestamp: Utc::now(),
            level,
            source: EventSource::GATE,
        }
    }
}

/// Severity chosen by the producer of an event; sinks that log use it as
/// the record level.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
}

/// Component that originated the event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub struct EventSource(Cow<'static, str>);

impl EventSource {
    pub const GATE: Self = Self::const_str("gate");

    const fn const_str(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    /// Borrow the underlying identifier used for logging/telemetry.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
