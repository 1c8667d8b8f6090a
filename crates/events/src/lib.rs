#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry for the sempool gates
//!
//! Every dispatch produces exactly three [`GateEvent`]s (WAITING, ACQUIRED,
//! RELEASED) that are handed to an injected [`TelemetrySink`]. The crate
//! ships sinks for the common destinations:
//!
//! - [`TracingSink`]: structured `tracing` records
//! - [`EventSender`]: an unbounded tokio channel, see [`channel`]
//! - [`FanoutSink`]: several sinks at once
//! - [`FnSink`]: any closure

pub mod gate;
pub mod logging;
pub mod meta;
pub mod sink;

pub use gate::{GateEvent, Phase};
pub use logging::{log_event_with_tracing, TracingSink};
pub use meta::{EventLevel, EventMeta, EventSource};
pub use sink::{FanoutSink, FnSink, NullSink, TelemetrySink};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for event sender
pub type EventSender = UnboundedSender<GateEvent>;

/// Type alias for event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<GateEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
