//! Structured logging of gate events
//!
//! Converts gate events into `tracing` records with structured fields so
//! they can be consumed by whatever subscriber the application installs.
//! The record level is the one the dispatcher assigned in [`EventMeta`]:
//! waits on an exhausted tier are `info`, other waits `trace`, acquisitions
//! and releases `debug`.
//!
//! [`EventMeta`]: crate::EventMeta

use tracing::Level;

use crate::{EventLevel, GateEvent, Phase, TelemetrySink};

/// Sink that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &GateEvent) {
        log_event_with_tracing(event);
    }
}

macro_rules! gate_record {
    ($level:expr, $event:expr, $message:expr) => {{
        let event = $event;
        tracing::event!(
            $level,
            source = event.meta.source.as_str(),
            dispatch = %event.meta.dispatch_id,
            resource = %event.resource,
            priority = %event.priority,
            tier = ?event.tier.map(|t| t.as_str()),
            free = event.free_in_tier,
            capacity = event.capacity_in_tier,
            running = ?event.running_count,
            caller = %event.call_site,
            "{}",
            $message
        )
    }};
}

/// Log a `GateEvent` at the level recorded in its metadata
pub fn log_event_with_tracing(event: &GateEvent) {
    let message = match event.phase {
        Phase::Waiting if event.free_in_tier == 0 => "Waiting on exhausted tier",
        Phase::Waiting => "Waiting for permit",
        Phase::Acquired => "Permit acquired",
        Phase::Released => "Permit released",
    };

    match event.meta.level {
        EventLevel::Trace => gate_record!(Level::TRACE, event, message),
        EventLevel::Debug => gate_record!(Level::DEBUG, event, message),
        EventLevel::Info => gate_record!(Level::INFO, event, message),
    }
}
