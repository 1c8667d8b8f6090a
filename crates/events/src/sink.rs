//! Destinations for gate telemetry

use std::sync::Arc;

use crate::{EventSender, GateEvent};

/// Receiver of structured gate events
///
/// Sinks are called synchronously from the dispatch path and must not block.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &GateEvent);
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _event: &GateEvent) {}
}

/// Adapter turning a closure into a sink
pub struct FnSink<F>(pub F);

impl<F> TelemetrySink for FnSink<F>
where
    F: Fn(&GateEvent) + Send + Sync,
{
    fn record(&self, event: &GateEvent) {
        (self.0)(event);
    }
}

/// Forwards every event to several sinks, in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&self, event: &GateEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Arc<S> {
    fn record(&self, event: &GateEvent) {
        (**self).record(event);
    }
}

/// Implementation of `TelemetrySink` for the raw `EventSender`
impl TelemetrySink for EventSender {
    fn record(&self, event: &GateEvent) {
        // Ignore send errors - if receiver is dropped, we just continue
        let _ = self.send(event.clone());
    }
}
