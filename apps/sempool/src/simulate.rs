//! Synthetic workload driven through a gate

use futures::future::join_all;
use sempool_events::{FanoutSink, FnSink, GateEvent, Phase, TracingSink};
use sempool_resources::{Callable, Dispatcher, DispatcherBuilder};
use sempool_types::{Priority, TierPermits};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::CliError;

/// Parameters of one simulation run
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub resource: String,
    pub tasks: usize,
    pub hold: Duration,
    pub priority: Priority,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub resource: String,
    pub priority: Priority,
    pub tasks: usize,
    pub hold_ms: u64,
    pub permits: TierPermits,
    pub elapsed_ms: u64,
    pub peak_in_flight: usize,
    pub events: u64,
}

/// Tracks permits held at once, as observed through telemetry
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    events: AtomicU64,
}

impl InFlight {
    fn observe(&self, event: &GateEvent) {
        self.events.fetch_add(1, Ordering::Relaxed);
        match event.phase {
            Phase::Acquired => {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
            }
            Phase::Released => {
                self.current.fetch_sub(1, Ordering::SeqCst);
            }
            Phase::Waiting => {}
        }
    }
}

/// Dispatch `plan.tasks` sleeping tasks against one resource and wait for all
/// of them
///
/// # Errors
///
/// Returns an error if the resource is not registered or no tasks are
/// requested.
pub async fn run(
    builder: DispatcherBuilder,
    plan: &SimulationPlan,
) -> Result<SimulationReport, CliError> {
    if plan.tasks == 0 {
        return Err(CliError::InvalidArguments(
            "--tasks must be at least 1".to_string(),
        ));
    }

    let in_flight = Arc::new(InFlight::default());
    let counter = in_flight.clone();
    let sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(FnSink(move |event: &GateEvent| counter.observe(event))));
    let dispatcher: Dispatcher = builder.sink(Arc::new(sink)).build();
    let permits = dispatcher.registry().capacity(&plan.resource)?;

    tracing::info!(
        resource = %plan.resource,
        tasks = plan.tasks,
        hold_ms = duration_ms(plan.hold),
        priority = %plan.priority,
        "starting simulation"
    );

    let started = Instant::now();
    let hold = plan.hold;
    let dispatches = (0..plan.tasks).map(|_| {
        dispatcher.run(
            &plan.resource,
            plan.priority,
            Callable::async_fn(move || tokio::time::sleep(hold)),
        )
    });
    for outcome in join_all(dispatches).await {
        outcome?;
    }
    let elapsed = started.elapsed();

    Ok(SimulationReport {
        resource: plan.resource.clone(),
        priority: plan.priority,
        tasks: plan.tasks,
        hold_ms: duration_ms(plan.hold),
        permits,
        elapsed_ms: duration_ms(elapsed),
        peak_in_flight: in_flight.peak.load(Ordering::SeqCst),
        events: in_flight.events.load(Ordering::Relaxed),
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
