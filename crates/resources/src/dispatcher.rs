//! Gated execution of callables
//!
//! The [`Dispatcher`] is the only place where caller supplied work runs.
//! One dispatch is: resolve the gate, take a free permit or pick the tier to
//! wait on, emit WAITING, acquire, emit ACQUIRED, invoke, release, emit
//! RELEASED. A permit that is free is taken atomically, so WAITING reports
//! the tier that actually supplied it; otherwise WAITING is emitted before
//! blocking. Release and the RELEASED
//! event happen on every exit path once a permit is held, including errors
//! returned by the work, panics and cancellation of the dispatch future.

use sempool_config::{Config, HighFallback};
use sempool_errors::Error;
use sempool_events::{EventLevel, EventMeta, GateEvent, NullSink, Phase, TelemetrySink};
use sempool_types::{CallSite, Priority, Tier};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::callable::Callable;
use crate::gate::{GatePermit, PriorityGate, TierChoice};
use crate::probe::ProcessProbe;
use crate::registry::ResourceRegistry;

/// Runs callables under the priority gate of a named resource
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ResourceRegistry>,
    sink: Arc<dyn TelemetrySink>,
    probe: Option<Arc<dyn ProcessProbe>>,
    process_families: Arc<HashSet<String>>,
    high_fallback: HighFallback,
    capture_call_sites: bool,
    suppress_warnings: bool,
}

impl Dispatcher {
    /// Start building a dispatcher over `registry`
    #[must_use]
    pub fn builder(registry: Arc<ResourceRegistry>) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    /// Build the registry and dispatch policy from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry cannot be built.
    pub fn from_config(config: &Config) -> Result<DispatcherBuilder, Error> {
        let registry = Arc::new(ResourceRegistry::from_config(config)?);
        Ok(DispatcherBuilder::new(registry)
            .process_families(config.gate.process_families.iter().cloned())
            .high_fallback(config.gate.high_fallback)
            .capture_call_sites(config.gate.capture_call_sites)
            .suppress_warnings(config.gate.suppress_warnings))
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Run `call` under the gate of `resource`.
    ///
    /// The caller's source location is captured when this method is called,
    /// before the returned future is first polled.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownResource` without emitting any event when
    /// `resource` is not registered.
    #[track_caller]
    pub fn run<'a, T: 'a>(
        &'a self,
        resource: &'a str,
        priority: Priority,
        call: Callable<'a, T>,
    ) -> impl Future<Output = Result<T, Error>> + 'a {
        let site = if self.capture_call_sites {
            CallSite::caller()
        } else {
            CallSite::UNKNOWN
        };
        self.run_at(site, resource, priority, call)
    }

    /// Run a callable returning `Result`, flattening gate errors into the
    /// callable's own error type.
    ///
    /// Errors produced by the callable reach the caller unchanged.
    #[track_caller]
    pub fn try_run<'a, T: 'a, E: From<Error> + 'a>(
        &'a self,
        resource: &'a str,
        priority: Priority,
        call: Callable<'a, Result<T, E>>,
    ) -> impl Future<Output = Result<T, E>> + 'a {
        let dispatch = self.run(resource, priority, call);
        async move {
            match dispatch.await {
                Ok(result) => result,
                Err(err) => Err(E::from(err)),
            }
        }
    }

    /// Run `call` with an explicitly captured call site, e.g. from
    /// [`sempool_types::call_site!`].
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownResource` without emitting any event when
    /// `resource` is not registered, and `GateError::Closed` if the gate is
    /// closed before a permit is obtained.
    pub async fn run_at<T>(
        &self,
        site: CallSite,
        resource: &str,
        priority: Priority,
        call: Callable<'_, T>,
    ) -> Result<T, Error> {
        let gate: &PriorityGate = self.registry.get(resource)?;
        let dispatch = DispatchContext {
            id: Uuid::new_v4(),
            gate,
            priority,
            site,
            running_count: self.running_count(gate.name()),
        };

        let permit = match gate.try_acquire(priority)? {
            Some((permit, free)) => {
                let tier = permit.tier();
                self.record(
                    &dispatch,
                    Phase::Waiting,
                    Some(tier),
                    EventLevel::Trace,
                    (free, gate.permits().get(tier)),
                );
                permit
            }
            None => {
                let choice = PriorityGate::wait_choice(priority, self.high_fallback);
                self.emit_waiting(&dispatch, choice);
                gate.acquire(choice).await?
            }
        };

        let tier = permit.tier();
        let guard = ReleaseGuard {
            dispatcher: self,
            dispatch: &dispatch,
            permit: Some(permit),
        };
        self.emit(&dispatch, Phase::Acquired, Some(tier), EventLevel::Debug);

        let output = call.invoke(self.suppress_warnings).await;
        drop(guard);
        Ok(output)
    }

    fn emit_waiting(&self, dispatch: &DispatchContext<'_>, choice: TierChoice) {
        match choice {
            TierChoice::Only(tier) => {
                let level = if dispatch.gate.available(tier) == 0 {
                    EventLevel::Info
                } else {
                    EventLevel::Trace
                };
                self.emit(dispatch, Phase::Waiting, Some(tier), level);
            }
            TierChoice::Either => self.emit(dispatch, Phase::Waiting, None, EventLevel::Info),
        }
    }

    /// Emit an event with the current free and total permits of `tier`, or of
    /// both tiers when `tier` is `None`
    fn emit(
        &self,
        dispatch: &DispatchContext<'_>,
        phase: Phase,
        tier: Option<Tier>,
        level: EventLevel,
    ) {
        let gate = dispatch.gate;
        let counts = match tier {
            Some(tier) => (gate.available(tier), gate.permits().get(tier)),
            None => (
                gate.available(Tier::Low) + gate.available(Tier::High),
                gate.permits().total(),
            ),
        };
        self.record(dispatch, phase, tier, level, counts);
    }

    fn record(
        &self,
        dispatch: &DispatchContext<'_>,
        phase: Phase,
        tier: Option<Tier>,
        level: EventLevel,
        (free_in_tier, capacity_in_tier): (usize, usize),
    ) {
        let event = GateEvent {
            meta: EventMeta::new(dispatch.id, level),
            phase,
            resource: dispatch.gate.name().to_string(),
            priority: dispatch.priority,
            tier,
            free_in_tier,
            capacity_in_tier,
            call_site: dispatch.site,
            running_count: dispatch.running_count,
        };
        self.sink.record(&event);
    }

    /// Probed once per dispatch; every event of the dispatch reuses the count
    fn running_count(&self, resource: &str) -> Option<u64> {
        if !self.process_families.contains(resource) {
            return None;
        }
        self.probe.as_ref().and_then(|probe| probe.running(resource))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resources", &self.registry.len())
            .field("high_fallback", &self.high_fallback)
            .field("has_probe", &self.probe.is_some())
            .finish_non_exhaustive()
    }
}

struct DispatchContext<'a> {
    id: Uuid,
    gate: &'a PriorityGate,
    priority: Priority,
    site: CallSite,
    running_count: Option<u64>,
}

/// Returns the permit and reports RELEASED when dropped
struct ReleaseGuard<'a> {
    dispatcher: &'a Dispatcher,
    dispatch: &'a DispatchContext<'a>,
    permit: Option<GatePermit>,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            let tier = permit.tier();
            permit.release();
            self.dispatcher
                .emit(self.dispatch, Phase::Released, Some(tier), EventLevel::Debug);
        }
    }
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder {
    registry: Arc<ResourceRegistry>,
    sink: Arc<dyn TelemetrySink>,
    probe: Option<Arc<dyn ProcessProbe>>,
    process_families: HashSet<String>,
    high_fallback: HighFallback,
    capture_call_sites: bool,
    suppress_warnings: bool,
}

impl DispatcherBuilder {
    fn new(registry: Arc<ResourceRegistry>) -> Self {
        let defaults = sempool_config::GateConfig::default();
        Self {
            registry,
            sink: Arc::new(NullSink),
            probe: None,
            process_families: defaults.process_families.into_iter().collect(),
            high_fallback: defaults.high_fallback,
            capture_call_sites: defaults.capture_call_sites,
            suppress_warnings: defaults.suppress_warnings,
        }
    }

    /// Destination of telemetry events
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Source of running process counts for process-family resources
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Resources whose events carry a running process count
    #[must_use]
    pub fn process_families<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process_families = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn high_fallback(mut self, fallback: HighFallback) -> Self {
        self.high_fallback = fallback;
        self
    }

    #[must_use]
    pub fn capture_call_sites(mut self, enabled: bool) -> Self {
        self.capture_call_sites = enabled;
        self
    }

    #[must_use]
    pub fn suppress_warnings(mut self, enabled: bool) -> Self {
        self.suppress_warnings = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            sink: self.sink,
            probe: self.probe,
            process_families: Arc::new(self.process_families),
            high_fallback: self.high_fallback,
            capture_call_sites: self.capture_call_sites,
            suppress_warnings: self.suppress_warnings,
        }
    }
}
