//! Integration tests for gated dispatch

#[cfg(test)]
mod tests {
    use sempool_config::HighFallback;
    use sempool_errors::{Error, GateError};
    use sempool_events::{channel, EventLevel, EventReceiver, GateEvent, Phase};
    use sempool_resources::*;
    use sempool_types::{call_site, Priority, Tier};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn dispatcher(
        resources: &[(&str, usize)],
        low_divisor: u32,
        high_divisor: u32,
    ) -> (Dispatcher, EventReceiver) {
        let mut registry = ResourceRegistry::new(low_divisor, high_divisor).unwrap();
        for (name, capacity) in resources {
            registry.register(*name, *capacity).unwrap();
        }
        let (tx, rx) = channel();
        let dispatcher = Dispatcher::builder(Arc::new(registry))
            .sink(Arc::new(tx))
            .build();
        (dispatcher, rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<GateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn phases(events: &[GateEvent]) -> Vec<Phase> {
        events.iter().map(|e| e.phase).collect()
    }

    #[derive(Debug, PartialEq)]
    enum JobError {
        Boom(String),
        Gate(String),
    }

    impl From<Error> for JobError {
        fn from(err: Error) -> Self {
            JobError::Gate(err.to_string())
        }
    }

    #[tokio::test]
    async fn test_trivial_pass_through() {
        let (dispatcher, mut rx) = dispatcher(&[("http", 1)], 1, 1);

        let result = dispatcher
            .run("http", Priority::Low, Callable::sync(|| 42))
            .await
            .unwrap();
        assert_eq!(result, 42);

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            [Phase::Waiting, Phase::Acquired, Phase::Released]
        );
        for event in &events {
            assert_eq!(event.resource, "http");
            assert_eq!(event.priority, Priority::Low);
            assert_eq!(event.tier, Some(Tier::Low));
            assert_eq!(event.capacity_in_tier, 1);
            assert_eq!(event.running_count, None);
        }
        assert_eq!(events[1].free_in_tier, 0);
        assert_eq!(events[2].free_in_tier, 1);
        assert!(events
            .iter()
            .all(|e| e.meta.dispatch_id == events[0].meta.dispatch_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_serialization() {
        let (dispatcher, _rx) = dispatcher(&[("http", 2)], 1, 20);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let tasks = (0..3).map(|index| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            dispatcher.run(
                "http",
                Priority::Low,
                Callable::async_fn(move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    index
                }),
            )
        });
        let results: Vec<usize> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(results, [0, 1, 2]);
        assert!(started.elapsed() >= Duration::from_millis(75));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_preempts_saturated_low_tier() {
        let (dispatcher, mut rx) = dispatcher(&[("mongo", 20)], 20, 20);
        assert_eq!(
            dispatcher.registry().capacity("mongo").unwrap(),
            sempool_types::TierPermits { low: 1, high: 1 }
        );

        let long = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run(
                        "mongo",
                        Priority::Low,
                        Callable::future(tokio::time::sleep(Duration::from_millis(100))),
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        let started = Instant::now();
        dispatcher
            .run("mongo", Priority::High, Callable::value(()))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(5));

        let events = drain(&mut rx);
        let high_acquired = events
            .iter()
            .find(|e| e.priority == Priority::High && e.phase == Phase::Acquired)
            .unwrap();
        assert_eq!(high_acquired.tier, Some(Tier::High));

        long.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_error_passthrough_releases_permit() {
        let (dispatcher, mut rx) = dispatcher(&[("ssh", 1)], 1, 20);

        let result: Result<u32, JobError> = dispatcher
            .try_run(
                "ssh",
                Priority::Low,
                Callable::sync(|| Err(JobError::Boom("boom".to_string()))),
            )
            .await;
        assert_eq!(result, Err(JobError::Boom("boom".to_string())));
        assert_eq!(
            phases(&drain(&mut rx)),
            [Phase::Waiting, Phase::Acquired, Phase::Released]
        );

        let gate = dispatcher.registry().get("ssh").unwrap();
        assert_eq!(gate.available(Tier::Low), 1);

        let next = tokio::time::timeout(
            Duration::from_millis(50),
            dispatcher.run("ssh", Priority::Low, Callable::value(7)),
        )
        .await
        .expect("permit was not released")
        .unwrap();
        assert_eq!(next, 7);
    }

    #[tokio::test]
    async fn test_try_run_maps_gate_errors() {
        let (dispatcher, _rx) = dispatcher(&[("ssh", 1)], 1, 20);
        let result: Result<u32, JobError> = dispatcher
            .try_run("nope", Priority::Low, Callable::value(Ok(1)))
            .await;
        assert_eq!(
            result,
            Err(JobError::Gate("gate error: unknown resource: nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_coroutine_value_dispatch() {
        async fn g(x: u32) -> u32 {
            x + 1
        }

        let (dispatcher, _rx) = dispatcher(&[("http", 1)], 1, 20);
        let callable = Callable::future(g(41));
        assert_eq!(callable.kind(), CallableKind::Future);
        let result = dispatcher.run("http", Priority::Low, callable).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_unknown_resource_emits_nothing() {
        let (dispatcher, mut rx) = dispatcher(&[("http", 1)], 1, 20);
        let err = dispatcher
            .run("nope", Priority::High, Callable::value(1))
            .await
            .unwrap_err();
        assert!(err.is_unknown_resource());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_every_callable_kind() {
        struct Answer;

        impl std::future::IntoFuture for Answer {
            type Output = u32;
            type IntoFuture = std::future::Ready<u32>;

            fn into_future(self) -> Self::IntoFuture {
                std::future::ready(42)
            }
        }

        let (dispatcher, _rx) = dispatcher(&[("os", 5)], 1, 20);
        let base = 40;
        let callables = vec![
            Callable::async_fn(move || async move { base + 2 }),
            Callable::future(async move { base + 2 }),
            Callable::awaitable(|| Answer),
            Callable::sync(move || base + 2),
            Callable::value(42),
        ];
        for callable in callables {
            let result = dispatcher.run("os", Priority::Low, callable).await.unwrap();
            assert_eq!(result, 42);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_invocation_releases() {
        let (dispatcher, mut rx) = dispatcher(&[("ssh", 1)], 1, 20);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            dispatcher.run(
                "ssh",
                Priority::Low,
                Callable::future(tokio::time::sleep(Duration::from_secs(60))),
            ),
        )
        .await;
        assert!(cancelled.is_err());

        let gate = dispatcher.registry().get("ssh").unwrap();
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(
            phases(&drain(&mut rx)),
            [Phase::Waiting, Phase::Acquired, Phase::Released]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_acquires_nothing() {
        let (dispatcher, mut rx) = dispatcher(&[("ssh", 1)], 1, 20);
        let gate = dispatcher.registry().get("ssh").unwrap().clone();
        let held = gate
            .acquire_for(Priority::Low, HighFallback::WaitHigh)
            .await
            .unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            dispatcher.run("ssh", Priority::Low, Callable::value(1)),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(phases(&drain(&mut rx)), [Phase::Waiting]);

        held.release();
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_releases_permit() {
        let (dispatcher, mut rx) = dispatcher(&[("ssh", 1)], 1, 20);

        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run(
                        "ssh",
                        Priority::Low,
                        Callable::sync(|| -> u32 { panic!("boom") }),
                    )
                    .await
            })
        };
        assert!(task.await.unwrap_err().is_panic());

        let gate = dispatcher.registry().get("ssh").unwrap();
        assert_eq!(gate.available(Tier::Low), 1);
        assert_eq!(
            phases(&drain(&mut rx)),
            [Phase::Waiting, Phase::Acquired, Phase::Released]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_workload_respects_tier_bounds() {
        let (dispatcher, mut rx) = dispatcher(&[("tests", 4)], 1, 2);
        let gate = dispatcher.registry().get("tests").unwrap().clone();
        let permits = gate.permits();
        assert_eq!(permits, sempool_types::TierPermits { low: 4, high: 2 });
        let violations = Arc::new(AtomicUsize::new(0));

        let tasks = (0..24u64).map(|index| {
            let gate = gate.clone();
            let violations = violations.clone();
            let priority = if index % 3 == 0 {
                Priority::High
            } else {
                Priority::Low
            };
            dispatcher.run(
                "tests",
                priority,
                Callable::async_fn(move || async move {
                    if gate.in_flight() > permits.total()
                        || gate.in_flight_in(Tier::Low) > permits.low
                        || gate.in_flight_in(Tier::High) > permits.high
                    {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(5 + index % 7)).await;
                }),
            )
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(gate.in_flight(), 0);

        let events = drain(&mut rx);
        let mut per_dispatch: HashMap<_, Vec<Phase>> = HashMap::new();
        for event in &events {
            per_dispatch
                .entry(event.meta.dispatch_id)
                .or_default()
                .push(event.phase);
        }
        assert_eq!(per_dispatch.len(), 24);
        for sequence in per_dispatch.values() {
            assert_eq!(
                sequence,
                &[Phase::Waiting, Phase::Acquired, Phase::Released]
            );
        }
    }

    #[tokio::test]
    async fn test_probe_enriches_process_families() {
        let mut registry = ResourceRegistry::new(1, 20).unwrap();
        registry.register("ssh", 4).unwrap();
        registry.register("http", 4).unwrap();
        let (tx, mut rx) = channel();
        let dispatcher = Dispatcher::builder(Arc::new(registry))
            .sink(Arc::new(tx))
            .probe(Arc::new(FnProbe(|resource: &str| {
                (resource == "ssh" || resource == "http").then_some(7)
            })))
            .build();

        dispatcher
            .run("ssh", Priority::Low, Callable::value(()))
            .await
            .unwrap();
        dispatcher
            .run("http", Priority::Low, Callable::value(()))
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .filter(|e| e.resource == "ssh")
            .all(|e| e.running_count == Some(7)));
        // http is not a process family, the probe is never consulted
        assert!(events
            .iter()
            .filter(|e| e.resource == "http")
            .all(|e| e.running_count.is_none()));
    }

    #[tokio::test]
    async fn test_call_site_is_captured() {
        let (dispatcher, mut rx) = dispatcher(&[("http", 1)], 1, 20);

        let line = line!() + 1;
        let fut = dispatcher.run("http", Priority::Low, Callable::value(1));
        fut.await.unwrap();
        let events = drain(&mut rx);
        assert!(events[0].call_site.file.ends_with("integration.rs"));
        assert_eq!(events[0].call_site.line, line);

        dispatcher
            .run_at(call_site!(), "http", Priority::Low, Callable::value(1))
            .await
            .unwrap();
        let events = drain(&mut rx);
        assert_eq!(events[0].call_site.function, "test_call_site_is_captured");
    }

    #[tokio::test]
    async fn test_call_site_capture_can_be_disabled() {
        let mut registry = ResourceRegistry::new(1, 20).unwrap();
        registry.register("http", 1).unwrap();
        let (tx, mut rx) = channel();
        let dispatcher = Dispatcher::builder(Arc::new(registry))
            .sink(Arc::new(tx))
            .capture_call_sites(false)
            .build();

        dispatcher
            .run("http", Priority::Low, Callable::value(1))
            .await
            .unwrap();
        assert!(drain(&mut rx).iter().all(|e| e.call_site.is_unknown()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_fallback_wait_low_queues_behind_low_tier() {
        let mut registry = ResourceRegistry::new(20, 20).unwrap();
        registry.register("mongo", 20).unwrap();
        let (tx, mut rx) = channel();
        let dispatcher = Dispatcher::builder(Arc::new(registry))
            .sink(Arc::new(tx))
            .high_fallback(HighFallback::WaitLow)
            .build();
        let gate = dispatcher.registry().get("mongo").unwrap().clone();
        let low = gate.acquire_for(Priority::Low, HighFallback::WaitLow).await.unwrap();
        let high = gate.acquire_for(Priority::High, HighFallback::WaitLow).await.unwrap();
        assert_eq!(high.tier(), Tier::High);

        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run("mongo", Priority::High, Callable::value(()))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        high.release();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        low.release();
        waiter.await.unwrap().unwrap();
        let events = drain(&mut rx);
        assert_eq!(events[0].phase, Phase::Waiting);
        assert_eq!(events[0].tier, Some(Tier::Low));
        assert_eq!(events[1].tier, Some(Tier::Low));
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_waits_on_reserve_by_default() {
        let (dispatcher, mut rx) = dispatcher(&[("mongo", 20)], 20, 20);
        let gate = dispatcher.registry().get("mongo").unwrap().clone();
        let low = gate.acquire_for(Priority::Low, HighFallback::WaitHigh).await.unwrap();
        let high = gate.acquire_for(Priority::High, HighFallback::WaitHigh).await.unwrap();

        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run("mongo", Priority::High, Callable::value("served"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        // the low permit stays held; freeing the reserve is enough
        high.release();
        assert_eq!(waiter.await.unwrap().unwrap(), "served");

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            [Phase::Waiting, Phase::Acquired, Phase::Released]
        );
        assert_eq!(events[0].tier, Some(Tier::High));
        assert_eq!(events[0].free_in_tier, 0);
        assert_eq!(events[0].meta.level, EventLevel::Info);
        assert_eq!(events[1].tier, Some(Tier::High));
        assert_eq!(gate.in_flight_in(Tier::Low), 1);
        low.release();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_free_waits_on_both_tiers() {
        let mut registry = ResourceRegistry::new(20, 20).unwrap();
        registry.register("mongo", 20).unwrap();
        let (tx, mut rx) = channel();
        let dispatcher = Dispatcher::builder(Arc::new(registry))
            .sink(Arc::new(tx))
            .high_fallback(HighFallback::FirstFree)
            .build();
        let gate = dispatcher.registry().get("mongo").unwrap().clone();
        let low = gate.acquire_for(Priority::Low, HighFallback::FirstFree).await.unwrap();
        let high = gate.acquire_for(Priority::High, HighFallback::FirstFree).await.unwrap();

        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run("mongo", Priority::High, Callable::value(()))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let waiting = drain(&mut rx);
        assert_eq!(phases(&waiting), [Phase::Waiting]);
        assert_eq!(waiting[0].tier, None);
        assert_eq!(waiting[0].free_in_tier, 0);
        assert_eq!(waiting[0].capacity_in_tier, 2);

        low.release();
        waiter.await.unwrap().unwrap();
        let events = drain(&mut rx);
        assert_eq!(phases(&events), [Phase::Acquired, Phase::Released]);
        assert_eq!(events[0].tier, Some(Tier::Low));
        assert_eq!(events[1].tier, Some(Tier::Low));
        high.release();
    }

    #[tokio::test]
    async fn test_process_count_queried_once_per_dispatch() {
        let mut registry = ResourceRegistry::new(1, 20).unwrap();
        registry.register("ping", 2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = {
            let calls = calls.clone();
            FnProbe(move |_: &str| Some(calls.fetch_add(1, Ordering::SeqCst) as u64))
        };
        let (tx, mut rx) = channel();
        let dispatcher = Dispatcher::builder(Arc::new(registry))
            .sink(Arc::new(tx))
            .probe(Arc::new(probe))
            .build();

        dispatcher
            .run("ping", Priority::Low, Callable::value(()))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(drain(&mut rx).iter().all(|e| e.running_count == Some(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_registry_fails_waiting_dispatches() {
        let (dispatcher, mut rx) = dispatcher(&[("ssh", 1)], 1, 20);
        let gate = dispatcher.registry().get("ssh").unwrap().clone();
        let held = gate.acquire_for(Priority::Low, HighFallback::WaitHigh).await.unwrap();

        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run("ssh", Priority::Low, Callable::value(1))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        dispatcher.registry().close();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Gate(GateError::Closed { .. })));
        assert_eq!(phases(&drain(&mut rx)), [Phase::Waiting]);

        let err = dispatcher
            .run("ssh", Priority::High, Callable::value(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Gate(GateError::Closed { .. })));
        assert!(drain(&mut rx).is_empty());
        drop(held);
    }

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_warning_suppression_is_scoped_to_invocation() {
        use tracing_subscriber::layer::SubscriberExt;

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut registry = ResourceRegistry::new(1, 20).unwrap();
        registry.register("http", 1).unwrap();
        let registry = Arc::new(registry);
        let noisy = || {
            Callable::async_fn(|| async {
                tracing::warn!("deprecated endpoint");
                tokio::task::yield_now().await;
                tracing::warn!("deprecated endpoint");
            })
        };

        let quiet = Dispatcher::builder(registry.clone())
            .suppress_warnings(true)
            .build();
        quiet.run("http", Priority::Low, noisy()).await.unwrap();
        assert_eq!(warnings.load(Ordering::SeqCst), 0);

        tracing::warn!("outside dispatch");
        assert_eq!(warnings.load(Ordering::SeqCst), 1);

        let loud = Dispatcher::builder(registry)
            .suppress_warnings(false)
            .build();
        loud.run("http", Priority::Low, noisy()).await.unwrap();
        assert_eq!(warnings.load(Ordering::SeqCst), 3);
    }
}
