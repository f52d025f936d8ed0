//! Orchestrator for one scrape run
//!
//! Drives independent adapters, isolates their failures, resolves their
//! signals into entity keys as they arrive, then aggregates and publishes
//! one result per entity.
//!
//! Adapters run one at a time by default. With a concurrency limit above one
//! they run on a bounded worker pool; resolver writes stay serialized behind a
//! lock either way.

mod report;

pub use report::{AdapterReport, AdapterState, RunReport};

use crate::adapter::{Adapter, AdapterError, RunContext};
use crate::aggregate::Aggregator;
use crate::publish::Publisher;
use crate::resolver::{Entity, EntityResolver, RegionLookup, ZipCountyTable, DEFAULT_KEY_PREFIX};
use crate::signal::Signal;
use crate::status::{StatusValue, DEFAULT_LIMITED_THRESHOLD};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What one adapter produced
struct Fetched {
    state: AdapterState,
    signals: Vec<Signal>,
    attempts: u32,
    synthesized: usize,
}

/// Runs adapters and feeds their signals through resolve → aggregate → publish
pub struct Orchestrator {
    aggregator: Aggregator,
    publisher: Publisher,
    locations: Vec<Entity>,
    regions: Arc<dyn RegionLookup>,
    key_prefix: String,
    max_concurrent: usize,
    adapter_timeout: Option<Duration>,
    retry_possible: u32,
}

impl Orchestrator {
    pub fn new(publisher: Publisher) -> Self {
        Self {
            aggregator: Aggregator::new(DEFAULT_LIMITED_THRESHOLD),
            publisher,
            locations: Vec::new(),
            regions: Arc::new(ZipCountyTable::default()),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_concurrent: 1,
            adapter_timeout: None,
            retry_possible: 0,
        }
    }

    pub fn with_limited_threshold(mut self, threshold: u32) -> Self {
        self.aggregator = Aggregator::new(threshold);
        self
    }

    /// Pre-registered locations loaded before every run
    pub fn with_locations(mut self, locations: Vec<Entity>) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_regions(mut self, regions: Arc<dyn RegionLookup>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Run up to `limit` adapters at once (minimum one)
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit.max(1);
        self
    }

    pub fn with_adapter_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Re-fetch an adapter whose signals are all `POSSIBLE` up to `retries` times
    pub fn with_retry_possible(mut self, retries: u32) -> Self {
        self.retry_possible = retries;
        self
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run every adapter once and publish the results.
    ///
    /// Never fails: adapter and publish failures are recorded in the report.
    ///
    /// Publication starts only after every adapter has finished, so each key
    /// is aggregated over the whole run and published exactly once. A run
    /// killed before that point publishes nothing; the store keeps the
    /// values from the previous completed run.
    pub async fn run(&self, adapters: &[Arc<dyn Adapter>]) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id, adapters).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, adapters: &[Arc<dyn Adapter>]) -> RunReport {
        let mut report = RunReport::new(run_id);
        report.adapters = adapters
            .iter()
            .map(|a| AdapterReport::new(a.id(), a.name()))
            .collect();

        let ctx = RunContext::new(self.aggregator.threshold()).with_run_id(run_id);
        let resolver = Mutex::new(self.seed_resolver());
        let mut signals: Vec<Signal> = Vec::new();

        info!(adapters = adapters.len(), concurrency = self.max_concurrent, "run started");

        if self.max_concurrent <= 1 {
            for (index, adapter) in adapters.iter().enumerate() {
                report.adapters[index].mark_fetching();
                let fetched = self.fetch_one(adapter.clone(), ctx.clone()).await;
                self.absorb(&mut report.adapters[index], fetched, &resolver, &mut signals)
                    .await;
            }
        } else {
            let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
            let mut workers = JoinSet::new();
            // Workers report their index once they hold a permit
            let (started_tx, mut started_rx) = mpsc::unbounded_channel::<usize>();

            for (index, adapter) in adapters.iter().enumerate() {
                let semaphore = semaphore.clone();
                let started = started_tx.clone();
                let adapter = adapter.clone();
                let ctx = ctx.clone();
                let timeout = self.adapter_timeout;
                let retries = self.retry_possible;
                workers.spawn(
                    async move {
                        let _permit = semaphore.acquire_owned().await;
                        let _ = started.send(index);
                        (index, fetch_adapter(adapter, ctx, timeout, retries).await)
                    }
                    .in_current_span(),
                );
            }
            drop(started_tx);

            loop {
                tokio::select! {
                    biased;
                    Some(index) = started_rx.recv() => {
                        report.adapters[index].mark_fetching();
                    }
                    joined = workers.join_next() => match joined {
                        Some(Ok((index, fetched))) => {
                            self.absorb(&mut report.adapters[index], fetched, &resolver, &mut signals)
                                .await;
                        }
                        Some(Err(e)) => error!(error = %e, "adapter worker lost"),
                        None => break,
                    },
                }
            }
        }

        for adapter in report.adapters.iter_mut() {
            if !adapter.state.is_terminal() {
                adapter.state = AdapterState::Failed {
                    reason: "adapter worker lost".to_string(),
                };
            }
        }

        let resolver = resolver.into_inner();
        self.publish_all(&resolver, &signals, &mut report).await;
        report.collisions = resolver.collisions().to_vec();
        report.finished_at = Some(chrono::Utc::now());

        info!(
            published = report.published().len(),
            skipped = report.skipped().len(),
            failed = report.publish_failures().len(),
            failed_adapters = report.failed_adapters().len(),
            "run finished"
        );
        report
    }

    fn seed_resolver(&self) -> EntityResolver {
        let mut resolver =
            EntityResolver::new(self.key_prefix.clone()).with_regions(self.regions.clone());
        for location in &self.locations {
            resolver.register(location.clone());
        }
        resolver
    }

    async fn fetch_one(&self, adapter: Arc<dyn Adapter>, ctx: RunContext) -> Fetched {
        fetch_adapter(adapter, ctx, self.adapter_timeout, self.retry_possible).await
    }

    /// Resolve an adapter's signals and record its final state
    async fn absorb(
        &self,
        adapter: &mut AdapterReport,
        fetched: Fetched,
        resolver: &Mutex<EntityResolver>,
        signals: &mut Vec<Signal>,
    ) {
        adapter.state = fetched.state;
        adapter.attempts = fetched.attempts;
        adapter.synthesized = fetched.synthesized;

        let mut resolver = resolver.lock().await;
        for mut signal in fetched.signals {
            let errors = resolver.resolve_signal(&mut signal);
            for e in &errors {
                warn!(adapter = %adapter.id, error = %e, "unresolvable discovery");
            }
            adapter.unresolved += errors.len();

            if signal.entity_keys.is_empty() {
                warn!(adapter = %adapter.id, status = %signal.status, "signal names no entity; dropped");
                continue;
            }
            signals.push(signal);
        }
    }

    async fn publish_all(
        &self,
        resolver: &EntityResolver,
        signals: &[Signal],
        report: &mut RunReport,
    ) {
        let groups = Aggregator::group(signals);

        for entity in resolver.entities() {
            let group = groups.get(&entity.key).map(Vec::as_slice).unwrap_or(&[]);
            let result = self.aggregator.aggregate(&entity.key, group.iter().copied());

            if let Some(conflict) = &result.conflict {
                report.conflicts.push(conflict.clone());
            }
            report.statuses.insert(entity.key.clone(), result.status);

            let outcome = self.publisher.publish(&result, Some(entity)).await;
            report.outcomes.insert(entity.key.clone(), outcome);
        }
    }
}

/// Fetch one adapter in isolation.
///
/// The fetch runs on its own task so a panic surfaces as a failure instead of
/// tearing down the run. Failures produce fallback signals for the keys the
/// adapter covers.
async fn fetch_adapter(
    adapter: Arc<dyn Adapter>,
    ctx: RunContext,
    timeout: Option<Duration>,
    retry_possible: u32,
) -> Fetched {
    let id = adapter.id().to_string();
    let span = info_span!("adapter", adapter = %id);

    async move {
        let mut attempts = 0;
        loop {
            attempts += 1;
            info!(attempt = attempts, "fetching");

            match fetch_isolated(adapter.clone(), ctx.clone(), timeout).await {
                Ok(mut signals) => {
                    for signal in signals.iter_mut() {
                        signal.source.get_or_insert_with(|| id.clone());
                    }

                    let all_possible = !signals.is_empty()
                        && signals.iter().all(|s| s.status == StatusValue::Possible);
                    if all_possible && attempts <= retry_possible {
                        info!(attempt = attempts, "only POSSIBLE signals; retrying");
                        continue;
                    }

                    debug!(signals = signals.len(), "signaled");
                    return Fetched {
                        state: AdapterState::Signaled {
                            signals: signals.len(),
                        },
                        signals,
                        attempts,
                        synthesized: 0,
                    };
                }
                Err(e) => {
                    error!(error = %e, "adapter failed");
                    let fallback = e.fallback_status();
                    let signals: Vec<Signal> = adapter
                        .covers()
                        .into_iter()
                        .map(|key| Signal::asserted(fallback).for_key(key).with_source(&id))
                        .collect();
                    return Fetched {
                        state: AdapterState::Failed {
                            reason: e.to_string(),
                        },
                        synthesized: signals.len(),
                        signals,
                        attempts,
                    };
                }
            }
        }
    }
    .instrument(span)
    .await
}

async fn fetch_isolated(
    adapter: Arc<dyn Adapter>,
    ctx: RunContext,
    timeout: Option<Duration>,
) -> Result<Vec<Signal>, AdapterError> {
    let handle = tokio::spawn(async move { adapter.fetch(&ctx).await }.in_current_span());
    let abort = handle.abort_handle();

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                return Err(AdapterError::Timeout(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(AdapterError::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(AdapterError::Internal(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
