use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::{
    update, Effect, HarvestState, Msg, Record, RunSummary, UnitOutcome, WorkUnit,
    DEFAULT_LATENCY_WINDOW,
};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::progress::NullProgressSink;
use crate::scope::discover_scope;
use crate::{
    EngineEvent, Extraction, Extractor, FailureKind, FetchError, Fetcher, GivingUp,
    ProgressSink, RetryPolicy, ScopeProbe, Sleeper, TokioSleeper,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Maximum units in flight at once.
    pub concurrency: usize,
    /// Pause after each dispatch cycle, once all finished units are consumed.
    pub dispatch_pause: Duration,
    /// Latency samples kept for the ETA.
    pub latency_window: usize,
}

impl EngineSettings {
    /// Finite mode: every page is known up front, so there is no pause between cycles.
    pub fn for_pages() -> Self {
        Self {
            concurrency: 32,
            dispatch_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn for_chain() -> Self {
        Self::default()
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            dispatch_pause: Duration::from_millis(50),
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("could not determine scope: {0}")]
    ScopeDiscovery(#[source] GivingUp),
}

#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub records: Vec<Record>,
    pub summary: RunSummary,
    /// Units that exhausted their attempts, with the last error seen.
    pub failures: Vec<GivingUp>,
}

/// Drives fetch + retry + extract across a finite page range or a token chain.
pub struct HarvestEngine {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    progress: Arc<dyn ProgressSink>,
    settings: EngineSettings,
    stop: CancellationToken,
}

impl HarvestEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            fetcher,
            extractor,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            progress: Arc::new(NullProgressSink),
            settings: EngineSettings::default(),
            stop: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use an externally owned stop signal (e.g. tied to ctrl-c).
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Finite mode: discover the page count from page 1, then harvest every page.
    pub async fn harvest_pages(&self, probe: &dyn ScopeProbe) -> Result<HarvestReport, HarvestError> {
        let started = Instant::now();
        let scope = discover_scope(
            self.fetcher.as_ref(),
            probe,
            &self.retry,
            self.sleeper.as_ref(),
        )
        .await
        .map_err(|giving_up| {
            engine_error!("Scope discovery failed: {}", giving_up);
            HarvestError::ScopeDiscovery(giving_up)
        })?;
        self.progress.emit(EngineEvent::ScopeDiscovered {
            total_pages: scope.total_pages,
        });

        let msg = Msg::ScopeDiscovered {
            total_pages: scope.total_pages,
        };
        Ok(self.run(msg, started).await)
    }

    /// Chained mode: follow continuation tokens until a batch yields none.
    pub async fn harvest_chain(&self) -> Result<HarvestReport, HarvestError> {
        Ok(self.run(Msg::ChainStarted, Instant::now()).await)
    }

    async fn run(&self, seed: Msg, started: Instant) -> HarvestReport {
        let state = HarvestState::with_latency_window(
            self.settings.concurrency,
            self.settings.latency_window,
        );
        let mut failures = Vec::new();
        let mut state = self.step(state, seed);

        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut in_flight: JoinSet<UnitReport> = JoinSet::new();
        let mut spawned: HashMap<Id, WorkUnit> = HashMap::new();

        loop {
            if self.stop.is_cancelled() && !state.is_stopping() {
                engine_warn!(
                    "Stop requested; draining {} in-flight unit(s)",
                    state.in_flight()
                );
                state = self.step(state, Msg::StopRequested);
            }

            while state.can_dispatch() {
                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    break;
                };
                let Some(unit) = state.next_dispatch() else {
                    break;
                };
                engine_debug!("Dispatching {}", unit);
                let task = UnitTask {
                    fetcher: self.fetcher.clone(),
                    extractor: self.extractor.clone(),
                    retry: self.retry.clone(),
                    sleeper: self.sleeper.clone(),
                };
                let handle = in_flight.spawn({
                    let unit = unit.clone();
                    async move {
                        let report = task.run(unit).await;
                        drop(permit);
                        report
                    }
                });
                spawned.insert(handle.id(), unit);
            }

            if state.is_drained() {
                break;
            }

            let first = tokio::select! {
                joined = in_flight.join_next_with_id() => joined,
                _ = self.stop.cancelled(), if !state.is_stopping() => continue,
            };
            let Some(first) = first else {
                engine_error!(
                    "No unit in flight but {} still counted; ending run",
                    state.in_flight()
                );
                break;
            };

            // One cycle consumes every unit that has already finished.
            let mut joined = Some(first);
            while let Some(result) = joined {
                if let Some(msg) = joined_msg(result, &mut spawned, &mut failures) {
                    state = self.step(state, msg);
                }
                joined = in_flight.try_join_next_with_id();
            }

            if !self.settings.dispatch_pause.is_zero() && !state.is_drained() {
                tokio::time::sleep(self.settings.dispatch_pause).await;
            }
        }

        let summary = state.summary(started.elapsed());
        engine_info!("Harvest finished: {}", summary);
        self.progress.emit(EngineEvent::Finished(summary.clone()));
        HarvestReport {
            records: state.into_records(),
            summary,
            failures,
        }
    }

    /// Applies one message and forwards the resulting effects to the progress sink.
    fn step(&self, state: HarvestState, msg: Msg) -> HarvestState {
        let (state, effects) = update(state, msg);
        for effect in effects {
            match effect {
                Effect::Enqueued(unit) => {
                    engine_debug!("Queued {}", unit);
                    self.progress.emit(EngineEvent::Enqueued(unit));
                }
                Effect::UnitFailed { unit, reason } => {
                    engine_warn!("Giving up on {}: {}", unit, reason);
                    self.progress.emit(EngineEvent::UnitFailed { unit, reason });
                }
                Effect::Progress(snapshot) => {
                    self.progress.emit(EngineEvent::Progress(snapshot));
                }
            }
        }
        state
    }
}

/// Turns a joined unit task into its completion message; a panicked or
/// cancelled task becomes a failed unit.
fn joined_msg(
    joined: Result<(Id, UnitReport), JoinError>,
    spawned: &mut HashMap<Id, WorkUnit>,
    failures: &mut Vec<GivingUp>,
) -> Option<Msg> {
    match joined {
        Ok((id, report)) => {
            spawned.remove(&id);
            Some(report.into_msg(failures))
        }
        Err(join_error) => {
            let Some(unit) = spawned.remove(&join_error.id()) else {
                engine_error!("Unknown unit task failed: {}", join_error);
                return None;
            };
            engine_error!("{} task aborted: {}", unit, join_error);
            let reason = join_error.to_string();
            failures.push(GivingUp {
                unit: unit.clone(),
                attempts: 0,
                last_error: FetchError::new(FailureKind::Internal, reason.clone()),
            });
            Some(Msg::UnitFinished {
                unit,
                outcome: UnitOutcome::GaveUp { reason },
                attempts: 0,
                latency: Duration::ZERO,
            })
        }
    }
}

/// Everything one spawned unit needs; no access to the run state.
struct UnitTask {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl UnitTask {
    async fn run(self, unit: WorkUnit) -> UnitReport {
        let started = Instant::now();
        let result = self
            .retry
            .execute(&unit, self.fetcher.as_ref(), self.sleeper.as_ref())
            .await
            .map(|fetched| (self.extractor.extract(&fetched.payload), fetched.attempts));
        UnitReport {
            unit,
            result,
            latency: started.elapsed(),
        }
    }
}

struct UnitReport {
    unit: WorkUnit,
    result: Result<(Extraction, u32), GivingUp>,
    latency: Duration,
}

impl UnitReport {
    fn into_msg(self, failures: &mut Vec<GivingUp>) -> Msg {
        let (outcome, attempts) = match self.result {
            Ok((extraction, attempts)) => (
                UnitOutcome::Harvested {
                    records: extraction.records,
                    continuation: extraction.continuation,
                    parse_error: extraction.parse_error,
                    complete_list_size: extraction.complete_list_size,
                },
                attempts,
            ),
            Err(giving_up) => {
                let attempts = giving_up.attempts;
                let reason = giving_up.last_error.to_string();
                failures.push(giving_up);
                (UnitOutcome::GaveUp { reason }, attempts)
            }
        };
        Msg::UnitFinished {
            unit: self.unit,
            outcome,
            attempts,
            latency: self.latency,
        }
    }
}
