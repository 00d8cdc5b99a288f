use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::latency::{estimate_remaining, LatencyWindow, DEFAULT_LATENCY_WINDOW};
use crate::{ProgressSnapshot, Record, RunSummary, WorkUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Units dispatched.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub parse_failures: usize,
    /// Network requests, retries included.
    pub requests: u64,
}

/// State of one harvest run.
///
/// Owned by a single writer (the engine's orchestration loop); spawned units
/// never touch it directly.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestState {
    ceiling: usize,
    pending: VecDeque<WorkUnit>,
    /// Every unit ever enqueued: pending, in flight or completed.
    known: HashSet<WorkUnit>,
    completed: HashSet<WorkUnit>,
    in_flight: usize,
    records: Vec<Record>,
    counters: Counters,
    latency: LatencyWindow,
    total_units: Option<usize>,
    complete_list_size: Option<u64>,
    stopping: bool,
}

impl HarvestState {
    pub fn new(ceiling: usize) -> Self {
        Self::with_latency_window(ceiling, DEFAULT_LATENCY_WINDOW)
    }

    pub fn with_latency_window(ceiling: usize, window: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            pending: VecDeque::new(),
            known: HashSet::new(),
            completed: HashSet::new(),
            in_flight: 0,
            records: Vec::new(),
            counters: Counters::default(),
            latency: LatencyWindow::new(window),
            total_units: None,
            complete_list_size: None,
            stopping: false,
        }
    }

    /// Pops the next unit to dispatch, or `None` when stopping or idle.
    pub fn next_dispatch(&mut self) -> Option<WorkUnit> {
        if !self.can_dispatch() {
            return None;
        }
        let unit = self.pending.pop_front()?;
        self.in_flight += 1;
        self.counters.attempted += 1;
        Some(unit)
    }

    /// A unit is waiting and the in-flight ceiling leaves room for it.
    pub fn can_dispatch(&self) -> bool {
        !self.stopping && !self.pending.is_empty() && self.in_flight < self.ceiling
    }

    /// Nothing in flight and nothing left that may still be dispatched.
    pub fn is_drained(&self) -> bool {
        self.in_flight == 0 && (self.stopping || self.pending.is_empty())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn is_completed(&self, unit: &WorkUnit) -> bool {
        self.completed.contains(unit)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let completed = self.completed_count();
        let remaining = self.remaining_units();
        let eta = match (remaining, self.latency.average()) {
            (Some(remaining), Some(avg)) => Some(estimate_remaining(avg, remaining, self.ceiling)),
            _ => None,
        };
        ProgressSnapshot {
            completed,
            total: remaining.map(|remaining| completed + remaining),
            in_flight: self.in_flight,
            pending: self.pending.len(),
            failed: self.counters.failed,
            records: self.records.len(),
            eta,
        }
    }

    pub fn summary(&self, elapsed: Duration) -> RunSummary {
        RunSummary {
            attempted: self.counters.attempted,
            succeeded: self.counters.succeeded,
            failed: self.counters.failed,
            parse_failures: self.counters.parse_failures,
            requests: self.counters.requests,
            records: self.records.len(),
            abandoned: if self.stopping { self.pending.len() } else { 0 },
            stopped: self.stopping,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    /// Queues `unit` unless it was seen before in this run.
    pub(crate) fn enqueue(&mut self, unit: WorkUnit) -> bool {
        if !self.known.insert(unit.clone()) {
            return false;
        }
        self.pending.push_back(unit);
        true
    }

    pub(crate) fn set_total_units(&mut self, total: usize) {
        self.total_units = Some(total);
    }

    pub(crate) fn set_complete_list_size(&mut self, size: u64) {
        self.complete_list_size = Some(size);
    }

    pub(crate) fn request_stop(&mut self) {
        self.stopping = true;
    }

    pub(crate) fn finish_unit(&mut self, unit: WorkUnit, attempts: u32, latency: Duration) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.counters.requests += u64::from(attempts);
        self.latency.record(latency);
        self.completed.insert(unit);
    }

    pub(crate) fn merge_records(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub(crate) fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    fn completed_count(&self) -> usize {
        self.counters.succeeded + self.counters.failed
    }

    /// Units still to finish. Exact in page mode; in chained mode derived
    /// from the advertised list size and the records-per-batch seen so far.
    fn remaining_units(&self) -> Option<usize> {
        if let Some(total) = self.total_units {
            return Some(total.saturating_sub(self.completed_count()));
        }
        let size = usize::try_from(self.complete_list_size?).ok()?;
        if self.counters.succeeded == 0 || self.records.is_empty() {
            return None;
        }
        let per_batch = self.records.len().div_ceil(self.counters.succeeded);
        let missing = size.saturating_sub(self.records.len());
        Some(missing.div_ceil(per_batch))
    }
}
