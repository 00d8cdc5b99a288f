use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of a run, for progress displays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub completed: usize,
    /// Known in page mode; estimated in chained mode when the source advertises a list size.
    pub total: Option<usize>,
    pub in_flight: usize,
    pub pending: usize,
    pub failed: usize,
    pub records: usize,
    pub eta: Option<Duration>,
}

/// End-of-run totals, reported whether or not individual units failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub parse_failures: usize,
    pub requests: u64,
    pub records: usize,
    /// Units still queued when a stop was requested.
    pub abandoned: usize,
    pub stopped: bool,
    pub elapsed_secs: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={} succeeded={} failed={} parse_failures={} requests={} records={} elapsed={}",
            self.attempted,
            self.succeeded,
            self.failed,
            self.parse_failures,
            self.requests,
            self.records,
            format_duration(Duration::from_secs_f64(self.elapsed_secs.max(0.0)))
        )?;
        if self.stopped {
            write!(f, " (stopped, {} units abandoned)", self.abandoned)?;
        }
        Ok(())
    }
}

/// Formats as `H:MM:SS`, dropping sub-second precision.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
