use std::time::Duration;

use crate::{Record, WorkUnit};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Scope discovery found the page count; pages `1..=total_pages` become pending.
    ScopeDiscovered { total_pages: u32 },
    /// A token chain begins; the synthetic start unit becomes pending.
    ChainStarted,
    /// A dispatched unit reached a terminal state.
    UnitFinished {
        unit: WorkUnit,
        outcome: UnitOutcome,
        /// Network requests spent on the unit, retries included.
        attempts: u32,
        latency: Duration,
    },
    /// Stop dispatching; in-flight units still drain.
    StopRequested,
}

/// Terminal status of one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Harvested {
        records: Vec<Record>,
        continuation: Option<String>,
        /// Soft parse failure; the unit still counts as fetched.
        parse_error: Option<String>,
        /// Total list size advertised by the source, when it tells us.
        complete_list_size: Option<u64>,
    },
    GaveUp { reason: String },
}
