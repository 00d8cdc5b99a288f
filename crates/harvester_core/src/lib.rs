//! Harvester core: pure harvest state machine, records and progress math.
mod effect;
mod latency;
mod msg;
mod record;
mod state;
mod unit;
mod update;
mod view_model;

pub use effect::Effect;
pub use latency::{estimate_remaining, LatencyWindow, DEFAULT_LATENCY_WINDOW};
pub use msg::{Msg, UnitOutcome};
pub use record::{FieldValue, Record};
pub use state::{Counters, HarvestState};
pub use unit::WorkUnit;
pub use update::update;
pub use view_model::{format_duration, ProgressSnapshot, RunSummary};
