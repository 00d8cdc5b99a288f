use crate::{ProgressSnapshot, WorkUnit};

/// Side effects requested by [`crate::update`]; the engine executes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A new unit was discovered and queued for dispatch.
    Enqueued(WorkUnit),
    /// A unit gave up; the run continues without it.
    UnitFailed { unit: WorkUnit, reason: String },
    /// Progress changed and should be reported.
    Progress(ProgressSnapshot),
}
