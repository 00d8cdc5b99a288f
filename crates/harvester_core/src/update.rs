use crate::{Effect, HarvestState, Msg, UnitOutcome, WorkUnit};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match msg {
        Msg::ScopeDiscovered { total_pages } => {
            state.set_total_units(total_pages as usize);
            for page in 1..=total_pages {
                state.enqueue(WorkUnit::Page(page));
            }
            vec![Effect::Progress(state.snapshot())]
        }
        Msg::ChainStarted => {
            if state.enqueue(WorkUnit::Start) {
                vec![Effect::Enqueued(WorkUnit::Start)]
            } else {
                Vec::new()
            }
        }
        Msg::UnitFinished {
            unit,
            outcome,
            attempts,
            latency,
        } => {
            state.finish_unit(unit.clone(), attempts, latency);
            let mut effects = Vec::new();
            match outcome {
                UnitOutcome::Harvested {
                    records,
                    continuation,
                    parse_error,
                    complete_list_size,
                } => {
                    let counters = state.counters_mut();
                    counters.succeeded += 1;
                    if parse_error.is_some() {
                        counters.parse_failures += 1;
                    }
                    state.merge_records(records);
                    if let Some(size) = complete_list_size {
                        state.set_complete_list_size(size);
                    }
                    if let Some(token) = continuation.filter(|t| !t.trim().is_empty()) {
                        let next = WorkUnit::Token(token);
                        if state.enqueue(next.clone()) {
                            effects.push(Effect::Enqueued(next));
                        }
                    }
                }
                UnitOutcome::GaveUp { reason } => {
                    state.counters_mut().failed += 1;
                    effects.push(Effect::UnitFailed { unit, reason });
                }
            }
            effects.push(Effect::Progress(state.snapshot()));
            effects
        }
        Msg::StopRequested => {
            state.request_stop();
            Vec::new()
        }
    };

    (state, effects)
}
