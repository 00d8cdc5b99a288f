use std::sync::Once;
use std::time::Duration;

use harvester_core::{
    update, Effect, FieldValue, HarvestState, Msg, Record, UnitOutcome, WorkUnit,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn record(id: &str) -> Record {
    [("identifier", FieldValue::Single(id.to_string()))]
        .into_iter()
        .collect()
}

fn harvested(records: Vec<Record>, continuation: Option<&str>) -> UnitOutcome {
    UnitOutcome::Harvested {
        records,
        continuation: continuation.map(str::to_string),
        parse_error: None,
        complete_list_size: None,
    }
}

fn finish(state: HarvestState, unit: WorkUnit, outcome: UnitOutcome) -> (HarvestState, Vec<Effect>) {
    update(
        state,
        Msg::UnitFinished {
            unit,
            outcome,
            attempts: 1,
            latency: Duration::from_millis(100),
        },
    )
}

#[test]
fn scope_discovery_queues_every_page_once() {
    init_logging();
    let (mut state, effects) = update(HarvestState::new(4), Msg::ScopeDiscovered { total_pages: 3 });

    assert_eq!(state.pending_len(), 3);
    assert!(matches!(effects.as_slice(), [Effect::Progress(p)] if p.total == Some(3)));

    let dispatched: Vec<_> = std::iter::from_fn(|| state.next_dispatch()).collect();
    assert_eq!(
        dispatched,
        vec![WorkUnit::Page(1), WorkUnit::Page(2), WorkUnit::Page(3)]
    );
    assert_eq!(state.in_flight(), 3);
    assert_eq!(state.counters().attempted, 3);
}

#[test]
fn finished_unit_merges_records_and_counts() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(2), Msg::ScopeDiscovered { total_pages: 2 });
    let unit = state.next_dispatch().unwrap();

    let (state, effects) = finish(state, unit.clone(), harvested(vec![record("a"), record("b")], None));

    assert_eq!(state.records().len(), 2);
    assert_eq!(state.counters().succeeded, 1);
    assert_eq!(state.counters().requests, 1);
    assert!(state.is_completed(&unit));
    let Some(Effect::Progress(progress)) = effects.last() else {
        panic!("expected progress effect, got {effects:?}");
    };
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.total, Some(2));
    assert_eq!(progress.records, 2);
    assert_eq!(progress.eta, Some(Duration::from_millis(100)));
}

#[test]
fn continuation_is_enqueued_once() {
    init_logging();
    let (mut state, effects) = update(HarvestState::new(3), Msg::ChainStarted);
    assert_eq!(effects, vec![Effect::Enqueued(WorkUnit::Start)]);
    let start = state.next_dispatch().unwrap();

    let (mut state, effects) = finish(state, start, harvested(vec![record("1")], Some("tok-1")));
    assert!(effects.contains(&Effect::Enqueued(WorkUnit::Token("tok-1".into()))));
    let token = state.next_dispatch().unwrap();
    assert_eq!(token, WorkUnit::Token("tok-1".into()));

    // A source replaying an already seen token must not cause a refetch.
    let (state, effects) = finish(state, token, harvested(vec![record("2")], Some("tok-1")));
    assert!(!effects.iter().any(|e| matches!(e, Effect::Enqueued(_))));
    assert!(state.is_drained());
    assert_eq!(state.records().len(), 2);
}

#[test]
fn whitespace_token_ends_chain() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(1), Msg::ChainStarted);
    let start = state.next_dispatch().unwrap();
    let (state, _) = finish(state, start, harvested(vec![], Some("   ")));
    assert_eq!(state.pending_len(), 0);
    assert!(state.is_drained());
}

#[test]
fn given_up_unit_is_counted_and_reported() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(2), Msg::ScopeDiscovered { total_pages: 1 });
    let unit = state.next_dispatch().unwrap();
    let (state, effects) = finish(
        state,
        unit.clone(),
        UnitOutcome::GaveUp {
            reason: "timeout".into(),
        },
    );

    assert_eq!(state.counters().failed, 1);
    assert_eq!(state.counters().succeeded, 0);
    assert_eq!(
        effects[0],
        Effect::UnitFailed {
            unit,
            reason: "timeout".into()
        }
    );
}

#[test]
fn parse_error_counts_as_fetched_with_soft_failure() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(1), Msg::ChainStarted);
    let start = state.next_dispatch().unwrap();
    let (state, _) = finish(
        state,
        start,
        UnitOutcome::Harvested {
            records: Vec::new(),
            continuation: None,
            parse_error: Some("mismatched tag".into()),
            complete_list_size: None,
        },
    );
    assert_eq!(state.counters().succeeded, 1);
    assert_eq!(state.counters().parse_failures, 1);
}

#[test]
fn stop_blocks_dispatch_and_reports_abandoned_units() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(1), Msg::ScopeDiscovered { total_pages: 5 });
    let first = state.next_dispatch().unwrap();
    let (mut state, _) = update(state, Msg::StopRequested);

    assert_eq!(state.next_dispatch(), None);
    assert!(!state.is_drained());

    let (state, _) = finish(state, first, harvested(vec![record("x")], None));
    assert!(state.is_drained());

    let summary = state.summary(Duration::from_secs(2));
    assert!(summary.stopped);
    assert_eq!(summary.abandoned, 4);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.records, 1);
}

#[test]
fn advertised_list_size_gives_chained_estimate() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(2), Msg::ChainStarted);
    let start = state.next_dispatch().unwrap();
    let (_, effects) = finish(
        state,
        start,
        UnitOutcome::Harvested {
            records: vec![record("1"), record("2")],
            continuation: Some("next".into()),
            parse_error: None,
            complete_list_size: Some(10),
        },
    );

    let Some(Effect::Progress(progress)) = effects.last() else {
        panic!("expected progress effect");
    };
    // 8 records left at 2 per batch.
    assert_eq!(progress.total, Some(5));
    assert_eq!(progress.eta, Some(Duration::from_millis(200)));
}

#[test]
fn dispatch_respects_the_ceiling() {
    init_logging();
    let (mut state, _) = update(HarvestState::new(2), Msg::ScopeDiscovered { total_pages: 5 });

    let first = state.next_dispatch().unwrap();
    state.next_dispatch().unwrap();
    assert!(!state.can_dispatch());
    assert_eq!(state.next_dispatch(), None);
    assert_eq!(state.pending_len(), 3);

    let (mut state, _) = finish(state, first, harvested(Vec::new(), None));
    assert_eq!(state.next_dispatch(), Some(WorkUnit::Page(3)));
}
