use harvester_core::{update, HarvestState, Msg};

#[test]
fn repeated_chain_start_is_noop() {
    let (state, _) = update(HarvestState::new(1), Msg::ChainStarted);
    let (next, effects) = update(state.clone(), Msg::ChainStarted);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
