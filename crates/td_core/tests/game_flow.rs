//! Game flow tests that drive whole rounds through the public API.

use td_core::error::PlacementError;
use td_core::persistence::MemoryStore;
use td_core::prelude::*;
use td_test_utils::fixtures::{fresh_game, run_until_game_over, run_until_round_end, DEFAULT_SEED};

/// Empty both treasuries and run a round with an idle opponent.
fn play_quiet_round(ctx: &mut SimulationContext) -> TickEvents {
    ctx.economy_mut(Side::Player).resource = 0;
    ctx.economy_mut(Side::Ai).resource = 0;
    ctx.begin_round(Ok(StrategyDirective::default())).unwrap();
    run_until_round_end(ctx, 16, 10).expect("quiet round ends at once")
}

// =============================================================================
// Rounds and grants
// =============================================================================

#[test]
fn test_rounds_advance_with_periodic_grants() {
    let mut ctx = fresh_game(DEFAULT_SEED);

    play_quiet_round(&mut ctx);
    assert_eq!(ctx.round().round, 2);
    assert_eq!(ctx.economy(Side::Ai).structure_count, 2);

    // Reaching round 3 grants a resource structure.
    let events = play_quiet_round(&mut ctx);
    assert_eq!(ctx.round().round, 3);
    assert!(events
        .events
        .iter()
        .any(|e| matches!(e, GameEvent::StructurePlaced { side: Side::Ai, kind: StructureKind::Resource, .. })));
    assert_eq!(ctx.economy(Side::Ai).structure_count, 3);

    // The granted structure pays out from the next round on.
    play_quiet_round(&mut ctx);
    assert_eq!(ctx.economy(Side::Ai).resource, 70);
    assert_eq!(ctx.economy(Side::Player).resource, 50);

    // Reaching round 5 grants population.
    play_quiet_round(&mut ctx);
    assert_eq!(ctx.round().round, 5);
    assert_eq!(ctx.economy(Side::Ai).max_population, 6);
    assert_eq!(ctx.structures().of(Side::Ai, StructureKind::Population).len(), 2);
}

#[test]
fn test_round_end_asks_for_checkpoint() {
    let mut ctx = fresh_game(DEFAULT_SEED);
    let events = play_quiet_round(&mut ctx);
    assert!(events.wants_checkpoint());
    assert!(events.events.contains(&GameEvent::RoundEnded {
        round: 1,
        rewards: PerSide::new(50, 50),
    }));
}

// =============================================================================
// Opponent directives
// =============================================================================

#[test]
fn test_directive_builds_then_spends_the_rest_on_melee() {
    let mut ctx = fresh_game(DEFAULT_SEED);
    let mut advisor = ScriptedAdvisor::new([
        r#"```json
{"strategy_reason": "hold the lane", "structures": {"build": {"turret": 1}}}
```"#,
    ]);
    ctx.start_round_with(&mut advisor).unwrap();

    assert_eq!(advisor.remaining(), 0);
    assert_eq!(ctx.structures().of(Side::Ai, StructureKind::Turret).len(), 1);
    assert_eq!(ctx.economy(Side::Ai).structure_count, 3);
    assert_eq!(ctx.economy(Side::Ai).resource, 0);
    assert!(ctx.structures().any_production());
}

#[test]
fn test_garbled_reply_falls_back() {
    let mut scripted = fresh_game(DEFAULT_SEED);
    scripted
        .start_round_with(&mut ScriptedAdvisor::new(["I would build turrets."]))
        .unwrap();

    let mut unadvised = fresh_game(DEFAULT_SEED);
    unadvised.start_round_with(&mut NoAdvisor).unwrap();

    assert_eq!(scripted.state_hash(), unadvised.state_hash());
}

#[test]
fn test_fallback_wave_takes_the_player_base() {
    let mut ctx = fresh_game(DEFAULT_SEED);
    ctx.economy_mut(Side::Player).resource = 0;
    ctx.start_round_with(&mut NoAdvisor).unwrap();

    assert_eq!(run_until_game_over(&mut ctx, 100, 5000), Some(Side::Ai));
    assert!(ctx.base(Side::Player).is_destroyed());
    assert!(!ctx.base(Side::Ai).is_destroyed());
    assert!(matches!(
        ctx.start_round_with(&mut NoAdvisor),
        Err(GameError::Command(CommandError::GameOver))
    ));
}

// =============================================================================
// Rules and saves
// =============================================================================

#[test]
fn test_rules_from_ron_override_defaults() {
    let rules = GameRules::from_ron_str("(max_structures: 3)", "inline").unwrap();
    assert_eq!(rules.base_round_reward, 50);

    let mut ctx = SimulationContext::new(rules, DEFAULT_SEED);
    ctx.place_structure(Side::Player, StructureKind::Resource, GridPos::new(0, 0))
        .unwrap();
    let err = ctx
        .place_structure(Side::Player, StructureKind::Resource, GridPos::new(1, 0))
        .unwrap_err();
    assert!(matches!(err, GameError::Placement(PlacementError::StructureLimit { max: 3 })));
}

#[test]
fn test_checkpoint_restores_into_new_session() {
    let mut ctx = fresh_game(DEFAULT_SEED);
    let mut store = MemoryStore::new();

    ctx.place_structure(Side::Player, StructureKind::Resource, GridPos::new(0, 0))
        .unwrap();
    for _ in 0..2 {
        let events = play_quiet_round(&mut ctx);
        if events.wants_checkpoint() {
            ctx.persist(&mut store).unwrap();
        }
    }
    assert_eq!(store.writes(), 2);

    let mut resumed = fresh_game(DEFAULT_SEED + 1);
    assert_eq!(resumed.load_from(&store), Ok(true));
    assert_eq!(resumed.round().round, 3);
    for side in Side::ALL {
        assert_eq!(resumed.economy(side), ctx.economy(side));
        assert_eq!(resumed.base(side), ctx.base(side));
    }
    assert_eq!(resumed.structures(), ctx.structures());

    let text = store.load().unwrap().unwrap().to_json().unwrap();
    assert_eq!(SaveData::from_json(&text).unwrap(), ctx.save_data());
}
