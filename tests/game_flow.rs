use std::cell::RefCell;
use std::rc::Rc;

use sanguo_core::{
    AiConfig, AiDifficulty, Controller, EventKind, GameConfig, GameContext, GameEvent,
    PlayDecision, PlayerSetup, StepOutcome, TurnPhase,
};

const GENERALS: [&str; 5] = ["liubei", "guanyu", "zhangfei", "caocao", "sunquan"];

fn ai(difficulty: AiDifficulty) -> Controller {
    Controller::Ai {
        config: AiConfig::from_difficulty(difficulty).instant(),
    }
}

fn all_ai_table(seed: u64, players: usize) -> GameContext {
    let difficulties = [
        AiDifficulty::Random,
        AiDifficulty::Simple,
        AiDifficulty::Medium,
        AiDifficulty::Hard,
    ];
    let setups: Vec<PlayerSetup> = (0..players)
        .map(|seat| {
            PlayerSetup::new(
                format!("AI{seat}"),
                GENERALS[seat % GENERALS.len()],
                ai(difficulties[seat % difficulties.len()]),
            )
        })
        .collect();
    let mut ctx = GameContext::new(GameConfig::default().with_seed(seed));
    ctx.start_game(&setups).expect("game starts");
    ctx
}

#[test]
fn cards_are_conserved_through_whole_games() {
    for seed in [1_u64, 7, 23] {
        let mut ctx = all_ai_table(seed, 5);
        let total = ctx.initial_card_total();
        assert_eq!(total, 70);
        for _ in 0..3_000 {
            let outcome = ctx.step().expect("step succeeds");
            ctx.check_integrity()
                .unwrap_or_else(|err| panic!("seed {seed}: {err}"));
            assert!(ctx
                .state
                .players
                .iter()
                .all(|player| player.hp <= player.max_hp));
            if matches!(outcome, StepOutcome::GameOver { .. }) {
                break;
            }
        }
    }
}

#[test]
fn turns_rotate_over_alive_seats_only() {
    let mut ctx = all_ai_table(5, 4);
    let starts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&starts);
    ctx.listen(&[EventKind::TurnStarted], move |event, state| {
        if let GameEvent::TurnStarted { player } = event {
            assert!(state.is_alive(*player), "dead player {player} started a turn");
            sink.borrow_mut().push(*player);
        }
    });

    ctx.run_turns(40).expect("turns run");

    let starts = starts.borrow();
    assert!(!starts.is_empty());
    assert_eq!(starts[0], 0);
    for pair in starts.windows(2) {
        assert_ne!(pair[0], pair[1], "a seat played twice in a row");
    }
}

#[test]
fn game_over_leaves_exactly_one_survivor() {
    let mut ctx = all_ai_table(99, 3);
    let outcome = ctx.run_until_input().expect("runs");
    if let StepOutcome::GameOver { winner } = outcome {
        assert_eq!(ctx.state.alive_count(), 1);
        let winner = winner.expect("a survivor wins");
        assert!(ctx.state.is_alive(winner));
        assert!(ctx
            .state
            .event_log
            .iter()
            .any(|event| matches!(event, GameEvent::GameOver { .. })));
        assert!(ctx.step().is_ok());
        assert!(ctx.play(winner, PlayDecision::EndPhase).is_err());
    } else {
        // The unattended step ceiling was reached; the table is still consistent.
        ctx.check_integrity().expect("conserved");
    }
}

#[test]
fn seeded_games_replay_identically() {
    let mut first = all_ai_table(314, 4);
    let mut second = all_ai_table(314, 4);
    first.run_turns(12).expect("first runs");
    second.run_turns(12).expect("second runs");
    assert_eq!(first.state.event_log, second.state.event_log);
    assert_eq!(first.state.players, second.state.players);
}

#[test]
fn human_seat_drives_its_own_play_phase() {
    let setups = vec![
        PlayerSetup::new("human", "zhangfei", Controller::Human),
        PlayerSetup::new("bot", "caocao", ai(AiDifficulty::Simple)),
    ];
    let mut ctx = GameContext::new(GameConfig::default().with_seed(8));
    ctx.start_game(&setups).expect("game starts");

    let outcome = ctx.run_until_input().expect("runs");
    assert_eq!(outcome, StepOutcome::AwaitingInput { player: 0 });
    assert_eq!(ctx.state.phase, TurnPhase::Play);

    // Zhang Fei may use every Slash in hand.
    let slashes: Vec<_> = ctx.state.players[0]
        .hand
        .iter()
        .filter(|card| card.name == sanguo_core::CardName::Slash)
        .map(|card| card.id)
        .collect();
    for card_id in slashes {
        if ctx.state.over {
            break;
        }
        ctx.play(
            0,
            PlayDecision::UseCard {
                card_id,
                target: Some(1),
                as_slash: false,
            },
        )
        .expect("paoxiao lifts the slash cap");
    }

    if !ctx.state.over {
        ctx.play(0, PlayDecision::EndPhase).expect("ends play");
        let outcome = ctx.run_until_input().expect("bot turn runs");
        assert!(matches!(
            outcome,
            StepOutcome::AwaitingInput { player: 0 } | StepOutcome::GameOver { .. }
        ));
    }
    ctx.check_integrity().expect("conserved");
}

#[test]
fn config_json_feeds_the_context() {
    let config = GameConfig::from_json(
        r#"{"initial_hand_size": 2, "draw_count": 3, "seed": 4, "slash_limit": null}"#,
    )
    .expect("config parses");
    let mut ctx = GameContext::new(config);
    ctx.start_game(&[
        PlayerSetup::new("a", "lvbu", Controller::Human),
        PlayerSetup::new("b", "zhaoyun", Controller::Human),
    ])
    .expect("game starts");
    assert!(ctx.state.players.iter().all(|player| player.hand.len() == 2));

    ctx.run_until_input().expect("runs");
    assert_eq!(ctx.state.players[0].hand.len(), 5);
    assert!(ctx.can_use_slash(0));
}
