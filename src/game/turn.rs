use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::card::{CardId, CardName};
use super::context::GameContext;
use super::events::GameEvent;
use super::resolver::RuleError;
use super::state::{Controller, PlayerId, PlayerState, TurnPhase};
use crate::ai::AiAgent;
use crate::data::PlayerSetup;
use crate::skills::SkillInput;

/// Upper bound for [`GameContext::run_until_input`] so all-AI tables cannot spin forever.
const MAX_UNATTENDED_STEPS: usize = 20_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StepOutcome {
    Advanced { player: PlayerId, phase: TurnPhase },
    AwaitingInput { player: PlayerId },
    AwaitingAi { player: PlayerId },
    GameOver {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<PlayerId>,
    },
}

/// 人类玩家在出牌阶段的一次决定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PlayDecision {
    UseCard {
        card_id: CardId,
        #[serde(default)]
        target: Option<PlayerId>,
        /// Play the card as a Slash through a conversion skill.
        #[serde(default)]
        as_slash: bool,
    },
    UseSkill {
        skill_id: String,
        #[serde(default)]
        input: SkillInput,
    },
    EndPhase,
}

impl GameContext {
    pub fn start_game(&mut self, setups: &[PlayerSetup]) -> Result<Vec<GameEvent>, RuleError> {
        if self.state.started {
            return Err(RuleError::GameAlreadyStarted);
        }
        if setups.len() < 2 {
            return Err(RuleError::NotEnoughPlayers {
                count: setups.len(),
            });
        }
        let generals = setups
            .iter()
            .map(|setup| {
                self.generals
                    .get(&setup.general)
                    .cloned()
                    .ok_or_else(|| RuleError::UnknownGeneral {
                        general_id: setup.general.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mark = self.state.event_mark();
        self.state.players.clear();
        for (seat, (setup, general)) in setups.iter().zip(&generals).enumerate() {
            let id = seat as PlayerId;
            let mut player = PlayerState::new(id, setup.name.clone(), general.faction, general.max_hp)
                .with_controller(setup.controller.clone());
            player.general_id = general.id.clone();
            player.attack_range = general.attack_range;
            if let Controller::Ai { config } = &setup.controller {
                let agent = match (config.seed, self.config.seed) {
                    (Some(seed), _) => AiAgent::with_seed(config.clone(), seed),
                    (None, Some(seed)) => AiAgent::with_seed(config.clone(), seed ^ (u64::from(id) + 1)),
                    (None, None) => AiAgent::new(config.clone()),
                };
                self.agents.insert(id, agent);
            }
            self.state.players.push(player);
        }

        let census = self.config.census.clone();
        self.state.piles.initialize(&census, &mut self.rng);

        for (seat, general) in generals.iter().enumerate() {
            for skill in &general.skills {
                if let Err(err) = self.install_skill(seat as PlayerId, skill) {
                    warn!("{} loses skill {}: {err}", general.name, skill.id);
                }
            }
        }

        for seat in 0..self.state.players.len() {
            self.draw_into_hand(seat as PlayerId, self.config.initial_hand_size);
        }
        self.initial_card_total = self.state.card_total();
        self.state.current = 0;
        self.state.phase = TurnPhase::Prepare;
        self.state.turn = 0;
        self.state.slashes_used = 0;
        self.state.started = true;
        info!(
            "game started with {} players and {} cards",
            self.state.players.len(),
            self.initial_card_total
        );
        Ok(self.state.events_since(mark))
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.state.current_player_id()
    }

    fn enter_phase(&mut self, phase: TurnPhase) {
        self.state.phase = phase;
        if let Some(player) = self.state.current_player_id() {
            debug!("player {player} enters {phase:?}");
            self.publish(GameEvent::PhaseChanged { player, phase });
        }
    }

    /// Executes one phase transition, running AI Play phases inline.
    pub fn step(&mut self) -> Result<StepOutcome, RuleError> {
        self.advance(true)
    }

    /// Like [`GameContext::step`], but stops at an AI Play phase so the caller
    /// can drive it with [`crate::ai::AiTurn`].
    pub fn step_deferring_ai(&mut self) -> Result<StepOutcome, RuleError> {
        self.advance(false)
    }

    fn advance(&mut self, run_ai: bool) -> Result<StepOutcome, RuleError> {
        if !self.state.started {
            return Err(RuleError::GameNotStarted);
        }
        if self.check_game_over() {
            return Ok(StepOutcome::GameOver {
                winner: self.state.winner,
            });
        }
        let player = self
            .state
            .current_player_id()
            .ok_or(RuleError::GameNotStarted)?;
        if !self.state.is_alive(player) && self.state.phase != TurnPhase::End {
            debug!("player {player} died during the turn, skipping to End");
            self.enter_phase(TurnPhase::End);
        }

        match self.state.phase {
            TurnPhase::Prepare => {
                self.state.turn += 1;
                self.state.slashes_used = 0;
                info!("turn {} begins for player {player}", self.state.turn);
                self.publish(GameEvent::TurnStarted { player });
                self.enter_phase(TurnPhase::Judge);
            }
            TurnPhase::Judge => self.enter_phase(TurnPhase::Draw),
            TurnPhase::Draw => {
                self.draw_into_hand(player, self.config.draw_count);
                self.enter_phase(TurnPhase::Play);
            }
            TurnPhase::Play => {
                let is_ai = self
                    .state
                    .get_player(player)
                    .map(PlayerState::is_ai)
                    .unwrap_or(false);
                if !is_ai {
                    return Ok(StepOutcome::AwaitingInput { player });
                }
                if !run_ai {
                    return Ok(StepOutcome::AwaitingAi { player });
                }
                self.run_ai_play_phase(player);
                if self.state.phase == TurnPhase::Play && !self.state.over {
                    self.enter_phase(TurnPhase::Discard);
                }
            }
            TurnPhase::Discard => {
                self.discard_down_to_limit(player);
                self.enter_phase(TurnPhase::End);
            }
            TurnPhase::End => {
                self.publish(GameEvent::TurnEnded { player });
                self.rotate();
            }
        }

        if self.state.over {
            return Ok(StepOutcome::GameOver {
                winner: self.state.winner,
            });
        }
        Ok(StepOutcome::Advanced {
            player: self.state.current_player_id().unwrap_or(player),
            phase: self.state.phase,
        })
    }

    fn discard_down_to_limit(&mut self, player: PlayerId) {
        loop {
            let Some(state) = self.state.get_player(player) else {
                return;
            };
            if state.hand.len() <= state.hand_limit() {
                return;
            }
            let Some(card_id) = state.hand.first().map(|card| card.id) else {
                return;
            };
            if self.discard_from_hand(player, card_id).is_err() {
                return;
            }
        }
    }

    fn rotate(&mut self) {
        match self.state.next_alive_seat(self.state.current) {
            Some(seat) => {
                self.state.current = seat;
                self.state.slashes_used = 0;
                self.state.phase = TurnPhase::Prepare;
                if self.state.alive_count() <= 1 {
                    self.check_game_over();
                }
            }
            None => {
                self.check_game_over();
            }
        }
    }

    /// Steps until a human Play phase or the end of the game.
    pub fn run_until_input(&mut self) -> Result<StepOutcome, RuleError> {
        let mut outcome = self.step()?;
        for _ in 0..MAX_UNATTENDED_STEPS {
            if matches!(
                outcome,
                StepOutcome::AwaitingInput { .. } | StepOutcome::GameOver { .. }
            ) {
                return Ok(outcome);
            }
            outcome = self.step()?;
        }
        warn!("run_until_input stopped after {MAX_UNATTENDED_STEPS} steps");
        Ok(outcome)
    }

    /// Plays `turns` full turns (or until input is needed / the game ends).
    pub fn run_turns(&mut self, turns: u32) -> Result<StepOutcome, RuleError> {
        let target = self.state.turn + turns;
        loop {
            let outcome = self.step()?;
            match outcome {
                StepOutcome::AwaitingInput { .. } | StepOutcome::GameOver { .. } => {
                    return Ok(outcome)
                }
                _ if self.state.turn >= target && self.state.phase == TurnPhase::Prepare => {
                    return Ok(outcome)
                }
                _ => {}
            }
        }
    }

    pub fn end_play_phase(&mut self, player: PlayerId) -> Result<(), RuleError> {
        self.ensure_turn_play_phase(player)?;
        self.enter_phase(TurnPhase::Discard);
        Ok(())
    }

    fn ensure_turn_play_phase(&self, player: PlayerId) -> Result<(), RuleError> {
        self.ensure_running()?;
        if self.state.current_player_id() != Some(player) {
            return Err(RuleError::NotPlayerTurn { player_id: player });
        }
        if self.state.phase != TurnPhase::Play {
            return Err(RuleError::InvalidPhase {
                expected: TurnPhase::Play,
                actual: self.state.phase,
            });
        }
        Ok(())
    }

    /// Applies a human decision during the player's own Play phase.
    pub fn play(&mut self, player: PlayerId, decision: PlayDecision) -> Result<Vec<GameEvent>, RuleError> {
        self.ensure_turn_play_phase(player)?;
        match decision {
            PlayDecision::EndPhase => {
                let mark = self.state.event_mark();
                self.end_play_phase(player)?;
                Ok(self.state.events_since(mark))
            }
            PlayDecision::UseSkill { skill_id, input } => self.trigger_skill(player, &skill_id, input),
            PlayDecision::UseCard {
                card_id,
                target,
                as_slash,
            } => {
                let name = self
                    .state
                    .get_player(player)
                    .and_then(|p| p.hand_card(card_id))
                    .map(|card| card.name)
                    .ok_or(RuleError::CardNotInHand {
                        player_id: player,
                        card_id,
                    })?;
                let needs_target = || {
                    target.ok_or_else(|| RuleError::InvalidSelection {
                        reason: format!("{name} needs a target"),
                    })
                };
                if as_slash {
                    return self.use_slash(player, needs_target()?, card_id);
                }
                match name {
                    CardName::Slash => self.use_slash(player, needs_target()?, card_id),
                    CardName::Peach => self.use_peach(player, card_id),
                    CardName::Duel => self.use_duel(player, needs_target()?, card_id),
                    CardName::SavageAssault => self.use_savage_assault(player, card_id),
                    CardName::ArrowBarrage => self.use_arrow_barrage(player, card_id),
                    CardName::PeachGarden => self.use_peach_garden(player, card_id),
                    CardName::Snatch => self.use_snatch(player, needs_target()?, card_id),
                    CardName::Dismantlement => {
                        self.use_dismantlement(player, needs_target()?, card_id)
                    }
                    CardName::Harvest => self.use_harvest(player, card_id),
                    CardName::Dodge
                    | CardName::Nullification
                    | CardName::Weapon
                    | CardName::Armor => Err(RuleError::InvalidSelection {
                        reason: format!("{name} cannot be used actively"),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiConfig, AiDifficulty};
    use crate::config::GameConfig;
    use crate::game::EventKind;

    fn setups(ai_seats: &[usize]) -> Vec<PlayerSetup> {
        ["caocao", "sunquan", "guanyu"]
            .iter()
            .enumerate()
            .map(|(seat, general)| {
                let controller = if ai_seats.contains(&seat) {
                    Controller::Ai {
                        config: AiConfig::from_difficulty(AiDifficulty::Medium).instant(),
                    }
                } else {
                    Controller::Human
                };
                PlayerSetup::new(format!("P{seat}"), *general, controller)
            })
            .collect()
    }

    fn started(ai_seats: &[usize]) -> GameContext {
        let mut ctx = GameContext::new(GameConfig::default().with_seed(42));
        ctx.start_game(&setups(ai_seats)).expect("game starts");
        ctx
    }

    #[test]
    fn start_deals_hands_and_installs_skills() {
        let ctx = started(&[]);
        assert_eq!(ctx.state.players.len(), 3);
        assert!(ctx.state.players.iter().all(|p| p.hand.len() == 4));
        assert_eq!(ctx.state.piles.draw_count(), 70 - 12);
        assert_eq!(ctx.initial_card_total(), 70);
        assert_eq!(ctx.state.players[0].skills.len(), 1);
        assert_eq!(ctx.state.players[1].general_id, "sunquan");
        assert_eq!(ctx.current_player(), Some(0));
        assert_eq!(ctx.state.phase, TurnPhase::Prepare);
    }

    #[test]
    fn start_rejects_bad_setups() {
        let mut ctx = GameContext::new(GameConfig::default().with_seed(1));
        let one = vec![PlayerSetup::new("solo", "caocao", Controller::Human)];
        assert!(matches!(
            ctx.start_game(&one),
            Err(RuleError::NotEnoughPlayers { count: 1 })
        ));
        let unknown = vec![
            PlayerSetup::new("a", "caocao", Controller::Human),
            PlayerSetup::new("b", "nobody", Controller::Human),
        ];
        assert!(matches!(
            ctx.start_game(&unknown),
            Err(RuleError::UnknownGeneral { .. })
        ));
        assert!(!ctx.state.started);
        assert!(ctx.state.players.is_empty());
    }

    #[test]
    fn phases_run_in_order_and_wait_for_humans() {
        let mut ctx = started(&[]);
        let outcome = ctx.run_until_input().expect("runs");
        assert_eq!(outcome, StepOutcome::AwaitingInput { player: 0 });
        assert_eq!(ctx.state.turn, 1);
        assert_eq!(ctx.state.players[0].hand.len(), 6);

        let phases: Vec<TurnPhase> = ctx
            .state
            .event_log
            .iter()
            .filter_map(|event| match event {
                GameEvent::PhaseChanged { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![TurnPhase::Judge, TurnPhase::Draw, TurnPhase::Play]);
        assert!(matches!(
            ctx.state.event_log.iter().find(|e| e.kind() == EventKind::TurnStarted),
            Some(GameEvent::TurnStarted { player: 0 })
        ));
    }

    #[test]
    fn discard_phase_trims_to_hp_and_rotates() {
        let mut ctx = started(&[]);
        ctx.run_until_input().expect("runs");
        ctx.state.players[0].hp = 2;
        ctx.play(0, PlayDecision::EndPhase).expect("ends play");

        ctx.step().expect("discard");
        assert_eq!(ctx.state.players[0].hand.len(), 2);
        assert_eq!(ctx.state.phase, TurnPhase::End);

        ctx.step().expect("end");
        assert_eq!(ctx.current_player(), Some(1));
        assert_eq!(ctx.state.phase, TurnPhase::Prepare);
        ctx.check_integrity().expect("conserved");
    }

    #[test]
    fn rotation_skips_dead_seats() {
        let mut ctx = started(&[]);
        ctx.run_until_input().expect("runs");
        ctx.kill(1, Some(0));
        ctx.play(0, PlayDecision::EndPhase).expect("ends play");
        ctx.step().expect("discard");
        ctx.step().expect("end");
        assert_eq!(ctx.current_player(), Some(2));
    }

    #[test]
    fn play_checks_turn_and_phase() {
        let mut ctx = started(&[]);
        assert!(matches!(
            ctx.play(0, PlayDecision::EndPhase),
            Err(RuleError::InvalidPhase { .. })
        ));
        ctx.run_until_input().expect("runs");
        assert!(matches!(
            ctx.play(1, PlayDecision::EndPhase),
            Err(RuleError::NotPlayerTurn { player_id: 1 })
        ));
        let dodge_or_missing = ctx.play(
            0,
            PlayDecision::UseCard {
                card_id: 9_999,
                target: None,
                as_slash: false,
            },
        );
        assert!(matches!(dodge_or_missing, Err(RuleError::CardNotInHand { .. })));
    }

    #[test]
    fn ai_seats_play_without_input() {
        let mut ctx = started(&[1, 2]);
        ctx.run_until_input().expect("runs");
        ctx.play(0, PlayDecision::EndPhase).expect("ends play");
        let outcome = ctx.run_until_input().expect("ai turns run");
        match outcome {
            StepOutcome::AwaitingInput { player } => {
                assert_eq!(player, 0);
                assert!(ctx.state.turn >= 3);
            }
            StepOutcome::GameOver { .. } => assert!(ctx.state.over),
            other => panic!("unexpected outcome {other:?}"),
        }
        ctx.check_integrity().expect("conserved");
    }

    #[test]
    fn deferred_stepping_stops_at_ai_play() {
        let mut ctx = started(&[0]);
        let mut outcome = ctx.step_deferring_ai().expect("step");
        while matches!(outcome, StepOutcome::Advanced { .. }) {
            outcome = ctx.step_deferring_ai().expect("step");
        }
        assert_eq!(outcome, StepOutcome::AwaitingAi { player: 0 });
        assert_eq!(ctx.state.phase, TurnPhase::Play);
    }
}
