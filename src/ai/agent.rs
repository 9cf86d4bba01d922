use std::str::FromStr;
use std::time::Duration;

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{CardId, CardName, GameContext, PlayerId, PlayerState};

const LOW_HP_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Random,
    Simple,
    Medium,
    Hard,
}

impl AiDifficulty {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => AiDifficulty::Random,
            1 => AiDifficulty::Simple,
            2 => AiDifficulty::Medium,
            _ => AiDifficulty::Hard,
        }
    }
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "0" => Ok(AiDifficulty::Random),
            "simple" | "easy" | "1" => Ok(AiDifficulty::Simple),
            "medium" | "normal" | "2" => Ok(AiDifficulty::Medium),
            "hard" | "3" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    pub attack_weight: f64,
    pub heal_weight: f64,
    pub save_weight: f64,
    /// Amplitude of the uniform noise added to scored actions.
    pub randomness: f64,
    pub thinking_time: Duration,
    pub action_delay: Duration,
    pub failure_delay: Duration,
    pub max_actions: u32,
    pub max_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        Self {
            difficulty,
            attack_weight: 1.0,
            heal_weight: 1.5,
            save_weight: 0.8,
            randomness: 10.0,
            thinking_time: Duration::from_millis(1500),
            action_delay: Duration::from_millis(500),
            failure_delay: Duration::from_millis(200),
            max_actions: 10,
            max_failures: 3,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Same decisions without pauses, for simulations and tests.
    pub fn instant(mut self) -> Self {
        self.thinking_time = Duration::ZERO;
        self.action_delay = Duration::ZERO;
        self.failure_delay = Duration::ZERO;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Medium)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AiActionKind {
    UsePeach,
    UseSlash,
    UseDuel,
    UseSavageAssault,
    UseArrowBarrage,
    UsePeachGarden,
    EndPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiAction {
    pub kind: AiActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PlayerId>,
}

impl AiAction {
    pub fn new(kind: AiActionKind, card: CardId, target: Option<PlayerId>) -> Self {
        Self {
            kind,
            card: Some(card),
            target,
        }
    }

    pub fn end_phase() -> Self {
        Self {
            kind: AiActionKind::EndPhase,
            card: None,
            target: None,
        }
    }

    pub fn is_attack(&self) -> bool {
        matches!(self.kind, AiActionKind::UseSlash | AiActionKind::UseDuel)
    }

    pub fn is_area(&self) -> bool {
        matches!(
            self.kind,
            AiActionKind::UseSavageAssault | AiActionKind::UseArrowBarrage
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    pub action: AiAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub difficulty: AiDifficulty,
    pub candidates: usize,
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        match config.seed {
            Some(seed) => Self::with_seed(config, seed),
            None => Self {
                config,
                rng: SmallRng::from_entropy(),
            },
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn legal_actions(&self, ctx: &GameContext, player_id: PlayerId) -> Vec<AiAction> {
        let mut actions = Vec::new();
        let Some(player) = ctx.state.get_player(player_id) else {
            return vec![AiAction::end_phase()];
        };
        if !player.alive {
            return vec![AiAction::end_phase()];
        }
        let opponents = ctx.state.opponents_of(player_id);

        if player.is_wounded() {
            if let Some(peach) = player.first_named(CardName::Peach) {
                actions.push(AiAction::new(AiActionKind::UsePeach, peach.id, None));
            }
        }

        if ctx.can_use_slash(player_id) {
            for card in &player.hand {
                let usable = card.is(CardName::Slash)
                    || ctx.skills.can_substitute(player_id, card, CardName::Slash);
                if !usable {
                    continue;
                }
                for target in &opponents {
                    actions.push(AiAction::new(AiActionKind::UseSlash, card.id, Some(*target)));
                }
            }
        }

        if let Some(duel) = player.first_named(CardName::Duel) {
            for target in &opponents {
                actions.push(AiAction::new(AiActionKind::UseDuel, duel.id, Some(*target)));
            }
        }

        if !opponents.is_empty() {
            if let Some(card) = player.first_named(CardName::SavageAssault) {
                actions.push(AiAction::new(AiActionKind::UseSavageAssault, card.id, None));
            }
            if let Some(card) = player.first_named(CardName::ArrowBarrage) {
                actions.push(AiAction::new(AiActionKind::UseArrowBarrage, card.id, None));
            }
        }

        if player.hp_ratio() < LOW_HP_RATIO {
            if let Some(card) = player.first_named(CardName::PeachGarden) {
                actions.push(AiAction::new(AiActionKind::UsePeachGarden, card.id, None));
            }
        }

        actions.push(AiAction::end_phase());
        actions
    }

    pub fn decide(&mut self, ctx: &GameContext, player_id: PlayerId) -> AiDecision {
        let actions = self.legal_actions(ctx, player_id);
        let candidates = actions.len();
        let difficulty = self.config.difficulty;
        let (action, score) = match (difficulty, ctx.state.get_player(player_id)) {
            (_, None) => (AiAction::end_phase(), None),
            (AiDifficulty::Random, Some(_)) => (
                actions
                    .choose(&mut self.rng)
                    .cloned()
                    .unwrap_or_else(AiAction::end_phase),
                None,
            ),
            (AiDifficulty::Simple, Some(player)) => (self.choose_simple(ctx, player, &actions), None),
            (AiDifficulty::Medium | AiDifficulty::Hard, Some(player)) => {
                let (action, score) = self.choose_scored(ctx, player, actions);
                (action, Some(score))
            }
        };
        debug!(
            "ai {player_id} ({difficulty:?}) picks {:?} from {candidates} candidates",
            action.kind
        );
        AiDecision {
            action,
            score,
            difficulty,
            candidates,
        }
    }

    fn choose_simple(&mut self, ctx: &GameContext, player: &PlayerState, actions: &[AiAction]) -> AiAction {
        let peach = actions
            .iter()
            .find(|action| action.kind == AiActionKind::UsePeach);
        if let Some(peach) = peach {
            if player.hp <= 1 {
                return peach.clone();
            }
            if player.hp_ratio() < LOW_HP_RATIO && self.rng.gen_bool(0.7) {
                return peach.clone();
            }
        }

        let weakest = actions
            .iter()
            .filter(|action| action.is_attack())
            .min_by_key(|action| {
                action
                    .target
                    .and_then(|target| ctx.state.get_player(target))
                    .map(|target| target.hp)
                    .unwrap_or(i32::MAX)
            });
        if let Some(attack) = weakest {
            return attack.clone();
        }

        if let Some(area) = actions.iter().find(|action| action.is_area()) {
            if self.rng.gen_bool(0.5) {
                return area.clone();
            }
        }
        AiAction::end_phase()
    }

    fn choose_scored(
        &mut self,
        ctx: &GameContext,
        player: &PlayerState,
        actions: Vec<AiAction>,
    ) -> (AiAction, f64) {
        let mut best = (AiAction::end_phase(), f64::NEG_INFINITY);
        for action in actions {
            let score = self.evaluate(ctx, player, &action) + self.random_noise();
            trace!("ai {} scores {:?} at {score:.1}", player.id, action.kind);
            if score > best.1 {
                best = (action, score);
            }
        }
        best
    }

    /// Heuristic value of an action before noise.
    pub fn evaluate(&self, ctx: &GameContext, player: &PlayerState, action: &AiAction) -> f64 {
        let config = &self.config;
        match action.kind {
            AiActionKind::UsePeach => (1.0 - player.hp_ratio()) * 100.0 * config.heal_weight,
            AiActionKind::UseSlash | AiActionKind::UseDuel => {
                let Some(target) = action.target.and_then(|id| ctx.state.get_player(id)) else {
                    return 0.0;
                };
                let mut score = (1.0 - target.hp_ratio()) * 80.0 * config.attack_weight;
                if target.hp <= 1 {
                    score += 50.0;
                }
                score
            }
            AiActionKind::UseSavageAssault | AiActionKind::UseArrowBarrage => {
                ctx.state.opponents_of(player.id).len() as f64 * 30.0 * config.attack_weight
            }
            AiActionKind::UsePeachGarden => 40.0 * config.heal_weight,
            AiActionKind::EndPhase => player.hand.len() as f64 * 5.0 * config.save_weight,
        }
    }

    fn random_noise(&mut self) -> f64 {
        if self.config.randomness <= 0.0 {
            return 0.0;
        }
        (self.rng.gen::<f64>() - 0.5) * 2.0 * self.config.randomness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fixtures;

    fn agent(difficulty: AiDifficulty) -> AiAgent {
        AiAgent::with_seed(AiConfig::from_difficulty(difficulty), 11)
    }

    #[test]
    fn difficulty_parses_names_and_levels() {
        assert_eq!(AiDifficulty::from_str("Easy"), Ok(AiDifficulty::Simple));
        assert_eq!(AiDifficulty::from_str("2"), Ok(AiDifficulty::Medium));
        assert_eq!(AiDifficulty::from_level(9), AiDifficulty::Hard);
        assert!(AiDifficulty::from_str("godlike").is_err());
    }

    #[test]
    fn legal_actions_cover_each_opponent() {
        let mut ctx = fixtures::context(3);
        fixtures::enter_play_phase(&mut ctx, 0);
        fixtures::give(&mut ctx, 0, CardName::Slash);
        fixtures::give(&mut ctx, 0, CardName::Duel);
        fixtures::give(&mut ctx, 0, CardName::Peach);
        fixtures::give(&mut ctx, 0, CardName::SavageAssault);

        let actions = agent(AiDifficulty::Medium).legal_actions(&ctx, 0);
        let count = |kind: AiActionKind| actions.iter().filter(|a| a.kind == kind).count();
        assert_eq!(count(AiActionKind::UseSlash), 2);
        assert_eq!(count(AiActionKind::UseDuel), 2);
        assert_eq!(count(AiActionKind::UseSavageAssault), 1);
        assert_eq!(count(AiActionKind::UsePeach), 0);
        assert_eq!(actions.last(), Some(&AiAction::end_phase()));
    }

    #[test]
    fn exhausted_slash_cap_hides_slashes() {
        let mut ctx = fixtures::context(2);
        fixtures::enter_play_phase(&mut ctx, 0);
        fixtures::give(&mut ctx, 0, CardName::Slash);
        ctx.state.slashes_used = 1;
        let actions = agent(AiDifficulty::Medium).legal_actions(&ctx, 0);
        assert_eq!(actions, vec![AiAction::end_phase()]);
    }

    #[test]
    fn simple_tier_heals_when_dying_then_hits_weakest() {
        let mut ctx = fixtures::context(3);
        fixtures::enter_play_phase(&mut ctx, 0);
        let peach = fixtures::give(&mut ctx, 0, CardName::Peach);
        fixtures::give(&mut ctx, 0, CardName::Slash);
        ctx.state.players[0].hp = 1;
        ctx.state.players[2].hp = 2;

        let mut simple = agent(AiDifficulty::Simple);
        let decision = simple.decide(&ctx, 0);
        assert_eq!(decision.action.kind, AiActionKind::UsePeach);
        assert_eq!(decision.action.card, Some(peach.id));

        ctx.state.players[0].hp = 4;
        let decision = simple.decide(&ctx, 0);
        assert_eq!(decision.action.kind, AiActionKind::UseSlash);
        assert_eq!(decision.action.target, Some(2));
    }

    #[test]
    fn scored_tier_finishes_a_dying_target() {
        let mut ctx = fixtures::context(2);
        fixtures::enter_play_phase(&mut ctx, 0);
        fixtures::give(&mut ctx, 0, CardName::Slash);
        ctx.state.players[1].hp = 1;

        let mut hard = agent(AiDifficulty::Hard);
        let decision = hard.decide(&ctx, 0);
        // 0.75 * 80 + 50 = 110 against 5 * 0.8 = 4 for ending: noise cannot flip it.
        assert_eq!(decision.action.kind, AiActionKind::UseSlash);
        assert!(decision.score.unwrap_or_default() > 90.0);
    }

    #[test]
    fn evaluate_matches_weights() {
        let mut ctx = fixtures::context(3);
        ctx.state.players[0].hp = 2;
        let agent = agent(AiDifficulty::Medium);
        let player = ctx.state.players[0].clone();

        let heal = agent.evaluate(&ctx, &player, &AiAction::new(AiActionKind::UsePeach, 1, None));
        assert!((heal - 75.0).abs() < 1e-9);
        let area = agent.evaluate(
            &ctx,
            &player,
            &AiAction::new(AiActionKind::UseArrowBarrage, 1, None),
        );
        assert!((area - 60.0).abs() < 1e-9);
        let garden = agent.evaluate(
            &ctx,
            &player,
            &AiAction::new(AiActionKind::UsePeachGarden, 1, None),
        );
        assert!((garden - 60.0).abs() < 1e-9);
    }
}
