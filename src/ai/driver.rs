//! AI 出牌阶段的分步驱动。每一步返回建议的停顿时间，由调用方决定如何等待。

use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use super::agent::{AiAction, AiActionKind, AiDecision};
use crate::game::{CardName, GameContext, GameEvent, PlayerId, RuleError, TurnPhase};
use crate::skills::{SkillInput, Zhiheng};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AiStep {
    Thinking {
        pause: Duration,
    },
    Acted {
        action: AiAction,
        pause: Duration,
    },
    Failed {
        action: AiAction,
        error: RuleError,
        pause: Duration,
    },
    Finished {
        actions: u32,
    },
}

impl AiStep {
    pub fn pause(&self) -> Duration {
        match self {
            AiStep::Thinking { pause }
            | AiStep::Acted { pause, .. }
            | AiStep::Failed { pause, .. } => *pause,
            AiStep::Finished { .. } => Duration::ZERO,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, AiStep::Finished { .. })
    }
}

/// One AI Play phase. Ends on EndPhase, the action ceiling, or consecutive failures.
#[derive(Debug, Clone)]
pub struct AiTurn {
    player: PlayerId,
    actions: u32,
    failures: u32,
    started: bool,
    finished: bool,
}

impl AiTurn {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            actions: 0,
            failures: 0,
            started: false,
            finished: false,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn step(&mut self, ctx: &mut GameContext) -> AiStep {
        if self.finished {
            return AiStep::Finished {
                actions: self.actions,
            };
        }
        let Some(config) = ctx.agents.get(&self.player).map(|agent| agent.config().clone()) else {
            warn!("player {} has no ai agent", self.player);
            return self.finish(ctx);
        };
        if !self.started {
            self.started = true;
            ctx.ai_use_skills(self.player);
            return AiStep::Thinking {
                pause: config.thinking_time,
            };
        }

        let still_playing = !ctx.state.over
            && ctx.state.is_alive(self.player)
            && ctx.state.current_player_id() == Some(self.player)
            && ctx.state.phase == TurnPhase::Play;
        if !still_playing
            || self.actions >= config.max_actions
            || self.failures >= config.max_failures
        {
            return self.finish(ctx);
        }

        let Some(decision) = ctx.ai_decide(self.player) else {
            return self.finish(ctx);
        };
        let action = decision.action;
        if action.kind == AiActionKind::EndPhase {
            return self.finish(ctx);
        }

        self.actions += 1;
        match ctx.execute_ai_action(self.player, &action) {
            Ok(_) => {
                self.failures = 0;
                info!("ai {} executed {:?}", self.player, action.kind);
                AiStep::Acted {
                    action,
                    pause: config.action_delay,
                }
            }
            Err(error) => {
                self.failures += 1;
                debug!("ai {} failed {:?}: {error}", self.player, action.kind);
                AiStep::Failed {
                    action,
                    error,
                    pause: config.failure_delay,
                }
            }
        }
    }

    fn finish(&mut self, ctx: &mut GameContext) -> AiStep {
        self.finished = true;
        if !ctx.state.over
            && ctx.state.current_player_id() == Some(self.player)
            && ctx.state.phase == TurnPhase::Play
        {
            if let Err(err) = ctx.end_play_phase(self.player) {
                warn!("ai {} could not end play phase: {err}", self.player);
            }
        }
        info!("ai {} ends play after {} action(s)", self.player, self.actions);
        AiStep::Finished {
            actions: self.actions,
        }
    }
}

impl GameContext {
    pub fn ai_decide(&mut self, player: PlayerId) -> Option<AiDecision> {
        let mut agent = self.agents.remove(&player)?;
        let decision = agent.decide(self, player);
        self.agents.insert(player, agent);
        Some(decision)
    }

    pub fn execute_ai_action(
        &mut self,
        player: PlayerId,
        action: &AiAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if action.kind == AiActionKind::EndPhase {
            self.end_play_phase(player)?;
            return Ok(Vec::new());
        }
        let card = action.card.ok_or_else(|| RuleError::InvalidSelection {
            reason: format!("{:?} needs a card", action.kind),
        })?;
        let target = || {
            action.target.ok_or_else(|| RuleError::InvalidSelection {
                reason: format!("{:?} needs a target", action.kind),
            })
        };
        match action.kind {
            AiActionKind::UsePeach => self.use_peach(player, card),
            AiActionKind::UseSlash => self.use_slash(player, target()?, card),
            AiActionKind::UseDuel => self.use_duel(player, target()?, card),
            AiActionKind::UseSavageAssault => self.use_savage_assault(player, card),
            AiActionKind::UseArrowBarrage => self.use_arrow_barrage(player, card),
            AiActionKind::UsePeachGarden => self.use_peach_garden(player, card),
            AiActionKind::EndPhase => Ok(Vec::new()),
        }
    }

    /// Active skills an AI owner fires on its own at the start of Play.
    fn ai_use_skills(&mut self, player: PlayerId) {
        let zhiheng = self
            .skills
            .owned_by(player)
            .find(|instance| instance.behavior_as::<Zhiheng>().is_some())
            .map(|instance| instance.id().to_string());
        let Some(skill_id) = zhiheng else {
            return;
        };
        let has_spare_cards = self
            .state
            .get_player(player)
            .map(|p| {
                p.hand.iter().any(|card| {
                    !matches!(card.name, CardName::Slash | CardName::Dodge | CardName::Peach)
                })
            })
            .unwrap_or(false);
        if has_spare_cards {
            if let Err(err) = self.trigger_skill(player, &skill_id, SkillInput::Auto) {
                debug!("ai {player} skipped {skill_id}: {err}");
            }
        }
    }

    /// Runs a whole AI Play phase without pauses.
    pub fn run_ai_play_phase(&mut self, player: PlayerId) -> u32 {
        let mut turn = AiTurn::new(player);
        loop {
            if let AiStep::Finished { actions } = turn.step(self) {
                return actions;
            }
        }
    }
}
