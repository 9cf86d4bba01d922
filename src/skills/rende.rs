//! 仁德：将手牌交给其他角色，一回合内给出的牌达到阈值时回复1点体力。

use std::any::Any;

use log::info;
use serde::Deserialize;

use super::{Reaction, SkillBehavior, SkillError, SkillInput};
use crate::data::SkillDefinition;
use crate::game::{EventKind, GameContext, GameEvent, GameState, PlayerId, RuleError, TurnPhase};

const DEFAULT_HEAL_THRESHOLD: usize = 2;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RendeConfig {
    heal_threshold: usize,
}

impl Default for RendeConfig {
    fn default() -> Self {
        Self {
            heal_threshold: DEFAULT_HEAL_THRESHOLD,
        }
    }
}

#[derive(Debug)]
pub struct Rende {
    heal_threshold: usize,
    given_this_turn: usize,
    healed_this_turn: bool,
}

impl Rende {
    pub fn new(heal_threshold: usize) -> Self {
        Self {
            heal_threshold: heal_threshold.max(1),
            given_this_turn: 0,
            healed_this_turn: false,
        }
    }

    pub fn from_definition(definition: &SkillDefinition) -> Result<Self, SkillError> {
        let config = match &definition.config {
            Some(value) => RendeConfig::deserialize(value).map_err(|err| {
                SkillError::InvalidConfig {
                    skill_id: definition.id.clone(),
                    reason: err.to_string(),
                }
            })?,
            None => RendeConfig::default(),
        };
        if config.heal_threshold == 0 {
            return Err(SkillError::InvalidConfig {
                skill_id: definition.id.clone(),
                reason: "heal_threshold must be positive".to_string(),
            });
        }
        Ok(Self::new(config.heal_threshold))
    }

    pub fn given_this_turn(&self) -> usize {
        self.given_this_turn
    }

    pub fn healed_this_turn(&self) -> bool {
        self.healed_this_turn
    }
}

impl Default for Rende {
    fn default() -> Self {
        Self::new(DEFAULT_HEAL_THRESHOLD)
    }
}

impl SkillBehavior for Rende {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::TurnStarted]
    }

    fn check_condition(&self, owner: PlayerId, ctx: &GameContext) -> bool {
        ctx.state.current_player_id() == Some(owner)
            && ctx.state.phase == TurnPhase::Play
            && ctx
                .state
                .get_player(owner)
                .map(|player| !player.hand.is_empty())
                .unwrap_or(false)
    }

    fn on_event(&mut self, owner: PlayerId, event: &GameEvent, _state: &GameState) -> Reaction {
        if let GameEvent::TurnStarted { player } = event {
            if *player == owner {
                self.given_this_turn = 0;
                self.healed_this_turn = false;
            }
        }
        Reaction::Ignore
    }

    fn trigger(
        &mut self,
        owner: PlayerId,
        ctx: &mut GameContext,
        input: &SkillInput,
    ) -> Result<(), RuleError> {
        let SkillInput::GiveCards { cards, target } = input else {
            return Err(RuleError::InvalidSelection {
                reason: "rende needs cards and a receiver".to_string(),
            });
        };
        ctx.ensure_other_alive(owner, *target)?;
        ctx.ensure_cards_in_hand(owner, cards)?;

        for card_id in cards {
            let card = ctx.take_from_hand(owner, *card_id)?;
            if let Some(receiver) = ctx.state.get_player_mut(*target) {
                receiver.hand.push(card);
            }
        }
        self.given_this_turn += cards.len();
        info!(
            "player {owner} gives {} card(s) to player {target} ({} this turn)",
            cards.len(),
            self.given_this_turn
        );

        if !self.healed_this_turn && self.given_this_turn >= self.heal_threshold {
            self.healed_this_turn = true;
            ctx.heal(owner, 1);
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        self.given_this_turn = 0;
        self.healed_this_turn = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
