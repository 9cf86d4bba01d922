//! 制衡：出牌阶段限一次，弃置任意张牌，然后摸等量的牌。

use std::any::Any;

use log::{debug, info};

use super::{Reaction, SkillBehavior, SkillInput};
use crate::game::{
    CardId, CardName, EventKind, GameContext, GameEvent, GameState, PlayerId, RuleError, TurnPhase,
};

#[derive(Debug, Default)]
pub struct Zhiheng {
    used_this_turn: bool,
}

impl Zhiheng {
    pub fn used_this_turn(&self) -> bool {
        self.used_this_turn
    }

    /// Keeps Slash/Dodge/Peach; falls back to the first card when all are keepers.
    fn auto_selection(ctx: &GameContext, owner: PlayerId) -> Vec<CardId> {
        let Some(player) = ctx.state.get_player(owner) else {
            return Vec::new();
        };
        let chosen: Vec<CardId> = player
            .hand
            .iter()
            .filter(|card| {
                !matches!(card.name, CardName::Slash | CardName::Dodge | CardName::Peach)
            })
            .map(|card| card.id)
            .collect();
        if chosen.is_empty() {
            player.hand.first().map(|card| vec![card.id]).unwrap_or_default()
        } else {
            chosen
        }
    }
}

impl SkillBehavior for Zhiheng {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::TurnStarted]
    }

    fn check_condition(&self, owner: PlayerId, ctx: &GameContext) -> bool {
        if self.used_this_turn {
            debug!("zhiheng already used this turn by player {owner}");
            return false;
        }
        let in_own_play_phase =
            ctx.state.current_player_id() == Some(owner) && ctx.state.phase == TurnPhase::Play;
        let has_cards = ctx
            .state
            .get_player(owner)
            .map(|player| !player.hand.is_empty())
            .unwrap_or(false);
        in_own_play_phase && has_cards
    }

    fn on_event(&mut self, owner: PlayerId, event: &GameEvent, _state: &GameState) -> Reaction {
        if let GameEvent::TurnStarted { player } = event {
            if *player == owner {
                self.used_this_turn = false;
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
        let selection = match input {
            SkillInput::Cards { cards } => cards.clone(),
            SkillInput::Auto => Self::auto_selection(ctx, owner),
            _ => {
                return Err(RuleError::InvalidSelection {
                    reason: "zhiheng needs cards to discard".to_string(),
                })
            }
        };
        ctx.ensure_cards_in_hand(owner, &selection)?;

        for card_id in &selection {
            ctx.discard_from_hand(owner, *card_id)?;
        }
        let drawn = ctx.draw_into_hand(owner, selection.len());
        self.used_this_turn = true;
        info!(
            "player {owner} zhiheng: discarded {}, drew {drawn}",
            selection.len()
        );
        Ok(())
    }

    fn cleanup(&mut self) {
        self.used_this_turn = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
