//! 奸雄：受到伤害后获得造成伤害的牌。

use std::any::Any;

use log::debug;

use super::{Reaction, SkillBehavior, SkillInput};
use crate::game::{CardId, EventKind, GameContext, GameEvent, GameState, PlayerId, RuleError};

#[derive(Debug, Default)]
pub struct Jianxiong {
    pending: Option<CardId>,
}

impl SkillBehavior for Jianxiong {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::PlayerDamaged]
    }

    fn check_condition(&self, _owner: PlayerId, _ctx: &GameContext) -> bool {
        self.pending.is_some()
    }

    fn on_event(&mut self, owner: PlayerId, event: &GameEvent, state: &GameState) -> Reaction {
        let GameEvent::PlayerDamaged {
            victim,
            card: Some(card),
            ..
        } = event
        else {
            return Reaction::Ignore;
        };
        if *victim != owner {
            return Reaction::Ignore;
        }
        // Another capture may already have taken the card.
        if !state.piles.discard_pile().iter().any(|c| c.id == card.id) {
            debug!("jianxiong: card {} is no longer in the discard pile", card.id);
            return Reaction::Ignore;
        }
        self.pending = Some(card.id);
        Reaction::Trigger(SkillInput::Cards {
            cards: vec![card.id],
        })
    }

    fn trigger(
        &mut self,
        owner: PlayerId,
        ctx: &mut GameContext,
        _input: &SkillInput,
    ) -> Result<(), RuleError> {
        let card_id = self.pending.take().ok_or(RuleError::InvalidSelection {
            reason: "no damage card to capture".to_string(),
        })?;
        let card = ctx
            .state
            .piles
            .take_from_discard(card_id)
            .ok_or(RuleError::InvalidSelection {
                reason: format!("card {card_id} left the discard pile"),
            })?;
        let player = ctx
            .state
            .get_player_mut(owner)
            .ok_or(RuleError::PlayerNotFound { player_id: owner })?;
        debug!("{} captures {}", player.name, card.display_text());
        player.hand.push(card);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.pending = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
