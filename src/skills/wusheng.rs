//! 武圣：红色牌可以当杀使用或打出。

use std::any::Any;

use super::{SkillBehavior, SkillInput};
use crate::game::{Card, CardName, GameContext, PlayerId, RuleError};

#[derive(Debug, Default)]
pub struct Wusheng;

impl SkillBehavior for Wusheng {
    fn check_condition(&self, _owner: PlayerId, _ctx: &GameContext) -> bool {
        false
    }

    fn trigger(
        &mut self,
        _owner: PlayerId,
        _ctx: &mut GameContext,
        _input: &SkillInput,
    ) -> Result<(), RuleError> {
        Ok(())
    }

    fn can_substitute(&self, card: &Card, as_name: CardName) -> bool {
        as_name == CardName::Slash && card.is_red() && !card.is(CardName::Slash)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{fixtures, Suit};

    #[test]
    fn red_cards_read_as_slash() {
        let peach = Card::new(5, CardName::Peach, Suit::Heart, 3);
        let dodge = Card::new(6, CardName::Dodge, Suit::Spade, 3);
        let slash = Wusheng.substitute(&peach, CardName::Slash).expect("red converts");
        assert_eq!(slash.id, 5);
        assert_eq!(slash.suit, Suit::Heart);
        assert!(slash.is(CardName::Slash));
        assert!(Wusheng.substitute(&dodge, CardName::Slash).is_none());
        assert!(Wusheng.substitute(&peach, CardName::Dodge).is_none());
    }

    #[test]
    fn red_card_answers_a_duel() {
        let mut ctx = fixtures::context(2);
        ctx.install_skill(1, &fixtures::skill("wusheng"))
            .expect("wusheng installs");
        let duel = fixtures::give(&mut ctx, 0, CardName::Duel);
        let red = fixtures::give_red(&mut ctx, 1, CardName::Dodge);

        ctx.use_duel(0, 1, duel.id).expect("duel resolves");

        // Target answered with the red card; the user had no Slash and loses.
        assert_eq!(ctx.state.players[0].hp, ctx.state.players[0].max_hp - 1);
        assert_eq!(ctx.state.players[1].hp, ctx.state.players[1].max_hp);
        assert!(ctx.state.piles.discard_pile().iter().any(|c| c.id == red.id));
        ctx.assert_conserved();
    }
}
