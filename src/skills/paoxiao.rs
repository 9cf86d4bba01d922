//! 咆哮：锁定技，使用杀无次数限制。

use std::any::Any;

use super::{SkillBehavior, SkillInput};
use crate::game::{GameContext, PlayerId, RuleError};

#[derive(Debug, Default)]
pub struct Paoxiao;

impl SkillBehavior for Paoxiao {
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

    fn removes_slash_limit(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::game::{fixtures, CardName, RuleError};

    #[test]
    fn lifts_the_slash_cap() {
        let mut ctx = fixtures::context(2);
        fixtures::enter_play_phase(&mut ctx, 0);
        let first = fixtures::give(&mut ctx, 0, CardName::Slash);
        let second = fixtures::give(&mut ctx, 0, CardName::Slash);

        ctx.use_slash(0, 1, first.id).expect("first slash");
        let err = ctx.use_slash(0, 1, second.id).expect_err("cap reached");
        assert!(matches!(err, RuleError::SlashLimitReached { .. }));

        ctx.install_skill(0, &fixtures::skill("paoxiao"))
            .expect("paoxiao installs");
        ctx.use_slash(0, 1, second.id).expect("cap lifted");
        assert_eq!(ctx.state.players[1].hp, ctx.state.players[1].max_hp - 2);
    }
}
