//! 武将技能：能力接口、运行时与具体技能。

pub mod jianxiong;
pub mod paoxiao;
pub mod registry;
pub mod rende;
pub mod wusheng;
pub mod zhiheng;

use std::any::Any;
use std::collections::{BTreeMap, HashSet};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::data::SkillDefinition;
use crate::game::{
    Card, CardId, CardName, EventKind, GameContext, GameEvent, GameState, PlayerId, RuleError,
    Subscriber,
};

pub use jianxiong::Jianxiong;
pub use paoxiao::Paoxiao;
pub use registry::{create_behavior, is_registered, validate_skill_table, SkillError};
pub use rende::Rende;
pub use wusheng::Wusheng;
pub use zhiheng::Zhiheng;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SkillHandle(pub u32);

/// 主动发动技能时外部给出的选择。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum SkillInput {
    #[default]
    None,
    /// Let the skill choose for itself (AI owners).
    Auto,
    Cards {
        cards: Vec<CardId>,
    },
    GiveCards {
        cards: Vec<CardId>,
        target: PlayerId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Ignore,
    Trigger(SkillInput),
}

pub trait SkillBehavior {
    /// Event kinds the instance is subscribed to while alive.
    fn subscriptions(&self) -> &'static [EventKind] {
        &[]
    }

    fn check_condition(&self, _owner: PlayerId, _ctx: &GameContext) -> bool {
        true
    }

    fn on_event(&mut self, _owner: PlayerId, _event: &GameEvent, _state: &GameState) -> Reaction {
        Reaction::Ignore
    }

    fn trigger(
        &mut self,
        owner: PlayerId,
        ctx: &mut GameContext,
        input: &SkillInput,
    ) -> Result<(), RuleError>;

    fn removes_slash_limit(&self) -> bool {
        false
    }

    fn can_substitute(&self, _card: &Card, _as_name: CardName) -> bool {
        false
    }

    fn substitute(&self, card: &Card, as_name: CardName) -> Option<Card> {
        self.can_substitute(card, as_name)
            .then(|| card.viewed_as(as_name))
    }

    fn cleanup(&mut self) {}

    fn as_any(&self) -> &dyn Any;
}

pub struct SkillInstance {
    pub handle: SkillHandle,
    pub definition: SkillDefinition,
    pub owner: PlayerId,
    pub enabled: bool,
    behavior: Box<dyn SkillBehavior>,
}

impl SkillInstance {
    pub fn new(
        handle: SkillHandle,
        definition: SkillDefinition,
        owner: PlayerId,
        behavior: Box<dyn SkillBehavior>,
    ) -> Self {
        Self {
            handle,
            definition,
            owner,
            enabled: true,
            behavior,
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn can_trigger(&self, ctx: &GameContext) -> bool {
        self.enabled
            && ctx.state.is_alive(self.owner)
            && self.behavior.check_condition(self.owner, ctx)
    }

    pub fn cleanup(&mut self) {
        self.enabled = false;
        self.behavior.cleanup();
    }

    pub fn behavior(&self) -> &dyn SkillBehavior {
        self.behavior.as_ref()
    }

    pub fn behavior_as<T: 'static>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }
}

/// 持有全部技能实例。正在执行的实例暂时移出，执行完再放回。
#[derive(Default)]
pub struct SkillRuntime {
    instances: BTreeMap<SkillHandle, SkillInstance>,
    in_flight: HashSet<SkillHandle>,
    released: HashSet<SkillHandle>,
    next_handle: u32,
}

impl SkillRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> SkillHandle {
        self.next_handle += 1;
        SkillHandle(self.next_handle)
    }

    fn insert(&mut self, instance: SkillInstance) {
        self.instances.insert(instance.handle, instance);
    }

    fn take(&mut self, handle: SkillHandle) -> Option<SkillInstance> {
        let instance = self.instances.remove(&handle)?;
        self.in_flight.insert(handle);
        Some(instance)
    }

    fn restore(&mut self, mut instance: SkillInstance) {
        self.in_flight.remove(&instance.handle);
        if self.released.remove(&instance.handle) {
            instance.cleanup();
            debug!("skill {} released after running", instance.id());
            return;
        }
        self.insert(instance);
    }

    fn release(&mut self, handle: SkillHandle) {
        if let Some(mut instance) = self.instances.remove(&handle) {
            instance.cleanup();
        } else if self.in_flight.contains(&handle) {
            self.released.insert(handle);
        }
    }

    pub fn get(&self, handle: SkillHandle) -> Option<&SkillInstance> {
        self.instances.get(&handle)
    }

    pub fn find(&self, owner: PlayerId, skill_id: &str) -> Option<SkillHandle> {
        self.instances
            .values()
            .find(|instance| instance.owner == owner && instance.id() == skill_id)
            .map(|instance| instance.handle)
    }

    pub fn owned_by(&self, owner: PlayerId) -> impl Iterator<Item = &SkillInstance> {
        self.instances
            .values()
            .filter(move |instance| instance.owner == owner && instance.enabled)
    }

    pub fn removes_slash_limit(&self, owner: PlayerId) -> bool {
        self.owned_by(owner)
            .any(|instance| instance.behavior.removes_slash_limit())
    }

    pub fn can_substitute(&self, owner: PlayerId, card: &Card, as_name: CardName) -> bool {
        self.owned_by(owner)
            .any(|instance| instance.behavior.can_substitute(card, as_name))
    }

    /// First skill of `owner` that can read `card` as `as_name`.
    pub fn substitute(&self, owner: PlayerId, card: &Card, as_name: CardName) -> Option<Card> {
        self.owned_by(owner)
            .find_map(|instance| instance.behavior.substitute(card, as_name))
    }

    pub fn len(&self) -> usize {
        self.instances.len() + self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GameContext {
    pub fn install_skill(
        &mut self,
        owner: PlayerId,
        definition: &SkillDefinition,
    ) -> Result<SkillHandle, SkillError> {
        if !self.state.is_alive(owner) {
            return Err(SkillError::OwnerUnavailable { owner });
        }
        let behavior = create_behavior(definition)?;
        Ok(self.attach_skill(owner, definition, behavior))
    }

    pub(crate) fn attach_skill(
        &mut self,
        owner: PlayerId,
        definition: &SkillDefinition,
        behavior: Box<dyn SkillBehavior>,
    ) -> SkillHandle {
        let handle = self.skills.allocate();
        for kind in behavior.subscriptions() {
            self.bus.subscribe(*kind, Subscriber::Skill(handle));
        }
        if let Some(player) = self.state.get_player_mut(owner) {
            player.skills.push(handle);
        }
        self.skills.insert(SkillInstance::new(
            handle,
            definition.clone(),
            owner,
            behavior,
        ));
        info!("player {owner} gains skill {}", definition.name);
        handle
    }

    /// Unsubscribes and destroys every skill of `owner`.
    pub fn release_skills(&mut self, owner: PlayerId) {
        let handles = match self.state.get_player_mut(owner) {
            Some(player) => std::mem::take(&mut player.skills),
            None => return,
        };
        for handle in handles {
            self.bus.unsubscribe_all(Subscriber::Skill(handle));
            self.skills.release(handle);
        }
        debug!("skills of player {owner} released");
    }

    /// Activates an active skill of `player` on the player's own decision.
    pub fn trigger_skill(
        &mut self,
        player: PlayerId,
        skill_id: &str,
        input: SkillInput,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.ensure_running()?;
        self.ensure_alive(player)?;
        let handle = self
            .skills
            .find(player, skill_id)
            .ok_or_else(|| RuleError::SkillUnavailable {
                player_id: player,
                skill_id: skill_id.to_string(),
            })?;
        let Some(mut instance) = self.skills.take(handle) else {
            return Err(RuleError::SkillUnavailable {
                player_id: player,
                skill_id: skill_id.to_string(),
            });
        };

        if !instance.can_trigger(self) {
            self.skills.restore(instance);
            return Err(RuleError::SkillUnavailable {
                player_id: player,
                skill_id: skill_id.to_string(),
            });
        }

        let mark = self.state.event_mark();
        let owner = instance.owner;
        let result = instance.behavior.trigger(owner, self, &input);
        match &result {
            Ok(()) => info!("player {owner} used skill {}", instance.definition.name),
            Err(err) => debug!("skill {} rejected: {err}", instance.definition.name),
        }
        self.skills.restore(instance);
        result.map(|_| self.state.events_since(mark))
    }

    pub(crate) fn deliver_to_skill(&mut self, handle: SkillHandle, event: &GameEvent) {
        // Instances already running (reentrant publish) or released are skipped.
        let Some(mut instance) = self.skills.take(handle) else {
            return;
        };
        if instance.enabled && self.state.is_alive(instance.owner) {
            let owner = instance.owner;
            if let Reaction::Trigger(input) = instance.behavior.on_event(owner, event, &self.state)
            {
                if instance.can_trigger(self) {
                    match instance.behavior.trigger(owner, self, &input) {
                        Ok(()) => info!("skill {} triggered for player {owner}", instance.definition.name),
                        Err(err) => warn!("skill {} failed: {err}", instance.definition.name),
                    }
                }
            }
        }
        self.skills.restore(instance);
    }

    pub fn skill_behavior<T: 'static>(&self, owner: PlayerId, skill_id: &str) -> Option<&T> {
        let handle = self.skills.find(owner, skill_id)?;
        self.skills.get(handle)?.behavior_as::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fixtures;

    #[test]
    fn install_subscribes_and_release_unsubscribes() {
        let mut ctx = fixtures::context(2);
        let definition = fixtures::skill("jianxiong");
        let handle = ctx.install_skill(0, &definition).expect("jianxiong installs");

        assert_eq!(ctx.state.players[0].skills, vec![handle]);
        assert!(ctx
            .bus
            .subscribers(EventKind::PlayerDamaged)
            .contains(&Subscriber::Skill(handle)));

        ctx.release_skills(0);
        assert!(ctx.state.players[0].skills.is_empty());
        assert!(ctx.skills.get(handle).is_none());
        assert_eq!(ctx.bus.subscriber_count(EventKind::PlayerDamaged), 0);
    }

    /// Hits back at whoever damaged the owner, using a Slash from hand.
    #[derive(Default)]
    struct Retaliate {
        target: Option<PlayerId>,
    }

    impl SkillBehavior for Retaliate {
        fn subscriptions(&self) -> &'static [EventKind] {
            &[EventKind::PlayerDamaged]
        }

        fn on_event(&mut self, owner: PlayerId, event: &GameEvent, _state: &GameState) -> Reaction {
            match event {
                GameEvent::PlayerDamaged {
                    victim,
                    source: Some(source),
                    ..
                } if *victim == owner => {
                    self.target = Some(*source);
                    Reaction::Trigger(SkillInput::None)
                }
                _ => Reaction::Ignore,
            }
        }

        fn trigger(
            &mut self,
            owner: PlayerId,
            ctx: &mut GameContext,
            _input: &SkillInput,
        ) -> Result<(), RuleError> {
            let Some(target) = self.target.take() else {
                return Ok(());
            };
            let Some(slash) = ctx.state.get_player(owner).and_then(|player| {
                player
                    .hand
                    .iter()
                    .find(|card| card.is(CardName::Slash))
                    .map(|card| card.id)
            }) else {
                return Ok(());
            };
            ctx.use_slash(owner, target, slash).map(|_| ())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn skills_may_resolve_cards_while_an_effect_is_resolving() {
        let mut ctx = fixtures::context(2);
        let opener = fixtures::give(&mut ctx, 0, CardName::Slash);
        fixtures::give(&mut ctx, 1, CardName::Slash);
        ctx.attach_skill(1, &fixtures::skill("jianxiong"), Box::<Retaliate>::default());
        fixtures::enter_play_phase(&mut ctx, 0);

        let events = ctx.use_slash(0, 1, opener.id).expect("slash resolves");

        let victims: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                GameEvent::PlayerDamaged { victim, .. } => Some(*victim),
                _ => None,
            })
            .collect();
        assert_eq!(victims, vec![1, 0]);
        assert_eq!(ctx.state.players[0].hp, 3);
        assert_eq!(ctx.state.players[1].hp, 3);
        assert!(ctx.state.players[1].hand.is_empty());
        assert_eq!(ctx.skills.len(), 1);
        ctx.assert_conserved();
    }

    #[test]
    fn unknown_factory_is_reported() {
        let mut ctx = fixtures::context(2);
        let mut definition = fixtures::skill("zhiheng");
        definition.factory = "missing".to_string();
        let err = ctx.install_skill(0, &definition).expect_err("unknown factory");
        assert!(matches!(err, SkillError::UnknownFactory { .. }));
        assert!(ctx.skills.is_empty());
    }

    #[test]
    fn trigger_skill_rejects_missing_skill() {
        let mut ctx = fixtures::context(2);
        let err = ctx
            .trigger_skill(0, "zhiheng", SkillInput::Auto)
            .expect_err("player has no skill");
        assert!(matches!(err, RuleError::SkillUnavailable { .. }));
    }
}
