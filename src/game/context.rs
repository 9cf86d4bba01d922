use std::collections::HashMap;

use log::{debug, info, trace};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::card::{Card, CardId};
use super::events::{EventBus, EventKind, GameEvent, ListenerId, Subscriber};
use super::pile::PileService;
use super::resolver::RuleError;
use super::state::{GameState, IntegrityError, PlayerId};
use crate::ai::AiAgent;
use crate::config::GameConfig;
use crate::data::GeneralTable;
use crate::skills::SkillRuntime;

/// 一局游戏的全部运行时：状态、事件总线、技能、配置与随机源。
pub struct GameContext {
    pub state: GameState,
    pub bus: EventBus,
    pub skills: SkillRuntime,
    pub config: GameConfig,
    pub generals: GeneralTable,
    pub(crate) rng: SmallRng,
    pub(crate) agents: HashMap<PlayerId, AiAgent>,
    pub(crate) initial_card_total: usize,
}

impl GameContext {
    pub fn new(config: GameConfig) -> Self {
        Self::with_generals(config, GeneralTable::builtin().clone())
    }

    pub fn with_generals(config: GameConfig, generals: GeneralTable) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let mut state = GameState::new(PileService::new());
        state.event_log_capacity = config.event_log_capacity;
        Self {
            state,
            bus: EventBus::new(),
            skills: SkillRuntime::new(),
            config,
            generals,
            rng,
            agents: HashMap::new(),
            initial_card_total: 0,
        }
    }

    /// Records the event, then delivers it synchronously to a snapshot of the
    /// subscribers for its kind.
    pub fn publish(&mut self, event: GameEvent) {
        trace!("publish {:?}", event.kind());
        self.state.record_event(event.clone());
        for subscriber in self.bus.subscribers(event.kind()) {
            match subscriber {
                Subscriber::Listener(id) => {
                    let Some(listener) = self.bus.listener(id) else {
                        continue;
                    };
                    let Ok(mut callback) = listener.try_borrow_mut() else {
                        continue;
                    };
                    (*callback)(&event, &self.state);
                }
                Subscriber::Skill(handle) => self.deliver_to_skill(handle, &event),
            }
        }
    }

    pub fn listen<F>(&mut self, kinds: &[EventKind], listener: F) -> ListenerId
    where
        F: FnMut(&GameEvent, &GameState) + 'static,
    {
        self.bus.listen(kinds, listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }

    pub fn initial_card_total(&self) -> usize {
        self.initial_card_total
    }

    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        self.state.integrity_check(self.initial_card_total)
    }

    pub(crate) fn take_from_hand(
        &mut self,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<Card, RuleError> {
        let player = self
            .state
            .get_player_mut(player_id)
            .ok_or(RuleError::PlayerNotFound { player_id })?;
        player
            .remove_card_from_hand(card_id)
            .ok_or(RuleError::CardNotInHand { player_id, card_id })
    }

    pub(crate) fn discard_from_hand(
        &mut self,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<Card, RuleError> {
        let card = self.take_from_hand(player_id, card_id)?;
        self.state.piles.discard(card.clone());
        self.publish(GameEvent::CardDiscarded {
            player: player_id,
            card: card.clone(),
        });
        Ok(card)
    }

    /// Draws up to `count` cards into the player's hand; returns how many arrived.
    pub fn draw_into_hand(&mut self, player_id: PlayerId, count: usize) -> usize {
        if !self.state.is_alive(player_id) {
            return 0;
        }
        let cards = self.state.piles.draw_n(count, &mut self.rng);
        let drawn = cards.len();
        for card in cards {
            if let Some(player) = self.state.get_player_mut(player_id) {
                player.hand.push(card.clone());
            }
            self.publish(GameEvent::CardDrawn {
                player: player_id,
                card,
            });
        }
        if drawn < count {
            debug!("player {player_id} drew {drawn} of {count}: deck exhausted");
        }
        drawn
    }

    /// Heals up to max HP and returns the amount actually restored.
    pub fn heal(&mut self, player_id: PlayerId, amount: i32) -> i32 {
        let Some(player) = self.state.get_player_mut(player_id) else {
            return 0;
        };
        if !player.alive {
            return 0;
        }
        let restored = amount.min(player.missing_hp()).max(0);
        player.hp += restored;
        info!("{} heals {restored} (hp {})", player.name, player.hp);
        if restored > 0 {
            self.publish(GameEvent::PlayerHealed {
                player: player_id,
                amount: restored,
            });
        }
        restored
    }

    /// Applies damage and handles the resulting death. A lethal hit buries the
    /// victim before `PlayerDamaged` goes out, so handlers never see a dead
    /// player holding cards.
    pub fn deal_damage(
        &mut self,
        victim: PlayerId,
        source: Option<PlayerId>,
        amount: i32,
        card: Option<Card>,
    ) {
        let Some(player) = self.state.get_player_mut(victim) else {
            return;
        };
        if !player.alive || amount <= 0 {
            return;
        }
        player.hp -= amount;
        let dying = player.hp <= 0;
        info!("{} takes {amount} damage (hp {})", player.name, player.hp);
        if dying {
            player.alive = false;
            self.bury(victim);
        }

        self.publish(GameEvent::PlayerDamaged {
            victim,
            source,
            amount,
            card,
        });
        if dying {
            self.announce_death(victim, source);
        }
    }

    /// Marks the player dead and runs the death procedure.
    pub fn kill(&mut self, victim: PlayerId, killer: Option<PlayerId>) {
        let Some(player) = self.state.get_player_mut(victim) else {
            return;
        };
        if !player.alive {
            return;
        }
        player.alive = false;
        self.bury(victim);
        self.announce_death(victim, killer);
    }

    // 清空所有区域、释放技能，之后才允许发布事件。
    fn bury(&mut self, victim: PlayerId) {
        let Some(player) = self.state.get_player_mut(victim) else {
            return;
        };
        player.hp = player.hp.min(0);
        let cards: Vec<Card> = player
            .hand
            .drain(..)
            .chain(player.equipment.drain(..))
            .chain(player.judgment.drain(..))
            .collect();
        info!("{} dies, {} card(s) discarded", player.name, cards.len());
        for card in cards {
            self.state.piles.discard(card);
        }
        self.release_skills(victim);
        self.agents.remove(&victim);
    }

    fn announce_death(&mut self, victim: PlayerId, killer: Option<PlayerId>) {
        self.publish(GameEvent::PlayerDied { victim, killer });
        self.check_game_over();
    }

    /// Ends the game when at most one player is alive.
    pub(crate) fn check_game_over(&mut self) -> bool {
        if self.state.over {
            return true;
        }
        if !self.state.started || self.state.alive_count() > 1 {
            return false;
        }
        let winner = self
            .state
            .players
            .iter()
            .find(|player| player.alive)
            .map(|player| player.id);
        self.state.over = true;
        self.state.winner = winner;
        match winner {
            Some(id) => info!("game over, winner: player {id}"),
            None => info!("game over, no survivors"),
        }
        self.publish(GameEvent::GameOver { winner });
        true
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::game::{fixtures, CardName};

    #[test]
    fn listeners_see_events_in_order() {
        let mut ctx = fixtures::context(2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        ctx.listen(&[EventKind::PlayerHealed, EventKind::PlayerDamaged], move |event, state| {
            sink.borrow_mut().push((event.kind(), state.players[0].hp));
        });

        ctx.deal_damage(0, Some(1), 1, None);
        ctx.heal(0, 5);

        assert_eq!(
            *seen.borrow(),
            vec![(EventKind::PlayerDamaged, 3), (EventKind::PlayerHealed, 4)]
        );
    }

    #[test]
    fn death_empties_zones_and_ends_two_player_game() {
        let mut ctx = fixtures::context(2);
        fixtures::give(&mut ctx, 1, CardName::Peach);
        fixtures::give(&mut ctx, 1, CardName::Dodge);
        ctx.state.players[1].hp = 1;

        ctx.deal_damage(1, Some(0), 1, None);

        let victim = &ctx.state.players[1];
        assert!(!victim.alive);
        assert_eq!(victim.zone_card_count(), 0);
        assert_eq!(ctx.state.piles.discard_count(), 2);
        assert!(ctx.state.over);
        assert_eq!(ctx.state.winner, Some(0));
        assert!(matches!(
            ctx.state.event_log.last(),
            Some(GameEvent::GameOver { winner: Some(0) })
        ));
        ctx.assert_conserved();
    }

    #[test]
    fn lethal_damage_is_published_after_the_victim_is_buried() {
        let mut ctx = fixtures::context(3);
        let slash = fixtures::give(&mut ctx, 0, CardName::Slash);
        fixtures::give(&mut ctx, 1, CardName::Peach);
        ctx.state.players[1].hp = 1;
        fixtures::enter_play_phase(&mut ctx, 0);

        let total = ctx.initial_card_total();
        let observed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&observed);
        ctx.listen(&[EventKind::PlayerDamaged], move |_, state| {
            let victim = &state.players[1];
            sink.borrow_mut().push((
                victim.alive,
                victim.zone_card_count(),
                state.integrity_check(total).is_ok(),
            ));
        });

        ctx.use_slash(0, 1, slash.id).expect("slash resolves");

        assert_eq!(*observed.borrow(), vec![(false, 0, true)]);
        let kinds: Vec<_> = ctx
            .state
            .event_log
            .iter()
            .map(GameEvent::kind)
            .filter(|kind| matches!(kind, EventKind::PlayerDamaged | EventKind::PlayerDied))
            .collect();
        assert_eq!(kinds, vec![EventKind::PlayerDamaged, EventKind::PlayerDied]);
        ctx.assert_conserved();
    }

    #[test]
    fn heal_is_capped_and_silent_at_full_hp() {
        let mut ctx = fixtures::context(2);
        let mark = ctx.state.event_mark();
        assert_eq!(ctx.heal(0, 1), 0);
        assert!(ctx.state.events_since(mark).is_empty());
    }

    #[test]
    fn dead_players_draw_nothing() {
        let mut ctx = fixtures::context(3);
        ctx.kill(2, None);
        assert_eq!(ctx.draw_into_hand(2, 2), 0);
        assert!(!ctx.state.over);
        assert_eq!(ctx.draw_into_hand(0, 2), 2);
    }
}
