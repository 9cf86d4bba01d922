use std::collections::HashSet;

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::card::{Card, CardId, CardName};
use super::context::GameContext;
use super::events::GameEvent;
use super::state::{IntegrityError, PlayerId, TurnPhase};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the game has not started")]
    GameNotStarted,
    #[error("the game is already over")]
    GameFinished,
    #[error("the game has already started")]
    GameAlreadyStarted,
    #[error("at least two players are required, got {count}")]
    NotEnoughPlayers { count: usize },
    #[error("unknown general `{general_id}`")]
    UnknownGeneral { general_id: String },
    #[error("player {player_id} not found")]
    PlayerNotFound { player_id: PlayerId },
    #[error("player {player_id} is dead")]
    PlayerDead { player_id: PlayerId },
    #[error("card {card_id} is not in the hand of player {player_id}")]
    CardNotInHand { player_id: PlayerId, card_id: CardId },
    #[error("card {card_id} cannot be used as {expected}")]
    WrongCard { card_id: CardId, expected: CardName },
    #[error("player {target} is not a valid target for player {player_id}")]
    InvalidTarget { player_id: PlayerId, target: PlayerId },
    #[error("player {player_id} has used the {limit} slash(es) allowed this turn")]
    SlashLimitReached { player_id: PlayerId, limit: u32 },
    #[error("expected phase {expected:?}, current phase is {actual:?}")]
    InvalidPhase { expected: TurnPhase, actual: TurnPhase },
    #[error("it is not player {player_id}'s turn")]
    NotPlayerTurn { player_id: PlayerId },
    #[error("skill `{skill_id}` of player {player_id} cannot be used now")]
    SkillUnavailable { player_id: PlayerId, skill_id: String },
    #[error("invalid selection: {reason}")]
    InvalidSelection { reason: String },
    #[error("integrity violation: {error}")]
    IntegrityViolation { error: IntegrityError },
}

impl From<IntegrityError> for RuleError {
    fn from(error: IntegrityError) -> Self {
        RuleError::IntegrityViolation { error }
    }
}

impl GameContext {
    pub(crate) fn ensure_running(&self) -> Result<(), RuleError> {
        if !self.state.started {
            return Err(RuleError::GameNotStarted);
        }
        if self.state.over {
            return Err(RuleError::GameFinished);
        }
        Ok(())
    }

    pub(crate) fn ensure_alive(&self, player_id: PlayerId) -> Result<(), RuleError> {
        let player = self
            .state
            .get_player(player_id)
            .ok_or(RuleError::PlayerNotFound { player_id })?;
        if !player.alive {
            return Err(RuleError::PlayerDead { player_id });
        }
        Ok(())
    }

    pub(crate) fn ensure_other_alive(
        &self,
        player_id: PlayerId,
        target: PlayerId,
    ) -> Result<(), RuleError> {
        if target == player_id || !self.state.is_alive(target) {
            return Err(RuleError::InvalidTarget { player_id, target });
        }
        Ok(())
    }

    /// Non-empty, distinct and all held by `player_id`.
    pub(crate) fn ensure_cards_in_hand(
        &self,
        player_id: PlayerId,
        cards: &[CardId],
    ) -> Result<(), RuleError> {
        if cards.is_empty() {
            return Err(RuleError::InvalidSelection {
                reason: "no cards selected".to_string(),
            });
        }
        let mut seen = HashSet::new();
        if !cards.iter().all(|id| seen.insert(*id)) {
            return Err(RuleError::InvalidSelection {
                reason: "the same card was selected twice".to_string(),
            });
        }
        let player = self
            .state
            .get_player(player_id)
            .ok_or(RuleError::PlayerNotFound { player_id })?;
        match cards.iter().find(|id| player.hand_card(**id).is_none()) {
            Some(card_id) => Err(RuleError::CardNotInHand {
                player_id,
                card_id: *card_id,
            }),
            None => Ok(()),
        }
    }

    fn hand_card(&self, player_id: PlayerId, card_id: CardId) -> Result<Card, RuleError> {
        self.state
            .get_player(player_id)
            .and_then(|player| player.hand_card(card_id))
            .cloned()
            .ok_or(RuleError::CardNotInHand { player_id, card_id })
    }

    /// Common checks for using a named card from the hand.
    fn prepare_use(
        &self,
        user: PlayerId,
        card_id: CardId,
        expected: CardName,
        target: Option<PlayerId>,
    ) -> Result<Card, RuleError> {
        self.ensure_running()?;
        self.ensure_alive(user)?;
        if let Some(target) = target {
            self.ensure_other_alive(user, target)?;
        }
        let card = self.hand_card(user, card_id)?;
        if !card.is(expected) {
            return Err(RuleError::WrongCard {
                card_id,
                expected,
            });
        }
        Ok(card)
    }

    /// Moves the card from hand to discard and announces it as `used_as`.
    fn consume(
        &mut self,
        user: PlayerId,
        card_id: CardId,
        used_as: Card,
        target: Option<PlayerId>,
    ) -> Result<Card, RuleError> {
        let physical = self.take_from_hand(user, card_id)?;
        self.state.piles.discard(physical);
        debug!("player {user} uses {}", used_as.display_text());
        self.publish(GameEvent::CardUsed {
            user,
            card: used_as.clone(),
            target,
        });
        Ok(used_as)
    }

    /// Plays a response card if the player holds one. A real card is preferred
    /// over a skill substitution.
    pub(crate) fn respond_with(&mut self, player_id: PlayerId, name: CardName) -> Option<Card> {
        let player = self.state.get_player(player_id)?;
        if !player.alive {
            return None;
        }
        let (card_id, played) = match player.first_named(name) {
            Some(card) => (card.id, card.clone()),
            None => player.hand.iter().find_map(|card| {
                self.skills
                    .substitute(player_id, card, name)
                    .map(|viewed| (card.id, viewed))
            })?,
        };
        let physical = self.take_from_hand(player_id, card_id).ok()?;
        self.state.piles.discard(physical);
        debug!("player {player_id} responds with {}", played.display_text());
        self.publish(GameEvent::CardResponded {
            player: player_id,
            card: played.clone(),
        });
        Some(played)
    }

    fn slash_limit_for(&self, user: PlayerId) -> Option<u32> {
        if self.state.current_player_id() != Some(user) || self.skills.removes_slash_limit(user) {
            return None;
        }
        self.config.slash_limit
    }

    pub fn can_use_slash(&self, user: PlayerId) -> bool {
        match self.slash_limit_for(user) {
            Some(limit) => self.state.slashes_used < limit,
            None => true,
        }
    }

    pub fn use_slash(
        &mut self,
        user: PlayerId,
        target: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.ensure_running()?;
        self.ensure_alive(user)?;
        self.ensure_other_alive(user, target)?;
        let card = self.hand_card(user, card_id)?;
        let slash = if card.is(CardName::Slash) {
            card
        } else {
            self.skills
                .substitute(user, &card, CardName::Slash)
                .ok_or(RuleError::WrongCard {
                    card_id,
                    expected: CardName::Slash,
                })?
        };
        if let Some(limit) = self.slash_limit_for(user) {
            if self.state.slashes_used >= limit {
                return Err(RuleError::SlashLimitReached {
                    player_id: user,
                    limit,
                });
            }
        }

        let mark = self.state.event_mark();
        if self.state.current_player_id() == Some(user) {
            self.state.slashes_used += 1;
        }
        let slash = self.consume(user, card_id, slash, Some(target))?;

        if self.respond_with(target, CardName::Dodge).is_some() {
            info!("player {target} dodges the slash from player {user}");
        } else {
            self.deal_damage(target, Some(user), self.config.base_damage, Some(slash));
        }
        Ok(self.state.events_since(mark))
    }

    pub fn use_peach(&mut self, user: PlayerId, card_id: CardId) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, CardName::Peach, None)?;
        let mark = self.state.event_mark();
        self.consume(user, card_id, card, None)?;
        self.heal(user, 1);
        Ok(self.state.events_since(mark))
    }

    pub fn use_duel(
        &mut self,
        user: PlayerId,
        target: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, CardName::Duel, Some(target))?;
        let mark = self.state.event_mark();
        let duel = self.consume(user, card_id, card, Some(target))?;

        // Each exchange spends a hand card, so the loop ends.
        let (mut responder, mut other) = (target, user);
        loop {
            if !self.state.is_alive(responder) || !self.state.is_alive(other) {
                break;
            }
            if self.respond_with(responder, CardName::Slash).is_some() {
                std::mem::swap(&mut responder, &mut other);
                continue;
            }
            info!("player {responder} loses the duel");
            self.deal_damage(responder, Some(other), self.config.base_damage, Some(duel));
            break;
        }
        Ok(self.state.events_since(mark))
    }

    fn broadcast_attack(
        &mut self,
        user: PlayerId,
        card_id: CardId,
        name: CardName,
        response: CardName,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, name, None)?;
        let mark = self.state.event_mark();
        let card = self.consume(user, card_id, card, None)?;

        for target in self.state.opponents_of(user) {
            if self.state.over {
                break;
            }
            if !self.state.is_alive(target) {
                continue;
            }
            if self.respond_with(target, response).is_none() {
                self.deal_damage(target, Some(user), self.config.base_damage, Some(card.clone()));
            }
        }
        Ok(self.state.events_since(mark))
    }

    pub fn use_savage_assault(
        &mut self,
        user: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.broadcast_attack(user, card_id, CardName::SavageAssault, CardName::Slash)
    }

    pub fn use_arrow_barrage(
        &mut self,
        user: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.broadcast_attack(user, card_id, CardName::ArrowBarrage, CardName::Dodge)
    }

    pub fn use_peach_garden(
        &mut self,
        user: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, CardName::PeachGarden, None)?;
        let mark = self.state.event_mark();
        self.consume(user, card_id, card, None)?;
        for player in self.state.seating_from(user, true) {
            self.heal(player, 1);
        }
        Ok(self.state.events_since(mark))
    }

    pub fn use_snatch(
        &mut self,
        user: PlayerId,
        target: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, CardName::Snatch, Some(target))?;
        let mark = self.state.event_mark();
        self.consume(user, card_id, card, Some(target))?;

        let hand_size = self
            .state
            .get_player(target)
            .map(|player| player.hand.len())
            .unwrap_or(0);
        if hand_size == 0 {
            info!("snatch: player {target} has no hand cards");
            return Ok(self.state.events_since(mark));
        }
        let index = self.rng.gen_range(0..hand_size);
        let taken = self
            .state
            .get_player_mut(target)
            .map(|player| player.hand.remove(index));
        if let (Some(card), Some(player)) = (taken, self.state.get_player_mut(user)) {
            info!("{} snatches a card from player {target}", player.name);
            player.hand.push(card);
        }
        Ok(self.state.events_since(mark))
    }

    pub fn use_dismantlement(
        &mut self,
        user: PlayerId,
        target: PlayerId,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, CardName::Dismantlement, Some(target))?;
        let mark = self.state.event_mark();
        self.consume(user, card_id, card, Some(target))?;

        let (hand_size, equipment_size) = self
            .state
            .get_player(target)
            .map(|player| (player.hand.len(), player.equipment.len()))
            .unwrap_or((0, 0));
        if hand_size + equipment_size == 0 {
            info!("dismantlement: player {target} has nothing to remove");
            return Ok(self.state.events_since(mark));
        }
        let index = self.rng.gen_range(0..hand_size + equipment_size);
        let removed = self.state.get_player_mut(target).map(|player| {
            if index < hand_size {
                player.hand.remove(index)
            } else {
                player.equipment.remove(index - hand_size)
            }
        });
        if let Some(card) = removed {
            info!("dismantlement removes {} from player {target}", card.display_text());
            self.state.piles.discard(card.clone());
            self.publish(GameEvent::CardDiscarded {
                player: target,
                card,
            });
        }
        Ok(self.state.events_since(mark))
    }

    pub fn use_harvest(&mut self, user: PlayerId, card_id: CardId) -> Result<Vec<GameEvent>, RuleError> {
        let card = self.prepare_use(user, card_id, CardName::Harvest, None)?;
        let mark = self.state.event_mark();
        self.consume(user, card_id, card, None)?;

        let pickers = self.state.seating_from(user, true);
        let mut pool = self.state.piles.draw_n(pickers.len(), &mut self.rng);
        info!("harvest reveals {} card(s)", pool.len());
        for picker in pickers {
            if pool.is_empty() {
                break;
            }
            let index = self.rng.gen_range(0..pool.len());
            let picked = pool.swap_remove(index);
            if let Some(player) = self.state.get_player_mut(picker) {
                player.hand.push(picked.clone());
            }
            self.publish(GameEvent::CardDrawn {
                player: picker,
                card: picked,
            });
        }
        // 没人挑走的牌进弃牌堆。
        for card in pool {
            self.state.piles.discard(card);
        }
        Ok(self.state.events_since(mark))
    }
}
