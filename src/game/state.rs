use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::card::{Card, CardId, CardName};
use super::events::GameEvent;
use super::pile::PileService;
use crate::ai::AiConfig;
use crate::skills::SkillHandle;

const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

/// 玩家标识，同时也是座位号。
pub type PlayerId = u8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Faction {
    Wei,
    Shu,
    Wu,
    Qun,
}

impl Faction {
    pub fn cycle(index: usize) -> Self {
        [Faction::Wei, Faction::Shu, Faction::Wu, Faction::Qun][index % 4]
    }
}

/// 回合阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    Prepare,
    Judge,
    Draw,
    Play,
    Discard,
    End,
}

impl TurnPhase {
    pub fn next(self) -> Self {
        match self {
            TurnPhase::Prepare => TurnPhase::Judge,
            TurnPhase::Judge => TurnPhase::Draw,
            TurnPhase::Draw => TurnPhase::Play,
            TurnPhase::Play => TurnPhase::Discard,
            TurnPhase::Discard => TurnPhase::End,
            TurnPhase::End => TurnPhase::Prepare,
        }
    }
}

impl Default for TurnPhase {
    fn default() -> Self {
        TurnPhase::Prepare
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Controller {
    Human,
    Ai { config: AiConfig },
}

impl Default for Controller {
    fn default() -> Self {
        Controller::Human
    }
}

/// 玩家状态：体力、三个区域、技能句柄。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub general_id: String,
    pub faction: Faction,
    pub max_hp: i32,
    pub hp: i32,
    /// Overrides the "hand limit equals current HP" rule when set.
    #[serde(default)]
    pub hand_limit: Option<usize>,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub equipment: Vec<Card>,
    #[serde(default)]
    pub judgment: Vec<Card>,
    pub alive: bool,
    #[serde(default = "default_attack_range")]
    pub attack_range: u8,
    #[serde(default)]
    pub skills: Vec<SkillHandle>,
    #[serde(default)]
    pub controller: Controller,
}

fn default_attack_range() -> u8 {
    1
}

impl PlayerState {
    pub fn new(id: PlayerId, name: impl Into<String>, faction: Faction, max_hp: i32) -> Self {
        let max_hp = max_hp.max(1);
        Self {
            id,
            name: name.into(),
            general_id: String::new(),
            faction,
            max_hp,
            hp: max_hp,
            hand_limit: None,
            hand: Vec::new(),
            equipment: Vec::new(),
            judgment: Vec::new(),
            alive: true,
            attack_range: default_attack_range(),
            skills: Vec::new(),
            controller: Controller::Human,
        }
    }

    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    pub fn is_ai(&self) -> bool {
        matches!(self.controller, Controller::Ai { .. })
    }

    pub fn hand_limit(&self) -> usize {
        self.hand_limit.unwrap_or_else(|| self.hp.max(0) as usize)
    }

    pub fn missing_hp(&self) -> i32 {
        (self.max_hp - self.hp).max(0)
    }

    pub fn hp_ratio(&self) -> f64 {
        self.hp.max(0) as f64 / self.max_hp.max(1) as f64
    }

    pub fn is_wounded(&self) -> bool {
        self.hp < self.max_hp
    }

    pub fn find_card_in_hand_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn hand_card(&self, card_id: CardId) -> Option<&Card> {
        self.hand.iter().find(|card| card.id == card_id)
    }

    pub fn remove_card_from_hand(&mut self, card_id: CardId) -> Option<Card> {
        let idx = self.find_card_in_hand_index(card_id)?;
        Some(self.hand.remove(idx))
    }

    pub fn first_named(&self, name: CardName) -> Option<&Card> {
        self.hand.iter().find(|card| card.name == name)
    }

    pub fn count_named(&self, name: CardName) -> usize {
        self.hand.iter().filter(|card| card.name == name).count()
    }

    pub fn zone_card_count(&self) -> usize {
        self.hand.len() + self.equipment.len() + self.judgment.len()
    }

    /// Seating distance is not modelled; every other player is one step away.
    pub fn distance_to(&self, _other: &PlayerState) -> u8 {
        1
    }

    pub fn in_attack_range(&self, other: &PlayerState) -> bool {
        self.distance_to(other) <= self.attack_range
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("card count changed from {expected} to {actual}")]
    CardCountMismatch { expected: usize, actual: usize },
    #[error("card {card_id} appears in more than one place")]
    DuplicateCardId { card_id: CardId },
    #[error("player {player_id} has {hp} hp above max {max_hp}")]
    HpAboveMax {
        player_id: PlayerId,
        hp: i32,
        max_hp: i32,
    },
    #[error("dead player {player_id} still holds cards")]
    DeadPlayerHoldsCards { player_id: PlayerId },
    #[error("current seat {index} is out of range")]
    InvalidCurrentSeat { index: usize },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    #[serde(default)]
    pub players: Vec<PlayerState>,
    pub current: usize,
    pub phase: TurnPhase,
    pub turn: u32,
    pub piles: PileService,
    pub started: bool,
    pub over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    /// Slashes the current player has used this turn.
    #[serde(default)]
    pub slashes_used: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    /// Events dropped from the front of the bounded log so far.
    #[serde(default)]
    pub events_evicted: usize,
}

fn default_event_log_capacity() -> usize {
    DEFAULT_EVENT_LOG_CAPACITY
}

impl GameState {
    pub fn new(piles: PileService) -> Self {
        Self {
            players: Vec::new(),
            current: 0,
            phase: TurnPhase::default(),
            turn: 0,
            piles,
            started: false,
            over: false,
            winner: None,
            slashes_used: 0,
            event_log: Vec::new(),
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            events_evicted: 0,
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
        let capacity = self.event_log_capacity.max(1);
        if self.event_log.len() > capacity {
            let overflow = self.event_log.len() - capacity;
            self.event_log.drain(..overflow);
            self.events_evicted += overflow;
        }
    }

    /// Position in the total event stream, usable with [`GameState::events_since`].
    pub fn event_mark(&self) -> usize {
        self.events_evicted + self.event_log.len()
    }

    /// Events recorded after `mark`. Events already evicted from the bounded
    /// log are gone; only the retained tail comes back.
    pub fn events_since(&self, mark: usize) -> Vec<GameEvent> {
        if mark < self.events_evicted {
            warn!(
                "{} event(s) after mark {mark} were evicted from the log",
                self.events_evicted - mark
            );
        }
        let start = mark.saturating_sub(self.events_evicted);
        self.event_log.get(start..).map(<[GameEvent]>::to_vec).unwrap_or_default()
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    pub fn current_player(&self) -> Option<&PlayerState> {
        self.players.get(self.current)
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player().map(|player| player.id)
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.get_player(id).map(|player| player.alive).unwrap_or(false)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|player| player.alive).count()
    }

    /// Alive players in seating order starting at `from`'s seat, optionally
    /// including `from` itself.
    pub fn seating_from(&self, from: PlayerId, include_self: bool) -> Vec<PlayerId> {
        let Some(start) = self.player_index(from) else {
            return Vec::new();
        };
        let seats = self.players.len();
        let first = if include_self { 0 } else { 1 };
        (first..seats)
            .map(|offset| &self.players[(start + offset) % seats])
            .filter(|player| player.alive)
            .map(|player| player.id)
            .collect()
    }

    pub fn opponents_of(&self, id: PlayerId) -> Vec<PlayerId> {
        self.seating_from(id, false)
    }

    /// Next alive seat after `index`, wrapping. `None` when nobody else is alive.
    pub fn next_alive_seat(&self, index: usize) -> Option<usize> {
        let seats = self.players.len();
        (1..=seats)
            .map(|offset| (index + offset) % seats)
            .find(|&seat| self.players[seat].alive && seat != index)
    }

    pub fn card_total(&self) -> usize {
        self.piles.total()
            + self
                .players
                .iter()
                .map(PlayerState::zone_card_count)
                .sum::<usize>()
    }

    pub fn integrity_check(&self, expected_cards: usize) -> Result<(), IntegrityError> {
        if !self.players.is_empty() && self.current >= self.players.len() {
            return Err(IntegrityError::InvalidCurrentSeat {
                index: self.current,
            });
        }

        let actual = self.card_total();
        if actual != expected_cards {
            return Err(IntegrityError::CardCountMismatch {
                expected: expected_cards,
                actual,
            });
        }

        let mut seen = HashSet::new();
        for card in self.piles.cards() {
            if !seen.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
        }
        for player in &self.players {
            if player.hp > player.max_hp {
                return Err(IntegrityError::HpAboveMax {
                    player_id: player.id,
                    hp: player.hp,
                    max_hp: player.max_hp,
                });
            }
            if !player.alive && player.zone_card_count() > 0 {
                return Err(IntegrityError::DeadPlayerHoldsCards {
                    player_id: player.id,
                });
            }
            for card in player
                .hand
                .iter()
                .chain(player.equipment.iter())
                .chain(player.judgment.iter())
            {
                if !seen.insert(card.id) {
                    return Err(IntegrityError::DuplicateCardId { card_id: card.id });
                }
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(PileService::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(alive: &[bool]) -> GameState {
        let mut state = GameState::default();
        for (seat, is_alive) in alive.iter().enumerate() {
            let mut player = PlayerState::new(seat as PlayerId, format!("P{seat}"), Faction::cycle(seat), 4);
            player.alive = *is_alive;
            state.players.push(player);
        }
        state
    }

    #[test]
    fn next_alive_seat_skips_dead_and_wraps() {
        let state = table(&[true, false, false, true]);
        assert_eq!(state.next_alive_seat(0), Some(3));
        assert_eq!(state.next_alive_seat(3), Some(0));

        let lonely = table(&[false, true, false]);
        assert_eq!(lonely.next_alive_seat(1), None);
    }

    #[test]
    fn seating_from_starts_after_the_seat() {
        let state = table(&[true, true, false, true]);
        assert_eq!(state.seating_from(1, false), vec![3, 0]);
        assert_eq!(state.seating_from(1, true), vec![1, 3, 0]);
    }

    #[test]
    fn hand_limit_follows_hp_unless_overridden() {
        let mut player = PlayerState::new(0, "P0", Faction::Shu, 4);
        player.hp = 2;
        assert_eq!(player.hand_limit(), 2);
        player.hand_limit = Some(5);
        assert_eq!(player.hand_limit(), 5);
    }

    #[test]
    fn bounded_event_log_keeps_marks_stable() {
        let mut state = table(&[true, true]);
        state.event_log_capacity = 2;
        state.record_event(GameEvent::TurnStarted { player: 0 });
        let mark = state.event_mark();
        state.record_event(GameEvent::TurnEnded { player: 0 });
        state.record_event(GameEvent::TurnStarted { player: 1 });

        assert_eq!(state.event_log.len(), 2);
        assert_eq!(
            state.events_since(mark),
            vec![
                GameEvent::TurnEnded { player: 0 },
                GameEvent::TurnStarted { player: 1 }
            ]
        );
    }

    #[test]
    fn events_since_an_evicted_mark_returns_the_retained_tail() {
        let mut state = table(&[true, true]);
        state.event_log_capacity = 2;
        let mark = state.event_mark();
        for player in 0..2 {
            state.record_event(GameEvent::TurnStarted { player });
            state.record_event(GameEvent::TurnEnded { player });
        }

        assert_eq!(state.event_mark() - mark, 4);
        assert_eq!(
            state.events_since(mark),
            vec![
                GameEvent::TurnStarted { player: 1 },
                GameEvent::TurnEnded { player: 1 }
            ]
        );
    }
}
