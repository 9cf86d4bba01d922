use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::card::{Card, CardId, CardName, Suit};

/// 牌堆构成。数量属于配置，不属于协议。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeckCensus {
    pub slash: u16,
    pub dodge: u16,
    pub peach: u16,
    pub duel: u16,
    pub savage_assault: u16,
    pub arrow_barrage: u16,
    pub nullification: u16,
    pub snatch: u16,
    pub dismantlement: u16,
    pub peach_garden: u16,
    pub harvest: u16,
}

impl DeckCensus {
    pub fn standard() -> Self {
        Self {
            slash: 30,
            dodge: 15,
            peach: 8,
            duel: 3,
            savage_assault: 3,
            arrow_barrage: 2,
            nullification: 3,
            snatch: 3,
            dismantlement: 3,
            peach_garden: 0,
            harvest: 0,
        }
    }

    /// Standard census plus the broadcast tricks the standard list leaves out.
    pub fn extended() -> Self {
        Self {
            peach_garden: 1,
            harvest: 2,
            ..Self::standard()
        }
    }

    pub fn empty() -> Self {
        Self {
            slash: 0,
            dodge: 0,
            peach: 0,
            duel: 0,
            savage_assault: 0,
            arrow_barrage: 0,
            nullification: 0,
            snatch: 0,
            dismantlement: 0,
            peach_garden: 0,
            harvest: 0,
        }
    }

    pub fn entries(&self) -> [(CardName, u16); 11] {
        [
            (CardName::Slash, self.slash),
            (CardName::Dodge, self.dodge),
            (CardName::Peach, self.peach),
            (CardName::Duel, self.duel),
            (CardName::SavageAssault, self.savage_assault),
            (CardName::ArrowBarrage, self.arrow_barrage),
            (CardName::Nullification, self.nullification),
            (CardName::Snatch, self.snatch),
            (CardName::Dismantlement, self.dismantlement),
            (CardName::PeachGarden, self.peach_garden),
            (CardName::Harvest, self.harvest),
        ]
    }

    pub fn total(&self) -> usize {
        self.entries().iter().map(|(_, count)| *count as usize).sum()
    }
}

impl Default for DeckCensus {
    fn default() -> Self {
        Self::standard()
    }
}

/// Suit and rank of the `index`-th copy of a card in the printed deck.
fn face_of(name: CardName, index: usize) -> (Suit, u8) {
    let cycled_rank = (index % 13) as u8 + 1;
    match name {
        CardName::Slash | CardName::Dodge => (Suit::cycle(index), cycled_rank),
        CardName::Peach => (
            if index < 4 { Suit::Heart } else { Suit::Diamond },
            cycled_rank,
        ),
        CardName::Duel => (Suit::Spade, cycled_rank),
        CardName::SavageAssault => (Suit::Spade, ((index + 6) % 13) as u8 + 1),
        CardName::ArrowBarrage | CardName::PeachGarden => (Suit::Heart, cycled_rank),
        CardName::Nullification => (
            if index % 2 == 0 { Suit::Spade } else { Suit::Club },
            11,
        ),
        CardName::Snatch | CardName::Dismantlement => {
            (Suit::Spade, ((index + 2) % 13) as u8 + 1)
        }
        CardName::Harvest => (Suit::Heart, ((index + 2) % 13) as u8 + 1),
        CardName::Weapon | CardName::Armor => (Suit::Club, cycled_rank),
    }
}

/// 摸牌堆与弃牌堆。摸牌堆的顶端是 `draw_pile` 的末尾。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PileService {
    draw_pile: Vec<Card>,
    discard_pile: Vec<Card>,
    next_id: CardId,
}

impl PileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the census, shuffles it and returns the number of cards created.
    pub fn initialize<R: Rng + ?Sized>(&mut self, census: &DeckCensus, rng: &mut R) -> usize {
        self.draw_pile.clear();
        self.discard_pile.clear();
        for (name, count) in census.entries() {
            for index in 0..count as usize {
                let (suit, rank) = face_of(name, index);
                let card = self.mint(name, suit, rank);
                self.draw_pile.push(card);
            }
        }
        self.shuffle(rng);
        info!("deck initialized with {} cards", self.draw_pile.len());
        self.draw_pile.len()
    }

    /// Creates a new physical card with a fresh id. Only deck construction and
    /// fixtures should call this; play never creates cards.
    pub fn mint(&mut self, name: CardName, suit: Suit, rank: u8) -> Card {
        self.next_id += 1;
        Card::new(self.next_id, name, suit, rank)
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.draw_pile.shuffle(rng);
        debug!("draw pile shuffled ({} cards)", self.draw_pile.len());
    }

    fn reclaim<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.discard_pile.is_empty() {
            return false;
        }
        info!(
            "draw pile exhausted, reclaiming {} discarded cards",
            self.discard_pile.len()
        );
        self.draw_pile.append(&mut self.discard_pile);
        self.shuffle(rng);
        true
    }

    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Card> {
        if let Some(card) = self.draw_pile.pop() {
            return Some(card);
        }
        if !self.reclaim(rng) {
            warn!("draw and discard piles are both empty");
            return None;
        }
        self.draw_pile.pop()
    }

    pub fn draw_n<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<Card> {
        let mut cards = Vec::with_capacity(count);
        for _ in 0..count {
            match self.draw(rng) {
                Some(card) => cards.push(card),
                None => break,
            }
        }
        cards
    }

    pub fn discard(&mut self, card: Card) {
        self.discard_pile.push(card);
    }

    pub fn take_from_discard(&mut self, card_id: CardId) -> Option<Card> {
        let index = self.discard_pile.iter().position(|card| card.id == card_id)?;
        Some(self.discard_pile.remove(index))
    }

    /// Removes the topmost draw-pile card matching `predicate`, wherever it sits.
    #[cfg(test)]
    pub(crate) fn take_matching<F>(&mut self, predicate: F) -> Option<Card>
    where
        F: Fn(&Card) -> bool,
    {
        let index = self.draw_pile.iter().rposition(predicate)?;
        Some(self.draw_pile.remove(index))
    }

    #[cfg(test)]
    pub(crate) fn take_named(&mut self, name: CardName) -> Option<Card> {
        self.take_matching(|card| card.name == name)
    }

    #[cfg(test)]
    pub(crate) fn put_on_top(&mut self, card: Card) {
        self.draw_pile.push(card);
    }

    pub fn draw_pile(&self) -> &[Card] {
        &self.draw_pile
    }

    pub fn discard_pile(&self) -> &[Card] {
        &self.discard_pile
    }

    pub fn draw_count(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn discard_count(&self) -> usize {
        self.discard_pile.len()
    }

    pub fn total(&self) -> usize {
        self.draw_pile.len() + self.discard_pile.len()
    }

    pub(crate) fn cards(&self) -> impl Iterator<Item = &Card> {
        self.draw_pile.iter().chain(self.discard_pile.iter())
    }
}
