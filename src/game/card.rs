use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 每张实体牌的唯一标识，牌堆初始化时分配。
pub type CardId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CardCategory {
    Basic,
    Trick,
    Equipment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Suit {
    Spade,
    Heart,
    Club,
    Diamond,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Club, Suit::Diamond];

    /// Cycles Spade → Heart → Club → Diamond.
    pub fn cycle(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Heart | Suit::Diamond)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Suit::Spade => "♠",
            Suit::Heart => "♥",
            Suit::Club => "♣",
            Suit::Diamond => "♦",
        }
    }
}

/// 牌名决定结算效果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CardName {
    Slash,
    Dodge,
    Peach,
    Duel,
    SavageAssault,
    ArrowBarrage,
    PeachGarden,
    Nullification,
    Snatch,
    Dismantlement,
    Harvest,
    Weapon,
    Armor,
}

impl CardName {
    pub fn category(self) -> CardCategory {
        match self {
            CardName::Slash | CardName::Dodge | CardName::Peach => CardCategory::Basic,
            CardName::Weapon | CardName::Armor => CardCategory::Equipment,
            _ => CardCategory::Trick,
        }
    }

    pub fn local_name(self) -> &'static str {
        match self {
            CardName::Slash => "杀",
            CardName::Dodge => "闪",
            CardName::Peach => "桃",
            CardName::Duel => "决斗",
            CardName::SavageAssault => "南蛮入侵",
            CardName::ArrowBarrage => "万箭齐发",
            CardName::PeachGarden => "桃园结义",
            CardName::Nullification => "无懈可击",
            CardName::Snatch => "顺手牵羊",
            CardName::Dismantlement => "过河拆桥",
            CardName::Harvest => "五谷丰登",
            CardName::Weapon => "武器",
            CardName::Armor => "防具",
        }
    }
}

impl fmt::Display for CardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardName::Slash => "Slash",
            CardName::Dodge => "Dodge",
            CardName::Peach => "Peach",
            CardName::Duel => "Duel",
            CardName::SavageAssault => "Savage Assault",
            CardName::ArrowBarrage => "Arrow Barrage",
            CardName::PeachGarden => "Peach Garden",
            CardName::Nullification => "Nullification",
            CardName::Snatch => "Snatch",
            CardName::Dismantlement => "Dismantlement",
            CardName::Harvest => "Harvest",
            CardName::Weapon => "Weapon",
            CardName::Armor => "Armor",
        };
        f.write_str(name)
    }
}

impl FromStr for CardName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "slash" | "杀" => Ok(CardName::Slash),
            "dodge" | "闪" => Ok(CardName::Dodge),
            "peach" | "桃" => Ok(CardName::Peach),
            "duel" | "决斗" => Ok(CardName::Duel),
            "savageassault" | "南蛮入侵" => Ok(CardName::SavageAssault),
            "arrowbarrage" | "万箭齐发" => Ok(CardName::ArrowBarrage),
            "peachgarden" | "桃园结义" => Ok(CardName::PeachGarden),
            "nullification" | "无懈可击" => Ok(CardName::Nullification),
            "snatch" | "顺手牵羊" => Ok(CardName::Snatch),
            "dismantlement" | "过河拆桥" => Ok(CardName::Dismantlement),
            "harvest" | "五谷丰登" => Ok(CardName::Harvest),
            "weapon" | "武器" => Ok(CardName::Weapon),
            "armor" | "armour" | "防具" => Ok(CardName::Armor),
            _ => Err(()),
        }
    }
}

/// 一张实体牌。`id` 标识实体，其余字段是不可变的牌面。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: CardName,
    pub category: CardCategory,
    pub suit: Suit,
    pub rank: u8,
}

impl Card {
    pub fn new(id: CardId, name: CardName, suit: Suit, rank: u8) -> Self {
        Self {
            id,
            name,
            category: name.category(),
            suit,
            rank: rank.clamp(1, 13),
        }
    }

    pub fn is(&self, name: CardName) -> bool {
        self.name == name
    }

    pub fn is_red(&self) -> bool {
        self.suit.is_red()
    }

    pub fn is_black(&self) -> bool {
        !self.suit.is_red()
    }

    /// The same physical card read as another card name (used by conversion skills).
    pub fn viewed_as(&self, name: CardName) -> Card {
        Card {
            id: self.id,
            name,
            category: name.category(),
            suit: self.suit,
            rank: self.rank,
        }
    }

    pub fn display_text(&self) -> String {
        format!("{} {}{}", self.name, self.suit.symbol(), self.rank)
    }
}
