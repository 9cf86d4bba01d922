//! 游戏核心逻辑模块（牌堆、事件、结算、回合状态机）。

pub mod card;
pub mod context;
pub mod events;
pub mod pile;
pub mod resolver;
pub mod state;
pub mod turn;

pub use card::{Card, CardCategory, CardId, CardName, Suit};
pub use context::GameContext;
pub use events::{EventBus, EventKind, GameEvent, Listener, ListenerId, Subscriber};
pub use pile::{DeckCensus, PileService};
pub use resolver::RuleError;
pub use state::{
    Controller,
    Faction,
    GameState,
    IntegrityError,
    PlayerId,
    PlayerState,
    TurnPhase,
};
pub use turn::{PlayDecision, StepOutcome};
