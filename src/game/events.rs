use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::card::Card;
use super::state::{GameState, PlayerId, TurnPhase};
use crate::skills::SkillHandle;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GameEvent {
    PlayerDamaged {
        victim: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<PlayerId>,
        amount: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        card: Option<Card>,
    },
    PlayerHealed {
        player: PlayerId,
        amount: i32,
    },
    TurnStarted {
        player: PlayerId,
    },
    TurnEnded {
        player: PlayerId,
    },
    PhaseChanged {
        player: PlayerId,
        phase: TurnPhase,
    },
    CardUsed {
        user: PlayerId,
        card: Card,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<PlayerId>,
    },
    CardResponded {
        player: PlayerId,
        card: Card,
    },
    CardDrawn {
        player: PlayerId,
        card: Card,
    },
    CardDiscarded {
        player: PlayerId,
        card: Card,
    },
    PlayerDied {
        victim: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        killer: Option<PlayerId>,
    },
    GameOver {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<PlayerId>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayerDamaged,
    PlayerHealed,
    TurnStarted,
    TurnEnded,
    PhaseChanged,
    CardUsed,
    CardResponded,
    CardDrawn,
    CardDiscarded,
    PlayerDied,
    GameOver,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::PlayerDamaged { .. } => EventKind::PlayerDamaged,
            GameEvent::PlayerHealed { .. } => EventKind::PlayerHealed,
            GameEvent::TurnStarted { .. } => EventKind::TurnStarted,
            GameEvent::TurnEnded { .. } => EventKind::TurnEnded,
            GameEvent::PhaseChanged { .. } => EventKind::PhaseChanged,
            GameEvent::CardUsed { .. } => EventKind::CardUsed,
            GameEvent::CardResponded { .. } => EventKind::CardResponded,
            GameEvent::CardDrawn { .. } => EventKind::CardDrawn,
            GameEvent::CardDiscarded { .. } => EventKind::CardDiscarded,
            GameEvent::PlayerDied { .. } => EventKind::PlayerDied,
            GameEvent::GameOver { .. } => EventKind::GameOver,
        }
    }
}

pub type ListenerId = u32;

/// 外部监听器只读观察事件与状态。
pub type Listener = Rc<RefCell<dyn FnMut(&GameEvent, &GameState)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscriber {
    Listener(ListenerId),
    Skill(SkillHandle),
}

/// 同步的事件总线。投递由 `GameContext::publish` 完成，这里只维护订阅表。
#[derive(Default)]
pub struct EventBus {
    routes: HashMap<EventKind, Vec<Subscriber>>,
    listeners: HashMap<ListenerId, Listener>,
    next_listener: ListenerId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the subscriber was already registered for `kind`.
    pub fn subscribe(&mut self, kind: EventKind, subscriber: Subscriber) -> bool {
        let route = self.routes.entry(kind).or_default();
        if route.contains(&subscriber) {
            return false;
        }
        route.push(subscriber);
        true
    }

    pub fn unsubscribe(&mut self, kind: EventKind, subscriber: Subscriber) -> bool {
        let Some(route) = self.routes.get_mut(&kind) else {
            return false;
        };
        let before = route.len();
        route.retain(|existing| *existing != subscriber);
        route.len() != before
    }

    pub fn unsubscribe_all(&mut self, subscriber: Subscriber) {
        for route in self.routes.values_mut() {
            route.retain(|existing| *existing != subscriber);
        }
    }

    /// Registers a closure for the given kinds and returns its id.
    pub fn listen<F>(&mut self, kinds: &[EventKind], listener: F) -> ListenerId
    where
        F: FnMut(&GameEvent, &GameState) + 'static,
    {
        self.next_listener += 1;
        let id = self.next_listener;
        self.listeners.insert(id, Rc::new(RefCell::new(listener)));
        for kind in kinds {
            self.subscribe(*kind, Subscriber::Listener(id));
        }
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.unsubscribe_all(Subscriber::Listener(id));
        self.listeners.remove(&id).is_some()
    }

    pub fn listener(&self, id: ListenerId) -> Option<Listener> {
        self.listeners.get(&id).cloned()
    }

    /// Snapshot of the subscribers for `kind`, in subscription order.
    pub fn subscribers(&self, kind: EventKind) -> Vec<Subscriber> {
        self.routes.get(&kind).cloned().unwrap_or_default()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.routes.get(&kind).map(Vec::len).unwrap_or(0)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("routes", &self.routes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
