//! Publish/subscribe hub that decouples the simulation from its observers.
//!
//! Events are delivered synchronously: `publish` returns only after every
//! interested handler ran, including the handlers of any event those
//! handlers emitted in turn.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use hecs::Entity;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumIter, IntoStaticStr};

use crate::ecs::{AiState, BuffKind, Position};

/// Something that happened in the simulation.
///
/// Entity fields are plain handles; handlers that need more detail look it up
/// in the level's store after the tick. Names and positions that matter for
/// messages are copied in because the entity may already be gone.
#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash, Display, EnumIter, IntoStaticStr))]
pub enum GameEvent {
    EntityMoved {
        entity: Entity,
        from: Position,
        to: Position,
    },
    /// A player step ran into something solid
    MoveBlocked {
        entity: Entity,
        at: Position,
    },
    EntityAttacked {
        attacker: Entity,
        defender: Entity,
        attacker_name: String,
        defender_name: String,
        damage: u32,
        remaining_hp: u32,
    },
    EntityDied {
        entity: Entity,
        name: String,
        position: Position,
        was_player: bool,
    },
    LootDropped {
        container: Entity,
        source_name: String,
        position: Position,
        item: String,
    },
    DoorOpened {
        entity: Entity,
        door: Entity,
        position: Position,
    },
    BuffExpired {
        entity: Entity,
        kind: BuffKind,
    },

    // AI
    TargetAcquired {
        entity: Entity,
        target: Entity,
    },
    TargetLost {
        entity: Entity,
    },
    AiStateChanged {
        entity: Entity,
        from: AiState,
        to: AiState,
    },
    /// Diagnostic: a pursuer had a goal but no route to it
    NoPathToTarget {
        entity: Entity,
        goal: Position,
    },

    // Level flow
    LevelChanged {
        from: usize,
        to: usize,
    },
    TurnEnded {
        turn: u64,
    },

    /// Player-facing text for the message log
    LogMessage {
        message: String,
        level: LogLevel,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Coarse grouping of event kinds, handy for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Movement,
    Combat,
    Ai,
    World,
    Message,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }

    pub fn event_type(&self) -> &'static str {
        self.kind().into()
    }

    pub fn category(&self) -> EventCategory {
        match self {
            GameEvent::EntityMoved { .. }
            | GameEvent::MoveBlocked { .. }
            | GameEvent::DoorOpened { .. } => EventCategory::Movement,
            GameEvent::EntityAttacked { .. }
            | GameEvent::EntityDied { .. }
            | GameEvent::LootDropped { .. }
            | GameEvent::BuffExpired { .. } => EventCategory::Combat,
            GameEvent::TargetAcquired { .. }
            | GameEvent::TargetLost { .. }
            | GameEvent::AiStateChanged { .. }
            | GameEvent::NoPathToTarget { .. } => EventCategory::Ai,
            GameEvent::LevelChanged { .. } | GameEvent::TurnEnded { .. } => EventCategory::World,
            GameEvent::LogMessage { .. } => EventCategory::Message,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        GameEvent::LogMessage {
            message: message.into(),
            level: LogLevel::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        GameEvent::LogMessage {
            message: message.into(),
            level: LogLevel::Warning,
        }
    }
}

/// Identifies one subscriber so all its registrations can be dropped at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Collects events a handler publishes while it is being dispatched to.
#[derive(Debug, Default)]
pub struct Emitter {
    pending: Vec<GameEvent>,
}

impl Emitter {
    pub fn publish(&mut self, event: GameEvent) {
        self.pending.push(event);
    }
}

/// Receives events from the bus.
pub trait EventHandler {
    fn handle(&mut self, event: &GameEvent, emitter: &mut Emitter);

    /// For debugging
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Filter applied before `handle`
    fn should_handle(&self, _event: &GameEvent) -> bool {
        true
    }
}

struct FnHandler<F>(F);

impl<F> EventHandler for FnHandler<F>
where
    F: FnMut(&GameEvent, &mut Emitter),
{
    fn handle(&mut self, event: &GameEvent, emitter: &mut Emitter) {
        (self.0)(event, emitter)
    }
}

struct Subscription {
    listener: ListenerId,
    handler: Box<dyn EventHandler>,
}

/// Synchronous event bus.
///
/// Handlers for one kind run in registration order, then catch-all handlers
/// in registration order. Events a handler emits are published right after
/// the current dispatch finishes, still inside the outer `publish` call.
/// Nesting deeper than `max_publish_depth` is deferred to the end of the
/// outermost publish instead of recursing further.
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Subscription>>,
    global_handlers: Vec<Subscription>,
    history: VecDeque<GameEvent>,
    max_history: usize,
    next_listener: u64,
    publish_depth: usize,
    max_publish_depth: usize,
    batch_buffer: Vec<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_size(100)
    }

    pub fn with_history_size(max_history: usize) -> Self {
        Self {
            handlers: HashMap::new(),
            global_handlers: Vec::new(),
            history: VecDeque::with_capacity(max_history),
            max_history,
            next_listener: 1,
            publish_depth: 0,
            max_publish_depth: 10,
            batch_buffer: Vec::new(),
        }
    }

    pub fn set_max_publish_depth(&mut self, depth: usize) {
        self.max_publish_depth = depth.max(1);
    }

    /// Allocates an id to subscribe under.
    pub fn new_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    /// Registers a closure for one event kind.
    pub fn subscribe<F>(&mut self, listener: ListenerId, kind: EventKind, handler: F)
    where
        F: FnMut(&GameEvent, &mut Emitter) + 'static,
    {
        self.subscribe_handler(listener, kind, Box::new(FnHandler(handler)));
    }

    pub fn subscribe_handler(
        &mut self,
        listener: ListenerId,
        kind: EventKind,
        handler: Box<dyn EventHandler>,
    ) {
        self.handlers
            .entry(kind)
            .or_default()
            .push(Subscription { listener, handler });
    }

    /// Registers a handler that sees every event.
    pub fn subscribe_all(&mut self, listener: ListenerId, handler: Box<dyn EventHandler>) {
        self.global_handlers.push(Subscription { listener, handler });
    }

    /// Drops every registration made under `listener`.
    pub fn unsubscribe(&mut self, listener: ListenerId) {
        for subs in self.handlers.values_mut() {
            subs.retain(|s| s.listener != listener);
        }
        self.handlers.retain(|_, subs| !subs.is_empty());
        self.global_handlers.retain(|s| s.listener != listener);
    }

    pub fn publish(&mut self, event: GameEvent) {
        if self.publish_depth >= self.max_publish_depth {
            log::warn!(
                "publish depth {} reached, deferring {}",
                self.max_publish_depth,
                event.event_type()
            );
            self.batch_buffer.push(event);
            return;
        }

        self.publish_depth += 1;
        self.add_to_history(event.clone());

        let mut emitter = Emitter::default();
        self.dispatch_to_handlers(&event, &mut emitter);
        for nested in emitter.pending {
            self.publish(nested);
        }

        self.publish_depth -= 1;
        if self.publish_depth == 0 {
            self.flush_batch_buffer();
        }
    }

    fn flush_batch_buffer(&mut self) {
        while !self.batch_buffer.is_empty() {
            let batch = std::mem::take(&mut self.batch_buffer);
            for event in batch {
                self.publish(event);
            }
        }
    }

    fn dispatch_to_handlers(&mut self, event: &GameEvent, emitter: &mut Emitter) {
        if let Some(subs) = self.handlers.get_mut(&event.kind()) {
            for sub in subs {
                if sub.handler.should_handle(event) {
                    sub.handler.handle(event, emitter);
                }
            }
        }
        for sub in &mut self.global_handlers {
            if sub.handler.should_handle(event) {
                sub.handler.handle(event, emitter);
            }
        }
    }

    fn add_to_history(&mut self, event: GameEvent) {
        if self.max_history == 0 {
            return;
        }
        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// The most recent `count` events, oldest first.
    pub fn history(&self, count: usize) -> Vec<GameEvent> {
        let start = self.history.len().saturating_sub(count);
        self.history.iter().skip(start).cloned().collect()
    }

    pub fn full_history(&self) -> impl Iterator<Item = &GameEvent> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum::<usize>() + self.global_handlers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Built-in handlers ==========

/// Keeps a copy of every event it sees. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a clone of this recorder to everything.
    pub fn attach(&self, bus: &mut EventBus) -> ListenerId {
        let listener = bus.new_listener();
        bus.subscribe_all(listener, Box::new(self.clone()));
        listener
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<GameEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventHandler for EventRecorder {
    fn handle(&mut self, event: &GameEvent, _emitter: &mut Emitter) {
        self.events.borrow_mut().push(event.clone());
    }

    fn name(&self) -> &str {
        "EventRecorder"
    }
}

/// Turns events into human-readable lines for the message log.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Rc<RefCell<Vec<String>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, bus: &mut EventBus) -> ListenerId {
        let listener = bus.new_listener();
        bus.subscribe_all(listener, Box::new(self.clone()));
        listener
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.borrow().last().cloned()
    }
}

impl EventHandler for MessageLog {
    fn handle(&mut self, event: &GameEvent, _emitter: &mut Emitter) {
        let message = match event {
            GameEvent::EntityAttacked {
                attacker_name,
                defender_name,
                damage,
                ..
            } => format!("{attacker_name} hits {defender_name} for {damage}"),
            GameEvent::EntityDied { name, was_player, .. } => {
                if *was_player {
                    "You die...".to_string()
                } else {
                    format!("{name} dies")
                }
            }
            GameEvent::LootDropped {
                source_name, item, ..
            } => format!("{source_name} drops {item}"),
            GameEvent::DoorOpened { .. } => "The door opens".to_string(),
            GameEvent::BuffExpired { kind, .. } => format!("{kind} wears off"),
            GameEvent::LevelChanged { to, .. } => format!("You arrive on depth {}", to + 1),
            GameEvent::LogMessage { message, level } if *level != LogLevel::Debug => {
                message.clone()
            }
            _ => return,
        };
        self.messages.borrow_mut().push(message);
    }

    fn name(&self) -> &str {
        "MessageLog"
    }
}
