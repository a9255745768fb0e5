//! The whole dungeon: every level, the shared event bus and which level is
//! being simulated.

use anyhow::anyhow;
use hecs::Entity;

use dungeon::LevelBlueprint;
use error::SimError;

use crate::config::SimConfig;
use crate::ecs::Position;
use crate::entity_factory::EntityFactory;
use crate::event_bus::{EventBus, GameEvent, LogLevel};
use crate::level::Level;
use crate::rng::SimRng;
use crate::systems::LevelExit;

pub struct Dungeon {
    bus: EventBus,
    levels: Vec<Level>,
    active: usize,
}

impl Dungeon {
    pub fn new(config: &SimConfig) -> Self {
        let mut bus = EventBus::with_history_size(config.history_size);
        bus.set_max_publish_depth(config.max_publish_depth);
        Self {
            bus,
            levels: Vec::new(),
            active: 0,
        }
    }

    /// Builds one level per blueprint, top floor first. Each level gets its
    /// own seed drawn from `config.seed`.
    pub fn from_blueprints(
        blueprints: Vec<LevelBlueprint>,
        factory: &EntityFactory,
        config: &SimConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let mut seeds = SimRng::new(config.seed);
        let mut dungeon = Self::new(config);
        for blueprint in blueprints {
            let level =
                Level::from_blueprint(blueprint, factory, config.clone(), seeds.fork_seed())?;
            dungeon.add_level(level);
        }
        Ok(dungeon)
    }

    /// Appends a level below the deepest one and returns its index.
    pub fn add_level(&mut self, mut level: Level) -> usize {
        let depth = self.levels.len();
        level.set_depth(depth);
        self.levels.push(level);
        depth
    }

    /// Ticks the active level only, then follows the stairs if the player
    /// took them. Returns the index of the level that became active.
    pub fn tick(&mut self) -> Option<usize> {
        let level = self.levels.get_mut(self.active)?;
        let exit = level.tick(&mut self.bus)?;

        let from = self.active;
        let to = match exit {
            LevelExit::Down if from + 1 < self.levels.len() => from + 1,
            LevelExit::Up if from > 0 => from - 1,
            _ => {
                self.bus.publish(GameEvent::LogMessage {
                    message: "The stairs lead nowhere".to_string(),
                    level: LogLevel::Info,
                });
                return None;
            }
        };

        let player = self.levels[from].player()?;
        let dest = &self.levels[to];
        let arrival = match exit {
            LevelExit::Down => dest.stairs().start,
            LevelExit::Up => dest.stairs().end,
        };
        match self.transfer_entity(player, from, to, arrival) {
            Ok(_) => Some(to),
            Err(e) => {
                log::warn!("player could not change level: {e}");
                None
            }
        }
    }

    /// Moves `entity` from level `from` onto `at` (or the nearest free tile)
    /// of level `to`. Moving the player also switches the active level and
    /// announces it.
    pub fn transfer_entity(
        &mut self,
        entity: Entity,
        from: usize,
        to: usize,
        at: Position,
    ) -> Result<Entity, SimError> {
        if from >= self.levels.len() {
            return Err(SimError::NoSuchLevel(from));
        }
        if to >= self.levels.len() {
            return Err(SimError::NoSuchLevel(to));
        }
        if from == to {
            return Err(SimError::Other(anyhow!(
                "entity is already on level {from}"
            )));
        }
        let is_player = self.levels[from].player() == Some(entity);

        let (source, dest) = if from < to {
            let (head, tail) = self.levels.split_at_mut(to);
            (&mut head[from], &mut tail[0])
        } else {
            let (head, tail) = self.levels.split_at_mut(from);
            (&mut tail[0], &mut head[to])
        };
        let arrived = dest
            .receive(source.store_mut(), entity, at)
            .ok_or_else(|| SimError::Other(anyhow!("no room for the entity on level {to}")))?;
        source.refresh_view();

        if is_player {
            self.active = to;
            self.bus.publish(GameEvent::LevelChanged { from, to });
        }
        Ok(arrived)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> Option<&Level> {
        self.levels.get(self.active)
    }

    pub fn active_mut(&mut self) -> Option<&mut Level> {
        self.levels.get_mut(self.active)
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    pub fn level_mut(&mut self, index: usize) -> Option<&mut Level> {
        self.levels.get_mut(index)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }
}
