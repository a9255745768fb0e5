//! Tick-driven simulation core of a terminal roguelike.
//!
//! A [`Dungeon`] owns the [`EventBus`] and its [`Level`]s. Each tick of the
//! active level rebuilds the [`SpatialIndex`], refreshes the player's
//! distance map and field of view, runs the gameplay systems and finally
//! removes the dead.

pub mod ai;
pub mod config;
pub mod dungeon_state;
pub mod ecs;
pub mod entity_factory;
pub mod event_bus;
pub mod level;
pub mod navigation;
pub mod rng;
pub mod snapshot;
pub mod spatial;
pub mod systems;

pub use config::SimConfig;
pub use dungeon_state::Dungeon;
pub use ecs::EntityStore;
pub use entity_factory::EntityFactory;
pub use event_bus::{EventBus, EventKind, GameEvent};
pub use level::Level;
pub use navigation::{DistanceMap, UNREACHABLE};
pub use rng::SimRng;
pub use spatial::SpatialIndex;
pub use systems::{LevelExit, System, SystemContext, SystemResult};

pub use dungeon::{Direction, Grid, Legend, LevelBlueprint, Position, Tile, TileMap};
pub use error::{MoveError, SimError};
