// src/dungeon/src/lib.rs
//! Static spatial substrate of a dungeon floor: coordinates, dense grids,
//! tiles stacked in layers, and the loader for hand-authored maps.

pub mod grid;
pub mod loader;
pub mod map;
pub mod tiles;

pub use crate::grid::{Direction, Grid, Position};
pub use crate::loader::{Glyph, Legend, LevelBlueprint, SpawnPoint};
pub use crate::map::TileMap;
pub use crate::tiles::{Tile, TileColor, TileLayer};
