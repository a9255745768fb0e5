// src/dungeon/src/tiles.rs
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

/// Display color of a tile or entity glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileColor {
    #[default]
    White,
    Gray,
    DarkGray,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Rgb(u8, u8, u8),
}

/// A glyph plus its color.
///
/// Two tiles are the same tile when they show the same glyph; color is
/// presentation only and does not take part in equality or hashing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tile {
    pub glyph: char,
    pub color: TileColor,
}

impl Tile {
    pub const fn new(glyph: char, color: TileColor) -> Self {
        Self { glyph, color }
    }

    pub const fn plain(glyph: char) -> Self {
        Self::new(glyph, TileColor::White)
    }

    pub const fn wall() -> Self {
        Self::new('#', TileColor::Gray)
    }

    pub const fn floor() -> Self {
        Self::new('.', TileColor::DarkGray)
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.glyph == other.glyph
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.glyph.hash(state);
    }
}

/// Stacking layers of a level, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, Serialize, Deserialize)]
pub enum TileLayer {
    Ground,
    GroundDecoration,
    /// The only layer that blocks movement and sight
    Walls,
    WallDecoration,
    Objects,
    /// Spawn markers; consumed when the level is populated, never drawn
    EntitySpawn,
}

impl TileLayer {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Layers a renderer composes, top-most first.
    pub const DRAW_ORDER: [TileLayer; 5] = [
        TileLayer::Objects,
        TileLayer::WallDecoration,
        TileLayer::Walls,
        TileLayer::GroundDecoration,
        TileLayer::Ground,
    ];
}
