// src/dungeon/src/map.rs
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};

use crate::grid::{Grid, Position};
use crate::tiles::{Tile, TileLayer};

/// All tile layers of one level, each covering the full extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    width: i32,
    height: i32,
    layers: Vec<Grid<Option<Tile>>>,
}

impl TileMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            layers: (0..TileLayer::COUNT)
                .map(|_| Grid::new(width, height, None))
                .collect(),
        }
    }

    /// A map with floor everywhere and walls around the border.
    pub fn walled_room(width: i32, height: i32) -> Self {
        let mut map = Self::new(width, height);
        for pos in map.layer(TileLayer::Ground).positions().collect::<Vec<_>>() {
            map.set(TileLayer::Ground, pos, Tile::floor());
            if pos.x == 0 || pos.y == 0 || pos.x == width - 1 || pos.y == height - 1 {
                map.set(TileLayer::Walls, pos, Tile::wall());
            }
        }
        map
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn layer(&self, layer: TileLayer) -> &Grid<Option<Tile>> {
        &self.layers[layer.index()]
    }

    pub fn tile(&self, layer: TileLayer, pos: Position) -> Option<Tile> {
        self.layer(layer).get(pos).copied().flatten()
    }

    pub fn set(&mut self, layer: TileLayer, pos: Position, tile: Tile) -> bool {
        self.layers[layer.index()].set(pos, Some(tile))
    }

    pub fn clear(&mut self, layer: TileLayer, pos: Position) -> Option<Tile> {
        self.layers[layer.index()]
            .get_mut(pos)
            .and_then(|cell| cell.take())
    }

    /// Walls block; so does everything off the map.
    pub fn is_wall(&self, pos: Position) -> bool {
        !self.in_bounds(pos) || self.tile(TileLayer::Walls, pos).is_some()
    }

    pub fn blocks_sight(&self, pos: Position) -> bool {
        self.is_wall(pos)
    }

    /// Top-most drawable tile at `pos`, skipping spawn markers.
    pub fn visible_tile(&self, pos: Position) -> Option<Tile> {
        TileLayer::DRAW_ORDER
            .iter()
            .find_map(|layer| self.tile(*layer, pos))
    }

    /// Every non-empty cell of every layer, for inspection tools.
    pub fn cells(&self) -> impl Iterator<Item = (TileLayer, Position, Tile)> + '_ {
        TileLayer::iter().flat_map(move |layer| {
            self.layer(layer)
                .iter()
                .filter_map(move |(pos, tile)| tile.map(|t| (layer, pos, t)))
        })
    }
}
