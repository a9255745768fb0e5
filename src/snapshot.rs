//! Read-only views handed to the renderer and to the save layer.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use dungeon::{Grid, TileMap};

use crate::ecs::{
    ActionPoints, Ai, AiBehavior, AttackPower, BlocksMovement, Buffs, Door, EntityStore, Faction,
    Health, LineOfSight, LootContainer, LootTable, Name, Player, Position, Renderable, StableId,
    TileColor,
};

/// What one map cell looks like this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCell {
    pub glyph: char,
    pub color: TileColor,
    /// In the player's field of view right now
    pub visible: bool,
    /// Seen at least once
    pub seen: bool,
}

impl Default for RenderCell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            color: TileColor::default(),
            visible: false,
            seen: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub depth: usize,
    pub turn: u64,
    cells: Grid<RenderCell>,
}

impl RenderSnapshot {
    /// Stacks terrain layers, then draws the highest-ordered entity of each
    /// visible tile on top. Unseen tiles stay blank.
    pub fn capture(
        depth: usize,
        turn: u64,
        map: &TileMap,
        store: &EntityStore,
        visible: &Grid<bool>,
        seen: &Grid<bool>,
    ) -> Self {
        let mut cells = Grid::new(map.width(), map.height(), RenderCell::default());
        for pos in visible.positions() {
            let is_visible = visible.get(pos).copied().unwrap_or(false);
            let is_seen = seen.get(pos).copied().unwrap_or(false);
            let mut cell = RenderCell {
                visible: is_visible,
                seen: is_seen,
                ..RenderCell::default()
            };
            if is_seen {
                if let Some(tile) = map.visible_tile(pos) {
                    cell.glyph = tile.glyph;
                    cell.color = tile.color;
                }
            }
            cells.set(pos, cell);
        }

        let mut top: Grid<Option<u8>> = Grid::new(map.width(), map.height(), None);
        for (_, (pos, renderable)) in store.world().query::<(&Position, &Renderable)>().iter() {
            if !visible.get(*pos).copied().unwrap_or(false) {
                continue;
            }
            if top.get(*pos).copied().flatten().is_some_and(|o| o > renderable.order) {
                continue;
            }
            top.set(*pos, Some(renderable.order));
            if let Some(cell) = cells.get_mut(*pos) {
                cell.glyph = renderable.glyph;
                cell.color = renderable.color;
            }
        }

        Self { depth, turn, cells }
    }

    pub fn width(&self) -> i32 {
        self.cells.width()
    }

    pub fn height(&self) -> i32 {
        self.cells.height()
    }

    pub fn cell(&self, pos: Position) -> Option<RenderCell> {
        self.cells.get(pos).copied()
    }

    /// Glyph rows, handy for debugging and for tests.
    pub fn to_lines(&self) -> Vec<String> {
        (0..self.height())
            .map(|y| {
                (0..self.width())
                    .map(|x| self.cells.get(Position::new(x, y)).map_or(' ', |c| c.glyph))
                    .collect()
            })
            .collect()
    }
}

/// The saved subset of an entity's components.
///
/// Runtime-only state (pending intents, AI targets held by handle) is left
/// out; a restored monster starts over in `Idle`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntity {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub position: Option<Position>,
    pub renderable: Option<Renderable>,
    pub health: Option<Health>,
    pub action_points: Option<ActionPoints>,
    pub faction: Option<Faction>,
    pub sight: Option<u32>,
    pub attack_power: Option<u32>,
    pub behavior: Option<AiBehavior>,
    pub buffs: Option<Buffs>,
    pub door: Option<Door>,
    pub loot_table: Option<LootTable>,
    pub loot: Option<Vec<String>>,
    #[serde(default)]
    pub player: bool,
    #[serde(default)]
    pub blocks_movement: bool,
}

impl PersistedEntity {
    pub fn capture(store: &EntityStore, entity: Entity) -> Self {
        Self {
            id: store.get::<StableId>(entity).map(|s| s.0),
            name: store.get::<Name>(entity).map(|n| n.0),
            position: store.position(entity),
            renderable: store.get::<Renderable>(entity),
            health: store.get::<Health>(entity),
            action_points: store.get::<ActionPoints>(entity),
            faction: store.get::<Faction>(entity),
            sight: store.get::<LineOfSight>(entity).map(|l| l.range),
            attack_power: store.get::<AttackPower>(entity).map(|a| a.0),
            behavior: store.get::<Ai>(entity).map(|ai| ai.behavior),
            buffs: store.get::<Buffs>(entity),
            door: store.get::<Door>(entity),
            loot_table: store.get::<LootTable>(entity),
            loot: store.get::<LootContainer>(entity).map(|c| c.items),
            player: store.has::<Player>(entity),
            blocks_movement: store.has::<BlocksMovement>(entity),
        }
    }

    /// Spawns the record into `store`, keeping its stable id.
    pub fn restore(self, store: &mut EntityStore) -> Entity {
        let entity = match self.id {
            Some(id) => store.spawn((StableId(id),)),
            None => store.spawn(()),
        };
        if let Some(name) = self.name {
            store.insert(entity, Name(name));
        }
        if let Some(pos) = self.position {
            store.insert(entity, pos);
        }
        if let Some(r) = self.renderable {
            store.insert(entity, r);
        }
        if let Some(h) = self.health {
            store.insert(entity, h);
        }
        if let Some(ap) = self.action_points {
            store.insert(entity, ap);
        }
        if let Some(f) = self.faction {
            store.insert(entity, f);
        }
        if let Some(range) = self.sight {
            store.insert(entity, LineOfSight { range });
        }
        if let Some(power) = self.attack_power {
            store.insert(entity, AttackPower(power));
        }
        if let Some(behavior) = self.behavior {
            store.insert(entity, Ai::new(behavior));
        }
        if let Some(buffs) = self.buffs {
            store.insert(entity, buffs);
        }
        if let Some(door) = self.door {
            store.insert(entity, door);
        }
        if let Some(table) = self.loot_table {
            store.insert(entity, table);
        }
        if let Some(items) = self.loot {
            store.insert(entity, LootContainer { items });
        }
        if self.player {
            store.insert(entity, Player);
        }
        if self.blocks_movement {
            store.insert(entity, BlocksMovement);
        }
        entity
    }
}
