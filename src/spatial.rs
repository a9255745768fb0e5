//! Per-level lookup from tile to the blocking entity standing on it.

use hecs::Entity;

use crate::ecs::{BlocksMovement, EntityStore, Position};
use dungeon::Grid;

/// Dense occupancy grid of movement-blocking entities.
///
/// Rebuilt from scratch at the start of every tick. Systems that move an
/// entity during the tick call [`relocate`](Self::relocate) so later movers
/// in the same tick see the new occupancy.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    occupants: Grid<Option<Entity>>,
}

impl SpatialIndex {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            occupants: Grid::new(width, height, None),
        }
    }

    pub fn width(&self) -> i32 {
        self.occupants.width()
    }

    pub fn height(&self) -> i32 {
        self.occupants.height()
    }

    /// Clears the grid and repopulates it from every entity that has a
    /// position and blocks movement. Off-grid entities are skipped.
    pub fn rebuild(&mut self, store: &EntityStore) {
        self.occupants.fill(None);
        let mut query = store.world().query::<(&Position, &BlocksMovement)>();
        for (entity, (pos, _)) in query.iter() {
            match self.occupants.get_mut(*pos) {
                Some(Some(existing)) => {
                    log::warn!(
                        "{entity:?} and {existing:?} both block ({}, {}); keeping {existing:?}",
                        pos.x,
                        pos.y
                    );
                }
                Some(slot) => *slot = Some(entity),
                None => log::debug!("{entity:?} is off the grid at ({}, {})", pos.x, pos.y),
            }
        }
    }

    /// Blocking entity on `pos`, if any. `None` off the grid.
    pub fn occupant(&self, pos: Position) -> Option<Entity> {
        self.occupants.get(pos).copied().flatten()
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.occupant(pos).is_some()
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.occupants.in_bounds(pos)
    }

    /// Records a move made mid-tick.
    pub fn relocate(&mut self, entity: Entity, from: Position, to: Position) {
        if self.occupant(from) == Some(entity) {
            self.occupants.set(from, None);
        }
        self.occupants.set(to, Some(entity));
    }

    /// Forgets whatever blocks `pos` (an opened door, a removed corpse).
    pub fn clear(&mut self, pos: Position) {
        self.occupants.set(pos, None);
    }

    /// Every occupied tile in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, Entity)> + '_ {
        self.occupants
            .iter()
            .filter_map(|(pos, slot)| slot.map(|e| (pos, e)))
    }
}
