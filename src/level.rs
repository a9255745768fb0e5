//! One dungeon floor: its map, its entities and the per-tick pipeline.

use hecs::Entity;

use dungeon::{Grid, LevelBlueprint, TileLayer, TileMap};
use error::SimError;

use crate::ai::{ChaseSystem, WanderSystem};
use crate::config::SimConfig;
use crate::ecs::{
    BlocksMovement, Door, EntityStore, LineOfSight, PlayerIntent, Position, StableId,
};
use crate::entity_factory::EntityFactory;
use crate::event_bus::{EventBus, GameEvent};
use crate::navigation::{BlockingView, DistanceMap, Sight, traverse_line_of_sight};
use crate::rng::SimRng;
use crate::snapshot::{PersistedEntity, RenderSnapshot};
use crate::spatial::SpatialIndex;
use crate::systems::{
    ActionPointSystem, BuffSystem, CombatSystem, DeathSystem, LevelExit, PlayerIntentSystem,
    Stairs, System, SystemContext, SystemResult,
};

pub struct Level {
    depth: usize,
    map: TileMap,
    store: EntityStore,
    spatial: SpatialIndex,
    /// Walls-only distances to the player, refreshed at the start of a tick
    player_map: Option<DistanceMap>,
    visible: Grid<bool>,
    seen: Grid<bool>,
    rng: SimRng,
    config: SimConfig,
    stairs: Stairs,
    turn: u64,
    systems: Vec<Box<dyn System>>,
}

impl Level {
    /// Builds a populated level from a parsed map.
    ///
    /// Every spawn marker becomes an entity. Two movement-blocking entities
    /// on one tile is a content error.
    pub fn from_blueprint(
        blueprint: LevelBlueprint,
        factory: &EntityFactory,
        config: SimConfig,
        seed: u64,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let LevelBlueprint {
            mut map,
            start,
            end,
            spawns,
        } = blueprint;

        let mut store = EntityStore::new();
        for spawn in &spawns {
            factory.spawn_marker(&mut store, spawn.marker, spawn.position)?;
            map.clear(TileLayer::EntitySpawn, spawn.position);
        }

        let mut claimed = Grid::new(map.width(), map.height(), false);
        for (_, pos) in store
            .world()
            .query::<(&Position, &BlocksMovement)>()
            .iter()
            .map(|(e, (pos, _))| (e, *pos))
        {
            if claimed.get(pos) == Some(&true) {
                return Err(SimError::OverlappingBlockers { x: pos.x, y: pos.y });
            }
            claimed.set(pos, true);
        }

        let (width, height) = (map.width(), map.height());
        let mut level = Self {
            depth: 0,
            map,
            store,
            spatial: SpatialIndex::new(width, height),
            player_map: None,
            visible: Grid::new(width, height, false),
            seen: Grid::new(width, height, false),
            rng: SimRng::new(seed),
            config,
            stairs: Stairs { start, end },
            turn: 0,
            systems: default_systems(),
        };
        level.refresh_view();
        Ok(level)
    }

    /// Advances the level by one tick.
    ///
    /// Returns the exit the player took, if any. Death is resolved even on a
    /// tick cut short by a stair exit.
    pub fn tick(&mut self, bus: &mut EventBus) -> Option<LevelExit> {
        self.turn += 1;
        self.refresh_view();

        let mut ctx = SystemContext {
            store: &mut self.store,
            bus,
            map: &self.map,
            spatial: &mut self.spatial,
            rng: &mut self.rng,
            config: &self.config,
            player_map: self.player_map.as_ref(),
            stairs: self.stairs,
            turn: self.turn,
            exit_request: None,
        };

        for system in self.systems.iter_mut() {
            match system.run(&mut ctx) {
                SystemResult::Continue => {}
                SystemResult::Stop => break,
                SystemResult::Error(msg) => log::warn!("{} failed: {msg}", system.name()),
            }
        }
        if let SystemResult::Error(msg) = DeathSystem.run(&mut ctx) {
            log::warn!("DeathSystem failed: {msg}");
        }

        let exit = ctx.exit_request;
        ctx.bus.publish(GameEvent::TurnEnded { turn: self.turn });
        log::debug!(
            "depth {} turn {} done, {} entities",
            self.depth,
            self.turn,
            self.store.len()
        );
        exit
    }

    /// Rebuilds the spatial index, the player's distance map and the field of
    /// view. Runs at the start of every tick.
    pub fn refresh_view(&mut self) {
        self.spatial.rebuild(&self.store);
        self.visible.fill(false);

        let Some(player) = self.store.find_player() else {
            self.player_map = None;
            return;
        };
        let Some(origin) = self.store.position(player) else {
            self.player_map = None;
            return;
        };

        let map = &self.map;
        self.player_map = Some(DistanceMap::compute(
            map.width(),
            map.height(),
            &[origin],
            |p| map.is_wall(p),
        ));

        let range = self
            .store
            .get::<LineOfSight>(player)
            .map_or(self.config.default_sight_range, |l| l.range);
        let (store, spatial) = (&self.store, &self.spatial);
        let (visible, seen) = (&mut self.visible, &mut self.seen);
        traverse_line_of_sight(origin, range, |p| {
            if !map.in_bounds(p) {
                return Sight::Blocked;
            }
            visible.set(p, true);
            seen.set(p, true);
            let closed_door = spatial
                .occupant(p)
                .and_then(|e| store.get::<Door>(e))
                .is_some_and(|d| !d.open);
            if p != origin && (map.blocks_sight(p) || closed_door) {
                Sight::Blocked
            } else {
                Sight::Clear
            }
        });
    }

    /// Appends a system that runs after the built-in gameplay passes.
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Wall or movement-blocking entity, as of the last index rebuild.
    pub fn is_blocked(&self, pos: Position) -> bool {
        BlockingView::new(&self.map, &self.spatial).is_blocked(pos)
    }

    /// The blocking entity on `pos`.
    pub fn entity_at(&self, pos: Position) -> Option<Entity> {
        self.spatial.occupant(pos)
    }

    /// Everything standing on `pos`, blocking or not, oldest first.
    pub fn entities_at(&self, pos: Position) -> Vec<Entity> {
        let mut found: Vec<(StableId, Entity)> = self
            .store
            .world()
            .query::<(&Position, &StableId)>()
            .iter()
            .filter(|(_, (p, _))| **p == pos)
            .map(|(e, (_, id))| (*id, e))
            .collect();
        found.sort();
        found.into_iter().map(|(_, e)| e).collect()
    }

    pub fn player(&self) -> Option<Entity> {
        self.store.find_player()
    }

    pub fn player_map(&self) -> Option<&DistanceMap> {
        self.player_map.as_ref()
    }

    pub fn is_visible(&self, pos: Position) -> bool {
        self.visible.get(pos).copied().unwrap_or(false)
    }

    pub fn is_seen(&self, pos: Position) -> bool {
        self.seen.get(pos).copied().unwrap_or(false)
    }

    /// Queues the player's action for the next tick. `false` without a player.
    pub fn set_player_intent(&mut self, intent: PlayerIntent) -> bool {
        match self.store.find_player() {
            Some(player) => self.store.insert(player, intent),
            None => false,
        }
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::capture(
            self.depth,
            self.turn,
            &self.map,
            &self.store,
            &self.visible,
            &self.seen,
        )
    }

    /// Saveable records of every entity, ordered by stable id.
    pub fn persistent_entities(&self) -> impl Iterator<Item = (StableId, PersistedEntity)> + '_ {
        let mut ids: Vec<(StableId, Entity)> = self
            .store
            .world()
            .query::<&StableId>()
            .iter()
            .map(|(e, id)| (*id, e))
            .collect();
        ids.sort();
        ids.into_iter()
            .map(|(id, e)| (id, PersistedEntity::capture(&self.store, e)))
    }

    /// Takes `entity` out of `from` and puts it on `at`, or on the closest
    /// free tile when `at` is taken. Returns the new handle.
    pub fn receive(
        &mut self,
        from: &mut EntityStore,
        entity: Entity,
        at: Position,
    ) -> Option<Entity> {
        self.spatial.rebuild(&self.store);
        let spot = self.nearest_free(at)?;
        let arrived = from.transfer_to(entity, &mut self.store)?;
        self.store.insert(arrived, spot);
        self.refresh_view();
        Some(arrived)
    }

    /// Closest unblocked tile reachable from `pos` around walls, ties broken
    /// by row then column.
    pub fn nearest_free(&self, pos: Position) -> Option<Position> {
        if !self.is_blocked(pos) {
            return Some(pos);
        }
        let reach = DistanceMap::compute(self.map.width(), self.map.height(), &[pos], |p| {
            self.map.is_wall(p)
        });
        self.map
            .layer(TileLayer::Ground)
            .positions()
            .filter(|p| reach.is_reachable(*p) && !self.is_blocked(*p))
            .min_by_key(|p| (reach.get(*p), p.y, p.x))
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn stairs(&self) -> Stairs {
        self.stairs
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }
}

fn default_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(PlayerIntentSystem),
        Box::new(WanderSystem),
        Box::new(ChaseSystem),
        Box::new(CombatSystem),
        Box::new(BuffSystem),
        Box::new(ActionPointSystem),
    ]
}
