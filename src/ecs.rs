//! Entity store and the component records systems operate on.

use hecs::{Component, DynamicBundle, Entity, World};
use serde::{Deserialize, Serialize};

pub use combat::{Buff, BuffKind, Buffs, LootTable};
pub use dungeon::{Direction, Position, TileColor};

/// Registry of every entity on one level.
///
/// Handles are opaque and may be reused after despawn, so anything that must
/// survive a reload is keyed by [`StableId`] instead.
pub struct EntityStore {
    world: World,
    next_stable_id: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            next_stable_id: 1,
        }
    }

    /// Spawns `bundle`, tagging it with a fresh [`StableId`] unless it
    /// already carries one.
    pub fn spawn(&mut self, bundle: impl DynamicBundle) -> Entity {
        let entity = self.world.spawn(bundle);
        match self.get::<StableId>(entity) {
            Some(StableId(id)) => self.next_stable_id = self.next_stable_id.max(id + 1),
            None => {
                let id = StableId(self.next_stable_id);
                self.next_stable_id += 1;
                let _ = self.world.insert_one(entity, id);
            }
        }
        entity
    }

    /// Removes an entity. Returns `false` if it was already gone.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity).is_ok()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    /// Copy of a component, `None` for a dead handle or a missing component.
    pub fn get<T: Component + Clone>(&self, entity: Entity) -> Option<T> {
        self.world.get::<&T>(entity).ok().map(|c| (*c).clone())
    }

    /// Like [`get`](Self::get) for callers that know the component exists.
    ///
    /// # Panics
    /// If the entity is gone or lacks `T`; that is a broken invariant.
    pub fn expect<T: Component + Clone>(&self, entity: Entity) -> T {
        match self.get::<T>(entity) {
            Some(c) => c,
            None => panic!(
                "entity {entity:?} is missing required component {}",
                std::any::type_name::<T>()
            ),
        }
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.world.get::<&T>(entity).is_ok()
    }

    /// Adds or replaces a component. `false` for a dead handle.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        self.world.insert_one(entity, component).is_ok()
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.world.remove_one::<T>(entity).ok()
    }

    /// Runs `f` on a component in place. `None` when it is absent.
    pub fn update<T: Component, R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        self.world
            .query_one_mut::<&mut T>(entity)
            .ok()
            .map(f)
    }

    pub fn position(&self, entity: Entity) -> Option<Position> {
        self.get::<Position>(entity)
    }

    /// Display name, falling back to a generic word for nameless things.
    pub fn name(&self, entity: Entity) -> String {
        self.get::<Name>(entity)
            .map(|n| n.0)
            .unwrap_or_else(|| "something".to_string())
    }

    pub fn find_player(&self) -> Option<Entity> {
        self.world
            .query::<&Player>()
            .iter()
            .map(|(e, _)| e)
            .next()
    }

    /// Every entity carrying `T`, in storage order.
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.world.query::<&T>().iter().map(|(e, _)| e).collect()
    }

    /// Moves an entity with all its components into `dest`.
    ///
    /// The source handle becomes dead; the returned handle is only valid in
    /// `dest`. Its [`StableId`] travels along.
    pub fn transfer_to(&mut self, entity: Entity, dest: &mut EntityStore) -> Option<Entity> {
        let taken = self.world.take(entity).ok()?;
        Some(dest.spawn(taken))
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Components ==========

/// Marks the player-controlled entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player;

/// Marks entities that occupy their tile exclusively
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksMovement;

/// Identity that survives save/load and level transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StableId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renderable {
    pub glyph: char,
    pub color: TileColor,
    /// Higher draws on top when several entities share a tile
    pub order: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Subtracts `amount`, clamping at zero; returns damage dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.current);
        self.current -= dealt;
        dealt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Player,
    Monster,
    /// Never fights and is never fought
    Neutral,
}

impl Faction {
    pub fn is_hostile_to(self, other: Faction) -> bool {
        self != other && self != Faction::Neutral && other != Faction::Neutral
    }
}

/// Sight range in tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOfSight {
    pub range: u32,
}

/// Time budget: steps cost points, points regenerate once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPoints {
    pub current: u32,
    pub max: u32,
    pub regen: u32,
}

impl ActionPoints {
    pub fn new(max: u32, regen: u32) -> Self {
        Self {
            current: max,
            max,
            regen,
        }
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        self.current >= cost
    }

    /// Deducts `cost` if affordable.
    pub fn spend(&mut self, cost: u32) -> bool {
        if self.can_afford(cost) {
            self.current -= cost;
            true
        } else {
            false
        }
    }

    pub fn regenerate(&mut self) {
        self.current = (self.current + self.regen).min(self.max);
    }
}

/// Damage of an unbuffed blow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPower(pub u32);

/// Pending melee attack, resolved and removed by the combat pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackIntent {
    pub target: Entity,
}

/// What the player asked for this tick; written by the UI before ticking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerIntent {
    Move(Direction),
    Attack(Entity),
    Wait,
    Descend,
    Ascend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    pub open: bool,
}

/// Items left on the floor, usually by something that died
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootContainer {
    pub items: Vec<String>,
}

// ========== AI ==========

/// Which decision routine drives an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiBehavior {
    /// Idles, strolls about, chases anything hostile it spots
    Wander,
    /// Stands still until it spots something, then hunts it down
    SearchChase,
    /// Never moves; hits whatever hostile stands next to it
    AttackOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiState {
    #[default]
    Idle,
    Wander,
    Search,
    Chase,
}

/// Decision state of a non-player actor.
///
/// The target is held by handle only and re-resolved every tick; a handle
/// that no longer resolves means the target is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ai {
    pub behavior: AiBehavior,
    pub state: AiState,
    pub target: Option<Entity>,
    /// Where the target was last seen
    pub last_seen: Option<Position>,
    /// Where it was seen the tick before that, for predicting its heading
    pub prev_seen: Option<Position>,
    /// Ticks left before an idle wanderer starts moving
    pub idle_ticks: u32,
    /// Ticks left before a search is given up
    pub search_ticks: u32,
}

impl Ai {
    pub fn new(behavior: AiBehavior) -> Self {
        Self {
            behavior,
            state: AiState::Idle,
            target: None,
            last_seen: None,
            prev_seen: None,
            idle_ticks: 0,
            search_ticks: 0,
        }
    }

    /// Best guess of where the target is now: the last sighting pushed
    /// forward by its last observed displacement.
    pub fn predicted_target_position(&self) -> Option<Position> {
        let last = self.last_seen?;
        Some(match self.prev_seen {
            Some(prev) => Position::new(2 * last.x - prev.x, 2 * last.y - prev.y),
            None => last,
        })
    }

    /// Records a fresh sighting of the target.
    pub fn observe(&mut self, target: Entity, at: Position) {
        if self.target != Some(target) {
            self.prev_seen = None;
        } else if self.last_seen != Some(at) {
            self.prev_seen = self.last_seen;
        }
        self.target = Some(target);
        self.last_seen = Some(at);
    }

    pub fn forget_target(&mut self) {
        self.target = None;
        self.last_seen = None;
        self.prev_seen = None;
        self.search_ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spawn_assigns_stable_ids() {
        let mut store = EntityStore::new();
        let a = store.spawn((Position::new(1, 1),));
        let b = store.spawn((Position::new(2, 2), StableId(40)));
        let c = store.spawn((Name("c".into()),));
        assert_eq!(store.get::<StableId>(a), Some(StableId(1)));
        assert_eq!(store.get::<StableId>(b), Some(StableId(40)));
        assert_eq!(store.get::<StableId>(c), Some(StableId(41)));
    }

    #[test]
    fn test_dead_handles_are_quiet() {
        let mut store = EntityStore::new();
        let e = store.spawn((Health::new(5),));
        assert!(store.despawn(e));
        assert!(!store.despawn(e));
        assert!(!store.contains(e));
        assert_eq!(store.get::<Health>(e), None);
        assert!(!store.insert(e, Player));
        assert_eq!(store.name(e), "something");
    }

    #[test]
    #[should_panic(expected = "missing required component")]
    fn test_expect_panics_on_missing_component() {
        let mut store = EntityStore::new();
        let e = store.spawn((Name("rock".into()),));
        let _ = store.expect::<Health>(e);
    }

    #[test]
    fn test_update_in_place() {
        let mut store = EntityStore::new();
        let e = store.spawn((Health::new(10),));
        let dealt = store.update::<Health, _>(e, |h| h.apply_damage(25));
        assert_eq!(dealt, Some(10));
        assert!(store.expect::<Health>(e).is_dead());
    }

    #[test]
    fn test_transfer_keeps_components_and_identity() {
        let mut from = EntityStore::new();
        let mut to = EntityStore::new();
        let e = from.spawn((Player, Name("hero".into()), Health::new(20)));
        let id = from.expect::<StableId>(e);

        let moved = from.transfer_to(e, &mut to).unwrap();
        assert!(!from.contains(e));
        assert_eq!(to.expect::<StableId>(moved), id);
        assert_eq!(to.name(moved), "hero");
        assert_eq!(to.find_player(), Some(moved));
    }

    #[test]
    fn test_faction_hostility() {
        assert!(Faction::Player.is_hostile_to(Faction::Monster));
        assert!(!Faction::Monster.is_hostile_to(Faction::Monster));
        assert!(!Faction::Neutral.is_hostile_to(Faction::Player));
    }

    #[test]
    fn test_action_points() {
        let mut ap = ActionPoints::new(100, 50);
        assert!(ap.spend(100));
        assert!(!ap.spend(1));
        ap.regenerate();
        ap.regenerate();
        ap.regenerate();
        assert_eq!(ap.current, 100);
    }

    #[test]
    fn test_prediction_follows_heading() {
        let mut store = EntityStore::new();
        let target = store.spawn((Player,));
        let mut ai = Ai::new(AiBehavior::SearchChase);
        ai.observe(target, Position::new(3, 3));
        assert_eq!(ai.predicted_target_position(), Some(Position::new(3, 3)));
        ai.observe(target, Position::new(4, 3));
        assert_eq!(ai.predicted_target_position(), Some(Position::new(5, 3)));
        ai.forget_target();
        assert_eq!(ai.predicted_target_position(), None);
    }
}
