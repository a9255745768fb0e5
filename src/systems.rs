//! Gameplay passes run once per tick, in a fixed order, by the level.
//!
//! Systems are stateless; everything they touch is lent to them for one call
//! through [`SystemContext`].

use hecs::Entity;

use ::combat::{Combat, Combatant};
use dungeon::TileMap;
use error::MoveError;

use crate::config::SimConfig;
use crate::ecs::{
    ActionPoints, AttackIntent, AttackPower, BlocksMovement, BuffKind, Buffs, Door, EntityStore,
    Faction, Health, LootTable, Player, PlayerIntent, Position,
};
use crate::entity_factory;
use crate::event_bus::{EventBus, GameEvent, LogLevel};
use crate::navigation::{BlockingView, DistanceMap};
use crate::rng::SimRng;
use crate::spatial::SpatialIndex;

pub enum SystemResult {
    Continue,
    /// Skip the remaining gameplay systems this tick; the death pass still runs
    Stop,
    Error(String),
}

pub trait System {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult;
}

/// Which way the player asked to leave the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelExit {
    Up,
    Down,
}

/// Stair positions of the level being ticked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stairs {
    pub start: Position,
    pub end: Position,
}

/// What a successful [`SystemContext::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved,
    OpenedDoor(Entity),
}

/// Everything a system may read or change during one tick.
pub struct SystemContext<'a> {
    pub store: &'a mut EntityStore,
    pub bus: &'a mut EventBus,
    pub map: &'a TileMap,
    pub spatial: &'a mut SpatialIndex,
    pub rng: &'a mut SimRng,
    pub config: &'a SimConfig,
    /// Walls-only distance map to the player, refreshed at tick start
    pub player_map: Option<&'a DistanceMap>,
    pub stairs: Stairs,
    pub turn: u64,
    /// Set when the player took the stairs this tick
    pub exit_request: Option<LevelExit>,
}

impl SystemContext<'_> {
    pub fn view(&self) -> BlockingView<'_> {
        BlockingView::new(self.map, self.spatial)
    }

    pub fn is_blocked(&self, pos: Position) -> bool {
        self.view().is_blocked(pos)
    }

    /// Walls and closed doors stop sight; creatures do not.
    pub fn blocks_sight(&self, pos: Position) -> bool {
        self.map.blocks_sight(pos) || self.closed_door_at(pos).is_some()
    }

    pub fn closed_door_at(&self, pos: Position) -> Option<Entity> {
        self.spatial
            .occupant(pos)
            .filter(|e| self.store.get::<Door>(*e).is_some_and(|d| !d.open))
    }

    pub fn can_afford(&self, entity: Entity, cost: u32) -> bool {
        self.store
            .get::<ActionPoints>(entity)
            .is_none_or(|ap| ap.can_afford(cost))
    }

    fn spend(&mut self, entity: Entity, cost: u32) {
        self.store.update::<ActionPoints, _>(entity, |ap| ap.spend(cost));
    }

    /// One orthogonal step onto `to`, or opening the closed door standing
    /// there. Costs the move price either way.
    pub fn advance(&mut self, entity: Entity, to: Position) -> Result<Step, MoveError> {
        let from = self.store.position(entity).ok_or(MoveError::NoPosition)?;
        if !self.map.in_bounds(to) {
            return Err(MoveError::OutOfBounds { x: to.x, y: to.y });
        }
        if self.map.is_wall(to) {
            return Err(MoveError::Blocked { x: to.x, y: to.y });
        }
        let cost = self.config.move_cost;
        if let Some(ap) = self.store.get::<ActionPoints>(entity) {
            if !ap.can_afford(cost) {
                return Err(MoveError::InsufficientActionPoints {
                    have: ap.current,
                    need: cost,
                });
            }
        }

        match self.spatial.occupant(to) {
            Some(occupant) if occupant != entity => {
                if self.closed_door_at(to) != Some(occupant) {
                    return Err(MoveError::Blocked { x: to.x, y: to.y });
                }
                self.store.insert(occupant, Door { open: true });
                self.store.remove::<BlocksMovement>(occupant);
                self.spatial.clear(to);
                self.spend(entity, cost);
                self.bus.publish(GameEvent::DoorOpened {
                    entity,
                    door: occupant,
                    position: to,
                });
                Ok(Step::OpenedDoor(occupant))
            }
            _ => {
                self.store.insert(entity, to);
                if self.store.has::<BlocksMovement>(entity) {
                    self.spatial.relocate(entity, from, to);
                }
                self.spend(entity, cost);
                self.bus.publish(GameEvent::EntityMoved { entity, from, to });
                Ok(Step::Moved)
            }
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store
            .get::<Health>(entity)
            .is_some_and(|h| !h.is_dead())
    }

    pub fn log(&mut self, message: impl Into<String>, level: LogLevel) {
        self.bus.publish(GameEvent::LogMessage {
            message: message.into(),
            level,
        });
    }
}

// ========== Player ==========

/// Turns the player's pending [`PlayerIntent`] into a move, an attack
/// intent, a door opening or a stair exit.
pub struct PlayerIntentSystem;

impl System for PlayerIntentSystem {
    fn name(&self) -> &str {
        "PlayerIntentSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let Some(player) = ctx.store.find_player() else {
            return SystemResult::Continue;
        };
        let Some(intent) = ctx.store.remove::<PlayerIntent>(player) else {
            return SystemResult::Continue;
        };
        let Some(pos) = ctx.store.position(player) else {
            return SystemResult::Error(format!("player {player:?} has no position"));
        };

        match intent {
            PlayerIntent::Wait => {
                let cost = ctx.config.wait_cost;
                if ctx.can_afford(player, cost) {
                    ctx.spend(player, cost);
                } else {
                    ctx.log("You are too exhausted to act", LogLevel::Info);
                }
            }
            PlayerIntent::Attack(target) => {
                ctx.store.insert(player, AttackIntent { target });
            }
            PlayerIntent::Move(dir) => {
                let to = pos.offset(dir);
                let hostile = ctx
                    .spatial
                    .occupant(to)
                    .filter(|occ| is_hostile_pair(ctx.store, player, *occ));
                if let Some(target) = hostile {
                    ctx.store.insert(player, AttackIntent { target });
                    return SystemResult::Continue;
                }
                match ctx.advance(player, to) {
                    Ok(_) => {}
                    Err(MoveError::Blocked { .. }) | Err(MoveError::OutOfBounds { .. }) => {
                        ctx.bus.publish(GameEvent::MoveBlocked {
                            entity: player,
                            at: to,
                        });
                        let message = match ctx.spatial.occupant(to) {
                            Some(occ) => format!("{} is in the way", ctx.store.name(occ)),
                            None => "You bump into a wall".to_string(),
                        };
                        ctx.log(message, LogLevel::Info);
                    }
                    Err(e @ MoveError::InsufficientActionPoints { .. }) => {
                        log::debug!("player move skipped: {e}");
                        ctx.log("You are too exhausted to move", LogLevel::Info);
                    }
                    Err(e) => log::debug!("player move skipped: {e}"),
                }
            }
            PlayerIntent::Descend | PlayerIntent::Ascend => {
                let (stairs, exit, word) = if intent == PlayerIntent::Descend {
                    (ctx.stairs.end, LevelExit::Down, "down")
                } else {
                    (ctx.stairs.start, LevelExit::Up, "up")
                };
                if pos == stairs {
                    ctx.exit_request = Some(exit);
                    return SystemResult::Stop;
                }
                ctx.log(format!("There are no stairs {word} here"), LogLevel::Info);
            }
        }
        SystemResult::Continue
    }
}

pub(crate) fn is_hostile_pair(store: &EntityStore, a: Entity, b: Entity) -> bool {
    match (store.get::<Faction>(a), store.get::<Faction>(b)) {
        (Some(fa), Some(fb)) => fa.is_hostile_to(fb),
        _ => false,
    }
}

// ========== Combat ==========

/// Melee snapshot of one entity, written back after the blow.
struct Fighter {
    name: String,
    health: Health,
    attack: u32,
    armor: u32,
}

impl Fighter {
    fn load(store: &EntityStore, entity: Entity) -> Option<Self> {
        let buffs = store.get::<Buffs>(entity).unwrap_or_default();
        Some(Self {
            name: store.name(entity),
            health: store.get::<Health>(entity)?,
            attack: store.get::<AttackPower>(entity).map_or(0, |a| a.0)
                + buffs.total(BuffKind::Strength),
            armor: buffs.total(BuffKind::Armor),
        })
    }
}

impl Combatant for Fighter {
    fn name(&self) -> &str {
        &self.name
    }

    fn hp(&self) -> u32 {
        self.health.current
    }

    fn max_hp(&self) -> u32 {
        self.health.max
    }

    fn attack_power(&self) -> u32 {
        self.attack
    }

    fn armor(&self) -> u32 {
        self.armor
    }

    fn take_damage(&mut self, amount: u32) -> u32 {
        self.health.apply_damage(amount)
    }
}

/// Resolves every pending [`AttackIntent`] exactly once.
///
/// A defender already at zero health can still be struck this tick; it is
/// only removed by the death pass afterwards.
pub struct CombatSystem;

impl System for CombatSystem {
    fn name(&self) -> &str {
        "CombatSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let intents: Vec<(Entity, AttackIntent)> = ctx
            .store
            .world()
            .query::<&AttackIntent>()
            .iter()
            .map(|(e, intent)| (e, *intent))
            .collect();

        for (attacker, intent) in intents {
            ctx.store.remove::<AttackIntent>(attacker);
            Self::resolve(ctx, attacker, intent.target);
        }
        SystemResult::Continue
    }
}

impl CombatSystem {
    fn resolve(ctx: &mut SystemContext<'_>, attacker: Entity, defender: Entity) {
        let is_player = ctx.store.has::<Player>(attacker);
        if !ctx.is_alive(attacker) {
            return;
        }
        let in_reach = match (ctx.store.position(attacker), ctx.store.position(defender)) {
            (Some(a), Some(d)) => a.is_adjacent(d),
            _ => false,
        };
        if !in_reach {
            log::debug!("{attacker:?} dropped attack on {defender:?}: out of reach");
            if is_player {
                ctx.log("There is nothing there to attack", LogLevel::Info);
            }
            return;
        }
        let cost = ctx.config.attack_cost;
        if !ctx.can_afford(attacker, cost) {
            log::debug!("{attacker:?} too exhausted to attack");
            if is_player {
                ctx.log("You are too exhausted to attack", LogLevel::Info);
            }
            return;
        }

        let (Some(striker), Some(mut target)) = (
            Fighter::load(ctx.store, attacker),
            Fighter::load(ctx.store, defender),
        ) else {
            return;
        };

        let result = Combat::strike(&striker, &mut target);
        ctx.store.insert(defender, target.health);
        ctx.spend(attacker, cost);
        ctx.bus.publish(GameEvent::EntityAttacked {
            attacker,
            defender,
            attacker_name: striker.name,
            defender_name: target.name,
            damage: result.damage,
            remaining_hp: result.remaining_hp,
        });
    }
}

// ========== Upkeep ==========

/// Counts buff durations down and announces the ones that run out.
pub struct BuffSystem;

impl System for BuffSystem {
    fn name(&self) -> &str {
        "BuffSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let mut expired = Vec::new();
        for (entity, buffs) in ctx.store.world_mut().query_mut::<&mut Buffs>() {
            expired.extend(buffs.tick().into_iter().map(|b| (entity, b.kind)));
        }
        for (entity, kind) in expired {
            ctx.bus.publish(GameEvent::BuffExpired { entity, kind });
        }
        SystemResult::Continue
    }
}

/// Regenerates action points at the end of the tick.
pub struct ActionPointSystem;

impl System for ActionPointSystem {
    fn name(&self) -> &str {
        "ActionPointSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        for (_, ap) in ctx.store.world_mut().query_mut::<&mut ActionPoints>() {
            ap.regenerate();
        }
        SystemResult::Continue
    }
}

// ========== Death ==========

/// Removes everything at zero health, after all combat of the tick.
///
/// Each corpse announces its death once. Non-players carrying a loot table
/// may leave a container behind before they go.
pub struct DeathSystem;

impl System for DeathSystem {
    fn name(&self) -> &str {
        "DeathSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let dead: Vec<Entity> = ctx
            .store
            .world()
            .query::<&Health>()
            .iter()
            .filter(|(_, h)| h.is_dead())
            .map(|(e, _)| e)
            .collect();

        for entity in dead {
            let name = ctx.store.name(entity);
            let position = ctx.store.position(entity);
            let was_player = ctx.store.has::<Player>(entity);

            ctx.bus.publish(GameEvent::EntityDied {
                entity,
                name: name.clone(),
                position: position.unwrap_or_default(),
                was_player,
            });

            if let (false, Some(pos), Some(table)) =
                (was_player, position, ctx.store.get::<LootTable>(entity))
            {
                if let Some(item) = table.roll(ctx.rng.rng_mut()) {
                    let container =
                        entity_factory::spawn_loot(ctx.store, pos, vec![item.clone()]);
                    ctx.bus.publish(GameEvent::LootDropped {
                        container,
                        source_name: name,
                        position: pos,
                        item,
                    });
                }
            }

            if let Some(pos) = position {
                if ctx.spatial.occupant(pos) == Some(entity) {
                    ctx.spatial.clear(pos);
                }
            }
            ctx.store.despawn(entity);
        }
        SystemResult::Continue
    }
}
