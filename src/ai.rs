//! Decision making for non-player actors.
//!
//! Behaviour is data: every actor carries an [`Ai`] record tagged with an
//! [`AiBehavior`]. [`WanderSystem`] drives the wanderers and [`ChaseSystem`]
//! drives hunters and sentries; both share the pursuit routine below.

use hecs::Entity;

use crate::ecs::{
    Ai, AiBehavior, AiState, AttackIntent, Door, Faction, Health, LineOfSight, Player, Position,
    StableId,
};
use crate::event_bus::GameEvent;
use crate::navigation::{DistanceMap, can_see};
use crate::systems::{Step, System, SystemContext, SystemResult};

/// Idle, then stroll between random free tiles; pursue anything hostile.
pub struct WanderSystem;

impl System for WanderSystem {
    fn name(&self) -> &str {
        "WanderSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        for entity in actors(ctx, |b| matches!(b, AiBehavior::Wander)) {
            think(ctx, entity);
        }
        SystemResult::Continue
    }
}

/// Hunters that stand still until they spot prey, and stationary sentries.
pub struct ChaseSystem;

impl System for ChaseSystem {
    fn name(&self) -> &str {
        "ChaseSystem"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        for entity in actors(ctx, |b| {
            matches!(b, AiBehavior::SearchChase | AiBehavior::AttackOnly)
        }) {
            think(ctx, entity);
        }
        SystemResult::Continue
    }
}

/// Living AI actors whose behaviour passes `filter`, in stable-id order.
fn actors(ctx: &SystemContext<'_>, filter: impl Fn(AiBehavior) -> bool) -> Vec<Entity> {
    let mut found: Vec<(Option<StableId>, Entity)> = ctx
        .store
        .world()
        .query::<(&Ai, &Position)>()
        .iter()
        .filter(|(_, (ai, _))| filter(ai.behavior))
        .map(|(e, _)| (ctx.store.get::<StableId>(e), e))
        .collect();
    found.sort_by_key(|(id, _)| *id);
    found
        .into_iter()
        .map(|(_, e)| e)
        .filter(|e| ctx.store.get::<Health>(*e).is_none_or(|h| !h.is_dead()))
        .collect()
}

/// One decision for one actor. Counters tick even when the actor cannot
/// afford to act.
fn think(ctx: &mut SystemContext<'_>, entity: Entity) {
    let Some(pos) = ctx.store.position(entity) else {
        return;
    };
    let mut ai = ctx.store.expect::<Ai>(entity);

    match visible_hostile(ctx, entity, pos, ai.target) {
        Some((target, target_pos)) => {
            if ai.state != AiState::Chase || ai.target != Some(target) {
                transition(ctx, entity, &mut ai, AiState::Chase);
                ctx.bus.publish(GameEvent::TargetAcquired { entity, target });
            }
            ai.observe(target, target_pos);
            ai.search_ticks = 0;
            pursue(ctx, entity, pos, &ai, target, target_pos);
        }
        None => match ai.state {
            AiState::Chase => {
                let target_alive = ai.target.is_some_and(|t| ctx.store.contains(t));
                if target_alive && ai.behavior != AiBehavior::AttackOnly {
                    ai.search_ticks = ctx.config.search_duration;
                    transition(ctx, entity, &mut ai, AiState::Search);
                    search(ctx, entity, pos, &mut ai);
                } else {
                    give_up(ctx, entity, &mut ai);
                }
            }
            AiState::Search => search(ctx, entity, pos, &mut ai),
            AiState::Idle => idle(ctx, entity, &mut ai),
            AiState::Wander => wander(ctx, entity, pos),
        },
    }

    ctx.store.insert(entity, ai);
}

fn transition(ctx: &mut SystemContext<'_>, entity: Entity, ai: &mut Ai, to: AiState) {
    if ai.state == to {
        return;
    }
    log::debug!("{entity:?} {:?} -> {to:?}", ai.state);
    let from = ai.state;
    ai.state = to;
    if to == AiState::Idle {
        ai.idle_ticks = match ai.behavior {
            AiBehavior::Wander => ctx
                .rng
                .random_range(ctx.config.idle_delay_min..=ctx.config.idle_delay_max),
            _ => 0,
        };
    }
    ctx.bus
        .publish(GameEvent::AiStateChanged { entity, from, to });
}

fn give_up(ctx: &mut SystemContext<'_>, entity: Entity, ai: &mut Ai) {
    ai.forget_target();
    transition(ctx, entity, ai, AiState::Idle);
    ctx.bus.publish(GameEvent::TargetLost { entity });
}

fn idle(ctx: &mut SystemContext<'_>, entity: Entity, ai: &mut Ai) {
    if ai.behavior != AiBehavior::Wander {
        return;
    }
    if ai.idle_ticks > 0 {
        ai.idle_ticks -= 1;
    }
    if ai.idle_ticks == 0 {
        transition(ctx, entity, ai, AiState::Wander);
    }
}

/// A random step onto a free orthogonal neighbour; nothing if all are taken.
fn wander(ctx: &mut SystemContext<'_>, entity: Entity, pos: Position) {
    if !ctx.can_afford(entity, ctx.config.move_cost) {
        return;
    }
    let free: Vec<Position> = pos
        .neighbors()
        .into_iter()
        .filter(|n| !ctx.is_blocked(*n))
        .collect();
    if let Some(&to) = ctx.rng.choose(&free) {
        if let Err(e) = ctx.advance(entity, to) {
            log::debug!("{entity:?} wander step skipped: {e}");
        }
    }
}

/// Heads for the predicted last position of the lost target until the
/// search budget runs out.
fn search(ctx: &mut SystemContext<'_>, entity: Entity, pos: Position, ai: &mut Ai) {
    if ai.target.is_none_or(|t| !ctx.store.contains(t)) {
        give_up(ctx, entity, ai);
        return;
    }
    if ai.search_ticks == 0 {
        give_up(ctx, entity, ai);
        return;
    }
    ai.search_ticks -= 1;

    let goal = match (ai.predicted_target_position(), ai.last_seen) {
        (Some(predicted), _) if !ctx.map.is_wall(predicted) => predicted,
        (_, Some(last)) => last,
        _ => return,
    };
    if goal != pos && ctx.can_afford(entity, ctx.config.move_cost) {
        step_toward(ctx, entity, pos, goal, None);
    }
}

/// Attack when adjacent, otherwise close the distance.
fn pursue(
    ctx: &mut SystemContext<'_>,
    entity: Entity,
    pos: Position,
    ai: &Ai,
    target: Entity,
    target_pos: Position,
) {
    if pos.is_adjacent(target_pos) {
        if ctx.can_afford(entity, ctx.config.attack_cost) {
            ctx.store.insert(entity, AttackIntent { target });
        }
        return;
    }
    if ai.behavior == AiBehavior::AttackOnly || !ctx.can_afford(entity, ctx.config.move_cost) {
        return;
    }
    step_toward(ctx, entity, pos, target_pos, Some(target));
}

/// Takes the best free downhill step toward `goal`.
///
/// Chasing the player reuses the level's cached player map; anything else
/// floods a short-range map around the mover. Publishes a diagnostic and
/// holds position when no route exists.
fn step_toward(
    ctx: &mut SystemContext<'_>,
    entity: Entity,
    pos: Position,
    goal: Position,
    target: Option<Entity>,
) -> bool {
    let chasing_player = target.is_some_and(|t| ctx.store.has::<Player>(t));
    let candidates = match ctx.player_map {
        Some(map) if chasing_player => map.downhill_neighbors(pos),
        _ => {
            let view = ctx.view();
            let store = &*ctx.store;
            let local = DistanceMap::compute_bounded(
                ctx.map.width(),
                ctx.map.height(),
                &[goal],
                |p| {
                    if p == pos || p == goal {
                        return view.map.is_wall(p);
                    }
                    match view.spatial.occupant(p) {
                        // Closed doors can be opened on the way
                        Some(occ) => store.get::<Door>(occ).is_none(),
                        None => view.map.is_wall(p),
                    }
                },
                pos,
                ctx.config.chase_radius,
            );
            local.downhill_neighbors(pos)
        }
    };

    if candidates.is_empty() {
        ctx.bus
            .publish(GameEvent::NoPathToTarget { entity, goal });
        return false;
    }

    for next in candidates {
        match ctx.advance(entity, next) {
            Ok(Step::Moved) | Ok(Step::OpenedDoor(_)) => return true,
            Err(e) => log::debug!("{entity:?} cannot step to ({}, {}): {e}", next.x, next.y),
        }
    }
    false
}

/// The hostile this actor should focus on, if any is in sight.
///
/// The current target keeps priority while visible; otherwise the nearest
/// visible hostile wins, ties broken by stable id.
fn visible_hostile(
    ctx: &SystemContext<'_>,
    entity: Entity,
    pos: Position,
    current: Option<Entity>,
) -> Option<(Entity, Position)> {
    let faction = ctx.store.get::<Faction>(entity)?;
    let range = ctx
        .store
        .get::<LineOfSight>(entity)
        .map_or(ctx.config.default_sight_range, |los| los.range);

    let mut candidates: Vec<(i64, Option<StableId>, Entity, Position)> = ctx
        .store
        .world()
        .query::<(&Position, &Faction, &Health)>()
        .iter()
        .filter(|(other, (_, f, h))| {
            *other != entity && faction.is_hostile_to(**f) && !h.is_dead()
        })
        .filter(|(_, (p, _, _))| can_see(pos, **p, range, |t| ctx.blocks_sight(t)))
        .map(|(other, (p, _, _))| {
            (
                pos.distance_squared(*p),
                ctx.store.get::<StableId>(other),
                other,
                *p,
            )
        })
        .collect();

    if let Some(found) = candidates.iter().find(|c| Some(c.2) == current) {
        return Some((found.2, found.3));
    }
    candidates.sort_by_key(|(d, id, _, _)| (*d, *id));
    candidates.first().map(|c| (c.2, c.3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::ecs::{ActionPoints, AttackPower, BlocksMovement, EntityStore, Name};
    use crate::event_bus::{EventBus, EventKind, EventRecorder};
    use crate::rng::SimRng;
    use crate::spatial::SpatialIndex;
    use crate::systems::Stairs;
    use dungeon::{Tile, TileLayer, TileMap};

    struct Fixture {
        store: EntityStore,
        bus: EventBus,
        map: TileMap,
        spatial: SpatialIndex,
        rng: SimRng,
        config: SimConfig,
        recorder: EventRecorder,
    }

    impl Fixture {
        fn new(width: i32, height: i32) -> Self {
            let mut bus = EventBus::new();
            let recorder = EventRecorder::new();
            recorder.attach(&mut bus);
            Self {
                store: EntityStore::new(),
                bus,
                map: TileMap::walled_room(width, height),
                spatial: SpatialIndex::new(width, height),
                rng: SimRng::new(11),
                config: SimConfig::default(),
                recorder,
            }
        }

        fn actor(&mut self, x: i32, y: i32, behavior: AiBehavior) -> Entity {
            self.store.spawn((
                Name("goblin".into()),
                Position::new(x, y),
                Faction::Monster,
                Health::new(10),
                AttackPower(2),
                ActionPoints::new(100, 100),
                LineOfSight { range: 6 },
                BlocksMovement,
                Ai::new(behavior),
            ))
        }

        fn player(&mut self, x: i32, y: i32) -> Entity {
            self.store.spawn((
                Player,
                Name("you".into()),
                Position::new(x, y),
                Faction::Player,
                Health::new(20),
                BlocksMovement,
            ))
        }

        fn tick(&mut self, system: &mut dyn System) {
            self.spatial.rebuild(&self.store);
            let mut ctx = SystemContext {
                store: &mut self.store,
                bus: &mut self.bus,
                map: &self.map,
                spatial: &mut self.spatial,
                rng: &mut self.rng,
                config: &self.config,
                player_map: None,
                stairs: Stairs {
                    start: Position::new(1, 1),
                    end: Position::new(1, 1),
                },
                turn: 0,
                exit_request: None,
            };
            system.run(&mut ctx);
        }
    }

    #[test]
    fn test_chaser_acquires_and_steps_closer() {
        let mut fx = Fixture::new(12, 5);
        let hunter = fx.actor(1, 2, AiBehavior::SearchChase);
        fx.player(6, 2);

        fx.tick(&mut ChaseSystem);
        let ai = fx.store.expect::<Ai>(hunter);
        assert_eq!(ai.state, AiState::Chase);
        assert_eq!(fx.store.position(hunter), Some(Position::new(2, 2)));
        assert_eq!(fx.recorder.count(EventKind::TargetAcquired), 1);

        // Still chasing the same target: no second acquisition event
        fx.store.insert(hunter, ActionPoints::new(100, 100));
        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.recorder.count(EventKind::TargetAcquired), 1);
        assert_eq!(fx.store.position(hunter), Some(Position::new(3, 2)));
    }

    #[test]
    fn test_adjacent_chaser_attacks_instead_of_moving() {
        let mut fx = Fixture::new(8, 5);
        let hunter = fx.actor(2, 2, AiBehavior::SearchChase);
        let player = fx.player(3, 2);
        fx.tick(&mut ChaseSystem);
        assert_eq!(
            fx.store.get::<AttackIntent>(hunter),
            Some(AttackIntent { target: player })
        );
        assert_eq!(fx.store.position(hunter), Some(Position::new(2, 2)));
    }

    #[test]
    fn test_zero_action_points_means_no_step() {
        let mut fx = Fixture::new(12, 5);
        let hunter = fx.actor(1, 2, AiBehavior::SearchChase);
        fx.store.insert(hunter, ActionPoints::new(0, 0));
        fx.player(6, 2);

        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.store.position(hunter), Some(Position::new(1, 2)));
        assert!(!fx.store.has::<AttackIntent>(hunter));
        // Perception still happens
        assert_eq!(fx.store.expect::<Ai>(hunter).state, AiState::Chase);
    }

    #[test]
    fn test_lost_target_searches_then_gives_up() {
        let mut fx = Fixture::new(12, 7);
        fx.config.search_duration = 2;
        let hunter = fx.actor(2, 3, AiBehavior::SearchChase);
        let player = fx.player(5, 3);
        fx.store.insert(hunter, ActionPoints::new(0, 0));
        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.store.expect::<Ai>(hunter).state, AiState::Chase);

        // Player vanishes behind a wall column
        for y in 0..7 {
            fx.map.set(TileLayer::Walls, Position::new(4, y), Tile::wall());
        }
        fx.store.insert(player, Position::new(7, 3));

        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.store.expect::<Ai>(hunter).state, AiState::Search);
        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.store.expect::<Ai>(hunter).state, AiState::Search);
        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.store.expect::<Ai>(hunter).state, AiState::Idle);
        assert_eq!(fx.recorder.count(EventKind::TargetLost), 1);
        assert_eq!(fx.store.expect::<Ai>(hunter).target, None);
    }

    #[test]
    fn test_no_path_publishes_diagnostic() {
        // One-tile corridor; a neutral statue plugs it but does not block sight
        let mut fx = Fixture::new(10, 3);
        let hunter = fx.actor(1, 1, AiBehavior::SearchChase);
        fx.store.spawn((
            Name("statue".into()),
            Position::new(2, 1),
            Faction::Neutral,
            BlocksMovement,
        ));
        fx.player(5, 1);

        fx.tick(&mut ChaseSystem);
        assert_eq!(fx.store.expect::<Ai>(hunter).state, AiState::Chase);
        assert_eq!(fx.store.position(hunter), Some(Position::new(1, 1)));
        assert_eq!(
            fx.recorder.of_kind(EventKind::NoPathToTarget),
            vec![GameEvent::NoPathToTarget {
                entity: hunter,
                goal: Position::new(5, 1),
            }]
        );
    }

    #[test]
    fn test_wanderer_idles_then_wanders() {
        let mut fx = Fixture::new(7, 7);
        fx.config.idle_delay_min = 2;
        fx.config.idle_delay_max = 2;
        let wanderer = fx.actor(3, 3, AiBehavior::Wander);
        let mut ai = Ai::new(AiBehavior::Wander);
        ai.idle_ticks = 2;
        fx.store.insert(wanderer, ai);

        fx.tick(&mut WanderSystem);
        assert_eq!(fx.store.expect::<Ai>(wanderer).state, AiState::Idle);
        fx.tick(&mut WanderSystem);
        assert_eq!(fx.store.expect::<Ai>(wanderer).state, AiState::Wander);
        assert_eq!(fx.store.position(wanderer), Some(Position::new(3, 3)));

        fx.tick(&mut WanderSystem);
        let moved = fx.store.position(wanderer).unwrap();
        assert_eq!(moved.manhattan(Position::new(3, 3)), 1);
    }

    #[test]
    fn test_sentry_never_moves() {
        let mut fx = Fixture::new(12, 5);
        let sentry = fx.actor(1, 2, AiBehavior::AttackOnly);
        fx.player(4, 2);
        for _ in 0..3 {
            fx.tick(&mut ChaseSystem);
        }
        assert_eq!(fx.store.position(sentry), Some(Position::new(1, 2)));
        assert_eq!(fx.store.expect::<Ai>(sentry).state, AiState::Chase);
    }

    #[test]
    fn test_target_removed_goes_idle() {
        let mut fx = Fixture::new(12, 5);
        let hunter = fx.actor(1, 2, AiBehavior::SearchChase);
        fx.store.insert(hunter, ActionPoints::new(0, 0));
        let player = fx.player(5, 2);
        fx.tick(&mut ChaseSystem);
        fx.store.despawn(player);
        fx.tick(&mut ChaseSystem);
        let ai = fx.store.expect::<Ai>(hunter);
        assert_eq!(ai.state, AiState::Idle);
        assert_eq!(fx.recorder.count(EventKind::TargetLost), 1);
    }
}
