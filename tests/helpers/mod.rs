//! Builders for levels drawn as text, plus a harness that ticks them with a
//! recording event bus attached.

#![allow(dead_code)]

use dungeon_sim::ecs::{ActionPoints, Ai, AiState, Health};
use dungeon_sim::event_bus::{EventBus, EventKind, EventRecorder, GameEvent};
use dungeon_sim::{EntityFactory, Legend, Level, LevelBlueprint, Position, SimConfig};
use hecs::Entity;

pub struct TestLevelBuilder {
    text: String,
    config: SimConfig,
    templates: Option<String>,
    seed: u64,
}

impl TestLevelBuilder {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            config: SimConfig::default(),
            templates: None,
            seed: 7,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut SimConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Monster templates as JSON; the built-in ones are used otherwise.
    pub fn with_templates(mut self, json: &str) -> Self {
        self.templates = Some(json.to_string());
        self
    }

    pub fn build(self) -> Level {
        let factory = match &self.templates {
            Some(json) => EntityFactory::from_json(json, &self.config).expect("templates"),
            None => EntityFactory::with_defaults(&self.config),
        };
        let blueprint =
            LevelBlueprint::parse(&self.text, &Legend::default_legend()).expect("level text");
        Level::from_blueprint(blueprint, &factory, self.config, self.seed).expect("level")
    }

    pub fn harness(self) -> Harness {
        Harness::new(self.build())
    }
}

pub struct Harness {
    pub level: Level,
    pub bus: EventBus,
    pub recorder: EventRecorder,
}

impl Harness {
    pub fn new(level: Level) -> Self {
        let mut bus = EventBus::with_history_size(1000);
        let recorder = EventRecorder::new();
        recorder.attach(&mut bus);
        Self {
            level,
            bus,
            recorder,
        }
    }

    pub fn tick(&mut self) {
        self.level.tick(&mut self.bus);
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// The blocking entity standing on `(x, y)`.
    pub fn at(&self, x: i32, y: i32) -> Entity {
        self.level
            .entity_at(Position::new(x, y))
            .unwrap_or_else(|| panic!("nothing at ({x}, {y})"))
    }

    pub fn position(&self, entity: Entity) -> Option<Position> {
        self.level.store().position(entity)
    }

    pub fn state(&self, entity: Entity) -> AiState {
        self.level.store().expect::<Ai>(entity).state
    }

    pub fn hp(&self, entity: Entity) -> u32 {
        self.level.store().expect::<Health>(entity).current
    }

    pub fn drain_action_points(&mut self, entity: Entity) {
        self.level
            .store_mut()
            .update::<ActionPoints, _>(entity, |ap| {
                ap.current = 0;
                ap.regen = 0;
            });
    }

    pub fn events(&self, kind: EventKind) -> Vec<GameEvent> {
        self.recorder.of_kind(kind)
    }
}
