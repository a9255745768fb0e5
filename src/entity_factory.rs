//! Assembles entities from templates.
//!
//! Monster templates come from JSON and are validated when loaded, so a
//! broken definition is reported with its id before any level exists.

use std::collections::HashMap;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use error::SimError;

use crate::config::SimConfig;
use crate::ecs::{
    ActionPoints, Ai, AiBehavior, AttackPower, BlocksMovement, Buff, BuffKind, Buffs, Door,
    EntityStore, Faction, Health, LineOfSight, LootContainer, LootTable, Name, Player, Position,
    Renderable, TileColor,
};

/// Marker glyph that places the player.
pub const PLAYER_MARKER: char = '@';
/// Marker glyph that places a closed door.
pub const DOOR_MARKER: char = '+';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApTemplate {
    pub max: u32,
    pub regen: u32,
}

impl Default for ApTemplate {
    fn default() -> Self {
        Self { max: 100, regen: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootTemplate {
    /// Falls back to the configured drop chance when absent
    #[serde(default)]
    pub chance: Option<f64>,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub id: String,
    pub name: String,
    pub glyph: char,
    #[serde(default)]
    pub color: TileColor,
    #[serde(default = "default_faction")]
    pub faction: Faction,
    pub hp: u32,
    pub damage: u32,
    #[serde(default)]
    pub armor: u32,
    /// Falls back to the configured sight range when absent
    #[serde(default)]
    pub sight: Option<u32>,
    pub behavior: AiBehavior,
    #[serde(default)]
    pub ap: ApTemplate,
    #[serde(default)]
    pub loot: Option<LootTemplate>,
    /// Map glyph that spawns this monster in hand-drawn levels
    #[serde(default)]
    pub marker: Option<char>,
}

fn default_faction() -> Faction {
    Faction::Monster
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTemplate {
    pub name: String,
    pub hp: u32,
    pub damage: u32,
    pub sight: u32,
    pub ap: ApTemplate,
}

impl Default for PlayerTemplate {
    fn default() -> Self {
        Self {
            name: "you".to_string(),
            hp: 30,
            damage: 5,
            sight: 8,
            ap: ApTemplate::default(),
        }
    }
}

/// Template registry and entity builder.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    templates: Vec<MonsterTemplate>,
    by_id: HashMap<String, usize>,
    by_marker: HashMap<char, usize>,
    player: PlayerTemplate,
    default_sight: u32,
    default_loot_chance: f64,
}

impl EntityFactory {
    /// Factory with no monster templates.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            templates: Vec::new(),
            by_id: HashMap::new(),
            by_marker: HashMap::new(),
            player: PlayerTemplate::default(),
            default_sight: config.default_sight_range,
            default_loot_chance: config.loot_drop_chance,
        }
    }

    /// Factory preloaded with a rat, a goblin and a turret.
    pub fn with_defaults(config: &SimConfig) -> Self {
        let mut factory = Self::new(config);
        let builtin = [
            MonsterTemplate {
                id: "rat".into(),
                name: "rat".into(),
                glyph: 'r',
                color: TileColor::Yellow,
                faction: Faction::Monster,
                hp: 6,
                damage: 2,
                armor: 0,
                sight: Some(5),
                behavior: AiBehavior::Wander,
                ap: ApTemplate::default(),
                loot: Some(LootTemplate {
                    chance: Some(0.25),
                    items: vec!["cheese".into()],
                }),
                marker: Some('r'),
            },
            MonsterTemplate {
                id: "goblin".into(),
                name: "goblin".into(),
                glyph: 'g',
                color: TileColor::Green,
                faction: Faction::Monster,
                hp: 12,
                damage: 4,
                armor: 1,
                sight: Some(8),
                behavior: AiBehavior::SearchChase,
                ap: ApTemplate::default(),
                loot: Some(LootTemplate {
                    chance: None,
                    items: vec!["gold".into(), "dagger".into()],
                }),
                marker: Some('g'),
            },
            MonsterTemplate {
                id: "turret".into(),
                name: "turret".into(),
                glyph: 't',
                color: TileColor::Cyan,
                faction: Faction::Monster,
                hp: 20,
                damage: 3,
                armor: 2,
                sight: Some(6),
                behavior: AiBehavior::AttackOnly,
                ap: ApTemplate::default(),
                loot: None,
                marker: Some('t'),
            },
        ];
        for template in builtin {
            // Built-ins are known to be valid
            let _ = factory.register(template);
        }
        factory
    }

    /// Parses a JSON array of monster templates and registers each one.
    pub fn from_json(json: &str, config: &SimConfig) -> Result<Self, SimError> {
        let templates: Vec<MonsterTemplate> = serde_json::from_str(json)?;
        let mut factory = Self::new(config);
        for template in templates {
            factory.register(template)?;
        }
        Ok(factory)
    }

    pub fn with_player(mut self, player: PlayerTemplate) -> Self {
        self.player = player;
        self
    }

    /// Validates and adds a template.
    pub fn register(&mut self, template: MonsterTemplate) -> Result<(), SimError> {
        let invalid = |reason: &str| SimError::InvalidTemplate {
            id: template.id.clone(),
            reason: reason.to_string(),
        };
        if template.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if template.hp == 0 {
            return Err(invalid("hp must be positive"));
        }
        if let Some(loot) = &template.loot {
            if loot.chance.is_some_and(|c| !(0.0..=1.0).contains(&c)) {
                return Err(invalid("loot chance must lie in [0, 1]"));
            }
        }
        if self.by_id.contains_key(&template.id) {
            return Err(SimError::DuplicateTemplate(template.id));
        }
        if let Some(marker) = template.marker {
            if marker == PLAYER_MARKER || marker == DOOR_MARKER {
                return Err(invalid("marker is reserved"));
            }
            if let Some(&other) = self.by_marker.get(&marker) {
                return Err(SimError::MarkerConflict {
                    glyph: marker,
                    first: self.templates[other].id.clone(),
                    second: template.id,
                });
            }
            self.by_marker.insert(marker, self.templates.len());
        }
        self.by_id.insert(template.id.clone(), self.templates.len());
        self.templates.push(template);
        Ok(())
    }

    pub fn template(&self, id: &str) -> Option<&MonsterTemplate> {
        self.by_id.get(id).map(|&i| &self.templates[i])
    }

    pub fn templates(&self) -> &[MonsterTemplate] {
        &self.templates
    }

    pub fn create_player(&self, store: &mut EntityStore, pos: Position) -> Entity {
        let t = &self.player;
        store.spawn((
            Player,
            Name(t.name.clone()),
            pos,
            Renderable {
                glyph: PLAYER_MARKER,
                color: TileColor::White,
                order: 10,
            },
            Faction::Player,
            Health::new(t.hp),
            AttackPower(t.damage),
            ActionPoints::new(t.ap.max, t.ap.regen),
            LineOfSight { range: t.sight },
            BlocksMovement,
            Buffs::new(),
        ))
    }

    pub fn create_monster(
        &self,
        store: &mut EntityStore,
        id: &str,
        pos: Position,
    ) -> Result<Entity, SimError> {
        let t = self
            .template(id)
            .ok_or_else(|| SimError::UnknownTemplate(id.to_string()))?;

        let mut buffs = Buffs::new();
        if t.armor > 0 {
            buffs.add(Buff::permanent(BuffKind::Armor, t.armor));
        }
        let entity = store.spawn((
            Name(t.name.clone()),
            pos,
            Renderable {
                glyph: t.glyph,
                color: t.color,
                order: 5,
            },
            t.faction,
            Health::new(t.hp),
            AttackPower(t.damage),
            ActionPoints::new(t.ap.max, t.ap.regen),
            LineOfSight {
                range: t.sight.unwrap_or(self.default_sight),
            },
            BlocksMovement,
            Ai::new(t.behavior),
            buffs,
        ));
        if let Some(loot) = &t.loot {
            store.insert(
                entity,
                LootTable::new(
                    loot.chance.unwrap_or(self.default_loot_chance),
                    loot.items.clone(),
                ),
            );
        }
        Ok(entity)
    }

    pub fn create_door(&self, store: &mut EntityStore, pos: Position) -> Entity {
        store.spawn((
            Name("door".to_string()),
            pos,
            Door { open: false },
            BlocksMovement,
            Renderable {
                glyph: DOOR_MARKER,
                color: TileColor::Yellow,
                order: 2,
            },
        ))
    }

    /// Spawns whatever `marker` stands for on a hand-drawn map.
    pub fn spawn_marker(
        &self,
        store: &mut EntityStore,
        marker: char,
        pos: Position,
    ) -> Result<Entity, SimError> {
        match marker {
            PLAYER_MARKER => Ok(self.create_player(store, pos)),
            DOOR_MARKER => Ok(self.create_door(store, pos)),
            _ => {
                let idx = self
                    .by_marker
                    .get(&marker)
                    .ok_or_else(|| SimError::UnknownTemplate(marker.to_string()))?;
                let id = self.templates[*idx].id.clone();
                self.create_monster(store, &id, pos)
            }
        }
    }
}

/// Drops a loot container holding `items` on `pos`.
pub fn spawn_loot(store: &mut EntityStore, pos: Position, items: Vec<String>) -> Entity {
    store.spawn((
        Name("loot".to_string()),
        pos,
        LootContainer { items },
        Renderable {
            glyph: '*',
            color: TileColor::Yellow,
            order: 1,
        },
    ))
}
