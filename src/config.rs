//! Tunable simulation constants.

use std::path::Path;

use anyhow::Context;
use error::SimError;
use serde::{Deserialize, Serialize};

/// Action point prices. A full turn's regeneration buys one step.
pub mod action_costs {
    pub const MOVE: u32 = 100;
    pub const ATTACK: u32 = 100;
    pub const WAIT: u32 = 50;
}

/// Everything a level needs to know that is not content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub move_cost: u32,
    pub attack_cost: u32,
    pub wait_cost: u32,
    /// Sight range used when a template does not set its own
    pub default_sight_range: u32,
    /// Idle delay before a wanderer starts moving, inclusive range
    pub idle_delay_min: u32,
    pub idle_delay_max: u32,
    /// Ticks a pursuer keeps searching after losing sight of its target
    pub search_duration: u32,
    /// Half-width of the square a pursuer floods when routing to a target
    pub chase_radius: u32,
    /// Applied when a template has a loot table without a chance of its own
    pub loot_drop_chance: f64,
    pub seed: u64,
    pub history_size: usize,
    pub max_publish_depth: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            move_cost: action_costs::MOVE,
            attack_cost: action_costs::ATTACK,
            wait_cost: action_costs::WAIT,
            default_sight_range: 8,
            idle_delay_min: 2,
            idle_delay_max: 6,
            search_duration: 5,
            chase_radius: 12,
            loot_drop_chance: 0.5,
            seed: 12345,
            history_size: 100,
            max_publish_depth: 10,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.move_cost == 0 || self.attack_cost == 0 {
            return Err(SimError::InvalidConfig(
                "move_cost and attack_cost must be positive".into(),
            ));
        }
        if self.idle_delay_min > self.idle_delay_max {
            return Err(SimError::InvalidConfig(format!(
                "idle_delay_min ({}) exceeds idle_delay_max ({})",
                self.idle_delay_min, self.idle_delay_max
            )));
        }
        if !(0.0..=1.0).contains(&self.loot_drop_chance) {
            return Err(SimError::InvalidConfig(format!(
                "loot_drop_chance {} is not a probability",
                self.loot_drop_chance
            )));
        }
        if self.max_publish_depth == 0 {
            return Err(SimError::InvalidConfig(
                "max_publish_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
