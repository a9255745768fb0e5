// src/combat/src/lib.rs
//! Melee resolution rules: who can fight, how much damage lands, which
//! timed buffs modify it and whether a corpse leaves anything behind.

pub mod combatant;
pub mod effect;
pub mod loot;

pub use crate::combatant::Combatant;
pub use crate::effect::{Buff, BuffKind, Buffs};
pub use crate::loot::LootTable;

/// Handles combat interactions between entities
pub struct Combat;

/// Outcome of a single blow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeResult {
    /// Damage actually subtracted from the defender's health
    pub damage: u32,
    /// Defender health after the blow
    pub remaining_hp: u32,
    /// Blow took the defender from alive to zero
    pub killed: bool,
}

impl Combat {
    /// Damage left after armor soaks its share. Never negative.
    pub fn damage_after_armor(raw: u32, armor: u32) -> u32 {
        raw.saturating_sub(armor)
    }

    /// Lands one blow from `attacker` on `defender`.
    ///
    /// Health is clamped at zero. Striking an already dead defender is
    /// allowed and reports `killed == false`, so a double kill in the same
    /// tick is only counted once.
    pub fn strike<A: Combatant, D: Combatant>(attacker: &A, defender: &mut D) -> StrikeResult {
        let was_alive = defender.is_alive();
        let damage = Self::damage_after_armor(attacker.attack_power(), defender.armor());
        let dealt = defender.take_damage(damage);
        StrikeResult {
            damage: dealt,
            remaining_hp: defender.hp(),
            killed: was_alive && !defender.is_alive(),
        }
    }
}
