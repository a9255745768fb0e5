// src/combat/src/combatant.rs

/// Anything that can take part in melee.
pub trait Combatant {
    fn name(&self) -> &str;

    /// Current health
    fn hp(&self) -> u32;

    fn max_hp(&self) -> u32;

    /// Damage of one blow, buffs included
    fn attack_power(&self) -> u32;

    /// Flat reduction applied to incoming blows
    fn armor(&self) -> u32;

    fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    /// Applies `amount` damage, clamping health at zero; returns damage dealt.
    fn take_damage(&mut self, amount: u32) -> u32;
}
