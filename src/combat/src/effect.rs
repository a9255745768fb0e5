// src/combat/src/effect.rs
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum BuffKind {
    /// Soaks incoming damage
    Armor,
    /// Adds to outgoing damage
    Strength,
}

/// A timed modifier. `turns == None` lasts until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buff {
    pub kind: BuffKind,
    pub amount: u32,
    pub turns: Option<u32>,
}

impl Buff {
    pub fn timed(kind: BuffKind, amount: u32, turns: u32) -> Self {
        Self {
            kind,
            amount,
            turns: Some(turns),
        }
    }

    pub fn permanent(kind: BuffKind, amount: u32) -> Self {
        Self {
            kind,
            amount,
            turns: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.turns == Some(0)
    }
}

/// Active buffs of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffs {
    active: Vec<Buff>,
}

impl Buffs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, buff: Buff) -> Self {
        self.add(buff);
        self
    }

    pub fn add(&mut self, buff: Buff) {
        self.active.push(buff);
    }

    /// Sum of all active buffs of `kind`.
    pub fn total(&self, kind: BuffKind) -> u32 {
        self.active
            .iter()
            .filter(|b| b.kind == kind && !b.is_expired())
            .map(|b| b.amount)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.active.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Advances every timed buff by one tick and returns those that ran out.
    pub fn tick(&mut self) -> Vec<Buff> {
        for buff in &mut self.active {
            if let Some(turns) = buff.turns.as_mut() {
                *turns = turns.saturating_sub(1);
            }
        }
        let (expired, active): (Vec<_>, Vec<_>) =
            self.active.drain(..).partition(Buff::is_expired);
        self.active = active;
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_by_kind() {
        let buffs = Buffs::new()
            .with(Buff::timed(BuffKind::Armor, 2, 3))
            .with(Buff::permanent(BuffKind::Armor, 1))
            .with(Buff::timed(BuffKind::Strength, 4, 1));
        assert_eq!(buffs.total(BuffKind::Armor), 3);
        assert_eq!(buffs.total(BuffKind::Strength), 4);
    }

    #[test]
    fn test_tick_expires_timed_buffs() {
        let mut buffs = Buffs::new()
            .with(Buff::timed(BuffKind::Armor, 2, 2))
            .with(Buff::permanent(BuffKind::Strength, 1));

        assert!(buffs.tick().is_empty());
        let expired = buffs.tick();
        assert_eq!(expired, vec![Buff::timed(BuffKind::Armor, 2, 0)]);
        assert_eq!(buffs.total(BuffKind::Armor), 0);
        assert_eq!(buffs.total(BuffKind::Strength), 1);
        assert_eq!(buffs.iter().count(), 1);
    }
}
