// src/combat/src/loot.rs
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What a creature may leave behind when it dies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LootTable {
    /// Probability in `[0, 1]` that anything drops at all
    pub chance: f64,
    /// Item identifiers; one is picked uniformly when loot drops
    pub items: Vec<String>,
}

impl LootTable {
    pub fn new(chance: f64, items: Vec<String>) -> Self {
        Self { chance, items }
    }

    /// Rolls the table. `None` means nothing dropped.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        if self.items.is_empty() || !rng.random_bool(self.chance.clamp(0.0, 1.0)) {
            return None;
        }
        let idx = rng.random_range(0..self.items.len());
        Some(self.items[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_certain_and_impossible_drops() {
        let mut rng = Pcg32::seed_from_u64(7);
        let always = LootTable::new(1.0, vec!["gold".into()]);
        let never = LootTable::new(0.0, vec!["gold".into()]);
        let empty = LootTable::new(1.0, vec![]);
        for _ in 0..20 {
            assert_eq!(always.roll(&mut rng).as_deref(), Some("gold"));
            assert_eq!(never.roll(&mut rng), None);
            assert_eq!(empty.roll(&mut rng), None);
        }
    }
}
