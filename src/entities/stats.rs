use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub armor: u32,
}

impl Stats {
    pub fn full(max_health: u32, max_mana: u32, armor: u32) -> Self {
        Self {
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
            armor,
        }
    }

    /// Rough per-level pools for characters without stored values.
    pub fn for_level(level: u8) -> Self {
        let level = u32::from(level.max(1));
        Self::full(100 + level * 15, level * 10, level * 2)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}
