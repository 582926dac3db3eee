pub mod creature;
pub mod npc;
pub mod player;
pub mod stats;
