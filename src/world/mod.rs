pub mod buckets;
pub mod grid;
pub mod movement;
pub mod paths;
pub mod position;
pub mod spawns;
pub mod subscriptions;
pub mod zone_data;
