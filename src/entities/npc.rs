use crate::entities::creature::{EntityId, EntityKind, Mob};
use crate::entities::stats::Stats;
use crate::world::paths::GridPath;
use crate::world::position::Position;
use crate::world::spawns::SpawnPointId;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NpcTemplate {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub race: u16,
    #[serde(default)]
    pub class: u8,
    #[serde(default)]
    pub gender: u8,
    #[serde(default)]
    pub hp: u32,
    #[serde(default)]
    pub mana: u32,
    #[serde(default)]
    pub ac: u32,
    #[serde(default = "default_run_speed")]
    pub run_speed: f32,
    #[serde(default)]
    pub path_id: Option<u32>,
}

fn default_level() -> u8 {
    1
}

fn default_run_speed() -> f32 {
    1.0
}

impl NpcTemplate {
    pub fn stats(&self) -> Stats {
        Stats::full(self.hp, self.mana, self.ac)
    }

    /// Builds the mob half of a freshly spawned NPC.
    pub fn spawn_mob(&self, id: EntityId, position: Position) -> Mob {
        let mut mob = Mob::new(id, self.name.clone(), EntityKind::Npc);
        mob.position = position;
        mob.speed = self.run_speed;
        mob.level = self.level;
        mob.stats = self.stats();
        mob
    }
}

/// Per-instance patrol state.
#[derive(Debug, Clone)]
pub struct NpcState {
    pub template: Arc<NpcTemplate>,
    pub spawn_point: Option<SpawnPointId>,
    pub path: Option<Arc<GridPath>>,
    pub path_index: usize,
    pub pause_until: Instant,
    pub last_update: Instant,
}

impl NpcState {
    pub fn new(
        template: Arc<NpcTemplate>,
        spawn_point: Option<SpawnPointId>,
        path: Option<Arc<GridPath>>,
        now: Instant,
    ) -> Self {
        Self {
            template,
            spawn_point,
            path,
            path_index: 0,
            pause_until: now,
            last_update: now,
        }
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        now < self.pause_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::paths::WaypointRow;

    fn template() -> NpcTemplate {
        serde_yaml::from_str(
            "id: 7\nname: Fish_Ranamer\nlevel: 12\nhp: 300\nrun_speed: 1.5\npath_id: 2\n",
        )
        .expect("template yaml")
    }

    #[test]
    fn template_defaults_and_stats() {
        let template = template();
        assert_eq!(template.level, 12);
        assert_eq!(template.path_id, Some(2));
        assert_eq!(template.stats().health, 300);
        let bare: NpcTemplate = serde_yaml::from_str("id: 1\nname: a_rat\n").expect("bare");
        assert_eq!(bare.level, 1);
        assert_eq!(bare.run_speed, 1.0);
        assert_eq!(bare.path_id, None);
    }

    #[test]
    fn spawn_mob_copies_template_fields() {
        let template = template();
        let mob = template.spawn_mob(EntityId(9), Position::new(1.0, 2.0, 3.0));
        assert_eq!(mob.kind, EntityKind::Npc);
        assert_eq!(mob.speed, 1.5);
        assert_eq!(mob.level, 12);
        assert_eq!(mob.position, Position::new(1.0, 2.0, 3.0));
        assert!(!mob.is_dirty());
    }

    #[test]
    fn state_starts_at_first_waypoint() {
        let now = Instant::now();
        let rows = [WaypointRow { x: 1.0, y: 1.0, z: 0.0, heading: 0.0, pause: 0 }];
        let path = Arc::new(GridPath::from_rows(2, &rows));
        let state = NpcState::new(Arc::new(template()), None, Some(path), now);
        assert_eq!(state.path_index, 0);
        assert!(!state.is_paused(now));
        assert_eq!(
            state
                .path
                .as_ref()
                .and_then(|path| path.get(state.path_index))
                .map(|waypoint| waypoint.position.x),
            Some(1.0)
        );
    }
}
