use super::state::ZoneState;
use crate::config::ZoneConfig;
use crate::entities::creature::EntityId;
use crate::entities::player::CharacterRecord;
use crate::net::session::testing::RecordingSession;
use crate::persistence::store::MemoryCharacterStore;
use crate::world::position::Position;
use crate::world::zone_data::ZoneData;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub const EMPTY_ZONE: &str = r#"
zone: { id: 1, short_name: arena, long_name: The Arena }
"#;

/// A patrolling guard next to the origin and a stationary rat far away.
pub const PATROL_ZONE: &str = r#"
zone:
  id: 2
  short_name: qeynos
  long_name: South Qeynos
  safe_point: { x: 5, y: 5, z: 0 }
npc_types:
  - { id: 100, name: Guard_Gehnus, level: 20, hp: 500, run_speed: 2.0, path_id: 7 }
  - { id: 101, name: a_far_rat, hp: 10 }
paths:
  - id: 7
    waypoints:
      - { x: 100, y: 0, z: 0, pause: 1 }
      - { x: 100, y: 100, z: 0 }
      - { x: 0, y: 0, z: 0 }
spawn_points:
  - id: 1
    x: 0
    y: 0
    z: 0
    respawn_ms: 30000
    group:
      id: 10
      name: guards
      entries:
        - { npc_type: 100, chance: 1 }
  - id: 2
    x: 5000
    y: 5000
    z: 0
    respawn_ms: 60000
    group:
      id: 11
      name: rats
      entries:
        - { npc_type: 101, chance: 5 }
"#;

pub fn zone_data(yaml: &str) -> ZoneData {
    ZoneData::from_yaml_str(yaml, Path::new("fixture.yaml")).expect("fixture zone")
}

pub fn state_with_store(yaml: &str, store: Arc<MemoryCharacterStore>) -> ZoneState {
    ZoneState::new(
        0,
        Arc::new(zone_data(yaml)),
        &ZoneConfig::default(),
        store,
        StdRng::seed_from_u64(7),
        Instant::now(),
    )
}

pub fn state_for(yaml: &str) -> ZoneState {
    state_with_store(yaml, Arc::new(MemoryCharacterStore::new()))
}

pub fn empty_state() -> ZoneState {
    state_for(EMPTY_ZONE)
}

pub fn session_for(id: u32, name: &str, position: Position) -> Arc<RecordingSession> {
    RecordingSession::new(id, Some(CharacterRecord::new(id, name).at(position)))
}

/// Attaches a session and enters it into the grid at `position`.
pub fn connect(
    state: &mut ZoneState,
    id: u32,
    name: &str,
    position: Position,
) -> (Arc<RecordingSession>, EntityId) {
    let session = session_for(id, name, position);
    let entity = state.add_client(session.clone());
    state.register_new_client(entity, position);
    (session, entity)
}
