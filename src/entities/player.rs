use crate::entities::creature::{EntityId, EntityKind, Mob};
use crate::entities::stats::Stats;
use crate::net::session::SessionId;
use crate::world::position::Position;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub u32);

/// The persisted view of a character. Sessions hand one of these to the
/// zone on attach and the zone hands an updated copy back on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub race: u16,
    #[serde(default)]
    pub class: u8,
    #[serde(default)]
    pub zone_id: u32,
    #[serde(default)]
    pub instance_id: u32,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub experience: u64,
}

fn default_level() -> u8 {
    1
}

impl CharacterRecord {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId(id),
            name: name.into(),
            level: 1,
            race: 0,
            class: 0,
            zone_id: 0,
            instance_id: 0,
            position: Position::default(),
            experience: 0,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub session: SessionId,
    pub character: Option<CharacterRecord>,
}

impl PlayerState {
    pub fn new(session: SessionId, character: Option<CharacterRecord>) -> Self {
        Self { session, character }
    }

    pub fn build_mob(&self, id: EntityId) -> Mob {
        let name = self
            .character
            .as_ref()
            .map(|record| record.name.clone())
            .unwrap_or_else(|| format!("session{}", self.session.0));
        let mut mob = Mob::new(id, name, EntityKind::Player);
        if let Some(record) = self.character.as_ref() {
            mob.position = record.position;
            mob.level = record.level;
            mob.stats = Stats::for_level(record.level);
        }
        mob
    }

    /// Copies the authoritative mob state into the record for saving.
    pub fn snapshot(&self, mob: &Mob) -> Option<CharacterRecord> {
        let mut record = self.character.clone()?;
        record.position = mob.position;
        record.level = mob.level;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mob_uses_character_record() {
        let record = CharacterRecord::new(4, "Aria").at(Position::new(10.0, 20.0, 0.0));
        let state = PlayerState::new(SessionId(9), Some(record));
        let mob = state.build_mob(EntityId(2));
        assert_eq!(mob.name, "Aria");
        assert_eq!(mob.kind, EntityKind::Player);
        assert_eq!(mob.position, Position::new(10.0, 20.0, 0.0));
    }

    #[test]
    fn build_mob_without_character_uses_session_name() {
        let state = PlayerState::new(SessionId(12), None);
        assert_eq!(state.build_mob(EntityId(1)).name, "session12");
        assert!(state.snapshot(&state.build_mob(EntityId(1))).is_none());
    }

    #[test]
    fn snapshot_copies_live_position_and_level() {
        let state = PlayerState::new(SessionId(1), Some(CharacterRecord::new(1, "Bryn")));
        let mut mob = state.build_mob(EntityId(5));
        mob.position = Position::new(-4.0, 8.0, 1.0).with_heading(90.0);
        mob.level = 7;
        let record = state.snapshot(&mob).expect("snapshot");
        assert_eq!(record.position, mob.position);
        assert_eq!(record.level, 7);
    }

    #[test]
    fn record_yaml_fills_defaults() {
        let record: CharacterRecord =
            serde_yaml::from_str("id: 3\nname: Cole\n").expect("record yaml");
        assert_eq!(record.id, CharacterId(3));
        assert_eq!(record.level, 1);
        assert_eq!(record.position, Position::default());
    }
}
