use crate::entities::creature::{Entity, EntityId, EntityKind};
use crate::entities::player::CharacterRecord;
use crate::net::opcodes::Opcode;
use crate::net::packet::PacketWriter;
use crate::world::grid::CellCoord;
use crate::world::position::{Position, Velocity};
use crate::world::zone_data::ZoneRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub spawn_id: EntityId,
    pub position: Position,
    pub velocity: Velocity,
    pub animation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnInfo {
    pub spawn_id: EntityId,
    pub name: String,
    pub level: u8,
    pub race: u16,
    pub class: u8,
    pub gender: u8,
    pub is_npc: bool,
    pub position: Position,
    pub cell: CellCoord,
}

/// Typed outbound message. Sessions decide how to put it on the wire;
/// `encode` gives the default little-endian framing.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    PositionUpdates(Vec<PositionUpdate>),
    Spawn(SpawnInfo),
    Spawns(Vec<SpawnInfo>),
    DeleteSpawn { spawn_id: EntityId },
    ChannelMessage { sender: String, channel: i32, message: String },
    Animation { spawn_id: EntityId, animation: String },
    NewZone(ZoneRecord),
    PlayerProfile { spawn_id: EntityId, character: CharacterRecord },
    LevelUpdate { level: u8, experience: u64 },
}

impl PositionUpdate {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            spawn_id: entity.id(),
            position: entity.mob.position,
            velocity: entity.mob.velocity,
            animation: entity.mob.broadcast_animation().to_string(),
        }
    }
}

impl SpawnInfo {
    pub fn from_entity(entity: &Entity, cell: CellCoord) -> Self {
        let mob = &entity.mob;
        let (race, class, gender) = match (entity.as_npc(), entity.as_player()) {
            (Some(npc), _) => (npc.template.race, npc.template.class, npc.template.gender),
            (_, Some(player)) => player
                .character
                .as_ref()
                .map(|record| (record.race, record.class, 0))
                .unwrap_or_default(),
            _ => (0, 0, 0),
        };
        Self {
            spawn_id: mob.id,
            name: mob.name.clone(),
            level: mob.level,
            race,
            class,
            gender,
            is_npc: mob.kind == EntityKind::Npc,
            position: mob.position,
            cell,
        }
    }
}

impl ServerMessage {
    pub fn encode(&self, opcode: Opcode) -> Vec<u8> {
        let mut writer = PacketWriter::with_opcode(opcode.as_u16());
        match self {
            ServerMessage::PositionUpdates(updates) => {
                writer.write_u32_le(updates.len() as u32);
                for update in updates {
                    writer.write_u32_le(update.spawn_id.0);
                    write_position(&mut writer, update.position);
                    writer.write_f32_le(update.velocity.x as f32);
                    writer.write_f32_le(update.velocity.y as f32);
                    writer.write_f32_le(update.velocity.z as f32);
                    writer.write_string_str(&update.animation);
                }
            }
            ServerMessage::Spawn(spawn) => write_spawn(&mut writer, spawn),
            ServerMessage::Spawns(spawns) => {
                writer.write_u32_le(spawns.len() as u32);
                for spawn in spawns {
                    write_spawn(&mut writer, spawn);
                }
            }
            ServerMessage::DeleteSpawn { spawn_id } => writer.write_u32_le(spawn_id.0),
            ServerMessage::ChannelMessage {
                sender,
                channel,
                message,
            } => {
                writer.write_string_str(sender);
                writer.write_i32_le(*channel);
                writer.write_string_str(message);
            }
            ServerMessage::Animation {
                spawn_id,
                animation,
            } => {
                writer.write_u32_le(spawn_id.0);
                writer.write_string_str(animation);
            }
            ServerMessage::NewZone(zone) => {
                writer.write_u32_le(zone.id);
                writer.write_string_str(&zone.short_name);
                writer.write_string_str(&zone.long_name);
                write_position(&mut writer, zone.safe_point);
            }
            ServerMessage::PlayerProfile {
                spawn_id,
                character,
            } => {
                writer.write_u32_le(spawn_id.0);
                writer.write_u32_le(character.id.0);
                writer.write_string_str(&character.name);
                writer.write_u8(character.level);
                writer.write_u16_le(character.race);
                writer.write_u8(character.class);
                write_position(&mut writer, character.position);
            }
            ServerMessage::LevelUpdate { level, experience } => {
                writer.write_u8(*level);
                writer.write_u32_le((*experience).min(u64::from(u32::MAX)) as u32);
            }
        }
        writer.into_vec()
    }
}

fn write_position(writer: &mut PacketWriter, position: Position) {
    writer.write_f32_le(position.x as f32);
    writer.write_f32_le(position.y as f32);
    writer.write_f32_le(position.z as f32);
    writer.write_f32_le(position.heading as f32);
}

fn write_spawn(writer: &mut PacketWriter, spawn: &SpawnInfo) {
    writer.write_u32_le(spawn.spawn_id.0);
    writer.write_string_str(&spawn.name);
    writer.write_u8(spawn.level);
    writer.write_u16_le(spawn.race);
    writer.write_u8(spawn.class);
    writer.write_u8(spawn.gender);
    writer.write_u8(u8::from(spawn.is_npc));
    write_position(writer, spawn.position);
    writer.write_i32_le(spawn.cell.x);
    writer.write_i32_le(spawn.cell.y);
    writer.write_i32_le(spawn.cell.z);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packet::PacketReader;

    #[test]
    fn position_batch_encodes_count_then_entries() {
        let message = ServerMessage::PositionUpdates(vec![PositionUpdate {
            spawn_id: EntityId(7),
            position: Position::new(1.0, 2.0, 3.0).with_heading(90.0),
            velocity: Velocity { x: 0.5, y: 0.0, z: 0.0 },
            animation: "Walking".to_string(),
        }]);
        let bytes = message.encode(Opcode::SpawnPositionUpdate);
        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_u16_le(), Some(Opcode::SpawnPositionUpdate.as_u16()));
        assert_eq!(reader.read_u32_le(), Some(1));
        assert_eq!(reader.read_u32_le(), Some(7));
        assert_eq!(reader.read_f32_le(), Some(1.0));
        assert_eq!(reader.read_f32_le(), Some(2.0));
        assert_eq!(reader.read_f32_le(), Some(3.0));
        assert_eq!(reader.read_f32_le(), Some(90.0));
        assert_eq!(reader.read_f32_le(), Some(0.5));
        reader.skip(8).expect("velocity y z");
        assert_eq!(reader.read_string_lossy(0).as_deref(), Some("Walking"));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn channel_message_encodes_sender_channel_text() {
        let bytes = ServerMessage::ChannelMessage {
            sender: String::new(),
            channel: -1,
            message: "hi".to_string(),
        }
        .encode(Opcode::ChannelMessage);
        let mut reader = PacketReader::new(&bytes[2..]);
        assert_eq!(reader.read_string_lossy(0).as_deref(), Some(""));
        assert_eq!(reader.read_i32_le(), Some(-1));
        assert_eq!(reader.read_string_lossy(0).as_deref(), Some("hi"));
    }
}
