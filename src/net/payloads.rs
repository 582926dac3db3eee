use crate::net::packet::{PacketReader, PacketWriter};
use crate::world::position::Position;
use thiserror::Error;

const MAX_NAME_LEN: usize = 64;
const MAX_ANIMATION_LEN: usize = 64;
const MAX_MESSAGE_LEN: usize = 2048;
const MAX_COMMAND_ARGS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload truncated reading {0}")]
    Truncated(&'static str),
    #[error("payload field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },
}

fn field<T>(value: Option<T>, name: &'static str) -> Result<T, PayloadError> {
    value.ok_or(PayloadError::Truncated(name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientPositionUpdate {
    pub position: Position,
    pub animation: String,
}

impl ClientPositionUpdate {
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PacketReader::new(payload);
        let x = field(reader.read_f32_le(), "x")?;
        let y = field(reader.read_f32_le(), "y")?;
        let z = field(reader.read_f32_le(), "z")?;
        let heading = field(reader.read_f32_le(), "heading")?;
        let animation = field(reader.read_string_lossy(MAX_ANIMATION_LEN), "animation")?;
        Ok(Self {
            position: Position::new(f64::from(x), f64::from(y), f64::from(z))
                .with_heading(f64::from(heading)),
            animation,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_f32_le(self.position.x as f32);
        writer.write_f32_le(self.position.y as f32);
        writer.write_f32_le(self.position.z as f32);
        writer.write_f32_le(self.position.heading as f32);
        writer.write_string_str(&self.animation);
        writer.into_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityAnimation {
    pub spawn_id: u32,
    pub animation: String,
}

impl EntityAnimation {
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PacketReader::new(payload);
        let spawn_id = field(reader.read_u32_le(), "spawn_id")?;
        let animation = field(reader.read_string_lossy(MAX_ANIMATION_LEN), "animation")?;
        Ok(Self {
            spawn_id,
            animation,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_u32_le(self.spawn_id);
        writer.write_string_str(&self.animation);
        writer.into_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessageRequest {
    pub channel: i32,
    pub target: String,
    pub message: String,
}

impl ChannelMessageRequest {
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PacketReader::new(payload);
        let channel = field(reader.read_i32_le(), "channel")?;
        let target = field(reader.read_string_lossy(MAX_NAME_LEN), "target")?;
        let message = field(reader.read_string_lossy(MAX_MESSAGE_LEN), "message")?;
        Ok(Self {
            channel,
            target,
            message,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_i32_le(self.channel);
        writer.write_string_str(&self.target);
        writer.write_string_str(&self.message);
        writer.into_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub command: String,
    pub args: Vec<String>,
}

impl CommandMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PacketReader::new(payload);
        let command = field(reader.read_string_lossy(MAX_NAME_LEN), "command")?;
        let count = field(reader.read_u16_le(), "arg_count")? as usize;
        if count > MAX_COMMAND_ARGS {
            return Err(PayloadError::OutOfRange {
                field: "arg_count",
                value: count as u64,
            });
        }
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(field(reader.read_string_lossy(MAX_MESSAGE_LEN), "arg")?);
        }
        Ok(Self { command, args })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_string_str(&self.command);
        writer.write_u16_le(self.args.len() as u16);
        for arg in &self.args {
            writer.write_string_str(arg);
        }
        writer.into_vec()
    }
}

/// Prefixes `payload` with the little-endian opcode header.
pub fn frame(opcode: u16, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 2);
    data.extend_from_slice(&opcode.to_le_bytes());
    data.extend_from_slice(payload);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_update_decodes_fields() {
        let update = ClientPositionUpdate {
            position: Position::new(-10.0, 4.5, 2.0).with_heading(180.0),
            animation: "Run".to_string(),
        };
        assert_eq!(ClientPositionUpdate::decode(&update.encode()), Ok(update));
    }

    #[test]
    fn truncated_client_update_names_missing_field() {
        let bytes = [0u8; 10];
        assert_eq!(
            ClientPositionUpdate::decode(&bytes),
            Err(PayloadError::Truncated("z"))
        );
    }

    #[test]
    fn command_rejects_excessive_arg_count() {
        let mut writer = PacketWriter::new();
        writer.write_string_str("level");
        writer.write_u16_le(500);
        assert_eq!(
            CommandMessage::decode(writer.as_slice()),
            Err(PayloadError::OutOfRange {
                field: "arg_count",
                value: 500
            })
        );
    }

    #[test]
    fn command_decodes_args_in_order() {
        let command = CommandMessage {
            command: "npcs".to_string(),
            args: vec!["guard".to_string(), "2".to_string()],
        };
        let decoded = CommandMessage::decode(&command.encode()).expect("command");
        assert_eq!(decoded.args, vec!["guard", "2"]);
    }

    #[test]
    fn frame_prepends_opcode() {
        assert_eq!(frame(0x0130, &[9]), vec![0x30, 0x01, 9]);
    }
}
