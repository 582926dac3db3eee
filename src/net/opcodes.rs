/// Zone opcodes. Values outside the known set decode to `Unknown` and fall
/// through to the unhandled path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    RequestClientZoneChange,
    NewZone,
    PlayerProfile,
    ZoneSpawns,
    BatchZoneSpawns,
    DeleteSpawn,
    ClientUpdate,
    SpawnPositionUpdate,
    Animation,
    ChannelMessage,
    Camp,
    GmCommand,
    LevelUpdate,
    Unknown(u16),
}

impl Opcode {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0101 => Opcode::RequestClientZoneChange,
            0x0102 => Opcode::NewZone,
            0x0103 => Opcode::PlayerProfile,
            0x0110 => Opcode::ZoneSpawns,
            0x0111 => Opcode::BatchZoneSpawns,
            0x0112 => Opcode::DeleteSpawn,
            0x0120 => Opcode::ClientUpdate,
            0x0121 => Opcode::SpawnPositionUpdate,
            0x0122 => Opcode::Animation,
            0x0130 => Opcode::ChannelMessage,
            0x0140 => Opcode::Camp,
            0x0150 => Opcode::GmCommand,
            0x0151 => Opcode::LevelUpdate,
            other => Opcode::Unknown(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Opcode::RequestClientZoneChange => 0x0101,
            Opcode::NewZone => 0x0102,
            Opcode::PlayerProfile => 0x0103,
            Opcode::ZoneSpawns => 0x0110,
            Opcode::BatchZoneSpawns => 0x0111,
            Opcode::DeleteSpawn => 0x0112,
            Opcode::ClientUpdate => 0x0120,
            Opcode::SpawnPositionUpdate => 0x0121,
            Opcode::Animation => 0x0122,
            Opcode::ChannelMessage => 0x0130,
            Opcode::Camp => 0x0140,
            Opcode::GmCommand => 0x0150,
            Opcode::LevelUpdate => 0x0151,
            Opcode::Unknown(value) => value,
        }
    }
}
