/// Little-endian cursor over an inbound payload.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let bytes = self.read_array::<1>()?;
        Some(bytes[0])
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32_le(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f32_le(&mut self) -> Option<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// u16 length, or `0xffff` followed by a u32 length.
    pub fn read_len_prefixed(&mut self) -> Option<usize> {
        let len = self.read_u16_le()? as usize;
        if len == 0xffff {
            return Some(self.read_u32_le()? as usize);
        }
        Some(len)
    }

    /// Reads a length-prefixed string, keeping at most `max_len - 1` bytes
    /// and skipping the rest. `max_len == 0` disables the limit.
    pub fn read_string_lossy(&mut self, max_len: usize) -> Option<String> {
        let len = self.read_len_prefixed()?;
        let bytes = if max_len > 0 && len >= max_len {
            let take = max_len - 1;
            let kept = self.read_bytes(take)?;
            self.skip(len - take)?;
            kept
        } else {
            self.read_bytes(len)?
        };
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(&self.data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    data: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Starts a zone packet with its opcode header.
    pub fn with_opcode(opcode: u16) -> Self {
        let mut writer = Self::new();
        writer.write_u16_le(opcode);
        writer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32_le(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_len_prefixed(&mut self, len: usize) {
        if len > 0xfffe {
            self.write_u16_le(0xffff);
            self.write_u32_le(len as u32);
        } else {
            self.write_u16_le(len as u16);
        }
    }

    pub fn write_string_str(&mut self, value: &str) {
        self.write_len_prefixed(value.len());
        self.data.extend_from_slice(value.as_bytes());
    }
}
