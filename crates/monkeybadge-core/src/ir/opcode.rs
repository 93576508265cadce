use std::fmt;

/// Largest payload any opcode carries after its code byte.
pub const MAX_EXTRA_BYTES: usize = 3;

/// IR message type. The discriminant is the code byte sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Discover = 1,
    Here = 2,
    InitPair = 3,
    RespPair = 4,
    AckResp = 5,
    Emote = 6,
    Monkey = 7,
    HiddenObject = 8,
}

/// One row of the opcode table: how many payload bytes follow the code.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeEntry {
    pub opcode: Opcode,
    pub name: &'static str,
    pub extra_bytes: usize,
}

/// Static opcode → arity table, ordered by code.
pub const OPCODE_TABLE: [OpcodeEntry; 8] = [
    OpcodeEntry {
        opcode: Opcode::Discover,
        name: "DISCOVER",
        extra_bytes: 0,
    },
    OpcodeEntry {
        opcode: Opcode::Here,
        name: "HERE",
        extra_bytes: 0,
    },
    OpcodeEntry {
        opcode: Opcode::InitPair,
        name: "INIT_PAIR",
        extra_bytes: 0,
    },
    OpcodeEntry {
        opcode: Opcode::RespPair,
        name: "RESP_PAIR",
        extra_bytes: 2,
    },
    OpcodeEntry {
        opcode: Opcode::AckResp,
        name: "ACK_RESP",
        extra_bytes: 2,
    },
    OpcodeEntry {
        opcode: Opcode::Emote,
        name: "EMOTE",
        extra_bytes: 1,
    },
    OpcodeEntry {
        opcode: Opcode::Monkey,
        name: "MONKEY",
        extra_bytes: 2,
    },
    OpcodeEntry {
        opcode: Opcode::HiddenObject,
        name: "HIDDEN_OBJECT",
        extra_bytes: 2,
    },
];

impl Opcode {
    /// Look up a code byte in the opcode table.
    pub fn from_code(code: u8) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find(|entry| entry.opcode as u8 == code)
            .map(|entry| entry.opcode)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    fn entry(self) -> &'static OpcodeEntry {
        // Table rows are ordered by code, starting at 1.
        &OPCODE_TABLE[self as usize - 1]
    }

    /// Number of payload bytes following the code byte.
    pub fn arity(self) -> usize {
        self.entry().extra_bytes
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Build the byte sequence a transmitter sends for this opcode.
    pub fn frame(self, extra: &[u8]) -> Result<Vec<u8>, FrameError> {
        if extra.len() != self.arity() {
            return Err(FrameError {
                opcode: self,
                got: extra.len(),
            });
        }
        let mut frame = Vec::with_capacity(1 + extra.len());
        frame.push(self.code());
        frame.extend_from_slice(extra);
        Ok(frame)
    }

    /// Build a frame whose two-byte payload is a big-endian u16
    /// (a destination address or an object id).
    pub fn frame_u16(self, value: u16) -> Result<Vec<u8>, FrameError> {
        self.frame(&value.to_be_bytes())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload length does not match the opcode's arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError {
    pub opcode: Opcode,
    pub got: usize,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} takes {} extra bytes, got {}",
            self.opcode,
            self.opcode.arity(),
            self.got
        )
    }
}

impl std::error::Error for FrameError {}
