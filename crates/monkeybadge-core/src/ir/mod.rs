//! Badge-to-badge infrared protocol: opcode table, per-sender message
//! reassembly, and dispatch filtering.

pub mod dispatcher;
pub mod emote;
pub mod opcode;
pub mod reassembler;

use std::time::Duration;

pub use dispatcher::{Dispatcher, ModeFlags, Verdict};
pub use emote::emote_text;
pub use opcode::{FrameError, OPCODE_TABLE, Opcode};
pub use reassembler::{IR_RX_MAX_DELAY, IrMessage, Reassembler};

/// Pause between transmitted bytes. Must stay below `IR_RX_MAX_DELAY` or
/// receivers split the frame.
pub const IR_TX_DELAY: Duration = Duration::from_millis(175);
