use std::collections::HashMap;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use super::opcode::{MAX_EXTRA_BYTES, Opcode};

/// Longest gap allowed between two bytes of the same message.
pub const IR_RX_MAX_DELAY: Duration = Duration::from_millis(250);

/// Payload bytes of a message (at most three).
pub type Extra = SmallVec<[u8; MAX_EXTRA_BYTES]>;

/// A fully reassembled IR message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrMessage {
    pub sender: u16,
    pub opcode: Opcode,
    pub extra: Extra,
    /// Arrival time of the final byte.
    pub received_at: Instant,
}

impl IrMessage {
    /// Two-byte payload decoded as a big-endian u16.
    pub fn payload_u16(&self) -> Option<u16> {
        match self.extra.as_slice() {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// In-flight reassembly state for one sender.
#[derive(Debug)]
struct PartialMessage {
    opcode: Opcode,
    extra: Extra,
    last_byte_at: Instant,
}

impl PartialMessage {
    fn is_complete(&self) -> bool {
        self.extra.len() == self.opcode.arity()
    }
}

/// Turns a stream of `(sender, byte)` events into complete messages.
///
/// Each sender gets its own partial message. A message completes after
/// `1 + arity(opcode)` bytes, each arriving within the max delay of the
/// previous one. A late byte discards the partial and is reprocessed as the
/// head of a new message. Unknown opcodes are dropped without creating state.
/// Nothing here ever reports an error to the caller.
#[derive(Debug)]
pub struct Reassembler {
    partials: HashMap<u16, PartialMessage>,
    max_delay: Duration,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::with_max_delay(IR_RX_MAX_DELAY)
    }

    pub fn with_max_delay(max_delay: Duration) -> Self {
        Self {
            partials: HashMap::new(),
            max_delay,
        }
    }

    /// Feed one received byte. Returns a message when this byte completes one.
    pub fn push(&mut self, sender: u16, byte: u8, now: Instant) -> Option<IrMessage> {
        if let Some(partial) = self.partials.get_mut(&sender) {
            let late = now.saturating_duration_since(partial.last_byte_at) > self.max_delay;
            if !late && !partial.is_complete() {
                partial.extra.push(byte);
                partial.last_byte_at = now;
                return self.take_complete(sender);
            }
            tracing::trace!(sender, byte, late, "restarting IR reassembly");
            self.partials.remove(&sender);
        }
        self.start(sender, byte, now)
    }

    fn start(&mut self, sender: u16, byte: u8, now: Instant) -> Option<IrMessage> {
        let Some(opcode) = Opcode::from_code(byte) else {
            tracing::trace!(sender, byte, "dropping IR byte with unknown opcode");
            return None;
        };
        self.partials.insert(
            sender,
            PartialMessage {
                opcode,
                extra: Extra::new(),
                last_byte_at: now,
            },
        );
        self.take_complete(sender)
    }

    fn take_complete(&mut self, sender: u16) -> Option<IrMessage> {
        if !self.partials.get(&sender)?.is_complete() {
            return None;
        }
        let partial = self.partials.remove(&sender)?;
        Some(IrMessage {
            sender,
            opcode: partial.opcode,
            extra: partial.extra,
            received_at: partial.last_byte_at,
        })
    }

    /// Drop partials whose last byte is older than the max delay.
    /// Returns how many were dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.partials.len();
        let max_delay = self.max_delay;
        self.partials
            .retain(|_, p| now.saturating_duration_since(p.last_byte_at) <= max_delay);
        before - self.partials.len()
    }

    /// Number of senders with a message in flight.
    pub fn pending(&self) -> usize {
        self.partials.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::feed_frame;
    use proptest::prelude::*;

    const GAP: Duration = Duration::from_millis(175);

    #[test]
    fn zero_arity_message_completes_immediately() {
        let mut r = Reassembler::new();
        let msg = r.push(7, Opcode::Discover.code(), Instant::now()).unwrap();
        assert_eq!(msg.opcode, Opcode::Discover);
        assert_eq!(msg.sender, 7);
        assert!(msg.extra.is_empty());
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn multi_byte_message_completes_on_last_byte() {
        let mut r = Reassembler::new();
        let t0 = Instant::now();
        assert!(r.push(9, 4, t0).is_none());
        assert!(r.push(9, 0x12, t0 + GAP).is_none());
        let msg = r.push(9, 0x34, t0 + GAP * 2).unwrap();
        assert_eq!(msg.opcode, Opcode::RespPair);
        assert_eq!(msg.payload_u16(), Some(0x1234));
        assert_eq!(msg.received_at, t0 + GAP * 2);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn unknown_opcode_leaves_no_state() {
        let mut r = Reassembler::new();
        assert!(r.push(1, 0, Instant::now()).is_none());
        assert!(r.push(1, 200, Instant::now()).is_none());
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn senders_are_multiplexed() {
        let mut r = Reassembler::new();
        let t0 = Instant::now();
        assert!(r.push(1, Opcode::Emote.code(), t0).is_none());
        assert!(r.push(2, Opcode::Monkey.code(), t0).is_none());
        let a = r.push(1, 3, t0 + GAP).unwrap();
        assert!(r.push(2, 0, t0 + GAP).is_none());
        let b = r.push(2, 5, t0 + GAP * 2).unwrap();
        assert_eq!((a.sender, a.opcode), (1, Opcode::Emote));
        assert_eq!(a.extra.as_slice(), &[3]);
        assert_eq!((b.sender, b.opcode), (2, Opcode::Monkey));
        assert_eq!(b.payload_u16(), Some(5));
    }

    #[test]
    fn late_byte_restarts_as_new_head() {
        let mut r = Reassembler::new();
        let t0 = Instant::now();
        assert!(r.push(3, Opcode::HiddenObject.code(), t0).is_none());
        // Gap too long: the HERE byte becomes a fresh message.
        let late = t0 + IR_RX_MAX_DELAY + Duration::from_millis(1);
        let msg = r.push(3, Opcode::Here.code(), late).unwrap();
        assert_eq!(msg.opcode, Opcode::Here);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn late_non_opcode_byte_is_dropped() {
        let mut r = Reassembler::new();
        let t0 = Instant::now();
        r.push(3, Opcode::Emote.code(), t0);
        assert!(r.push(3, 0xEE, t0 + Duration::from_secs(1)).is_none());
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn gap_at_exact_limit_is_accepted() {
        let mut r = Reassembler::new();
        let t0 = Instant::now();
        r.push(3, Opcode::Emote.code(), t0);
        let msg = r.push(3, 1, t0 + IR_RX_MAX_DELAY).unwrap();
        assert_eq!(msg.opcode, Opcode::Emote);
    }

    #[test]
    fn expire_drops_stale_partials() {
        let mut r = Reassembler::new();
        let t0 = Instant::now();
        r.push(1, Opcode::RespPair.code(), t0);
        r.push(2, Opcode::AckResp.code(), t0 + Duration::from_millis(200));
        assert_eq!(r.expire(t0 + Duration::from_millis(300)), 1);
        assert_eq!(r.pending(), 1);
    }

    #[test]
    fn back_to_back_messages_from_one_sender() {
        let mut r = Reassembler::new();
        let bytes = [1, 6, 9, 2];
        let msgs = feed_frame(&mut r, 5, &bytes, Instant::now(), GAP);
        let ops: Vec<_> = msgs.iter().map(|m| m.opcode).collect();
        assert_eq!(ops, vec![Opcode::Discover, Opcode::Emote, Opcode::Here]);
    }

    proptest! {
        /// Every emitted message has exactly its opcode's arity.
        #[test]
        fn emitted_messages_have_correct_arity(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
            gaps in proptest::collection::vec(0u64..400, 64),
        ) {
            let mut r = Reassembler::new();
            let mut now = Instant::now();
            for (i, b) in bytes.iter().enumerate() {
                now += Duration::from_millis(gaps[i]);
                if let Some(msg) = r.push(11, *b, now) {
                    prop_assert_eq!(msg.extra.len(), msg.opcode.arity());
                }
            }
            prop_assert!(r.pending() <= 1);
        }

        /// A well-formed, well-paced frame always yields exactly one message.
        #[test]
        fn paced_frame_yields_one_message(
            code in 1u8..=8,
            payload in proptest::collection::vec(any::<u8>(), 3),
            gap_ms in 0u64..=250,
        ) {
            let opcode = Opcode::from_code(code).unwrap();
            let frame = opcode.frame(&payload[..opcode.arity()]).unwrap();
            let mut r = Reassembler::new();
            let msgs = feed_frame(&mut r, 42, &frame, Instant::now(), Duration::from_millis(gap_ms));
            prop_assert_eq!(msgs.len(), 1);
            prop_assert_eq!(msgs[0].opcode, opcode);
            prop_assert_eq!(msgs[0].extra.as_slice(), &frame[1..]);
        }
    }
}
