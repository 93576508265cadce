use std::time::{Duration, Instant};

use super::opcode::Opcode;
use super::reassembler::IrMessage;

/// Receive modes that gate optional opcodes. Read at dispatch time, so a
/// change made after a message was reassembled still applies to it.
#[derive(Debug, Clone, Default)]
pub struct ModeFlags {
    pub monkey: bool,
    pub hidden_object: bool,
    /// Pairing mode is on until this instant.
    pub pairing_until: Option<Instant>,
}

impl ModeFlags {
    pub fn pairing_active(&self, now: Instant) -> bool {
        matches!(self.pairing_until, Some(until) if now < until)
    }

    /// Accept `INIT_PAIR` for the next `window`.
    pub fn open_pairing(&mut self, now: Instant, window: Duration) {
        self.pairing_until = Some(now + window);
    }

    /// Clear an expired pairing window. Returns true if it was cleared.
    pub fn expire_pairing(&mut self, now: Instant) -> bool {
        if self.pairing_until.is_some() && !self.pairing_active(now) {
            self.pairing_until = None;
            return true;
        }
        false
    }
}

/// Outcome of running a message through the dispatcher's filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Deliver,
    /// Our own transmission bounced back.
    Echo,
    /// The opcode's receive mode is off.
    Gated,
}

/// Routes reassembled messages to the game agent, applying echo suppression
/// and mode gating.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    own_address: Option<u16>,
}

impl Dispatcher {
    pub fn new(own_address: Option<u16>) -> Self {
        Self { own_address }
    }

    pub fn own_address(&self) -> Option<u16> {
        self.own_address
    }

    pub fn set_own_address(&mut self, address: Option<u16>) {
        self.own_address = address;
    }

    pub fn verdict(&self, msg: &IrMessage, modes: &ModeFlags, now: Instant) -> Verdict {
        if Some(msg.sender) == self.own_address {
            return Verdict::Echo;
        }
        let open = match msg.opcode {
            Opcode::Monkey => modes.monkey,
            Opcode::HiddenObject => modes.hidden_object,
            Opcode::InitPair => modes.pairing_active(now),
            _ => true,
        };
        if open { Verdict::Deliver } else { Verdict::Gated }
    }

    /// Filter a batch of buffered messages, keeping arrival order.
    pub fn dispatch<I>(&self, inbox: I, modes: &ModeFlags, now: Instant) -> Vec<IrMessage>
    where
        I: IntoIterator<Item = IrMessage>,
    {
        inbox
            .into_iter()
            .filter(|msg| match self.verdict(msg, modes, now) {
                Verdict::Deliver => true,
                verdict => {
                    tracing::debug!(
                        sender = msg.sender,
                        opcode = %msg.opcode,
                        ?verdict,
                        "dropping IR message"
                    );
                    false
                },
            })
            .collect()
    }
}
