pub mod badge;
pub mod ir;
pub mod time;
pub mod wire;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use crate::badge::{BadgeDocument, Challenge, IrId, MatchEntry};
    use crate::ir::{IrMessage, Reassembler};

    /// A registered badge with the given handle and IR id, still at the intro.
    pub fn make_document(handle: &str, ir_id: IrId) -> BadgeDocument {
        let mut doc = BadgeDocument::new(
            Uuid::new_v4(),
            handle.to_string(),
            format!("token-{handle}"),
        );
        doc.ir_id = Some(ir_id);
        doc
    }

    /// A badge that has finished the intro and sits at challenge 1.
    pub fn make_paired_ready(handle: &str, ir_id: IrId) -> BadgeDocument {
        let mut doc = make_document(handle, ir_id);
        doc.intro.enabled = true;
        doc.intro.complete = true;
        doc.current_challenge = Challenge::Challenge1;
        doc
    }

    /// Record `count` synthetic friends with IR ids starting at `first`.
    pub fn add_friends(doc: &mut BadgeDocument, first: IrId, count: u16) {
        for ir_id in first..first + count {
            doc.challenge1.matches.insert(
                ir_id,
                MatchEntry {
                    handle: format!("friend{ir_id}"),
                    uuid: Uuid::new_v4(),
                },
            );
        }
    }

    /// Feed a frame from one sender with a fixed gap between bytes and
    /// collect whatever messages complete.
    pub fn feed_frame(
        reassembler: &mut Reassembler,
        sender: u16,
        frame: &[u8],
        start: Instant,
        gap: Duration,
    ) -> Vec<IrMessage> {
        frame
            .iter()
            .enumerate()
            .filter_map(|(i, byte)| reassembler.push(sender, *byte, start + gap * i as u32))
            .collect()
    }
}
