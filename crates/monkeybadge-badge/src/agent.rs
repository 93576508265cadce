//! Badge game agent.
//!
//! Owns everything the control loop mutates: the reassembler, the receive
//! modes, the peers heard recently and the queue of server mutations that
//! have not been delivered yet. Handlers never talk to the network directly;
//! they queue IR frames and deferred ops which [`Agent::sync`] and the
//! runtime flush on the next tick.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

use uuid::Uuid;

use monkeybadge_core::badge::{BadgeDocument, Challenge, FRIENDS_REQUIRED, HandleError, IrId};
use monkeybadge_core::ir::{
    Dispatcher, FrameError, IrMessage, ModeFlags, Opcode, Reassembler, emote_text,
};

use crate::button::{Button, Debouncer};
use crate::cache::{LocalCache, STATE_KEY, TOKEN_KEY, UUID_KEY};
use crate::config::TimingConfig;
use crate::display::Display;
use crate::leds::LedShow;
use crate::sync::{DeferredOp, SyncClient, SyncError, SyncOutcome};

pub struct Agent<D: Display, C: LocalCache> {
    timing: TimingConfig,
    /// Handle asked for at registration when the badge has no document yet.
    preferred_handle: Option<String>,
    uuid: Uuid,
    token: Option<String>,
    document: Option<BadgeDocument>,
    reassembler: Reassembler,
    /// Arrival stamp of the newest IR byte processed. Stale partials are
    /// judged against this rather than the tick clock.
    last_ir_at: Option<Instant>,
    dispatcher: Dispatcher,
    modes: ModeFlags,
    seen_peers: HashMap<u16, Instant>,
    deferred_ops: BTreeMap<String, DeferredOp>,
    outbox: VecDeque<Vec<u8>>,
    debouncer: Debouncer,
    last_checkin: Option<Instant>,
    last_beacon: Option<Instant>,
    pending_show: Option<LedShow>,
    display: D,
    cache: C,
}

impl<D: Display, C: LocalCache> Agent<D, C> {
    /// Boot the agent, restoring uuid, token and the last good document from
    /// the cache. A badge with no cached uuid gets a fresh one.
    pub fn new(
        timing: TimingConfig,
        preferred_handle: Option<String>,
        display: D,
        mut cache: C,
    ) -> Self {
        let uuid = match cache.get(UUID_KEY).and_then(|s| Uuid::parse_str(&s).ok()) {
            Some(uuid) => uuid,
            None => {
                let uuid = Uuid::new_v4();
                if let Err(e) = cache.set(UUID_KEY, uuid.to_string()) {
                    tracing::warn!(error = %e, "Failed to persist badge uuid");
                }
                uuid
            },
        };
        let token = cache.get(TOKEN_KEY);
        let document = cache.get(STATE_KEY).and_then(|raw| {
            match serde_json::from_str::<BadgeDocument>(&raw) {
                Ok(doc) if doc.uuid == uuid => Some(doc),
                Ok(doc) => {
                    tracing::warn!(cached = %doc.uuid, %uuid, "Ignoring cached state for another badge");
                    None
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable cached state");
                    None
                },
            }
        });

        let debouncer = Debouncer::new(timing.debounce());
        let mut agent = Self {
            timing,
            preferred_handle,
            uuid,
            token,
            document: None,
            reassembler: Reassembler::new(),
            last_ir_at: None,
            dispatcher: Dispatcher::new(None),
            modes: ModeFlags::default(),
            seen_peers: HashMap::new(),
            deferred_ops: BTreeMap::new(),
            outbox: VecDeque::new(),
            debouncer,
            last_checkin: None,
            last_beacon: None,
            pending_show: None,
            display,
            cache,
        };
        if let Some(doc) = document {
            tracing::info!(handle = %doc.handle, stage = %doc.current_challenge, "Restored cached state");
            agent.adopt(doc);
        }
        agent
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn document(&self) -> Option<&BadgeDocument> {
        self.document.as_ref()
    }

    pub fn own_address(&self) -> Option<u16> {
        self.dispatcher.own_address()
    }

    pub fn modes(&self) -> &ModeFlags {
        &self.modes
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn has_seen(&self, peer: u16) -> bool {
        self.seen_peers.contains_key(&peer)
    }

    pub fn seen_count(&self) -> usize {
        self.seen_peers.len()
    }

    /// IR ids of every confirmed friend, from the synced document.
    pub fn friends(&self) -> Vec<IrId> {
        self.document
            .as_ref()
            .map(|d| d.challenge1.matches.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn deferred_op(&self, key: &str) -> Option<&DeferredOp> {
        self.deferred_ops.get(key)
    }

    pub fn pending_ops(&self) -> usize {
        self.deferred_ops.len()
    }

    pub fn take_show(&mut self) -> Option<LedShow> {
        self.pending_show.take()
    }

    /// Frames ready to transmit, in queue order. Without an IR address the
    /// badge cannot transmit, so anything queued is dropped.
    pub fn take_outbox(&mut self) -> Vec<Vec<u8>> {
        if self.own_address().is_none() {
            if !self.outbox.is_empty() {
                tracing::debug!(dropped = self.outbox.len(), "No IR address yet, dropping frames");
                self.outbox.clear();
            }
            return Vec::new();
        }
        self.outbox.drain(..).collect()
    }

    fn intro_complete(&self) -> bool {
        self.document.as_ref().is_some_and(|d| d.intro.complete)
    }

    fn is_friend(&self, peer: u16) -> bool {
        self.document.as_ref().is_some_and(|d| d.is_friend(peer))
    }

    fn mark_seen(&mut self, peer: u16, now: Instant) {
        self.seen_peers.insert(peer, now);
    }

    fn queue_frame(&mut self, frame: Result<Vec<u8>, FrameError>) {
        match frame {
            Ok(frame) => self.outbox.push_back(frame),
            Err(e) => tracing::warn!(error = %e, "Refusing to queue malformed IR frame"),
        }
    }

    /// Queue a server mutation. A later op under the same key replaces the
    /// earlier one, so repeated sightings of one peer collapse into one call.
    fn enqueue(&mut self, key: String, op: DeferredOp) {
        tracing::debug!(key = %key, ?op, "queued server op");
        self.deferred_ops.insert(key, op);
    }

    fn show(&mut self, lines: &[String]) {
        self.display.show(lines);
    }

    // --- IR receive path ---

    /// Feed one byte heard on the IR medium.
    pub fn on_ir_byte(&mut self, sender: u16, byte: u8, at: Instant) {
        self.last_ir_at = Some(self.last_ir_at.map_or(at, |last| last.max(at)));
        let Some(msg) = self.reassembler.push(sender, byte, at) else {
            return;
        };
        for msg in self.dispatcher.dispatch([msg], &self.modes, at) {
            self.handle_message(&msg, at);
        }
    }

    /// React to one delivered message.
    pub fn handle_message(&mut self, msg: &IrMessage, now: Instant) {
        let sender = msg.sender;
        tracing::debug!(sender, opcode = %msg.opcode, "IR message");
        match msg.opcode {
            Opcode::Discover => {
                self.mark_seen(sender, now);
                self.queue_frame(Opcode::Here.frame(&[]));
            },
            Opcode::Here => {
                self.mark_seen(sender, now);
                self.pending_show = Some(LedShow::Ping);
            },
            Opcode::InitPair => {
                self.mark_seen(sender, now);
                if !self.is_friend(sender) {
                    self.enqueue(format!("friendrequest_{sender}"), DeferredOp::FriendRequest(sender));
                }
                self.queue_frame(Opcode::RespPair.frame_u16(sender));
            },
            Opcode::RespPair => {
                if self.addressed_to_us(msg) {
                    self.mark_seen(sender, now);
                    self.queue_frame(Opcode::AckResp.frame_u16(sender));
                }
            },
            Opcode::AckResp => {
                if self.addressed_to_us(msg) {
                    self.mark_seen(sender, now);
                    self.pending_show = Some(LedShow::Paired);
                    self.show(&[format!("paired with {sender}")]);
                }
            },
            Opcode::Emote => {
                let code = msg.extra.first().copied().unwrap_or_default();
                let text = emote_text(code).unwrap_or("?");
                self.show(&[format!("{sender} says"), text.to_string()]);
            },
            Opcode::HiddenObject => {
                if let Some(object_id) = msg.payload_u16() {
                    self.enqueue(format!("hiddenobject_{sender}"), DeferredOp::HiddenObject(object_id));
                }
            },
            Opcode::Monkey => {
                if let Some(beacon_id) = msg.payload_u16() {
                    self.enqueue(format!("monkeysee_{sender}"), DeferredOp::MonkeySee(beacon_id));
                }
            },
        }
    }

    fn addressed_to_us(&self, msg: &IrMessage) -> bool {
        msg.payload_u16().is_some() && msg.payload_u16() == self.own_address()
    }

    // --- Local actions ---

    /// Returns false if the press was a bounce.
    pub fn on_button(&mut self, button: Button, now: Instant) -> bool {
        if !self.debouncer.accept(button, now) {
            return false;
        }
        match button {
            Button::Up => {
                self.queue_frame(Opcode::Discover.frame(&[]));
                self.show(&["looking for monkeys".to_string()]);
            },
            Button::Down => {
                let window = self.timing.pairing_window();
                self.modes.open_pairing(now, window);
                self.show(&[format!("pairing open {}s", window.as_secs())]);
            },
            Button::Center => {
                if self.intro_complete() {
                    self.queue_frame(Opcode::InitPair.frame(&[]));
                    self.show(&["pairing...".to_string()]);
                } else {
                    self.show(&["finish the intro first".to_string()]);
                }
            },
            Button::Right => self.show_status(),
        }
        true
    }

    pub fn show_status(&mut self) {
        let lines = match &self.document {
            Some(doc) => vec![
                doc.handle.clone(),
                match doc.ir_id {
                    Some(id) => format!("IR {id}"),
                    None => "IR --".to_string(),
                },
                doc.current_challenge.to_string(),
                format!("friends {}/{FRIENDS_REQUIRED}", doc.challenge1.matches.len()),
                format!("nearby {}", self.seen_peers.len()),
                format!("pending {}", self.deferred_ops.len()),
            ],
            None => vec!["unregistered".to_string(), format!("pending {}", self.deferred_ops.len())],
        };
        self.show(&lines);
    }

    pub fn send_emote(&mut self, code: u8) {
        self.queue_frame(Opcode::Emote.frame(&[code]));
    }

    /// The intro game was won on the badge.
    pub fn complete_intro(&mut self) {
        self.enqueue("introcomplete".to_string(), DeferredOp::IntroComplete);
    }

    pub fn change_handle(&mut self, handle: &str) -> Result<(), HandleError> {
        monkeybadge_core::badge::validate_handle(handle)?;
        self.preferred_handle = Some(handle.to_string());
        self.enqueue("changehandle".to_string(), DeferredOp::ChangeHandle(handle.to_string()));
        Ok(())
    }

    // --- Timers ---

    /// Time-driven duties that need no network: pairing expiry, stale
    /// reassembly, peer eviction and the monkey beacon.
    pub fn housekeeping(&mut self, now: Instant) {
        if self.modes.expire_pairing(now) {
            tracing::debug!("pairing window closed");
        }
        if let Some(newest) = self.last_ir_at {
            self.reassembler.expire(newest);
        }

        let clean_after = self.timing.clean_badge_after();
        self.seen_peers
            .retain(|_, seen| now.saturating_duration_since(*seen) <= clean_after);

        if let Some(beacon_id) = self.document.as_ref().and_then(|d| d.monkey_id)
            && self
                .last_beacon
                .is_none_or(|t| now.saturating_duration_since(t) >= self.timing.beacon_period())
        {
            self.queue_frame(Opcode::Monkey.frame_u16(beacon_id));
            self.last_beacon = Some(now);
        }
    }

    pub fn checkin_due(&self, now: Instant) -> bool {
        self.last_checkin
            .is_none_or(|t| now.saturating_duration_since(t) >= self.timing.checkin_period())
    }

    // --- Server sync ---

    fn registration_handle(&self) -> Option<String> {
        self.document
            .as_ref()
            .map(|d| d.handle.clone())
            .or_else(|| self.preferred_handle.clone())
    }

    /// Checkin when due (registering first if the badge has no token), then
    /// try every deferred op once. Ops stay queued on soft failures.
    pub async fn sync(&mut self, client: &SyncClient, now: Instant) {
        if self.checkin_due(now) {
            self.last_checkin = Some(now);
            let handle = self.registration_handle();
            let result = match self.token.clone() {
                Some(token) => client.checkin(self.uuid, &token, handle.as_deref()).await,
                None => client.register(self.uuid, handle.as_deref(), None).await,
            };
            self.absorb("checkin", result);
        }

        let Some(token) = self.token.clone() else {
            return;
        };
        let keys: Vec<String> = self.deferred_ops.keys().cloned().collect();
        for key in keys {
            let Some(op) = self.deferred_ops.get(&key).cloned() else {
                continue;
            };
            let result = client.perform(&op, self.uuid, &token).await;
            if self.absorb(&key, result) {
                self.deferred_ops.remove(&key);
            }
        }
    }

    /// Fold a server result into local state. Returns true when the call is
    /// settled and should not be retried.
    fn absorb(&mut self, op: &str, result: Result<SyncOutcome, SyncError>) -> bool {
        match result {
            Ok(SyncOutcome::Updated(doc)) => {
                self.apply_document(*doc);
                true
            },
            Ok(SyncOutcome::AlreadyDone) => true,
            Ok(SyncOutcome::NotFound) => {
                tracing::debug!(op, "server returned not found, will retry");
                false
            },
            Ok(SyncOutcome::Rejected { status, reason }) => {
                tracing::warn!(op, status, reason = %reason, "server rejected op, dropping it");
                true
            },
            Err(e) => {
                tracing::warn!(op, error = %e, "sync failed, will retry");
                false
            },
        }
    }

    /// Take a document returned by the server as the new truth and persist it.
    pub fn apply_document(&mut self, doc: BadgeDocument) {
        let previous = self.document.as_ref().map(|d| d.current_challenge);
        if let Err(e) = self.cache.set(TOKEN_KEY, doc.token.clone()) {
            tracing::warn!(error = %e, "Failed to cache token");
        }
        match serde_json::to_string(&doc) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(STATE_KEY, raw) {
                    tracing::warn!(error = %e, "Failed to cache state");
                }
            },
            Err(e) => tracing::warn!(error = %e, "Failed to encode state"),
        }

        let stage = doc.current_challenge;
        self.adopt(doc);

        if previous.is_some_and(|p| p < stage) {
            tracing::info!(%stage, "Advanced to a new stage");
            self.pending_show = Some(if stage == Challenge::Winner {
                LedShow::Winner
            } else {
                LedShow::Advance
            });
            self.show(&[format!("now at {stage}")]);
        }
    }

    /// Install a document and derive the receive modes from it.
    fn adopt(&mut self, doc: BadgeDocument) {
        self.token = Some(doc.token.clone());
        self.dispatcher.set_own_address(doc.ir_id);
        self.modes.hidden_object = doc.current_challenge == Challenge::Challenge2;
        self.modes.monkey = doc.current_challenge == Challenge::Challenge3;
        if doc.monkey_id.is_none() {
            self.last_beacon = None;
        }
        self.document = Some(doc);
    }

    /// Delete the badge on the server and forget all local game state. The
    /// uuid survives, so the next checkin registers the badge from scratch.
    pub async fn reset(&mut self, client: &SyncClient) -> Result<(), SyncError> {
        if let Some(token) = self.token.clone() {
            match client.delete_badge(self.uuid, &token).await? {
                SyncOutcome::Updated(_) | SyncOutcome::NotFound | SyncOutcome::AlreadyDone => {},
                SyncOutcome::Rejected { status, reason } => {
                    tracing::warn!(status, reason = %reason, "server refused delete, resetting locally anyway");
                },
            }
        }
        for key in [TOKEN_KEY, STATE_KEY] {
            if let Err(e) = self.cache.remove(key) {
                tracing::warn!(key, error = %e, "Failed to clear cache entry");
            }
        }
        self.token = None;
        self.document = None;
        self.dispatcher.set_own_address(None);
        self.modes = ModeFlags::default();
        self.deferred_ops.clear();
        self.outbox.clear();
        self.last_checkin = None;
        self.last_beacon = None;
        self.show(&["badge reset".to_string()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use monkeybadge_core::test_helpers::{add_friends, make_document, make_paired_ready};

    use super::*;
    use crate::cache::MemoryCache;
    use crate::display::BufferDisplay;

    type TestAgent = Agent<BufferDisplay, MemoryCache>;

    const ME: u16 = 1000;
    const PEER: u16 = 2000;

    fn agent() -> TestAgent {
        Agent::new(TimingConfig::default(), None, BufferDisplay::new(), MemoryCache::new())
    }

    fn agent_with(doc: BadgeDocument) -> TestAgent {
        let mut a = agent();
        let mut doc = doc;
        doc.uuid = a.uuid();
        a.apply_document(doc);
        a
    }

    fn deliver(a: &mut TestAgent, sender: u16, frame: &[u8], now: Instant) {
        for (i, byte) in frame.iter().enumerate() {
            a.on_ir_byte(sender, *byte, now + Duration::from_millis(10) * i as u32);
        }
    }

    #[test]
    fn fresh_agent_persists_a_uuid() {
        let a = agent();
        assert_eq!(a.cache().get(UUID_KEY), Some(a.uuid().to_string()));
        assert!(a.token().is_none());
        assert!(a.own_address().is_none());
    }

    #[test]
    fn boot_restores_cached_state() {
        let mut first = agent_with(make_paired_ready("ook", ME));
        let cache = std::mem::take(&mut first.cache);

        let restored: TestAgent =
            Agent::new(TimingConfig::default(), None, BufferDisplay::new(), cache);
        assert_eq!(restored.uuid(), first.uuid());
        assert_eq!(restored.token(), Some("token-ook"));
        assert_eq!(restored.own_address(), Some(ME));
        assert_eq!(restored.document().map(|d| d.handle.as_str()), Some("ook"));
    }

    #[test]
    fn discover_gets_a_here_reply() {
        let mut a = agent_with(make_document("ook", ME));
        let now = Instant::now();
        deliver(&mut a, PEER, &[Opcode::Discover.code()], now);
        assert!(a.has_seen(PEER));
        assert_eq!(a.take_outbox(), vec![vec![Opcode::Here.code()]]);
    }

    #[test]
    fn init_pair_is_gated_until_pairing_window_opens() {
        let mut a = agent_with(make_paired_ready("ook", ME));
        let now = Instant::now();
        deliver(&mut a, PEER, &[Opcode::InitPair.code()], now);
        assert_eq!(a.pending_ops(), 0);
        assert!(a.take_outbox().is_empty());

        assert!(a.on_button(Button::Down, now));
        deliver(&mut a, PEER, &[Opcode::InitPair.code()], now + Duration::from_secs(1));
        assert_eq!(
            a.deferred_op(&format!("friendrequest_{PEER}")),
            Some(&DeferredOp::FriendRequest(PEER))
        );
        let resp = Opcode::RespPair.frame_u16(PEER).unwrap();
        assert_eq!(a.take_outbox(), vec![resp]);

        // Window closes after ten seconds.
        a.housekeeping(now + Duration::from_secs(11));
        deliver(&mut a, 3000, &[Opcode::InitPair.code()], now + Duration::from_secs(12));
        assert!(a.deferred_op("friendrequest_3000").is_none());
    }

    #[test]
    fn init_pair_from_existing_friend_queues_no_request() {
        let mut doc = make_paired_ready("ook", ME);
        add_friends(&mut doc, PEER, 1);
        let mut a = agent_with(doc);
        let now = Instant::now();
        a.on_button(Button::Down, now);
        deliver(&mut a, PEER, &[Opcode::InitPair.code()], now);
        assert_eq!(a.pending_ops(), 0);
        assert_eq!(a.take_outbox().len(), 1);
    }

    #[test]
    fn repeated_init_pair_collapses_into_one_op() {
        let mut a = agent_with(make_paired_ready("ook", ME));
        let now = Instant::now();
        a.on_button(Button::Down, now);
        deliver(&mut a, PEER, &[Opcode::InitPair.code()], now);
        deliver(&mut a, PEER, &[Opcode::InitPair.code()], now + Duration::from_secs(1));
        assert_eq!(a.pending_ops(), 1);
    }

    #[test]
    fn resp_pair_for_us_is_acknowledged() {
        let mut a = agent_with(make_paired_ready("ook", ME));
        let now = Instant::now();
        deliver(&mut a, PEER, &Opcode::RespPair.frame_u16(ME).unwrap(), now);
        assert!(a.has_seen(PEER));
        assert_eq!(a.take_outbox(), vec![Opcode::AckResp.frame_u16(PEER).unwrap()]);

        // Addressed to someone else.
        deliver(&mut a, 3000, &Opcode::RespPair.frame_u16(4000).unwrap(), now);
        assert!(!a.has_seen(3000));
        assert!(a.take_outbox().is_empty());
    }

    #[test]
    fn ack_resp_for_us_shows_pairing() {
        let mut a = agent_with(make_paired_ready("ook", ME));
        deliver(&mut a, PEER, &Opcode::AckResp.frame_u16(ME).unwrap(), Instant::now());
        assert!(a.display().contains(&format!("paired with {PEER}")));
        assert_eq!(a.take_show(), Some(LedShow::Paired));
    }

    #[test]
    fn emote_is_shown() {
        let mut a = agent_with(make_document("ook", ME));
        deliver(&mut a, PEER, &Opcode::Emote.frame(&[7]).unwrap(), Instant::now());
        assert!(a.display().contains("OOK OOK"));
    }

    #[test]
    fn hidden_object_needs_challenge2() {
        let now = Instant::now();
        let frame = Opcode::HiddenObject.frame_u16(12341).unwrap();

        let mut a = agent_with(make_paired_ready("ook", ME));
        deliver(&mut a, 12341, &frame, now);
        assert_eq!(a.pending_ops(), 0);

        let mut doc = make_paired_ready("ook", ME);
        doc.current_challenge = Challenge::Challenge2;
        let mut a = agent_with(doc);
        assert!(a.modes().hidden_object);
        deliver(&mut a, 12341, &frame, now);
        assert_eq!(
            a.deferred_op("hiddenobject_12341"),
            Some(&DeferredOp::HiddenObject(12341))
        );
    }

    #[test]
    fn monkey_needs_challenge3() {
        let mut doc = make_paired_ready("ook", ME);
        doc.current_challenge = Challenge::Challenge3;
        let mut a = agent_with(doc);
        assert!(a.modes().monkey);
        assert!(!a.modes().hidden_object);
        deliver(&mut a, 777, &Opcode::Monkey.frame_u16(23101).unwrap(), Instant::now());
        assert_eq!(a.deferred_op("monkeysee_777"), Some(&DeferredOp::MonkeySee(23101)));
    }

    #[test]
    fn own_echo_is_ignored() {
        let mut a = agent_with(make_document("ook", ME));
        deliver(&mut a, ME, &[Opcode::Discover.code()], Instant::now());
        assert!(!a.has_seen(ME));
        assert!(a.take_outbox().is_empty());
    }

    #[test]
    fn nothing_is_sent_without_an_ir_id() {
        let mut a = agent();
        a.on_button(Button::Up, Instant::now());
        assert!(a.take_outbox().is_empty());
        // The dropped frame does not linger for later.
        a.apply_document(make_document("ook", ME));
        assert!(a.take_outbox().is_empty());
    }

    #[test]
    fn buttons_are_debounced() {
        let mut a = agent_with(make_document("ook", ME));
        let now = Instant::now();
        assert!(a.on_button(Button::Up, now));
        assert!(!a.on_button(Button::Up, now + Duration::from_millis(100)));
        assert_eq!(a.take_outbox().len(), 1);
    }

    #[test]
    fn center_button_requires_intro() {
        let now = Instant::now();
        let mut a = agent_with(make_document("ook", ME));
        a.on_button(Button::Center, now);
        assert!(a.take_outbox().is_empty());
        assert!(a.display().contains("finish the intro first"));

        let mut a = agent_with(make_paired_ready("ook", ME));
        a.on_button(Button::Center, now);
        assert_eq!(a.take_outbox(), vec![vec![Opcode::InitPair.code()]]);
    }

    #[test]
    fn status_screen_lists_progress() {
        let mut doc = make_paired_ready("ook", ME);
        add_friends(&mut doc, 50, 2);
        let mut a = agent_with(doc);
        a.on_button(Button::Right, Instant::now());
        let screen = a.display().last().unwrap();
        assert_eq!(screen[0], "ook");
        assert_eq!(screen[1], format!("IR {ME}"));
        assert_eq!(screen[2], "challenge1");
        assert_eq!(screen[3], "friends 2/5");
        assert_eq!(a.friends(), vec![50, 51]);
    }

    #[test]
    fn seen_peers_are_evicted() {
        let mut a = agent_with(make_document("ook", ME));
        let now = Instant::now();
        deliver(&mut a, PEER, &[Opcode::Here.code()], now);
        a.housekeeping(now + Duration::from_secs(60));
        assert!(a.has_seen(PEER));
        a.housekeeping(now + Duration::from_secs(120));
        assert!(a.has_seen(PEER));
        a.housekeeping(now + Duration::from_secs(121));
        assert!(!a.has_seen(PEER));
    }

    #[test]
    fn slow_tick_keeps_queued_ir_bytes() {
        let mut doc = make_paired_ready("ook", ME);
        doc.current_challenge = Challenge::Challenge2;
        let mut a = agent_with(doc);
        let t0 = Instant::now();
        let gap = Duration::from_millis(175);
        let frame = Opcode::HiddenObject.frame_u16(12341).unwrap();

        // The tick runs while the rest of the frame still waits in the
        // receive channel with on-time stamps.
        a.on_ir_byte(12341, frame[0], t0);
        a.housekeeping(t0 + Duration::from_millis(400));
        a.on_ir_byte(12341, frame[1], t0 + gap);
        a.on_ir_byte(12341, frame[2], t0 + gap * 2);
        assert_eq!(
            a.deferred_op("hiddenobject_12341"),
            Some(&DeferredOp::HiddenObject(12341))
        );
    }

    #[test]
    fn late_bytes_restart_reassembly() {
        let frame = Opcode::Emote.frame(&[0]).unwrap();
        let start = Instant::now();
        let mut a = agent_with(make_document("ook", ME));
        a.on_ir_byte(PEER, frame[0], start);
        a.on_ir_byte(PEER, frame[1], start + Duration::from_millis(400));
        assert!(!a.display().contains("says"));
    }

    #[test]
    fn beacon_repeats_on_its_period() {
        let mut doc = make_document("cans", ME);
        doc.monkey_id = Some(23101);
        let mut a = agent_with(doc);
        let now = Instant::now();
        let beacon = Opcode::Monkey.frame_u16(23101).unwrap();

        a.housekeeping(now);
        assert_eq!(a.take_outbox(), vec![beacon.clone()]);
        a.housekeeping(now + Duration::from_secs(2));
        assert!(a.take_outbox().is_empty());
        a.housekeeping(now + Duration::from_secs(5));
        assert_eq!(a.take_outbox(), vec![beacon]);
    }

    #[test]
    fn stage_advance_triggers_show() {
        let mut a = agent_with(make_document("ook", ME));
        assert!(a.take_show().is_none());
        let mut doc = make_paired_ready("ook", ME);
        doc.uuid = a.uuid();
        a.apply_document(doc);
        assert_eq!(a.take_show(), Some(LedShow::Advance));
        assert!(a.display().contains("now at challenge1"));
    }

    #[test]
    fn change_handle_validates_and_queues() {
        let mut a = agent_with(make_document("ook", ME));
        assert!(a.change_handle("bad handle").is_err());
        assert_eq!(a.pending_ops(), 0);
        a.change_handle("eek").unwrap();
        a.change_handle("aak").unwrap();
        assert_eq!(
            a.deferred_op("changehandle"),
            Some(&DeferredOp::ChangeHandle("aak".to_string()))
        );
    }

    #[test]
    fn checkin_timer() {
        let mut a = agent();
        let now = Instant::now();
        assert!(a.checkin_due(now));
        a.last_checkin = Some(now);
        assert!(!a.checkin_due(now + Duration::from_secs(30)));
        assert!(a.checkin_due(now + Duration::from_secs(60)));
    }
}
