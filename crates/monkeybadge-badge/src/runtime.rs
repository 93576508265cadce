use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use monkeybadge_core::ir::IR_TX_DELAY;

use crate::agent::Agent;
use crate::button::Button;
use crate::cache::LocalCache;
use crate::display::Display;
use crate::leds::ShowScheduler;
use crate::sync::SyncClient;
use crate::transceiver::{IrEvent, IrTransceiver};

/// Local input other than IR: button presses plus the hooks the on-badge
/// games and menus call into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Button(Button),
    CompleteIntro,
    ChangeHandle(String),
    Emote(u8),
    Reset,
}

impl Input {
    /// Parse one console command (`up`, `intro`, `handle <name>`, `emote <n>`,
    /// `reset`).
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?;
        if let Some(button) = Button::parse(command) {
            return Some(Self::Button(button));
        }
        match command {
            "intro" => Some(Self::CompleteIntro),
            "handle" => words.next().map(|h| Self::ChangeHandle(h.to_string())),
            "emote" => words.next()?.parse().ok().map(Self::Emote),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// The badge control loop: a single task that owns the agent and serializes
/// IR events, local input and the periodic tick.
pub struct BadgeRuntime<T: IrTransceiver, D: Display, C: LocalCache> {
    agent: Agent<D, C>,
    transceiver: T,
    client: SyncClient,
    leds: ShowScheduler,
    tick_period: Duration,
    tx_delay: Duration,
}

impl<T: IrTransceiver, D: Display, C: LocalCache> BadgeRuntime<T, D, C> {
    pub fn new(
        agent: Agent<D, C>,
        transceiver: T,
        client: SyncClient,
        tick_period: Duration,
    ) -> Self {
        Self {
            agent,
            transceiver,
            client,
            leds: ShowScheduler::new(),
            tick_period,
            tx_delay: IR_TX_DELAY,
        }
    }

    /// Override the per-byte transmit pacing.
    pub fn with_tx_delay(mut self, tx_delay: Duration) -> Self {
        self.tx_delay = tx_delay;
        self
    }

    pub fn agent(&self) -> &Agent<D, C> {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent<D, C> {
        &mut self.agent
    }

    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    pub async fn handle_input(&mut self, input: Input, now: Instant) {
        match input {
            Input::Button(button) => {
                self.agent.on_button(button, now);
            },
            Input::CompleteIntro => self.agent.complete_intro(),
            Input::ChangeHandle(handle) => {
                if let Err(e) = self.agent.change_handle(&handle) {
                    tracing::warn!(handle = %handle, "Rejected handle: {e}");
                }
            },
            Input::Emote(code) => self.agent.send_emote(code),
            Input::Reset => {
                if let Err(e) = self.agent.reset(&self.client).await {
                    tracing::warn!(error = %e, "Badge reset failed");
                }
            },
        }
    }

    /// One pass of the periodic duties: timers, server sync, IR transmit and
    /// LEDs.
    pub async fn tick(&mut self, now: Instant) {
        self.agent.housekeeping(now);
        self.agent.sync(&self.client, now).await;
        self.flush_outbox().await;
        if let Some(show) = self.agent.take_show() {
            self.leds.start(show);
        }
    }

    /// Transmit every queued frame, one paced byte at a time.
    pub async fn flush_outbox(&mut self) {
        let frames = self.agent.take_outbox();
        let Some(address) = self.agent.own_address() else {
            return;
        };
        for frame in frames {
            for byte in frame {
                if let Err(e) = self.transceiver.transmit(address, byte) {
                    tracing::warn!(error = %e, "IR transmit failed");
                }
                if !self.tx_delay.is_zero() {
                    tokio::time::sleep(self.tx_delay).await;
                }
            }
        }
    }

    /// Run until `shutdown` resolves.
    pub async fn run(
        mut self,
        mut ir_rx: mpsc::Receiver<IrEvent>,
        mut input_rx: mpsc::Receiver<Input>,
        shutdown: impl Future<Output = ()>,
    ) -> Self {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(event) = ir_rx.recv() => {
                    self.agent.on_ir_byte(event.sender, event.byte, event.at);
                },
                Some(input) = input_rx.recv() => {
                    self.handle_input(input, Instant::now()).await;
                },
                _ = ticker.tick() => {
                    self.tick(Instant::now()).await;
                },
                () = &mut shutdown => {
                    tracing::info!("Badge loop stopping");
                    break;
                },
            }
        }
        self.leds.stop();
        self
    }
}
