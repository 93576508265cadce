use std::time::Duration;

use tokio::task::JoinHandle;

/// Canned LED animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedShow {
    /// Someone nearby answered a DISCOVER.
    Ping,
    Paired,
    /// The badge moved to a new challenge.
    Advance,
    Winner,
}

impl LedShow {
    /// Frames as (pattern, hold time).
    fn frames(self) -> &'static [(&'static str, u64)] {
        match self {
            Self::Ping => &[("blink", 150), ("off", 150)],
            Self::Paired => &[("green", 300), ("off", 100), ("green", 300)],
            Self::Advance => &[("sweep", 200), ("sweep", 200), ("sweep", 200), ("solid", 500)],
            Self::Winner => &[("rainbow", 400), ("rainbow", 400), ("rainbow", 400), ("sparkle", 800)],
        }
    }
}

/// Runs at most one LED show at a time. Starting a show aborts the one in
/// flight and returns immediately.
#[derive(Debug, Default)]
pub struct ShowScheduler {
    current: Option<JoinHandle<()>>,
}

impl ShowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, show: LedShow) {
        if let Some(previous) = self.current.take() {
            previous.abort();
        }
        self.current = Some(tokio::spawn(async move {
            for (pattern, hold_ms) in show.frames() {
                tracing::trace!(?show, pattern, "led frame");
                tokio::time::sleep(Duration::from_millis(*hold_ms)).await;
            }
        }));
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

impl Drop for ShowScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starting_a_show_aborts_the_running_one() {
        let mut leds = ShowScheduler::new();
        assert!(!leds.is_running());

        leds.start(LedShow::Winner);
        let first = leds.current.as_ref().unwrap().abort_handle();
        assert!(leds.is_running());

        leds.start(LedShow::Ping);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(first.is_finished());
        assert!(leds.is_running());

        leds.stop();
        assert!(!leds.is_running());
    }

    #[tokio::test]
    async fn show_finishes_on_its_own() {
        let mut leds = ShowScheduler::new();
        leds.start(LedShow::Ping);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!leds.is_running());
    }
}
