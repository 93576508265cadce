use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Center,
    Right,
}

impl Button {
    fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Center => 2,
            Self::Right => 3,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Per-button debounce: a press within `window` of the last accepted press
/// of the same button is ignored.
#[derive(Debug)]
pub struct Debouncer {
    last_accepted: [Option<Instant>; 4],
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            last_accepted: [None; 4],
            window,
        }
    }

    pub fn accept(&mut self, button: Button, now: Instant) -> bool {
        let slot = &mut self.last_accepted[button.index()];
        if let Some(last) = *slot
            && now.saturating_duration_since(last) <= self.window
        {
            return false;
        }
        *slot = Some(now);
        true
    }
}
