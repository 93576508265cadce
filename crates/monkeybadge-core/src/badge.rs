use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short infrared alias for a badge, used in place of its UUID over IR.
pub type IrId = u16;

/// Maximum length of a badge handle.
pub const MAX_HANDLE_LEN: usize = 20;

/// Number of distinct friends needed to finish challenge 1.
pub const FRIENDS_REQUIRED: usize = 5;

/// Number of hidden objects in challenge 2.
pub const HIDDEN_OBJECT_COUNT: usize = 5;

/// Stage of game progression. Ordering follows the game: a badge only ever
/// moves to a greater stage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Challenge {
    #[default]
    Intro,
    Challenge1,
    Challenge2,
    Challenge3,
    Winner,
}

impl Challenge {
    /// The stage that follows this one. `Winner` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Intro => Self::Challenge1,
            Self::Challenge1 => Self::Challenge2,
            Self::Challenge2 => Self::Challenge3,
            Self::Challenge3 | Self::Winner => Self::Winner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Challenge1 => "challenge1",
            Self::Challenge2 => "challenge2",
            Self::Challenge3 => "challenge3",
            Self::Winner => "winner",
        }
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroState {
    pub enabled: bool,
    pub complete: bool,
}

/// The other side of a pairing, as recorded in `challenge1.matches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub handle: String,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendChallenge {
    pub complete: bool,
    pub matches: BTreeMap<IrId, MatchEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenObjectChallenge {
    pub complete: bool,
    pub status: [bool; HIDDEN_OBJECT_COUNT],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconChallenge {
    pub complete: bool,
    pub interact_cans: bool,
    pub interact_mic: bool,
    pub interact_shades: bool,
}

impl BeaconChallenge {
    pub fn flag(&self, beacon: Beacon) -> bool {
        match beacon {
            Beacon::Cans => self.interact_cans,
            Beacon::Mic => self.interact_mic,
            Beacon::Shades => self.interact_shades,
        }
    }

    pub fn set_flag(&mut self, beacon: Beacon) {
        match beacon {
            Beacon::Cans => self.interact_cans = true,
            Beacon::Mic => self.interact_mic = true,
            Beacon::Shades => self.interact_shades = true,
        }
    }

    pub fn all_set(&self) -> bool {
        Beacon::ALL.iter().all(|b| self.flag(*b))
    }
}

/// The three roaming monkey beacons of challenge 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Beacon {
    Cans,
    Mic,
    Shades,
}

impl Beacon {
    pub const ALL: [Beacon; 3] = [Beacon::Cans, Beacon::Mic, Beacon::Shades];
}

/// Authoritative per-badge game state. Every field is always present on the
/// wire; `IR_ID`, `monkey_id` and `last_seen` serialize as `null` when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDocument {
    pub uuid: Uuid,
    #[serde(rename = "badgeHandle")]
    pub handle: String,
    pub token: String,
    #[serde(rename = "IR_ID")]
    pub ir_id: Option<IrId>,
    pub current_challenge: Challenge,
    pub intro: IntroState,
    pub challenge1: FriendChallenge,
    pub challenge2: HiddenObjectChallenge,
    pub challenge3: BeaconChallenge,
    pub monkey_id: Option<IrId>,
    pub last_seen: Option<String>,
}

impl BadgeDocument {
    /// A freshly registered badge, sitting at the intro.
    pub fn new(uuid: Uuid, handle: String, token: String) -> Self {
        Self {
            uuid,
            handle,
            token,
            ir_id: None,
            current_challenge: Challenge::Intro,
            intro: IntroState::default(),
            challenge1: FriendChallenge::default(),
            challenge2: HiddenObjectChallenge::default(),
            challenge3: BeaconChallenge::default(),
            monkey_id: None,
            last_seen: None,
        }
    }

    pub fn is_friend(&self, ir_id: IrId) -> bool {
        self.challenge1.matches.contains_key(&ir_id)
    }

    /// Advance through every stage whose completion criteria are already met.
    /// Returns true if `current_challenge` moved.
    pub fn settle(&mut self, friends_required: usize) -> bool {
        let start = self.current_challenge;
        loop {
            let stage_done = match self.current_challenge {
                Challenge::Intro => self.intro.complete,
                Challenge::Challenge1 => self.challenge1.matches.len() >= friends_required,
                Challenge::Challenge2 => self.challenge2.status.iter().all(|s| *s),
                Challenge::Challenge3 => self.challenge3.all_set(),
                Challenge::Winner => false,
            };
            if !stage_done {
                break;
            }
            match self.current_challenge {
                Challenge::Intro => self.intro.complete = true,
                Challenge::Challenge1 => self.challenge1.complete = true,
                Challenge::Challenge2 => self.challenge2.complete = true,
                Challenge::Challenge3 => self.challenge3.complete = true,
                Challenge::Winner => {},
            }
            self.current_challenge = self.current_challenge.next();
        }
        self.current_challenge != start
    }
}

/// Reasons a handle is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    Empty,
    TooLong(usize),
    InvalidChar(char),
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "handle is empty"),
            Self::TooLong(len) => {
                write!(f, "handle is {len} chars (max {MAX_HANDLE_LEN})")
            },
            Self::InvalidChar(c) => write!(f, "handle contains invalid character {c:?}"),
        }
    }
}

impl std::error::Error for HandleError {}

/// Check a handle against the allowed charset `[A-Za-z0-9_-]` and length.
pub fn validate_handle(handle: &str) -> Result<(), HandleError> {
    if handle.is_empty() {
        return Err(HandleError::Empty);
    }
    let len = handle.chars().count();
    if len > MAX_HANDLE_LEN {
        return Err(HandleError::TooLong(len));
    }
    if let Some(c) = handle
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(HandleError::InvalidChar(c));
    }
    Ok(())
}
