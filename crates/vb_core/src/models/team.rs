use std::fmt;

use serde::{Deserialize, Serialize};

/// Scores are capped here; a volleyball set never gets close.
pub const MAX_SCORE: u8 = 99;

/// Court positions in a rotation.
pub const ROTATION_SLOTS: usize = 6;

pub const DEFAULT_LOCAL_NAME: &str = "LOCAL TEAM";
pub const DEFAULT_VISITOR_NAME: &str = "VISITOR TEAM";
pub const DEFAULT_LOCAL_LOGO: &str = "\u{1F535}";
pub const DEFAULT_VISITOR_LOGO: &str = "\u{1F534}";
pub const DEFAULT_LOCAL_COLOR: &str = "#2563eb";
pub const DEFAULT_VISITOR_COLOR: &str = "#dc2626";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Local,
    Visitor,
}

impl TeamSide {
    pub fn opposite(self) -> Self {
        match self {
            TeamSide::Local => TeamSide::Visitor,
            TeamSide::Visitor => TeamSide::Local,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamSide::Local => "local",
            TeamSide::Visitor => "visitor",
        }
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of the net.
///
/// Invariants kept by the store: `score <= MAX_SCORE`, `rotation` is a
/// permutation of 1..=6, and `current_player == rotation[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub side: TeamSide,
    pub name: String,
    pub logo: String,
    pub color: String,
    pub score: u8,
    pub sets: u8,
    pub serving: bool,
    pub current_player: u8,
    pub rotation: [u8; ROTATION_SLOTS],
}

impl Team {
    pub fn new(side: TeamSide, name: &str, logo: &str, color: &str, serving: bool) -> Self {
        Self {
            side,
            name: name.to_string(),
            logo: logo.to_string(),
            color: color.to_string(),
            score: 0,
            sets: 0,
            serving,
            current_player: 1,
            rotation: [1, 2, 3, 4, 5, 6],
        }
    }

    /// Default local side; serves first by convention.
    pub fn default_local() -> Self {
        Self::new(TeamSide::Local, DEFAULT_LOCAL_NAME, DEFAULT_LOCAL_LOGO, DEFAULT_LOCAL_COLOR, true)
    }

    pub fn default_visitor() -> Self {
        Self::new(
            TeamSide::Visitor,
            DEFAULT_VISITOR_NAME,
            DEFAULT_VISITOR_LOGO,
            DEFAULT_VISITOR_COLOR,
            false,
        )
    }

    /// Clockwise rotation: the head of the order moves to the tail and the
    /// new head becomes the serving player.
    pub fn rotate(&mut self) {
        self.rotation.rotate_left(1);
        self.current_player = self.rotation[0];
    }

    /// Fresh match, same identity (name, logo, color).
    pub fn reset_for_new_game(&mut self, serving: bool) {
        self.score = 0;
        self.sets = 0;
        self.serving = serving;
        self.current_player = 1;
        self.rotation = [1, 2, 3, 4, 5, 6];
    }
}
