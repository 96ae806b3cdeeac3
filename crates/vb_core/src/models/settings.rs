use serde::{Deserialize, Serialize};

use crate::error::InputError;

fn default_max_sets() -> u8 {
    5
}
fn default_points_to_win() -> u8 {
    25
}
fn default_min_advantage() -> u8 {
    2
}
fn default_deciding_set_points() -> u8 {
    15
}
fn default_true() -> bool {
    true
}

/// Match format configuration. Every field carries a serde default so a
/// partially stored settings blob merges with defaults instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    #[serde(default = "default_max_sets")]
    pub max_sets: u8,

    #[serde(default = "default_points_to_win")]
    pub points_to_win: u8,

    #[serde(default = "default_min_advantage")]
    pub min_advantage: u8,

    #[serde(default = "default_deciding_set_points")]
    pub deciding_set_points: u8,

    #[serde(default = "default_true")]
    pub enable_rotation: bool,

    #[serde(default)]
    pub enable_player_names: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_sets: default_max_sets(),
            points_to_win: default_points_to_win(),
            min_advantage: default_min_advantage(),
            deciding_set_points: default_deciding_set_points(),
            enable_rotation: true,
            enable_player_names: false,
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), InputError> {
        if !(3..=7).contains(&self.max_sets) || self.max_sets % 2 == 0 {
            return Err(InputError::InvalidMaxSets(self.max_sets));
        }
        if !(15..=30).contains(&self.points_to_win) {
            return Err(InputError::InvalidPointsToWin(self.points_to_win));
        }
        if !(1..=5).contains(&self.min_advantage) {
            return Err(InputError::InvalidMinAdvantage(self.min_advantage));
        }
        if !(10..=25).contains(&self.deciding_set_points) {
            return Err(InputError::InvalidDecidingSetPoints(self.deciding_set_points));
        }
        Ok(())
    }

    /// Sets needed to take the match (best of `max_sets`).
    pub fn sets_to_win(&self) -> u8 {
        (self.max_sets + 1) / 2
    }

    /// Points needed to win the given set; the last possible set plays to
    /// the shorter deciding-set target.
    pub fn target_points(&self, current_set: u8) -> u8 {
        if current_set == self.max_sets {
            self.deciding_set_points
        } else {
            self.points_to_win
        }
    }
}
