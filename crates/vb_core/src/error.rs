use thiserror::Error;

/// Operator-input rejections. Raised at the command boundary before any
/// state mutation happens, so the store is never left half-updated.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("team name is empty after trimming")]
    EmptyTeamName,

    #[error("max_sets must be an odd number between 3 and 7, got {0}")]
    InvalidMaxSets(u8),

    #[error("points_to_win must be between 15 and 30, got {0}")]
    InvalidPointsToWin(u8),

    #[error("min_advantage must be between 1 and 5, got {0}")]
    InvalidMinAdvantage(u8),

    #[error("deciding_set_points must be between 10 and 25, got {0}")]
    InvalidDecidingSetPoints(u8),

    #[error("settings payload is malformed: {0}")]
    MalformedSettings(String),
}

pub type Result<T> = std::result::Result<T, InputError>;
