//! Match data model: teams, settings, history, events, and scoring rules.

pub mod events;
pub mod history;
pub mod match_state;
pub mod rules;
pub mod settings;
pub mod team;

pub use events::{StoreEvent, StoreEventKind};
pub use history::{HistoryEntry, HistoryKind, ScorePair, MAX_HISTORY_ITEMS};
pub use match_state::{GameProgress, GameStatus, MatchState};
pub use settings::GameSettings;
pub use team::{
    Team, TeamSide, DEFAULT_LOCAL_COLOR, DEFAULT_LOCAL_LOGO, DEFAULT_LOCAL_NAME,
    DEFAULT_VISITOR_COLOR, DEFAULT_VISITOR_LOGO, DEFAULT_VISITOR_NAME, MAX_SCORE, ROTATION_SLOTS,
};
