use std::fmt;

use serde::{Deserialize, Serialize};

use super::team::TeamSide;

/// History keeps the most recent entries only; older ones fall off the tail.
pub const MAX_HISTORY_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Info,
    Success,
    Warning,
    Error,
    Local,
    Visitor,
    Winner,
}

impl From<TeamSide> for HistoryKind {
    fn from(side: TeamSide) -> Self {
        match side {
            TeamSide::Local => HistoryKind::Local,
            TeamSide::Visitor => HistoryKind::Visitor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePair {
    pub local: u8,
    pub visitor: u8,
}

impl fmt::Display for ScorePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.local, self.visitor)
    }
}

/// One line of the match log. Never mutated after creation; new entries are
/// prepended and the log is truncated at [`MAX_HISTORY_ITEMS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    /// Unix-epoch milliseconds.
    pub timestamp: u64,
    /// Set the entry belongs to.
    pub set: u8,
    /// Scores at the moment the entry was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScorePair>,
}
