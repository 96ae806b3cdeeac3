use thiserror::Error;

/// Structural rejection of an inbound snapshot. A rejected candidate is
/// never applied to local state.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("snapshot is not a JSON object")]
    NotAnObject,

    #[error("snapshot is missing team data")]
    MissingTeams,

    #[error("snapshot has an invalid current_set")]
    InvalidCurrentSet,

    #[error("snapshot history is not a sequence")]
    InvalidHistory,

    #[error("snapshot is missing a numeric timestamp")]
    MissingTimestamp,

    #[error("snapshot failed to deserialize: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("storage quota exceeded writing {key} ({size} bytes)")]
    QuotaExceeded { key: String, size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] SlotError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
