//! Transport envelope: a full match-state copy stamped with the producer's
//! wall clock and a schema tag, plus the structural gate every inbound
//! candidate passes before it may touch local state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{SyncError, ValidationError};
use crate::models::MatchState;
use crate::timing::Clock;

/// Schema tag carried on every envelope.
pub const STORAGE_VERSION: &str = "1.0.0";

/// Snapshots older than this are flagged stale. Advisory only: a paused
/// broadcast session is a legitimate state, so stale snapshots still apply.
pub const STALE_AFTER_MS: u64 = 3_600_000;

fn default_version() -> String {
    STORAGE_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    #[serde(flatten)]
    pub state: MatchState,

    /// Producer wall clock, unix-epoch milliseconds.
    pub timestamp: u64,

    #[serde(default = "default_version")]
    pub version: String,
}

impl SyncEnvelope {
    /// Deep-copy the state and stamp it for transport.
    pub fn capture(state: &MatchState, clock: &dyn Clock) -> Self {
        Self { state: state.clone(), timestamp: clock.now_ms(), version: default_version() }
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse untrusted text. The structural gate runs on the raw JSON value
    /// before typed deserialization so a malformed payload is rejected with
    /// a precise reason instead of a serde chain.
    pub fn decode(raw: &str) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| ValidationError::Malformed(err.to_string()))?;
        validate_value(&value)?;
        serde_json::from_value(value).map_err(|err| ValidationError::Malformed(err.to_string()))
    }

    /// Invariant check for already-typed envelopes arriving over in-process
    /// paths.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.state.current_set < 1 {
            return Err(ValidationError::InvalidCurrentSet);
        }
        Ok(())
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    pub fn is_stale(&self, now_ms: u64) -> bool {
        self.age_ms(now_ms) > STALE_AFTER_MS
    }
}

/// Structural gate: object shape, both teams, a sane current_set, a
/// history sequence, and a numeric timestamp.
pub fn validate_value(value: &Value) -> Result<(), ValidationError> {
    let Some(object) = value.as_object() else {
        return Err(ValidationError::NotAnObject);
    };

    let teams_present = object.get("local").is_some_and(Value::is_object)
        && object.get("visitor").is_some_and(Value::is_object);
    if !teams_present {
        return Err(ValidationError::MissingTeams);
    }

    match object.get("current_set").and_then(Value::as_u64) {
        Some(set) if set >= 1 => {}
        _ => return Err(ValidationError::InvalidCurrentSet),
    }

    if !object.get("history").is_some_and(Value::is_array) {
        return Err(ValidationError::InvalidHistory);
    }

    if !object.get("timestamp").is_some_and(Value::is_number) {
        return Err(ValidationError::MissingTimestamp);
    }

    Ok(())
}
