//! Snapshot replication between scoreboard contexts: the transport
//! envelope and its validation gate, the shared durable slot, the
//! in-process signal paths, and the channel that ties them together.

pub mod bus;
pub mod channel;
pub mod envelope;
pub mod error;
pub mod slot;

pub use bus::{BroadcastHub, BroadcastTopic, BusHandle, EventBus};
pub use channel::{
    ConnectionStats, ConnectionStatus, Subscription, SyncChannel, DEBOUNCE_DELAY_MS,
    DISCONNECT_AFTER_MS, POLLING_INTERVAL_MS, STARTUP_SYNC_DELAY_MS, SYNC_TOPIC,
};
pub use envelope::{SyncEnvelope, STALE_AFTER_MS, STORAGE_VERSION};
pub use error::{SlotError, SyncError, ValidationError};
pub use slot::{
    FileSlotStore, MemorySlotStore, SlotStore, WatchCallback, WatchHandle, KEY_PREFIX,
    SETTINGS_KEY, STATE_KEY,
};
