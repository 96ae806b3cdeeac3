//! # vb_core - Volleyball Live Scoreboard Core
//!
//! This library provides the shared core of a volleyball live-scoreboard
//! system: an authoritative match store, a validated snapshot format, and
//! best-effort replication between a controller context and any number of
//! read-only overlay contexts.
//!
//! ## Features
//! - Synchronous command-based scoring with full rule handling
//! - Snapshot envelope with a structural validation gate
//! - Three-path replication (durable slot, local bus, broadcast topic)
//! - Deterministic timers for debounce, auto-advance, and resync

// Large enum variants - boxing would require API changes
#![allow(clippy::large_enum_variant)]

pub mod adapters;
pub mod error;
pub mod models;
pub mod settings;
pub mod store;
pub mod sync;
pub mod timing;

// Re-export the adapter surface
pub use adapters::{Controller, Overlay, AUTO_ADVANCE_DELAY_MS, RESYNC_INTERVAL_MS};

// Re-export the data model
pub use models::{
    GameProgress, GameSettings, GameStatus, HistoryEntry, HistoryKind, MatchState, ScorePair,
    StoreEvent, StoreEventKind, Team, TeamSide,
};

// Re-export the store and errors
pub use error::{InputError, Result};
pub use store::ScoreboardStore;

// Re-export the sync layer
pub use sync::{
    BroadcastHub, ConnectionStats, ConnectionStatus, FileSlotStore, MemorySlotStore, SlotStore,
    SyncChannel, SyncEnvelope, SyncError, ValidationError,
};

// Re-export settings and timing
pub use settings::{AppSettings, SettingsStore};
pub use timing::{Clock, ManualClock, SystemClock, TaskHandle, Timers};

/// Library version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
