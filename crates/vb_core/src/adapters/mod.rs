//! Consumer adapters: the operator-facing controller (sole producer of
//! state) and the read-only broadcast overlay.

pub mod controller;
pub mod overlay;

pub use controller::{Controller, AUTO_ADVANCE_DELAY_MS};
pub use overlay::{CurrentSetInfo, Overlay, ServeInfo, RESYNC_INTERVAL_MS};
