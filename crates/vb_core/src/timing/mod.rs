//! Clock abstraction and cooperative timer scheduling.
//!
//! Every time-driven behavior in this crate (debounce, auto-advance,
//! connectivity polling, startup resync) runs through [`Timers`], driven by
//! whoever owns the event loop via [`Timers::run_due`]. Nothing spawns
//! threads; tests drive time with [`ManualClock`].

pub mod clock;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{TaskHandle, TaskId, Timers};
