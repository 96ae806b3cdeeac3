//! Operator-facing adapter. Owns the store, republishes after every
//! mutation, and runs the one timer the scoring flow needs: the pause
//! between a set win and the automatic advance to the next set.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::models::{GameSettings, GameStatus, MatchState, StoreEvent, StoreEventKind, TeamSide};
use crate::settings::AppSettings;
use crate::store::ScoreboardStore;
use crate::sync::{ConnectionStats, SyncChannel};
use crate::timing::{TaskHandle, Timers};

/// Pause between a set win and the automatic advance, long enough for the
/// overlay to show the set result.
pub const AUTO_ADVANCE_DELAY_MS: u64 = 2_000;

pub struct Controller {
    store: Arc<Mutex<ScoreboardStore>>,
    channel: SyncChannel,
    timers: Timers,
    auto_advance: Arc<Mutex<Option<TaskHandle>>>,
    connectivity: TaskHandle,
}

impl Controller {
    pub fn new(channel: SyncChannel, timers: Timers) -> Self {
        Self::with_store(channel, timers.clone(), ScoreboardStore::new(timers.clock()))
    }

    /// Start a match seeded from operator preferences.
    pub fn with_settings(channel: SyncChannel, timers: Timers, settings: &AppSettings) -> Self {
        let mut store = ScoreboardStore::new(timers.clock());
        store.restore(settings.seed_state(timers.clock().now_ms()));
        Self::with_store(channel, timers, store)
    }

    fn with_store(channel: SyncChannel, timers: Timers, mut store: ScoreboardStore) -> Self {
        // Drop a leftover snapshot from an abandoned session before taking
        // over as producer.
        channel.cleanup();
        store.initialize();

        let connectivity = channel.connectivity_task();
        let controller = Self {
            store: Arc::new(Mutex::new(store)),
            channel,
            timers,
            auto_advance: Arc::new(Mutex::new(None)),
            connectivity,
        };
        controller.after_mutation();
        controller
    }

    pub fn state(&self) -> MatchState {
        self.store.lock().expect("store lock poisoned").snapshot()
    }

    pub fn status(&self) -> GameStatus {
        self.store.lock().expect("store lock poisoned").status()
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.channel.connection_stats()
    }

    pub fn score_point(&self, side: TeamSide) {
        self.store.lock().expect("store lock poisoned").score_point(side);
        self.after_mutation();
    }

    pub fn remove_point(&self, side: TeamSide) {
        self.store.lock().expect("store lock poisoned").remove_point(side);
        self.after_mutation();
    }

    pub fn rotate_team(&self, side: TeamSide) {
        self.store.lock().expect("store lock poisoned").rotate_team(side);
        self.after_mutation();
    }

    /// Explicit advance; any pending automatic advance is dropped so the
    /// set counter moves exactly once.
    pub fn next_set(&self) {
        self.cancel_auto_advance();
        self.store.lock().expect("store lock poisoned").next_set();
        self.after_mutation();
    }

    pub fn reset_game(&self) {
        self.cancel_auto_advance();
        self.store.lock().expect("store lock poisoned").reset_game();
        self.after_mutation();
    }

    pub fn update_team_name(&self, side: TeamSide, name: &str) -> Result<()> {
        self.store.lock().expect("store lock poisoned").update_team_name(side, name)?;
        self.after_mutation();
        Ok(())
    }

    pub fn update_team_logo(&self, side: TeamSide, logo: &str) {
        self.store.lock().expect("store lock poisoned").update_team_logo(side, logo);
        self.after_mutation();
    }

    pub fn update_team_color(&self, side: TeamSide, color: &str) {
        self.store.lock().expect("store lock poisoned").update_team_color(side, color);
        self.after_mutation();
    }

    pub fn toggle_serve(&self) {
        self.store.lock().expect("store lock poisoned").toggle_serve();
        self.after_mutation();
    }

    pub fn update_settings(&self, settings: GameSettings) -> Result<()> {
        self.store.lock().expect("store lock poisoned").update_settings(settings)?;
        self.after_mutation();
        Ok(())
    }

    /// Cancel every timer this adapter owns. The final published snapshot
    /// stays in the durable slot for late readers.
    pub fn shutdown(&self) {
        self.cancel_auto_advance();
        self.connectivity.cancel();
    }

    /// Publish the new snapshot and react to what the mutation produced:
    /// a finished set arms the auto-advance, a finished match or explicit
    /// transition disarms it.
    fn after_mutation(&self) {
        let (snapshot, events) = {
            let mut store = self.store.lock().expect("store lock poisoned");
            (store.snapshot(), store.drain_events())
        };

        let finished = events
            .iter()
            .any(|event| matches!(event.kind, StoreEventKind::GameFinished { .. }));

        for event in &events {
            self.react(event, finished);
        }

        if let Err(err) = self.channel.publish(&snapshot) {
            log::warn!("failed to publish snapshot: {}", err);
        }
    }

    fn react(&self, event: &StoreEvent, match_finished: bool) {
        match event.kind {
            StoreEventKind::SetFinished { .. } if !match_finished => self.schedule_auto_advance(),
            StoreEventKind::GameFinished { .. }
            | StoreEventKind::NextSet { .. }
            | StoreEventKind::ResetGame => self.cancel_auto_advance(),
            _ => {}
        }
    }

    fn schedule_auto_advance(&self) {
        let mut slot = self.auto_advance.lock().expect("auto-advance lock poisoned");
        if let Some(handle) = slot.take() {
            handle.cancel();
        }

        let store = self.store.clone();
        let channel = self.channel.clone();
        let task_slot = self.auto_advance.clone();
        *slot = Some(self.timers.schedule_once(AUTO_ADVANCE_DELAY_MS, move || {
            task_slot.lock().expect("auto-advance lock poisoned").take();
            let snapshot = {
                let mut store = store.lock().expect("store lock poisoned");
                store.next_set();
                store.drain_events();
                store.snapshot()
            };
            if let Err(err) = channel.publish(&snapshot) {
                log::warn!("failed to publish snapshot after auto-advance: {}", err);
            }
        }));
    }

    fn cancel_auto_advance(&self) {
        if let Some(handle) =
            self.auto_advance.lock().expect("auto-advance lock poisoned").take()
        {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{BroadcastHub, MemorySlotStore};
    use crate::timing::{Clock, ManualClock};

    struct Fixture {
        clock: Arc<ManualClock>,
        timers: Timers,
        slot: MemorySlotStore,
        hub: BroadcastHub,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(1_000_000));
            let timers = Timers::new(clock.clone());
            Self { clock, timers, slot: MemorySlotStore::new(), hub: BroadcastHub::new() }
        }

        fn channel(&self) -> SyncChannel {
            SyncChannel::new(Arc::new(self.slot.clone()), &self.hub, self.timers.clone())
        }

        fn controller(&self) -> Controller {
            Controller::new(self.channel(), self.timers.clone())
        }

        fn tick(&self, ms: u64) {
            self.clock.advance(ms);
            self.timers.run_due();
        }

        fn win_set(&self, controller: &Controller) {
            for _ in 0..25 {
                controller.score_point(TeamSide::Local);
            }
        }
    }

    #[test]
    fn every_mutation_is_published() {
        let fx = Fixture::new();
        let controller = fx.controller();
        let reader = fx.channel();

        controller.score_point(TeamSide::Visitor);
        let snapshot = reader.current_snapshot().unwrap();
        assert_eq!(snapshot.state.visitor.score, 1);

        controller.toggle_serve();
        let snapshot = reader.current_snapshot().unwrap();
        assert!(snapshot.state.local.serving);
    }

    #[test]
    fn set_win_auto_advances_after_pause() {
        let fx = Fixture::new();
        let controller = fx.controller();

        fx.win_set(&controller);
        assert_eq!(controller.state().current_set, 1, "pause holds the set number");

        fx.tick(AUTO_ADVANCE_DELAY_MS - 1);
        assert_eq!(controller.state().current_set, 1);

        fx.tick(1);
        assert_eq!(controller.state().current_set, 2);

        // The advanced state was also published.
        let snapshot = fx.channel().current_snapshot().unwrap();
        assert_eq!(snapshot.state.current_set, 2);
    }

    #[test]
    fn explicit_advance_disarms_auto_advance() {
        let fx = Fixture::new();
        let controller = fx.controller();

        fx.win_set(&controller);
        controller.next_set();
        assert_eq!(controller.state().current_set, 2);

        fx.tick(AUTO_ADVANCE_DELAY_MS);
        assert_eq!(controller.state().current_set, 2, "timer must not fire twice");
    }

    #[test]
    fn match_win_never_schedules_advance() {
        let fx = Fixture::new();
        let controller = fx.controller();

        for _ in 0..3 {
            fx.win_set(&controller);
            if !controller.state().game_finished {
                controller.next_set();
            }
        }
        assert!(controller.state().game_finished);
        let final_set = controller.state().current_set;

        fx.tick(AUTO_ADVANCE_DELAY_MS);
        assert_eq!(controller.state().current_set, final_set);
        assert_eq!(controller.status(), GameStatus::Finished);
    }

    #[test]
    fn reset_disarms_auto_advance() {
        let fx = Fixture::new();
        let controller = fx.controller();

        fx.win_set(&controller);
        controller.reset_game();

        fx.tick(AUTO_ADVANCE_DELAY_MS);
        assert_eq!(controller.state().current_set, 1);
        assert_eq!(controller.state().local.sets, 0);
    }

    #[test]
    fn rejected_input_is_not_published() {
        let fx = Fixture::new();
        let controller = fx.controller();
        let before = fx.channel().current_snapshot().unwrap();

        assert!(controller.update_team_name(TeamSide::Local, "   ").is_err());
        let after = fx.channel().current_snapshot().unwrap();
        assert_eq!(after.state, before.state);
    }

    #[test]
    fn seeded_controller_uses_preferences() {
        let fx = Fixture::new();
        let mut settings = AppSettings::default();
        settings.team_names.local = "Eagles".to_string();
        settings.game.max_sets = 3;

        let controller =
            Controller::with_settings(fx.channel(), fx.timers.clone(), &settings);
        assert_eq!(controller.state().local.name, "Eagles");
        assert_eq!(controller.state().settings.max_sets, 3);
    }

    #[test]
    fn startup_discards_stale_leftover_snapshot() {
        let fx = Fixture::new();
        let earlier = fx.channel();
        earlier.publish(&MatchState::new(fx.clock.now_ms(), GameSettings::default())).unwrap();

        fx.clock.advance(2 * 3_600_000);
        let _controller = fx.controller();

        // The stale leftover was replaced by the fresh initial publish.
        let snapshot = fx.channel().current_snapshot().unwrap();
        assert_eq!(snapshot.timestamp, fx.clock.now_ms());
    }

    #[test]
    fn shutdown_releases_all_timers() {
        let fx = Fixture::new();
        let controller = fx.controller();

        fx.win_set(&controller);
        controller.shutdown();
        assert_eq!(fx.timers.pending(), 0);
    }
}
