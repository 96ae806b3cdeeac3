//! Broadcast overlay adapter. Pure consumer: keeps its own copy of the
//! match state, applies every incoming snapshot as a whole-value replace,
//! and periodically re-pulls the durable slot so a missed delivery heals
//! itself.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::models::{GameSettings, GameStatus, HistoryEntry, MatchState, TeamSide};
use crate::sync::{ConnectionStats, Subscription, SyncChannel, SyncEnvelope};
use crate::timing::{TaskHandle, Timers};

/// Interval of the self-healing re-pull from the durable slot.
pub const RESYNC_INTERVAL_MS: u64 = 5_000;

/// What the serve indicator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServeInfo {
    pub side: TeamSide,
    pub team_name: String,
    pub player: u8,
}

/// What the score strip needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentSetInfo {
    pub set: u8,
    pub local_score: u8,
    pub visitor_score: u8,
    pub target_points: u8,
    pub is_deciding: bool,
    pub set_point: Option<TeamSide>,
    pub match_point: Option<TeamSide>,
}

pub struct Overlay {
    state: Arc<Mutex<MatchState>>,
    last_applied: Arc<Mutex<Option<u64>>>,
    channel: SyncChannel,
    subscription: Mutex<Option<Subscription>>,
    resync: TaskHandle,
    connectivity: TaskHandle,
}

impl Overlay {
    pub fn new(channel: SyncChannel, timers: Timers) -> Self {
        let initial = channel
            .current_snapshot()
            .map(|envelope| envelope.state)
            .unwrap_or_else(|| MatchState::new(timers.clock().now_ms(), GameSettings::default()));
        let state = Arc::new(Mutex::new(initial));
        let last_applied = Arc::new(Mutex::new(None));

        let subscription = {
            let state = state.clone();
            let last_applied = last_applied.clone();
            channel.subscribe(move |envelope| {
                apply(&state, &last_applied, envelope);
            })
        };

        let resync = {
            let state = state.clone();
            let last_applied = last_applied.clone();
            let channel = channel.clone();
            timers.schedule_repeating(RESYNC_INTERVAL_MS, move || {
                let Some(envelope) = channel.current_snapshot() else {
                    return;
                };
                let already_applied =
                    *last_applied.lock().expect("overlay lock poisoned") == Some(envelope.timestamp);
                if !already_applied {
                    log::info!("resyncing from storage, missed a delivery");
                    channel.mark_reconnecting();
                    apply(&state, &last_applied, envelope);
                }
            })
        };

        let connectivity = channel.connectivity_task();

        Self {
            state,
            last_applied,
            channel,
            subscription: Mutex::new(Some(subscription)),
            resync,
            connectivity,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state.lock().expect("overlay lock poisoned").clone()
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.channel.connection_stats()
    }

    pub fn status(&self) -> GameStatus {
        self.state.lock().expect("overlay lock poisoned").status()
    }

    pub fn serve_info(&self) -> ServeInfo {
        let state = self.state.lock().expect("overlay lock poisoned");
        let side = state.serving_side();
        let team = state.team(side);
        ServeInfo { side, team_name: team.name.clone(), player: team.current_player }
    }

    pub fn current_set_info(&self) -> CurrentSetInfo {
        let state = self.state.lock().expect("overlay lock poisoned");
        let sides = [TeamSide::Local, TeamSide::Visitor];
        CurrentSetInfo {
            set: state.current_set,
            local_score: state.local.score,
            visitor_score: state.visitor.score,
            target_points: state.target_points(),
            is_deciding: state.is_deciding_set(),
            set_point: sides.into_iter().find(|&side| state.is_set_point(side)),
            match_point: sides.into_iter().find(|&side| state.is_match_point(side)),
        }
    }

    /// Most recent history entries, newest first, for the ticker.
    pub fn recent_history(&self, count: usize) -> Vec<HistoryEntry> {
        self.state
            .lock()
            .expect("overlay lock poisoned")
            .recent_history(count)
            .to_vec()
    }

    pub fn progress(&self) -> crate::models::GameProgress {
        self.state.lock().expect("overlay lock poisoned").progress()
    }

    pub fn winner_name(&self) -> Option<String> {
        self.state
            .lock()
            .expect("overlay lock poisoned")
            .winner()
            .map(|team| team.name.clone())
    }

    /// Drop the subscription and every timer this adapter owns.
    pub fn shutdown(&self) {
        if let Some(subscription) =
            self.subscription.lock().expect("overlay lock poisoned").take()
        {
            subscription.unsubscribe();
        }
        self.resync.cancel();
        self.connectivity.cancel();
    }
}

fn apply(
    state: &Arc<Mutex<MatchState>>,
    last_applied: &Arc<Mutex<Option<u64>>>,
    envelope: SyncEnvelope,
) {
    *last_applied.lock().expect("overlay lock poisoned") = Some(envelope.timestamp);
    *state.lock().expect("overlay lock poisoned") = envelope.state;
}
