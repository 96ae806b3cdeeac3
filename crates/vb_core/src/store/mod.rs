//! Single source of truth for one match.
//!
//! Every command mutates synchronously to completion, appends a history
//! entry, and emits a [`StoreEvent`] for observers. The store owns no
//! timers; the auto-advance pause after a set win is scheduled by the
//! controller adapter off the `set_finished` event.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::InputError;
use crate::models::{
    rules, GameSettings, GameStatus, HistoryEntry, HistoryKind, MatchState, StoreEvent,
    StoreEventKind, Team, TeamSide, MAX_HISTORY_ITEMS,
};
use crate::timing::Clock;

pub struct ScoreboardStore {
    state: MatchState,
    events: Vec<StoreEvent>,
    clock: Arc<dyn Clock>,
}

impl ScoreboardStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(clock, GameSettings::default())
    }

    pub fn with_settings(clock: Arc<dyn Clock>, settings: GameSettings) -> Self {
        let state = MatchState::new(clock.now_ms(), settings);
        Self { state, events: Vec::new(), clock }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Full-value copy for publication. The sync layer never holds a
    /// reference into the store.
    pub fn snapshot(&self) -> MatchState {
        self.state.clone()
    }

    /// Whole-state replace from a validated snapshot. Applying the same
    /// snapshot twice is a no-op; no history entry or event is emitted.
    pub fn restore(&mut self, state: MatchState) {
        self.state = state;
    }

    /// Mutation records accumulated since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// Logs the opening entry. Call once when the operator takes control.
    pub fn initialize(&mut self) {
        self.push_history("Match started!".to_string(), HistoryKind::Info);
        self.emit(StoreEventKind::GameStart);
    }

    pub fn score_point(&mut self, side: TeamSide) {
        if self.state.game_finished {
            return;
        }
        let Some(new_score) = self.state.team(side).score.checked_add(1) else {
            return;
        };
        if !rules::validate_score(new_score) {
            return;
        }

        {
            let (team, opponent) = self.state.teams_mut(side);
            team.score = new_score;
            team.serving = true;
            opponent.serving = false;
        }

        let scoreline = self.state.score_pair();
        let name = self.state.team(side).name.clone();
        self.push_history(format!("Point for {} ({})", name, scoreline), HistoryKind::from(side));
        self.emit(StoreEventKind::ScorePoint { side, score: new_score });

        let target = self.state.target_points();
        let min_advantage = self.state.settings.min_advantage;
        let opponent_score = self.state.team(side.opposite()).score;
        if rules::check_set_win(new_score, opponent_score, target, min_advantage) {
            self.finish_set(side);
        }
    }

    fn finish_set(&mut self, side: TeamSide) {
        let set = self.state.current_set;
        self.state.team_mut(side).sets += 1;
        let sets = self.state.team(side).sets;
        let name = self.state.team(side).name.clone();

        self.push_history(format!("{} wins set {}!", name, set), HistoryKind::Success);
        self.emit(StoreEventKind::SetFinished { side, sets });

        if sets >= self.state.settings.sets_to_win() {
            self.state.game_finished = true;
            self.push_history(format!("{} WINS THE MATCH!", name), HistoryKind::Winner);
            self.emit(StoreEventKind::GameFinished { winner: side });
        }
        // Otherwise the controller adapter schedules next_set() after its
        // fixed pause, cancellable by an explicit advance.
    }

    /// Deliberately does not undo serve changes or set wins committed by the
    /// paired score_point; it only walks the score back.
    pub fn remove_point(&mut self, side: TeamSide) {
        if self.state.team(side).score == 0 {
            return;
        }
        let team = self.state.team_mut(side);
        team.score -= 1;
        let score = team.score;
        let name = team.name.clone();
        self.push_history(format!("Point removed from {}", name), HistoryKind::Warning);
        self.emit(StoreEventKind::RemovePoint { side, score });
    }

    pub fn rotate_team(&mut self, side: TeamSide) {
        let team = self.state.team_mut(side);
        team.rotate();
        let current_player = team.current_player;
        let name = team.name.clone();
        self.push_history(
            format!("{} rotates, #{} to serve", name, current_player),
            HistoryKind::from(side),
        );
        self.emit(StoreEventKind::RotateTeam { side, current_player });
    }

    /// Advance to the next set. No-op on the last allowed set or after the
    /// match finished, which also makes the auto-advance timer idempotent.
    pub fn next_set(&mut self) {
        if self.state.current_set >= self.state.settings.max_sets || self.state.game_finished {
            return;
        }
        self.state.current_set += 1;
        self.state.local.score = 0;
        self.state.visitor.score = 0;

        // Opening serve alternates: odd sets to the local side.
        let local_serves = self.state.current_set % 2 == 1;
        self.state.local.serving = local_serves;
        self.state.visitor.serving = !local_serves;

        let set = self.state.current_set;
        self.push_history(format!("Set {} begins", set), HistoryKind::Info);
        self.emit(StoreEventKind::NextSet { set });
    }

    /// Back to set 1 with scores, sets, and history cleared. Team identity
    /// (name, logo, color) and the match settings survive.
    pub fn reset_game(&mut self) {
        let mut local = self.state.local.clone();
        let mut visitor = self.state.visitor.clone();
        local.reset_for_new_game(true);
        visitor.reset_for_new_game(false);

        self.state = MatchState {
            local,
            visitor,
            current_set: 1,
            history: Vec::new(),
            game_finished: false,
            start_time: self.clock.now_ms(),
            settings: self.state.settings.clone(),
        };

        self.push_history("Match reset".to_string(), HistoryKind::Info);
        self.emit(StoreEventKind::ResetGame);
    }

    pub fn update_team_name(&mut self, side: TeamSide, name: &str) -> Result<(), InputError> {
        let sanitized = rules::sanitize_team_name(name);
        if sanitized.is_empty() {
            log::warn!("rejected empty name for {} team", side);
            return Err(InputError::EmptyTeamName);
        }
        self.state.team_mut(side).name = sanitized;
        self.push_history("Team names updated".to_string(), HistoryKind::Info);
        self.emit(StoreEventKind::UpdateTeamName { side });
        Ok(())
    }

    pub fn update_team_logo(&mut self, side: TeamSide, logo: &str) {
        self.state.team_mut(side).logo = logo.to_string();
        self.push_history("Team logo updated".to_string(), HistoryKind::Info);
        self.emit(StoreEventKind::UpdateTeamLogo { side });
    }

    pub fn update_team_color(&mut self, side: TeamSide, color: &str) {
        if !rules::validate_color(color) {
            log::warn!("non-hex color {:?} for {} team", color, side);
        }
        self.state.team_mut(side).color = color.to_string();
        self.emit(StoreEventKind::UpdateTeamColor { side });
    }

    /// Flips both serving flags in one mutation so exactly one side serves
    /// before and after.
    pub fn toggle_serve(&mut self) {
        self.state.local.serving = !self.state.local.serving;
        self.state.visitor.serving = !self.state.visitor.serving;

        let serving = self.state.serving_side();
        let name = self.state.team(serving).name.clone();
        self.push_history(format!("Serve change: {}", name), HistoryKind::Info);
        self.emit(StoreEventKind::ToggleServe { serving });
    }

    pub fn update_settings(&mut self, settings: GameSettings) -> Result<(), InputError> {
        settings.validate()?;
        self.state.settings = settings;
        self.push_history("Game settings updated".to_string(), HistoryKind::Info);
        self.emit(StoreEventKind::UpdateSettings);
        Ok(())
    }

    // Derived views, mirrored onto the store for convenience.

    pub fn status(&self) -> GameStatus {
        self.state.status()
    }

    pub fn winner(&self) -> Option<&Team> {
        self.state.winner()
    }

    pub fn serving_side(&self) -> TeamSide {
        self.state.serving_side()
    }

    pub fn progress(&self) -> crate::models::GameProgress {
        self.state.progress()
    }

    fn push_history(&mut self, message: String, kind: HistoryKind) {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            message,
            kind,
            timestamp: self.clock.now_ms(),
            set: self.state.current_set,
            score: Some(self.state.score_pair()),
        };
        self.state.history.insert(0, entry);
        self.state.history.truncate(MAX_HISTORY_ITEMS);
    }

    fn emit(&mut self, kind: StoreEventKind) {
        self.events.push(StoreEvent { timestamp: self.clock.now_ms(), kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualClock;

    fn store() -> ScoreboardStore {
        ScoreboardStore::new(Arc::new(ManualClock::new(1_000)))
    }

    fn score_times(store: &mut ScoreboardStore, side: TeamSide, times: u8) {
        for _ in 0..times {
            store.score_point(side);
        }
    }

    #[test]
    fn score_point_moves_serve_and_logs() {
        let mut store = store();
        store.score_point(TeamSide::Visitor);

        assert_eq!(store.state().visitor.score, 1);
        assert!(store.state().visitor.serving);
        assert!(!store.state().local.serving);

        let entry = &store.state().history[0];
        assert_eq!(entry.kind, HistoryKind::Visitor);
        assert_eq!(entry.score, Some(crate::models::ScorePair { local: 0, visitor: 1 }));

        let events = store.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            StoreEventKind::ScorePoint { side: TeamSide::Visitor, score: 1 }
        );
    }

    #[test]
    fn set_win_at_target_with_advantage() {
        // Local takes the 25th point with visitor at 20.
        let mut store = store();
        score_times(&mut store, TeamSide::Visitor, 20);
        score_times(&mut store, TeamSide::Local, 25);

        assert_eq!(store.state().local.sets, 1);
        assert!(!store.state().game_finished);
        assert!(store
            .state()
            .history
            .iter()
            .any(|e| e.kind == HistoryKind::Success && e.message.contains("wins set 1")));

        let events = store.drain_events();
        assert!(events
            .iter()
            .any(|e| e.kind == StoreEventKind::SetFinished { side: TeamSide::Local, sets: 1 }));
        assert!(!events
            .iter()
            .any(|e| matches!(e.kind, StoreEventKind::GameFinished { .. })));
    }

    #[test]
    fn no_set_win_without_advantage() {
        let mut store = store();
        score_times(&mut store, TeamSide::Visitor, 24);
        score_times(&mut store, TeamSide::Local, 25);

        assert_eq!(store.state().local.sets, 0);
        assert_eq!(store.state().local.score, 25);
    }

    #[test]
    fn match_win_marks_finished() {
        // Local reaches 3 sets before visitor reaches 2.
        let mut store = store();
        for _ in 0..3 {
            score_times(&mut store, TeamSide::Local, 25);
            store.next_set();
        }

        assert!(store.state().game_finished);
        assert_eq!(store.state().local.sets, 3);
        assert_eq!(store.winner().map(|t| t.side), Some(TeamSide::Local));
        assert!(store
            .state()
            .history
            .iter()
            .any(|e| e.kind == HistoryKind::Winner && e.message.contains("LOCAL TEAM")));

        let events = store.drain_events();
        assert!(events
            .iter()
            .any(|e| e.kind == StoreEventKind::GameFinished { winner: TeamSide::Local }));
    }

    #[test]
    fn scoring_after_finish_is_noop() {
        let mut store = store();
        for _ in 0..3 {
            score_times(&mut store, TeamSide::Local, 25);
            store.next_set();
        }
        store.drain_events();

        store.score_point(TeamSide::Visitor);
        assert_eq!(store.state().visitor.score, 0);
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn score_never_exceeds_cap() {
        let mut store = store();
        // Keep the set alive: never let either side reach the win condition.
        let settings =
            GameSettings { points_to_win: 30, min_advantage: 5, ..Default::default() };
        store.update_settings(settings).unwrap();

        for _ in 0..120 {
            store.score_point(TeamSide::Local);
            store.score_point(TeamSide::Visitor);
        }
        assert_eq!(store.state().local.score, crate::models::MAX_SCORE);
        assert_eq!(store.state().visitor.score, crate::models::MAX_SCORE);
        assert!(!store.state().game_finished);
    }

    #[test]
    fn remove_point_at_zero_is_noop() {
        let mut store = store();
        let before = store.snapshot();
        store.remove_point(TeamSide::Local);

        assert_eq!(store.snapshot(), before);
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn remove_point_keeps_serve_and_sets() {
        // The documented asymmetry: removing the winning point does not
        // give back the set or the serve.
        let mut store = store();
        score_times(&mut store, TeamSide::Visitor, 20);
        score_times(&mut store, TeamSide::Local, 25);
        assert_eq!(store.state().local.sets, 1);

        store.remove_point(TeamSide::Local);
        assert_eq!(store.state().local.score, 24);
        assert_eq!(store.state().local.sets, 1);
        assert!(store.state().local.serving);
        assert_eq!(store.state().history[0].kind, HistoryKind::Warning);
    }

    #[test]
    fn rotation_updates_current_player() {
        let mut store = store();
        store.rotate_team(TeamSide::Local);

        let team = &store.state().local;
        assert_eq!(team.current_player, 2);
        assert_eq!(team.rotation, [2, 3, 4, 5, 6, 1]);
        assert!(rules::validate_rotation(&team.rotation));
    }

    #[test]
    fn next_set_alternates_serve_by_parity() {
        let mut store = store();
        score_times(&mut store, TeamSide::Local, 3);

        store.next_set();
        let state = store.state();
        assert_eq!(state.current_set, 2);
        assert_eq!(state.local.score, 0);
        assert_eq!(state.visitor.score, 0);
        assert!(state.visitor.serving);

        store.next_set();
        assert_eq!(store.state().current_set, 3);
        assert!(store.state().local.serving);
    }

    #[test]
    fn next_set_stops_at_max() {
        let mut store = store();
        for _ in 0..10 {
            store.next_set();
        }
        assert_eq!(store.state().current_set, 5);
    }

    #[test]
    fn reset_preserves_identity_and_settings() {
        let mut store = store();
        store.update_team_name(TeamSide::Local, "Tigers").unwrap();
        store.update_team_color(TeamSide::Visitor, "#abcdef");
        store
            .update_settings(GameSettings { max_sets: 3, ..Default::default() })
            .unwrap();
        score_times(&mut store, TeamSide::Local, 25);

        store.reset_game();
        let state = store.state();
        assert_eq!(state.local.name, "Tigers");
        assert_eq!(state.visitor.color, "#abcdef");
        assert_eq!(state.settings.max_sets, 3);
        assert_eq!(state.current_set, 1);
        assert_eq!(state.local.sets, 0);
        assert!(!state.game_finished);
        // Only the reset entry remains.
        assert_eq!(state.history.len(), 1);
        assert!(state.history[0].message.contains("reset"));
    }

    #[test]
    fn empty_team_name_rejected_without_mutation() {
        let mut store = store();
        let before = store.snapshot();

        assert_eq!(store.update_team_name(TeamSide::Local, "   "), Err(InputError::EmptyTeamName));
        assert_eq!(store.snapshot(), before);
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn team_name_is_sanitized() {
        let mut store = store();
        store.update_team_name(TeamSide::Visitor, "  Big   Cats  ").unwrap();
        assert_eq!(store.state().visitor.name, "Big Cats");
    }

    #[test]
    fn toggle_serve_keeps_exactly_one_server() {
        let mut store = store();
        assert!(store.state().local.serving);

        store.toggle_serve();
        assert!(!store.state().local.serving);
        assert!(store.state().visitor.serving);
        assert_eq!(store.serving_side(), TeamSide::Visitor);
    }

    #[test]
    fn invalid_settings_rejected() {
        let mut store = store();
        let before = store.snapshot();
        let result =
            store.update_settings(GameSettings { max_sets: 4, ..Default::default() });
        assert_eq!(result, Err(InputError::InvalidMaxSets(4)));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn deciding_set_uses_short_target() {
        let mut store = store();
        for _ in 0..4 {
            store.next_set();
        }
        assert_eq!(store.state().current_set, 5);

        // 15-13 takes the deciding set under the default settings.
        score_times(&mut store, TeamSide::Visitor, 13);
        score_times(&mut store, TeamSide::Local, 15);
        assert_eq!(store.state().local.sets, 1);
    }

    #[test]
    fn history_caps_at_fifty() {
        let mut store = store();
        let settings =
            GameSettings { points_to_win: 30, min_advantage: 5, ..Default::default() };
        store.update_settings(settings).unwrap();

        for _ in 0..40 {
            store.score_point(TeamSide::Local);
            store.score_point(TeamSide::Visitor);
        }
        assert_eq!(store.state().history.len(), MAX_HISTORY_ITEMS);
        // Newest first.
        assert!(store.state().history[0].timestamp >= store.state().history[49].timestamp);
    }

    #[test]
    fn restore_is_idempotent() {
        let mut store = store();
        score_times(&mut store, TeamSide::Local, 5);
        let snapshot = store.snapshot();

        store.restore(snapshot.clone());
        let once = store.snapshot();
        store.restore(snapshot);
        let twice = store.snapshot();

        assert_eq!(once, twice);
        assert!(store.drain_events().len() <= 5); // only the score events from above
    }
}
