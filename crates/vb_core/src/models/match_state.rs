use serde::{Deserialize, Serialize};

use super::history::{HistoryEntry, ScorePair};
use super::rules;
use super::settings::GameSettings;
use super::team::{Team, TeamSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

/// Percent progress toward the sets needed to win the match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameProgress {
    pub local: f32,
    pub visitor: f32,
    pub sets_to_win: u8,
}

/// Canonical state of one match. The store owns exactly one of these;
/// everything that crosses a sync boundary is a full-value copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub local: Team,
    pub visitor: Team,
    pub current_set: u8,
    pub history: Vec<HistoryEntry>,
    pub game_finished: bool,
    /// Unix-epoch milliseconds the match was created.
    pub start_time: u64,
    pub settings: GameSettings,
}

impl MatchState {
    pub fn new(start_time: u64, settings: GameSettings) -> Self {
        Self {
            local: Team::default_local(),
            visitor: Team::default_visitor(),
            current_set: 1,
            history: Vec::new(),
            game_finished: false,
            start_time,
            settings,
        }
    }

    pub fn team(&self, side: TeamSide) -> &Team {
        match side {
            TeamSide::Local => &self.local,
            TeamSide::Visitor => &self.visitor,
        }
    }

    pub fn team_mut(&mut self, side: TeamSide) -> &mut Team {
        match side {
            TeamSide::Local => &mut self.local,
            TeamSide::Visitor => &mut self.visitor,
        }
    }

    /// Both sides at once, mutably: (`side`, its opponent).
    pub fn teams_mut(&mut self, side: TeamSide) -> (&mut Team, &mut Team) {
        match side {
            TeamSide::Local => (&mut self.local, &mut self.visitor),
            TeamSide::Visitor => (&mut self.visitor, &mut self.local),
        }
    }

    pub fn serving_side(&self) -> TeamSide {
        if self.local.serving {
            TeamSide::Local
        } else {
            TeamSide::Visitor
        }
    }

    pub fn score_pair(&self) -> ScorePair {
        ScorePair { local: self.local.score, visitor: self.visitor.score }
    }

    pub fn status(&self) -> GameStatus {
        if self.game_finished {
            GameStatus::Finished
        } else if self.history.is_empty() {
            GameStatus::Waiting
        } else {
            GameStatus::Playing
        }
    }

    /// Winner by sets, only meaningful once the match is finished.
    pub fn winner(&self) -> Option<&Team> {
        if !self.game_finished {
            return None;
        }
        if self.local.sets > self.visitor.sets {
            Some(&self.local)
        } else {
            Some(&self.visitor)
        }
    }

    pub fn is_deciding_set(&self) -> bool {
        self.current_set == self.settings.max_sets
    }

    /// Points needed to win the current set.
    pub fn target_points(&self) -> u8 {
        self.settings.target_points(self.current_set)
    }

    pub fn progress(&self) -> GameProgress {
        let sets_to_win = self.settings.sets_to_win();
        let percent = |sets: u8| (f32::from(sets) / f32::from(sets_to_win) * 100.0).min(100.0);
        GameProgress {
            local: percent(self.local.sets),
            visitor: percent(self.visitor.sets),
            sets_to_win,
        }
    }

    /// Most recent entries, newest first.
    pub fn recent_history(&self, count: usize) -> &[HistoryEntry] {
        &self.history[..count.min(self.history.len())]
    }

    pub fn current_set_history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().filter(|entry| entry.set == self.current_set)
    }

    pub fn is_set_point(&self, side: TeamSide) -> bool {
        rules::is_set_point(
            self.team(side).score,
            self.team(side.opposite()).score,
            self.target_points(),
            self.settings.min_advantage,
        )
    }

    pub fn is_match_point(&self, side: TeamSide) -> bool {
        rules::is_match_point(
            self.team(side).sets,
            self.settings.max_sets,
            self.team(side).score,
            self.team(side.opposite()).score,
            self.target_points(),
            self.settings.min_advantage,
        )
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new(0, GameSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        let mut state = MatchState::default();
        assert_eq!(state.status(), GameStatus::Waiting);

        state.history.push(HistoryEntry {
            id: "a".into(),
            message: "Match started".into(),
            kind: crate::models::HistoryKind::Info,
            timestamp: 0,
            set: 1,
            score: None,
        });
        assert_eq!(state.status(), GameStatus::Playing);

        state.game_finished = true;
        assert_eq!(state.status(), GameStatus::Finished);
    }

    #[test]
    fn winner_requires_finish() {
        let mut state = MatchState::default();
        state.local.sets = 3;
        assert!(state.winner().is_none());

        state.game_finished = true;
        assert_eq!(state.winner().map(|t| t.side), Some(TeamSide::Local));
    }

    #[test]
    fn progress_caps_at_hundred() {
        let mut state = MatchState::default();
        state.local.sets = 3;
        state.visitor.sets = 1;
        let progress = state.progress();
        assert_eq!(progress.sets_to_win, 3);
        assert!((progress.local - 100.0).abs() < f32::EPSILON);
        assert!((progress.visitor - 33.333_332).abs() < 0.001);
    }

    #[test]
    fn match_point_detected_in_deciding_stretch() {
        let mut state = MatchState::default();
        state.local.sets = 2;
        state.local.score = 24;
        state.visitor.score = 20;
        assert!(state.is_set_point(TeamSide::Local));
        assert!(state.is_match_point(TeamSide::Local));
        assert!(!state.is_match_point(TeamSide::Visitor));
    }

    #[test]
    fn deciding_set_uses_short_target() {
        let mut state = MatchState::default();
        state.current_set = 5;
        assert!(state.is_deciding_set());
        assert_eq!(state.target_points(), 15);
    }
}
