use serde::{Deserialize, Serialize};

use super::team::TeamSide;

/// Discrete mutation record emitted by the store for observers. The
/// controller adapter reads `SetFinished`/`GameFinished` off this stream to
/// drive the auto-advance timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEvent {
    /// Unix-epoch milliseconds at which the mutation committed.
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: StoreEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEventKind {
    GameStart,
    ScorePoint { side: TeamSide, score: u8 },
    RemovePoint { side: TeamSide, score: u8 },
    RotateTeam { side: TeamSide, current_player: u8 },
    SetFinished { side: TeamSide, sets: u8 },
    GameFinished { winner: TeamSide },
    NextSet { set: u8 },
    ResetGame,
    UpdateTeamName { side: TeamSide },
    UpdateTeamLogo { side: TeamSide },
    UpdateTeamColor { side: TeamSide },
    UpdateSettings,
    ToggleServe { serving: TeamSide },
}
