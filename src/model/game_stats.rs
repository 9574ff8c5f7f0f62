use crate::model::Difficulty;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use serde_with::TimestampSeconds;
use std::time::SystemTime;
use uuid::Uuid;

/// Created once per won session and offered to the leaderboard.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ScoreRecord {
    pub score: u32,
    pub moves: u32,
    pub elapsed_seconds: u32,
    pub difficulty: Difficulty,
    #[serde_as(as = "TimestampSeconds")]
    pub timestamp: SystemTime,
    pub playthrough_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub difficulty: Difficulty,
    pub games_won: u32,
    pub total_seconds_played: u64,
    pub total_moves: u64,
}

/// Result of `ProgressStore::record_win`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinRecordOutcome {
    pub new_best_moves: bool,
    /// Zero-based position on the leaderboard, when admitted.
    pub leaderboard_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub record: ScoreRecord,
    pub stars: u8,
    pub max_possible_score: u32,
    pub new_best_moves: bool,
    pub leaderboard_rank: Option<usize>,
}
