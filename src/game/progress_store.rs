use std::collections::HashMap;
use std::time::SystemTime;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::settings::Settings;
use super::storage::ProgressStorage;
use crate::model::{
    Achievement, AchievementId, Difficulty, GlobalStats, PowerUp, PowerUpKind, ScoreRecord,
    WinRecordOutcome,
};

pub const LEADERBOARD_SIZE: usize = 10;
const RECORD_VERSION: u32 = 1;

fn default_record_version() -> u32 {
    RECORD_VERSION
}

/// Everything that outlives a session, as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default = "default_record_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub best_moves: HashMap<Difficulty, u32>,
    #[serde(default)]
    pub high_scores: Vec<ScoreRecord>,
    #[serde(default = "Achievement::defaults")]
    pub achievements: Vec<Achievement>,
    #[serde(default = "PowerUp::defaults")]
    pub power_ups: Vec<PowerUp>,
    #[serde(default)]
    pub stats: HashMap<Difficulty, GlobalStats>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            settings: Settings::default(),
            best_moves: HashMap::new(),
            high_scores: Vec::new(),
            achievements: Achievement::defaults(),
            power_ups: PowerUp::defaults(),
            stats: HashMap::new(),
        }
    }
}

impl ProgressRecord {
    /// Repairs a record read from storage: restores missing achievements and
    /// power-ups, drops duplicates, re-ranks the leaderboard, clamps settings.
    pub fn normalize(&mut self) {
        self.settings.migrate();

        let mut achievements = Achievement::defaults();
        for stored in self.achievements.drain(..) {
            if let Some(slot) = achievements.iter_mut().find(|a| a.id == stored.id) {
                if stored.unlocked && !slot.unlocked {
                    *slot = stored;
                }
            }
        }
        self.achievements = achievements;

        let mut power_ups = PowerUp::defaults();
        for slot in power_ups.iter_mut() {
            if let Some(stored) = self.power_ups.iter().find(|p| p.kind == slot.kind) {
                slot.uses_remaining = stored.uses_remaining;
            }
        }
        self.power_ups = power_ups;

        sort_leaderboard(&mut self.high_scores);
        self.high_scores.truncate(LEADERBOARD_SIZE);

        for (difficulty, stats) in self.stats.iter_mut() {
            stats.difficulty = *difficulty;
        }
        self.version = RECORD_VERSION;
    }
}

fn sort_leaderboard(scores: &mut [ScoreRecord]) {
    // stable: ties keep their earlier arrival first
    scores.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Best moves, leaderboard, achievements and power-up inventory, shared by
/// every session the engine starts.
pub struct ProgressStore {
    record: ProgressRecord,
    storage: Box<dyn ProgressStorage>,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Loads from `storage`; unavailable or corrupt data falls back to defaults.
    pub fn load(storage: Box<dyn ProgressStorage>) -> Self {
        let record = match storage.load() {
            Ok(Some(mut record)) => {
                record.normalize();
                debug!(
                    target: "progress",
                    "Loaded progress: {} high scores, {} achievements unlocked",
                    record.high_scores.len(),
                    record.achievements.iter().filter(|a| a.unlocked).count()
                );
                record
            }
            Ok(None) => {
                info!(target: "progress", "No saved progress, starting fresh");
                ProgressRecord::default()
            }
            Err(err) => {
                warn!(target: "progress", "Discarding saved progress: {}", err);
                ProgressRecord::default()
            }
        };
        Self { record, storage }
    }

    pub fn in_memory() -> Self {
        Self::load(Box::new(super::storage::MemoryStorage::new()))
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub fn persist(&self) -> Result<(), StorageError> {
        self.storage.save(&self.record)
    }

    pub fn settings(&self) -> &Settings {
        &self.record.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.record.settings
    }

    pub fn best_moves(&self, difficulty: Difficulty) -> Option<u32> {
        self.record.best_moves.get(&difficulty).copied()
    }

    pub fn high_scores(&self) -> &[ScoreRecord] {
        &self.record.high_scores
    }

    pub fn stats(&self, difficulty: Difficulty) -> GlobalStats {
        self.record
            .stats
            .get(&difficulty)
            .cloned()
            .unwrap_or_else(|| GlobalStats {
                difficulty,
                ..Default::default()
            })
    }

    pub fn games_won(&self) -> u32 {
        self.record.stats.values().map(|stats| stats.games_won).sum()
    }

    /// Best moves (lower wins), then leaderboard admission by score, then the
    /// per-difficulty aggregates.
    pub fn record_win(&mut self, score: &ScoreRecord) -> WinRecordOutcome {
        let difficulty = score.difficulty;

        let new_best_moves = match self.record.best_moves.get(&difficulty) {
            Some(&best) => score.moves < best,
            None => true,
        };
        if new_best_moves {
            self.record.best_moves.insert(difficulty, score.moves);
        }

        let board = &mut self.record.high_scores;
        let admitted = board.len() < LEADERBOARD_SIZE
            || board.iter().map(|r| r.score).min().is_some_and(|lowest| score.score > lowest);
        let leaderboard_rank = if admitted {
            board.push(score.clone());
            sort_leaderboard(board);
            board.truncate(LEADERBOARD_SIZE);
            board
                .iter()
                .position(|r| r.playthrough_id == score.playthrough_id)
        } else {
            None
        };

        let stats = self.record.stats.entry(difficulty).or_insert_with(|| GlobalStats {
            difficulty,
            ..Default::default()
        });
        stats.games_won += 1;
        stats.total_seconds_played += u64::from(score.elapsed_seconds);
        stats.total_moves += u64::from(score.moves);

        trace!(
            target: "progress",
            "Recorded win on {}: best={} rank={:?}",
            difficulty.to_string(),
            new_best_moves,
            leaderboard_rank
        );
        WinRecordOutcome {
            new_best_moves,
            leaderboard_rank,
        }
    }

    /// True only on the locked→unlocked transition.
    pub fn unlock(&mut self, id: AchievementId) -> bool {
        self.unlock_at(id, SystemTime::now())
    }

    pub fn unlock_at(&mut self, id: AchievementId, now: SystemTime) -> bool {
        let unlocked = match self.record.achievements.iter_mut().find(|a| a.id == id) {
            Some(achievement) => achievement.unlock(now),
            None => {
                let mut achievement = Achievement::locked(id);
                achievement.unlock(now);
                self.record.achievements.push(achievement);
                true
            }
        };
        if unlocked {
            info!(target: "progress", "Achievement unlocked: {:?}", id);
        }
        unlocked
    }

    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.record
            .achievements
            .iter()
            .any(|achievement| achievement.id == id && achievement.unlocked)
    }

    pub fn unlocked_count(&self) -> usize {
        self.record
            .achievements
            .iter()
            .filter(|achievement| achievement.unlocked)
            .count()
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.record.achievements
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.record.power_ups
    }

    pub fn uses_remaining(&self, kind: PowerUpKind) -> u32 {
        self.record
            .power_ups
            .iter()
            .find(|power_up| power_up.kind == kind)
            .map(|power_up| power_up.uses_remaining)
            .unwrap_or(0)
    }

    /// Spends one use; `None` when the inventory is empty.
    pub fn consume_power_up(&mut self, kind: PowerUpKind) -> Option<u32> {
        let power_up = self
            .record
            .power_ups
            .iter_mut()
            .find(|power_up| power_up.kind == kind)?;
        if power_up.consume() {
            Some(power_up.uses_remaining)
        } else {
            None
        }
    }

    /// Explicit user reset: everything back to factory defaults, settings included.
    pub fn reset_to_defaults(&mut self) {
        info!(target: "progress", "Resetting progress to defaults");
        self.record = ProgressRecord::default();
    }
}
