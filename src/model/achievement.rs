use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use serde_with::TimestampSeconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstMatch,
    SpeedDemon,
    PerfectGame,
    Marathon,
    Master,
    Collector,
}

impl AchievementId {
    pub fn all() -> Vec<AchievementId> {
        vec![
            AchievementId::FirstMatch,
            AchievementId::SpeedDemon,
            AchievementId::PerfectGame,
            AchievementId::Marathon,
            AchievementId::Master,
            AchievementId::Collector,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementId::FirstMatch => "First Match!",
            AchievementId::SpeedDemon => "Speed Demon!",
            AchievementId::PerfectGame => "Perfect Game!",
            AchievementId::Marathon => "Marathon Runner!",
            AchievementId::Master => "Memory Master!",
            AchievementId::Collector => "Achievement Collector!",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementId::FirstMatch => "You found your first pair!",
            AchievementId::SpeedDemon => "Completed in under 30 seconds!",
            AchievementId::PerfectGame => "Completed with no mistakes!",
            AchievementId::Marathon => "Won 10 games",
            AchievementId::Master => "Won on hard difficulty",
            AchievementId::Collector => "Unlocked 5 achievements",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AchievementId::FirstMatch => "🎯",
            AchievementId::SpeedDemon => "⚡",
            AchievementId::PerfectGame => "💎",
            AchievementId::Marathon => "🏃",
            AchievementId::Master => "🧠",
            AchievementId::Collector => "🏅",
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub unlocked: bool,
    #[serde_as(as = "Option<TimestampSeconds>")]
    #[serde(default)]
    pub unlocked_at: Option<SystemTime>,
}

impl Achievement {
    pub fn locked(id: AchievementId) -> Self {
        Self {
            id,
            unlocked: false,
            unlocked_at: None,
        }
    }

    pub fn defaults() -> Vec<Achievement> {
        AchievementId::all()
            .into_iter()
            .map(Achievement::locked)
            .collect()
    }

    /// One-way transition; returns false when already unlocked.
    pub fn unlock(&mut self, now: SystemTime) -> bool {
        if self.unlocked {
            return false;
        }
        self.unlocked = true;
        self.unlocked_at = Some(now);
        true
    }
}
