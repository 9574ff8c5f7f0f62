mod achievement;
mod card;
mod difficulty;
mod game_engine_command;
mod game_engine_event;
mod game_session;
mod game_stats;
mod outcome;
mod power_up;
mod sound_event;

pub use achievement::{Achievement, AchievementId};
pub use card::{Card, CardId, FaceValue};
pub use difficulty::{Difficulty, DifficultyConfig};
pub use game_engine_command::{GameEngineCommand, SettingsChange};
pub use game_engine_event::GameEngineEvent;
pub use game_session::{GameSession, Phase};
pub use game_stats::{GameSummary, GlobalStats, ScoreRecord, WinRecordOutcome};
pub use outcome::{PauseOutcome, PowerUpOutcome, Rejection, SelectOutcome};
pub use power_up::{PowerUp, PowerUpKind};
pub use sound_event::SoundEvent;
