use super::{AchievementId, GameSession, GameSummary, Phase, PowerUpKind, SoundEvent};
use crate::game::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEngineEvent {
    /// Full snapshot after every mutation of the session.
    SessionUpdated(GameSession),
    PhaseChanged(Phase),
    Sound(SoundEvent),
    AchievementUnlocked(AchievementId),
    PowerUpUsed {
        kind: PowerUpKind,
        uses_remaining: u32,
    },
    GameWon(GameSummary),
    SettingsChanged(Settings),
    PersistenceFailed(String),
}
