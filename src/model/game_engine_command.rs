use std::time::Duration;

use super::{CardId, Difficulty, PowerUpKind};
use crate::game::settings::Theme;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsChange {
    pub difficulty: Option<Difficulty>,
    pub sound_enabled: Option<bool>,
    pub theme: Option<Theme>,
    pub flip_back_delay_ms: Option<u64>,
    pub comparison_delay_ms: Option<u64>,
    pub music_volume: Option<u8>,
    pub sfx_volume: Option<u8>,
}

/// User intents forwarded by the display collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEngineCommand {
    NewGame(Option<Difficulty>),
    SelectCard(CardId),
    Pause,
    Resume,
    TogglePause,
    Advance(Duration),
    ActivatePowerUp(PowerUpKind),
    ChangeSettings(SettingsChange),
    ResetProgress,
}
