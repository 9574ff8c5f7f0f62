use crate::model::{Difficulty, SettingsChange};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DELAY_RANGE_MS: RangeInclusive<u64> = 300..=2000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Neon,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_version")]
    version: u32,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[serde(default = "default_true")]
    pub sound_enabled: bool,

    #[serde(default)]
    pub theme: Theme,

    #[serde(default = "default_flip_back_delay_ms")]
    pub flip_back_delay_ms: u64,

    #[serde(default = "default_comparison_delay_ms")]
    pub comparison_delay_ms: u64,

    #[serde(default = "default_music_volume")]
    pub music_volume: u8,

    #[serde(default = "default_sfx_volume")]
    pub sfx_volume: u8,
}

// Helper functions for default values
fn default_version() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_flip_back_delay_ms() -> u64 {
    800
}
fn default_comparison_delay_ms() -> u64 {
    1000
}
fn default_music_volume() -> u8 {
    50
}
fn default_sfx_volume() -> u8 {
    70
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            version: default_version(),
            difficulty: Difficulty::default(),
            sound_enabled: true,
            theme: Theme::default(),
            flip_back_delay_ms: default_flip_back_delay_ms(),
            comparison_delay_ms: default_comparison_delay_ms(),
            music_volume: default_music_volume(),
            sfx_volume: default_sfx_volume(),
        }
    }
}

impl Settings {
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Delay between the mismatch shake and the cards turning back over.
    pub fn flip_back_delay(&self) -> Duration {
        Duration::from_millis(clamp_delay(self.flip_back_delay_ms))
    }

    /// Delay between the second selection and the comparison resolving.
    pub fn comparison_delay(&self) -> Duration {
        Duration::from_millis(clamp_delay(self.comparison_delay_ms))
    }

    pub fn apply(&mut self, change: &SettingsChange) {
        if let Some(difficulty) = change.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(sound_enabled) = change.sound_enabled {
            self.sound_enabled = sound_enabled;
        }
        if let Some(theme) = change.theme {
            self.theme = theme;
        }
        if let Some(delay) = change.flip_back_delay_ms {
            self.flip_back_delay_ms = clamp_delay(delay);
        }
        if let Some(delay) = change.comparison_delay_ms {
            self.comparison_delay_ms = clamp_delay(delay);
        }
        if let Some(volume) = change.music_volume {
            self.music_volume = volume.min(100);
        }
        if let Some(volume) = change.sfx_volume {
            self.sfx_volume = volume.min(100);
        }
    }

    pub(crate) fn migrate(&mut self) {
        match self.version {
            0 | 1 => {
                // version 1 stored the delay unclamped
                self.version = 2;
            }
            _ => (),
        }
        self.flip_back_delay_ms = clamp_delay(self.flip_back_delay_ms);
        self.comparison_delay_ms = clamp_delay(self.comparison_delay_ms);
        self.music_volume = self.music_volume.min(100);
        self.sfx_volume = self.sfx_volume.min(100);
    }

    pub fn is_debug_mode() -> bool {
        std::env::var("DEBUG").map(|v| v == "1").unwrap_or(false)
    }

    pub fn seed_from_env() -> Option<u64> {
        std::env::var("SEED").ok().and_then(|v| v.parse::<u64>().ok())
    }
}

fn clamp_delay(ms: u64) -> u64 {
    ms.clamp(*DELAY_RANGE_MS.start(), *DELAY_RANGE_MS.end())
}
