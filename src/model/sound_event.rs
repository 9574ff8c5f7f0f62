use serde::{Deserialize, Serialize};

/// Fire-and-forget cue for the sound collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundEvent {
    Flip,
    Match,
    Mismatch,
    Win,
    PowerUp,
    Achievement,
    Shuffle,
}

impl SoundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SoundEvent::Flip => "flip",
            SoundEvent::Match => "match",
            SoundEvent::Mismatch => "mismatch",
            SoundEvent::Win => "win",
            SoundEvent::PowerUp => "powerup",
            SoundEvent::Achievement => "achievement",
            SoundEvent::Shuffle => "shuffle",
        }
    }

    /// Tone used by simple synthesized players.
    pub fn frequency_hz(&self) -> u32 {
        match self {
            SoundEvent::Flip => 400,
            SoundEvent::Match => 600,
            SoundEvent::Mismatch => 200,
            SoundEvent::Win => 800,
            SoundEvent::PowerUp => 500,
            SoundEvent::Achievement => 700,
            SoundEvent::Shuffle => 300,
        }
    }
}
