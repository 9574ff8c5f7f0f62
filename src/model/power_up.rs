use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Reveal,
    Shuffle,
    Hint,
}

impl PowerUpKind {
    pub fn all() -> Vec<PowerUpKind> {
        vec![PowerUpKind::Reveal, PowerUpKind::Shuffle, PowerUpKind::Hint]
    }

    pub fn parse(name: &str) -> Option<PowerUpKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "reveal" | "r" => Some(PowerUpKind::Reveal),
            "shuffle" | "s" => Some(PowerUpKind::Shuffle),
            "hint" | "h" => Some(PowerUpKind::Hint),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            PowerUpKind::Reveal => "reveal",
            PowerUpKind::Shuffle => "shuffle",
            PowerUpKind::Hint => "hint",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowerUpKind::Reveal => "Reveal All",
            PowerUpKind::Shuffle => "Shuffle",
            PowerUpKind::Hint => "Hint",
        }
    }

    pub fn default_uses(&self) -> u32 {
        match self {
            PowerUpKind::Reveal => 3,
            PowerUpKind::Shuffle => 2,
            PowerUpKind::Hint => 5,
        }
    }

    /// How long the visual effect lasts before it reverts, if it reverts at all.
    pub fn effect_duration(&self) -> Option<Duration> {
        match self {
            PowerUpKind::Reveal => Some(Duration::from_millis(2000)),
            PowerUpKind::Shuffle => None,
            PowerUpKind::Hint => Some(Duration::from_millis(3000)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: String,
    pub kind: PowerUpKind,
    pub uses_remaining: u32,
}

impl PowerUp {
    pub fn new(kind: PowerUpKind) -> Self {
        Self {
            id: kind.id().to_string(),
            kind,
            uses_remaining: kind.default_uses(),
        }
    }

    pub fn defaults() -> Vec<PowerUp> {
        PowerUpKind::all().into_iter().map(PowerUp::new).collect()
    }

    /// Decrements by one; refuses at zero.
    pub fn consume(&mut self) -> bool {
        if self.uses_remaining == 0 {
            return false;
        }
        self.uses_remaining -= 1;
        true
    }
}
