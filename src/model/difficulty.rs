use fixed::types::U32F32;
use serde::{Deserialize, Serialize};

use crate::game::error::{GameError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Easy
    }
}

impl Difficulty {
    pub fn all() -> Vec<Difficulty> {
        vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }

    pub fn parse(name: &str) -> Option<Difficulty> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" | "e" => Some(Difficulty::Easy),
            "medium" | "m" => Some(Difficulty::Medium),
            "hard" | "h" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn pairs(&self) -> u32 {
        match self {
            Difficulty::Easy => 6,
            Difficulty::Medium => 8,
            Difficulty::Hard => 12,
        }
    }

    pub fn grid_columns(&self) -> u32 {
        match self {
            Difficulty::Easy => 4,
            Difficulty::Medium => 4,
            Difficulty::Hard => 6,
        }
    }

    /// Score multiplier applied to every match and to the completion bonus.
    pub fn multiplier(&self) -> U32F32 {
        match self {
            Difficulty::Easy => U32F32::from_num(1),
            Difficulty::Medium => U32F32::from_num(3) / U32F32::from_num(2),
            Difficulty::Hard => U32F32::from_num(2),
        }
    }

    pub fn config(&self) -> DifficultyConfig {
        DifficultyConfig {
            pairs: self.pairs(),
            grid_columns: self.grid_columns(),
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            Difficulty::Easy => "easy".to_string(),
            Difficulty::Medium => "medium".to_string(),
            Difficulty::Hard => "hard".to_string(),
        }
    }
}

/// Board shape handed to the deck generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub pairs: u32,
    pub grid_columns: u32,
}

impl DifficultyConfig {
    pub fn new(pairs: u32, grid_columns: u32) -> Result<Self> {
        if pairs == 0 {
            return Err(GameError::InvalidPairCount);
        }
        if grid_columns == 0 {
            return Err(GameError::InvalidGridColumns);
        }
        Ok(Self {
            pairs,
            grid_columns,
        })
    }

    pub fn card_count(&self) -> usize {
        self.pairs as usize * 2
    }

    pub fn grid_rows(&self) -> u32 {
        (self.pairs * 2).div_ceil(self.grid_columns.max(1))
    }
}
