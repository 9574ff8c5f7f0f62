use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Card, CardId, Difficulty, DifficultyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Ready,
    Playing,
    Paused,
    Won,
}

impl Phase {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won)
    }

    /// Phases in which card selection may be attempted.
    pub const fn accepts_input(self) -> bool {
        matches!(self, Self::Ready | Self::Playing)
    }
}

/// Authoritative state of one round. The engine owns the only mutable copy;
/// collaborators receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub cards: Vec<Card>,
    pub selection: Vec<CardId>,
    pub moves: u32,
    pub elapsed_seconds: u32,
    pub matched_pair_count: u32,
    pub score: u32,
    pub phase: Phase,
    pub difficulty: Difficulty,
    pub pairs: u32,
    pub grid_columns: u32,
    pub seed: u64,
    pub playthrough_id: Uuid,
}

impl GameSession {
    pub fn new(difficulty: Difficulty, config: DifficultyConfig, cards: Vec<Card>, seed: u64) -> Self {
        Self {
            pairs: (cards.len() / 2) as u32,
            grid_columns: config.grid_columns,
            cards,
            selection: Vec::with_capacity(2),
            moves: 0,
            elapsed_seconds: 0,
            matched_pair_count: 0,
            score: 0,
            phase: Phase::Ready,
            difficulty,
            seed,
            playthrough_id: Uuid::new_v4(),
        }
    }

    /// Two cards are pending resolution; no selection is accepted.
    pub fn is_locked(&self) -> bool {
        self.selection.len() >= 2
    }

    pub fn is_won(&self) -> bool {
        self.matched_pair_count == self.pairs
    }

    pub(crate) fn card_mut(&mut self, id: CardId) -> Option<&mut Card> {
        self.cards.get_mut(id)
    }

    pub fn pending_count(&self) -> usize {
        self.cards.iter().filter(|card| card.is_pending()).count()
    }

    pub fn hidden_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| card.is_hidden())
    }
}
