use std::collections::HashSet;

use log::trace;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};

use super::error::{GameError, Result};
use crate::model::{Card, DifficultyConfig, FaceValue};

/// Number of distinct faces the stock card art provides.
pub const DEFAULT_POOL_SIZE: u16 = 24;

/// Distinct face values a deck may draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacePool {
    values: Vec<FaceValue>,
}

impl Default for FacePool {
    fn default() -> Self {
        Self {
            values: (1..=DEFAULT_POOL_SIZE).map(FaceValue).collect(),
        }
    }
}

impl FacePool {
    pub fn new(values: Vec<FaceValue>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(values.len());
        for value in &values {
            if !seen.insert(*value) {
                return Err(GameError::DuplicateFaceValue(*value));
            }
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[FaceValue] {
        &self.values
    }
}

/// Builds a shuffled deck: `pairs` faces drawn without replacement, each
/// duplicated once, the whole deck permuted with Fisher–Yates, then numbered
/// `0..pairs * 2` in final order.
pub fn generate_deck(config: &DifficultyConfig, pool: &FacePool, seed: u64) -> Result<Vec<Card>> {
    let pairs = config.pairs as usize;
    if pairs == 0 {
        return Err(GameError::InvalidPairCount);
    }
    if pool.len() < pairs {
        return Err(GameError::InsufficientFacePool {
            requested: config.pairs,
            available: pool.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let mut candidates = pool.values.clone();
    let (chosen, _) = candidates.partial_shuffle(&mut rng, pairs);

    let mut faces: Vec<FaceValue> = Vec::with_capacity(pairs * 2);
    faces.extend_from_slice(chosen);
    faces.extend_from_slice(chosen);
    faces.shuffle(&mut rng);

    let cards: Vec<Card> = faces
        .into_iter()
        .enumerate()
        .map(|(id, face_value)| Card::new(id, face_value))
        .collect();
    trace!(target: "deck", "Generated deck (seed {}): {:?}", seed, cards);
    Ok(cards)
}

pub fn random_seed() -> u64 {
    rand::rng().next_u64()
}
