use thiserror::Error;

use crate::model::FaceValue;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    #[error("face pool holds {available} distinct values but {requested} pairs were requested")]
    InsufficientFacePool { requested: u32, available: usize },
    #[error("a deck needs at least one pair")]
    InvalidPairCount,
    #[error("a grid needs at least one column")]
    InvalidGridColumns,
    #[error("face value {0} appears more than once in the pool")]
    DuplicateFaceValue(FaceValue),
}

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored progress is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("progress could not be encoded: {0}")]
    Encode(serde_json::Error),
}
