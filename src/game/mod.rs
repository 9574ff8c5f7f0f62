pub mod deck_generator;
pub mod error;
pub mod game_engine;
pub mod progress_store;
pub mod scheduler;
pub mod scoring;
pub mod settings;
pub mod storage;

pub use deck_generator::{generate_deck, FacePool};
pub use error::{GameError, StorageError};
pub use game_engine::GameEngine;
pub use progress_store::{ProgressRecord, ProgressStore};
pub use settings::{Settings, Theme};
pub use storage::{default_data_dir, JsonFileStorage, MemoryStorage, ProgressStorage};
