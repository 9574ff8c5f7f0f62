use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, trace};

use super::error::StorageError;
use super::progress_store::ProgressRecord;

const PROGRESS_FILE_NAME: &str = "progress.json";

/// Where progress lives between runs. Failures are reported, never fatal.
pub trait ProgressStorage {
    fn load(&self) -> Result<Option<ProgressRecord>, StorageError>;
    fn save(&self, record: &ProgressRecord) -> Result<(), StorageError>;
}

pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MEMORY_MATCH_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("memory-match")
}

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PROGRESS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<ProgressRecord>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(target: "storage", "No progress file at {:?}", self.path);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let record = serde_json::from_str(&contents)?;
        trace!(target: "storage", "Loaded progress from {:?}", self.path);
        Ok(Some(record))
    }

    fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(record).map_err(StorageError::Encode)?;
        fs::write(&self.path, contents)?;
        trace!(target: "storage", "Saved progress to {:?}", self.path);
        Ok(())
    }
}

/// Keeps the record in memory. Clones share the same slot, so a test can hold
/// one handle while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    record: Rc<RefCell<Option<ProgressRecord>>>,
    fail: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: ProgressRecord) -> Self {
        Self {
            record: Rc::new(RefCell::new(Some(record))),
            fail: false,
        }
    }

    /// Storage that refuses every read and write.
    pub fn unavailable() -> Self {
        Self {
            record: Rc::default(),
            fail: true,
        }
    }

    pub fn snapshot(&self) -> Option<ProgressRecord> {
        self.record.borrow().clone()
    }

    fn unavailable_error() -> StorageError {
        StorageError::Io(std::io::Error::new(
            ErrorKind::PermissionDenied,
            "storage unavailable",
        ))
    }
}

impl ProgressStorage for MemoryStorage {
    fn load(&self) -> Result<Option<ProgressRecord>, StorageError> {
        if self.fail {
            return Err(Self::unavailable_error());
        }
        Ok(self.record.borrow().clone())
    }

    fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        if self.fail {
            return Err(Self::unavailable_error());
        }
        *self.record.borrow_mut() = Some(record.clone());
        Ok(())
    }
}
