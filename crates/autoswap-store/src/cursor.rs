//! Watermark stores for signal ingestion.
//!
//! The stored value is the next sequence number to fetch. A missing value
//! means ingestion has never run and starts from the beginning.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use autoswap_contracts::error::{AutoswapError, AutoswapResult};
use autoswap_core::traits::CursorStore;

/// Process-local watermark, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    next_sequence: Mutex<Option<u64>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> AutoswapResult<Option<u64>> {
        self.next_sequence.lock().map(|guard| *guard).map_err(|e| AutoswapError::StorageError {
            reason: format!("cursor lock poisoned: {}", e),
        })
    }

    fn save(&self, next_sequence: u64) -> AutoswapResult<()> {
        let mut guard = self.next_sequence.lock().map_err(|e| AutoswapError::StorageError {
            reason: format!("cursor lock poisoned: {}", e),
        })?;
        *guard = Some(next_sequence);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    next_sequence: u64,
}

/// Watermark persisted as a small JSON document.
///
/// Saves write a sibling temp file and rename it over the target, so a crash
/// mid-write leaves the previous watermark intact.
#[derive(Debug, Clone)]
pub struct JsonFileCursorStore {
    path: PathBuf,
}

impl JsonFileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CursorStore for JsonFileCursorStore {
    fn load(&self) -> AutoswapResult<Option<u64>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AutoswapError::StorageError {
                    reason: format!("failed to read cursor '{}': {}", self.path.display(), e),
                })
            }
        };
        let file: CursorFile = serde_json::from_str(&contents).map_err(|e| AutoswapError::StorageError {
            reason: format!("corrupt cursor '{}': {}", self.path.display(), e),
        })?;
        Ok(Some(file.next_sequence))
    }

    fn save(&self, next_sequence: u64) -> AutoswapResult<()> {
        let body = serde_json::to_string(&CursorFile { next_sequence }).map_err(|e| AutoswapError::StorageError {
            reason: format!("failed to encode cursor: {}", e),
        })?;
        let temp = self.temp_path();
        fs::write(&temp, body)
            .and_then(|()| fs::rename(&temp, &self.path))
            .map_err(|e| AutoswapError::StorageError {
                reason: format!("failed to write cursor '{}': {}", self.path.display(), e),
            })?;
        debug!(path = %self.path.display(), next_sequence, "cursor saved");
        Ok(())
    }
}
