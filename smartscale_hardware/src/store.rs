//! Single-slot calibration factor persistence.

use serde::{Deserialize, Serialize};
use smartscale_traits::{BoxError, FactorStore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::HwError;

/// Write `bytes` to `path` via a sibling temp file and rename, so a power
/// loss never leaves a half-written factor behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// In-memory slot; reads NaN until the first store.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactorStore {
    slot: Arc<Mutex<Option<f32>>>,
    writes: Arc<Mutex<u32>>,
}

impl MemoryFactorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factor(factor: f32) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.slot.lock() {
            *slot = Some(factor);
        }
        store
    }

    /// Stored value without going through the trait (None when never written).
    pub fn stored(&self) -> Option<f32> {
        self.slot.lock().ok().and_then(|s| *s)
    }

    pub fn write_count(&self) -> u32 {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

impl FactorStore for MemoryFactorStore {
    fn load_factor(&mut self) -> Result<f32, BoxError> {
        Ok(self.stored().unwrap_or(f32::NAN))
    }

    fn store_factor(&mut self, factor: f32) -> Result<(), BoxError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| HwError::Storage("factor slot poisoned".into()))?;
        *slot = Some(factor);
        if let Ok(mut w) = self.writes.lock() {
            *w += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFactor {
    scale_factor: f32,
}

/// TOML file holding `scale_factor = <f32>`; a missing file reads as NaN.
#[derive(Debug, Clone)]
pub struct FileFactorStore {
    path: PathBuf,
}

impl FileFactorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FactorStore for FileFactorStore {
    fn load_factor(&mut self) -> Result<f32, BoxError> {
        if !self.path.exists() {
            return Ok(f32::NAN);
        }
        let text = fs::read_to_string(&self.path).map_err(HwError::from)?;
        let persisted: PersistedFactor = toml::from_str(&text)
            .map_err(|e| HwError::Storage(format!("parse {}: {e}", self.path.display())))?;
        Ok(persisted.scale_factor)
    }

    fn store_factor(&mut self, factor: f32) -> Result<(), BoxError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(HwError::from)?;
        }
        let body = toml::to_string(&PersistedFactor {
            scale_factor: factor,
        })
        .map_err(|e| HwError::Storage(e.to_string()))?;
        write_atomic(&self.path, body.as_bytes()).map_err(HwError::from)?;
        tracing::info!(factor, path = %self.path.display(), "scale factor persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_is_nan_until_written() {
        let mut store = MemoryFactorStore::new();
        assert!(store.load_factor().unwrap().is_nan());
        store.store_factor(412.5).unwrap();
        assert_eq!(store.load_factor().unwrap(), 412.5);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn file_store_round_trips_and_reports_missing_as_nan() {
        let dir = tempdir().unwrap();
        let mut store = FileFactorStore::new(dir.path().join("var").join("factor.toml"));
        assert!(store.load_factor().unwrap().is_nan());
        store.store_factor(-211.25).unwrap();
        assert_eq!(store.load_factor().unwrap(), -211.25);
        assert!(!store.path().with_extension("new").exists());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("factor.toml");
        fs::write(&path, "not = [valid").unwrap();
        let mut store = FileFactorStore::new(&path);
        let err = store.load_factor().unwrap_err();
        assert!(err.to_string().contains("factor storage error"));
    }
}
