// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Raw filesystem operations for the data directory.
//!
//! Every write lands in a sibling temp file first and is renamed over the
//! target, so readers observe either the old file or the new one.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::StoragePaths;

/// Error type for filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// File access scoped to one data directory.
#[derive(Debug, Clone)]
pub struct DataStore {
    paths: StoragePaths,
    initialized: bool,
}

impl DataStore {
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the data and audit directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in [self.paths.root().to_path_buf(), self.paths.audit_dir()] {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete probe of the data directory. Each call uses its
    /// own probe file so concurrent checks do not interfere.
    pub fn health_check(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let probe = self
            .paths
            .root()
            .join(format!(".health_check-{}", uuid::Uuid::new_v4()));
        let data = b"health_check_data";
        fs::write(&probe, data)?;
        let read_back = fs::read(&probe)?;
        fs::remove_file(&probe)?;

        if read_back != data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a whole file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| not_found_or_io(e, path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Replace `path` with `data` via temp file + rename.
    pub fn write_atomic(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = temp_path_for(path);
        let written = (|| -> io::Result<()> {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(data)?;
            writer.flush()?;
            writer.get_ref().sync_all()
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Copy `source` byte-for-byte to `snapshot`, overwriting any earlier one.
    pub fn snapshot(&self, source: impl AsRef<Path>, snapshot: impl AsRef<Path>) -> StorageResult<()> {
        let bytes = self.read_raw(source)?;
        self.write_atomic(snapshot, &bytes)
    }

    /// Uses `File::open()` rather than `Path::exists()` so permission
    /// problems surface as "absent" the same way a read would fail.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        File::open(path.as_ref()).is_ok()
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    super::paths::with_suffix(path, ".tmp")
}

fn not_found_or_io(e: io::Error, path: &Path) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(path.display().to_string())
    } else {
        StorageError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::new(StoragePaths::new(dir.path()));
        store.initialize().unwrap();
        (dir, store)
    }

    #[test]
    fn initialize_creates_directories() {
        let (_dir, store) = test_store();
        assert!(store.paths().audit_dir().exists());
    }

    #[test]
    fn write_atomic_then_read() {
        let (_dir, store) = test_store();
        let path = store.paths().keystore();
        store.write_atomic(&path, b"first").unwrap();
        store.write_atomic(&path, b"second").unwrap();

        assert_eq!(store.read_raw(&path).unwrap(), b"second");
        assert!(!temp_path_for(&path).exists(), "temp file must be renamed away");
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_dir, store) = test_store();
        let err = store.read_raw(store.paths().keystore()).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn snapshot_copies_bytes() {
        let (_dir, store) = test_store();
        let live = store.paths().keystore();
        let backup = store.paths().keystore_backup();
        store.write_atomic(&live, b"\x00\x01binary").unwrap();
        store.snapshot(&live, &backup).unwrap();

        assert_eq!(store.read_raw(&backup).unwrap(), b"\x00\x01binary");
        assert!(store.exists(&live));
    }

    #[test]
    fn concurrent_health_checks_pass() {
        let (_dir, store) = test_store();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| (0..20).all(|_| store.health_check().is_ok())))
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap());
            }
        });

        let leftovers = fs::read_dir(store.paths().root())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".health_check"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn health_check_requires_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(StoragePaths::new(dir.path()));
        assert!(matches!(
            store.health_check(),
            Err(StorageError::NotInitialized)
        ));

        let (_dir, store) = test_store();
        store.health_check().unwrap();
    }
}
