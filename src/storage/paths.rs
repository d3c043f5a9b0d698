// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the keystore data directory.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent state.
pub const DATA_ROOT: &str = "/data";

/// File name of the encrypted keystore container.
pub const KEYSTORE_FILE: &str = "keystore.p8ks";

/// File name of the provisioning marker.
pub const SETUP_FLAG_FILE: &str = "setup-completed.flag";

/// Suffix of the snapshot taken before rotation or restore.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Suffix of the snapshot taken before a forced reset.
pub const RESET_BACKUP_SUFFIX: &str = ".reset-backup";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Keystore Paths ==========

    /// Path to the live keystore container.
    pub fn keystore(&self) -> PathBuf {
        self.root.join(KEYSTORE_FILE)
    }

    /// Snapshot written before rotation and restore.
    pub fn keystore_backup(&self) -> PathBuf {
        with_suffix(&self.keystore(), BACKUP_SUFFIX)
    }

    /// Snapshot written before a forced reset.
    pub fn keystore_reset_backup(&self) -> PathBuf {
        with_suffix(&self.keystore(), RESET_BACKUP_SUFFIX)
    }

    /// Path to the setup-completed marker.
    pub fn setup_flag(&self) -> PathBuf {
        self.root.join(SETUP_FLAG_FILE)
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

/// Append `suffix` to the full file name (`keystore.p8ks` -> `keystore.p8ks.backup`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(paths.keystore(), PathBuf::from("/data/keystore.p8ks"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.setup_flag(),
            PathBuf::from("/tmp/test-data/setup-completed.flag")
        );
    }

    #[test]
    fn snapshot_paths_keep_full_name() {
        let paths = StoragePaths::default();
        assert_eq!(
            paths.keystore_backup(),
            PathBuf::from("/data/keystore.p8ks.backup")
        );
        assert_eq!(
            paths.keystore_reset_backup(),
            PathBuf::from("/data/keystore.p8ks.reset-backup")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-01-15"),
            PathBuf::from("/data/audit/2026-01-15/events.jsonl")
        );
    }
}
