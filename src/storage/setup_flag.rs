// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted "setup completed" marker.
//!
//! Presence of the flag file means the keystore has been provisioned. The
//! file content is the RFC 3339 time it was written, for operators only.

use chrono::Utc;

use super::fs::{DataStore, StorageResult};

#[derive(Debug, Clone)]
pub struct SetupFlag {
    store: DataStore,
}

impl SetupFlag {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    pub fn is_set(&self) -> bool {
        self.store.exists(self.store.paths().setup_flag())
    }

    pub fn mark(&self) -> StorageResult<()> {
        let stamp = Utc::now().to_rfc3339();
        self.store
            .write_atomic(self.store.paths().setup_flag(), stamp.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    #[test]
    fn mark_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::new(StoragePaths::new(dir.path()));
        store.initialize().unwrap();
        let flag = SetupFlag::new(store);

        assert!(!flag.is_set());
        flag.mark().unwrap();
        assert!(flag.is_set());
        // Marking again is harmless.
        flag.mark().unwrap();
        assert!(flag.is_set());
    }
}
