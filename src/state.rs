// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::AppConfig;
use crate::session::CredentialStore;
use crate::setup::SetupLifecycle;
use crate::storage::{DataStore, StorageResult, StoragePaths};

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SetupLifecycle>,
}

impl AppState {
    pub fn new(lifecycle: SetupLifecycle) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
        }
    }

    /// Initialize the data directory and wire the lifecycle from config.
    pub fn from_config(config: &AppConfig) -> StorageResult<Self> {
        let mut store = DataStore::new(StoragePaths::new(&config.data_dir));
        store.initialize()?;

        let credentials = Arc::new(CredentialStore::new(
            config.session_capacity,
            config.session_ttl,
        ));
        let lifecycle = SetupLifecycle::new(store, credentials)
            .with_kdf_iterations(config.kdf_iterations)
            .with_env_password(config.keystore_password.clone());
        Ok(Self::new(lifecycle))
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        self.lifecycle.credentials()
    }
}
