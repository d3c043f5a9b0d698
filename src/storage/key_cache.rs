// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-wide cache of the active signing key.
//!
//! The cached tuple (key handle, PEM) lives behind one `Arc` swapped under a
//! `RwLock`, so a reader sees either the whole tuple or nothing. Loads are
//! serialized by a separate mutex and re-check the slot after acquiring it,
//! so N concurrent misses cost one container read.
//!
//! Every `invalidate` bumps a generation counter. A load that started
//! before an invalidation still returns its material to its own caller but
//! does not install it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::crypto::{CryptoError, KeyHandle};

/// Loaded key material shared by concurrent signing requests.
#[derive(Debug)]
pub struct CachedKeyMaterial {
    handle: KeyHandle,
    public_key_pem: String,
}

impl CachedKeyMaterial {
    /// Derive the PEM form once at load time.
    pub fn new(handle: KeyHandle) -> Result<Self, CryptoError> {
        let public_key_pem = handle.public_key_pem()?;
        Ok(Self {
            handle,
            public_key_pem,
        })
    }

    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }
}

#[derive(Debug, Default)]
pub struct KeyMaterialCache {
    slot: RwLock<Option<Arc<CachedKeyMaterial>>>,
    load_lock: Mutex<()>,
    generation: AtomicU64,
    loads: AtomicU64,
}

impl KeyMaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached material, if valid.
    pub fn current(&self) -> Option<Arc<CachedKeyMaterial>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Return cached material, calling `loader` only on a miss.
    ///
    /// A loader error leaves the cache empty and is returned unchanged.
    pub fn ensure_loaded<F, E>(&self, loader: F) -> Result<Arc<CachedKeyMaterial>, E>
    where
        F: FnOnce() -> Result<KeyHandle, E>,
        E: From<CryptoError>,
    {
        if let Some(material) = self.current() {
            return Ok(material);
        }

        let _loading = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(material) = self.current() {
            return Ok(material);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let handle = loader()?;
        let material = Arc::new(CachedKeyMaterial::new(handle)?);
        self.loads.fetch_add(1, Ordering::Relaxed);

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(Arc::clone(&material));
            tracing::debug!("Key material cached");
        } else {
            tracing::debug!("Key material loaded across an invalidation; not cached");
        }
        Ok(material)
    }

    /// Drop the cached tuple. Subsequent `ensure_loaded` calls reload.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        let was_loaded = slot.take().is_some();
        tracing::debug!(was_loaded, "Key material cache invalidated");
    }

    /// Number of successful loader calls since construction.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}
