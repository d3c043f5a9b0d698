// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Keystore Lifecycle
//!
//! Orchestrates provisioning, password rotation, backup/restore and forced
//! reset, and resolves the key used for signing.
//!
//! ## States
//!
//! ```text
//! Uninitialized --provision / restore--> Initialized
//! Initialized   --rotate / restore / force_reset--> Initialized
//! ```
//!
//! ## Invariants
//!
//! - Administrative transitions are serialized by one mutex.
//! - Every transition that changes the container invalidates the key cache
//!   before returning, so no later signing request sees the old key.
//! - Authentication failures reach callers as `AuthenticationFailed` only;
//!   whether the container rejected the password or is damaged goes to the
//!   logs and the audit trail.
//!
//! All operations block on file I/O and key derivation. Async callers run
//! them on the blocking pool.

pub mod validation;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, KeyHandle, SignatureError};
use crate::session::CredentialStore;
use crate::storage::{
    AuditEvent, AuditEventType, AuditLog, CachedKeyMaterial, DataStore, KeyMaterialCache,
    KeystoreError, KeystoreRepository, SetupFlag,
};
use crate::token::{TokenError, TokenIssuer, TokenRequest};

/// Lifecycle errors, as seen by callers.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// `reason` is for operators only and is not part of the message.
    #[error("Authentication failed")]
    AuthenticationFailed { reason: &'static str },

    #[error("Keystore is not set up")]
    NotProvisioned,

    #[error("Keystore is already set up")]
    AlreadyProvisioned,

    #[error("No keystore password available for this session")]
    SessionRequired,

    #[error("{0}")]
    InvalidParameters(String),

    #[error(transparent)]
    MalformedSignature(SignatureError),

    #[error("Storage failure: {0}")]
    Io(String),

    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error("{0}")]
    Disabled(&'static str),
}

impl SetupError {
    /// Operator-facing tag recorded in the audit trail.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            SetupError::AuthenticationFailed { reason } => reason,
            SetupError::NotProvisioned => "not_provisioned",
            SetupError::AlreadyProvisioned => "already_provisioned",
            SetupError::SessionRequired => "session_required",
            SetupError::InvalidParameters(_) => "invalid_parameters",
            SetupError::MalformedSignature(_) => "malformed_signature",
            SetupError::Io(_) => "io",
            SetupError::Crypto(_) => "crypto",
            SetupError::Disabled(_) => "disabled",
        }
    }
}

impl From<KeystoreError> for SetupError {
    fn from(e: KeystoreError) -> Self {
        match e {
            KeystoreError::WrongPassword | KeystoreError::Corrupt(_) => {
                let reason = e.diagnostic();
                tracing::warn!(reason, error = %e, "Keystore rejected password");
                SetupError::AuthenticationFailed { reason }
            }
            KeystoreError::NotFound => SetupError::NotProvisioned,
            KeystoreError::AlreadyExists => SetupError::AlreadyProvisioned,
            KeystoreError::Crypto(e) => SetupError::Crypto(e.to_string()),
            KeystoreError::Storage(_) | KeystoreError::Encode(_) => SetupError::Io(e.to_string()),
        }
    }
}

impl From<CryptoError> for SetupError {
    fn from(e: CryptoError) -> Self {
        SetupError::Crypto(e.to_string())
    }
}

impl From<TokenError> for SetupError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidParameters(msg) => SetupError::InvalidParameters(msg),
            TokenError::MalformedSignature(e) => SetupError::MalformedSignature(e),
            other => SetupError::Crypto(other.to_string()),
        }
    }
}

pub type SetupResult<T> = Result<T, SetupError>;

/// Public half of the active key, returned by key-changing transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySummary {
    pub public_key_pem: String,
}

/// Raw container export with a suggested file name.
#[derive(Debug, Clone)]
pub struct Backup {
    pub data: Vec<u8>,
    pub filename: String,
}

/// A signed token and the PEM key that verifies it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub jwt: String,
    pub public_key_pem: String,
}

/// Keystore lifecycle coordinator.
pub struct SetupLifecycle {
    keystore: KeystoreRepository,
    flag: SetupFlag,
    audit: AuditLog,
    cache: KeyMaterialCache,
    credentials: Arc<CredentialStore>,
    issuer: TokenIssuer,
    env_password: Option<Zeroizing<String>>,
    admin_lock: Mutex<()>,
}

impl SetupLifecycle {
    pub fn new(store: DataStore, credentials: Arc<CredentialStore>) -> Self {
        Self {
            keystore: KeystoreRepository::new(store.clone()),
            flag: SetupFlag::new(store.clone()),
            audit: AuditLog::new(store),
            cache: KeyMaterialCache::new(),
            credentials,
            issuer: TokenIssuer::new(),
            env_password: None,
            admin_lock: Mutex::new(()),
        }
    }

    /// PBKDF2 work factor for newly written containers.
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.keystore =
            KeystoreRepository::with_kdf_iterations(self.keystore.store().clone(), iterations);
        self
    }

    /// Deployment-level password used for signing loads ahead of any
    /// session passphrase. Empty values are ignored.
    pub fn with_env_password(mut self, password: Option<Zeroizing<String>>) -> Self {
        self.env_password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn cache(&self) -> &KeyMaterialCache {
        &self.cache
    }

    pub fn store(&self) -> &DataStore {
        self.keystore.store()
    }

    pub fn is_provisioned(&self) -> bool {
        self.flag.is_set()
    }

    // ========== Administrative transitions ==========

    /// First-time setup: create the container with a fresh keypair.
    ///
    /// A container left behind without the setup flag (interrupted earlier
    /// provisioning) is moved to the reset snapshot and replaced.
    pub fn provision(
        &self,
        session_id: &str,
        password: Option<&str>,
        confirm_password: Option<&str>,
    ) -> SetupResult<KeySummary> {
        self.audited(AuditEventType::KeystoreProvisioned, Some(session_id), || {
            let password = validation::validate_provision(password, confirm_password)?;
            let _admin = self.lock_admin();

            if self.flag.is_set() {
                return Err(SetupError::AlreadyProvisioned);
            }

            let handle = if self.keystore.exists() {
                tracing::warn!("Keystore present without setup flag; replacing it");
                self.keystore.force_reset(password)?
            } else {
                self.keystore.create(password)?;
                self.keystore.generate_and_store_keypair(password)?
            };

            self.flag.mark().map_err(|e| SetupError::Io(e.to_string()))?;
            self.commit_session(session_id, password);
            tracing::info!("Keystore provisioned");
            summarize(&handle)
        })
    }

    /// Re-seal the container under a new password. The keypair is kept.
    pub fn rotate(
        &self,
        session_id: &str,
        current_password: Option<&str>,
        new_password: Option<&str>,
        confirm_password: Option<&str>,
    ) -> SetupResult<()> {
        self.audited(AuditEventType::PasswordRotated, Some(session_id), || {
            let (current, new_password) =
                validation::validate_rotation(current_password, new_password, confirm_password)?;
            let _admin = self.lock_admin();
            self.require_provisioned()?;

            self.keystore.rotate_password(current, new_password)?;
            self.commit_session(session_id, new_password);
            tracing::info!("Keystore password rotated");
            Ok(())
        })
    }

    /// Export the raw container after checking `password` opens it.
    pub fn backup(&self, session_id: Option<&str>, password: Option<&str>) -> SetupResult<Backup> {
        self.audited(AuditEventType::BackupExported, session_id, || {
            let password = validation::validate_backup(password)?;
            let _admin = self.lock_admin();
            self.require_provisioned()?;

            self.keystore.open(password)?;
            let data = self.keystore.export_bytes()?;
            Ok(Backup {
                data,
                filename: backup_filename(),
            })
        })
    }

    /// Replace the container with a backup. Allowed before provisioning,
    /// in which case the restored container becomes the provisioned one.
    pub fn restore(
        &self,
        session_id: &str,
        data: Option<&str>,
        password: Option<&str>,
    ) -> SetupResult<KeySummary> {
        self.audited(AuditEventType::BackupRestored, Some(session_id), || {
            let (bytes, password) = validation::validate_restore(data, password)?;
            let _admin = self.lock_admin();

            let handle = self.keystore.import_bytes(&bytes, password)?;
            if !self.flag.is_set() {
                self.flag.mark().map_err(|e| SetupError::Io(e.to_string()))?;
            }
            self.commit_session(session_id, password);
            tracing::info!(len = bytes.len(), "Keystore restored from backup");
            summarize(&handle)
        })
    }

    /// Replace the keypair. `admin_password` must open the current container.
    pub fn force_reset(
        &self,
        session_id: &str,
        admin_password: Option<&str>,
        new_password: Option<&str>,
        confirm_password: Option<&str>,
    ) -> SetupResult<KeySummary> {
        self.audited(AuditEventType::KeystoreReset, Some(session_id), || {
            let (admin, new_password) =
                validation::validate_reset(admin_password, new_password, confirm_password)?;
            let _admin = self.lock_admin();
            self.require_provisioned()?;

            self.keystore.open(admin)?;
            let handle = self.keystore.force_reset(new_password)?;
            self.flag.mark().map_err(|e| SetupError::Io(e.to_string()))?;
            self.commit_session(session_id, new_password);
            tracing::warn!("Keystore force-reset with a new keypair");
            summarize(&handle)
        })
    }

    /// Full teardown without re-provisioning. Not offered.
    pub fn destroy(&self, session_id: Option<&str>) -> SetupResult<()> {
        self.audited(AuditEventType::DestructiveResetRejected, session_id, || {
            Err(SetupError::Disabled(
                "Deleting the keystore is no longer supported; use force reset",
            ))
        })
    }

    // ========== Signing ==========

    /// Sign a token with the active key.
    ///
    /// On a cache miss the container is opened with `KEYSTORE_PASSWORD`
    /// when configured, else with the session's passphrase.
    pub fn issue(
        &self,
        session_id: Option<&str>,
        exp: &str,
        iss: &str,
        sub: &str,
    ) -> SetupResult<IssuedToken> {
        if !self.is_provisioned() {
            return Err(SetupError::NotProvisioned);
        }
        let request = TokenRequest::parse(exp, iss, sub)?;

        let material = self.signing_material(session_id)?;
        let jwt = self.issuer.issue_request(&request, material.handle())?;
        Ok(IssuedToken {
            jwt,
            public_key_pem: material.public_key_pem().to_string(),
        })
    }

    fn signing_material(&self, session_id: Option<&str>) -> SetupResult<Arc<CachedKeyMaterial>> {
        self.cache.ensure_loaded(|| {
            let password = self.signing_password(session_id)?;
            Ok(self.keystore.open(&password)?)
        })
    }

    fn signing_password(&self, session_id: Option<&str>) -> SetupResult<Zeroizing<String>> {
        if let Some(password) = &self.env_password {
            return Ok(password.clone());
        }
        session_id
            .and_then(|id| self.credentials.get(id))
            .ok_or(SetupError::SessionRequired)
    }

    // ========== Helpers ==========

    fn lock_admin(&self) -> std::sync::MutexGuard<'_, ()> {
        self.admin_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_provisioned(&self) -> SetupResult<()> {
        if self.flag.is_set() {
            Ok(())
        } else {
            Err(SetupError::NotProvisioned)
        }
    }

    /// Remember the new passphrase for the session and drop the cached key.
    fn commit_session(&self, session_id: &str, password: &str) {
        self.credentials
            .store(session_id, Zeroizing::new(password.to_string()));
        self.cache.invalidate();
    }

    fn audited<T>(
        &self,
        event_type: AuditEventType,
        session_id: Option<&str>,
        op: impl FnOnce() -> SetupResult<T>,
    ) -> SetupResult<T> {
        let result = op();
        let mut event = AuditEvent::new(event_type).with_session(session_id);
        if let Err(e) = &result {
            event = event.failed(e.diagnostic());
        }
        self.audit.record(event);
        result
    }
}

fn summarize(handle: &KeyHandle) -> SetupResult<KeySummary> {
    Ok(KeySummary {
        public_key_pem: handle.public_key_pem()?,
    })
}

/// Suggested download name, e.g. `keystore-2026-01-15.p8ks`.
pub fn backup_filename() -> String {
    format!("keystore-{}.p8ks", Utc::now().format("%Y-%m-%d"))
}
