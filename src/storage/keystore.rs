// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted keystore container holding the single signing keypair.
//!
//! ## File layout
//!
//! ```text
//! { "format": "es256-keystore", "version": 1,
//!   "kdf": {...}, "nonce": "...", "ciphertext": "..." }      <- store password
//!         └─ { "entries": [ { "alias": "ec256-jwt",
//!                             "created_at": "...",
//!                             "key": { "kdf": ..., ... },    <- key password
//!                             "certificate_chain": ["<b64 DER>"] } ] }
//! ```
//!
//! Store password and key password are the same value after every write.
//!
//! ## Locking
//!
//! One `RwLock` per repository guards the container file: opens and
//! password checks share it, mutations take it exclusively.

use std::sync::{PoisonError, RwLock};

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::envelope::{self, SealedBox, DEFAULT_KDF_ITERATIONS};
use crate::crypto::keys::{generate_keypair, GeneratedKey, KeyHandle};
use crate::crypto::CryptoError;

use super::fs::{DataStore, StorageError};

/// Alias of the only entry the container may hold.
pub const KEY_ALIAS: &str = "ec256-jwt";

/// `format` marker of the container file.
pub const CONTAINER_FORMAT: &str = "es256-keystore";

/// Current container version.
pub const CONTAINER_VERSION: u32 = 1;

const CONTAINER_AAD: &[u8] = b"es256-keystore/container";
const ENTRY_AAD: &[u8] = b"es256-keystore/entry";

/// Keystore errors.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("Keystore not found")]
    NotFound,

    #[error("Keystore already exists")]
    AlreadyExists,

    /// Either encryption layer rejected the password.
    #[error("Wrong keystore password")]
    WrongPassword,

    #[error("Keystore is corrupt: {0}")]
    Corrupt(String),

    #[error("Keystore storage error: {0}")]
    Storage(StorageError),

    #[error("Keystore crypto error: {0}")]
    Crypto(CryptoError),

    #[error("Keystore encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StorageError> for KeystoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => KeystoreError::NotFound,
            other => KeystoreError::Storage(other),
        }
    }
}

impl From<CryptoError> for KeystoreError {
    fn from(e: CryptoError) -> Self {
        KeystoreError::Crypto(e)
    }
}

impl KeystoreError {
    /// Short tag for logs and audit records.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            KeystoreError::NotFound => "not_found",
            KeystoreError::AlreadyExists => "already_exists",
            KeystoreError::WrongPassword => "wrong_password",
            KeystoreError::Corrupt(_) => "corrupt",
            KeystoreError::Storage(_) => "io",
            KeystoreError::Crypto(_) => "crypto",
            KeystoreError::Encode(_) => "encode",
        }
    }
}

pub type KeystoreResult<T> = Result<T, KeystoreError>;

/// Outer file, sealed under the store password.
#[derive(Debug, Serialize, Deserialize)]
struct ContainerFile {
    format: String,
    version: u32,
    #[serde(flatten)]
    sealed: SealedBox,
}

/// Decrypted container contents.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ContainerBody {
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    alias: String,
    created_at: DateTime<Utc>,
    /// PKCS#8 private key sealed under the key password
    key: SealedBox,
    /// Base64 DER certificates, leaf first
    certificate_chain: Vec<String>,
}

/// An entry with its private key unsealed.
struct UnsealedEntry {
    created_at: DateTime<Utc>,
    pkcs8_der: Zeroizing<Vec<u8>>,
    certificate_der: Vec<u8>,
}

/// Repository for the keystore container file.
#[derive(Debug)]
pub struct KeystoreRepository {
    store: DataStore,
    kdf_iterations: u32,
    file_lock: RwLock<()>,
}

impl KeystoreRepository {
    pub fn new(store: DataStore) -> Self {
        Self::with_kdf_iterations(store, DEFAULT_KDF_ITERATIONS)
    }

    /// Use a custom PBKDF2 work factor for new writes. Existing files keep
    /// the count they were written with.
    pub fn with_kdf_iterations(store: DataStore, kdf_iterations: u32) -> Self {
        Self {
            store,
            kdf_iterations,
            file_lock: RwLock::new(()),
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Whether a container file is present.
    pub fn exists(&self) -> bool {
        let _guard = self.file_lock.read().unwrap_or_else(PoisonError::into_inner);
        self.store.exists(self.store.paths().keystore())
    }

    /// Write an empty container sealed with `password`.
    pub fn create(&self, password: &str) -> KeystoreResult<()> {
        let _guard = self.file_lock.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.store.paths().keystore();
        if self.store.exists(&path) {
            return Err(KeystoreError::AlreadyExists);
        }

        let bytes = self.encode_container(password, &ContainerBody::default())?;
        self.store.write_atomic(&path, &bytes)?;
        tracing::info!(path = %path.display(), "Created empty keystore");
        Ok(())
    }

    /// Generate a keypair and store it as the container's only entry.
    ///
    /// The container must exist and open under `password`. The file is
    /// replaced in one rename, so a failure leaves the previous file intact.
    pub fn generate_and_store_keypair(&self, password: &str) -> KeystoreResult<KeyHandle> {
        let _guard = self.file_lock.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.store.paths().keystore();
        let current = self.store.read_raw(&path)?;
        decode_body(&current, password)?;

        let generated = generate_keypair()?;
        let handle = self.write_fresh_entry(password, generated)?;
        tracing::info!(alias = KEY_ALIAS, "Stored new keypair in keystore");
        Ok(handle)
    }

    /// Open the container and load its signing key.
    pub fn open(&self, password: &str) -> KeystoreResult<KeyHandle> {
        let _guard = self.file_lock.read().unwrap_or_else(PoisonError::into_inner);
        let bytes = self.store.read_raw(self.store.paths().keystore())?;
        let entry = load_entry(&bytes, password)?;
        Ok(KeyHandle::from_pkcs8(&entry.pkcs8_der, entry.certificate_der)?)
    }

    /// True when `password` opens the container and its key entry.
    ///
    /// Any failure reads as `false`; callers needing the reason use `open`.
    pub fn verify_password(&self, password: &str) -> bool {
        self.open(password).is_ok()
    }

    /// Re-seal the existing entry under `new_password`.
    ///
    /// Order: authenticate with `old_password`, snapshot the live file to
    /// `.backup`, write the re-sealed container. The keypair is untouched.
    pub fn rotate_password(&self, old_password: &str, new_password: &str) -> KeystoreResult<()> {
        let _guard = self.file_lock.write().unwrap_or_else(PoisonError::into_inner);
        let paths = self.store.paths();
        let path = paths.keystore();

        let current = self.store.read_raw(&path)?;
        let entry = load_entry(&current, old_password)?;

        self.store.snapshot(&path, paths.keystore_backup())?;

        let stored = self.seal_entry(new_password, &entry)?;
        let bytes = self.encode_container(new_password, &ContainerBody { entries: vec![stored] })?;
        self.store.write_atomic(&path, &bytes)?;

        tracing::info!(alias = KEY_ALIAS, "Rotated keystore password");
        Ok(())
    }

    /// Raw container bytes.
    pub fn export_bytes(&self) -> KeystoreResult<Vec<u8>> {
        let _guard = self.file_lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.store.read_raw(self.store.paths().keystore())?)
    }

    /// Replace the live container with `bytes`.
    ///
    /// The incoming bytes must open under `password` before anything on
    /// disk changes. An existing live file is snapshotted to `.backup`.
    pub fn import_bytes(&self, bytes: &[u8], password: &str) -> KeystoreResult<KeyHandle> {
        let entry = load_entry(bytes, password)?;
        let handle = KeyHandle::from_pkcs8(&entry.pkcs8_der, entry.certificate_der)?;

        let _guard = self.file_lock.write().unwrap_or_else(PoisonError::into_inner);
        let paths = self.store.paths();
        let path = paths.keystore();
        if self.store.exists(&path) {
            self.store.snapshot(&path, paths.keystore_backup())?;
        }
        self.store.write_atomic(&path, bytes)?;

        tracing::info!(len = bytes.len(), "Imported keystore");
        Ok(handle)
    }

    /// Snapshot any live container to `.reset-backup`, then replace it with
    /// a fresh keypair sealed under `password`.
    pub fn force_reset(&self, password: &str) -> KeystoreResult<KeyHandle> {
        let _guard = self.file_lock.write().unwrap_or_else(PoisonError::into_inner);
        let paths = self.store.paths();
        let path = paths.keystore();
        if self.store.exists(&path) {
            self.store.snapshot(&path, paths.keystore_reset_backup())?;
        }

        let generated = generate_keypair()?;
        let handle = self.write_fresh_entry(password, generated)?;
        tracing::warn!(alias = KEY_ALIAS, "Keystore reset with a new keypair");
        Ok(handle)
    }

    /// Seal `generated` and write it as the sole entry. Caller holds the write lock.
    fn write_fresh_entry(&self, password: &str, generated: GeneratedKey) -> KeystoreResult<KeyHandle> {
        let entry = UnsealedEntry {
            created_at: Utc::now(),
            pkcs8_der: generated.pkcs8_der,
            certificate_der: generated.certificate_der,
        };
        let stored = self.seal_entry(password, &entry)?;
        let bytes = self.encode_container(password, &ContainerBody { entries: vec![stored] })?;
        self.store.write_atomic(self.store.paths().keystore(), &bytes)?;
        Ok(KeyHandle::from_pkcs8(&entry.pkcs8_der, entry.certificate_der)?)
    }

    fn seal_entry(&self, password: &str, entry: &UnsealedEntry) -> KeystoreResult<StoredEntry> {
        let key = envelope::seal(password, &entry.pkcs8_der, ENTRY_AAD, self.kdf_iterations)?;
        Ok(StoredEntry {
            alias: KEY_ALIAS.to_string(),
            created_at: entry.created_at,
            key,
            certificate_chain: vec![Base64::encode_string(&entry.certificate_der)],
        })
    }

    fn encode_container(&self, password: &str, body: &ContainerBody) -> KeystoreResult<Vec<u8>> {
        let plaintext = Zeroizing::new(serde_json::to_vec(body)?);
        let sealed = envelope::seal(password, &plaintext, CONTAINER_AAD, self.kdf_iterations)?;
        let file = ContainerFile {
            format: CONTAINER_FORMAT.to_string(),
            version: CONTAINER_VERSION,
            sealed,
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }
}

fn decode_body(bytes: &[u8], password: &str) -> KeystoreResult<ContainerBody> {
    let file: ContainerFile = serde_json::from_slice(bytes)
        .map_err(|e| KeystoreError::Corrupt(format!("container is not valid JSON: {e}")))?;
    if file.format != CONTAINER_FORMAT {
        return Err(KeystoreError::Corrupt(format!(
            "unknown container format: {}",
            file.format
        )));
    }
    if file.version != CONTAINER_VERSION {
        return Err(KeystoreError::Corrupt(format!(
            "unsupported container version: {}",
            file.version
        )));
    }

    let plaintext = envelope::open(password, &file.sealed, CONTAINER_AAD).map_err(open_error)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| KeystoreError::Corrupt(format!("container body is not valid JSON: {e}")))
}

fn load_entry(bytes: &[u8], password: &str) -> KeystoreResult<UnsealedEntry> {
    let body = decode_body(bytes, password)?;
    if body.entries.len() > 1 {
        return Err(KeystoreError::Corrupt(format!(
            "expected one entry, found {}",
            body.entries.len()
        )));
    }
    let stored = body
        .entries
        .into_iter()
        .find(|entry| entry.alias == KEY_ALIAS)
        .ok_or_else(|| KeystoreError::Corrupt(format!("no entry with alias {KEY_ALIAS}")))?;

    let pkcs8_der = envelope::open(password, &stored.key, ENTRY_AAD).map_err(open_error)?;
    let leaf = stored
        .certificate_chain
        .first()
        .ok_or_else(|| KeystoreError::Corrupt("empty certificate chain".to_string()))?;
    let certificate_der = Base64::decode_vec(leaf)
        .map_err(|e| KeystoreError::Corrupt(format!("certificate is not valid base64: {e}")))?;

    Ok(UnsealedEntry {
        created_at: stored.created_at,
        pkcs8_der,
        certificate_der,
    })
}

fn open_error(e: CryptoError) -> KeystoreError {
    match e {
        CryptoError::Decrypt => KeystoreError::WrongPassword,
        other => KeystoreError::Corrupt(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    const TEST_ITERATIONS: u32 = 1_000;

    fn test_repo() -> (tempfile::TempDir, KeystoreRepository) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::new(StoragePaths::new(dir.path()));
        store.initialize().unwrap();
        (dir, KeystoreRepository::with_kdf_iterations(store, TEST_ITERATIONS))
    }

    fn provisioned(password: &str) -> (tempfile::TempDir, KeystoreRepository) {
        let (dir, repo) = test_repo();
        repo.create(password).unwrap();
        repo.generate_and_store_keypair(password).unwrap();
        (dir, repo)
    }

    fn live_bytes(repo: &KeystoreRepository) -> Vec<u8> {
        std::fs::read(repo.store().paths().keystore()).unwrap()
    }

    #[test]
    fn create_twice_fails() {
        let (_dir, repo) = test_repo();
        repo.create("password-1").unwrap();
        assert!(matches!(
            repo.create("password-1"),
            Err(KeystoreError::AlreadyExists)
        ));
    }

    #[test]
    fn open_after_generate() {
        let (_dir, repo) = provisioned("password-1");
        let handle = repo.open("password-1").unwrap();
        assert!(!handle.certificate_der().is_empty());
        assert!(repo.verify_password("password-1"));
        assert!(!repo.verify_password("password-2"));
    }

    #[test]
    fn open_distinguishes_failures() {
        let (_dir, repo) = test_repo();
        assert!(matches!(repo.open("pw"), Err(KeystoreError::NotFound)));

        repo.create("password-1").unwrap();
        // Created but not populated: no key entry to load.
        assert!(matches!(
            repo.open("password-1"),
            Err(KeystoreError::Corrupt(_))
        ));
        assert!(matches!(
            repo.open("password-2"),
            Err(KeystoreError::WrongPassword)
        ));

        std::fs::write(repo.store().paths().keystore(), b"garbage").unwrap();
        assert!(matches!(
            repo.open("password-1"),
            Err(KeystoreError::Corrupt(_))
        ));
    }

    #[test]
    fn generate_requires_container_password() {
        let (_dir, repo) = test_repo();
        repo.create("password-1").unwrap();
        let before = live_bytes(&repo);

        assert!(matches!(
            repo.generate_and_store_keypair("password-2"),
            Err(KeystoreError::WrongPassword)
        ));
        assert_eq!(live_bytes(&repo), before);
    }

    #[test]
    fn rotate_rewraps_same_key() {
        let (_dir, repo) = provisioned("old-password");
        let before = live_bytes(&repo);
        let original = repo.open("old-password").unwrap();

        repo.rotate_password("old-password", "new-password").unwrap();

        let rotated = repo.open("new-password").unwrap();
        assert_eq!(rotated.public_key(), original.public_key());
        assert_eq!(rotated.certificate_der(), original.certificate_der());
        assert!(matches!(
            repo.open("old-password"),
            Err(KeystoreError::WrongPassword)
        ));

        let backup = std::fs::read(repo.store().paths().keystore_backup()).unwrap();
        assert_eq!(backup, before);
    }

    #[test]
    fn rotate_keeps_store_and_key_passwords_equal() {
        let (_dir, repo) = provisioned("old-password");
        repo.rotate_password("old-password", "new-password").unwrap();

        let bytes = live_bytes(&repo);
        let body = decode_body(&bytes, "new-password").unwrap();
        let entry = &body.entries[0];
        assert!(envelope::open("new-password", &entry.key, ENTRY_AAD).is_ok());
        assert!(envelope::open("old-password", &entry.key, ENTRY_AAD).is_err());
    }

    #[test]
    fn rotate_with_wrong_password_changes_nothing() {
        let (_dir, repo) = provisioned("password-a");
        let before = live_bytes(&repo);

        assert!(matches!(
            repo.rotate_password("password-b", "password-c"),
            Err(KeystoreError::WrongPassword)
        ));
        assert_eq!(live_bytes(&repo), before);
        assert!(!repo.store().paths().keystore_backup().exists());
        assert!(repo.verify_password("password-a"));
    }

    #[test]
    fn import_verifies_before_overwrite() {
        let (_dir, repo) = provisioned("password-1");
        let exported = repo.export_bytes().unwrap();
        let before = live_bytes(&repo);

        assert!(matches!(
            repo.import_bytes(&exported, "password-2"),
            Err(KeystoreError::WrongPassword)
        ));
        assert!(matches!(
            repo.import_bytes(b"not a keystore", "password-1"),
            Err(KeystoreError::Corrupt(_))
        ));
        assert_eq!(live_bytes(&repo), before);
        assert!(!repo.store().paths().keystore_backup().exists());

        repo.import_bytes(&exported, "password-1").unwrap();
        assert_eq!(live_bytes(&repo), exported);
        assert!(repo.store().paths().keystore_backup().exists());
    }

    #[test]
    fn import_into_empty_directory() {
        let (_src_dir, source) = provisioned("password-1");
        let exported = source.export_bytes().unwrap();

        let (_dir, repo) = test_repo();
        let handle = repo.import_bytes(&exported, "password-1").unwrap();
        assert_eq!(
            handle.public_key(),
            repo.open("password-1").unwrap().public_key()
        );
        assert!(!repo.store().paths().keystore_backup().exists());
    }

    #[test]
    fn force_reset_snapshots_and_regenerates() {
        let (_dir, repo) = provisioned("password-1");
        let before = live_bytes(&repo);
        let original = repo.open("password-1").unwrap();

        let fresh = repo.force_reset("password-2").unwrap();

        assert_ne!(fresh.public_key(), original.public_key());
        assert!(repo.verify_password("password-2"));
        assert!(!repo.verify_password("password-1"));
        let snapshot = std::fs::read(repo.store().paths().keystore_reset_backup()).unwrap();
        assert_eq!(snapshot, before);
    }

    #[test]
    fn container_records_format_and_kdf() {
        let (_dir, repo) = provisioned("password-1");
        let json: serde_json::Value = serde_json::from_slice(&live_bytes(&repo)).unwrap();
        assert_eq!(json["format"], CONTAINER_FORMAT);
        assert_eq!(json["version"], CONTAINER_VERSION);
        assert_eq!(json["kdf"]["iterations"], TEST_ITERATIONS);
        assert!(json.get("entries").is_none(), "entries must be encrypted");
    }
}
