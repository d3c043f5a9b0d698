// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the token server, all under one data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   keystore.p8ks                # Encrypted keystore container
//!   keystore.p8ks.backup         # Snapshot before rotation / restore
//!   keystore.p8ks.reset-backup   # Snapshot before forced reset
//!   setup-completed.flag         # Present once provisioned
//!   audit/
//!     {date}/events.jsonl        # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - The container is the only file holding key material, and it is
//!   encrypted at rest with the keystore password
//! - Writes go through temp file + rename
//! - Passwords never reach disk in any form other than as KDF input

pub mod audit;
pub mod fs;
pub mod key_cache;
pub mod keystore;
pub mod paths;
pub mod setup_flag;

pub use audit::{AuditEvent, AuditEventType, AuditLog};
pub use fs::{DataStore, StorageError, StorageResult};
pub use key_cache::{CachedKeyMaterial, KeyMaterialCache};
pub use keystore::{KeystoreError, KeystoreRepository, KEY_ALIAS};
pub use paths::StoragePaths;
pub use setup_flag::SetupFlag;
