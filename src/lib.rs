// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ES256 Token Server - keystore-backed JWT issuer
//!
//! Issues ES256 (ECDSA P-256) JWTs from a single keypair kept in a
//! password-encrypted keystore file, and administers that keystore.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `crypto` - Envelope encryption, P-256 keys, JWS signature transcoding
//! - `session` - Per-session keystore passphrases and the `x-session-id` extractor
//! - `setup` - Keystore lifecycle: provision, rotate, backup, restore, reset
//! - `storage` - Data directory, keystore container, setup flag, audit log
//! - `token` - JWT assembly and verification

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod session;
pub mod setup;
pub mod state;
pub mod storage;
pub mod token;
