// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-scoped passphrase handling.
//!
//! - [`credentials`]: the in-memory `CredentialStore`
//! - [`extractor`]: `SessionId` from the `x-session-id` header
//! - [`sweeper`]: periodic purge of expired entries

pub mod credentials;
pub mod extractor;
pub mod sweeper;

pub use credentials::{CredentialStore, PassphraseHandle, DEFAULT_SESSION_TTL};
pub use extractor::{SessionId, SESSION_HEADER};
pub use sweeper::SessionSweeper;
