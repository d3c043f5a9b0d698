// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cryptographic building blocks.
//!
//! - [`signature`]: DER <-> JWS `r || s` transcoding
//! - [`envelope`]: passphrase sealing (PBKDF2 + AES-256-GCM)
//! - [`keys`]: P-256 key generation, certificate, signing handle

pub mod envelope;
pub mod keys;
pub mod signature;

pub use keys::{generate_keypair, GeneratedKey, KeyHandle};
pub use signature::{to_der_signature, to_jwt_signature, SignatureError};

/// Errors raised by the primitives in this module.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("System random source failed")]
    Random,

    #[error("Invalid sealed envelope: {0}")]
    Envelope(String),

    /// AEAD tag did not verify. A wrong passphrase surfaces as this.
    #[error("Decryption failed")]
    Decrypt,

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Certificate generation failed: {0}")]
    Certificate(String),

    #[error("Signing failed")]
    Signing,
}
