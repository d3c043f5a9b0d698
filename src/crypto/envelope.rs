// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Passphrase-based sealing: PBKDF2-HMAC-SHA256 key derivation feeding
//! AES-256-GCM.
//!
//! A [`SealedBox`] carries everything needed to reopen it except the
//! passphrase. Each seal draws a fresh salt and nonce, so sealing the same
//! plaintext twice never yields the same bytes.

use std::num::NonZeroU32;

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::CryptoError;

/// KDF identifier recorded in sealed boxes.
pub const KDF_ALGORITHM: &str = "PBKDF2-HMAC-SHA256";

/// Default PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// KDF parameters stored next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub iterations: u32,
    /// Base64 salt
    pub salt: String,
}

/// Ciphertext plus the parameters to reopen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    pub kdf: KdfParams,
    /// Base64 96-bit GCM nonce
    pub nonce: String,
    /// Base64 ciphertext with appended tag
    pub ciphertext: String,
}

/// Encrypt `plaintext` under a key derived from `passphrase`.
///
/// `aad` binds the box to its context (e.g. container vs key entry) so a
/// ciphertext lifted from one slot will not open in another.
pub fn seal(
    passphrase: &str,
    plaintext: &[u8],
    aad: &[u8],
    iterations: u32,
) -> Result<SealedBox, CryptoError> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| CryptoError::Envelope("KDF iterations must be non-zero".to_string()))?;

    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| CryptoError::Random)?;
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce).map_err(|_| CryptoError::Random)?;

    let key = derive_key(passphrase, &salt, iterations)?;
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce),
        Aad::from(aad),
        &mut in_out,
    )
    .map_err(|_| CryptoError::Envelope("AES-GCM seal failed".to_string()))?;

    Ok(SealedBox {
        kdf: KdfParams {
            algorithm: KDF_ALGORITHM.to_string(),
            iterations: iterations.get(),
            salt: Base64::encode_string(&salt),
        },
        nonce: Base64::encode_string(&nonce),
        ciphertext: Base64::encode_string(&in_out),
    })
}

/// Decrypt a sealed box.
///
/// Returns [`CryptoError::Decrypt`] when the tag does not verify, which is
/// what a wrong passphrase looks like. Structural problems (bad base64,
/// unknown KDF) are [`CryptoError::Envelope`].
pub fn open(
    passphrase: &str,
    sealed: &SealedBox,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if sealed.kdf.algorithm != KDF_ALGORITHM {
        return Err(CryptoError::Envelope(format!(
            "unsupported KDF: {}",
            sealed.kdf.algorithm
        )));
    }
    let iterations = NonZeroU32::new(sealed.kdf.iterations)
        .ok_or_else(|| CryptoError::Envelope("KDF iterations must be non-zero".to_string()))?;

    let salt = decode_field("salt", &sealed.kdf.salt)?;
    let nonce_bytes = decode_field("nonce", &sealed.nonce)?;
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
        .map_err(|_| CryptoError::Envelope("nonce has wrong length".to_string()))?;
    let mut in_out = Zeroizing::new(decode_field("ciphertext", &sealed.ciphertext)?);

    let key = derive_key(passphrase, &salt, iterations)?;
    let plain_len = key
        .open_in_place(nonce, Aad::from(aad), in_out.as_mut_slice())
        .map_err(|_| CryptoError::Decrypt)?
        .len();
    in_out.truncate(plain_len);
    Ok(in_out)
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    iterations: NonZeroU32,
) -> Result<LessSafeKey, CryptoError> {
    let mut key_bytes = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        passphrase.as_bytes(),
        &mut key_bytes[..],
    );
    let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes[..])
        .map_err(|_| CryptoError::Envelope("invalid AES key length".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    Base64::decode_vec(value)
        .map_err(|e| CryptoError::Envelope(format!("{name} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn seal_then_open() {
        let sealed = seal("hunter2-hunter2", b"secret material", b"ctx", TEST_ITERATIONS).unwrap();
        let plain = open("hunter2-hunter2", &sealed, b"ctx").unwrap();
        assert_eq!(plain.as_slice(), b"secret material");
        assert_eq!(sealed.kdf.iterations, TEST_ITERATIONS);
        assert_eq!(sealed.kdf.algorithm, KDF_ALGORITHM);
    }

    #[test]
    fn wrong_passphrase_is_decrypt_error() {
        let sealed = seal("right-password", b"data", b"ctx", TEST_ITERATIONS).unwrap();
        let err = open("wrong-password", &sealed, b"ctx").unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt));
    }

    #[test]
    fn aad_mismatch_fails() {
        let sealed = seal("pw-pw-pw-pw", b"data", b"container", TEST_ITERATIONS).unwrap();
        assert!(matches!(
            open("pw-pw-pw-pw", &sealed, b"entry"),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn fresh_salt_and_nonce_each_time() {
        let a = seal("pw-pw-pw-pw", b"data", b"ctx", TEST_ITERATIONS).unwrap();
        let b = seal("pw-pw-pw-pw", b"data", b"ctx", TEST_ITERATIONS).unwrap();
        assert_ne!(a.kdf.salt, b.kdf.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn structural_damage_is_envelope_error() {
        let mut sealed = seal("pw-pw-pw-pw", b"data", b"ctx", TEST_ITERATIONS).unwrap();
        sealed.nonce = "!!not base64!!".to_string();
        assert!(matches!(
            open("pw-pw-pw-pw", &sealed, b"ctx"),
            Err(CryptoError::Envelope(_))
        ));

        let mut sealed = seal("pw-pw-pw-pw", b"data", b"ctx", TEST_ITERATIONS).unwrap();
        sealed.kdf.algorithm = "scrypt".to_string();
        assert!(matches!(
            open("pw-pw-pw-pw", &sealed, b"ctx"),
            Err(CryptoError::Envelope(_))
        ));
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(seal("pw-pw-pw-pw", b"data", b"ctx", 0).is_err());
    }
}
