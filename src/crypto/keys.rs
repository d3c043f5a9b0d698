// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! P-256 key material: generation, self-signed certificate, signing handle.
//!
//! Keys are generated and used in-process with `ring`; no external key tool
//! is involved. The certificate exists so the keystore entry has the same
//! shape as a conventional key entry (key + chain) and can be inspected by
//! standard tooling after export.

use chrono::{Datelike, Months, Utc};
use p256::pkcs8::EncodePublicKey;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair as CertKeyPair};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use zeroize::Zeroizing;

use super::CryptoError;

/// Subject and issuer of the self-signed certificate.
pub const CERTIFICATE_DN: &str = "CN=JWT-EC256, OU=JWT, O=Dev, L=Seoul, ST=Seoul, C=KR";

/// Certificate validity window (10 years).
pub const CERTIFICATE_VALIDITY_MONTHS: u32 = 120;

/// Freshly generated key material, ready to be sealed into a keystore entry.
pub struct GeneratedKey {
    /// PKCS#8 v1 DER private key (includes the public key).
    pub pkcs8_der: Zeroizing<Vec<u8>>,
    /// Self-signed X.509 certificate, DER.
    pub certificate_der: Vec<u8>,
}

/// Generate a P-256 keypair and its self-signed certificate.
pub fn generate_keypair() -> Result<GeneratedKey, CryptoError> {
    let rng = SystemRandom::new();
    let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let pkcs8_der = Zeroizing::new(document.as_ref().to_vec());
    let certificate_der = self_signed_certificate(&pkcs8_der)?;

    tracing::debug!(
        pkcs8_len = pkcs8_der.len(),
        cert_len = certificate_der.len(),
        "Generated P-256 keypair"
    );

    Ok(GeneratedKey {
        pkcs8_der,
        certificate_der,
    })
}

/// Build a self-signed certificate for the given PKCS#8 key.
pub fn self_signed_certificate(pkcs8_der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key_pair =
        CertKeyPair::try_from(pkcs8_der).map_err(|e| CryptoError::Certificate(e.to_string()))?;

    let mut subject = DistinguishedName::new();
    subject.push(DnType::CommonName, "JWT-EC256");
    subject.push(DnType::OrganizationalUnitName, "JWT");
    subject.push(DnType::OrganizationName, "Dev");
    subject.push(DnType::LocalityName, "Seoul");
    subject.push(DnType::StateOrProvinceName, "Seoul");
    subject.push(DnType::CountryName, "KR");

    let now = Utc::now();
    let expires = now
        .checked_add_months(Months::new(CERTIFICATE_VALIDITY_MONTHS))
        .ok_or_else(|| CryptoError::Certificate("validity end out of range".to_string()))?;

    let mut params = CertificateParams::default();
    params.distinguished_name = subject;
    params.not_before = rcgen::date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
    params.not_after =
        rcgen::date_time_ymd(expires.year(), expires.month() as u8, expires.day() as u8);

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CryptoError::Certificate(e.to_string()))?;
    Ok(cert.der().to_vec())
}

/// Loaded signing key with its public half and certificate.
///
/// Cheap to share behind an `Arc`; `ring`'s key pair is `Send + Sync`.
pub struct KeyHandle {
    private: EcdsaKeyPair,
    public: p256::PublicKey,
    certificate_der: Vec<u8>,
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("public", &self.public)
            .field("certificate_len", &self.certificate_der.len())
            .finish_non_exhaustive()
    }
}

impl KeyHandle {
    /// Parse a PKCS#8 private key and pair it with its certificate.
    pub fn from_pkcs8(pkcs8_der: &[u8], certificate_der: Vec<u8>) -> Result<Self, CryptoError> {
        let rng = SystemRandom::new();
        let private = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8_der, &rng)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public = p256::PublicKey::from_sec1_bytes(private.public_key().as_ref())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self {
            private,
            public,
            certificate_der,
        })
    }

    /// Sign `message` with ECDSA P-256 / SHA-256. Output is ASN.1 DER.
    pub fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let rng = SystemRandom::new();
        let sig = self
            .private
            .sign(&rng, message)
            .map_err(|_| CryptoError::Signing)?;
        Ok(sig.as_ref().to_vec())
    }

    pub fn public_key(&self) -> &p256::PublicKey {
        &self.public
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// SubjectPublicKeyInfo DER.
    pub fn public_key_spki_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.public
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// PEM rendering of the public key.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        Ok(spki_to_pem(&self.public_key_spki_der()?))
    }
}

/// Render SPKI DER as `PUBLIC KEY` PEM: base64 wrapped at 64 columns,
/// LF line endings, no newline after the END line.
pub fn spki_to_pem(spki_der: &[u8]) -> String {
    let block = pem::Pem::new("PUBLIC KEY", spki_der.to_vec());
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&block, config).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::LineEnding;

    fn reference_pem(public: &p256::PublicKey) -> String {
        public.to_public_key_pem(LineEnding::LF).unwrap()
    }

    #[test]
    fn generated_key_loads_and_signs() {
        let generated = generate_keypair().unwrap();
        let handle =
            KeyHandle::from_pkcs8(&generated.pkcs8_der, generated.certificate_der.clone()).unwrap();

        let der = handle.sign_der(b"payload").unwrap();
        assert_eq!(der[0], 0x30, "signature must be a DER sequence");
        assert_eq!(handle.certificate_der(), generated.certificate_der.as_slice());
    }

    #[test]
    fn pem_is_wrapped_and_bracketed() {
        let generated = generate_keypair().unwrap();
        let handle =
            KeyHandle::from_pkcs8(&generated.pkcs8_der, generated.certificate_der).unwrap();
        let pem = handle.public_key_pem().unwrap();

        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert!(pem.ends_with("\n-----END PUBLIC KEY-----"));
        for line in pem.lines() {
            assert!(line.len() <= 64, "line too long: {line}");
        }
        assert_eq!(pem, reference_pem(handle.public_key()).trim_end());
    }

    #[test]
    fn certificate_embeds_subject() {
        let generated = generate_keypair().unwrap();
        let cert = &generated.certificate_der;
        // DER certificates are a SEQUENCE; the UTF8/printable subject strings
        // appear verbatim.
        assert_eq!(cert[0], 0x30);
        let contains = |needle: &[u8]| cert.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"JWT-EC256"));
        assert!(contains(b"Seoul"));
    }

    #[test]
    fn garbage_pkcs8_rejected() {
        let err = KeyHandle::from_pkcs8(b"not a key", Vec::new()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }
}
