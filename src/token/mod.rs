// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compact ES256 JWT assembly and verification.
//!
//! ```text
//! base64url({"alg":"ES256","typ":"JWT"}) . base64url({exp,iss,sub,iat}) . base64url(r || s)
//! ```
//!
//! All segments are base64url without padding. The signature is ECDSA P-256
//! over SHA-256 of `header.payload`, transcoded from DER to the fixed 64-byte
//! form.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};
use serde::{Deserialize, Serialize};

use crate::crypto::signature::{to_der_signature, to_jwt_signature, SignatureError};
use crate::crypto::{CryptoError, KeyHandle};

/// JOSE algorithm identifier.
pub const ALGORITHM: &str = "ES256";

/// JOSE type identifier.
pub const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Signing failed: {0}")]
    Signing(#[from] CryptoError),

    #[error(transparent)]
    MalformedSignature(#[from] SignatureError),

    #[error("Serialization failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("Token signature does not verify")]
    BadSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    pub typ: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

/// Token payload. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub exp: i64,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
}

/// Validated issue parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub exp: i64,
    pub iss: String,
    pub sub: String,
}

impl TokenRequest {
    /// Check raw parameters: `exp` must parse as an integer, `iss` and `sub`
    /// must be non-empty.
    pub fn parse(exp: &str, iss: &str, sub: &str) -> Result<Self, TokenError> {
        let exp = exp
            .parse::<i64>()
            .map_err(|_| TokenError::InvalidParameters("exp must be an integer".to_string()))?;
        if iss.is_empty() {
            return Err(TokenError::InvalidParameters("iss is required".to_string()));
        }
        if sub.is_empty() {
            return Err(TokenError::InvalidParameters("sub is required".to_string()));
        }

        Ok(Self {
            exp,
            iss: iss.to_string(),
            sub: sub.to_string(),
        })
    }
}

/// Builds and checks compact ES256 tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenIssuer;

impl TokenIssuer {
    pub fn new() -> Self {
        Self
    }

    /// Validate raw parameters and sign a token with `key`.
    pub fn issue(&self, exp: &str, iss: &str, sub: &str, key: &KeyHandle) -> Result<String, TokenError> {
        let request = TokenRequest::parse(exp, iss, sub)?;
        self.issue_request(&request, key)
    }

    /// Sign a token for already validated parameters. `iat` is now.
    pub fn issue_request(&self, request: &TokenRequest, key: &KeyHandle) -> Result<String, TokenError> {
        let claims = Claims {
            exp: request.exp,
            iss: request.iss.clone(),
            sub: request.sub.clone(),
            iat: Utc::now().timestamp(),
        };

        let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&Header::default())?);
        let payload_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&claims)?);
        let signing_input = format!("{header_b64}.{payload_b64}");

        let der = key.sign_der(signing_input.as_bytes())?;
        let signature = to_jwt_signature(&der)?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        tracing::debug!(iss = %claims.iss, sub = %claims.sub, exp = claims.exp, "Issued token");
        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Check a compact token's ES256 signature against `public_key` and
    /// return its claims. No claim is validated beyond decoding.
    pub fn verify(&self, token: &str, public_key: &p256::PublicKey) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::MalformedToken("expected three segments"));
        };

        let header: Header = serde_json::from_slice(&decode_segment(header_b64)?)
            .map_err(|_| TokenError::MalformedToken("header is not valid JSON"))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::MalformedToken("unsupported alg"));
        }

        let signature = decode_segment(signature_b64)?;
        let der = to_der_signature(&signature)?;
        let sec1 = public_key.to_encoded_point(false);
        let signing_input_len = header_b64.len() + 1 + payload_b64.len();
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, sec1.as_bytes())
            .verify(token[..signing_input_len].as_bytes(), &der)
            .map_err(|_| TokenError::BadSignature)?;

        serde_json::from_slice(&decode_segment(payload_b64)?)
            .map_err(|_| TokenError::MalformedToken("payload is not valid JSON"))
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    Base64UrlUnpadded::decode_vec(segment)
        .map_err(|_| TokenError::MalformedToken("segment is not base64url"))
}
