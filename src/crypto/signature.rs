// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ECDSA signature transcoding between ASN.1/DER and the JWS `r || s` form.
//!
//! ECDSA primitives emit `SEQUENCE { INTEGER r, INTEGER s }`. ES256 (RFC 7518
//! §3.4) instead wants the two scalars as fixed-width 32-byte big-endian
//! values, concatenated with no delimiter. Verifiers reject anything else.

/// Width of one P-256 scalar in bytes.
pub const SCALAR_LEN: usize = 32;

/// Width of a JWS ES256 signature (`r || s`).
pub const JWT_SIGNATURE_LEN: usize = SCALAR_LEN * 2;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// The DER input did not hold a two-integer sequence fitting P-256.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed ECDSA signature: {0}")]
pub struct SignatureError(pub &'static str);

/// Convert a DER-encoded ECDSA signature into the 64-byte `r || s` form.
pub fn to_jwt_signature(der: &[u8]) -> Result<[u8; JWT_SIGNATURE_LEN], SignatureError> {
    let mut reader = DerReader::new(der);
    let body = reader.read_tlv(TAG_SEQUENCE)?;
    if !reader.is_empty() {
        return Err(SignatureError("trailing bytes after sequence"));
    }

    let mut seq = DerReader::new(body);
    let r = seq.read_tlv(TAG_INTEGER)?;
    let s = seq.read_tlv(TAG_INTEGER)?;
    if !seq.is_empty() {
        return Err(SignatureError("sequence holds more than two elements"));
    }

    let mut out = [0u8; JWT_SIGNATURE_LEN];
    write_scalar(r, &mut out[..SCALAR_LEN])?;
    write_scalar(s, &mut out[SCALAR_LEN..])?;
    Ok(out)
}

/// Convert a 64-byte `r || s` signature back into DER.
///
/// Used on the verification side, where the ECDSA primitive expects ASN.1.
pub fn to_der_signature(jwt: &[u8]) -> Result<Vec<u8>, SignatureError> {
    if jwt.len() != JWT_SIGNATURE_LEN {
        return Err(SignatureError("expected 64 bytes"));
    }

    let r = encode_integer(&jwt[..SCALAR_LEN]);
    let s = encode_integer(&jwt[SCALAR_LEN..]);

    // Max body is 2 * (2 + 33) = 70 bytes, so the short length form always fits.
    let body_len = r.len() + s.len();
    let mut der = Vec::with_capacity(2 + body_len);
    der.push(TAG_SEQUENCE);
    der.push(body_len as u8);
    der.extend_from_slice(&r);
    der.extend_from_slice(&s);
    Ok(der)
}

/// Left-pad a DER integer's magnitude into a fixed 32-byte slot.
fn write_scalar(int: &[u8], slot: &mut [u8]) -> Result<(), SignatureError> {
    if int.is_empty() {
        return Err(SignatureError("empty integer"));
    }
    if int[0] & 0x80 != 0 {
        return Err(SignatureError("negative integer"));
    }

    let first_nonzero = int.iter().position(|b| *b != 0).unwrap_or(int.len());
    let magnitude = &int[first_nonzero..];
    if magnitude.len() > slot.len() {
        return Err(SignatureError("integer exceeds 32 bytes"));
    }

    let offset = slot.len() - magnitude.len();
    slot[..offset].fill(0);
    slot[offset..].copy_from_slice(magnitude);
    Ok(())
}

/// Minimal positive DER INTEGER encoding of a big-endian magnitude.
fn encode_integer(scalar: &[u8]) -> Vec<u8> {
    let first_nonzero = scalar.iter().position(|b| *b != 0);
    let magnitude = match first_nonzero {
        Some(idx) => &scalar[idx..],
        None => &[0u8][..],
    };
    let needs_pad = magnitude[0] & 0x80 != 0;

    let len = magnitude.len() + usize::from(needs_pad);
    let mut out = Vec::with_capacity(2 + len);
    out.push(TAG_INTEGER);
    out.push(len as u8);
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(magnitude);
    out
}

/// Cursor over a DER buffer, limited to what ECDSA signatures need.
struct DerReader<'a> {
    buf: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_byte(&mut self) -> Result<u8, SignatureError> {
        let (first, rest) = self
            .buf
            .split_first()
            .ok_or(SignatureError("unexpected end of input"))?;
        self.buf = rest;
        Ok(*first)
    }

    fn read_len(&mut self) -> Result<usize, SignatureError> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }

        // Long form: low bits give the count of length octets.
        let count = usize::from(first & 0x7f);
        if count == 0 || count > 2 {
            return Err(SignatureError("unsupported length encoding"));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | usize::from(self.read_byte()?);
        }
        Ok(len)
    }

    /// Read one tag-length-value and return the value bytes.
    fn read_tlv(&mut self, expected_tag: u8) -> Result<&'a [u8], SignatureError> {
        let tag = self.read_byte()?;
        if tag != expected_tag {
            return Err(match expected_tag {
                TAG_SEQUENCE => SignatureError("expected SEQUENCE"),
                _ => SignatureError("expected INTEGER"),
            });
        }
        let len = self.read_len()?;
        if len > self.buf.len() {
            return Err(SignatureError("length exceeds input"));
        }
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(value)
    }
}
