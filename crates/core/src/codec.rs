//! Base64url encoding and a minimal self-describing multihash (C1).
//!
//! The wire contract (spec §4.1) is that every hash committed to in an
//! operation is computed over the *encoded* form of its payload — the
//! base64url string itself, taken as UTF-8 bytes — never over the decoded
//! JSON. `Multihash::is_valid_hash` exists to make that contract explicit
//! at every call site instead of re-deriving it ad hoc.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Multihash algorithm tag for sha2-256, per the multihash table.
const SHA2_256_CODE: u64 = 0x12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("input is not valid base64url")]
    InvalidBase64,
    #[error("multihash buffer is truncated or malformed")]
    MalformedMultihash,
    #[error("unsigned varint is malformed")]
    MalformedVarint,
}

pub fn base64url_encode(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

pub fn base64url_decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
    base64::decode_config(encoded, base64::URL_SAFE_NO_PAD).map_err(|_| CodecError::InvalidBase64)
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(bytes: &[u8]) -> Result<(u64, &[u8]), CodecError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, byte) in bytes.iter().enumerate() {
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &bytes[i + 1..]));
        }
        shift += 7;
        if shift > 63 {
            return Err(CodecError::MalformedVarint);
        }
    }
    Err(CodecError::MalformedVarint)
}

/// `varint(algo) || varint(len(digest)) || digest`.
fn multihash_sha256(data: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(data);

    let mut out = Vec::with_capacity(2 + digest.len());
    write_varint(SHA2_256_CODE, &mut out);
    write_varint(digest.len() as u64, &mut out);
    out.extend_from_slice(&digest);
    out
}

/// Decoded view of a multihash buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multihash {
    pub algorithm_code: u64,
    pub digest: Vec<u8>,
}

impl Multihash {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let (algorithm_code, rest) = read_varint(bytes)?;
        let (len, rest) = read_varint(rest)?;
        if rest.len() as u64 != len {
            return Err(CodecError::MalformedMultihash);
        }
        Ok(Multihash {
            algorithm_code,
            digest: rest.to_vec(),
        })
    }

    /// Recomputes the multihash over the raw bytes of `encoded_content` (the
    /// base64url string's UTF-8 bytes, not its decoded plaintext) and
    /// compares against `encoded_expected_multihash`. This is the one
    /// comparison spec.md pins as an open question (§9): the hash is over
    /// the *encoded* form.
    pub fn is_valid_hash(encoded_content: &str, encoded_expected_multihash: &str) -> bool {
        Encoder::hash(encoded_content.as_bytes()) == encoded_expected_multihash
    }
}

/// Encodes payloads and computes content hashes (C1).
pub struct Encoder;

impl Encoder {
    pub fn encode(bytes: &[u8]) -> String {
        base64url_encode(bytes)
    }

    pub fn decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
        base64url_decode(encoded)
    }

    pub fn decode_to_string(encoded: &str) -> Result<String, CodecError> {
        let bytes = Self::decode(encoded)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidBase64)
    }

    /// `base64url(multihash(sha256(x)))`.
    pub fn hash(x: &[u8]) -> String {
        base64url_encode(&multihash_sha256(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_round_trips() {
        let samples: &[&[u8]] = &[b"", b"a", b"ab", b"abc", b"hello sidetree", &[0, 1, 2, 255]];
        for sample in samples {
            let encoded = base64url_encode(sample);
            assert_eq!(base64url_decode(&encoded).unwrap(), *sample);
        }
    }

    #[test]
    fn base64url_has_no_padding_or_unsafe_chars() {
        let encoded = base64url_encode(b"\xff\xff\xff");
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn multihash_round_trips_through_parse() {
        let encoded = Encoder::hash(b"some encoded payload");
        let raw = base64url_decode(&encoded).unwrap();
        let parsed = Multihash::parse(&raw).unwrap();
        assert_eq!(parsed.algorithm_code, SHA2_256_CODE);
        assert_eq!(parsed.digest.len(), 32);
    }

    #[test]
    fn is_valid_hash_hashes_the_encoded_form_not_the_plaintext() {
        let encoded_content = Encoder::encode(b"{\"hello\":\"world\"}");
        let expected = Encoder::hash(encoded_content.as_bytes());

        assert!(Multihash::is_valid_hash(&encoded_content, &expected));

        // Hashing the decoded plaintext instead must NOT match — this is
        // the wire contract spec.md pins down explicitly.
        let wrong_expected = Encoder::hash(b"{\"hello\":\"world\"}");
        assert_ne!(expected, wrong_expected);
        assert!(!Multihash::is_valid_hash(&encoded_content, &wrong_expected));
    }

    #[test]
    fn is_valid_hash_rejects_tampered_content() {
        let encoded_content = Encoder::encode(b"original");
        let expected = Encoder::hash(encoded_content.as_bytes());

        let tampered = Encoder::encode(b"tampered");
        assert!(!Multihash::is_valid_hash(&tampered, &expected));
    }
}
