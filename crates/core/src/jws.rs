//! Flattened, detached-payload JWS parsing and verification (C2).
//!
//! Only the one shape Sidetree operations use is supported: a flattened
//! JSON Serialization with `protected`/`payload`/`signature`, header
//! `{ kid, alg: "ES256K" }`, secp256k1 ECDSA over SHA-256.

use crate::codec::{base64url_decode, base64url_encode};
use bitcoin::secp256k1::{self, Message, PublicKey, Secp256k1, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const ALG_ES256K: &str = "ES256K";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwsError {
    #[error("JWS is missing a required field: {0}")]
    MissingField(&'static str),
    #[error("JWS header declares unsupported alg {0:?}, only ES256K is accepted")]
    UnsupportedAlg(String),
    #[error("JWS protected header is not valid base64url JSON")]
    MalformedHeader,
    #[error("JWS signature is not valid base64url DER")]
    MalformedSignature,
    #[error("JWS signature does not verify under the supplied key")]
    SignatureInvalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwsHeader {
    kid: String,
    alg: String,
}

/// The flattened JWS as it travels on the wire: three base64url strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenedJws {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

/// A JWS whose header has been decoded and whose shape is known-good;
/// the signature itself is still unverified until [`ParsedJws::verify`]
/// or [`ParsedJws::verify_and_decode_payload`] is called against a key.
#[derive(Debug, Clone)]
pub struct ParsedJws {
    pub kid: String,
    raw: FlattenedJws,
}

impl ParsedJws {
    /// Decodes `protected`, checks the header shape, and retains the raw
    /// wire fields for signing-input reconstruction. Does not verify.
    pub fn parse(jws: FlattenedJws) -> Result<Self, JwsError> {
        if jws.protected.is_empty() {
            return Err(JwsError::MissingField("protected"));
        }
        if jws.payload.is_empty() {
            return Err(JwsError::MissingField("payload"));
        }
        if jws.signature.is_empty() {
            return Err(JwsError::MissingField("signature"));
        }

        let header_bytes =
            base64url_decode(&jws.protected).map_err(|_| JwsError::MalformedHeader)?;
        let header: JwsHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| JwsError::MalformedHeader)?;

        if header.alg != ALG_ES256K {
            return Err(JwsError::UnsupportedAlg(header.alg));
        }

        Ok(ParsedJws {
            kid: header.kid,
            raw: jws,
        })
    }

    /// `protected || "." || payload`, the exact bytes the signature covers.
    fn signing_input(&self) -> Vec<u8> {
        let mut input = Vec::with_capacity(self.raw.protected.len() + 1 + self.raw.payload.len());
        input.extend_from_slice(self.raw.protected.as_bytes());
        input.push(b'.');
        input.extend_from_slice(self.raw.payload.as_bytes());
        input
    }

    pub fn payload(&self) -> &str {
        &self.raw.payload
    }

    /// Base64url-decodes and parses the payload *without* checking the
    /// signature. Operation parsers use this to read claims embedded in a
    /// signed payload (e.g. the `didUniqueSuffix` a Recover/Revoke signs
    /// over) at parse time, before the recovery key needed to verify the
    /// signature is even known — that verification happens later, against
    /// resolution state, in the operation processor (spec §4.3/§4.5).
    pub fn decode_payload_unverified<T: for<'de> Deserialize<'de>>(&self) -> Result<T, JwsError> {
        let bytes =
            base64url_decode(&self.raw.payload).map_err(|_| JwsError::MalformedSignature)?;
        serde_json::from_slice(&bytes).map_err(|_| JwsError::MalformedHeader)
    }

    /// Verifies the secp256k1 ECDSA signature over SHA-256 of the signing
    /// input against `public_key`.
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), JwsError> {
        let der = base64url_decode(&self.raw.signature).map_err(|_| JwsError::MalformedSignature)?;
        let signature = Signature::from_der(&der).map_err(|_| JwsError::MalformedSignature)?;

        let digest = Sha256::digest(&self.signing_input());
        let message =
            Message::from_slice(&digest).map_err(|_| JwsError::MalformedSignature)?;

        let secp = Secp256k1::verification_only();
        secp.verify(&message, &signature, public_key)
            .map_err(|_| JwsError::SignatureInvalid)
    }

    /// Verifies, then base64url-decodes the payload into `T`.
    pub fn verify_and_decode_payload<T: for<'de> Deserialize<'de>>(
        &self,
        public_key: &PublicKey,
    ) -> Result<T, JwsError> {
        self.verify(public_key)?;
        let bytes = base64url_decode(&self.raw.payload).map_err(|_| JwsError::MalformedSignature)?;
        serde_json::from_slice(&bytes).map_err(|_| JwsError::MalformedHeader)
    }
}

/// Signs `payload_json` with `secret_key`, producing a wire-ready flattened
/// JWS. Used by unit and integration tests to construct fixtures;
/// production code only ever verifies operations, it never signs them.
pub fn sign(
    kid: &str,
    payload_json: &[u8],
    secret_key: &secp256k1::SecretKey,
) -> FlattenedJws {
    let header = JwsHeader {
        kid: kid.to_string(),
        alg: ALG_ES256K.to_string(),
    };
    let protected = base64url_encode(&serde_json::to_vec(&header).unwrap());
    let payload = base64url_encode(payload_json);

    let mut signing_input = Vec::new();
    signing_input.extend_from_slice(protected.as_bytes());
    signing_input.push(b'.');
    signing_input.extend_from_slice(payload.as_bytes());

    let digest = Sha256::digest(&signing_input);
    let message = Message::from_slice(&digest).unwrap();

    let secp = Secp256k1::signing_only();
    let signature = secp.sign(&message, secret_key);

    FlattenedJws {
        protected,
        payload,
        signature: base64url_encode(&signature.serialize_der()),
    }
}
