//! Lock identifier codec (C6): `(txid, redeemScript)` pairs serialized as a
//! single opaque base64url string so they travel easily through logs,
//! anchor files, and CLI arguments.

use crate::codec::{base64url_decode, base64url_encode};
use crate::error::LockResolverError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockIdentifierWire {
    #[serde(rename = "transactionId")]
    transaction_id: String,
    #[serde(rename = "redeemScriptAsHex")]
    redeem_script_as_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockIdentifier {
    pub transaction_id: String,
    pub redeem_script_as_hex: String,
}

impl LockIdentifier {
    pub fn new(transaction_id: String, redeem_script_as_hex: String) -> Self {
        LockIdentifier {
            transaction_id,
            redeem_script_as_hex,
        }
    }

    pub fn serialize(&self) -> String {
        let wire = LockIdentifierWire {
            transaction_id: self.transaction_id.clone(),
            redeem_script_as_hex: self.redeem_script_as_hex.clone(),
        };
        base64url_encode(serde_json::to_string(&wire).expect("wire struct always serializes").as_bytes())
    }

    pub fn deserialize(encoded: &str) -> Result<Self, LockResolverError> {
        let bytes = base64url_decode(encoded)
            .map_err(|e| LockResolverError::MalformedIdentifier(e.to_string()))?;
        let wire: LockIdentifierWire = serde_json::from_slice(&bytes)
            .map_err(|e| LockResolverError::MalformedIdentifier(e.to_string()))?;

        Ok(LockIdentifier {
            transaction_id: wire.transaction_id,
            redeem_script_as_hex: wire.redeem_script_as_hex,
        })
    }
}

impl fmt::Display for LockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for LockIdentifier {
    type Err = LockResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockIdentifier::deserialize(s)
    }
}
