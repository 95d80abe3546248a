//! Operation parsers (C3): decode, schema-check, and structurally validate
//! the four wire operation types. Parsers are pure — they never consult
//! resolution state; that happens in [`crate::processor`].

mod create;
mod recover;
mod revoke;
mod update;

pub use create::{CreateOperation, CreateOperationData, SuffixData};
pub use recover::{RecoverOperation, RecoverOperationData, RecoverSignedPayload};
pub use revoke::{RevokeOperation, RevokeSignedPayload};
pub use update::{UpdateOperation, UpdateOperationData, UpdateSignedPayload};

use crate::document::{PublicKeyEntry, ServiceEntry};
use crate::error::OperationParseError;
use serde::Deserialize;
use serde_json::Value;

const MAX_OTP_ENCODED_LEN: usize = 50;

/// The decoded initial document contents a Create/Recover carries, before
/// the processor assigns an `id`. The client never sends an `id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InitialDocumentModel {
    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKeyEntry>,
    #[serde(default)]
    pub service: Vec<ServiceEntry>,
}

/// A parsed, typed operation paired with the exact bytes it was parsed
/// from, so any hash over the request is reproducible byte-for-byte
/// (spec §3).
#[derive(Debug, Clone)]
pub enum Operation {
    Create(CreateOperation),
    Update(UpdateOperation),
    Recover(RecoverOperation),
    Revoke(RevokeOperation),
}

impl Operation {
    pub fn parse(raw: &[u8]) -> Result<Self, OperationParseError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| OperationParseError::MalformedJson(e.to_string()))?;

        let op_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(OperationParseError::MissingOrUnknownProperty("type"))?;

        match op_type {
            "create" => Ok(Operation::Create(create::parse(&value, raw)?)),
            "update" => Ok(Operation::Update(update::parse(&value, raw)?)),
            "recover" => Ok(Operation::Recover(recover::parse(&value, raw)?)),
            "revoke" => Ok(Operation::Revoke(revoke::parse(&value, raw)?)),
            _unknown => Err(OperationParseError::MissingOrUnknownProperty("type")),
        }
    }

    pub fn original_buffer(&self) -> &[u8] {
        match self {
            Operation::Create(op) => &op.original_buffer,
            Operation::Update(op) => &op.original_buffer,
            Operation::Recover(op) => &op.original_buffer,
            Operation::Revoke(op) => &op.original_buffer,
        }
    }
}

/// Rejects if `value`'s top-level property set differs from `expected`
/// (spec §4.3: "reject if top-level property count differs from the
/// schema for the declared type"). Comparing the full key set rather than
/// just the count also catches same-count typos/substitutions.
pub(crate) fn check_property_schema(
    value: &Value,
    expected: &[&'static str],
) -> Result<(), OperationParseError> {
    let object = value
        .as_object()
        .ok_or(OperationParseError::TypeIncorrect("<root>"))?;

    if object.len() != expected.len() {
        return Err(OperationParseError::MissingOrUnknownProperty("<schema>"));
    }

    for key in expected {
        if !object.contains_key(*key) {
            return Err(OperationParseError::MissingOrUnknownProperty(key));
        }
    }

    Ok(())
}

pub(crate) fn required_str<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<&'a str, OperationParseError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(OperationParseError::TypeIncorrect(field))
}

pub(crate) fn check_otp_length(otp: &str) -> Result<(), OperationParseError> {
    if otp.len() > MAX_OTP_ENCODED_LEN {
        return Err(OperationParseError::OtpTooLong(otp.len()));
    }
    Ok(())
}

pub(crate) fn decode_encoded_json<T: for<'de> Deserialize<'de>>(
    encoded: &str,
    field: &'static str,
) -> Result<T, OperationParseError> {
    let bytes = crate::codec::base64url_decode(encoded)
        .map_err(|_| OperationParseError::TypeIncorrect(field))?;
    serde_json::from_slice(&bytes).map_err(|_| OperationParseError::TypeIncorrect(field))
}
