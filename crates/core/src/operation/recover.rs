use super::{
    check_otp_length, check_property_schema, decode_encoded_json, required_str,
    InitialDocumentModel,
};
use crate::error::OperationParseError;
use crate::jws::{FlattenedJws, ParsedJws};
use serde::Deserialize;
use serde_json::Value;

const SCHEMA: &[&str] = &[
    "type",
    "didUniqueSuffix",
    "recoveryOtp",
    "operationData",
    "signedOperationData",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecoverOperationData {
    pub document: InitialDocumentModel,
    #[serde(rename = "nextUpdateOtpHash")]
    pub next_update_otp_hash: String,
}

/// The payload a `signedOperationData` JWS signs over for Recover.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecoverSignedPayload {
    #[serde(rename = "didUniqueSuffix")]
    pub did_unique_suffix: String,
    #[serde(rename = "newRecoveryKey")]
    pub new_recovery_key: String,
    #[serde(rename = "nextRecoveryOtpHash")]
    pub next_recovery_otp_hash: String,
    #[serde(rename = "operationDataHash")]
    pub operation_data_hash: String,
}

#[derive(Debug, Clone)]
pub struct RecoverOperation {
    pub did_unique_suffix: String,
    pub recovery_otp: String,
    pub encoded_operation_data: String,
    pub operation_data: RecoverOperationData,
    pub signed_operation_data: ParsedJws,
    pub original_buffer: Vec<u8>,
}

pub(super) fn parse(value: &Value, raw: &[u8]) -> Result<RecoverOperation, OperationParseError> {
    check_property_schema(value, SCHEMA)?;

    let did_unique_suffix = required_str(value, "didUniqueSuffix")?.to_string();
    let recovery_otp = required_str(value, "recoveryOtp")?.to_string();
    check_otp_length(&recovery_otp)?;

    let encoded_operation_data = required_str(value, "operationData")?.to_string();
    let operation_data: RecoverOperationData =
        decode_encoded_json(&encoded_operation_data, "operationData")?;

    let jws: FlattenedJws = value
        .get("signedOperationData")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|_| OperationParseError::TypeIncorrect("signedOperationData"))?
        .ok_or(OperationParseError::MissingOrUnknownProperty(
            "signedOperationData",
        ))?;
    let signed_operation_data = ParsedJws::parse(jws)?;

    let signed_payload: RecoverSignedPayload =
        signed_operation_data.decode_payload_unverified()?;
    if signed_payload.did_unique_suffix != did_unique_suffix {
        return Err(OperationParseError::SignedDidUniqueSuffixMismatch);
    }

    Ok(RecoverOperation {
        did_unique_suffix,
        recovery_otp,
        encoded_operation_data,
        operation_data,
        signed_operation_data,
        original_buffer: raw.to_vec(),
    })
}
