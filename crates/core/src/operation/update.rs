use super::{check_otp_length, check_property_schema, decode_encoded_json, required_str};
use crate::document::Patch;
use crate::error::OperationParseError;
use crate::jws::{FlattenedJws, ParsedJws};
use serde::Deserialize;
use serde_json::Value;

const SCHEMA: &[&str] = &[
    "type",
    "didUniqueSuffix",
    "updateOtp",
    "operationData",
    "signedOperationData",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateOperationData {
    pub patches: Vec<Patch>,
    #[serde(rename = "nextUpdateOtpHash")]
    pub next_update_otp_hash: String,
}

/// The payload a `signedOperationData` JWS signs over for Update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateSignedPayload {
    #[serde(rename = "operationDataHash")]
    pub operation_data_hash: String,
}

#[derive(Debug, Clone)]
pub struct UpdateOperation {
    pub did_unique_suffix: String,
    pub update_otp: String,
    pub encoded_operation_data: String,
    pub operation_data: UpdateOperationData,
    pub signed_operation_data: ParsedJws,
    pub original_buffer: Vec<u8>,
}

pub(super) fn parse(value: &Value, raw: &[u8]) -> Result<UpdateOperation, OperationParseError> {
    check_property_schema(value, SCHEMA)?;

    let did_unique_suffix = required_str(value, "didUniqueSuffix")?.to_string();
    let update_otp = required_str(value, "updateOtp")?.to_string();
    check_otp_length(&update_otp)?;

    let encoded_operation_data = required_str(value, "operationData")?.to_string();
    let operation_data: UpdateOperationData =
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

    Ok(UpdateOperation {
        did_unique_suffix,
        update_otp,
        encoded_operation_data,
        operation_data,
        signed_operation_data,
        original_buffer: raw.to_vec(),
    })
}
