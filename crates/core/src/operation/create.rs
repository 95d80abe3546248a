use super::{check_property_schema, decode_encoded_json, required_str, InitialDocumentModel};
use crate::codec::Encoder;
use crate::error::OperationParseError;
use serde::Deserialize;
use serde_json::Value;

const SCHEMA: &[&str] = &["type", "suffixData", "operationData"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuffixData {
    #[serde(rename = "recoveryKey")]
    pub recovery_key: String,
    #[serde(rename = "nextRecoveryOtpHash")]
    pub next_recovery_otp_hash: String,
    #[serde(rename = "operationDataHash")]
    pub operation_data_hash: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateOperationData {
    pub document: InitialDocumentModel,
    #[serde(rename = "nextUpdateOtpHash")]
    pub next_update_otp_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateOperation {
    pub encoded_suffix_data: String,
    pub encoded_operation_data: String,
    pub suffix_data: SuffixData,
    pub operation_data: CreateOperationData,
    pub original_buffer: Vec<u8>,
}

impl CreateOperation {
    /// The DID unique suffix is *derived*, never supplied on the wire
    /// (spec §4.3): `multihash(encodedSuffixData)`.
    pub fn derive_suffix(&self) -> String {
        Encoder::hash(self.encoded_suffix_data.as_bytes())
    }
}

pub(super) fn parse(value: &Value, raw: &[u8]) -> Result<CreateOperation, OperationParseError> {
    check_property_schema(value, SCHEMA)?;

    let encoded_suffix_data = required_str(value, "suffixData")?.to_string();
    let encoded_operation_data = required_str(value, "operationData")?.to_string();

    let suffix_data: SuffixData = decode_encoded_json(&encoded_suffix_data, "suffixData")?;
    let operation_data: CreateOperationData =
        decode_encoded_json(&encoded_operation_data, "operationData")?;

    Ok(CreateOperation {
        encoded_suffix_data,
        encoded_operation_data,
        suffix_data,
        operation_data,
        original_buffer: raw.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoder;

    fn sample_request() -> Vec<u8> {
        let operation_data = serde_json::json!({
            "document": { "publicKey": [], "service": [] },
            "nextUpdateOtpHash": "h-update",
        });
        let encoded_operation_data = Encoder::encode(operation_data.to_string().as_bytes());

        let suffix_data = serde_json::json!({
            "recoveryKey": "02aabb",
            "nextRecoveryOtpHash": "h-recovery",
            "operationDataHash": Encoder::hash(encoded_operation_data.as_bytes()),
        });
        let encoded_suffix_data = Encoder::encode(suffix_data.to_string().as_bytes());

        serde_json::json!({
            "type": "create",
            "suffixData": encoded_suffix_data,
            "operationData": encoded_operation_data,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn parses_a_well_formed_create() {
        let raw = sample_request();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        let op = parse(&value, &raw).unwrap();

        assert_eq!(op.operation_data.next_update_otp_hash, "h-update");
        assert!(!op.derive_suffix().is_empty());
    }

    #[test]
    fn rejects_wrong_property_count() {
        let raw = serde_json::json!({
            "type": "create",
            "suffixData": "x",
        })
        .to_string()
        .into_bytes();
        let value: Value = serde_json::from_slice(&raw).unwrap();

        assert_eq!(
            parse(&value, &raw),
            Err(OperationParseError::MissingOrUnknownProperty("<schema>"))
        );
    }
}
