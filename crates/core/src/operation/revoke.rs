use super::{check_otp_length, check_property_schema, required_str};
use crate::error::OperationParseError;
use crate::jws::{FlattenedJws, ParsedJws};
use serde::Deserialize;
use serde_json::Value;

const SCHEMA: &[&str] = &["type", "didUniqueSuffix", "recoveryOtp", "signedOperationData"];

/// The payload a `signedOperationData` JWS signs over for Revoke.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevokeSignedPayload {
    #[serde(rename = "didUniqueSuffix")]
    pub did_unique_suffix: String,
    #[serde(rename = "recoveryOtp")]
    pub recovery_otp: String,
}

#[derive(Debug, Clone)]
pub struct RevokeOperation {
    pub did_unique_suffix: String,
    pub recovery_otp: String,
    pub signed_operation_data: ParsedJws,
    pub original_buffer: Vec<u8>,
}

pub(super) fn parse(value: &Value, raw: &[u8]) -> Result<RevokeOperation, OperationParseError> {
    check_property_schema(value, SCHEMA)?;

    let did_unique_suffix = required_str(value, "didUniqueSuffix")?.to_string();
    let recovery_otp = required_str(value, "recoveryOtp")?.to_string();
    check_otp_length(&recovery_otp)?;

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

    let signed_payload: RevokeSignedPayload = signed_operation_data.decode_payload_unverified()?;
    if signed_payload.did_unique_suffix != did_unique_suffix {
        return Err(OperationParseError::SignedDidUniqueSuffixMismatch);
    }
    if signed_payload.recovery_otp != recovery_otp {
        return Err(OperationParseError::SignedRecoveryOtpMismatch);
    }

    Ok(RevokeOperation {
        did_unique_suffix,
        recovery_otp,
        signed_operation_data,
        original_buffer: raw.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jws;
    use bitcoin::secp256k1::SecretKey;

    fn sample_request(did: &str, otp: &str, signed_did: &str, signed_otp: &str) -> Vec<u8> {
        let sk = SecretKey::from_slice(&[11u8; 32]).unwrap();
        let signed = jws::sign(
            "#recovery-key",
            serde_json::json!({
                "didUniqueSuffix": signed_did,
                "recoveryOtp": signed_otp,
            })
            .to_string()
            .as_bytes(),
            &sk,
        );

        serde_json::json!({
            "type": "revoke",
            "didUniqueSuffix": did,
            "recoveryOtp": otp,
            "signedOperationData": signed,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn parses_a_well_formed_revoke_with_exactly_four_properties() {
        let raw = sample_request("Dabc", "otp", "Dabc", "otp");
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert!(parse(&value, &raw).is_ok());
    }

    #[test]
    fn rejects_three_properties() {
        let raw = serde_json::json!({
            "type": "revoke",
            "didUniqueSuffix": "Dabc",
            "recoveryOtp": "otp",
        })
        .to_string()
        .into_bytes();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            parse(&value, &raw),
            Err(OperationParseError::MissingOrUnknownProperty("<schema>"))
        );
    }

    #[test]
    fn rejects_five_properties() {
        let mut value = serde_json::from_slice::<Value>(&sample_request(
            "Dabc", "otp", "Dabc", "otp",
        ))
        .unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("extra".to_string(), Value::Bool(true));
        let raw = value.to_string().into_bytes();
        assert_eq!(
            parse(&value, &raw),
            Err(OperationParseError::MissingOrUnknownProperty("<schema>"))
        );
    }

    #[test]
    fn rejects_signed_recovery_otp_mismatch() {
        let raw = sample_request("Dabc", "otp", "Dabc", "different-otp");
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            parse(&value, &raw),
            Err(OperationParseError::SignedRecoveryOtpMismatch)
        );
    }
}
