//! End-to-end Create -> Update -> Recover -> Revoke lifecycle, exercised
//! through the same public API a real anchoring/batch-writer system
//! would call: `Operation::parse` inside `OperationProcessor::apply`.

use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use sidetree_core::codec::Encoder;
use sidetree_core::document::USAGE_SIGNING;
use sidetree_core::processor::{NamedAnchoredOperation, OperationProcessor, ResolutionModel};
use sidetree_core::jws;

fn hex_pubkey(sk: &SecretKey) -> String {
    let secp = Secp256k1::new();
    let pk = PublicKey::from_secret_key(&secp, sk);
    hex::encode(pk.serialize().to_vec())
}

fn named_op(did: &str, raw: Vec<u8>, transaction_number: u64) -> NamedAnchoredOperation {
    NamedAnchoredOperation {
        did_unique_suffix: did.to_string(),
        raw_operation: raw,
        transaction_time: transaction_number,
        transaction_number,
        operation_index: 0,
    }
}

fn build_create(recovery_sk: &SecretKey, signing_sk: &SecretKey) -> (Vec<u8>, String) {
    let document = serde_json::json!({
        "publicKey": [{
            "id": "#signing-1",
            "type": "Secp256k1VerificationKey2018",
            "controller": "ignored-by-server",
            "usage": USAGE_SIGNING,
            "publicKeyHex": hex_pubkey(signing_sk),
        }],
        "service": [],
    });
    let operation_data = serde_json::json!({
        "document": document,
        "nextUpdateOtpHash": Encoder::hash(b"lifecycle-update-otp-1"),
    });
    let encoded_operation_data = Encoder::encode(operation_data.to_string().as_bytes());

    let suffix_data = serde_json::json!({
        "recoveryKey": hex_pubkey(recovery_sk),
        "nextRecoveryOtpHash": Encoder::hash(b"lifecycle-recovery-otp-1"),
        "operationDataHash": Encoder::hash(encoded_operation_data.as_bytes()),
    });
    let encoded_suffix_data = Encoder::encode(suffix_data.to_string().as_bytes());
    let suffix = Encoder::hash(encoded_suffix_data.as_bytes());

    let raw = serde_json::json!({
        "type": "create",
        "suffixData": encoded_suffix_data,
        "operationData": encoded_operation_data,
    })
    .to_string()
    .into_bytes();

    (raw, suffix)
}

fn build_update(suffix: &str, signing_sk: &SecretKey, service_endpoint: &str) -> Vec<u8> {
    let patch = serde_json::json!({
        "action": "add-service-endpoints",
        "serviceType": "IdentityHub",
        "serviceEndpoints": [service_endpoint],
    });
    let operation_data = serde_json::json!({
        "patches": [patch],
        "nextUpdateOtpHash": Encoder::hash(b"lifecycle-update-otp-2"),
    });
    let encoded_operation_data = Encoder::encode(operation_data.to_string().as_bytes());
    let operation_data_hash = Encoder::hash(encoded_operation_data.as_bytes());

    let signed = jws::sign(
        "#signing-1",
        serde_json::json!({ "operationDataHash": operation_data_hash })
            .to_string()
            .as_bytes(),
        signing_sk,
    );

    serde_json::json!({
        "type": "update",
        "didUniqueSuffix": suffix,
        "updateOtp": "lifecycle-update-otp-1",
        "operationData": encoded_operation_data,
        "signedOperationData": signed,
    })
    .to_string()
    .into_bytes()
}

fn build_recover(suffix: &str, recovery_sk: &SecretKey, new_signing_sk: &SecretKey, new_recovery_sk: &SecretKey) -> Vec<u8> {
    let document = serde_json::json!({
        "publicKey": [{
            "id": "#signing-after-recovery",
            "type": "Secp256k1VerificationKey2018",
            "controller": "ignored",
            "usage": USAGE_SIGNING,
            "publicKeyHex": hex_pubkey(new_signing_sk),
        }],
        "service": [],
    });
    let operation_data = serde_json::json!({
        "document": document,
        "nextUpdateOtpHash": Encoder::hash(b"lifecycle-update-otp-after-recovery"),
    });
    let encoded_operation_data = Encoder::encode(operation_data.to_string().as_bytes());
    let operation_data_hash = Encoder::hash(encoded_operation_data.as_bytes());

    let signed = jws::sign(
        "#recovery-key",
        serde_json::json!({
            "didUniqueSuffix": suffix,
            "newRecoveryKey": hex_pubkey(new_recovery_sk),
            "nextRecoveryOtpHash": Encoder::hash(b"lifecycle-recovery-otp-after-recovery"),
            "operationDataHash": operation_data_hash,
        })
        .to_string()
        .as_bytes(),
        recovery_sk,
    );

    serde_json::json!({
        "type": "recover",
        "didUniqueSuffix": suffix,
        "recoveryOtp": "lifecycle-recovery-otp-1",
        "operationData": encoded_operation_data,
        "signedOperationData": signed,
    })
    .to_string()
    .into_bytes()
}

fn build_revoke(suffix: &str, recovery_sk: &SecretKey, otp_preimage: &str) -> Vec<u8> {
    let signed = jws::sign(
        "#recovery-key",
        serde_json::json!({
            "didUniqueSuffix": suffix,
            "recoveryOtp": otp_preimage,
        })
        .to_string()
        .as_bytes(),
        recovery_sk,
    );

    serde_json::json!({
        "type": "revoke",
        "didUniqueSuffix": suffix,
        "recoveryOtp": otp_preimage,
        "signedOperationData": signed,
    })
    .to_string()
    .into_bytes()
}

#[test]
fn full_create_update_recover_revoke_lifecycle() {
    let recovery_sk = SecretKey::from_slice(&[21u8; 32]).unwrap();
    let signing_sk = SecretKey::from_slice(&[22u8; 32]).unwrap();
    let (create_raw, suffix) = build_create(&recovery_sk, &signing_sk);

    let processor = OperationProcessor::new();
    let mut model = ResolutionModel::empty();

    assert!(processor.apply(&mut model, &named_op(&suffix, create_raw, 1)));
    assert!(model.did_document.is_some());

    let update_raw = build_update(&suffix, &signing_sk, "https://hub.example/1");
    assert!(processor.apply(&mut model, &named_op(&suffix, update_raw, 2)));
    assert_eq!(model.did_document.as_ref().unwrap().service.len(), 1);

    let new_signing_sk = SecretKey::from_slice(&[23u8; 32]).unwrap();
    let new_recovery_sk = SecretKey::from_slice(&[24u8; 32]).unwrap();
    let recover_raw = build_recover(&suffix, &recovery_sk, &new_signing_sk, &new_recovery_sk);
    assert!(processor.apply(&mut model, &named_op(&suffix, recover_raw, 3)));

    let doc = model.did_document.as_ref().unwrap();
    assert_eq!(doc.public_key.len(), 1);
    assert_eq!(doc.public_key[0].id, "#signing-after-recovery");
    assert!(doc.service.is_empty(), "recover replaces the whole document");

    let revoke_raw = build_revoke(&suffix, &new_recovery_sk, "lifecycle-recovery-otp-after-recovery");
    assert!(processor.apply(&mut model, &named_op(&suffix, revoke_raw, 4)));
    assert!(model.metadata.recovery_key.is_none());
    assert!(model.did_document.is_some(), "document is preserved after revoke");

    // Nothing is accepted for this DID after revocation.
    let further_update = build_update(&suffix, &new_signing_sk, "https://hub.example/2");
    assert!(!processor.apply(&mut model, &named_op(&suffix, further_update, 5)));
}

#[test]
fn operations_for_an_unknown_suffix_are_rejected() {
    let recovery_sk = SecretKey::from_slice(&[25u8; 32]).unwrap();
    let signing_sk = SecretKey::from_slice(&[26u8; 32]).unwrap();
    let (_, real_suffix) = build_create(&recovery_sk, &signing_sk);

    let processor = OperationProcessor::new();
    let mut model = ResolutionModel::empty();

    let update_raw = build_update(&real_suffix, &signing_sk, "https://hub.example/1");
    assert!(!processor.apply(&mut model, &named_op("never-created", update_raw, 1)));
    assert_eq!(model, ResolutionModel::empty());
}
