//! The operation processor (C5): the per-DID state transition. Every
//! `apply` call is computed functionally against an immutable view of the
//! prior [`ResolutionModel`] and only swapped in on success, so a
//! rejected operation leaves the model untouched by construction rather
//! than by careful bookkeeping (spec §4.5, "Atomicity").

use crate::codec::Encoder;
use crate::document::{apply_patches, DidDocument, USAGE_SIGNING};
use crate::error::OperationParseError;
use crate::jws::JwsError;
use crate::operation::{CreateOperation, Operation, RecoverOperation, RevokeOperation, UpdateOperation};
use bitcoin::secp256k1::PublicKey;
use thiserror::Error;
use tracing::debug;

/// Per-DID resolution state (spec §3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionModel {
    pub did_document: Option<DidDocument>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub recovery_key: Option<String>,
    pub next_recovery_otp_hash: Option<String>,
    pub next_update_otp_hash: Option<String>,
    pub last_operation_transaction_number: Option<u64>,
    /// Informational only (SPEC_FULL §11) — never consulted to accept or
    /// reject an operation.
    pub last_operation_type: Option<&'static str>,
}

impl ResolutionModel {
    pub fn empty() -> Self {
        ResolutionModel::default()
    }
}

/// An operation plus the position the anchoring blockchain assigned it
/// (spec §3). `did_unique_suffix` is the DID bucket the anchoring system
/// filed this raw operation under — for Create that's a claim the
/// processor must verify against the derived suffix; for the other three
/// it is read back out of the operation itself once parsed.
#[derive(Debug, Clone)]
pub struct NamedAnchoredOperation {
    pub did_unique_suffix: String,
    pub raw_operation: Vec<u8>,
    pub transaction_time: u64,
    pub transaction_number: u64,
    pub operation_index: u32,
}

#[derive(Debug, Error)]
enum ApplyFailure {
    #[error(transparent)]
    Parse(#[from] OperationParseError),
    #[error("operation is filed under a DID suffix that does not match its derived suffix")]
    SuffixMismatch,
    #[error("suffixData.operationDataHash does not match the encoded operationData")]
    OperationDataHashMismatch,
    #[error("a document already exists for this DID; only one Create is accepted")]
    AlreadyHasDocument,
    #[error("no document exists yet for this DID")]
    NoDocument,
    #[error("the presented OTP does not match the committed next-OTP hash")]
    OtpMismatch,
    #[error("no public key with a matching kid and usage=signing was found")]
    NoMatchingSigningKey,
    #[error("recoveryKey is not a valid hex-encoded secp256k1 public key")]
    MalformedRecoveryKey,
    #[error(transparent)]
    Jws(#[from] JwsError),
}

/// Applies named-anchored operations to [`ResolutionModel`]s (C5).
#[derive(Debug, Default)]
pub struct OperationProcessor;

impl OperationProcessor {
    pub fn new() -> Self {
        OperationProcessor
    }

    /// Parses and applies `named_op` against `model`. Returns whether the
    /// operation was valid. On `false`, `model` is left byte-for-byte
    /// identical to its pre-call state (spec §4.5, §8 "Atomicity").
    pub fn apply(&self, model: &mut ResolutionModel, named_op: &NamedAnchoredOperation) -> bool {
        match try_apply(model, named_op) {
            Ok(next) => {
                *model = next;
                true
            }
            Err(err) => {
                debug!(error = %err, "operation rejected, resolution model unchanged");
                false
            }
        }
    }
}

fn try_apply(
    model: &ResolutionModel,
    named_op: &NamedAnchoredOperation,
) -> Result<ResolutionModel, ApplyFailure> {
    let operation = Operation::parse(&named_op.raw_operation)?;

    let next = match &operation {
        Operation::Create(create_op) => apply_create(model, named_op, create_op)?,
        Operation::Update(update_op) => apply_update(model, named_op, update_op)?,
        Operation::Recover(recover_op) => apply_recover(model, named_op, recover_op)?,
        Operation::Revoke(revoke_op) => apply_revoke(model, named_op, revoke_op)?,
    };

    Ok(next)
}

fn apply_create(
    model: &ResolutionModel,
    named_op: &NamedAnchoredOperation,
    op: &CreateOperation,
) -> Result<ResolutionModel, ApplyFailure> {
    if model.did_document.is_some() {
        return Err(ApplyFailure::AlreadyHasDocument);
    }

    if op.derive_suffix() != named_op.did_unique_suffix {
        return Err(ApplyFailure::SuffixMismatch);
    }

    let expected_hash = Encoder::hash(op.encoded_operation_data.as_bytes());
    if expected_hash != op.suffix_data.operation_data_hash {
        return Err(ApplyFailure::OperationDataHashMismatch);
    }

    let mut document = DidDocument::new(named_op.did_unique_suffix.clone());
    document.public_key = op.operation_data.document.public_key.clone();
    document.service = op.operation_data.document.service.clone();

    Ok(ResolutionModel {
        did_document: Some(document),
        metadata: Metadata {
            recovery_key: Some(op.suffix_data.recovery_key.clone()),
            next_recovery_otp_hash: Some(op.suffix_data.next_recovery_otp_hash.clone()),
            next_update_otp_hash: Some(op.operation_data.next_update_otp_hash.clone()),
            last_operation_transaction_number: Some(named_op.transaction_number),
            last_operation_type: Some("create"),
        },
    })
}

fn apply_update(
    model: &ResolutionModel,
    named_op: &NamedAnchoredOperation,
    op: &UpdateOperation,
) -> Result<ResolutionModel, ApplyFailure> {
    let document = model.did_document.as_ref().ok_or(ApplyFailure::NoDocument)?;

    let expected_otp_hash = model
        .metadata
        .next_update_otp_hash
        .as_deref()
        .ok_or(ApplyFailure::NoDocument)?;
    if Encoder::hash(op.update_otp.as_bytes()) != expected_otp_hash {
        return Err(ApplyFailure::OtpMismatch);
    }

    let expected_hash = Encoder::hash(op.encoded_operation_data.as_bytes());
    let signed_payload: crate::operation::UpdateSignedPayload =
        op.signed_operation_data.decode_payload_unverified()?;
    if signed_payload.operation_data_hash != expected_hash {
        return Err(ApplyFailure::OperationDataHashMismatch);
    }

    let signing_key = find_signing_key(document, &op.signed_operation_data.kid)
        .ok_or(ApplyFailure::NoMatchingSigningKey)?;
    op.signed_operation_data.verify(&signing_key)?;

    let mut next_document = document.clone();
    apply_patches(&mut next_document, &op.operation_data.patches);

    let mut next_metadata = model.metadata.clone();
    next_metadata.next_update_otp_hash = Some(op.operation_data.next_update_otp_hash.clone());
    next_metadata.last_operation_transaction_number = Some(named_op.transaction_number);
    next_metadata.last_operation_type = Some("update");

    Ok(ResolutionModel {
        did_document: Some(next_document),
        metadata: next_metadata,
    })
}

fn apply_recover(
    model: &ResolutionModel,
    named_op: &NamedAnchoredOperation,
    op: &RecoverOperation,
) -> Result<ResolutionModel, ApplyFailure> {
    if model.did_document.is_none() {
        return Err(ApplyFailure::NoDocument);
    }

    let expected_otp_hash = model
        .metadata
        .next_recovery_otp_hash
        .as_deref()
        .ok_or(ApplyFailure::NoDocument)?;
    if Encoder::hash(op.recovery_otp.as_bytes()) != expected_otp_hash {
        return Err(ApplyFailure::OtpMismatch);
    }

    let recovery_key_hex = model
        .metadata
        .recovery_key
        .as_deref()
        .ok_or(ApplyFailure::NoDocument)?;
    let recovery_key =
        parse_hex_public_key(recovery_key_hex).ok_or(ApplyFailure::MalformedRecoveryKey)?;

    let signed_payload: crate::operation::RecoverSignedPayload =
        op.signed_operation_data.decode_payload_unverified()?;
    let expected_hash = Encoder::hash(op.encoded_operation_data.as_bytes());
    if signed_payload.operation_data_hash != expected_hash {
        return Err(ApplyFailure::OperationDataHashMismatch);
    }

    op.signed_operation_data.verify(&recovery_key)?;

    let mut document = DidDocument::new(named_op.did_unique_suffix.clone());
    document.public_key = op.operation_data.document.public_key.clone();
    document.service = op.operation_data.document.service.clone();

    Ok(ResolutionModel {
        did_document: Some(document),
        metadata: Metadata {
            recovery_key: Some(signed_payload.new_recovery_key),
            next_recovery_otp_hash: Some(signed_payload.next_recovery_otp_hash),
            next_update_otp_hash: Some(op.operation_data.next_update_otp_hash.clone()),
            last_operation_transaction_number: Some(named_op.transaction_number),
            last_operation_type: Some("recover"),
        },
    })
}

fn apply_revoke(
    model: &ResolutionModel,
    named_op: &NamedAnchoredOperation,
    op: &RevokeOperation,
) -> Result<ResolutionModel, ApplyFailure> {
    if model.did_document.is_none() {
        return Err(ApplyFailure::NoDocument);
    }

    let expected_otp_hash = model
        .metadata
        .next_recovery_otp_hash
        .as_deref()
        .ok_or(ApplyFailure::NoDocument)?;
    if Encoder::hash(op.recovery_otp.as_bytes()) != expected_otp_hash {
        return Err(ApplyFailure::OtpMismatch);
    }

    let recovery_key_hex = model
        .metadata
        .recovery_key
        .as_deref()
        .ok_or(ApplyFailure::NoDocument)?;
    let recovery_key =
        parse_hex_public_key(recovery_key_hex).ok_or(ApplyFailure::MalformedRecoveryKey)?;

    op.signed_operation_data.verify(&recovery_key)?;

    let mut next_metadata = model.metadata.clone();
    next_metadata.recovery_key = None;
    next_metadata.next_recovery_otp_hash = None;
    next_metadata.next_update_otp_hash = None;
    next_metadata.last_operation_transaction_number = Some(named_op.transaction_number);
    next_metadata.last_operation_type = Some("revoke");

    Ok(ResolutionModel {
        // Document is preserved, per spec §4.5: "document preserved but
        // further ops rejected" (there is no more next-OTP to present).
        did_document: model.did_document.clone(),
        metadata: next_metadata,
    })
}

fn find_signing_key(document: &DidDocument, kid: &str) -> Option<PublicKey> {
    document
        .public_key
        .iter()
        .find(|key| key.id == kid && key.usage == USAGE_SIGNING)
        .and_then(|key| key.public_key_hex.as_deref())
        .and_then(parse_hex_public_key)
}

fn parse_hex_public_key(hex_str: &str) -> Option<PublicKey> {
    let bytes = hex::decode(hex_str).ok()?;
    PublicKey::from_slice(&bytes).ok()
}
