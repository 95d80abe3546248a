//! Error taxonomy (spec §7). Parse errors and validation failures are
//! handled identically by [`crate::processor::OperationProcessor`]: caught,
//! logged, and turned into `false` — callers never see these types
//! directly unless they call the parsers standalone.

use crate::jws::JwsError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationParseError {
    #[error("operation has an unknown or missing top-level property: {0}")]
    MissingOrUnknownProperty(&'static str),
    #[error("field {0} has the wrong type")]
    TypeIncorrect(&'static str),
    #[error("OTP encoded length {0} exceeds the 50-character limit")]
    OtpTooLong(usize),
    #[error("signed payload's didUniqueSuffix does not match the outer field")]
    SignedDidUniqueSuffixMismatch,
    #[error("signed payload's recoveryOtp does not match the outer field")]
    SignedRecoveryOtpMismatch,
    #[error("operation JSON is not valid: {0}")]
    MalformedJson(String),
    #[error(transparent)]
    Jws(#[from] JwsError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockResolverError {
    #[error("no transaction found for the given identifier")]
    LockResolverTransactionNotFound,
    #[error("redeem script is not a well-formed value-time-lock script")]
    MalformedRedeemScript,
    #[error("no output paying to the redeem script's P2SH address was found")]
    OutputNotFound,
    #[error("lock identifier is not valid: {0}")]
    MalformedIdentifier(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockMonitorError {
    #[error("wallet balance is insufficient to create the first lock")]
    NotEnoughBalanceForFirstLock,
    #[error("bitcoin RPC call timed out or otherwise failed transiently")]
    TransientRpcFailure(String),
}
