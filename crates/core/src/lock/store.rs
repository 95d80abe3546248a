//! The lock transaction store contract (C9): an append-only log of
//! monitor actions. "Current state" is always just the last record —
//! there is no compaction, the history is the audit trail.

use anyhow::Result;
use async_trait::async_trait;
use bitcoin::{Amount, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockTransactionType {
    Create,
    Relock,
    ReturnToWallet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockTransactionRecord {
    #[serde(rename = "type")]
    pub transaction_type: LockTransactionType,
    pub txid: String,
    #[serde(rename = "redeemScriptAsHex")]
    pub redeem_script_as_hex: String,
    #[serde(rename = "rawTransaction")]
    pub raw_transaction_hex: String,
    #[serde(rename = "desiredLockAmountInSatoshis")]
    pub desired_lock_amount_in_satoshis: u64,
    #[serde(rename = "createTimestamp")]
    pub create_timestamp: u64,
}

impl LockTransactionRecord {
    pub fn desired_lock_amount(&self) -> Amount {
        Amount::from_sat(self.desired_lock_amount_in_satoshis)
    }

    pub fn decode_raw_transaction(&self) -> Result<Transaction> {
        use bitcoin::consensus::encode::deserialize;
        let bytes = hex::decode(&self.raw_transaction_hex)?;
        Ok(deserialize(&bytes)?)
    }
}

/// Durable append-only log (C9). Implementations must make `append`
/// durable before it returns — the monitor's persist-before-broadcast
/// ordering (spec §4.8) depends on it.
#[async_trait]
pub trait LockTransactionStore: Send + Sync {
    async fn append(&self, record: LockTransactionRecord) -> Result<()>;

    /// The last appended record by insertion order, or `None` if the
    /// store is empty.
    async fn get_last_lock(&self) -> Result<Option<LockTransactionRecord>>;
}
