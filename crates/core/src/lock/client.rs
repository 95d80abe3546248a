//! The bitcoin client contract (C10): the abstract interface a real node
//! plugs into. One narrow `async_trait` per capability the monitor
//! needs, so a test double only has to implement what it actually
//! exercises.

use anyhow::Result;
use async_trait::async_trait;
use bitcoin::{Amount, Transaction, Txid};

/// The result of building (but not yet broadcasting) a lock-related
/// transaction: a fresh lock, a relock, or a release.
#[derive(Debug, Clone)]
pub struct BitcoinLockTransactionModel {
    pub transaction_id: Txid,
    pub redeem_script_as_hex: String,
    pub serialized_transaction_object: Transaction,
    pub transaction_fee: Amount,
}

#[async_trait]
pub trait BitcoinClient: Send + Sync {
    async fn get_balance_in_satoshis(&self) -> Result<u64>;

    async fn get_current_block_height(&self) -> Result<u32>;

    /// `Ok(None)` means the node has no knowledge of `txid` — distinct
    /// from an RPC-level failure, so the lock resolver can tell
    /// "transaction not found" (a recognized recovery signal, spec §7)
    /// apart from a transient or malformed-request error.
    async fn get_raw_transaction(&self, txid: &Txid) -> Result<Option<Transaction>>;

    async fn create_lock_transaction(
        &self,
        amount: Amount,
        until_block: u32,
    ) -> Result<BitcoinLockTransactionModel>;

    async fn create_relock_transaction(
        &self,
        prev_txid: &Txid,
        prev_lock_time: u32,
        new_until_block: u32,
    ) -> Result<BitcoinLockTransactionModel>;

    async fn create_release_lock_transaction(
        &self,
        prev_txid: &Txid,
        prev_lock_time: u32,
    ) -> Result<BitcoinLockTransactionModel>;

    async fn broadcast_lock_transaction(
        &self,
        transaction: &BitcoinLockTransactionModel,
    ) -> Result<()>;
}
