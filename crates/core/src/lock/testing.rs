//! In-memory test doubles for [`BitcoinClient`] and [`LockTransactionStore`].
//!
//! No regtest node is available in this workspace, so these doubles
//! stand in for one — they implement the exact same traits production
//! code does.

use super::client::{BitcoinClient, BitcoinLockTransactionModel};
use super::store::{LockTransactionRecord, LockTransactionStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bitcoin::{Amount, Transaction, Txid};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

pub struct MockBitcoinClient {
    balance_satoshis: AtomicU64,
    block_height: AtomicU32,
    transactions: Mutex<HashMap<Txid, Transaction>>,
    broadcasts: Mutex<Vec<BitcoinLockTransactionModel>>,
    next_fee: Amount,
}

impl MockBitcoinClient {
    pub fn new() -> Self {
        MockBitcoinClient {
            balance_satoshis: AtomicU64::new(0),
            block_height: AtomicU32::new(0),
            transactions: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            next_fee: Amount::from_sat(0),
        }
    }

    pub fn with_balance(self, satoshis: u64) -> Self {
        self.balance_satoshis.store(satoshis, Ordering::SeqCst);
        self
    }

    pub fn with_block_height(self, height: u32) -> Self {
        self.block_height.store(height, Ordering::SeqCst);
        self
    }

    pub fn with_transaction(self, txid: Txid, transaction: Transaction) -> Self {
        self.transactions.lock().unwrap().insert(txid, transaction);
        self
    }

    pub fn set_block_height(&self, height: u32) {
        self.block_height.store(height, Ordering::SeqCst);
    }

    pub fn set_balance(&self, satoshis: u64) {
        self.balance_satoshis.store(satoshis, Ordering::SeqCst);
    }

    pub fn register_transaction(&self, txid: Txid, transaction: Transaction) {
        self.transactions.lock().unwrap().insert(txid, transaction);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    pub fn broadcasts(&self) -> Vec<BitcoinLockTransactionModel> {
        self.broadcasts.lock().unwrap().clone()
    }

    fn fabricate_lock(&self, amount: Amount, until_block: u32) -> BitcoinLockTransactionModel {
        use bitcoin::blockdata::script::Builder;
        use bitcoin::blockdata::opcodes::all::{OP_CHECKLOCKTIMEVERIFY, OP_CHECKSIG, OP_DROP};

        let redeem_script = Builder::new()
            .push_int(until_block as i64)
            .push_opcode(OP_CHECKLOCKTIMEVERIFY)
            .push_opcode(OP_DROP)
            .push_slice(&[0u8; 20])
            .push_opcode(OP_CHECKSIG)
            .into_script();

        let network = bitcoin::Network::Regtest;
        let address = bitcoin::Address::p2sh(&redeem_script, network);

        let transaction = Transaction {
            version: 2,
            lock_time: 0,
            input: vec![],
            output: vec![bitcoin::TxOut {
                value: amount.as_sat(),
                script_pubkey: address.script_pubkey(),
            }],
        };
        let txid = transaction.txid();
        self.transactions
            .lock()
            .unwrap()
            .insert(txid, transaction.clone());

        BitcoinLockTransactionModel {
            transaction_id: txid,
            redeem_script_as_hex: hex::encode(redeem_script.as_bytes()),
            serialized_transaction_object: transaction,
            transaction_fee: self.next_fee,
        }
    }
}

#[async_trait]
impl BitcoinClient for MockBitcoinClient {
    async fn get_balance_in_satoshis(&self) -> Result<u64> {
        Ok(self.balance_satoshis.load(Ordering::SeqCst))
    }

    async fn get_current_block_height(&self) -> Result<u32> {
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> Result<Option<Transaction>> {
        Ok(self.transactions.lock().unwrap().get(txid).cloned())
    }

    async fn create_lock_transaction(
        &self,
        amount: Amount,
        until_block: u32,
    ) -> Result<BitcoinLockTransactionModel> {
        Ok(self.fabricate_lock(amount, until_block))
    }

    async fn create_relock_transaction(
        &self,
        prev_txid: &Txid,
        _prev_lock_time: u32,
        new_until_block: u32,
    ) -> Result<BitcoinLockTransactionModel> {
        let prev = self
            .transactions
            .lock()
            .unwrap()
            .get(prev_txid)
            .cloned()
            .ok_or_else(|| anyhow!("no such previous lock transaction"))?;
        let amount = Amount::from_sat(prev.output.first().map(|o| o.value).unwrap_or(0));
        Ok(self.fabricate_lock(amount, new_until_block))
    }

    async fn create_release_lock_transaction(
        &self,
        prev_txid: &Txid,
        _prev_lock_time: u32,
    ) -> Result<BitcoinLockTransactionModel> {
        self.transactions
            .lock()
            .unwrap()
            .get(prev_txid)
            .cloned()
            .ok_or_else(|| anyhow!("no such previous lock transaction"))?;

        let transaction = Transaction {
            version: 2,
            lock_time: 0,
            input: vec![],
            output: vec![],
        };
        let txid = transaction.txid();
        self.transactions
            .lock()
            .unwrap()
            .insert(txid, transaction.clone());

        Ok(BitcoinLockTransactionModel {
            transaction_id: txid,
            redeem_script_as_hex: String::new(),
            serialized_transaction_object: transaction,
            transaction_fee: Amount::from_sat(0),
        })
    }

    async fn broadcast_lock_transaction(
        &self,
        transaction: &BitcoinLockTransactionModel,
    ) -> Result<()> {
        self.broadcasts.lock().unwrap().push(transaction.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLockTransactionStore {
    records: Mutex<Vec<LockTransactionRecord>>,
}

impl MemoryLockTransactionStore {
    pub fn new() -> Self {
        MemoryLockTransactionStore::default()
    }

    pub fn all(&self) -> Vec<LockTransactionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl LockTransactionStore for MemoryLockTransactionStore {
    async fn append(&self, record: LockTransactionRecord) -> Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn get_last_lock(&self) -> Result<Option<LockTransactionRecord>> {
        Ok(self.records.lock().unwrap().last().cloned())
    }
}
