//! Lock resolver (C7): turns a [`LockIdentifier`] into a [`ValueTimeLock`]
//! by parsing the redeem script, fetching the named transaction, and
//! locating the output that actually pays the script's P2SH address.
//!
//! The canonical script (spec §6) is a single `OP_CHECKLOCKTIMEVERIFY`
//! branch — `<lockUntilBlock> OP_CLTV OP_DROP <pubKeyHash> OP_CHECKSIG`
//! — rather than the two-branch `OP_IF ... OP_ELSE ...` sketch in §4.7;
//! §6 is marked canonical so that's what this resolver parses (see
//! DESIGN.md).

use super::client::BitcoinClient;
use super::identifier::LockIdentifier;
use crate::error::LockResolverError;
use anyhow::Result;
use bitcoin::blockdata::opcodes::all::{OP_CHECKLOCKTIMEVERIFY, OP_CHECKSIG, OP_DROP};
use bitcoin::blockdata::script::Instruction;
use bitcoin::{Address, Amount, Network, Script};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTimeLock {
    pub identifier: LockIdentifier,
    pub amount_locked: Amount,
    pub unlock_transaction_time: u32,
    pub owner: Vec<u8>,
}

struct ParsedLockScript {
    lock_until_block: u32,
    pub_key_hash: Vec<u8>,
}

/// Rebuilds a [`ValueTimeLock`] from a stored redeem script and amount
/// without touching the chain. Used when the underlying transaction is
/// not found on broadcast: the script is self-describing, so the lock's
/// shape is known even while its rebroadcast is still propagating.
pub(crate) fn reconstruct_from_redeem_script(
    identifier: LockIdentifier,
    amount_locked: Amount,
) -> Result<ValueTimeLock, LockResolverError> {
    let redeem_script_bytes = hex::decode(&identifier.redeem_script_as_hex)
        .map_err(|e| LockResolverError::MalformedIdentifier(e.to_string()))?;
    let redeem_script = Script::from(redeem_script_bytes);
    let parsed = parse_lock_script(&redeem_script)?;

    Ok(ValueTimeLock {
        identifier,
        amount_locked,
        unlock_transaction_time: parsed.lock_until_block,
        owner: parsed.pub_key_hash,
    })
}

fn parse_lock_script(script: &Script) -> Result<ParsedLockScript, LockResolverError> {
    let instructions: Vec<Instruction<'_>> = script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| LockResolverError::MalformedRedeemScript)?;

    // <lockUntilBlock> OP_CHECKLOCKTIMEVERIFY OP_DROP <pubKeyHash> OP_CHECKSIG
    if instructions.len() != 5 {
        return Err(LockResolverError::MalformedRedeemScript);
    }

    let lock_until_block = match &instructions[0] {
        Instruction::PushBytes(bytes) => read_script_num(bytes)?,
        _ => return Err(LockResolverError::MalformedRedeemScript),
    };

    match &instructions[1] {
        Instruction::Op(op) if *op == OP_CHECKLOCKTIMEVERIFY => {}
        _ => return Err(LockResolverError::MalformedRedeemScript),
    }

    match &instructions[2] {
        Instruction::Op(op) if *op == OP_DROP => {}
        _ => return Err(LockResolverError::MalformedRedeemScript),
    }

    let pub_key_hash = match &instructions[3] {
        Instruction::PushBytes(bytes) if bytes.len() == 20 => bytes.to_vec(),
        _ => return Err(LockResolverError::MalformedRedeemScript),
    };

    match &instructions[4] {
        Instruction::Op(op) if *op == OP_CHECKSIG => {}
        _ => return Err(LockResolverError::MalformedRedeemScript),
    }

    Ok(ParsedLockScript {
        lock_until_block,
        pub_key_hash,
    })
}

fn read_script_num(bytes: &[u8]) -> Result<u32, LockResolverError> {
    if bytes.len() > 4 {
        return Err(LockResolverError::MalformedRedeemScript);
    }
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        value |= (*byte as u32) << (8 * i);
    }
    Ok(value)
}

pub struct LockResolver<'a> {
    bitcoin_client: &'a dyn BitcoinClient,
    network: Network,
}

impl<'a> LockResolver<'a> {
    pub fn new(bitcoin_client: &'a dyn BitcoinClient, network: Network) -> Self {
        LockResolver {
            bitcoin_client,
            network,
        }
    }

    pub async fn resolve(&self, identifier: &LockIdentifier) -> Result<ValueTimeLock, LockResolverError> {
        let redeem_script_bytes = hex::decode(&identifier.redeem_script_as_hex)
            .map_err(|e| LockResolverError::MalformedIdentifier(e.to_string()))?;
        let redeem_script = Script::from(redeem_script_bytes);

        let parsed = parse_lock_script(&redeem_script)?;

        let txid = identifier
            .transaction_id
            .parse()
            .map_err(|_| LockResolverError::MalformedIdentifier(identifier.transaction_id.clone()))?;

        let transaction = self
            .bitcoin_client
            .get_raw_transaction(&txid)
            .await
            .map_err(|e| LockResolverError::MalformedIdentifier(e.to_string()))?
            .ok_or(LockResolverError::LockResolverTransactionNotFound)?;

        let p2sh_address = Address::p2sh(&redeem_script, self.network);
        let p2sh_script_pubkey = p2sh_address.script_pubkey();

        let output = transaction
            .output
            .iter()
            .find(|output| output.script_pubkey == p2sh_script_pubkey)
            .ok_or(LockResolverError::OutputNotFound)?;

        Ok(ValueTimeLock {
            identifier: identifier.clone(),
            amount_locked: Amount::from_sat(output.value),
            unlock_transaction_time: parsed.lock_until_block,
            owner: parsed.pub_key_hash,
        })
    }
}
