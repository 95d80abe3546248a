use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sidetree_core::lock::{LockTransactionRecord, LockTransactionStore};
use std::path::Path;

/// Append-only `sled`-backed log for the lock monitor (C9), keyed by
/// insertion sequence number so `get_last_lock` is a single last-key
/// lookup rather than a full scan.
pub struct Database {
    db: sled::Db,
}

impl Database {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("the path is not utf-8 valid: {:?}", path))?;
        let db = sled::open(path_str).context(format!("could not open the DB at {}", path_str))?;

        Ok(Database { db })
    }
}

#[async_trait]
impl LockTransactionStore for Database {
    async fn append(&self, record: LockTransactionRecord) -> anyhow::Result<()> {
        let key = self
            .db
            .generate_id()
            .context("could not generate a sequence id")?
            .to_be_bytes();
        let value = serialize(&record).context("could not serialize lock transaction record")?;

        self.db
            .insert(key, value)
            .context("could not write lock transaction record")?;

        self.db
            .flush_async()
            .await
            .map(|_| ())
            .context("could not flush db")
    }

    async fn get_last_lock(&self) -> anyhow::Result<Option<LockTransactionRecord>> {
        match self.db.iter().values().last() {
            None => Ok(None),
            Some(Err(e)) => Err(e).context("could not read last lock transaction record"),
            Some(Ok(value)) => {
                let record = deserialize(&value).context("could not deserialize lock transaction record")?;
                Ok(Some(record))
            }
        }
    }
}

fn serialize<T>(t: &T) -> anyhow::Result<Vec<u8>>
where
    T: Serialize,
{
    Ok(serde_cbor::to_vec(t)?)
}

fn deserialize<'a, T>(v: &'a [u8]) -> anyhow::Result<T>
where
    T: Deserialize<'a>,
{
    Ok(serde_cbor::from_slice(v)?)
}
