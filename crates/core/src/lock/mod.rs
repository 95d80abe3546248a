//! Bitcoin value-time-lock subsystem: identifiers (C6), the bitcoin
//! wallet/RPC boundary (C10), the durable record store (C9), the
//! resolver (C7), and the monitor control loop (C8).

pub mod client;
pub mod identifier;
pub mod monitor;
pub mod resolver;
pub mod store;
pub mod testing;

pub use client::{BitcoinClient, BitcoinLockTransactionModel};
pub use identifier::LockIdentifier;
pub use monitor::{LockMonitor, LockStatus, MonitorParameters, TickOutcome};
pub use resolver::{LockResolver, ValueTimeLock};
pub use store::{LockTransactionRecord, LockTransactionStore, LockTransactionType};
