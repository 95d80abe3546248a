#![warn(
    unused_extern_crates,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::fallible_impl_from,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::dbg_macro
)]
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![forbid(unsafe_code)]

mod config;
mod db;

use crate::config::NodeConfig;
use crate::db::Database;
use anyhow::Context;
use bitcoin::Network;
use sidetree_core::lock::{testing::MockBitcoinClient, LockMonitor};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = NodeConfig::from_file(&config_path)
        .context("failed to load node configuration")?;

    let network = match config.network.as_str() {
        "bitcoin" | "mainnet" => Network::Bitcoin,
        "testnet" => Network::Testnet,
        _ => Network::Regtest,
    };
    let store = Database::new(&config.store_path).context("failed to open lock transaction store")?;

    // The batch writer, transaction observer, and a real bitcoind JSON-RPC
    // transport are all out of scope (spec §1 Non-goals); this stub lets
    // `LockMonitor` run end-to-end without one. Swapping it for a real
    // `BitcoinClient` impl against `config.bitcoin_rpc_endpoint` is the
    // only thing a production deployment needs to add.
    tracing::warn!(
        endpoint = %config.bitcoin_rpc_endpoint,
        "using a stub bitcoin client; no RPC transport is wired up"
    );
    let bitcoin_client = MockBitcoinClient::new().with_balance(u64::MAX / 2);

    let monitor = LockMonitor::new(
        &bitcoin_client,
        &store,
        network,
        config.monitor_parameters(),
    );

    loop {
        match monitor.tick().await {
            Ok(outcome) => tracing::info!(?outcome, "lock monitor tick completed"),
            Err(e) => tracing::warn!(error = %e, "lock monitor tick failed, will retry next period"),
        }
        tokio::time::delay_for(Duration::from_secs(config.poll_period_in_seconds)).await;
    }
}
