use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub poll_period_in_seconds: u64,
    pub desired_lock_amount_in_satoshis: u64,
    pub first_lock_fee_amount_in_satoshis: u64,
    pub lock_period_in_blocks: u32,
    pub store_path: PathBuf,
    pub bitcoin_rpc_endpoint: String,
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_network() -> String {
    "regtest".to_owned()
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("could not read config file {:?}: {}", path, e))?;
        let config = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("could not parse config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn monitor_parameters(&self) -> sidetree_core::lock::MonitorParameters {
        sidetree_core::lock::MonitorParameters {
            desired_lock_amount_in_satoshis: self.desired_lock_amount_in_satoshis,
            lock_period_in_blocks: self.lock_period_in_blocks,
            first_lock_fee_amount_in_satoshis: self.first_lock_fee_amount_in_satoshis,
            poll_period_in_seconds: self.poll_period_in_seconds,
        }
    }
}
