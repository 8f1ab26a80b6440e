//! Vault deployment configuration
//!
//! Defaults target the Base USDC vault. Values can come from a TOML file
//! (`EARNVAULT_CONFIG_PATH`, default `earnvault.toml`) and are then overridden
//! by individual environment variables.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::Address;
use crate::policy::UnknownAllowance;

pub const DEFAULT_CONFIG_PATH: &str = "earnvault.toml";

/// Base mainnet
pub const BASE_CHAIN_ID: u64 = 8453;
pub const DEFAULT_VAULT_ADDRESS: &str = "0x7BfA7C4f149E7415b73bdeDfe609237e29CBF34A";
/// USDC on Base
pub const DEFAULT_ASSET_ADDRESS: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

const DEFAULT_VAULT: Address = Address::from_bytes([
    0x7b, 0xfa, 0x7c, 0x4f, 0x14, 0x9e, 0x74, 0x15, 0xb7, 0x3b, 0xde, 0xdf, 0xe6, 0x09, 0x23,
    0x7e, 0x29, 0xcb, 0xf3, 0x4a,
]);
const DEFAULT_ASSET: Address = Address::from_bytes([
    0x83, 0x35, 0x89, 0xfc, 0xd6, 0xed, 0xb6, 0xe0, 0x8f, 0x4c, 0x7c, 0x32, 0xd4, 0xf7, 0x1b,
    0x54, 0xbd, 0xa0, 0x29, 0x13,
]);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_vault_address")]
    pub vault_address: Address,

    #[serde(default = "default_asset_address")]
    pub asset_address: Address,

    #[serde(default = "default_asset_symbol")]
    pub asset_symbol: String,

    #[serde(default = "default_decimals")]
    pub asset_decimals: u8,

    /// Vault share exponent. Falls back to `asset_decimals` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_decimals: Option<u8>,

    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_indexer_url")]
    pub indexer_url: String,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub unknown_allowance: UnknownAllowance,

    /// How long `deposit --approve` waits for the new allowance to show up.
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,

    #[serde(default = "default_approval_poll_ms")]
    pub approval_poll_ms: u64,
}

fn default_chain_id() -> u64 {
    BASE_CHAIN_ID
}
fn default_vault_address() -> Address {
    DEFAULT_VAULT
}
fn default_asset_address() -> Address {
    DEFAULT_ASSET
}
fn default_asset_symbol() -> String {
    "USDC".to_string()
}
fn default_decimals() -> u8 {
    6
}
fn default_rpc_url() -> String {
    "https://mainnet.base.org".to_string()
}
fn default_indexer_url() -> String {
    "https://blue-api.morpho.org/graphql".to_string()
}
fn default_http_timeout_secs() -> u64 {
    10
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_approval_timeout_secs() -> u64 {
    60
}
fn default_approval_poll_ms() -> u64 {
    2000
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            vault_address: default_vault_address(),
            asset_address: default_asset_address(),
            asset_symbol: default_asset_symbol(),
            asset_decimals: default_decimals(),
            share_decimals: None,
            rpc_url: default_rpc_url(),
            indexer_url: default_indexer_url(),
            http_timeout_secs: default_http_timeout_secs(),
            bind_addr: default_bind_addr(),
            unknown_allowance: UnknownAllowance::default(),
            approval_timeout_secs: default_approval_timeout_secs(),
            approval_poll_ms: default_approval_poll_ms(),
        }
    }
}

impl VaultConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// File (if present) then environment overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::var("EARNVAULT_CONFIG_PATH").ok();
        let mut cfg = match &path {
            Some(p) => Self::load(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => {
                tracing::debug!("No {} found, using built-in vault config", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Apply `EARNVAULT_*` overrides from `lookup`. Malformed numbers and
    /// addresses are errors rather than silently ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("EARNVAULT_CHAIN_ID") {
            self.chain_id = v.parse().context("EARNVAULT_CHAIN_ID")?;
        }
        if let Some(v) = get("EARNVAULT_VAULT_ADDRESS") {
            self.vault_address = v.parse().context("EARNVAULT_VAULT_ADDRESS")?;
        }
        if let Some(v) = get("EARNVAULT_ASSET_ADDRESS") {
            self.asset_address = v.parse().context("EARNVAULT_ASSET_ADDRESS")?;
        }
        if let Some(v) = get("EARNVAULT_ASSET_SYMBOL") {
            self.asset_symbol = v;
        }
        if let Some(v) = get("EARNVAULT_ASSET_DECIMALS") {
            self.asset_decimals = v.parse().context("EARNVAULT_ASSET_DECIMALS")?;
        }
        if let Some(v) = get("EARNVAULT_SHARE_DECIMALS") {
            self.share_decimals = Some(v.parse().context("EARNVAULT_SHARE_DECIMALS")?);
        }
        if let Some(v) = get("EARNVAULT_RPC_URL") {
            self.rpc_url = v;
        }
        if let Some(v) = get("EARNVAULT_INDEXER_URL") {
            self.indexer_url = v;
        }
        if let Some(v) = get("EARNVAULT_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .context("EARNVAULT_HTTP_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Some(v) = get("EARNVAULT_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = get("EARNVAULT_UNKNOWN_ALLOWANCE") {
            self.unknown_allowance = v
                .parse()
                .map_err(anyhow::Error::msg)
                .context("EARNVAULT_UNKNOWN_ALLOWANCE")?;
        }
        if let Some(v) = get("EARNVAULT_APPROVAL_TIMEOUT_SECS") {
            self.approval_timeout_secs = v
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .context("EARNVAULT_APPROVAL_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Some(v) = get("EARNVAULT_APPROVAL_POLL_MS") {
            self.approval_poll_ms = v.parse().context("EARNVAULT_APPROVAL_POLL_MS")?;
        }
        Ok(())
    }

    pub fn share_decimals(&self) -> u8 {
        self.share_decimals.unwrap_or(self.asset_decimals)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs.max(1))
    }

    pub fn approval_poll(&self) -> Duration {
        Duration::from_millis(self.approval_poll_ms.max(10))
    }
}
