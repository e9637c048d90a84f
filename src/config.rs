//! Bridge configuration - fixed at boot, read-only afterwards
//!
//! Layering: defaults → JSON file → environment → caller overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WALLET_BRIDGE_CONTRACT` | `contract` |
//! | `WALLET_BRIDGE_CHAIN_ID` | `chainId` (decimal or `0x` hex) |
//! | `WALLET_BRIDGE_BRIDGE_URL` | `bridgeUrl` |
//! | `WALLET_BRIDGE_PROVIDER_URL` | `providerUrl` |

use crate::core::types::ChainId;
use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_CONTRACT: &str = "0x531A67A6F75E93507a53276Eaf3677f895416d0e";
pub const DEFAULT_BRIDGE_URL: &str = "https://bridge.walletconnect.org";

pub const ENV_CONTRACT: &str = "WALLET_BRIDGE_CONTRACT";
pub const ENV_CHAIN_ID: &str = "WALLET_BRIDGE_CHAIN_ID";
pub const ENV_BRIDGE_URL: &str = "WALLET_BRIDGE_BRIDGE_URL";
pub const ENV_PROVIDER_URL: &str = "WALLET_BRIDGE_PROVIDER_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Contract the claim transaction targets
    pub contract: String,
    /// The single chain connects are accepted on
    pub chain_id: ChainId,
    /// Relay endpoint for bridge sessions
    pub bridge_url: String,
    /// Native only: JSON-RPC WebSocket endpoint standing in for the injected provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
    /// Viewport width handed to the app, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Static asset data passed through untouched
    pub assets: Value,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            contract: DEFAULT_CONTRACT.into(),
            chain_id: ChainId::MAINNET,
            bridge_url: DEFAULT_BRIDGE_URL.into(),
            provider_url: None,
            width: None,
            assets: Value::Null,
        }
    }
}

impl BridgeConfig {
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self { self.contract = contract.into(); self }
    pub fn with_chain_id(mut self, chain_id: ChainId) -> Self { self.chain_id = chain_id; self }
    pub fn with_bridge_url(mut self, url: impl Into<String>) -> Self { self.bridge_url = url.into(); self }
    pub fn with_provider_url(mut self, url: impl Into<String>) -> Self { self.provider_url = Some(url.into()); self }
    pub fn with_width(mut self, width: u32) -> Self { self.width = Some(width); self }
    pub fn with_assets(mut self, assets: Value) -> Self { self.assets = assets; self }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| WalletError::Config(format!("parse {}: {}", path.display(), e)))
    }

    /// `<config_dir>/wallet-bridge/config.json`
    #[cfg(feature = "native")]
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wallet-bridge").join("config.json"))
    }

    /// Explicit path must exist; the default path is used only when present.
    #[cfg(feature = "native")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `WALLET_BRIDGE_*` variables that are set and non-empty.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(contract) = var(ENV_CONTRACT) {
            self.contract = contract;
        }
        if let Some(chain_id) = var(ENV_CHAIN_ID) {
            self.chain_id = chain_id
                .parse()
                .map_err(|_| WalletError::Config(format!("{}: invalid chain id {:?}", ENV_CHAIN_ID, chain_id)))?;
        }
        if let Some(url) = var(ENV_BRIDGE_URL) {
            self.bridge_url = url;
        }
        if let Some(url) = var(ENV_PROVIDER_URL) {
            self.provider_url = Some(url);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let hex = self.contract.strip_prefix("0x").unwrap_or("");
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WalletError::Config(format!("invalid contract address: {:?}", self.contract)));
        }
        if self.bridge_url.trim().is_empty() {
            return Err(WalletError::Config("bridge url is empty".into()));
        }
        Ok(())
    }

    pub fn boot_flags(&self, has_wallet: bool) -> BootFlags {
        BootFlags {
            contract: self.contract.clone(),
            chain_id: self.chain_id,
            has_wallet,
            width: self.width,
            assets: self.assets.clone(),
        }
    }
}

/// Read-only snapshot handed to the application at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootFlags {
    pub contract: String,
    pub chain_id: ChainId,
    pub has_wallet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub assets: Value,
}
