//! Value types shared by every channel: accounts, chain ids, channel tags

use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Opaque wallet address as reported by the provider or session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty strings are not usable accounts.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().filter(|s| !s.is_empty()).map(Self::new)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Account {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Parse an accounts array for change notifications. Empty entries are skipped,
/// non-string entries are a protocol violation.
pub fn parse_accounts(value: &Value) -> Result<Vec<Account>> {
    let items = value
        .as_array()
        .ok_or_else(|| WalletError::InvalidResponse(format!("expected accounts array, got {}", value)))?;
    items
        .iter()
        .filter(|item| !matches!(item.as_str(), Some("")))
        .map(|item| {
            Account::from_value(item)
                .ok_or_else(|| WalletError::InvalidResponse(format!("invalid account: {}", item)))
        })
        .collect()
}

/// Canonical account of a raw accounts array: element 0 and nothing else.
/// An empty or non-string first entry means no account, whatever follows it.
pub fn first_account(accounts: &Value) -> Result<Option<Account>> {
    let items = accounts
        .as_array()
        .ok_or_else(|| WalletError::InvalidResponse(format!("expected accounts array, got {}", accounts)))?;
    Ok(items.first().and_then(Account::from_value))
}

/// Positive chain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ChainId(u64);

impl ChainId {
    pub const MAINNET: ChainId = ChainId(1);

    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Providers report `"0x1"`, `"1"` or `1`; all parse alike.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => s.parse(),
            Value::Number(n) => n
                .as_u64()
                .and_then(Self::new)
                .ok_or_else(|| WalletError::InvalidResponse(format!("invalid chain id: {}", n))),
            other => Err(WalletError::InvalidResponse(format!("invalid chain id: {}", other))),
        }
    }
}

impl FromStr for ChainId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse::<u64>().ok(),
        };
        parsed
            .and_then(Self::new)
            .ok_or_else(|| WalletError::InvalidResponse(format!("invalid chain id: {:?}", s)))
    }
}

impl TryFrom<u64> for ChainId {
    type Error = String;

    fn try_from(value: u64) -> std::result::Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "chain id must be positive".to_string())
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which channel currently answers `claim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    None,
    Injected,
    Bridge,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::None => "none",
            ChannelKind::Injected => "injected",
            ChannelKind::Bridge => "bridge",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_id_parses_every_provider_form() {
        assert_eq!(ChainId::from_value(&json!("0x1")).unwrap(), ChainId::MAINNET);
        assert_eq!(ChainId::from_value(&json!("0X89")).unwrap().get(), 137);
        assert_eq!(ChainId::from_value(&json!("4")).unwrap().get(), 4);
        assert_eq!(ChainId::from_value(&json!(5)).unwrap().get(), 5);
    }

    #[test]
    fn chain_id_rejects_zero_and_garbage() {
        assert!(ChainId::from_value(&json!("0x0")).is_err());
        assert!(ChainId::from_value(&json!(0)).is_err());
        assert!(ChainId::from_value(&json!("mainnet")).is_err());
        assert!(ChainId::from_value(&json!(null)).is_err());
        assert!(serde_json::from_value::<ChainId>(json!(0)).is_err());
        assert_eq!(serde_json::from_value::<ChainId>(json!(1)).unwrap(), ChainId::MAINNET);
    }

    #[test]
    fn accounts_skip_empty_and_reject_non_strings() {
        let accounts = parse_accounts(&json!(["0xABC", "", "0xDEF"])).unwrap();
        assert_eq!(accounts, vec![Account::from("0xABC"), Account::from("0xDEF")]);

        assert!(parse_accounts(&json!([42])).is_err());
        assert!(parse_accounts(&json!({"accounts": []})).is_err());
    }

    #[test]
    fn first_account_is_element_zero_only() {
        assert_eq!(first_account(&json!(["0xABC", "0xDEF"])).unwrap(), Some(Account::from("0xABC")));
        assert_eq!(first_account(&json!(["", "0xSECOND"])).unwrap(), None);
        assert_eq!(first_account(&json!([null, "0xB"])).unwrap(), None);
        assert_eq!(first_account(&json!([42, "0xB"])).unwrap(), None);
        assert_eq!(first_account(&json!([])).unwrap(), None);
        assert!(first_account(&json!("0xABC")).is_err());
    }
}
