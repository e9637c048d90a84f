//! Error types for wallet channels and the command port

use serde_json::{json, Value};
use thiserror::Error;

/// EIP-1193 code for a request the user refused.
pub const USER_REJECTED: i64 = 4001;
/// EIP-1193 code for a method the provider does not support.
pub const UNSUPPORTED_METHOD: i64 = 4200;
/// EIP-1193 code for a provider disconnected from all chains.
pub const DISCONNECTED: i64 = 4900;

/// Wallet bridge errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    /// Provider answered with a JSON-RPC error
    #[error("Provider error {code}: {message}")]
    Provider { code: i64, message: String },

    /// User denied account access or the transaction
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// Bridge session reported a protocol error
    #[error("Session error: {0}")]
    Session(String),

    /// No injected provider was detected at boot
    #[error("No injected wallet provider detected")]
    NoProvider,

    /// No bridge connector is configured
    #[error("Bridge sessions are not available")]
    BridgeUnavailable,

    /// Bridge session is not connected
    #[error("Bridge session not connected")]
    NotConnected,

    /// Provider or session returned something unexpected
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transport to the provider failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl WalletError {
    /// Build from a JSON-RPC error object, keeping user rejections distinct.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == USER_REJECTED {
            WalletError::UserRejected(message)
        } else {
            WalletError::Provider { code, message }
        }
    }

    /// Build from a `{code, message}` JSON value as providers report it.
    pub fn from_value(value: &Value) -> Self {
        let code = value.get("code").and_then(Value::as_i64).unwrap_or(-32603);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| value.to_string());
        Self::from_rpc(code, message)
    }

    /// Numeric code in the EIP-1193 / JSON-RPC space
    pub fn code(&self) -> i64 {
        match self {
            WalletError::Provider { code, .. } => *code,
            WalletError::UserRejected(_) => USER_REJECTED,
            WalletError::NoProvider | WalletError::BridgeUnavailable => UNSUPPORTED_METHOD,
            WalletError::NotConnected => DISCONNECTED,
            WalletError::Session(_) => -32000,
            WalletError::Config(_) => -32602,
            WalletError::Serialization(_) => -32700,
            WalletError::InvalidResponse(_) | WalletError::Transport(_) => -32603,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::UserRejected(_))
    }

    /// Wire form delivered to the application
    pub fn to_json(&self) -> Value {
        json!({ "code": self.code(), "message": self.to_string() })
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WalletError>;
