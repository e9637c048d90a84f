//! Name constants for ports, provider methods and channel events
//!
//! Centralized registry so the port, adapters and bindings agree on spelling.

/// Application-facing port names
pub mod ports {
    pub const CONNECT: &str = "connect";
    pub const WALLET_CONNECT: &str = "wConnect";
    pub const DISCONNECT: &str = "disconnect";
    pub const CLAIM: &str = "claim";
    pub const LOG: &str = "log";

    pub const CONNECT_RESPONSE: &str = "connectResponse";
    pub const CLAIM_RESPONSE: &str = "claimResponse";
    pub const CLEAR_WALLET: &str = "clearWallet";

    pub const COMMANDS: &[&str] = &[CONNECT, WALLET_CONNECT, DISCONNECT, CLAIM, LOG];
}

/// EIP-1193 provider methods
pub mod rpc {
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const SUBSCRIBE: &str = "eth_subscribe";
    pub const SUBSCRIPTION: &str = "eth_subscription";
}

/// Injected provider notifications
pub mod provider_events {
    pub const ACCOUNTS_CHANGED: &str = "accountsChanged";
    pub const CHAIN_CHANGED: &str = "chainChanged";
    pub const DISCONNECT: &str = "disconnect";
}

/// Bridge session notifications
pub mod session_events {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const SESSION_UPDATE: &str = "session_update";
}

/// Tracing target for application `log` passthrough
pub const APP_LOG_TARGET: &str = "wallet_bridge::app";
