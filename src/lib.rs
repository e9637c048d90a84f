//! Wallet Bridge: one connect/claim API over two wallet channels.
//!
//! # Architecture
//!
//! ```text
//! Application (opaque consumer)
//!   │  commands: connect, wConnect, disconnect, claim, log
//!   ▼
//! Port ──────────────► Outbound: connectResponse, claimResponse, clearWallet
//!   │                        ▲                ▲
//!   ▼                        │                │
//! Arbiter ───────────────────┘                │
//!   ├── InjectedChannel (EIP-1193 provider) ──┼── ProviderWatcher
//!   └── SessionManager                        │
//!         └── BridgeChannel (pairing session) ┘  (listener task per session)
//! ```
//!
//! Exactly one channel is authoritative: a connected bridge session always wins,
//! otherwise the injected provider answers.
//!
//! # Ports
//!
//! | Command | Payload | Response | Payload |
//! |---------|---------|----------|---------|
//! | `connect` | none | `connectResponse` | account, `null` or error |
//! | `wConnect` | none | `connectResponse` (from handshake event) | account, `null` or error |
//! | `disconnect` | none | none | none |
//! | `claim` | transaction (JSON) | `claimResponse` | result or error |
//! | `log` | any JSON | none | none |
//! | (provider/session events) | | `clearWallet` | `null` |
//!
//! # Features
//!
//! - `native` - tokio local executor, WebSocket JSON-RPC provider, stdio server
//! - `wasm` - browser bindings over `window.ethereum` and a JS bridge connector
//! - `test-utils` - scripted provider and session doubles
//!
//! # Usage
//!
//! ```ignore
//! use wallet_bridge::{BridgeConfig, Command, WalletBridge};
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let (bridge, mut outbound) = WalletBridge::boot(BridgeConfig::default(), Some(provider), None);
//!     bridge.send(Command::Connect);
//!     let response = outbound.next().await;
//! }).await;
//! ```

#[cfg(not(any(feature = "native", feature = "wasm")))]
compile_error!("enable either the `native` or the `wasm` feature");

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod app;
pub mod arbiter;
pub mod channel;
pub mod config;
pub mod core;
pub mod error;
pub mod port;
pub mod runtime;
pub mod session;
pub mod watcher;

// =============================================================================
// Native-only modules (tokio, WebSocket provider, tracing subscriber)
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod provider;

#[cfg(all(feature = "native", any(test, feature = "test-utils")))]
pub mod testing;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports
// =============================================================================
pub use app::WalletBridge;
pub use arbiter::Arbiter;
pub use channel::{
    BridgeChannel, BridgeSession, ChannelEvent, Eip1193Provider, InjectedChannel, ProviderEvent,
    SessionEvent, SessionFactory, WalletChannel,
};
pub use config::{BootFlags, BridgeConfig};
pub use core::types::{Account, ChainId, ChannelKind};
pub use error::{Result, WalletError};
pub use port::{Command, Outbound, Port, Responder};
pub use session::SessionManager;
pub use watcher::ProviderWatcher;

#[cfg(feature = "native")]
pub use provider::WsProvider;
#[cfg(feature = "native")]
pub use runtime::{install_signal_handlers, Shutdown};

#[cfg(feature = "wasm")]
pub use wasm::JsWalletBridge;
