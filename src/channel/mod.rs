//! Channels - the two wallet connection modalities behind one trait
//!
//! ```text
//! WalletChannel (trait)
//!     │
//!     ├── InjectedChannel ── Eip1193Provider (window.ethereum, WsProvider)
//!     │
//!     └── BridgeChannel ──── BridgeSession (pairing session, created by SessionFactory)
//! ```
//!
//! Both adapters expose the same operation set and normalize their native
//! notifications into a [`ChannelEvent`] stream.

mod bridge;
mod injected;

pub use bridge::{account_from_payload, BridgeChannel, BridgeSession, SessionEvent, SessionFactory};
pub use injected::{Eip1193Provider, InjectedChannel, ProviderEvent};

use crate::core::types::{Account, ChainId, ChannelKind};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use serde_json::Value;

/// Normalized out-of-band notification from a channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Bridge handshake completed; carries the canonical account, if any
    Connected(Option<Account>),
    AccountsChanged(Vec<Account>),
    /// New chain, `None` when the payload was unreadable
    ChainChanged(Option<ChainId>),
    Disconnected,
    /// Protocol error reported alongside an event
    Error { event: &'static str, error: WalletError },
}

pub type EventStream = LocalBoxStream<'static, ChannelEvent>;

/// Operation set every channel answers.
#[async_trait(?Send)]
pub trait WalletChannel {
    fn kind(&self) -> ChannelKind;
    /// Canonical account: first entry of the wallet's accounts array.
    async fn request_account(&self) -> Result<Option<Account>>;
    async fn send_transaction(&self, payload: Value) -> Result<Value>;
    async fn current_chain_id(&self) -> Result<ChainId>;
    /// Fresh subscription; each call returns an independent stream.
    fn events(&self) -> EventStream;
}
