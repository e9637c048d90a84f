//! Arbiter - decides which channel answers, routes every command
//!
//! Bridge authority wins whenever the current session reports `connected`; the flag
//! is read fresh on every call so arbiter state never diverges from session state.
//! Every `connect`/`wConnect`/`claim` ends in exactly one response (a successful
//! `wConnect` handshake answers later from the session listener).

use crate::channel::{InjectedChannel, SessionFactory, WalletChannel};
use crate::core::types::{Account, ChainId, ChannelKind};
use crate::error::{Result, WalletError};
use crate::port::Responder;
use crate::session::SessionManager;
use serde_json::Value;

pub struct Arbiter {
    required_chain: ChainId,
    injected: Option<InjectedChannel>,
    sessions: SessionManager,
    responder: Responder,
}

impl Arbiter {
    pub fn new(
        required_chain: ChainId,
        injected: Option<InjectedChannel>,
        factory: Option<Box<dyn SessionFactory>>,
        responder: Responder,
    ) -> Self {
        let sessions = SessionManager::new(factory, responder.clone());
        Self { required_chain, injected, sessions, responder }
    }

    pub fn required_chain(&self) -> ChainId {
        self.required_chain
    }

    /// `hasWallet` boot flag
    pub fn has_wallet(&self) -> bool {
        self.injected.is_some()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Channel a `claim` issued now would use
    pub fn authoritative(&self) -> ChannelKind {
        if self.sessions.connected_channel().is_some() {
            ChannelKind::Bridge
        } else if self.injected.is_some() {
            ChannelKind::Injected
        } else {
            ChannelKind::None
        }
    }

    /// Kill a live bridge session. The injected provider has nothing to tear down.
    pub async fn disconnect(&self) {
        self.sessions.kill_live().await;
    }

    /// Injected flow: kill bridge, check chain, request accounts.
    pub async fn connect(&self) {
        let result = self.try_connect().await;
        match &result {
            Ok(Some(account)) => tracing::info!(%account, "injected wallet connected"),
            Ok(None) => tracing::info!("injected wallet returned no usable account"),
            Err(error) => tracing::warn!(%error, "injected connect failed"),
        }
        self.responder.connect_response(result);
    }

    async fn try_connect(&self) -> Result<Option<Account>> {
        let injected = self.injected.as_ref().ok_or(WalletError::NoProvider)?;
        self.sessions.kill_live().await;

        let chain_id = injected.current_chain_id().await?;
        if chain_id != self.required_chain {
            tracing::info!(%chain_id, required = %self.required_chain, "wrong chain, not requesting accounts");
            return Ok(None);
        }

        injected.request_account().await
    }

    /// Bridge flow: answer at once when connected, otherwise start a fresh handshake.
    pub async fn wallet_connect(&self) {
        if let Some(channel) = self.sessions.connected_channel() {
            let account = channel.first_account();
            tracing::debug!(account = ?account, "bridge already connected");
            self.responder.connect_response(Ok(account));
            return;
        }

        let channel = match self.sessions.replace() {
            Ok(channel) => channel,
            Err(error) => {
                tracing::warn!(%error, "bridge connect unavailable");
                self.responder.connect_response(Err(error));
                return;
            }
        };

        match channel.session().create_session().await {
            Ok(()) => tracing::info!(generation = self.sessions.generation(), "bridge handshake initiated"),
            Err(error) => {
                tracing::warn!(%error, "bridge handshake failed to start");
                self.responder.connect_response(Err(error));
            }
        }
    }

    /// Send the transaction through whichever channel is authoritative. No retry.
    pub async fn claim(&self, payload: Value) {
        let result = self.try_claim(payload).await;
        match &result {
            Ok(tx) => tracing::info!(result = %tx, "claim sent"),
            Err(error) => tracing::warn!(%error, "claim failed"),
        }
        self.responder.claim_response(result);
    }

    async fn try_claim(&self, payload: Value) -> Result<Value> {
        if let Some(bridge) = self.sessions.connected_channel() {
            tracing::debug!(channel = ChannelKind::Bridge.as_str(), "routing claim");
            return bridge.send_transaction(payload).await;
        }
        let injected = self.injected.as_ref().ok_or(WalletError::NoProvider)?;
        tracing::debug!(channel = ChannelKind::Injected.as_str(), "routing claim");
        injected.send_transaction(payload).await
    }
}
