//! SessionManager - bridge session construction, event wiring and teardown
//!
//! Each session object gets one listener task for its lifetime:
//!
//! ```text
//! connect (ok)     → connectResponse(first account)
//! connect (err)    → log only
//! disconnect (ok)  → clearWallet
//! disconnect (err) → log only
//! ```
//!
//! Replacing a session drops its `LiveSession`, which aborts the listener, so a
//! discarded session's late handshake can never reach the application.

use crate::channel::{BridgeChannel, ChannelEvent, EventStream, SessionFactory, WalletChannel};
use crate::error::{Result, WalletError};
use crate::port::Responder;
use crate::runtime::{spawn_local, yield_now};
use futures::future::{abortable, AbortHandle};
use futures::StreamExt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct LiveSession {
    channel: Rc<BridgeChannel>,
    listener: AbortHandle,
    generation: u64,
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub struct SessionManager {
    factory: Option<Box<dyn SessionFactory>>,
    current: RefCell<Option<LiveSession>>,
    generation: Cell<u64>,
    responder: Responder,
}

impl SessionManager {
    pub fn new(factory: Option<Box<dyn SessionFactory>>, responder: Responder) -> Self {
        Self { factory, current: RefCell::new(None), generation: Cell::new(0), responder }
    }

    pub fn is_available(&self) -> bool {
        self.factory.is_some()
    }

    /// Adopt a session the connector restored from a previous page load.
    pub fn restore(&self) -> bool {
        let Some(session) = self.factory.as_ref().and_then(|f| f.restore()) else {
            return false;
        };
        let channel = Rc::new(BridgeChannel::new(session));
        let connected = channel.is_connected();
        let live = self.arm(channel);
        tracing::info!(generation = live.generation, connected, "restored bridge session");
        *self.current.borrow_mut() = Some(live);
        true
    }

    /// Current session object, connected or not
    pub fn current(&self) -> Option<Rc<BridgeChannel>> {
        self.current.borrow().as_ref().map(|live| live.channel.clone())
    }

    /// Current session only while its own `connected` flag holds
    pub fn connected_channel(&self) -> Option<Rc<BridgeChannel>> {
        self.current().filter(|channel| channel.is_connected())
    }

    /// Number of session objects armed since boot
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Kill the session if it is live. Killing a dead or missing session is a no-op.
    ///
    /// Returns after the listener has seen any disconnect event the kill fired, so
    /// `clearWallet` reaches the application ahead of the caller's own response.
    pub async fn kill_live(&self) {
        let Some(channel) = self.connected_channel() else {
            return;
        };
        match channel.session().kill_session().await {
            Ok(()) => tracing::info!(bridge = %channel.session().bridge_url(), "bridge session killed"),
            Err(error) => tracing::warn!(%error, "bridge session kill failed"),
        }
        yield_now().await;
    }

    /// Discard the current session and arm a fresh one. The handshake is not started here.
    pub fn replace(&self) -> Result<Rc<BridgeChannel>> {
        let factory = self.factory.as_ref().ok_or(WalletError::BridgeUnavailable)?;
        // Drop the old session first so its listener is aborted before the new one exists.
        self.current.borrow_mut().take();

        let channel = Rc::new(BridgeChannel::new(factory.create()));
        let live = self.arm(channel.clone());
        tracing::debug!(generation = live.generation, bridge = %channel.session().bridge_url(), "new bridge session");
        *self.current.borrow_mut() = Some(live);
        Ok(channel)
    }

    fn arm(&self, channel: Rc<BridgeChannel>) -> LiveSession {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let (listener, handle) = abortable(listen(channel.events(), self.responder.clone(), generation));
        spawn_local(async move {
            let _ = listener.await;
        });
        LiveSession { channel, listener: handle, generation }
    }
}

async fn listen(mut events: EventStream, responder: Responder, generation: u64) {
    while let Some(event) = events.next().await {
        match event {
            ChannelEvent::Connected(account) => {
                tracing::info!(generation, account = ?account, "bridge handshake completed");
                responder.connect_response(Ok(account));
            }
            ChannelEvent::Disconnected => {
                tracing::info!(generation, "bridge session disconnected");
                responder.clear_wallet();
            }
            ChannelEvent::Error { event, error } => {
                tracing::error!(generation, event, %error, "bridge session error");
                #[cfg(feature = "wasm")]
                crate::wasm::console_error(&format!("bridge session {} error: {}", event, error));
            }
            ChannelEvent::AccountsChanged(_) | ChannelEvent::ChainChanged(_) => {
                tracing::debug!(generation, "bridge session update ignored");
            }
        }
    }
    tracing::debug!(generation, "bridge session events closed");
}

#[cfg(all(test, feature = "native"))]
mod tests {
    use super::*;
    use crate::port::{self, Outbound};
    use crate::testing::{drain_outbound, run_local, MockFactory, MockSession};

    #[test]
    fn replaced_session_events_are_inert() {
        run_local(async {
            let (responder, mut rx) = port::outbound();
            let factory = MockFactory::new();
            let sessions = SessionManager::new(Some(Box::new(factory.clone())), responder);

            sessions.replace().unwrap();
            sessions.replace().unwrap();
            assert_eq!(sessions.generation(), 2);

            factory.session(0).complete_handshake(&["0xSTALE"]);
            assert!(drain_outbound(&mut rx).await.is_empty());

            factory.session(1).complete_handshake(&["0xFRESH"]);
            assert_eq!(
                drain_outbound(&mut rx).await,
                vec![Outbound::ConnectResponse(Ok(Some("0xFRESH".into())))]
            );
        });
    }

    #[test]
    fn kill_live_ignores_unpaired_sessions() {
        run_local(async {
            let (responder, mut rx) = port::outbound();
            let factory = MockFactory::new();
            let sessions = SessionManager::new(Some(Box::new(factory.clone())), responder);

            sessions.kill_live().await;
            sessions.replace().unwrap();
            sessions.kill_live().await;
            assert_eq!(factory.session(0).kills(), 0);
            assert!(drain_outbound(&mut rx).await.is_empty());
        });
    }

    #[test]
    fn restore_adopts_paired_session() {
        run_local(async {
            let (responder, mut rx) = port::outbound();
            let restored = MockSession::paired(7, &["0xRESTORED"]);
            let sessions = SessionManager::new(Some(Box::new(MockFactory::with_restorable(restored.clone()))), responder);

            assert!(sessions.restore());
            let channel = sessions.connected_channel().expect("restored session is live");
            assert_eq!(channel.first_account(), Some("0xRESTORED".into()));

            restored.remote_disconnect();
            assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ClearWallet]);
            assert!(sessions.connected_channel().is_none());
        });
    }

    #[test]
    fn replace_without_factory_is_unavailable() {
        let (responder, _rx) = port::outbound();
        let sessions = SessionManager::new(None, responder);
        assert!(!sessions.restore());
        assert_eq!(sessions.replace().err(), Some(WalletError::BridgeUnavailable));
    }
}
