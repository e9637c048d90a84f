//! BridgeChannel - remote pairing session (WalletConnect-style relay + QR handshake)

use super::{ChannelEvent, EventStream, WalletChannel};
use crate::core::paths::session_events;
use crate::core::types::{first_account, parse_accounts, Account, ChainId, ChannelKind};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::Value;

/// Raw session notification: `(error, payload)` folded into a `Result`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connect(std::result::Result<Value, String>),
    Disconnect(std::result::Result<Value, String>),
    SessionUpdate(std::result::Result<Value, String>),
}

/// External pairing session surface.
#[async_trait(?Send)]
pub trait BridgeSession {
    fn connected(&self) -> bool;
    /// Accounts array exactly as the connector reports it.
    fn accounts(&self) -> Value;
    fn chain_id(&self) -> Option<ChainId>;
    /// Relay endpoint this session pairs through
    fn bridge_url(&self) -> String;
    /// Starts the handshake. Completion arrives later as `SessionEvent::Connect`.
    async fn create_session(&self) -> Result<()>;
    async fn kill_session(&self) -> Result<()>;
    async fn send_transaction(&self, tx: Value) -> Result<Value>;
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent>;
}

/// Builds session objects. One per `wConnect` from a disconnected state.
pub trait SessionFactory {
    fn create(&self) -> Box<dyn BridgeSession>;

    /// Session persisted by a previous page load, if the connector restored one.
    fn restore(&self) -> Option<Box<dyn BridgeSession>> {
        None
    }
}

pub struct BridgeChannel {
    session: Box<dyn BridgeSession>,
}

impl BridgeChannel {
    pub fn new(session: Box<dyn BridgeSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &dyn BridgeSession {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected()
    }

    pub fn first_account(&self) -> Option<Account> {
        first_account(&self.session.accounts()).ok().flatten()
    }
}

#[async_trait(?Send)]
impl WalletChannel for BridgeChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Bridge
    }

    async fn request_account(&self) -> Result<Option<Account>> {
        if !self.session.connected() {
            return Err(WalletError::NotConnected);
        }
        first_account(&self.session.accounts())
    }

    async fn send_transaction(&self, payload: Value) -> Result<Value> {
        self.session.send_transaction(payload).await
    }

    async fn current_chain_id(&self) -> Result<ChainId> {
        self.session.chain_id().ok_or(WalletError::NotConnected)
    }

    fn events(&self) -> EventStream {
        self.session.subscribe().map(normalize).boxed_local()
    }
}

/// Canonical account of a connect payload: `params[0].accounts[0]`.
pub fn account_from_payload(payload: &Value) -> Option<Account> {
    payload
        .pointer("/params/0/accounts")
        .and_then(|accounts| first_account(accounts).ok())
        .flatten()
}

fn accounts_from_payload(payload: &Value) -> Vec<Account> {
    payload
        .pointer("/params/0/accounts")
        .and_then(|accounts| parse_accounts(accounts).ok())
        .unwrap_or_default()
}

fn normalize(event: SessionEvent) -> ChannelEvent {
    match event {
        SessionEvent::Connect(Ok(payload)) => ChannelEvent::Connected(account_from_payload(&payload)),
        SessionEvent::Connect(Err(error)) => ChannelEvent::Error {
            event: session_events::CONNECT,
            error: WalletError::Session(error),
        },
        SessionEvent::Disconnect(Ok(_)) => ChannelEvent::Disconnected,
        SessionEvent::Disconnect(Err(error)) => ChannelEvent::Error {
            event: session_events::DISCONNECT,
            error: WalletError::Session(error),
        },
        SessionEvent::SessionUpdate(Ok(payload)) => ChannelEvent::AccountsChanged(accounts_from_payload(&payload)),
        SessionEvent::SessionUpdate(Err(error)) => ChannelEvent::Error {
            event: session_events::SESSION_UPDATE,
            error: WalletError::Session(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connect_payload_yields_first_account() {
        let payload = json!({"event": "connect", "params": [{"accounts": ["0xDEF", "0x123"], "chainId": 1}]});
        assert_eq!(
            normalize(SessionEvent::Connect(Ok(payload))),
            ChannelEvent::Connected(Some(Account::from("0xDEF")))
        );
    }

    #[test]
    fn blank_first_account_is_not_replaced_by_the_next() {
        let payload = json!({"params": [{"accounts": ["", "0xSECOND"]}]});
        assert_eq!(normalize(SessionEvent::Connect(Ok(payload))), ChannelEvent::Connected(None));
        assert_eq!(account_from_payload(&json!({"params": [{"accounts": [null, "0xB"]}]})), None);
    }

    #[test]
    fn malformed_connect_payload_yields_no_account() {
        assert_eq!(normalize(SessionEvent::Connect(Ok(json!({})))), ChannelEvent::Connected(None));
        assert_eq!(account_from_payload(&json!({"params": [{"accounts": "0xDEF"}]})), None);
    }

    #[test]
    fn session_update_lists_readable_accounts() {
        let payload = json!({"params": [{"accounts": ["0xA", "", "0xB"]}]});
        assert_eq!(
            normalize(SessionEvent::SessionUpdate(Ok(payload))),
            ChannelEvent::AccountsChanged(vec![Account::from("0xA"), Account::from("0xB")])
        );
    }

    #[test]
    fn event_errors_carry_their_event_name() {
        match normalize(SessionEvent::Disconnect(Err("relay closed".into()))) {
            ChannelEvent::Error { event, error } => {
                assert_eq!(event, "disconnect");
                assert_eq!(error, WalletError::Session("relay closed".into()));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(normalize(SessionEvent::Disconnect(Ok(json!(null)))), ChannelEvent::Disconnected);
    }
}
