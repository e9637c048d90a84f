//! InjectedChannel - in-page provider speaking the EIP-1193 `request` interface

use super::{ChannelEvent, EventStream, WalletChannel};
use crate::core::paths::rpc;
use crate::core::types::{first_account, parse_accounts, Account, ChainId, ChannelKind};
use crate::error::Result;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use std::rc::Rc;

/// Raw provider notification, payload untouched
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    AccountsChanged(Value),
    ChainChanged(Value),
    Disconnect(Value),
}

/// External provider surface. Implemented by the browser binding and `WsProvider`.
#[async_trait(?Send)]
pub trait Eip1193Provider {
    /// `params` is `Value::Null` when the method takes none.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;
}

#[derive(Clone)]
pub struct InjectedChannel {
    provider: Rc<dyn Eip1193Provider>,
}

impl InjectedChannel {
    pub fn new(provider: Rc<dyn Eip1193Provider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Rc<dyn Eip1193Provider> {
        &self.provider
    }
}

#[async_trait(?Send)]
impl WalletChannel for InjectedChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Injected
    }

    async fn request_account(&self) -> Result<Option<Account>> {
        let accounts = self.provider.request(rpc::REQUEST_ACCOUNTS, Value::Null).await?;
        first_account(&accounts)
    }

    async fn send_transaction(&self, payload: Value) -> Result<Value> {
        self.provider.request(rpc::SEND_TRANSACTION, json!([payload])).await
    }

    async fn current_chain_id(&self) -> Result<ChainId> {
        let chain_id = self.provider.request(rpc::CHAIN_ID, Value::Null).await?;
        ChainId::from_value(&chain_id)
    }

    fn events(&self) -> EventStream {
        self.provider.subscribe().map(normalize).boxed_local()
    }
}

fn normalize(event: ProviderEvent) -> ChannelEvent {
    match event {
        ProviderEvent::AccountsChanged(value) => {
            ChannelEvent::AccountsChanged(parse_accounts(&value).unwrap_or_default())
        }
        ProviderEvent::ChainChanged(value) => ChannelEvent::ChainChanged(ChainId::from_value(&value).ok()),
        ProviderEvent::Disconnect(_) => ChannelEvent::Disconnected,
    }
}
