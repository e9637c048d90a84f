//! ProviderWatcher - invalidates the app's account on provider account/chain changes
//!
//! No reconnect and no diffing: any change means the user reconnects explicitly.

use crate::channel::{ChannelEvent, InjectedChannel, WalletChannel};
use crate::port::Responder;
use crate::runtime::spawn_local;
use futures::future::{abortable, AbortHandle};
use futures::StreamExt;

pub struct ProviderWatcher {
    handle: AbortHandle,
}

impl ProviderWatcher {
    /// Subscribe to the provider and publish `clearWallet` per change.
    pub fn watch(channel: &InjectedChannel, responder: Responder) -> Self {
        let mut events = channel.events();
        let (task, handle) = abortable(async move {
            while let Some(event) = events.next().await {
                match event {
                    ChannelEvent::AccountsChanged(accounts) => {
                        tracing::info!(count = accounts.len(), "provider accounts changed");
                        responder.clear_wallet();
                    }
                    ChannelEvent::ChainChanged(chain_id) => {
                        tracing::info!(chain_id = ?chain_id.map(|c| c.get()), "provider chain changed");
                        responder.clear_wallet();
                    }
                    other => tracing::debug!(event = ?other, "provider event ignored"),
                }
            }
        });
        spawn_local(async move {
            let _ = task.await;
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}
