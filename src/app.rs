//! WalletBridge - boot-time assembly of arbiter, watcher and port

use crate::arbiter::Arbiter;
use crate::channel::{Eip1193Provider, InjectedChannel, SessionFactory};
use crate::config::{BootFlags, BridgeConfig};
use crate::core::types::ChannelKind;
use crate::port::{self, Command, Outbound, Port};
use crate::watcher::ProviderWatcher;
use futures::channel::mpsc;
use futures::Stream;
use std::rc::Rc;

/// One boot of the bridge. Owns the only arbiter; nothing else holds channel state.
pub struct WalletBridge {
    arbiter: Rc<Arbiter>,
    port: Port,
    watcher: Option<ProviderWatcher>,
    flags: BootFlags,
}

impl WalletBridge {
    /// Wire everything up. Spawns listener tasks, so call it inside a local executor.
    ///
    /// `provider` is the injected provider detected at boot (absent means `hasWallet = false`);
    /// `factory` builds bridge sessions (absent means `wConnect` answers with an error).
    pub fn boot(
        config: BridgeConfig,
        provider: Option<Rc<dyn Eip1193Provider>>,
        factory: Option<Box<dyn SessionFactory>>,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (responder, outbound) = port::outbound();
        let injected = provider.map(InjectedChannel::new);
        let watcher = injected.as_ref().map(|channel| ProviderWatcher::watch(channel, responder.clone()));

        let arbiter = Rc::new(Arbiter::new(config.chain_id, injected, factory, responder));
        arbiter.sessions().restore();

        let flags = config.boot_flags(arbiter.has_wallet());
        tracing::info!(
            chain_id = %flags.chain_id,
            has_wallet = flags.has_wallet,
            bridge = arbiter.sessions().is_available(),
            "wallet bridge booted"
        );

        let port = Port::new(arbiter.clone());
        (Self { arbiter, port, watcher, flags }, outbound)
    }

    pub fn flags(&self) -> &BootFlags {
        &self.flags
    }

    pub fn arbiter(&self) -> &Rc<Arbiter> {
        &self.arbiter
    }

    pub fn authoritative(&self) -> ChannelKind {
        self.arbiter.authoritative()
    }

    pub fn send(&self, command: Command) {
        self.port.dispatch(command);
    }

    pub async fn run<S>(&self, commands: S)
    where
        S: Stream<Item = Command>,
    {
        self.port.run(commands).await;
    }

    /// Stop watching provider events; in-flight commands still complete.
    pub fn shutdown(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.stop();
        }
    }
}
