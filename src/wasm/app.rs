//! JsWalletBridge - the page-facing class

use super::connector::JsSessionFactory;
use super::js;
use super::log;
use super::provider::JsProvider;
use crate::app::WalletBridge;
use crate::channel::{Eip1193Provider, SessionFactory};
use crate::config::BridgeConfig;
use crate::port::{Command, Outbound};
use futures::channel::mpsc;
use futures::StreamExt;
use js_sys::Function;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WalletBridge: connect/claim over `window.ethereum` or a pairing connector
#[wasm_bindgen(js_name = WalletBridge)]
pub struct JsWalletBridge {
    bridge: WalletBridge,
    outbound: RefCell<Option<mpsc::UnboundedReceiver<Outbound>>>,
}

#[wasm_bindgen(js_class = WalletBridge)]
impl JsWalletBridge {
    /// Boot with a partial config object and an optional `(bridgeUrl) => connector` factory.
    #[wasm_bindgen]
    pub fn boot(config: JsValue, connector_factory: Option<Function>) -> Result<JsWalletBridge, JsValue> {
        let mut config: BridgeConfig = if config.is_undefined() || config.is_null() {
            BridgeConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        config.validate().map_err(js_err)?;
        if config.width.is_none() {
            if let Some(width) = viewport_width() {
                config = config.with_width(width);
            }
        }

        let provider = JsProvider::detect().map(|p| Rc::new(p) as Rc<dyn Eip1193Provider>);
        let factory = connector_factory
            .map(|build| Box::new(JsSessionFactory::new(build, config.bridge_url.clone())) as Box<dyn SessionFactory>);
        log!(
            "[WalletBridge] booting: provider={} connector={}",
            provider.is_some(),
            factory.is_some()
        );

        let (bridge, outbound) = WalletBridge::boot(config, provider, factory);
        Ok(Self { bridge, outbound: RefCell::new(Some(outbound)) })
    }

    /// Send `{port, data}` from the application.
    #[wasm_bindgen]
    pub fn send(&self, message: JsValue) -> Result<(), JsValue> {
        let message = js::from_js(message).map_err(js_err)?;
        let command = Command::from_json(&message).map_err(js_err)?;
        self.bridge.send(command);
        Ok(())
    }

    /// Deliver every outbound `{port, data | error}` to `callback`. Only one subscriber.
    #[wasm_bindgen]
    pub fn subscribe(&self, callback: Function) -> Result<(), JsValue> {
        let mut outbound = self
            .outbound
            .borrow_mut()
            .take()
            .ok_or_else(|| JsValue::from_str("already subscribed"))?;
        wasm_bindgen_futures::spawn_local(async move {
            while let Some(message) = outbound.next().await {
                match js::to_js(&message.to_json()) {
                    Ok(value) => {
                        if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                            log!("[WalletBridge] {} handler threw: {:?}", message.port(), e);
                        }
                    }
                    Err(e) => log!("[WalletBridge] cannot encode {}: {}", message.port(), e),
                }
            }
        });
        Ok(())
    }

    /// Boot flags: `{contract, chainId, hasWallet, width?, assets}`
    #[wasm_bindgen]
    pub fn flags(&self) -> Result<JsValue, JsValue> {
        let flags = serde_json::to_value(self.bridge.flags()).map_err(js_err)?;
        js::to_js(&flags).map_err(js_err)
    }

    /// `"bridge"`, `"injected"` or `"none"`
    #[wasm_bindgen(getter)]
    pub fn authoritative(&self) -> String {
        self.bridge.authoritative().as_str().to_string()
    }

    #[wasm_bindgen]
    pub fn shutdown(&self) {
        self.bridge.shutdown();
    }
}

fn viewport_width() -> Option<u32> {
    let width = web_sys::window()?.inner_width().ok()?.as_f64()?;
    Some(width as u32)
}
