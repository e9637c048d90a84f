//! JsProvider - `window.ethereum` behind the Eip1193Provider trait

use super::js;
use super::log;
use crate::channel::{Eip1193Provider, ProviderEvent};
use crate::core::paths::provider_events;
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use futures::channel::mpsc;
use js_sys::{Array, Object, Reflect};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

type Listeners = Rc<RefCell<Vec<mpsc::UnboundedSender<ProviderEvent>>>>;
type Handler = Closure<dyn FnMut(JsValue)>;

pub struct JsProvider {
    inner: JsValue,
    listeners: Listeners,
    handlers: Vec<(&'static str, Handler)>,
}

impl JsProvider {
    /// Provider injected into the page, if any.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = js::get(&window, "ethereum");
        if ethereum.is_undefined() || ethereum.is_null() {
            return None;
        }
        Some(Self::new(ethereum))
    }

    /// Wrap a provider object and register its event handlers once.
    pub fn new(inner: JsValue) -> Self {
        let listeners: Listeners = Rc::default();
        let mut handlers = Vec::new();
        for event in [
            provider_events::ACCOUNTS_CHANGED,
            provider_events::CHAIN_CHANGED,
            provider_events::DISCONNECT,
        ] {
            let listeners = listeners.clone();
            let handler = Handler::new(move |payload: JsValue| {
                let payload = js::from_js(payload).unwrap_or(Value::Null);
                let event = match event {
                    provider_events::ACCOUNTS_CHANGED => ProviderEvent::AccountsChanged(payload),
                    provider_events::CHAIN_CHANGED => ProviderEvent::ChainChanged(payload),
                    _ => ProviderEvent::Disconnect(payload),
                };
                listeners.borrow_mut().retain(|tx| tx.unbounded_send(event.clone()).is_ok());
            });
            let args = Array::of2(&JsValue::from_str(event), handler.as_ref());
            if let Err(e) = js::call(&inner, "on", &args) {
                log!("[JsProvider] cannot listen for {}: {}", event, e);
            }
            handlers.push((event, handler));
        }
        Self { inner, listeners, handlers }
    }
}

impl Drop for JsProvider {
    fn drop(&mut self) {
        for (event, handler) in self.handlers.drain(..) {
            if !js::detach(&self.inner, event, handler.as_ref()) {
                handler.forget();
            }
        }
    }
}

#[async_trait(?Send)]
impl Eip1193Provider for JsProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let args = Object::new();
        Reflect::set(&args, &"method".into(), &JsValue::from_str(method)).map_err(js::error_from_js)?;
        if !params.is_null() {
            Reflect::set(&args, &"params".into(), &js::to_js(&params)?).map_err(js::error_from_js)?;
        }
        let pending = js::call(&self.inner, "request", &Array::of1(&args)).map_err(as_provider_error)?;
        let result = js::settle(pending).await.map_err(as_provider_error)?;
        js::from_js(result)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }
}

/// Errors thrown without a code still come from the provider.
fn as_provider_error(error: WalletError) -> WalletError {
    match error {
        WalletError::Session(message) => WalletError::from_rpc(-32603, message),
        other => other,
    }
}
