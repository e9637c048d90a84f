//! JsSession - a JS pairing connector behind the BridgeSession trait
//!
//! The connector object exposes `connected`, `accounts`, `chainId`, `bridge`,
//! promise-returning `createSession`/`killSession`/`sendTransaction`, and
//! `on(event, (error, payload) => ..)`. A JS factory function builds one per pairing.

use super::js;
use super::log;
use crate::channel::{BridgeSession, SessionEvent, SessionFactory};
use crate::core::paths::session_events;
use crate::core::types::ChainId;
use crate::error::Result;
use async_trait::async_trait;
use futures::channel::mpsc;
use js_sys::{Array, Function};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

type Listeners = Rc<RefCell<Vec<mpsc::UnboundedSender<SessionEvent>>>>;
type Handler = Closure<dyn FnMut(JsValue, JsValue)>;

pub struct JsSession {
    inner: JsValue,
    listeners: Listeners,
    handlers: Vec<(&'static str, Handler)>,
}

impl JsSession {
    pub fn new(inner: JsValue) -> Self {
        let listeners: Listeners = Rc::default();
        let mut handlers = Vec::new();
        for event in [session_events::CONNECT, session_events::DISCONNECT, session_events::SESSION_UPDATE] {
            let listeners = listeners.clone();
            let handler = Handler::new(move |error: JsValue, payload: JsValue| {
                let outcome = if error.is_null() || error.is_undefined() {
                    Ok(js::from_js(payload).unwrap_or(Value::Null))
                } else {
                    Err(js::error_from_js(error).to_string())
                };
                let event = match event {
                    session_events::CONNECT => SessionEvent::Connect(outcome),
                    session_events::DISCONNECT => SessionEvent::Disconnect(outcome),
                    _ => SessionEvent::SessionUpdate(outcome),
                };
                listeners.borrow_mut().retain(|tx| tx.unbounded_send(event.clone()).is_ok());
            });
            let args = Array::of2(&JsValue::from_str(event), handler.as_ref());
            if let Err(e) = js::call(&inner, "on", &args) {
                log!("[JsSession] cannot listen for {}: {}", event, e);
            }
            handlers.push((event, handler));
        }
        Self { inner, listeners, handlers }
    }

    async fn invoke(&self, method: &str, args: &Array) -> Result<JsValue> {
        let pending = js::call(&self.inner, method, args)?;
        js::settle(pending).await
    }
}

impl Drop for JsSession {
    fn drop(&mut self) {
        for (event, handler) in self.handlers.drain(..) {
            // A connector that cannot unregister would call a freed closure.
            if !js::detach(&self.inner, event, handler.as_ref()) {
                handler.forget();
            }
        }
    }
}

#[async_trait(?Send)]
impl BridgeSession for JsSession {
    fn connected(&self) -> bool {
        js::get(&self.inner, "connected").as_bool().unwrap_or(false)
    }

    fn accounts(&self) -> Value {
        js::from_js(js::get(&self.inner, "accounts")).unwrap_or(Value::Null)
    }

    fn chain_id(&self) -> Option<ChainId> {
        let chain_id = js::from_js(js::get(&self.inner, "chainId")).ok()?;
        ChainId::from_value(&chain_id).ok()
    }

    fn bridge_url(&self) -> String {
        js::get(&self.inner, "bridge").as_string().unwrap_or_default()
    }

    async fn create_session(&self) -> Result<()> {
        self.invoke("createSession", &Array::new()).await.map(|_| ())
    }

    async fn kill_session(&self) -> Result<()> {
        self.invoke("killSession", &Array::new()).await.map(|_| ())
    }

    async fn send_transaction(&self, tx: Value) -> Result<Value> {
        let result = self.invoke("sendTransaction", &Array::of1(&js::to_js(&tx)?)).await?;
        js::from_js(result)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }
}

/// Calls a JS function `(bridgeUrl) => connector` for every new pairing.
pub struct JsSessionFactory {
    build: Function,
    bridge_url: String,
}

impl JsSessionFactory {
    pub fn new(build: Function, bridge_url: impl Into<String>) -> Self {
        Self { build, bridge_url: bridge_url.into() }
    }

    fn build(&self) -> JsSession {
        let connector = self
            .build
            .call1(&JsValue::NULL, &JsValue::from_str(&self.bridge_url))
            .unwrap_or_else(|e| {
                log!("[JsSessionFactory] connector factory threw: {}", js::error_from_js(e));
                JsValue::UNDEFINED
            });
        JsSession::new(connector)
    }
}

impl SessionFactory for JsSessionFactory {
    fn create(&self) -> Box<dyn BridgeSession> {
        Box::new(self.build())
    }

    /// Connectors reload a persisted session on construction; keep it only if it is live.
    fn restore(&self) -> Option<Box<dyn BridgeSession>> {
        let session = self.build();
        if session.connected() {
            Some(Box::new(session))
        } else {
            None
        }
    }
}
