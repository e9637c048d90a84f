//! Port - the normalized command/response boundary with the application
//!
//! # Wire form
//!
//! | Direction | JSON |
//! |-----------|------|
//! | in | `{"port": "connect"}`, `{"port": "claim", "data": {..tx..}}` |
//! | out | `{"port": "connectResponse", "data": "0xABC"}` or `{"port": "connectResponse", "data": null}` |
//! | out | `{"port": "claimResponse", "error": {"code": 4001, "message": ".."}}` |
//! | out | `{"port": "clearWallet", "data": null}` |

use crate::arbiter::Arbiter;
use crate::core::paths::{ports, APP_LOG_TARGET};
use crate::core::types::Account;
use crate::error::{Result, WalletError};
use crate::runtime::spawn_local;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::rc::Rc;

/// Command issued by the application
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    WalletConnect,
    Disconnect,
    Claim(Value),
    Log(Value),
}

impl Command {
    pub fn port(&self) -> &'static str {
        match self {
            Command::Connect => ports::CONNECT,
            Command::WalletConnect => ports::WALLET_CONNECT,
            Command::Disconnect => ports::DISCONNECT,
            Command::Claim(_) => ports::CLAIM,
            Command::Log(_) => ports::LOG,
        }
    }

    /// Parse `{"port": name, "data": payload}`. Missing data reads as `null`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let port = value
            .get("port")
            .and_then(Value::as_str)
            .ok_or_else(|| WalletError::Serialization("command without 'port'".into()))?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        match port {
            ports::CONNECT => Ok(Command::Connect),
            ports::WALLET_CONNECT => Ok(Command::WalletConnect),
            ports::DISCONNECT => Ok(Command::Disconnect),
            ports::CLAIM => Ok(Command::Claim(data)),
            ports::LOG => Ok(Command::Log(data)),
            other => Err(WalletError::Serialization(format!("unknown port: {}", other))),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        Self::from_json(&value)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Command::Claim(data) | Command::Log(data) => json!({"port": self.port(), "data": data}),
            _ => json!({"port": self.port()}),
        }
    }
}

/// Message delivered to the application. Each response port has its own result type.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    ConnectResponse(Result<Option<Account>>),
    ClaimResponse(Result<Value>),
    ClearWallet,
}

impl Outbound {
    pub fn port(&self) -> &'static str {
        match self {
            Outbound::ConnectResponse(_) => ports::CONNECT_RESPONSE,
            Outbound::ClaimResponse(_) => ports::CLAIM_RESPONSE,
            Outbound::ClearWallet => ports::CLEAR_WALLET,
        }
    }

    pub fn to_json(&self) -> Value {
        let port = self.port();
        match self {
            Outbound::ConnectResponse(Ok(account)) => json!({"port": port, "data": account}),
            Outbound::ClaimResponse(Ok(result)) => json!({"port": port, "data": result}),
            Outbound::ConnectResponse(Err(e)) | Outbound::ClaimResponse(Err(e)) => {
                json!({"port": port, "error": e.to_json()})
            }
            Outbound::ClearWallet => json!({"port": port, "data": null}),
        }
    }
}

/// Sending half of the outbound port. Cheap to clone; every publisher holds one.
#[derive(Clone)]
pub struct Responder {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Responder {
    pub fn connect_response(&self, result: Result<Option<Account>>) {
        self.publish(Outbound::ConnectResponse(result));
    }

    pub fn claim_response(&self, result: Result<Value>) {
        self.publish(Outbound::ClaimResponse(result));
    }

    pub fn clear_wallet(&self) {
        self.publish(Outbound::ClearWallet);
    }

    fn publish(&self, message: Outbound) {
        let port = message.port();
        if self.tx.unbounded_send(message).is_err() {
            tracing::debug!(port, "application port closed, dropping message");
        }
    }
}

/// Outbound channel pair: the responder for publishers, the receiver for the application.
pub fn outbound() -> (Responder, mpsc::UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded();
    (Responder { tx }, rx)
}

/// Routes commands to the arbiter, one local task per command.
#[derive(Clone)]
pub struct Port {
    arbiter: Rc<Arbiter>,
}

/// Application log line: strings verbatim, anything else as compact JSON.
pub fn app_log_message(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn app_log(value: &Value) {
    let message = app_log_message(value);
    tracing::info!(target: APP_LOG_TARGET, "{}", message);
    // No tracing subscriber in the browser.
    #[cfg(feature = "wasm")]
    crate::wasm::console_log(&message);
}

impl Port {
    pub fn new(arbiter: Rc<Arbiter>) -> Self {
        Self { arbiter }
    }

    /// Must run inside a local executor (`LocalSet` or the browser event loop).
    pub fn dispatch(&self, command: Command) {
        tracing::debug!(port = command.port(), "command received");
        let arbiter = self.arbiter.clone();
        match command {
            Command::Connect => spawn_local(async move { arbiter.connect().await }),
            Command::WalletConnect => spawn_local(async move { arbiter.wallet_connect().await }),
            Command::Disconnect => spawn_local(async move { arbiter.disconnect().await }),
            Command::Claim(payload) => spawn_local(async move { arbiter.claim(payload).await }),
            Command::Log(value) => app_log(&value),
        }
    }

    /// Dispatch every command until the stream ends.
    pub async fn run<S>(&self, commands: S)
    where
        S: Stream<Item = Command>,
    {
        futures::pin_mut!(commands);
        while let Some(command) = commands.next().await {
            self.dispatch(command);
        }
    }
}
