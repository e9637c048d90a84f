//! WsProvider - EIP-1193 over JSON-RPC 2.0 WebSocket (tokio-tungstenite)
//!
//! Requests are correlated by id through a pending map of oneshot senders.
//! `eth_subscription` notifications for `accountsChanged`/`chainChanged` are
//! broadcast to every subscriber as [`ProviderEvent`]s.

use crate::channel::{Eip1193Provider, ProviderEvent};
use crate::core::paths::{provider_events, rpc};
use crate::error::{Result, WalletError, DISCONNECTED};
use async_trait::async_trait;
use futures::channel::mpsc as events;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

type Pending = Arc<Mutex<PendingRequests>>;
type Subscriptions = Arc<Mutex<HashMap<String, &'static str>>>;
type Listeners = Arc<Mutex<Vec<events::UnboundedSender<ProviderEvent>>>>;

/// In-flight requests by id. Closing fails every waiter and refuses new ones.
#[derive(Default)]
struct PendingRequests {
    closed: bool,
    waiting: HashMap<u64, oneshot::Sender<Result<Value>>>,
}

impl PendingRequests {
    fn insert(&mut self, id: u64, tx: oneshot::Sender<Result<Value>>) -> Result<()> {
        if self.closed {
            return Err(connection_closed());
        }
        self.waiting.insert(id, tx);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        for (_, tx) in self.waiting.drain() {
            let _ = tx.send(Err(connection_closed()));
        }
    }
}

fn connection_closed() -> WalletError {
    WalletError::Transport("connection closed".into())
}

pub struct WsProvider {
    url: String,
    next_id: AtomicU64,
    tx: mpsc::Sender<String>,
    pending: Pending,
    subscriptions: Subscriptions,
    listeners: Listeners,
    state: Arc<RwLock<ConnectionState>>,
}

impl WsProvider {
    /// Open the socket and spawn the writer and reader tasks.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| WalletError::Transport(format!("{}: {}", url, e)))?;
        let (mut write, mut read) = ws.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        let pending: Pending = Arc::default();
        let subscriptions: Subscriptions = Arc::default();
        let listeners: Listeners = Arc::default();
        let state = Arc::new(RwLock::new(ConnectionState::Connected));

        let (pending_w, state_w) = (pending.clone(), state.clone());
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            lock(&pending_w).close();
            *state_w.write().await = ConnectionState::Disconnected;
        });

        let (pending_r, subscriptions_r, listeners_r, state_r) =
            (pending.clone(), subscriptions.clone(), listeners.clone(), state.clone());
        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                if let Message::Text(text) = msg {
                    route(&text, &pending_r, &subscriptions_r, &listeners_r);
                }
            }
            lock(&pending_r).close();
            *state_r.write().await = ConnectionState::Disconnected;
            broadcast(
                &listeners_r,
                ProviderEvent::Disconnect(json!({"code": DISCONNECTED, "message": "connection closed"})),
            );
            tracing::info!("provider socket closed");
        });

        tracing::info!(%url, "provider socket connected");
        Ok(Self {
            url,
            next_id: AtomicU64::new(1),
            tx: out_tx,
            pending,
            subscriptions,
            listeners,
            state,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Subscribe to account and chain notifications on the provider side.
    pub async fn watch(&self) -> Result<()> {
        for event in [provider_events::ACCOUNTS_CHANGED, provider_events::CHAIN_CHANGED] {
            let id = self.request(rpc::SUBSCRIBE, json!([event])).await?;
            let id = id
                .as_str()
                .ok_or_else(|| WalletError::InvalidResponse(format!("subscription id: {}", id)))?;
            lock(&self.subscriptions).insert(id.to_string(), event);
            tracing::debug!(event, subscription = id, "provider subscription active");
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Eip1193Provider for WsProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx)?;

        if self.tx.send(request_message(id, method, params).to_string()).await.is_err() {
            lock(&self.pending).waiting.remove(&id);
            return Err(connection_closed());
        }
        rx.await.map_err(|_| connection_closed())?
    }

    fn subscribe(&self) -> events::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = events::unbounded();
        lock(&self.listeners).push(tx);
        rx
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn request_message(id: u64, method: &str, params: Value) -> Value {
    let params = if params.is_null() { json!([]) } else { params };
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

/// Incoming JSON-RPC message
#[derive(Debug, PartialEq)]
enum RpcMessage {
    Response { id: u64, result: Result<Value> },
    Notification { subscription: String, result: Value },
}

fn parse_message(text: &str) -> Option<RpcMessage> {
    let value: Value = serde_json::from_str(text).ok()?;
    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        let result = match value.get("error") {
            Some(error) if !error.is_null() => Err(WalletError::from_value(error)),
            _ => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Some(RpcMessage::Response { id, result });
    }
    if value.get("method").and_then(Value::as_str) == Some(rpc::SUBSCRIPTION) {
        let params = value.get("params")?;
        let subscription = params.get("subscription")?.as_str()?.to_string();
        let result = params.get("result").cloned().unwrap_or(Value::Null);
        return Some(RpcMessage::Notification { subscription, result });
    }
    None
}

fn route(text: &str, pending: &Pending, subscriptions: &Subscriptions, listeners: &Listeners) {
    match parse_message(text) {
        Some(RpcMessage::Response { id, result }) => match lock(pending).waiting.remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::debug!(id, "response for unknown request"),
        },
        Some(RpcMessage::Notification { subscription, result }) => {
            let event = lock(subscriptions).get(&subscription).copied();
            match event {
                Some(provider_events::ACCOUNTS_CHANGED) => broadcast(listeners, ProviderEvent::AccountsChanged(result)),
                Some(provider_events::CHAIN_CHANGED) => broadcast(listeners, ProviderEvent::ChainChanged(result)),
                _ => tracing::debug!(%subscription, "notification for unknown subscription"),
            }
        }
        None => tracing::debug!(message = %text, "unrecognized provider message"),
    }
}

fn broadcast(listeners: &Listeners, event: ProviderEvent) {
    lock(listeners).retain(|tx| tx.unbounded_send(event.clone()).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn request_defaults_params_to_empty_array() {
        let msg = request_message(7, rpc::CHAIN_ID, Value::Null);
        assert_eq!(msg, json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []}));
        let msg = request_message(8, rpc::SEND_TRANSACTION, json!([{"to": "0x1"}]));
        assert_eq!(msg["params"], json!([{"to": "0x1"}]));
    }

    #[test]
    fn parses_results_and_errors() {
        assert_eq!(
            parse_message(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#),
            Some(RpcMessage::Response { id: 1, result: Ok(json!("0x1")) })
        );
        assert_eq!(
            parse_message(r#"{"jsonrpc":"2.0","id":2,"error":{"code":4001,"message":"User rejected"}}"#),
            Some(RpcMessage::Response { id: 2, result: Err(WalletError::UserRejected("User rejected".into())) })
        );
    }

    #[test]
    fn parses_subscription_notifications() {
        let text = r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"subscription":"0xabc","result":["0xDEF"]}}"#;
        assert_eq!(
            parse_message(text),
            Some(RpcMessage::Notification { subscription: "0xabc".into(), result: json!(["0xDEF"]) })
        );
        assert_eq!(parse_message(r#"{"jsonrpc":"2.0","method":"eth_subscription"}"#), None);
        assert_eq!(parse_message("not json"), None);
    }

    #[test]
    fn route_completes_pending_and_broadcasts_events() {
        let pending: Pending = Arc::default();
        let subscriptions: Subscriptions = Arc::default();
        let listeners: Listeners = Arc::default();

        let (tx, mut rx) = oneshot::channel();
        lock(&pending).insert(3, tx).unwrap();
        route(r#"{"id":3,"result":["0xABC"]}"#, &pending, &subscriptions, &listeners);
        assert_eq!(rx.try_recv().unwrap(), Ok(json!(["0xABC"])));
        assert!(lock(&pending).waiting.is_empty());

        let (event_tx, mut event_rx) = events::unbounded();
        lock(&listeners).push(event_tx);
        lock(&subscriptions).insert("0xsub".into(), provider_events::CHAIN_CHANGED);
        route(
            r#"{"method":"eth_subscription","params":{"subscription":"0xsub","result":"0x4"}}"#,
            &pending,
            &subscriptions,
            &listeners,
        );
        assert_eq!(event_rx.try_next().unwrap(), Some(ProviderEvent::ChainChanged(json!("0x4"))));

        route(
            r#"{"method":"eth_subscription","params":{"subscription":"0xother","result":"0x5"}}"#,
            &pending,
            &subscriptions,
            &listeners,
        );
        assert!(event_rx.try_next().is_err());
    }

    #[test]
    fn closing_fails_waiters_and_refuses_new_requests() {
        let mut pending = PendingRequests::default();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(1, tx).unwrap();

        pending.close();
        assert_eq!(rx.try_recv().unwrap(), Err(connection_closed()));

        let (tx, _rx) = oneshot::channel();
        assert_eq!(pending.insert(2, tx), Err(connection_closed()));
        assert!(pending.waiting.is_empty());
    }

    #[tokio::test]
    async fn request_after_server_close_fails_fast() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.close(None).await;
        });

        let provider = WsProvider::connect(format!("ws://{}", addr)).await.unwrap();
        server.await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while provider.state().await != ConnectionState::Disconnected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("socket closes");

        let result = tokio::time::timeout(Duration::from_secs(2), provider.request(rpc::CHAIN_ID, Value::Null))
            .await
            .expect("request must not hang after close");
        assert_eq!(result, Err(connection_closed()));
    }
}
