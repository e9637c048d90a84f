//! Scripted provider and session doubles plus local-executor helpers for tests

use crate::channel::{BridgeSession, Eip1193Provider, ProviderEvent, SessionEvent, SessionFactory};
use crate::core::paths::rpc;
use crate::core::types::ChainId;
use crate::error::{Result, WalletError};
use crate::port::Outbound;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

// =============================================================================
// Executor helpers
// =============================================================================

/// Run a future on a current-thread runtime inside a `LocalSet`.
pub fn run_local<F: Future>(future: F) -> F::Output {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    tokio::task::LocalSet::new().block_on(&rt, future)
}

/// Let spawned local tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Next outbound message, failing the test after one second.
pub async fn next_outbound(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Outbound {
    tokio::time::timeout(Duration::from_secs(1), rx.next())
        .await
        .expect("timed out waiting for outbound message")
        .expect("outbound port closed")
}

/// Everything published so far, after letting tasks settle.
pub async fn drain_outbound(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    settle().await;
    let mut messages = Vec::new();
    while let Ok(Some(message)) = rx.try_next() {
        messages.push(message);
    }
    messages
}

// =============================================================================
// Injected provider
// =============================================================================

/// EIP-1193 provider with scripted answers; records every method called.
pub struct MockProvider {
    answers: RefCell<HashMap<String, Result<Value>>>,
    calls: RefCell<Vec<(String, Value)>>,
    listeners: RefCell<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl MockProvider {
    /// Chain `0x1`, one account `0xABC`, transactions answer `"0xinjected"`.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            answers: RefCell::new(HashMap::from([
                (rpc::CHAIN_ID.to_string(), Ok(json!("0x1"))),
                (rpc::REQUEST_ACCOUNTS.to_string(), Ok(json!(["0xABC"]))),
                (rpc::SEND_TRANSACTION.to_string(), Ok(json!("0xinjected"))),
            ])),
            calls: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn answer(&self, method: &str, result: Result<Value>) {
        self.answers.borrow_mut().insert(method.to_string(), result);
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.answer(rpc::CHAIN_ID, Ok(json!(format!("0x{:x}", chain_id))));
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        self.answer(rpc::REQUEST_ACCOUNTS, Ok(json!(accounts)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(method, _)| method.clone()).collect()
    }

    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls.borrow().iter().filter(|(m, _)| m == method).map(|(_, p)| p.clone()).collect()
    }

    pub fn emit(&self, event: ProviderEvent) {
        self.listeners.borrow_mut().retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }
}

#[async_trait(?Send)]
impl Eip1193Provider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.calls.borrow_mut().push((method.to_string(), params));
        let answer = self.answers.borrow().get(method).cloned();
        answer.unwrap_or_else(|| Err(WalletError::from_rpc(4200, format!("unsupported: {}", method))))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }
}

// =============================================================================
// Bridge session
// =============================================================================

/// Pairing session whose handshake the test completes by hand.
pub struct MockSession {
    pub id: usize,
    connected: Cell<bool>,
    accounts: RefCell<Value>,
    chain_id: Cell<Option<ChainId>>,
    handshakes: Cell<usize>,
    kills: Cell<usize>,
    sent: RefCell<Vec<Value>>,
    create_error: RefCell<Option<WalletError>>,
    send_result: RefCell<Result<Value>>,
    listeners: RefCell<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl MockSession {
    pub fn new(id: usize) -> Rc<Self> {
        Rc::new(Self {
            id,
            connected: Cell::new(false),
            accounts: RefCell::new(json!([])),
            chain_id: Cell::new(None),
            handshakes: Cell::new(0),
            kills: Cell::new(0),
            sent: RefCell::new(Vec::new()),
            create_error: RefCell::new(None),
            send_result: RefCell::new(Ok(json!("0xbridge"))),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Session already paired, as a restored one would be.
    pub fn paired(id: usize, accounts: &[&str]) -> Rc<Self> {
        let session = Self::new(id);
        session.connected.set(true);
        session.chain_id.set(Some(ChainId::MAINNET));
        *session.accounts.borrow_mut() = json!(accounts);
        session
    }

    /// Wallet approved the pairing: flag connected and fire the connect event.
    pub fn complete_handshake(&self, accounts: &[&str]) {
        self.connected.set(true);
        self.chain_id.set(Some(ChainId::MAINNET));
        *self.accounts.borrow_mut() = json!(accounts);
        self.emit(SessionEvent::Connect(Ok(json!({
            "event": "connect",
            "params": [{"accounts": accounts, "chainId": 1, "peerId": format!("peer-{}", self.id)}]
        }))));
    }

    /// Wallet app ended the session.
    pub fn remote_disconnect(&self) {
        self.connected.set(false);
        *self.accounts.borrow_mut() = json!([]);
        self.emit(SessionEvent::Disconnect(Ok(json!({
            "event": "disconnect",
            "params": [{"message": "Session disconnected"}]
        }))));
    }

    pub fn fail_create(&self, error: WalletError) {
        *self.create_error.borrow_mut() = Some(error);
    }

    pub fn set_send_result(&self, result: Result<Value>) {
        *self.send_result.borrow_mut() = result;
    }

    pub fn emit(&self, event: SessionEvent) {
        self.listeners.borrow_mut().retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.get()
    }

    pub fn kills(&self) -> usize {
        self.kills.get()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent.borrow().clone()
    }
}

#[async_trait(?Send)]
impl BridgeSession for Rc<MockSession> {
    fn connected(&self) -> bool {
        self.connected.get()
    }

    fn accounts(&self) -> Value {
        self.accounts.borrow().clone()
    }

    fn chain_id(&self) -> Option<ChainId> {
        self.chain_id.get()
    }

    fn bridge_url(&self) -> String {
        "https://bridge.test".into()
    }

    async fn create_session(&self) -> Result<()> {
        self.handshakes.set(self.handshakes.get() + 1);
        match self.create_error.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Mirrors real connectors: killing a live session fires a local disconnect event.
    async fn kill_session(&self) -> Result<()> {
        if self.connected.get() {
            self.kills.set(self.kills.get() + 1);
            self.remote_disconnect();
        }
        Ok(())
    }

    async fn send_transaction(&self, tx: Value) -> Result<Value> {
        self.sent.borrow_mut().push(tx);
        self.send_result.borrow().clone()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }
}

/// Factory handing out `MockSession`s and remembering each one.
#[derive(Default)]
pub struct MockFactory {
    sessions: RefCell<Vec<Rc<MockSession>>>,
    restorable: RefCell<Option<Rc<MockSession>>>,
    fail_next_create: RefCell<Option<WalletError>>,
}

impl MockFactory {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Factory whose connector restores `session` at boot.
    pub fn with_restorable(session: Rc<MockSession>) -> Rc<Self> {
        let factory = Self::new();
        *factory.restorable.borrow_mut() = Some(session);
        factory
    }

    /// Next created session fails to start its handshake.
    pub fn fail_next_create(&self, error: WalletError) {
        *self.fail_next_create.borrow_mut() = Some(error);
    }

    pub fn created(&self) -> usize {
        self.sessions.borrow().len()
    }

    pub fn session(&self, index: usize) -> Rc<MockSession> {
        self.sessions.borrow()[index].clone()
    }

    pub fn last(&self) -> Option<Rc<MockSession>> {
        self.sessions.borrow().last().cloned()
    }
}

impl SessionFactory for Rc<MockFactory> {
    fn create(&self) -> Box<dyn BridgeSession> {
        let session = MockSession::new(self.sessions.borrow().len());
        if let Some(error) = self.fail_next_create.borrow_mut().take() {
            session.fail_create(error);
        }
        self.sessions.borrow_mut().push(session.clone());
        Box::new(session)
    }

    fn restore(&self) -> Option<Box<dyn BridgeSession>> {
        self.restorable
            .borrow_mut()
            .take()
            .map(|session| Box::new(session) as Box<dyn BridgeSession>)
    }
}
