//! Native injected-provider transports
//!
//! Desktop wallets expose the EIP-1193 surface over a local JSON-RPC WebSocket;
//! `WsProvider` speaks it so the native build has an injected channel too.

mod ws;

pub use ws::{ConnectionState, WsProvider};
