//! WASM module: the bridge inside a browser page
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       WalletBridge (JS API)             │
//! │  boot, send, subscribe, flags           │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │      crate::WalletBridge (arbiter)      │
//! └────────┬───────────────────────┬────────┘
//!          │                       │
//! ┌────────▼────────┐     ┌────────▼────────┐
//! │   JsProvider    │     │    JsSession    │
//! │ window.ethereum │     │ JS connector    │
//! └─────────────────┘     └─────────────────┘
//! ```

mod app;
mod connector;
mod js;
mod provider;

pub use app::JsWalletBridge;
pub use connector::{JsSession, JsSessionFactory};
pub use provider::JsProvider;

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

/// Error to browser console
pub fn console_error(s: &str) {
    web_sys::console::error_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
