//! JsValue plumbing shared by the provider and connector bindings

use crate::error::{WalletError, Result};
use js_sys::{Array, Function, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

pub(crate) fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

pub(crate) fn to_js(value: &Value) -> Result<JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value.serialize(&serializer).map_err(|e| WalletError::Serialization(e.to_string()))
}

pub(crate) fn from_js(value: JsValue) -> Result<Value> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| WalletError::Serialization(e.to_string()))
}

/// `target[name](...args)`; a missing method is an invalid response.
pub(crate) fn call(target: &JsValue, name: &str, args: &Array) -> Result<JsValue> {
    let method: Function = get(target, name)
        .dyn_into()
        .map_err(|_| WalletError::InvalidResponse(format!("{} is not a function", name)))?;
    method.apply(target, args).map_err(error_from_js)
}

/// Unregister an event handler through `removeListener`, or `off` on emitters that
/// only have that. Returns false when the target offers neither.
pub(crate) fn detach(target: &JsValue, event: &str, handler: &JsValue) -> bool {
    let args = Array::of2(&JsValue::from_str(event), handler);
    for name in ["removeListener", "off"] {
        if get(target, name).is_function() {
            return call(target, name, &args).is_ok();
        }
    }
    false
}

/// Await the value if it is a promise, pass it through otherwise.
pub(crate) async fn settle(value: JsValue) -> Result<JsValue> {
    match value.dyn_into::<Promise>() {
        Ok(promise) => JsFuture::from(promise).await.map_err(error_from_js),
        Err(value) => Ok(value),
    }
}

/// Thrown values carry `{code, message}` for provider errors, a plain `Error` otherwise.
pub(crate) fn error_from_js(error: JsValue) -> WalletError {
    let message = get(&error, "message")
        .as_string()
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error));
    match get(&error, "code").as_f64() {
        Some(code) => WalletError::from_rpc(code as i64, message),
        None => WalletError::Session(message),
    }
}
