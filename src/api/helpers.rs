//! Shared helpers for the WASM API: conversion between JS values and
//! engine types, with errors logged and turned into JS strings.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Deserialize a value from JavaScript with automatic error handling
pub fn deserialize<T: DeserializeOwned>(value: JsValue, error_context: &str) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| js_error(error_context, e))
}

/// Serialize a value to JavaScript with automatic error handling
pub fn serialize<T: Serialize>(value: &T, error_context: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| js_error(error_context, e))
}

/// Log an error and wrap it for JavaScript
pub fn js_error(context: &str, error: impl std::fmt::Display) -> JsValue {
    let msg = format!("{}: {}", context, error);
    log::error!("{}", msg);
    JsValue::from_str(&msg)
}
