//! WASM API
//!
//! JavaScript owns one or more [`ScoreEngine`] handles; each wraps its own
//! document. Values cross the boundary through `serde-wasm-bindgen`.

pub mod engine;
pub mod helpers;

pub use engine::ScoreEngine;
