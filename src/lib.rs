//! Vocal Score Engine WASM Module
//!
//! Document engine for a singing-synthesis score editor: the undoable
//! project model, the phonemization and timing pipeline that derives
//! phonemes and envelopes from notes, and pitch baking.

pub mod api;
pub mod bake;
pub mod config;
pub mod curve;
pub mod document;
pub mod editing;
pub mod models;
pub mod phonemizer;
pub mod undo;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::EngineConfig;
pub use document::{DocEvent, Document};
pub use models::*;
pub use undo::{Command, EngineError, Notification, ValidateOptions};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    init_logger();

    log::info!("Vocal score engine WASM module initialized");
}

#[cfg(feature = "console_log")]
fn init_logger() {
    // Fails only when a logger is already installed
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::debug!("Logger already initialized");
    }
}
