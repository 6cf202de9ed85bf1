//! Tracks
//!
//! A track holds the capabilities its voice parts are validated and
//! rendered with. Capability instances are runtime-only; the persisted
//! form keeps their names.

use crate::phonemizer::{DefaultPhonemizer, NullRenderer, Phonemizer, Renderer, Singer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_phonemizer() -> Box<dyn Phonemizer> {
    Box::new(DefaultPhonemizer::new())
}

fn default_renderer() -> Arc<dyn Renderer> {
    Arc::new(NullRenderer)
}

#[derive(Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    /// Decibels
    #[serde(default)]
    pub volume: f64,
    /// -100 (left) ..= 100 (right)
    #[serde(default)]
    pub pan: f64,
    /// Singer name to resolve after load
    #[serde(default)]
    pub singer_name: Option<String>,
    #[serde(default)]
    pub phonemizer_name: String,
    #[serde(default)]
    pub renderer_name: String,

    #[serde(skip)]
    pub singer: Option<Arc<dyn Singer>>,
    #[serde(skip, default = "default_phonemizer")]
    pub phonemizer: Box<dyn Phonemizer>,
    #[serde(skip, default = "default_renderer")]
    pub renderer: Arc<dyn Renderer>,
}

impl Default for Track {
    fn default() -> Self {
        Self::new("Track")
    }
}

impl Track {
    pub fn new(name: &str) -> Self {
        let phonemizer = default_phonemizer();
        let renderer = default_renderer();
        Self {
            name: name.to_string(),
            color: "Blue".to_string(),
            mute: false,
            solo: false,
            volume: 0.0,
            pan: 0.0,
            singer_name: None,
            phonemizer_name: phonemizer.name().to_string(),
            renderer_name: renderer.name().to_string(),
            singer: None,
            phonemizer,
            renderer,
        }
    }

    /// Whether the singer is present and usable
    pub fn singer_loaded(&self) -> bool {
        self.singer.as_ref().map_or(false, |s| s.loaded())
    }

    /// Swap in a singer and hand it to the phonemizer; returns the previous one
    pub fn replace_singer(&mut self, singer: Option<Arc<dyn Singer>>) -> Option<Arc<dyn Singer>> {
        self.singer_name = singer.as_ref().map(|s| s.name().to_string());
        self.phonemizer.set_singer(singer.clone());
        std::mem::replace(&mut self.singer, singer)
    }

    /// Swap singer and persisted singer name in place, keeping the phonemizer in sync
    pub fn swap_singer(&mut self, singer: &mut Option<Arc<dyn Singer>>, singer_name: &mut Option<String>) {
        std::mem::swap(&mut self.singer, singer);
        std::mem::swap(&mut self.singer_name, singer_name);
        self.phonemizer.set_singer(self.singer.clone());
    }

    /// Swap the phonemizer in place, keeping the singer attached
    pub fn swap_phonemizer(&mut self, phonemizer: &mut Box<dyn Phonemizer>) {
        std::mem::swap(&mut self.phonemizer, phonemizer);
        self.phonemizer_name = self.phonemizer.name().to_string();
        self.phonemizer.set_singer(self.singer.clone());
    }

    pub fn swap_renderer(&mut self, renderer: &mut Arc<dyn Renderer>) {
        std::mem::swap(&mut self.renderer, renderer);
        self.renderer_name = self.renderer.name().to_string();
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("name", &self.name)
            .field("singer", &self.singer_name)
            .field("phonemizer", &self.phonemizer.name())
            .field("renderer", &self.renderer.name())
            .field("mute", &self.mute)
            .field("solo", &self.solo)
            .field("volume", &self.volume)
            .field("pan", &self.pan)
            .finish()
    }
}
