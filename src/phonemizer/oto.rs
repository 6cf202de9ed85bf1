use super::Singer;
use crate::models::phoneme::SampleDescriptor;
use std::collections::HashMap;

/// Singer backed by an in-memory alias table.
///
/// Lookups try `alias + suffix` for the tone's suffix first, then the bare
/// alias.
#[derive(Debug, Clone, Default)]
pub struct OtoTableSinger {
    name: String,
    loaded: bool,
    entries: HashMap<String, (f32, f32)>,
    tone_suffixes: Vec<(i32, String)>,
    colors: Vec<String>,
}

impl OtoTableSinger {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            loaded: true,
            ..Default::default()
        }
    }

    /// A placeholder for a singer that could not be found
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            loaded: false,
            ..Default::default()
        }
    }

    pub fn with_sample(mut self, alias: &str, preutter_ms: f32, overlap_ms: f32) -> Self {
        self.entries.insert(alias.to_string(), (preutter_ms, overlap_ms));
        self
    }

    /// Tones at or above `from_tone` try this suffix first
    pub fn with_tone_suffix(mut self, from_tone: i32, suffix: &str) -> Self {
        self.tone_suffixes.push((from_tone, suffix.to_string()));
        self.tone_suffixes.sort_by_key(|(tone, _)| *tone);
        self
    }

    pub fn with_colors(mut self, colors: &[&str]) -> Self {
        self.colors = colors.iter().map(|c| c.to_string()).collect();
        self
    }

    fn suffix_for(&self, tone: i32) -> Option<&str> {
        self.tone_suffixes
            .iter()
            .rev()
            .find(|(from, _)| tone >= *from)
            .map(|(_, suffix)| suffix.as_str())
    }
}

impl Singer for OtoTableSinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn loaded(&self) -> bool {
        self.loaded
    }

    fn try_get_sample(&self, alias: &str, tone: i32) -> Option<SampleDescriptor> {
        if !self.loaded {
            return None;
        }
        let mapped = self
            .suffix_for(tone)
            .map(|suffix| format!("{}{}", alias, suffix))
            .filter(|candidate| self.entries.contains_key(candidate))
            .unwrap_or_else(|| alias.to_string());
        self.entries
            .get(&mapped)
            .map(|&(preutter_ms, overlap_ms)| SampleDescriptor {
                alias: mapped.clone(),
                preutter_ms,
                overlap_ms,
            })
    }

    fn voice_colors(&self) -> Vec<String> {
        self.colors.clone()
    }
}
