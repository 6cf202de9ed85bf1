//! Project: tempo, meter, expression descriptors, tracks and parts

use super::expression::ExpressionDescriptor;
use super::note::Note;
use super::part::{Part, PartId, VoicePart};
use super::serde_helpers::split_parts;
use super::track::Track;
use crate::config::{default_expressions, EngineConfig};
use crate::curve::{Curve, CURVE_INTERVAL};
use crate::utils::TimeAxis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub bpm: f64,
    pub beat_per_bar: i32,
    pub beat_unit: i32,
    pub resolution: i32,
    /// Descriptors keyed by abbreviation
    pub expressions: BTreeMap<String, ExpressionDescriptor>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(flatten, with = "split_parts")]
    pub parts: Vec<Part>,
    /// Rebuilt from tempo and meter by timing validation
    #[serde(skip)]
    time_axis: TimeAxis,
    /// Tick grid for curve edits
    #[serde(skip, default = "default_curve_interval")]
    pub curve_interval: i32,
}

fn default_curve_interval() -> i32 {
    CURVE_INTERVAL
}

impl Default for Project {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Project {
    pub fn new(config: &EngineConfig) -> Self {
        let mut project = Self {
            name: "New Project".to_string(),
            comment: String::new(),
            bpm: config.default_bpm,
            beat_per_bar: config.default_beat_per_bar,
            beat_unit: config.default_beat_unit,
            resolution: config.default_resolution,
            expressions: BTreeMap::new(),
            tracks: Vec::new(),
            parts: Vec::new(),
            time_axis: TimeAxis::default(),
            curve_interval: config.curve_interval,
        };
        for descriptor in default_expressions() {
            project.register_expression(descriptor);
        }
        project.rebuild_time_axis();
        project
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let mut project: Project = serde_json::from_str(text)?;
        project.after_load();
        Ok(project)
    }

    /// Parts are written in save order; the live part list keeps its indexes
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    pub(crate) fn rebuild_time_axis(&mut self) {
        self.time_axis = TimeAxis::new(self.bpm, self.beat_per_bar, self.beat_unit, self.resolution);
    }

    pub fn tick_to_ms(&self, tick: f64) -> f64 {
        self.time_axis.tick_to_ms(tick)
    }

    pub fn ms_to_tick(&self, ms: f64) -> i32 {
        self.time_axis.ms_to_tick(ms)
    }

    pub fn bar_ticks(&self) -> i32 {
        self.time_axis.bar_ticks()
    }

    /// End of the last part
    pub fn end_tick(&self) -> i32 {
        self.parts.iter().map(Part::end).max().unwrap_or(0)
    }

    pub fn register_expression(&mut self, descriptor: ExpressionDescriptor) {
        self.expressions.insert(descriptor.abbr.clone(), descriptor);
    }

    pub fn expression(&self, abbr: &str) -> Option<&ExpressionDescriptor> {
        self.expressions.get(abbr)
    }

    pub fn expression_default(&self, abbr: &str) -> f32 {
        self.expressions.get(abbr).map_or(0.0, |d| d.default_value)
    }

    /// New note with the default two-point pitch bend
    pub fn create_note(&self, tone: i32, position: i32, duration: i32) -> Note {
        let mut note = Note::new(tone, position, duration, "a");
        note.reset_pitch(self.tick_to_ms(duration as f64));
        note
    }

    pub fn part_index(&self, id: PartId) -> Option<usize> {
        self.parts.iter().position(|p| p.id() == id)
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.iter().find(|p| p.id() == id)
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.iter_mut().find(|p| p.id() == id)
    }

    pub fn voice_part(&self, id: PartId) -> Option<&VoicePart> {
        self.part(id).and_then(Part::as_voice)
    }

    pub fn voice_part_mut(&mut self, id: PartId) -> Option<&mut VoicePart> {
        self.part_mut(id).and_then(Part::as_voice_mut)
    }

    pub fn voice_parts(&self) -> impl Iterator<Item = &VoicePart> {
        self.parts.iter().filter_map(Part::as_voice)
    }

    pub fn track_of(&self, id: PartId) -> Option<&Track> {
        self.part(id).and_then(|p| self.tracks.get(p.track_no()))
    }

    /// Rebind curves to descriptors and fill in runtime state after deserialization
    pub fn after_load(&mut self) {
        self.rebuild_time_axis();
        for descriptor in default_expressions() {
            self.expressions.entry(descriptor.abbr.clone()).or_insert(descriptor);
        }
        let expressions = &self.expressions;
        let axis = self.time_axis;
        for part in self.parts.iter_mut() {
            match part {
                Part::Voice(voice) => {
                    voice.sort_notes();
                    voice.curves.retain(|c| expressions.contains_key(&c.abbr));
                    for curve in voice.curves.iter_mut() {
                        if let Some(descriptor) = expressions.get(&curve.abbr) {
                            curve.bind(descriptor);
                        }
                    }
                    voice.duration = voice.duration.max(voice.min_duration(&axis));
                }
                Part::Wave(wave) => wave.duration = wave.min_duration(&axis),
            }
        }
        for track in self.tracks.iter_mut() {
            track.phonemizer.set_singer(track.singer.clone());
        }
    }

    /// Curves for an abbreviation bound to its descriptor, if registered
    pub fn new_curve(&self, abbr: &str) -> Option<Curve> {
        self.expressions
            .get(abbr)
            .map(|d| Curve::new(d).with_interval(self.curve_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::part::WavePart;

    #[test]
    fn test_new_project_has_default_expressions() {
        let project = Project::default();
        assert!(project.expression("vel").is_some());
        assert_eq!(project.expression_default("vol"), 100.0);
        assert_eq!(project.bar_ticks(), 1920);
    }

    #[test]
    fn test_create_note_has_default_bend() {
        let project = Project::default();
        let note = project.create_note(60, 0, 480);
        assert_eq!(note.pitch.data.len(), 2);
        assert_eq!(note.pitch.data[0].x, -25.0);
        assert_eq!(note.pitch.data[1].x, 25.0);
        let short = project.create_note(60, 0, 20);
        assert!(short.pitch.data[1].x < 25.0);
    }

    #[test]
    fn test_saved_parts_ordered_without_touching_live_list() {
        let mut project = Project::default();
        project.tracks.push(Track::new("a"));
        project.tracks.push(Track::new("b"));
        project.parts.push(Part::Voice(VoicePart::new(1, 0, 480)));
        project.parts.push(Part::Voice(VoicePart::new(0, 960, 480)));
        project.parts.push(Part::Voice(VoicePart::new(0, 0, 480)));
        let live: Vec<PartId> = project.parts.iter().map(|p| p.id()).collect();

        let json = project.to_json().unwrap();
        assert_eq!(project.parts.iter().map(|p| p.id()).collect::<Vec<_>>(), live);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let saved: Vec<(u64, i64)> = value["voice_parts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["track_no"].as_u64().unwrap(), p["position"].as_i64().unwrap()))
            .collect();
        assert_eq!(saved, vec![(0, 0), (0, 960), (1, 0)]);
    }

    #[test]
    fn test_json_round_trip_splits_parts() {
        let mut project = Project::default();
        project.tracks.push(Track::new("a"));
        let mut voice = VoicePart::new(0, 0, 1920);
        voice.insert_note(project.create_note(60, 0, 480));
        project.parts.push(Part::Voice(voice));
        project.parts.push(Part::Wave(WavePart::new(0, 0, "take.wav", 1000.0)));
        let json = project.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["voice_parts"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["wave_parts"].as_array().map(Vec::len), Some(1));
        let loaded = Project::from_json(&json).unwrap();
        assert_eq!(loaded.parts.len(), 2);
        assert_eq!(loaded.voice_parts().next().map(|p| p.notes.len()), Some(1));
    }
}
