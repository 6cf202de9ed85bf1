//! `ScoreEngine`: the JavaScript handle to one owned document

use super::helpers::{deserialize, js_error, serialize};
use crate::config::EngineConfig;
use crate::document::{DocEvent, Document, SubscriptionId};
use crate::editing::{
    AddTailNote, BakePitch, BatchEdit, ClearTimings, ClearVibratos, LoadRenderedPitch, QuantizeNotes,
    ResetAllExpressions, ResetPitchBends, ResetVibratos, Transpose,
};
use crate::models::note::NoteId;
use crate::models::part::{Part, PartId, VoicePart};
use crate::models::project::Project;
use crate::models::track::Track;
use crate::phonemizer::OtoTableSinger;
use crate::undo::{Command, ValidateOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// Note as sent from JavaScript
#[derive(Deserialize, Debug)]
struct NoteInput {
    tone: i32,
    position: i32,
    duration: i32,
    #[serde(default)]
    lyric: Option<String>,
}

/// Note as shown to JavaScript, with its id and validation state
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct NoteView<'a> {
    id: u64,
    tone: i32,
    position: i32,
    duration: i32,
    lyric: &'a str,
    error: bool,
    extends: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SampleInput {
    alias: String,
    preutter_ms: f32,
    overlap_ms: f32,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
enum EventView {
    #[serde(rename_all = "camelCase")]
    Command { description: String, is_undo: bool },
}

fn ids(values: &[u64]) -> Vec<NoteId> {
    values.iter().map(|&v| NoteId(v)).collect()
}

fn named_edit(name: &str, arg: i32, lyric: &str) -> Option<Box<dyn BatchEdit>> {
    let edit: Box<dyn BatchEdit> = match name {
        "addTailNote" => Box::new(AddTailNote::new(lyric)),
        "transpose" => Box::new(Transpose { delta_tone: arg }),
        "quantize" => Box::new(QuantizeNotes { quantize: arg }),
        "resetPitchBends" => Box::new(ResetPitchBends),
        "resetAllExpressions" => Box::new(ResetAllExpressions),
        "clearVibratos" => Box::new(ClearVibratos),
        "resetVibratos" => Box::new(ResetVibratos),
        "clearTimings" => Box::new(ClearTimings),
        "loadRenderedPitch" => Box::new(LoadRenderedPitch),
        "bakePitch" => Box::new(BakePitch),
        _ => return None,
    };
    Some(edit)
}

#[wasm_bindgen]
pub struct ScoreEngine {
    doc: Document,
}

impl ScoreEngine {
    fn run(&mut self, context: &str, command: Command) -> Result<(), JsValue> {
        self.doc.execute(command).map_err(|e| js_error(context, e))
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

#[wasm_bindgen]
impl ScoreEngine {
    /// Create an engine; `config_yaml` overrides the default configuration
    #[wasm_bindgen(constructor)]
    pub fn new(config_yaml: Option<String>) -> Result<ScoreEngine, JsValue> {
        let config = match config_yaml {
            Some(text) => EngineConfig::from_yaml(&text).map_err(|e| js_error("Invalid config", e))?,
            None => EngineConfig::default(),
        };
        Ok(ScoreEngine {
            doc: Document::new(config),
        })
    }

    #[wasm_bindgen(js_name = loadProject)]
    pub fn load_project(&mut self, json: &str) -> Result<(), JsValue> {
        let project = Project::from_json(json).map_err(|e| js_error("Invalid project", e))?;
        self.doc.load_project(project);
        Ok(())
    }

    #[wasm_bindgen(js_name = saveProject)]
    pub fn save_project(&mut self) -> Result<String, JsValue> {
        let json = self.doc.save_json().map_err(|e| js_error("Failed to save project", e))?;
        self.doc.mark_saved();
        Ok(json)
    }

    #[wasm_bindgen(js_name = changesSaved)]
    pub fn changes_saved(&self) -> bool {
        self.doc.changes_saved()
    }

    #[wasm_bindgen(js_name = startGroup)]
    pub fn start_group(&mut self) -> Result<(), JsValue> {
        self.doc.start_group().map_err(|e| js_error("startGroup", e))
    }

    #[wasm_bindgen(js_name = endGroup)]
    pub fn end_group(&mut self) -> Result<(), JsValue> {
        self.doc.end_group().map_err(|e| js_error("endGroup", e))
    }

    pub fn undo(&mut self) -> Result<bool, JsValue> {
        self.doc.undo().map_err(|e| js_error("undo", e))
    }

    pub fn redo(&mut self) -> Result<bool, JsValue> {
        self.doc.redo().map_err(|e| js_error("redo", e))
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.doc.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.doc.can_redo()
    }

    #[wasm_bindgen(js_name = setBpm)]
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), JsValue> {
        self.run("setBpm", Command::change_bpm(bpm))
    }

    /// Append a track and return its index
    #[wasm_bindgen(js_name = addTrack)]
    pub fn add_track(&mut self, name: &str) -> Result<usize, JsValue> {
        let index = self.doc.project().tracks.len();
        self.run("addTrack", Command::add_track(index, Track::new(name)))?;
        Ok(index)
    }

    /// Give a track a singer built from an alias table
    #[wasm_bindgen(js_name = setSinger)]
    pub fn set_singer(&mut self, track: usize, name: &str, samples: JsValue) -> Result<(), JsValue> {
        let samples: Vec<SampleInput> = deserialize(samples, "setSinger")?;
        let singer = samples
            .into_iter()
            .fold(OtoTableSinger::new(name), |singer, s| {
                singer.with_sample(&s.alias, s.preutter_ms, s.overlap_ms)
            });
        self.run("setSinger", Command::change_singer(track, Some(Arc::new(singer))))
    }

    /// Add an empty voice part and return its id
    #[wasm_bindgen(js_name = addVoicePart)]
    pub fn add_voice_part(&mut self, track: usize, position: i32, duration: i32) -> Result<u64, JsValue> {
        let part = VoicePart::new(track, position, duration);
        let id = part.id;
        self.run("addVoicePart", Command::add_part(Part::Voice(part)))?;
        Ok(id.0)
    }

    /// Add notes (`[{tone, position, duration, lyric?}]`) and return their ids
    #[wasm_bindgen(js_name = addNotes)]
    pub fn add_notes(&mut self, part: u64, notes: JsValue) -> Result<Vec<u64>, JsValue> {
        let inputs: Vec<NoteInput> = deserialize(notes, "addNotes")?;
        let notes: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let mut note = self.doc.project().create_note(input.tone, input.position, input.duration);
                if let Some(lyric) = input.lyric {
                    note.lyric = lyric;
                }
                note
            })
            .collect();
        let result = notes.iter().map(|n| n.id.0).collect();
        self.run("addNotes", Command::add_notes(PartId(part), notes))?;
        Ok(result)
    }

    #[wasm_bindgen(js_name = removeNotes)]
    pub fn remove_notes(&mut self, part: u64, note_ids: Vec<u64>) -> Result<(), JsValue> {
        self.run("removeNotes", Command::remove_notes(PartId(part), ids(&note_ids)))
    }

    #[wasm_bindgen(js_name = moveNotes)]
    pub fn move_notes(&mut self, part: u64, note_ids: Vec<u64>, delta_position: i32, delta_tone: i32) -> Result<(), JsValue> {
        self.run(
            "moveNotes",
            Command::move_notes(PartId(part), ids(&note_ids), delta_position, delta_tone),
        )
    }

    #[wasm_bindgen(js_name = resizeNotes)]
    pub fn resize_notes(&mut self, part: u64, note_ids: Vec<u64>, delta: i32) -> Result<(), JsValue> {
        self.run("resizeNotes", Command::resize_notes(PartId(part), ids(&note_ids), delta))
    }

    #[wasm_bindgen(js_name = changeLyrics)]
    pub fn change_lyrics(&mut self, part: u64, note_ids: Vec<u64>, lyrics: JsValue) -> Result<(), JsValue> {
        let lyrics: Vec<String> = deserialize(lyrics, "changeLyrics")?;
        self.run(
            "changeLyrics",
            Command::ChangeLyrics {
                part: PartId(part),
                ids: ids(&note_ids),
                lyrics,
            },
        )
    }

    #[wasm_bindgen(js_name = setCurve)]
    pub fn set_curve(&mut self, part: u64, abbr: &str, x: i32, y: i32, last_x: i32, last_y: i32) -> Result<(), JsValue> {
        self.run("setCurve", Command::set_curve(PartId(part), abbr, x, y, last_x, last_y))
    }

    /// Run a named batch edit over the selected notes (all notes when empty)
    #[wasm_bindgen(js_name = batchEdit)]
    pub fn batch_edit(&mut self, name: &str, part: u64, note_ids: Vec<u64>, arg: i32, lyric: &str) -> Result<(), JsValue> {
        let edit = named_edit(name, arg, lyric).ok_or_else(|| js_error("batchEdit", format!("unknown edit {}", name)))?;
        edit.run(&mut self.doc, PartId(part), &ids(&note_ids))
            .map_err(|e| js_error(edit.name(), e))
    }

    /// Apply finished background edits; returns how many ran
    #[wasm_bindgen(js_name = applyPending)]
    pub fn apply_pending(&mut self) -> usize {
        self.doc.apply_pending()
    }

    pub fn validate(&mut self) {
        self.doc.validate_now(ValidateOptions::full());
    }

    #[wasm_bindgen(js_name = partNotes)]
    pub fn part_notes(&self, part: u64) -> Result<JsValue, JsValue> {
        let voice = self
            .doc
            .project()
            .voice_part(PartId(part))
            .ok_or_else(|| js_error("partNotes", format!("no voice part {}", part)))?;
        let notes: Vec<NoteView<'_>> = voice
            .notes
            .iter()
            .map(|n| NoteView {
                id: n.id.0,
                tone: n.tone,
                position: n.position,
                duration: n.duration,
                lyric: &n.lyric,
                error: n.error,
                extends: n.extends.map(|i| voice.notes[i].id.0),
            })
            .collect();
        serialize(&notes, "partNotes")
    }

    #[wasm_bindgen(js_name = partPhonemes)]
    pub fn part_phonemes(&self, part: u64) -> Result<JsValue, JsValue> {
        let voice = self
            .doc
            .project()
            .voice_part(PartId(part))
            .ok_or_else(|| js_error("partPhonemes", format!("no voice part {}", part)))?;
        serialize(&voice.phonemes, "partPhonemes")
    }

    /// Call `callback` with every command and notification; returns a handle for `unsubscribe`
    pub fn subscribe(&mut self, callback: js_sys::Function) -> u32 {
        let id = self.doc.subscribe(Box::new(move |event| {
            let value = match event {
                DocEvent::Command { command, is_undo } => serialize(
                    &EventView::Command {
                        description: command.description(),
                        is_undo: *is_undo,
                    },
                    "event",
                ),
                DocEvent::Notification(notification) => serialize(*notification, "notification"),
            };
            if let Ok(value) = value {
                if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                    log::warn!("Subscriber threw: {:?}", e);
                }
            }
        }));
        id.raw() as u32
    }

    pub fn unsubscribe(&mut self, id: u32) -> bool {
        self.doc.unsubscribe(SubscriptionId::from_raw(id as u64))
    }
}
