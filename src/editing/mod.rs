//! Batch edits
//!
//! Each batch edit inspects the current (validated) part, then issues its
//! commands inside a single undo group. Edits that depend on the renderer
//! report unsupported features as a user message and stop early.

mod notes;
mod pitch;
mod task;

pub use notes::{
    AddTailNote, ClearTimings, ClearVibratos, QuantizeNotes, ResetAllExpressions, ResetPitchBends, ResetVibratos,
    Transpose,
};
pub use pitch::{apply_bake, bake_part, BakePitch, BakeResult, LoadRenderedPitch};
pub use task::{spawn_bake_pitch, BatchTask, CancelToken, PartSnapshot};

use crate::document::Document;
use crate::models::note::NoteId;
use crate::models::part::{PartId, VoicePart};
use crate::undo::{EngineError, Notification};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BatchEditError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("renderer {renderer} does not support {feature}")]
    Unsupported { renderer: String, feature: &'static str },
    #[error("batch edit cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BatchEditError>;

pub trait BatchEdit {
    fn name(&self) -> &str;

    /// Apply to the selected notes of a part, or to every note when the
    /// selection is empty
    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()>;
}

/// Run `f` inside one undo group; the group is closed even when `f` fails
pub(crate) fn in_group<F>(doc: &mut Document, f: F) -> Result<()>
where
    F: FnOnce(&mut Document) -> Result<()>,
{
    doc.start_group()?;
    let result = f(doc);
    doc.end_group()?;
    result
}

pub(crate) fn voice_part(doc: &Document, part: PartId) -> Result<&VoicePart> {
    match doc.project().part(part) {
        Some(p) => p.as_voice().ok_or(BatchEditError::Engine(EngineError::NotVoicePart(part))),
        None => Err(EngineError::PartNotFound(part).into()),
    }
}

/// Indexes of the selected notes in part order; all notes when nothing is selected
pub(crate) fn selected_indexes(part: &VoicePart, selection: &[NoteId]) -> Vec<usize> {
    if selection.is_empty() {
        return (0..part.notes.len()).collect();
    }
    let mut indexes: Vec<usize> = selection.iter().filter_map(|&id| part.note_index(id)).collect();
    indexes.sort_unstable();
    indexes.dedup();
    indexes
}

/// Publish a user message and turn it into an error
pub(crate) fn unsupported(doc: &mut Document, renderer: &str, feature: &'static str) -> BatchEditError {
    let error = BatchEditError::Unsupported {
        renderer: renderer.to_string(),
        feature,
    };
    log::warn!("{}", error);
    doc.notify(Notification::user_message(error.to_string()));
    error
}
