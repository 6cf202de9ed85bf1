//! Background batch edits
//!
//! Work runs over a [`PartSnapshot`] taken on the document thread. The
//! result comes back as a [`PendingEdit`] that the document applies in
//! [`Document::apply_pending`], so the live project only has one writer.

use super::pitch::{apply_bake, bake_part, pitch_renderer};
use super::{voice_part, BatchEditError, Result};
use crate::config::EngineConfig;
use crate::document::{Document, PendingEdit};
use crate::models::note::NoteId;
use crate::models::part::{PartId, VoicePart};
use crate::phonemizer::Renderer;
use crate::utils::TimeAxis;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with a worker
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a background edit may read, copied off the live document
#[derive(Clone)]
pub struct PartSnapshot {
    pub part_id: PartId,
    pub part: VoicePart,
    pub selection: Vec<NoteId>,
    pub axis: TimeAxis,
    pub config: EngineConfig,
    pub renderer: Arc<dyn Renderer>,
}

impl PartSnapshot {
    pub fn take(doc: &Document, part: PartId, selection: &[NoteId], renderer: Arc<dyn Renderer>) -> Result<Self> {
        Ok(Self {
            part_id: part,
            part: voice_part(doc, part)?.clone(),
            selection: selection.to_vec(),
            axis: *doc.project().time_axis(),
            config: doc.config().clone(),
            renderer,
        })
    }
}

/// Handle to a running background edit
pub struct BatchTask {
    cancel: CancelToken,
    #[cfg(not(target_arch = "wasm32"))]
    handle: Option<std::thread::JoinHandle<()>>,
}

impl BatchTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the worker to finish; its result still has to be applied
    #[cfg(not(target_arch = "wasm32"))]
    pub fn join(self) {
        if let Some(handle) = self.handle {
            if handle.join().is_err() {
                log::error!("Batch edit worker panicked");
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn join(self) {}
}

#[cfg(not(target_arch = "wasm32"))]
fn start<F>(work: F, cancel: CancelToken) -> BatchTask
where
    F: FnOnce() + Send + 'static,
{
    BatchTask {
        cancel,
        handle: Some(std::thread::spawn(work)),
    }
}

#[cfg(target_arch = "wasm32")]
fn start<F>(work: F, cancel: CancelToken) -> BatchTask
where
    F: FnOnce() + Send + 'static,
{
    work();
    BatchTask { cancel }
}

fn run_bake(snapshot: PartSnapshot, cancel: &CancelToken) -> Option<PendingEdit> {
    let result = bake_part(
        &snapshot.part,
        &snapshot.selection,
        snapshot.renderer.as_ref(),
        &snapshot.axis,
        &snapshot.config,
        Some(cancel),
    );
    match result {
        Ok(result) => {
            let part = snapshot.part_id;
            let edit: PendingEdit = Box::new(move |doc: &mut Document| {
                if let Err(e) = apply_bake(doc, part, result) {
                    log::error!("Failed to apply baked pitch: {}", e);
                }
            });
            Some(edit)
        }
        Err(BatchEditError::Cancelled) => None,
        Err(e) => {
            log::error!("Pitch bake failed: {}", e);
            None
        }
    }
}

/// Bake pitch on a worker thread.
///
/// The renderer check happens up front on the document thread. On wasm32
/// the work runs inline and its result is queued the same way.
pub fn spawn_bake_pitch(doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<BatchTask> {
    let renderer = pitch_renderer(doc, part)?;
    let snapshot = PartSnapshot::take(doc, part, selection, renderer)?;
    let sender = doc.pending_sender();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let work = move || {
        if let Some(edit) = run_bake(snapshot, &worker_cancel) {
            if sender.send(edit).is_err() {
                log::warn!("Document closed before the bake finished");
            }
        }
    };
    Ok(start(work, cancel))
}
