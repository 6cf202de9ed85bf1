//! Document notifications
//!
//! Broadcast-only events. They never enter the undo stack.

use crate::models::note::NoteId;
use crate::models::part::PartId;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    /// Human-readable message, e.g. a batch edit that could not run
    UserMessage { message: String },
    /// The whole project was replaced
    LoadProject,
    RedrawNotes,
    SelectExpression { abbr: String },
    SetPlayPosition { tick: i32 },
    Progress { percent: f64, info: String },
    FocusNote { part: u64, note: u64 },
    PreRender,
    WillRemoveTrack { index: usize },
    SoloTrack { index: usize, solo: bool },
    VolumeChange { index: usize, volume: f64 },
}

impl Notification {
    pub fn user_message(message: impl Into<String>) -> Self {
        Notification::UserMessage { message: message.into() }
    }

    pub fn focus_note(part: PartId, note: NoteId) -> Self {
        Notification::FocusNote {
            part: part.0,
            note: note.0,
        }
    }

    /// High-frequency notifications that are not logged
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Notification::SetPlayPosition { .. } | Notification::Progress { .. } | Notification::VolumeChange { .. }
        )
    }

    pub fn description(&self) -> String {
        match self {
            Notification::UserMessage { message } => format!("Message: {}", message),
            Notification::LoadProject => "Load project".to_string(),
            Notification::RedrawNotes => "Redraw notes".to_string(),
            Notification::SelectExpression { abbr } => format!("Select expression {}", abbr),
            Notification::SetPlayPosition { tick } => format!("Set play position {}", tick),
            Notification::Progress { percent, info } => format!("Progress {:.0}% {}", percent, info),
            Notification::FocusNote { .. } => "Focus note".to_string(),
            Notification::PreRender => "Pre-render".to_string(),
            Notification::WillRemoveTrack { index } => format!("Will remove track {}", index),
            Notification::SoloTrack { index, solo } => format!("Solo track {} {}", index, solo),
            Notification::VolumeChange { index, volume } => format!("Volume of track {} {}", index, volume),
        }
    }
}
