//! Command engine
//!
//! Commands are collected into groups between explicit start/end markers.
//! A finished group is one undo step. Undo replays a group's commands in
//! reverse through [`Command::unexecute`]; redo replays them forward.

mod command;
mod notification;

pub use command::{Command, CurveState, OverrideValue, TrackState, VibratoParam, MAX_BPM, MIN_BPM};
pub use notification::Notification;

use crate::models::note::NoteId;
use crate::models::part::PartId;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("part {0:?} not found")]
    PartNotFound(PartId),
    #[error("part {0:?} is not a voice part")]
    NotVoicePart(PartId),
    #[error("note {0:?} not found in part {1:?}")]
    NoteNotFound(NoteId, PartId),
    #[error("track {0} not found")]
    TrackNotFound(usize),
    #[error("{what}: expected {expected} values, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{what} index {index} is out of range")]
    IndexOutOfRange { what: &'static str, index: usize },
    #[error("invalid time signature {beat_per_bar}/{beat_unit}")]
    InvalidTimeSignature { beat_per_bar: i32, beat_unit: i32 },
    #[error("expression {0} is not registered")]
    UnknownExpression(String),
    #[error("no undo group is open")]
    NoOpenGroup,
    #[error("an undo group is already open")]
    GroupAlreadyOpen,
    #[error("command state is inconsistent: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Which validation work a command requires
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ValidateOptions {
    /// Keep the cached time axis
    pub skip_timing: bool,
    /// Only this part needs validation; `None` means every part
    pub part: Option<PartId>,
    /// Reuse cached phonemizer output for unchanged note runs
    pub skip_phonemizer: bool,
    /// Keep existing phonemes untouched
    pub skip_phoneme: bool,
}

impl ValidateOptions {
    /// Everything, including the time axis
    pub fn full() -> Self {
        Self::default()
    }

    pub fn untimed(part: Option<PartId>) -> Self {
        Self {
            skip_timing: true,
            part,
            ..Self::default()
        }
    }

    pub fn reuse_phonemizer(mut self) -> Self {
        self.skip_phonemizer = true;
        self
    }

    pub fn without_phonemes(mut self) -> Self {
        self.skip_phonemizer = true;
        self.skip_phoneme = true;
        self
    }

    /// Combined requirements of two commands
    pub fn union(self, other: ValidateOptions) -> ValidateOptions {
        ValidateOptions {
            skip_timing: self.skip_timing && other.skip_timing,
            part: if self.part == other.part { self.part } else { None },
            skip_phonemizer: self.skip_phonemizer && other.skip_phonemizer,
            skip_phoneme: self.skip_phoneme && other.skip_phoneme,
        }
    }
}

/// One undo step
#[derive(Debug, Default)]
pub struct CommandGroup {
    serial: u64,
    pub commands: Vec<Command>,
}

impl CommandGroup {
    fn new(serial: u64) -> Self {
        Self {
            serial,
            commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append an executed command, folding it into the previous one when possible
    pub fn push(&mut self, command: Command) {
        match self.commands.pop() {
            Some(last) if last.can_merge(&command) => match last.merge(command) {
                Ok(merged) => self.commands.push(merged),
                Err((last, command)) => {
                    self.commands.push(last);
                    self.commands.push(command);
                }
            },
            Some(last) => {
                self.commands.push(last);
                self.commands.push(command);
            }
            None => self.commands.push(command),
        }
    }

    pub fn validate_options(&self) -> ValidateOptions {
        self.commands
            .iter()
            .map(Command::validate_options)
            .reduce(ValidateOptions::union)
            .unwrap_or_default()
    }

    pub fn description(&self) -> String {
        match self.commands.as_slice() {
            [] => String::new(),
            [only] => only.description(),
            [first, rest @ ..] => format!("{} (+{} more)", first.description(), rest.len()),
        }
    }
}

/// Undo/redo history of command groups
#[derive(Debug)]
pub struct UndoStack {
    /// Finished groups, oldest first
    groups: VecDeque<CommandGroup>,
    /// Groups before this index can be undone; the rest can be redone
    current_index: usize,
    /// Maximum number of groups to keep in history
    max_size: usize,
    /// Group being accumulated between start and end markers
    current_group: Option<CommandGroup>,
    next_serial: u64,
    /// Serial of the top undo group when the document was last saved
    saved_serial: Option<u64>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoStack {
    pub fn new(max_size: usize) -> Self {
        Self {
            groups: VecDeque::new(),
            current_index: 0,
            max_size: max_size.max(1),
            current_group: None,
            next_serial: 1,
            saved_serial: None,
        }
    }

    pub fn has_open_group(&self) -> bool {
        self.current_group.is_some()
    }

    pub fn start_group(&mut self) -> Result<()> {
        if self.current_group.is_some() {
            return Err(EngineError::GroupAlreadyOpen);
        }
        self.current_group = Some(CommandGroup::new(self.next_serial));
        self.next_serial += 1;
        Ok(())
    }

    /// Record an executed command in the open group
    pub fn push(&mut self, command: Command) -> Result<()> {
        match self.current_group.as_mut() {
            Some(group) => {
                group.push(command);
                Ok(())
            }
            None => Err(EngineError::NoOpenGroup),
        }
    }

    /// Close the open group.
    ///
    /// Empty groups are dropped. A recorded group clears the redo history.
    /// Returns the validation the group requires, if it was recorded.
    pub fn end_group(&mut self) -> Result<Option<ValidateOptions>> {
        let group = self.current_group.take().ok_or(EngineError::NoOpenGroup)?;
        if group.is_empty() {
            return Ok(None);
        }
        let options = group.validate_options();
        log::info!("Undo group: {}", group.description());

        // Truncate any redo history when a new group is added
        self.groups.truncate(self.current_index);
        self.groups.push_back(group);
        self.current_index = self.groups.len();

        if self.groups.len() > self.max_size {
            self.groups.pop_front();
            self.current_index = self.current_index.saturating_sub(1);
        }
        Ok(Some(options))
    }

    /// Step back and return the group to unexecute
    pub fn undo_target(&mut self) -> Option<&mut CommandGroup> {
        if !self.can_undo() {
            return None;
        }
        self.current_index -= 1;
        self.groups.get_mut(self.current_index)
    }

    /// Step forward and return the group to re-execute
    pub fn redo_target(&mut self) -> Option<&mut CommandGroup> {
        if !self.can_redo() {
            return None;
        }
        self.current_index += 1;
        self.groups.get_mut(self.current_index - 1)
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_index < self.groups.len()
    }

    pub fn undo_count(&self) -> usize {
        self.current_index
    }

    pub fn redo_count(&self) -> usize {
        self.groups.len() - self.current_index
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.current_index = 0;
        self.current_group = None;
        self.saved_serial = None;
    }

    fn top_serial(&self) -> Option<u64> {
        self.current_index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .map(|g| g.serial)
    }

    pub fn mark_saved(&mut self) {
        self.saved_serial = self.top_serial();
    }

    /// Whether the document is at the state it was last saved in
    pub fn changes_saved(&self) -> bool {
        self.top_serial() == self.saved_serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bpm(value: f64) -> Command {
        Command::change_bpm(value)
    }

    #[test]
    fn test_empty_group_is_dropped() {
        let mut stack = UndoStack::default();
        stack.start_group().unwrap();
        assert_eq!(stack.end_group(), Ok(None));
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_push_requires_open_group() {
        let mut stack = UndoStack::default();
        assert_eq!(stack.push(bpm(100.0)), Err(EngineError::NoOpenGroup));
        stack.start_group().unwrap();
        assert_eq!(stack.start_group(), Err(EngineError::GroupAlreadyOpen));
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut stack = UndoStack::new(2);
        for value in [100.0, 110.0, 130.0] {
            stack.start_group().unwrap();
            stack.push(bpm(value)).unwrap();
            stack.end_group().unwrap();
        }
        assert_eq!(stack.undo_count(), 2);
        assert!(stack.undo_target().is_some());
        assert!(stack.undo_target().is_some());
        assert!(stack.undo_target().is_none());
        assert_eq!(stack.redo_count(), 2);
    }

    #[test]
    fn test_new_group_clears_redo() {
        let mut stack = UndoStack::default();
        stack.start_group().unwrap();
        stack.push(bpm(100.0)).unwrap();
        stack.end_group().unwrap();
        stack.undo_target();
        assert!(stack.can_redo());
        stack.start_group().unwrap();
        stack.push(bpm(90.0)).unwrap();
        stack.end_group().unwrap();
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_saved_point_tracks_top_group() {
        let mut stack = UndoStack::default();
        assert!(stack.changes_saved());
        stack.start_group().unwrap();
        stack.push(bpm(100.0)).unwrap();
        stack.end_group().unwrap();
        assert!(!stack.changes_saved());
        stack.mark_saved();
        assert!(stack.changes_saved());
        stack.undo_target();
        assert!(!stack.changes_saved());
        stack.redo_target();
        assert!(stack.changes_saved());
    }

    #[test]
    fn test_options_union() {
        let a = PartId(1);
        let b = PartId(2);
        let pitch = ValidateOptions::untimed(Some(a)).without_phonemes();
        let notes = ValidateOptions::untimed(Some(a));
        let merged = pitch.union(notes);
        assert_eq!(merged.part, Some(a));
        assert!(merged.skip_timing);
        assert!(!merged.skip_phonemizer);
        let other = ValidateOptions::untimed(Some(b)).without_phonemes();
        let merged = pitch.union(other);
        assert_eq!(merged.part, None);
        assert!(merged.skip_phoneme);
        assert!(!pitch.union(ValidateOptions::full()).skip_timing);
    }
}
