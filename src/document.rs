//! The owned document: project, undo history and subscribers
//!
//! All edits go through [`Document::execute`] inside a group opened with
//! [`Document::start_group`]. Closing the group records it as one undo step
//! and validates whatever the group's commands touched.

use crate::config::EngineConfig;
use crate::models::project::Project;
use crate::undo::{Command, EngineError, Notification, Result, UndoStack, ValidateOptions};
use crate::validation::validate_project;
use std::sync::mpsc::{channel, Receiver, Sender};

/// What subscribers are told about
#[derive(Debug)]
pub enum DocEvent<'a> {
    /// A command was executed (or unexecuted when `is_undo`)
    Command { command: &'a Command, is_undo: bool },
    Notification(&'a Notification),
}

pub type Subscriber = Box<dyn FnMut(&DocEvent<'_>)>;

/// Work computed off the document thread, applied by [`Document::apply_pending`]
pub type PendingEdit = Box<dyn FnOnce(&mut Document) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        SubscriptionId(raw)
    }
}

pub struct Document {
    project: Project,
    config: EngineConfig,
    undo: UndoStack,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    pending_tx: Sender<PendingEdit>,
    pending_rx: Receiver<PendingEdit>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("project", &self.project.name)
            .field("undo", &self.undo)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Document {
    pub fn new(config: EngineConfig) -> Self {
        let (pending_tx, pending_rx) = channel();
        Self {
            project: Project::new(&config),
            undo: UndoStack::new(config.undo_limit),
            config,
            subscribers: Vec::new(),
            next_subscription: 0,
            pending_tx,
            pending_rx,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_open_group(&self) -> bool {
        self.undo.has_open_group()
    }

    pub fn start_group(&mut self) -> Result<()> {
        self.undo.start_group()?;
        log::debug!("Start undo group");
        Ok(())
    }

    /// Close the open group and validate what it changed
    pub fn end_group(&mut self) -> Result<()> {
        if let Some(options) = self.undo.end_group()? {
            validate_project(&mut self.project, &self.config, options);
        }
        log::debug!("End undo group");
        Ok(())
    }

    /// Run a command inside the open group.
    ///
    /// A command that violates its contract is rejected and not recorded.
    pub fn execute(&mut self, mut command: Command) -> Result<()> {
        if !self.undo.has_open_group() {
            log::error!("No open undo group for \"{}\"", command.description());
            return Err(EngineError::NoOpenGroup);
        }
        command.execute(&mut self.project)?;
        log::debug!("Execute: {}", command.description());
        publish(
            &mut self.subscribers,
            &DocEvent::Command {
                command: &command,
                is_undo: false,
            },
        );
        self.undo.push(command)
    }

    /// Run a whole command list as one undo step
    pub fn execute_group(&mut self, commands: Vec<Command>) -> Result<()> {
        self.start_group()?;
        let result = commands.into_iter().try_for_each(|command| self.execute(command));
        self.end_group()?;
        result
    }

    /// Revert the last group. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if self.undo.has_open_group() {
            self.end_group()?;
        }
        let Document {
            project,
            config,
            undo,
            subscribers,
            ..
        } = self;
        let group = match undo.undo_target() {
            Some(group) => group,
            None => return Ok(false),
        };
        log::info!("Undo: {}", group.description());
        for command in group.commands.iter_mut().rev() {
            command.unexecute(project)?;
            publish(subscribers, &DocEvent::Command { command, is_undo: true });
        }
        let options = group.validate_options();
        validate_project(project, config, options);
        Ok(true)
    }

    /// Reapply the last undone group. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        if self.undo.has_open_group() {
            self.end_group()?;
        }
        let Document {
            project,
            config,
            undo,
            subscribers,
            ..
        } = self;
        let group = match undo.redo_target() {
            Some(group) => group,
            None => return Ok(false),
        };
        log::info!("Redo: {}", group.description());
        for command in group.commands.iter_mut() {
            command.execute(project)?;
            publish(subscribers, &DocEvent::Command { command, is_undo: false });
        }
        let options = group.validate_options();
        validate_project(project, config, options);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.undo.redo_count()
    }

    pub fn mark_saved(&mut self) {
        self.undo.mark_saved();
    }

    pub fn changes_saved(&self) -> bool {
        self.undo.changes_saved()
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Broadcast a notification; it never enters the undo history
    pub fn notify(&mut self, notification: Notification) {
        if !notification.is_silent() {
            log::info!("Notify: {}", notification.description());
        }
        publish(&mut self.subscribers, &DocEvent::Notification(&notification));
    }

    /// Replace the project, validate it fully and forget all history
    pub fn load_project(&mut self, mut project: Project) {
        project.after_load();
        project.curve_interval = self.config.curve_interval;
        self.project = project;
        self.undo.clear();
        validate_project(&mut self.project, &self.config, ValidateOptions::full());
        log::info!("Loaded project \"{}\"", self.project.name);
        self.notify(Notification::LoadProject);
    }

    /// Serialize the project with parts in save order
    pub fn save_json(&self) -> serde_json::Result<String> {
        self.project.to_json()
    }

    pub fn validate_now(&mut self, options: ValidateOptions) {
        validate_project(&mut self.project, &self.config, options);
    }

    /// Handle for workers to send results back to the document thread
    pub fn pending_sender(&self) -> Sender<PendingEdit> {
        self.pending_tx.clone()
    }

    /// Apply every finished background result. Returns how many ran.
    pub fn apply_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(edit) = self.pending_rx.try_recv() {
            edit(self);
            count += 1;
        }
        count
    }
}

fn publish(subscribers: &mut [(SubscriptionId, Subscriber)], event: &DocEvent<'_>) {
    for (_, subscriber) in subscribers.iter_mut() {
        subscriber(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_execute_requires_group() {
        let mut doc = Document::default();
        assert_eq!(doc.execute(Command::change_bpm(90.0)), Err(EngineError::NoOpenGroup));
        assert_eq!(doc.project().bpm, 120.0);
    }

    #[test]
    fn test_undo_redo_bpm() {
        let mut doc = Document::default();
        doc.execute_group(vec![Command::change_bpm(90.0)]).unwrap();
        assert_eq!(doc.project().bpm, 90.0);
        assert_eq!(doc.project().time_axis().bpm, 90.0);
        assert!(doc.undo().unwrap());
        assert_eq!(doc.project().bpm, 120.0);
        assert_eq!(doc.project().time_axis().bpm, 120.0);
        assert!(!doc.undo().unwrap());
        assert!(doc.redo().unwrap());
        assert_eq!(doc.project().bpm, 90.0);
    }

    #[test]
    fn test_subscribers_see_commands_and_notifications() {
        let mut doc = Document::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = doc.subscribe(Box::new(move |event| {
            let entry = match event {
                DocEvent::Command { command, is_undo } => format!("{} {}", command.description(), is_undo),
                DocEvent::Notification(n) => n.description(),
            };
            sink.borrow_mut().push(entry);
        }));
        doc.execute_group(vec![Command::change_bpm(100.0)]).unwrap();
        doc.undo().unwrap();
        doc.notify(Notification::RedrawNotes);
        assert!(doc.unsubscribe(id));
        doc.notify(Notification::RedrawNotes);
        assert_eq!(
            *seen.borrow(),
            vec![
                "Change BPM (100) false".to_string(),
                "Change BPM (100) true".to_string(),
                "Redraw notes".to_string(),
            ]
        );
    }

    #[test]
    fn test_saved_point() {
        let mut doc = Document::default();
        assert!(doc.changes_saved());
        doc.execute_group(vec![Command::change_bpm(100.0)]).unwrap();
        assert!(!doc.changes_saved());
        doc.mark_saved();
        assert!(doc.changes_saved());
        doc.undo().unwrap();
        assert!(!doc.changes_saved());
        doc.redo().unwrap();
        assert!(doc.changes_saved());
    }

    #[test]
    fn test_pending_edits_run_on_apply() {
        let mut doc = Document::default();
        let tx = doc.pending_sender();
        std::thread::spawn(move || {
            let edit: PendingEdit = Box::new(|doc: &mut Document| {
                doc.execute_group(vec![Command::change_bpm(150.0)]).unwrap();
            });
            tx.send(edit).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(doc.apply_pending(), 1);
        assert_eq!(doc.project().bpm, 150.0);
    }
}
