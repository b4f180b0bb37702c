use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::WorkspaceError;
use crate::task::Task;

/// The new-task form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub text: String,
    pub due_date: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModalState {
    #[default]
    Closed,
    Open {
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSettings {
    pub default_color: String,
    pub reject_empty_text: bool,
}

impl Default for ModalSettings {
    fn default() -> Self {
        Self {
            default_color: "#ffffff".to_string(),
            reject_empty_text: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModalController {
    state: ModalState,
    draft: TaskDraft,
    settings: ModalSettings,
}

impl ModalController {
    pub fn new(settings: ModalSettings) -> Self {
        Self {
            state: ModalState::Closed,
            draft: TaskDraft::default(),
            settings,
        }
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ModalState::Open { .. })
    }

    pub fn target(&self) -> Option<&str> {
        match &self.state {
            ModalState::Open { target } => Some(target),
            ModalState::Closed => None,
        }
    }

    pub fn open(&mut self, target: &str) {
        debug!(list = target, "task form opened");
        self.state = ModalState::Open {
            target: target.to_string(),
        };
    }

    pub fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut TaskDraft {
        &mut self.draft
    }

    /// Builds the task the form currently describes. The form stays open;
    /// the caller closes it once the task has been stored.
    ///
    /// Empty text is accepted unless `reject_empty_text` is set. The due
    /// date is stored exactly as entered; only ordering parses it.
    pub fn submit(&self, now: DateTime<Utc>) -> Result<(String, Task), WorkspaceError> {
        let ModalState::Open { target } = &self.state else {
            return Err(WorkspaceError::ModalClosed);
        };

        if self.settings.reject_empty_text && self.draft.text.trim().is_empty() {
            return Err(WorkspaceError::EmptyText);
        }

        let color = if self.draft.color.trim().is_empty() {
            self.settings.default_color.clone()
        } else {
            self.draft.color.trim().to_string()
        };

        let task = Task::new(
            self.draft.text.clone(),
            self.draft.due_date.clone(),
            color,
            now,
        );
        Ok((target.clone(), task))
    }

    /// Back to closed with a blank form. Nothing is persisted.
    pub fn close(&mut self) {
        if self.is_open() {
            debug!("task form closed");
        }
        self.state = ModalState::Closed;
        self.draft = TaskDraft::default();
    }
}
