use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::WorkspaceError;
use crate::kv::KeyValueStore;
use crate::lists::ListManager;
use crate::modal::{ModalController, ModalSettings, TaskDraft};
use crate::render::{TaskRow, rows_for};
use crate::store::TaskStore;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSettings {
    pub title_prefix: String,
    pub modal: ModalSettings,
}

impl WorkspaceSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            title_prefix: cfg.list_title_prefix(),
            modal: cfg.modal_settings(),
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            title_prefix: crate::config::DEFAULT_LIST_TITLE.to_string(),
            modal: ModalSettings::default(),
        }
    }
}

/// What a list looks like right after an action: its key, tab title and
/// freshly projected rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub key: String,
    pub title: String,
    pub rows: Vec<TaskRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deletion {
    pub removed: Option<Task>,
    pub view: ListView,
}

/// Everything one user action needs: storage, tabs, the task form.
///
/// Lists are named either by key (`list2`), by bare number, or by a unique
/// tab title; see [`ListManager::resolve`]. Tab changes are written to the
/// registry key before the call returns.
#[derive(Debug)]
pub struct Workspace<S: KeyValueStore> {
    store: TaskStore<S>,
    lists: ListManager,
    modal: ModalController,
    title_prefix: String,
}

impl<S: KeyValueStore> Workspace<S> {
    /// Restores the saved tabs, gives a tab to any stored `list<N>` that
    /// lacks one, and when there are still none creates the first one the
    /// way a fresh page load does.
    #[tracing::instrument(skip(backend, settings))]
    pub fn bootstrap(backend: S, settings: WorkspaceSettings) -> anyhow::Result<Self> {
        let lists = ListManager::load(&backend)?;
        let stored = backend.keys()?;
        let mut workspace = Self {
            store: TaskStore::new(backend),
            lists,
            modal: ModalController::new(settings.modal),
            title_prefix: settings.title_prefix,
        };

        if workspace
            .lists
            .adopt_stored(&stored, &workspace.title_prefix)
            > 0
        {
            workspace.save_lists()?;
        }

        if workspace.lists.is_empty() {
            info!("no lists yet; creating the first one");
            workspace.add_tab()?;
        }

        Ok(workspace)
    }

    pub fn lists(&self) -> &ListManager {
        &self.lists
    }

    pub fn store_mut(&mut self) -> &mut TaskStore<S> {
        &mut self.store
    }

    pub fn modal(&self) -> &ModalController {
        &self.modal
    }

    #[tracing::instrument(skip(self))]
    pub fn add_tab(&mut self) -> anyhow::Result<String> {
        let key = self.lists.create_list(&self.title_prefix);
        self.save_lists()?;
        Ok(key)
    }

    #[tracing::instrument(skip(self))]
    pub fn activate_tab(&mut self, list: &str) -> anyhow::Result<ListView> {
        let key = self.resolve(list)?;
        self.lists.activate(&key)?;
        self.save_lists()?;
        self.view(&key)
    }

    #[tracing::instrument(skip(self))]
    pub fn rename_tab(&mut self, list: &str, title: &str) -> anyhow::Result<()> {
        let key = self.resolve(list)?;
        self.lists.rename(&key, title)?;
        self.save_lists()
    }

    /// Opens the task form for `list`, which also becomes the active list.
    #[tracing::instrument(skip(self))]
    pub fn open_modal(&mut self, list: &str) -> anyhow::Result<()> {
        let key = self.resolve(list)?;
        self.lists.activate(&key)?;
        self.save_lists()?;
        self.modal.open(&key);
        Ok(())
    }

    pub fn draft_mut(&mut self) -> &mut TaskDraft {
        self.modal.draft_mut()
    }

    pub fn close_modal(&mut self) {
        self.modal.close();
    }

    /// Stores the task described by the open form, re-renders its list and
    /// closes the form. On a refusal nothing is written and the form stays
    /// open with its contents.
    #[tracing::instrument(skip(self, now))]
    pub fn submit(&mut self, now: DateTime<Utc>) -> anyhow::Result<ListView> {
        let (key, task) = self.modal.submit(now)?;
        if self.lists.get(&key).is_none() {
            return Err(WorkspaceError::UnknownList(key).into());
        }

        debug!(list = %key, id = %task.id, "submitting task");
        self.store.append(&key, task)?;
        let view = self.view(&key)?;
        self.modal.close();
        Ok(view)
    }

    /// Opens the form on `list` (or the active list), fills it with
    /// `draft` and submits it.
    #[tracing::instrument(skip(self, draft, now))]
    pub fn add_task(
        &mut self,
        list: Option<&str>,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ListView> {
        let key = self.target(list)?;
        self.open_modal(&key)?;
        *self.modal.draft_mut() = draft;

        let result = self.submit(now);
        if result.is_err() {
            self.modal.close();
        }
        result
    }

    /// Deletes the task shown at `row` (zero-based, in display order).
    ///
    /// The row is mapped to its task id through the current projection, so
    /// due-date sorting never makes it hit a different record. A row past
    /// the end deletes nothing.
    #[tracing::instrument(skip(self))]
    pub fn delete_row(&mut self, list: Option<&str>, row: usize) -> anyhow::Result<Deletion> {
        let key = self.target(list)?;
        let rows = rows_for(&mut self.store, &key)?;

        let removed = match rows.get(row) {
            Some(shown) => self.store.remove_by_id(&key, shown.id)?,
            None => {
                debug!(list = %key, row, len = rows.len(), "delete row out of range");
                None
            }
        };

        Ok(Deletion {
            removed,
            view: self.view(&key)?,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, list: &str, id: uuid::Uuid) -> anyhow::Result<Deletion> {
        let key = self.resolve(list)?;
        let removed = self.store.remove_by_id(&key, id)?;
        Ok(Deletion {
            removed,
            view: self.view(&key)?,
        })
    }

    /// Rows of `list`, or of the active list.
    pub fn show(&mut self, list: Option<&str>) -> anyhow::Result<ListView> {
        let key = self.target(list)?;
        self.view(&key)
    }

    fn view(&mut self, key: &str) -> anyhow::Result<ListView> {
        let title = self
            .lists
            .get(key)
            .map(|tab| tab.title.clone())
            .ok_or_else(|| WorkspaceError::UnknownList(key.to_string()))?;
        Ok(ListView {
            key: key.to_string(),
            title,
            rows: rows_for(&mut self.store, key)?,
        })
    }

    fn resolve(&self, list: &str) -> Result<String, WorkspaceError> {
        self.lists
            .resolve(list)
            .map(str::to_string)
            .ok_or_else(|| WorkspaceError::UnknownList(list.to_string()))
    }

    fn target(&self, list: Option<&str>) -> Result<String, WorkspaceError> {
        match list {
            Some(list) => self.resolve(list),
            None => match self.lists.active() {
                Some(key) => Ok(key.to_string()),
                None => {
                    error!("no active list is set; nothing was written");
                    Err(WorkspaceError::NoActiveList)
                }
            },
        }
    }

    fn save_lists(&mut self) -> anyhow::Result<()> {
        self.lists.save(self.store.backend_mut())
    }
}
