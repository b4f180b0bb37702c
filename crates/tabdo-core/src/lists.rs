use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WorkspaceError;
use crate::kv::KeyValueStore;

/// Storage key of the persisted tab set. It can never look like `list<N>`.
pub const REGISTRY_KEY: &str = "tabdo.lists";

const LIST_KEY_PREFIX: &str = "list";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListTab {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub visible: bool,
}

/// The tabs, their titles and which one is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListManager {
    next_number: u64,
    tabs: Vec<ListTab>,
    #[serde(default)]
    active: Option<String>,
}

impl Default for ListManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ListManager {
    pub fn new() -> Self {
        Self {
            next_number: 1,
            tabs: vec![],
            active: None,
        }
    }

    /// Allocates `list<N>` from a counter that only grows, titles it
    /// `<title_prefix><N>` and makes it the active tab.
    pub fn create_list(&mut self, title_prefix: &str) -> String {
        let number = self.next_number;
        self.next_number += 1;

        let key = format!("{LIST_KEY_PREFIX}{number}");
        self.tabs.push(ListTab {
            key: key.clone(),
            title: format!("{title_prefix}{number}"),
            visible: false,
        });
        self.show_only(&key);

        info!(list = %key, "created list");
        key
    }

    pub fn activate(&mut self, key: &str) -> Result<(), WorkspaceError> {
        if self.get(key).is_none() {
            return Err(WorkspaceError::UnknownList(key.to_string()));
        }
        self.show_only(key);
        debug!(list = key, "activated list");
        Ok(())
    }

    /// Changes the label shown on the tab. Tasks stored under the key are
    /// not touched.
    pub fn rename(&mut self, key: &str, title: &str) -> Result<(), WorkspaceError> {
        let tab = self
            .tabs
            .iter_mut()
            .find(|tab| tab.key == key)
            .ok_or_else(|| WorkspaceError::UnknownList(key.to_string()))?;
        tab.title = title.to_string();
        debug!(list = key, title, "renamed list");
        Ok(())
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&ListTab> {
        self.tabs.iter().find(|tab| tab.key == key)
    }

    pub fn lists(&self) -> &[ListTab] {
        &self.tabs
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Gives a tab to every `list<N>` key in `stored` that has none, such as
    /// lists the browser page wrote before any registry existed. New tabs go
    /// after the known ones in number order; the first becomes active when
    /// nothing is. Returns how many tabs were added.
    pub fn adopt_stored(&mut self, stored: &[String], title_prefix: &str) -> usize {
        let mut orphans: Vec<u64> = stored
            .iter()
            .filter(|key| self.get(key).is_none())
            .filter_map(|key| list_number(key))
            .collect();
        orphans.sort_unstable();
        orphans.dedup();

        for &number in &orphans {
            let key = format!("{LIST_KEY_PREFIX}{number}");
            info!(list = %key, "adopting stored list without a tab");
            self.tabs.push(ListTab {
                key,
                title: format!("{title_prefix}{number}"),
                visible: false,
            });
            self.next_number = self.next_number.max(number + 1);
        }

        if self.active.is_none()
            && let Some(first) = orphans.first()
        {
            self.show_only(&format!("{LIST_KEY_PREFIX}{first}"));
        }
        orphans.len()
    }

    /// Finds a tab by key (`list2`), by bare number (`2`), or by a title
    /// that matches exactly one tab ignoring case.
    pub fn resolve(&self, needle: &str) -> Option<&str> {
        let needle = needle.trim();
        if let Some(tab) = self.get(needle) {
            return Some(tab.key.as_str());
        }

        if needle.parse::<u64>().is_ok()
            && let Some(tab) = self.get(&format!("{LIST_KEY_PREFIX}{needle}"))
        {
            return Some(tab.key.as_str());
        }

        let mut by_title = self
            .tabs
            .iter()
            .filter(|tab| tab.title.trim().eq_ignore_ascii_case(needle));
        let first = by_title.next()?;
        if by_title.next().is_some() {
            None
        } else {
            Some(first.key.as_str())
        }
    }

    fn show_only(&mut self, key: &str) {
        for tab in &mut self.tabs {
            tab.visible = tab.key == key;
        }
        self.active = Some(key.to_string());
    }

    #[tracing::instrument(skip(backend))]
    pub fn load<S: KeyValueStore>(backend: &S) -> anyhow::Result<Self> {
        let Some(raw) = backend.get(REGISTRY_KEY)? else {
            debug!("no list registry stored; starting fresh");
            return Ok(Self::new());
        };

        let mut manager = match serde_json::from_str::<Self>(&raw) {
            Ok(manager) => manager,
            Err(err) => {
                warn!(error = %err, "list registry is malformed; starting fresh");
                return Ok(Self::new());
            }
        };
        manager.repair();
        Ok(manager)
    }

    #[tracing::instrument(skip(self, backend))]
    pub fn save<S: KeyValueStore>(&self, backend: &mut S) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(self)?;
        backend.set(REGISTRY_KEY, &serialized)
    }

    /// Keeps a hand-edited registry consistent: the counter stays ahead of
    /// every allocated number and the active key names a real tab.
    fn repair(&mut self) {
        let highest = self
            .tabs
            .iter()
            .filter_map(|tab| list_number(&tab.key))
            .max()
            .unwrap_or(0);
        if self.next_number <= highest {
            warn!(
                stored = self.next_number,
                highest, "list counter behind allocated lists; advancing"
            );
            self.next_number = highest + 1;
        }
        self.next_number = self.next_number.max(1);

        match self.active.clone() {
            Some(key) if self.get(&key).is_some() => self.show_only(&key),
            _ => {
                self.active = None;
                for tab in &mut self.tabs {
                    tab.visible = false;
                }
            }
        }
    }
}

/// `N` for a canonical `list<N>` key; `list0`, `list01` and anything else
/// yield `None`.
fn list_number(key: &str) -> Option<u64> {
    let number = key
        .strip_prefix(LIST_KEY_PREFIX)?
        .parse::<u64>()
        .ok()
        .filter(|number| *number > 0)?;
    (format!("{LIST_KEY_PREFIX}{number}") == key).then_some(number)
}
