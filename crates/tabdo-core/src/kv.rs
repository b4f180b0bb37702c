use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, trace};

use crate::error::WorkspaceError;

/// String-keyed, string-valued persistent storage.
///
/// This is the role `localStorage` plays for the browser page: every write
/// is durable by the time the call returns and there is no caching layer.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Every stored key, sorted.
    fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug)]
pub struct DirStore {
    pub data_dir: PathBuf,
}

const EXTENSION: &str = "json";

impl DirStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened key-value store");
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.data_dir.join(format!("{key}.{EXTENSION}")))
    }
}

impl KeyValueStore for DirStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => {
                trace!(file = %path.display(), bytes = raw.len(), "read key");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        debug!(file = %path.display(), bytes = value.len(), "writing key atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn keys(&self) -> anyhow::Result<Vec<String>> {
        let entries = fs::read_dir(&self.data_dir)
            .with_context(|| format!("failed listing {}", self.data_dir.display()))?;

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
                && validate_key(stem).is_ok()
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process map; nothing survives the value being dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    map: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.map.keys().cloned().collect())
    }
}

/// Keys become file names, so they are limited to a safe alphabet.
pub fn validate_key(key: &str) -> Result<(), WorkspaceError> {
    let ok = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(WorkspaceError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{DirStore, KeyValueStore, MemoryStore, validate_key};

    #[test]
    fn dir_store_reads_back_and_lists_keys() {
        let temp = tempdir().expect("tempdir");
        let mut store = DirStore::open(temp.path()).expect("open");

        assert_eq!(store.get("list1").expect("get"), None);
        store.set("list2", "[]").expect("set");
        store.set("list1", "[1]").expect("set");
        store.set("list1", "[2]").expect("overwrite");

        assert_eq!(store.get("list1").expect("get").as_deref(), Some("[2]"));
        assert_eq!(store.keys().expect("keys"), vec!["list1", "list2"]);

        std::fs::write(temp.path().join("notes.txt"), "x").expect("stray file");
        std::fs::write(temp.path().join("bad key.json"), "x").expect("stray json");
        assert_eq!(store.keys().expect("keys"), vec!["list1", "list2"]);
    }

    #[test]
    fn rejects_keys_that_escape_the_directory() {
        assert!(validate_key("list1").is_ok());
        assert!(validate_key("tabdo.lists").is_ok());
        for bad in ["", "../list1", ".hidden", "a/b", "list 1"] {
            assert!(validate_key(bad).is_err(), "{bad:?} should be rejected");
        }

        let temp = tempdir().expect("tempdir");
        let mut store = DirStore::open(temp.path()).expect("open");
        assert!(store.set("../escape", "x").is_err());
    }

    #[test]
    fn memory_store_behaves_like_a_map() {
        let mut store = MemoryStore::new();
        store.set("b", "2").expect("set");
        store.set("a", "1").expect("set");
        assert_eq!(store.keys().expect("keys"), vec!["a", "b"]);
        assert_eq!(store.get("a").expect("get").as_deref(), Some("1"));
        assert_eq!(store.get("c").expect("get"), None);
    }
}
