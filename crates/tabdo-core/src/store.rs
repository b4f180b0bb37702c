use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::kv::KeyValueStore;
use crate::task::Task;

/// Ordered task sequences, one per list key, read and written straight
/// through the backing key-value store on every call.
#[derive(Debug)]
pub struct TaskStore<S> {
    backend: S,
}

impl<S: KeyValueStore> TaskStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Current sequence for `list_key`, empty when the key was never
    /// written or holds something that is not a JSON array. Array entries
    /// that are not task objects are skipped with a warning; the rest of
    /// the list still reads.
    ///
    /// Records without an id get one here and the list is written back, so
    /// an id handed out by one call still resolves on the next.
    #[tracing::instrument(skip(self))]
    pub fn list(&mut self, list_key: &str) -> anyhow::Result<Vec<Task>> {
        let mut tasks = self.read(list_key)?;

        let mut assigned = 0usize;
        for task in &mut tasks {
            if task.id.is_nil() {
                task.id = Uuid::new_v4();
                assigned += 1;
            }
        }
        if assigned > 0 {
            info!(list = list_key, assigned, "assigned ids to stored tasks");
            self.write(list_key, &tasks)?;
        }

        Ok(tasks)
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    pub fn append(&mut self, list_key: &str, task: Task) -> anyhow::Result<()> {
        let mut tasks = self.list(list_key)?;
        tasks.push(task);
        self.write(list_key, &tasks)?;
        debug!(list = list_key, count = tasks.len(), "task appended");
        Ok(())
    }

    /// Removes the task at `index`, shifting later tasks down by one.
    /// An index past the end leaves storage untouched and yields `None`.
    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, list_key: &str, index: usize) -> anyhow::Result<Option<Task>> {
        let mut tasks = self.list(list_key)?;
        if index >= tasks.len() {
            debug!(list = list_key, index, len = tasks.len(), "remove index out of range");
            return Ok(None);
        }

        let removed = tasks.remove(index);
        self.write(list_key, &tasks)?;
        debug!(list = list_key, index, id = %removed.id, "task removed");
        Ok(Some(removed))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn remove_by_id(&mut self, list_key: &str, id: Uuid) -> anyhow::Result<Option<Task>> {
        let tasks = self.list(list_key)?;
        match tasks.iter().position(|task| task.id == id) {
            Some(index) => self.remove(list_key, index),
            None => {
                debug!(list = list_key, "task id not present");
                Ok(None)
            }
        }
    }

    fn read(&self, list_key: &str) -> anyhow::Result<Vec<Task>> {
        let Some(raw) = self.backend.get(list_key)? else {
            return Ok(vec![]);
        };
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }

        let entries = match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(list = list_key, error = %err, "stored list is malformed; treating as empty");
                return Ok(vec![]);
            }
        };

        let mut tasks = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<Task>(entry) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    warn!(list = list_key, index, error = %err, "skipping stored entry that is not a task");
                }
            }
        }
        Ok(tasks)
    }

    fn write(&mut self, list_key: &str, tasks: &[Task]) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(tasks)
            .with_context(|| format!("failed to serialize {list_key}"))?;
        self.backend
            .set(list_key, &serialized)
            .with_context(|| format!("failed to save {list_key}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::TaskStore;
    use crate::kv::{KeyValueStore, MemoryStore};
    use crate::task::Task;

    fn task(text: &str, due: &str) -> Task {
        Task::new(text.to_string(), due.to_string(), "#ffffff".to_string(), Utc::now())
    }

    fn texts(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.text.as_str()).collect()
    }

    #[test]
    fn append_keeps_call_order() {
        let mut store = TaskStore::new(MemoryStore::new());
        assert!(store.list("list1").expect("list").is_empty());

        for text in ["c", "a", "b", "a"] {
            store.append("list1", task(text, "")).expect("append");
        }
        assert_eq!(texts(&store.list("list1").expect("list")), vec!["c", "a", "b", "a"]);
        assert!(store.list("list2").expect("other list").is_empty());
    }

    #[test]
    fn remove_shifts_later_tasks_down() {
        let mut store = TaskStore::new(MemoryStore::new());
        for text in ["a", "b", "c", "d"] {
            store.append("list1", task(text, "")).expect("append");
        }

        let removed = store.remove("list1", 1).expect("remove");
        assert_eq!(removed.map(|task| task.text), Some("b".to_string()));
        assert_eq!(texts(&store.list("list1").expect("list")), vec!["a", "c", "d"]);

        let removed = store.remove("list1", 1).expect("remove again");
        assert_eq!(removed.map(|task| task.text), Some("c".to_string()));
        assert_eq!(texts(&store.list("list1").expect("list")), vec!["a", "d"]);
    }

    #[test]
    fn out_of_range_remove_is_a_noop() {
        let mut store = TaskStore::new(MemoryStore::new());
        store.append("list1", task("a", "")).expect("append");
        let before = store.backend().get("list1").expect("get");

        assert_eq!(store.remove("list1", 1).expect("remove"), None);
        assert_eq!(store.remove("list9", 0).expect("remove on empty"), None);
        assert_eq!(store.backend().get("list1").expect("get"), before);
        assert_eq!(store.backend().get("list9").expect("get"), None);
    }

    #[test]
    fn single_task_then_delete_leaves_empty_list() {
        let mut store = TaskStore::new(MemoryStore::new());
        store.append("list1", task("only", "2024-01-01")).expect("append");
        store.remove("list1", 0).expect("remove");
        assert!(store.list("list1").expect("list").is_empty());
    }

    #[test]
    fn remove_by_id_targets_the_right_record() {
        let mut store = TaskStore::new(MemoryStore::new());
        let first = task("same", "");
        let second = task("same", "");
        let second_id = second.id;
        store.append("list1", first.clone()).expect("append");
        store.append("list1", second).expect("append");

        let removed = store.remove_by_id("list1", second_id).expect("remove");
        assert_eq!(removed.map(|task| task.id), Some(second_id));
        assert_eq!(store.list("list1").expect("list"), vec![first]);

        assert_eq!(store.remove_by_id("list1", second_id).expect("remove"), None);
    }

    #[test]
    fn malformed_list_reads_as_empty() {
        let mut backend = MemoryStore::new();
        backend.set("list1", "{not json").expect("set");
        let mut store = TaskStore::new(backend);

        assert!(store.list("list1").expect("list").is_empty());

        store.append("list1", task("fresh", "")).expect("append");
        assert_eq!(texts(&store.list("list1").expect("list")), vec!["fresh"]);
    }

    #[test]
    fn null_field_does_not_cost_the_other_records() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                "list1",
                r##"[{"text":"keep me","dueDate":"2024-01-05","color":"#ffffff","addedDate":"2024-01-01T00:00:00.000Z"},{"text":"x","dueDate":null,"color":"#ff0000","addedDate":"2024-01-01T00:00:01.000Z"}]"##,
            )
            .expect("set");
        let mut store = TaskStore::new(backend);

        let before = store.list("list1").expect("list");
        assert_eq!(texts(&before), vec!["keep me", "x"]);
        assert_eq!(before[1].due_date, "");

        store.append("list1", task("new", "")).expect("append");
        assert_eq!(
            texts(&store.list("list1").expect("list")),
            vec!["keep me", "x", "new"]
        );
    }

    #[test]
    fn entries_that_are_not_tasks_are_skipped() {
        let mut backend = MemoryStore::new();
        backend
            .set("list1", r#"[{"text":"a"},7,"loose",{"text":"b"}]"#)
            .expect("set");
        let mut store = TaskStore::new(backend);

        assert_eq!(texts(&store.list("list1").expect("list")), vec!["a", "b"]);
    }

    #[test]
    fn legacy_records_get_stable_ids() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                "list1",
                r#"[{"text":"a","dueDate":"","color":"","addedDate":""},{"text":"b","dueDate":"","color":"","addedDate":""}]"#,
            )
            .expect("set");
        let mut store = TaskStore::new(backend);

        let first = store.list("list1").expect("list");
        let second = store.list("list1").expect("list again");
        assert!(first.iter().all(|task| !task.id.is_nil()));
        assert_eq!(first, second);
    }

    #[test]
    fn serialized_sequence_reads_back_equal() {
        let mut store = TaskStore::new(MemoryStore::new());
        store.append("list1", task("a", "2024-01-05")).expect("append");
        store.append("list1", task("b", "")).expect("append");
        let tasks = store.list("list1").expect("list");

        let raw = serde_json::to_string(&tasks).expect("serialize");
        let back: Vec<Task> = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, tasks);
    }
}
