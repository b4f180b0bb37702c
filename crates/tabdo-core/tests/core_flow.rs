use std::fs;

use chrono::Utc;
use tabdo_core::kv::{DirStore, KeyValueStore};
use tabdo_core::modal::TaskDraft;
use tabdo_core::store::TaskStore;
use tabdo_core::task::Task;
use tabdo_core::workspace::{Workspace, WorkspaceSettings};
use tempfile::tempdir;

fn draft(text: &str, due: &str, color: &str) -> TaskDraft {
    TaskDraft {
        text: text.to_string(),
        due_date: due.to_string(),
        color: color.to_string(),
    }
}

#[test]
fn tabs_and_tasks_survive_reopen() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();

    {
        let backend = DirStore::open(temp.path()).expect("open store");
        let mut ws = Workspace::bootstrap(backend, WorkspaceSettings::default()).expect("bootstrap");
        ws.add_tab().expect("list2");
        ws.rename_tab("list2", "Groceries").expect("rename");
        ws.add_task(None, draft("eggs", "2024-02-01", "#ffcc00"), now)
            .expect("add eggs");
        ws.add_task(None, draft("milk", "2024-01-15", ""), now)
            .expect("add milk");
        ws.activate_tab("list1").expect("back to list1");
    }

    let backend = DirStore::open(temp.path()).expect("reopen store");
    let mut ws = Workspace::bootstrap(backend, WorkspaceSettings::default()).expect("bootstrap");
    assert_eq!(ws.lists().active(), Some("list1"));
    assert_eq!(ws.lists().lists().len(), 2);

    let view = ws.show(Some("groceries")).expect("show");
    let shown: Vec<_> = view.rows.iter().map(|row| row.text.as_str()).collect();
    assert_eq!(shown, vec!["milk", "eggs"]);
    assert_eq!(view.rows[1].color, "#ffcc00");
    assert_eq!(view.rows[0].color, "#ffffff");

    assert_eq!(ws.add_tab().expect("list3"), "list3");
}

#[test]
fn tasks_are_stored_as_a_plain_json_array_under_the_list_key() {
    let temp = tempdir().expect("tempdir");
    let backend = DirStore::open(temp.path()).expect("open store");
    let mut ws = Workspace::bootstrap(backend, WorkspaceSettings::default()).expect("bootstrap");
    ws.add_task(None, draft("A", "2024-01-05", "#ffffff"), Utc::now())
        .expect("add");

    let raw = fs::read_to_string(temp.path().join("list1.json")).expect("read list1");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let record = &value[0];
    assert_eq!(record["text"], "A");
    assert_eq!(record["dueDate"], "2024-01-05");
    assert_eq!(record["color"], "#ffffff");
    assert!(record["addedDate"].as_str().is_some_and(|s| s.ends_with('Z')));
    assert!(record["id"].as_str().is_some());
}

#[test]
fn page_written_data_is_readable_and_deletable() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("list1.json"),
        r##"[{"text":"A","dueDate":"2024-01-05","color":"#ffffff","addedDate":"2024-01-01T00:00:00.000Z"},{"text":"B","dueDate":"2024-01-01","color":"#ff0000","addedDate":"2024-01-01T00:00:01.000Z"}]"##,
    )
    .expect("seed list1");

    let backend = DirStore::open(temp.path()).expect("open store");
    let mut ws = Workspace::bootstrap(backend, WorkspaceSettings::default()).expect("bootstrap");

    let view = ws.show(None).expect("show");
    assert_eq!(view.rows[0].text, "B");

    let deletion = ws.delete_row(None, 0).expect("delete shown row 0");
    assert_eq!(deletion.removed.map(|task| task.text), Some("B".to_string()));

    let mut store = TaskStore::new(DirStore::open(temp.path()).expect("reopen"));
    let left: Vec<Task> = store.list("list1").expect("list");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].text, "A");
}

#[test]
fn corrupt_list_file_reads_as_empty() {
    let temp = tempdir().expect("tempdir");
    let mut backend = DirStore::open(temp.path()).expect("open store");
    backend.set("list1", "not json at all").expect("seed");

    let mut ws = Workspace::bootstrap(backend, WorkspaceSettings::default()).expect("bootstrap");
    assert!(ws.show(None).expect("show").rows.is_empty());
}

#[test]
fn page_lists_without_a_registry_show_up_as_tabs() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("list3.json"),
        r##"[{"text":"keep me","dueDate":null,"color":"#ffffff","addedDate":"2024-01-01T00:00:00.000Z"}]"##,
    )
    .expect("seed list3");
    fs::write(temp.path().join("list1.json"), "[]").expect("seed list1");

    let backend = DirStore::open(temp.path()).expect("open store");
    let mut ws = Workspace::bootstrap(backend, WorkspaceSettings::default()).expect("bootstrap");
    let keys: Vec<&str> = ws.lists().lists().iter().map(|tab| tab.key.as_str()).collect();
    assert_eq!(keys, vec!["list1", "list3"]);

    ws.add_task(Some("list3"), draft("new", "", ""), Utc::now())
        .expect("add to list3");
    let mut store = TaskStore::new(DirStore::open(temp.path()).expect("reopen"));
    let texts: Vec<String> = store
        .list("list3")
        .expect("list")
        .into_iter()
        .map(|task| task.text)
        .collect();
    assert_eq!(texts, vec!["keep me", "new"]);
    assert!(temp.path().join("tabdo.lists.json").exists());
}
