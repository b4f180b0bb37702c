use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::cli::Command;
use crate::kv::KeyValueStore;
use crate::modal::TaskDraft;
use crate::render::Renderer;
use crate::workspace::{ListView, Workspace};

#[instrument(skip(workspace, renderer, now))]
pub fn dispatch<S: KeyValueStore>(
    workspace: &mut Workspace<S>,
    renderer: &mut Renderer,
    command: Option<Command>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match command.unwrap_or(Command::Show { list: None }) {
        Command::Tabs => renderer.print_tabs(workspace.lists()),
        Command::NewTab => cmd_new_tab(workspace, renderer),
        Command::Switch { list } => {
            let view = workspace.activate_tab(&list)?;
            print_view(renderer, &view)
        }
        Command::Rename { list, title } => cmd_rename(workspace, renderer, &list, &title.join(" ")),
        Command::Add {
            list,
            due,
            color,
            text,
        } => cmd_add(
            workspace,
            renderer,
            list.as_deref(),
            TaskDraft {
                text: text.join(" "),
                due_date: due,
                color,
            },
            now,
        ),
        Command::Delete { row, list } => cmd_delete(workspace, renderer, list.as_deref(), row),
        Command::Show { list } => {
            let view = workspace.show(list.as_deref())?;
            print_view(renderer, &view)
        }
    }
}

#[instrument(skip(workspace, renderer))]
fn cmd_new_tab<S: KeyValueStore>(
    workspace: &mut Workspace<S>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    let key = workspace.add_tab()?;
    info!(list = %key, "command new-tab");
    println!("Created {key}.");
    renderer.print_tabs(workspace.lists())
}

#[instrument(skip(workspace, renderer))]
fn cmd_rename<S: KeyValueStore>(
    workspace: &mut Workspace<S>,
    renderer: &mut Renderer,
    list: &str,
    title: &str,
) -> anyhow::Result<()> {
    info!("command rename");
    workspace.rename_tab(list, title)?;
    renderer.print_tabs(workspace.lists())
}

#[instrument(skip(workspace, renderer, draft, now))]
fn cmd_add<S: KeyValueStore>(
    workspace: &mut Workspace<S>,
    renderer: &mut Renderer,
    list: Option<&str>,
    draft: TaskDraft,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");
    let view = workspace.add_task(list, draft, now)?;
    println!("Added task to {}.", view.key);
    print_view(renderer, &view)
}

/// `row` is one-based, matching the numbers `show` prints.
#[instrument(skip(workspace, renderer))]
fn cmd_delete<S: KeyValueStore>(
    workspace: &mut Workspace<S>,
    renderer: &mut Renderer,
    list: Option<&str>,
    row: usize,
) -> anyhow::Result<()> {
    info!("command delete");
    let deletion = match row.checked_sub(1) {
        Some(index) => workspace.delete_row(list, index)?,
        None => {
            let view = workspace.show(list)?;
            println!("No task at row {row}; nothing deleted.");
            return print_view(renderer, &view);
        }
    };

    match &deletion.removed {
        Some(task) => println!("Deleted task '{}'.", task.text),
        None => println!("No task at row {row}; nothing deleted."),
    }
    print_view(renderer, &deletion.view)
}

fn print_view(renderer: &mut Renderer, view: &ListView) -> anyhow::Result<()> {
    let heading = format!("{} ({})", view.title, view.key);
    renderer.print_task_table(&heading, &view.rows)
}
