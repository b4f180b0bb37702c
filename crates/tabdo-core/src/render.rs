use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::config::Config;
use crate::datetime::parse_due;
use crate::kv::KeyValueStore;
use crate::lists::ListManager;
use crate::store::TaskStore;
use crate::task::Task;

pub const NO_DUE_DATE: &str = "No due date";

/// One displayed line of a list.
///
/// `display_index` is the position after sorting; `storage_index` is where
/// the record sits in the stored sequence. Deleting goes through `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub display_index: usize,
    pub storage_index: usize,
    pub id: Uuid,
    pub text: String,
    pub due_label: String,
    pub color: String,
}

/// Rows in due-date order. The sort is stable; tasks whose due date is
/// empty or unparsable come after all dated tasks, in storage order.
pub fn project(tasks: &[Task]) -> Vec<TaskRow> {
    let mut order: Vec<(usize, &Task)> = tasks.iter().enumerate().collect();
    order.sort_by_key(|(_, task)| due_sort_key(task));

    order
        .into_iter()
        .enumerate()
        .map(|(display_index, (storage_index, task))| TaskRow {
            display_index,
            storage_index,
            id: task.id,
            text: task.text.clone(),
            due_label: if task.has_due_date() {
                task.due_date.clone()
            } else {
                NO_DUE_DATE.to_string()
            },
            color: task.color.clone(),
        })
        .collect()
}

pub fn rows_for<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    list_key: &str,
) -> anyhow::Result<Vec<TaskRow>> {
    Ok(project(&store.list(list_key)?))
}

fn due_sort_key(task: &Task) -> (bool, Option<DateTime<Utc>>) {
    let parsed = parse_due(&task.due_date);
    (parsed.is_none(), parsed)
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, rows))]
    pub fn print_task_table(&mut self, title: &str, rows: &[TaskRow]) -> anyhow::Result<()> {
        let paint = self.paints();
        let mut out = io::stdout().lock();
        writeln!(out, "{}", style(title, "1", paint))?;
        write_task_table(&mut out, rows, paint)
    }

    #[tracing::instrument(skip(self, lists))]
    pub fn print_tabs(&mut self, lists: &ListManager) -> anyhow::Result<()> {
        let paint = self.paints();
        let mut out = io::stdout().lock();
        write_tabs(&mut out, lists, paint)
    }

    fn paints(&self) -> bool {
        self.color && io::stdout().is_terminal()
    }
}

pub fn write_task_table<W: Write>(mut writer: W, rows: &[TaskRow], paint: bool) -> anyhow::Result<()> {
    if rows.is_empty() {
        writeln!(writer, "No tasks.")?;
        return Ok(());
    }

    let headers = vec!["#".to_string(), "Task".to_string(), "Due Date".to_string()];
    let cells = rows
        .iter()
        .map(|row| {
            vec![
                (row.display_index + 1).to_string(),
                row.text.clone(),
                row.due_label.clone(),
            ]
        })
        .collect::<Vec<_>>();
    let widths = column_widths(&headers, &cells);

    writeln!(writer, "{}", format_line(&headers, &widths))?;
    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>();
    writeln!(writer, "{}", format_line(&rule, &widths))?;

    for (row, line) in rows.iter().zip(cells) {
        let text = format_line(&line, &widths);
        match row_colors(&row.color).filter(|_| paint) {
            Some(code) => writeln!(writer, "{}", style(&text, &code, true))?,
            None => writeln!(writer, "{text}")?,
        }
    }

    Ok(())
}

pub fn write_tabs<W: Write>(mut writer: W, lists: &ListManager, paint: bool) -> anyhow::Result<()> {
    if lists.is_empty() {
        writeln!(writer, "No lists.")?;
        return Ok(());
    }

    let key_width = lists
        .lists()
        .iter()
        .map(|tab| UnicodeWidthStr::width(tab.key.as_str()))
        .max()
        .unwrap_or(0);

    for tab in lists.lists() {
        let active = lists.active() == Some(tab.key.as_str());
        let marker = if active { "*" } else { " " };
        let line = format!("{marker} {:key_width$}  {}", tab.key, tab.title);
        if active {
            writeln!(writer, "{}", style(&line, "1", paint))?;
        } else {
            writeln!(writer, "{line}")?;
        }
    }

    Ok(())
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    widths
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, cell) in cells.iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        let padding = widths[idx].saturating_sub(UnicodeWidthStr::width(cell.as_str()));
        line.push_str(cell);
        line.push_str(&" ".repeat(padding));
    }
    line.trim_end().to_string()
}

fn style(text: &str, code: &str, paint: bool) -> String {
    if !paint {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

/// Truecolor background from `#rgb` / `#rrggbb`, with black or white text
/// depending on how light the background is.
fn row_colors(color: &str) -> Option<String> {
    let (r, g, b) = parse_hex_color(color)?;
    let luma = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    let fg = if luma > 150.0 { "30" } else { "97" };
    Some(format!("48;2;{r};{g};{b};{fg}"))
}

fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let raw = value.trim().strip_prefix('#')?;
    if !raw.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |hex: &str| u8::from_str_radix(hex, 16).ok();
    match raw.len() {
        3 => {
            let mut parts = raw.chars().map(|ch| channel(&format!("{ch}{ch}")));
            Some((parts.next()??, parts.next()??, parts.next()??))
        }
        6 => Some((channel(&raw[0..2])?, channel(&raw[2..4])?, channel(&raw[4..6])?)),
        _ => None,
    }
}
